// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{OraclePriors, RawDecomposition, TrendOracle};
use drd_core::{AlignedSeries, ObservationSeries, SkipReason, TrendDecomposition};

/// Normalizes raw oracle output against a cleaned series of length
/// `series_len` into a validated [`TrendDecomposition`].
///
/// Steps, in order:
/// 1. drop non-finite placeholder changepoint entries and entries that do
///    not round to a valid index;
/// 2. sort and deduplicate the surviving indices;
/// 3. truncate the trend to `min(series_len, trend_len)` and discard any
///    index without a successor inside the truncated range;
/// 4. reject the entity when no changepoint survives: without at least one
///    regime break, no disturbance can be asserted.
pub fn normalize_decomposition(
    raw: &RawDecomposition,
    series_len: usize,
) -> Result<TrendDecomposition, SkipReason> {
    if raw.trend.is_empty() {
        return Err(SkipReason::oracle_failure("oracle returned an empty trend"));
    }
    if let Some(bad) = raw.trend.iter().find(|v| !v.is_finite()) {
        return Err(SkipReason::oracle_failure(format!(
            "oracle trend contains a non-finite value: {bad}"
        )));
    }

    let len = series_len.min(raw.trend.len());
    let trend = raw.trend[..len].to_vec();

    // Range-check in the float domain before casting: a huge finite entry
    // would otherwise saturate to usize::MAX.
    let max_index = len.saturating_sub(1) as f64;
    let mut indices: Vec<usize> = raw
        .changepoints
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0 && *v < max_index)
        .map(|v| v.round() as usize)
        .filter(|&cp| cp + 1 < len)
        .collect();
    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() {
        return Err(SkipReason::NoChangepointInWindow);
    }

    TrendDecomposition::new(trend, indices)
        .map_err(|err| SkipReason::oracle_failure(err.to_string()))
}

/// Invokes `oracle` on a cleaned series and aligns the result with it.
///
/// Any oracle failure is reported as [`SkipReason::OracleFailure`]; the
/// entity is skipped, never the batch.
pub fn decompose_series(
    oracle: &dyn TrendOracle,
    series: &ObservationSeries,
    priors: &OraclePriors,
) -> Result<AlignedSeries, SkipReason> {
    let raw = oracle
        .decompose(series.id().as_str(), series.values(), priors)
        .map_err(|err| SkipReason::oracle_failure(err.to_string()))?;
    let decomposition = normalize_decomposition(&raw, series.len())?;
    AlignedSeries::new(series, &decomposition)
        .map_err(|err| SkipReason::oracle_failure(err.to_string()))
}
