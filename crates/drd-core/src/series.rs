// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::DrdError;
use chrono::NaiveDate;
use std::fmt;

/// Identifier of one spatial unit (settlement).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entity's ordered radiance series.
///
/// Invariants enforced at construction: dates strictly increasing, one value
/// per date, all values finite. Gaps between dates are allowed. The series is
/// never mutated in place; filtering produces a new, possibly shorter series.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSeries {
    id: EntityId,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ObservationSeries {
    /// Constructs a validated series.
    pub fn new(
        id: EntityId,
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
    ) -> Result<Self, DrdError> {
        if dates.len() != values.len() {
            return Err(DrdError::invalid_input(format!(
                "series length mismatch for '{id}': {} dates, {} values",
                dates.len(),
                values.len()
            )));
        }
        if let Some(window) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DrdError::invalid_input(format!(
                "series dates for '{id}' must be strictly increasing: {} >= {}",
                window[0], window[1]
            )));
        }
        if let Some((idx, value)) = values
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(DrdError::invalid_input(format!(
                "series value for '{id}' at index {idx} is not finite: {value}"
            )));
        }
        Ok(Self { id, dates, values })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample mean; zero for an empty series.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Sample standard deviation (n-1 denominator); zero when n < 2.
    pub fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let ss: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    }

    /// Returns a new series keeping only the rows selected by `keep`.
    ///
    /// `keep` must have the same length as the series.
    pub fn retain_rows(&self, keep: &[bool]) -> Result<Self, DrdError> {
        if keep.len() != self.len() {
            return Err(DrdError::invalid_input(format!(
                "retain mask length mismatch: got {}, expected {}",
                keep.len(),
                self.len()
            )));
        }
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (i, &k) in keep.iter().enumerate() {
            if k {
                dates.push(self.dates[i]);
                values.push(self.values[i]);
            }
        }
        // Order is preserved, so the strictly-increasing invariant holds.
        Ok(Self {
            id: self.id.clone(),
            dates,
            values,
        })
    }

    /// Returns a copy truncated to the first `len` rows.
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.len());
        Self {
            id: self.id.clone(),
            dates: self.dates[..len].to_vec(),
            values: self.values[..len].to_vec(),
        }
    }
}

/// Normalized output of the trend oracle: fitted trend values plus
/// changepoint indices into them.
///
/// Invariants enforced at construction: indices strictly increasing and every
/// index `i` satisfies `i + 1 < trend.len()`, so the post-changepoint value
/// always exists.
#[derive(Clone, Debug, PartialEq)]
pub struct TrendDecomposition {
    trend: Vec<f64>,
    changepoints: Vec<usize>,
}

impl TrendDecomposition {
    pub fn new(trend: Vec<f64>, changepoints: Vec<usize>) -> Result<Self, DrdError> {
        if let Some((idx, value)) = trend
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(DrdError::invalid_input(format!(
                "trend value at index {idx} is not finite: {value}"
            )));
        }
        if let Some(window) = changepoints.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DrdError::invalid_input(format!(
                "changepoint indices must be strictly increasing: {} >= {}",
                window[0], window[1]
            )));
        }
        if let Some(&bad) = changepoints
            .iter()
            .find(|&&cp| cp.checked_add(1).map_or(true, |next| next >= trend.len()))
        {
            return Err(DrdError::invalid_input(format!(
                "changepoint index {bad} has no successor in a trend of length {}",
                trend.len()
            )));
        }
        Ok(Self {
            trend,
            changepoints,
        })
    }

    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    pub fn changepoints(&self) -> &[usize] {
        &self.changepoints
    }

    pub fn len(&self) -> usize {
        self.trend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trend.is_empty()
    }

    /// Trend shift across changepoint `cp`: `trend[cp + 1] - trend[cp]`.
    pub fn shift_at(&self, cp: usize) -> Option<f64> {
        let post = self.trend.get(cp.checked_add(1)?)?;
        let pre = self.trend.get(cp)?;
        Some(post - pre)
    }
}

/// Observation series aligned with its trend decomposition.
///
/// The series is truncated to the decomposition length at construction; the
/// deviation column (`observed - trend`) is derived once and carried here.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedSeries {
    series: ObservationSeries,
    decomposition: TrendDecomposition,
    deviations: Vec<f64>,
}

impl AlignedSeries {
    /// Aligns `series` with `decomposition`, truncating both to the shorter
    /// length. Changepoints beyond the truncated range are dropped.
    pub fn new(
        series: &ObservationSeries,
        decomposition: &TrendDecomposition,
    ) -> Result<Self, DrdError> {
        let len = series.len().min(decomposition.len());
        if len == 0 {
            return Err(DrdError::invalid_input(
                "cannot align an empty series with its decomposition",
            ));
        }
        let series = series.truncated(len);
        let trend = decomposition.trend()[..len].to_vec();
        let changepoints: Vec<usize> = decomposition
            .changepoints()
            .iter()
            .copied()
            .filter(|&cp| cp.checked_add(1).is_some_and(|next| next < len))
            .collect();
        let decomposition = TrendDecomposition::new(trend, changepoints)?;
        let deviations: Vec<f64> = series
            .values()
            .iter()
            .zip(decomposition.trend())
            .map(|(obs, fit)| obs - fit)
            .collect();
        Ok(Self {
            series,
            decomposition,
            deviations,
        })
    }

    pub fn series(&self) -> &ObservationSeries {
        &self.series
    }

    pub fn decomposition(&self) -> &TrendDecomposition {
        &self.decomposition
    }

    pub fn deviations(&self) -> &[f64] {
        &self.deviations
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Date of row `idx`.
    pub fn date_at(&self, idx: usize) -> Option<NaiveDate> {
        self.series.dates().get(idx).copied()
    }

    /// Splits the deviation column at `date`: pre includes every row up to
    /// and including `date`, post includes every row from `date` onward.
    ///
    /// The row at the split date deliberately appears in both windows,
    /// matching the pre/post windowing of the significance test.
    pub fn split_deviations_at(&self, date: NaiveDate) -> (Vec<f64>, Vec<f64>) {
        let mut pre = Vec::new();
        let mut post = Vec::new();
        for (i, &d) in self.series.dates().iter().enumerate() {
            if d <= date {
                pre.push(self.deviations[i]);
            }
            if d >= date {
                post.push(self.deviations[i]);
            }
        }
        (pre, post)
    }
}

#[cfg(test)]
mod tests {
    use super::{AlignedSeries, EntityId, ObservationSeries, TrendDecomposition};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("test date should be valid")
    }

    fn daily_series(values: &[f64]) -> ObservationSeries {
        let start = date(2022, 1, 1);
        let dates: Vec<NaiveDate> = (0..values.len())
            .map(|i| start + chrono::Days::new(i as u64))
            .collect();
        ObservationSeries::new(EntityId::new("S1"), dates, values.to_vec())
            .expect("test series should be valid")
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = ObservationSeries::new(
            EntityId::new("S1"),
            vec![date(2022, 1, 1)],
            vec![1.0, 2.0],
        )
        .expect_err("mismatch must fail");
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn rejects_non_increasing_dates() {
        let err = ObservationSeries::new(
            EntityId::new("S1"),
            vec![date(2022, 1, 2), date(2022, 1, 2)],
            vec![1.0, 2.0],
        )
        .expect_err("duplicate dates must fail");
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = ObservationSeries::new(
            EntityId::new("S1"),
            vec![date(2022, 1, 1), date(2022, 1, 2)],
            vec![1.0, f64::NAN],
        )
        .expect_err("NaN must fail");
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn mean_and_std_dev_match_hand_computation() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0]);
        assert!((series.mean() - 2.5).abs() < 1e-12);
        let expected_sd = (5.0_f64 / 3.0).sqrt();
        assert!((series.std_dev() - expected_sd).abs() < 1e-12);
    }

    #[test]
    fn retain_rows_shrinks_and_preserves_order() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0]);
        let kept = series
            .retain_rows(&[true, false, true, false])
            .expect("mask length matches");
        assert_eq!(kept.values(), &[1.0, 3.0]);
        assert_eq!(kept.dates()[1], date(2022, 1, 3));
    }

    #[test]
    fn decomposition_rejects_changepoint_without_successor() {
        let err = TrendDecomposition::new(vec![1.0, 2.0, 3.0], vec![2])
            .expect_err("index n-1 has no successor");
        assert!(err.to_string().contains("no successor"));
    }

    #[test]
    fn decomposition_shift_at_is_post_minus_pre() {
        let decomp = TrendDecomposition::new(vec![5.0, 3.0, 3.0], vec![0])
            .expect("decomposition should be valid");
        assert_eq!(decomp.shift_at(0), Some(-2.0));
        assert_eq!(decomp.shift_at(2), None);
        assert_eq!(decomp.shift_at(usize::MAX), None);
    }

    #[test]
    fn decomposition_rejects_saturated_changepoint_index() {
        let err = TrendDecomposition::new(vec![1.0, 2.0, 3.0], vec![usize::MAX])
            .expect_err("usize::MAX has no successor");
        assert!(err.to_string().contains("no successor"));
    }

    #[test]
    fn alignment_truncates_to_shorter_length_and_drops_tail_changepoints() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let decomp = TrendDecomposition::new(vec![1.0, 1.0, 1.0, 1.0], vec![1, 2])
            .expect("decomposition should be valid");
        let aligned = AlignedSeries::new(&series, &decomp).expect("alignment should succeed");
        assert_eq!(aligned.len(), 4);
        // cp=2 needs trend[3], which survives truncation to len 4.
        assert_eq!(aligned.decomposition().changepoints(), &[1, 2]);
        assert_eq!(aligned.deviations(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn split_deviations_includes_boundary_row_in_both_windows() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0]);
        let decomp = TrendDecomposition::new(vec![0.0, 0.0, 0.0, 0.0], vec![])
            .expect("decomposition should be valid");
        let aligned = AlignedSeries::new(&series, &decomp).expect("alignment should succeed");
        let (pre, post) = aligned.split_deviations_at(date(2022, 1, 3));
        assert_eq!(pre, vec![1.0, 2.0, 3.0]);
        assert_eq!(post, vec![3.0, 4.0]);
    }
}
