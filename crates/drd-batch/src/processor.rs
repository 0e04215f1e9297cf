// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use drd_core::{
    AlignedSeries, DetectionConfig, DisturbanceCandidate, EntityOutcome, EntityResult,
    ObservationSeries, SkipReason,
};
use drd_detect::{
    assess_significance, detect_recovery, fit_stats, is_full_cycle, recovery_slope,
    select_disturbance,
};
use drd_oracle::{decompose_series, OraclePriors, TrendOracle};
use drd_preprocess::clean_series;

/// A completed entity plus the aligned data its artifacts are derived from.
#[derive(Clone, Debug)]
pub struct ProcessedEntity {
    pub result: EntityResult,
    pub aligned: AlignedSeries,
    pub disturbance: DisturbanceCandidate,
}

/// Runs the full per-entity pipeline and folds the outcome.
///
/// Every stage rejection surfaces as `Skipped`; nothing in here can abort a
/// batch. Load and export failures are mapped to `Failed` by the runner,
/// which owns I/O.
pub fn process_entity(
    series: &ObservationSeries,
    oracle: &(dyn TrendOracle + Sync),
    config: &DetectionConfig,
) -> EntityOutcome {
    match process_series(series, oracle, config) {
        Ok(processed) => EntityOutcome::Completed(Box::new(processed.result)),
        Err(reason) => EntityOutcome::Skipped(reason),
    }
}

/// The pipeline proper: clean, decompose, select, test, recover, fit.
///
/// Stage order is fixed; each stage sees only the survivors of the previous
/// one. The first rejection wins and names the stage that produced it.
pub fn process_series(
    series: &ObservationSeries,
    oracle: &(dyn TrendOracle + Sync),
    config: &DetectionConfig,
) -> Result<ProcessedEntity, SkipReason> {
    let cleaned = clean_series(series, config)?;

    let priors = OraclePriors {
        time_budget_ms: config.oracle_budget_ms,
        ..OraclePriors::default()
    };
    let aligned = decompose_series(oracle, &cleaned, &priors)?;

    let disturbance = select_disturbance(&aligned, config.event_date, config.window_days)
        .ok_or(SkipReason::NoChangepointInWindow)?;

    let (pre, post) = aligned.split_deviations_at(disturbance.date);
    let significance =
        assess_significance(&pre, &post, config.alpha, config.effect_size_min_window)?;

    let recovery = detect_recovery(&aligned, &disturbance, config);
    let slope = recovery_slope(&aligned, &disturbance, config);
    let fit = fit_stats(&aligned);

    let result = EntityResult {
        id: cleaned.id().clone(),
        disturbance_date: disturbance.date,
        disturbance_index: disturbance.index,
        drop_magnitude: disturbance.delta,
        significance,
        recovery,
        recovery_slope: slope,
        full_cycle: is_full_cycle(disturbance.delta, &recovery),
        fit,
    };
    Ok(ProcessedEntity {
        result,
        aligned,
        disturbance,
    })
}
