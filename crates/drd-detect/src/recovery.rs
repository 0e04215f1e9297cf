// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{Days, NaiveDate};
use drd_core::{
    AlignedSeries, DetectionConfig, DisturbanceCandidate, RecoveryMethod, RecoveryPolicy,
    RecoveryRecord,
};

/// Drops shallower than this never count as a full cycle, recovered or not.
const FULL_CYCLE_MIN_DROP: f64 = -0.01;

/// Scans the post-disturbance trend for recovery under the configured policy.
///
/// Never skips: an unrecovered disturbance is a reportable outcome, so the
/// worst case is a [`RecoveryMethod::None`] record.
pub fn detect_recovery(
    aligned: &AlignedSeries,
    disturbance: &DisturbanceCandidate,
    config: &DetectionConfig,
) -> RecoveryRecord {
    match config.recovery_policy {
        RecoveryPolicy::ChangepointThenSlope => {
            changepoint_then_slope(aligned, disturbance, config)
        }
        RecoveryPolicy::DeviationReturn => deviation_return(aligned, disturbance),
    }
}

/// Default policy: changepoint rise scan first, average-slope fallback second.
fn changepoint_then_slope(
    aligned: &AlignedSeries,
    disturbance: &DisturbanceCandidate,
    config: &DetectionConfig,
) -> RecoveryRecord {
    if let Some(record) = changepoint_recovery(aligned, disturbance, config) {
        return record;
    }
    if let Some(record) = slope_recovery(aligned, disturbance, config) {
        return record;
    }
    RecoveryRecord::none()
}

/// First changepoint strictly after the disturbance, within the look-ahead
/// window, whose immediate post-value rise exceeds the configured minimum.
/// Earliest match wins, same rationale as disturbance selection.
fn changepoint_recovery(
    aligned: &AlignedSeries,
    disturbance: &DisturbanceCandidate,
    config: &DetectionConfig,
) -> Option<RecoveryRecord> {
    let decomposition = aligned.decomposition();
    for &cp in decomposition.changepoints() {
        if cp <= disturbance.index {
            continue;
        }
        if cp - disturbance.index > config.recovery_lookahead {
            break;
        }
        let rise = decomposition.shift_at(cp)?;
        if rise > config.min_changepoint_rise {
            let date = aligned.date_at(cp)?;
            return Some(RecoveryRecord::found(
                disturbance.date,
                date,
                RecoveryMethod::Changepoint,
            ));
        }
    }
    None
}

/// Average trend slope over the look-ahead span starting at the disturbance.
///
/// `None` when the span runs past the end of the trend. Reported on every
/// completed entity, even when recovery was declared through a changepoint.
pub fn recovery_slope(
    aligned: &AlignedSeries,
    disturbance: &DisturbanceCandidate,
    config: &DetectionConfig,
) -> Option<f64> {
    let span = config.recovery_lookahead;
    let trend = aligned.decomposition().trend();
    let end = disturbance.index.checked_add(span)?;
    let end_value = trend.get(end)?;
    Some((end_value - trend[disturbance.index]) / span as f64)
}

/// Whether the entity completed a full disturbance/recovery cycle: a drop
/// deeper than the floor and a recovery under the active policy.
pub fn is_full_cycle(drop_magnitude: f64, recovery: &RecoveryRecord) -> bool {
    drop_magnitude < FULL_CYCLE_MIN_DROP && recovery.method != RecoveryMethod::None
}

/// A sufficiently positive average slope over the look-ahead span declares
/// recovery at the projected date `disturbance_date + span` days.
fn slope_recovery(
    aligned: &AlignedSeries,
    disturbance: &DisturbanceCandidate,
    config: &DetectionConfig,
) -> Option<RecoveryRecord> {
    let slope = recovery_slope(aligned, disturbance, config)?;
    if slope > config.min_recovery_slope {
        let date = disturbance
            .date
            .checked_add_days(Days::new(config.recovery_lookahead as u64))?;
        return Some(RecoveryRecord::found(
            disturbance.date,
            date,
            RecoveryMethod::Slope,
        ));
    }
    None
}

/// Alternative policy: the first date at/after the disturbance where the
/// deviation returns to the baseline (deviation >= 0).
fn deviation_return(
    aligned: &AlignedSeries,
    disturbance: &DisturbanceCandidate,
) -> RecoveryRecord {
    for idx in disturbance.index..aligned.len() {
        if aligned.deviations()[idx] >= 0.0 {
            if let Some(date) = recovery_date_at(aligned, idx, disturbance.date) {
                return RecoveryRecord::found(
                    disturbance.date,
                    date,
                    RecoveryMethod::DeviationReturn,
                );
            }
        }
    }
    RecoveryRecord::none()
}

fn recovery_date_at(
    aligned: &AlignedSeries,
    idx: usize,
    disturbance_date: NaiveDate,
) -> Option<NaiveDate> {
    let date = aligned.date_at(idx)?;
    // The disturbance row itself can carry a non-negative deviation; recovery
    // on the disturbance date is a zero-duration recovery, which is valid.
    debug_assert!(date >= disturbance_date);
    Some(date)
}
