// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::DrdError;
use chrono::NaiveDate;

const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.5;
const DEFAULT_BRIGHTNESS_FLOOR: f64 = 0.5;
const DEFAULT_MIN_OBSERVATIONS: usize = 100;
const DEFAULT_WINDOW_DAYS: i64 = 60;
const DEFAULT_ALPHA: f64 = 0.05;
const DEFAULT_EFFECT_SIZE_MIN_WINDOW: usize = 5;
const DEFAULT_RECOVERY_LOOKAHEAD: usize = 90;
const DEFAULT_MIN_CHANGEPOINT_RISE: f64 = 0.003;
const DEFAULT_MIN_RECOVERY_SLOPE: f64 = 0.001;

/// How recovery is declared for a confirmed disturbance.
///
/// Exactly one policy applies per run; the two definitions are never mixed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Changepoint rise scan first, average-slope fallback second.
    ChangepointThenSlope,
    /// First date at/after the disturbance where the deviation returns to >= 0.
    DeviationReturn,
}

/// Run-wide detection parameters.
///
/// Defaults follow the reference behavior: brightness floor 0.5, minimum
/// series length 100 and the changepoint-then-slope recovery definition. The
/// stricter one-year floor and the deviation-return recovery variant are both
/// reachable through configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionConfig {
    /// |z| at or above this marks an observation as an outlier.
    pub outlier_threshold: f64,
    /// Entities whose cleaned mean radiance is at/below this are skipped.
    pub brightness_floor: f64,
    /// Minimum cleaned series length required before the oracle runs.
    pub min_observations: usize,
    /// Reference external event (cyclone) date, the window center.
    pub event_date: NaiveDate,
    /// Half-window radius around the event date, in days.
    pub window_days: i64,
    /// Significance level for the pre/post deviation t-test.
    pub alpha: f64,
    /// Cohen's d is reported only when both windows exceed this size.
    pub effect_size_min_window: usize,
    /// Recovery look-ahead, in trend indices (and days for the slope fallback).
    pub recovery_lookahead: usize,
    /// Minimum post-changepoint rise that counts as changepoint recovery.
    pub min_changepoint_rise: f64,
    /// Minimum average trend slope that counts as slope recovery.
    pub min_recovery_slope: f64,
    /// Recovery definition for this run.
    pub recovery_policy: RecoveryPolicy,
    /// Optional oracle time budget; expiry is reported as an oracle failure.
    pub oracle_budget_ms: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            brightness_floor: DEFAULT_BRIGHTNESS_FLOOR,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            event_date: NaiveDate::from_ymd_opt(2022, 2, 5).expect("2022-02-05 is a valid date"),
            window_days: DEFAULT_WINDOW_DAYS,
            alpha: DEFAULT_ALPHA,
            effect_size_min_window: DEFAULT_EFFECT_SIZE_MIN_WINDOW,
            recovery_lookahead: DEFAULT_RECOVERY_LOOKAHEAD,
            min_changepoint_rise: DEFAULT_MIN_CHANGEPOINT_RISE,
            min_recovery_slope: DEFAULT_MIN_RECOVERY_SLOPE,
            recovery_policy: RecoveryPolicy::ChangepointThenSlope,
            oracle_budget_ms: None,
        }
    }
}

impl DetectionConfig {
    /// Validates parameter ranges.
    pub fn validate(&self) -> Result<(), DrdError> {
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(DrdError::invalid_input(format!(
                "outlier_threshold must be finite and > 0, got {}",
                self.outlier_threshold
            )));
        }
        if !self.brightness_floor.is_finite() || self.brightness_floor < 0.0 {
            return Err(DrdError::invalid_input(format!(
                "brightness_floor must be finite and >= 0, got {}",
                self.brightness_floor
            )));
        }
        if self.min_observations < 2 {
            return Err(DrdError::invalid_input(format!(
                "min_observations must be >= 2, got {}",
                self.min_observations
            )));
        }
        if self.window_days <= 0 {
            return Err(DrdError::invalid_input(format!(
                "window_days must be >= 1, got {}",
                self.window_days
            )));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(DrdError::invalid_input(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.recovery_lookahead == 0 {
            return Err(DrdError::invalid_input(
                "recovery_lookahead must be >= 1",
            ));
        }
        if !self.min_changepoint_rise.is_finite() || self.min_changepoint_rise <= 0.0 {
            return Err(DrdError::invalid_input(format!(
                "min_changepoint_rise must be finite and > 0, got {}",
                self.min_changepoint_rise
            )));
        }
        if !self.min_recovery_slope.is_finite() || self.min_recovery_slope <= 0.0 {
            return Err(DrdError::invalid_input(format!(
                "min_recovery_slope must be finite and > 0, got {}",
                self.min_recovery_slope
            )));
        }
        Ok(())
    }
}
