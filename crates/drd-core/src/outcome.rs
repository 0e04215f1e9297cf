// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{EntityId, SkipReason};
use chrono::NaiveDate;

/// A changepoint that passed the window and directionality filters.
///
/// Transient: at most one candidate per entity is promoted to "the"
/// disturbance and carried into the result record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisturbanceCandidate {
    /// Index into the aligned trend sequence.
    pub index: usize,
    pub date: NaiveDate,
    pub pre_value: f64,
    pub post_value: f64,
    /// `post_value - pre_value`; strictly negative for a disturbance.
    pub delta: f64,
}

/// Outcome of the pre/post deviation significance test.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignificanceReport {
    pub t_stat: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    /// Standardized effect size; `None` when either window has too few
    /// observations to support it. Annotates the result, never gates it.
    pub cohens_d: Option<f64>,
}

/// How (and whether) recovery was detected.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryMethod {
    Changepoint,
    Slope,
    DeviationReturn,
    None,
}

impl RecoveryMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Changepoint => "changepoint",
            Self::Slope => "slope",
            Self::DeviationReturn => "deviation_return",
            Self::None => "none",
        }
    }
}

/// Recovery date and duration for a confirmed disturbance.
///
/// An unrecovered disturbance is a valid, reportable outcome: `date` and
/// `duration_days` are absent and `method` is [`RecoveryMethod::None`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecoveryRecord {
    pub date: Option<NaiveDate>,
    pub duration_days: Option<i64>,
    pub method: RecoveryMethod,
}

impl RecoveryRecord {
    pub fn none() -> Self {
        Self {
            date: None,
            duration_days: None,
            method: RecoveryMethod::None,
        }
    }

    /// Builds a found-recovery record; duration is whole days from the
    /// disturbance date.
    pub fn found(disturbance_date: NaiveDate, date: NaiveDate, method: RecoveryMethod) -> Self {
        Self {
            date: Some(date),
            duration_days: Some((date - disturbance_date).num_days()),
            method,
        }
    }
}

/// Goodness of fit of the oracle trend against the cleaned observations.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitStats {
    pub r_squared: f64,
    pub rmse: f64,
}

/// Final per-entity record, appended to the summary exactly once.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EntityResult {
    pub id: EntityId,
    pub disturbance_date: NaiveDate,
    pub disturbance_index: usize,
    /// Trend shift across the disturbance changepoint; strictly negative.
    pub drop_magnitude: f64,
    pub significance: SignificanceReport,
    pub recovery: RecoveryRecord,
    /// Average trend slope over the recovery look-ahead span; absent when
    /// the span runs past the end of the trend. Recorded for every
    /// completed entity regardless of how (or whether) recovery was found.
    pub recovery_slope: Option<f64>,
    /// A drop deeper than the full-cycle floor followed by a detected
    /// recovery.
    pub full_cycle: bool,
    pub fit: FitStats,
}

/// Terminal outcome for one entity.
///
/// Replaces exceptions-for-control-flow: expected rejections are
/// `Skipped(reason)`, unexpected collaborator failures are `Failed(cause)`,
/// and only `Completed` contributes a summary row and artifacts.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityOutcome {
    Completed(Box<EntityResult>),
    Skipped(SkipReason),
    Failed(String),
}

impl EntityOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
