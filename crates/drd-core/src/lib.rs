// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod outcome;
pub mod series;
pub mod summary;

pub use config::{DetectionConfig, RecoveryPolicy};
pub use error::{DrdError, SkipReason};
pub use outcome::{
    DisturbanceCandidate, EntityOutcome, EntityResult, FitStats, RecoveryMethod, RecoveryRecord,
    SignificanceReport,
};
pub use series::{AlignedSeries, EntityId, ObservationSeries, TrendDecomposition};
pub use summary::{RunCounters, Summary};

/// Core shared types for the disturbance/recovery pipeline.
pub fn crate_name() -> &'static str {
    "drd-core"
}
