// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod adapter;
pub mod file_oracle;
pub mod fixture;

pub use adapter::{decompose_series, normalize_decomposition};
pub use file_oracle::FileOracle;
pub use fixture::FixtureOracle;

use std::fmt;

/// Structural priors passed to every oracle invocation.
///
/// The decomposition is trend-only (no seasonal term) with trend order
/// bounded to 0..=1, matching the reference configuration. The optional time
/// budget lets implementations bound expensive fits; expiry is reported as a
/// failure and mapped to a skip by the adapter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OraclePriors {
    pub trend_min_order: u8,
    pub trend_max_order: u8,
    pub time_budget_ms: Option<u64>,
}

impl Default for OraclePriors {
    fn default() -> Self {
        Self {
            trend_min_order: 0,
            trend_max_order: 1,
            time_budget_ms: None,
        }
    }
}

/// Failure signal from an oracle implementation.
#[derive(Clone, Debug, PartialEq)]
pub struct OracleError(pub String);

impl OracleError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OracleError {}

/// Raw, un-normalized oracle output.
///
/// `changepoints` is carried as `f64` because external decompositions encode
/// absent/placeholder entries as NaN; normalization filters them out. The
/// trend length is not guaranteed to match the input length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDecomposition {
    pub trend: Vec<f64>,
    pub changepoints: Vec<f64>,
}

/// External trend-decomposition contract: cleaned values plus structural
/// priors in, trend and changepoints (or a failure signal) out.
///
/// The decomposition technique itself is outside this system; any conforming
/// implementation can be substituted, including [`FixtureOracle`] in tests.
pub trait TrendOracle {
    fn decompose(
        &self,
        entity_id: &str,
        values: &[f64],
        priors: &OraclePriors,
    ) -> Result<RawDecomposition, OracleError>;
}

/// Oracle namespace placeholder.
pub fn crate_name() -> &'static str {
    "drd-oracle"
}
