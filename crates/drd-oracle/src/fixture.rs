// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{OracleError, OraclePriors, RawDecomposition, TrendOracle};

/// Deterministic oracle returning canned output, for tests and replay.
///
/// Returns the same decomposition for every entity, or the configured
/// failure. Useful for exercising the pipeline without a real statistical
/// backend.
#[derive(Clone, Debug)]
pub struct FixtureOracle {
    output: Result<RawDecomposition, OracleError>,
}

impl FixtureOracle {
    pub fn new(trend: Vec<f64>, changepoints: Vec<f64>) -> Self {
        Self {
            output: Ok(RawDecomposition {
                trend,
                changepoints,
            }),
        }
    }

    /// An oracle that fails every invocation with `cause`.
    pub fn failing(cause: impl Into<String>) -> Self {
        Self {
            output: Err(OracleError::new(cause)),
        }
    }
}

impl TrendOracle for FixtureOracle {
    fn decompose(
        &self,
        _entity_id: &str,
        _values: &[f64],
        _priors: &OraclePriors,
    ) -> Result<RawDecomposition, OracleError> {
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::FixtureOracle;
    use crate::{OraclePriors, TrendOracle};

    #[test]
    fn fixture_returns_identical_output_for_every_entity() {
        let oracle = FixtureOracle::new(vec![1.0, 2.0], vec![0.0]);
        let a = oracle
            .decompose("A", &[1.0], &OraclePriors::default())
            .expect("fixture should succeed");
        let b = oracle
            .decompose("B", &[9.0, 9.0, 9.0], &OraclePriors::default())
            .expect("fixture should succeed");
        assert_eq!(a, b);
    }

    #[test]
    fn failing_fixture_reports_the_configured_cause() {
        let oracle = FixtureOracle::failing("numerical error");
        let err = oracle
            .decompose("A", &[1.0], &OraclePriors::default())
            .expect_err("failing fixture must fail");
        assert_eq!(err.to_string(), "numerical error");
    }
}
