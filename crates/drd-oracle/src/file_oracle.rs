// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{OracleError, OraclePriors, RawDecomposition, TrendOracle};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Wire shape of one externally computed decomposition document.
///
/// Changepoint entries may be `null` (JSON has no NaN); they are carried as
/// NaN placeholders and dropped during normalization.
#[derive(Debug, Deserialize)]
struct DecompositionDocument {
    trend: Vec<f64>,
    #[serde(default)]
    changepoints: Vec<Option<f64>>,
}

/// Oracle adapter over externally computed per-entity decompositions.
///
/// The actual trend model runs out of process; its results are materialized
/// as one JSON document per entity (`<dir>/<entity_id>.json` with `trend`
/// and `changepoints` arrays). A missing or malformed document is an oracle
/// failure for that entity only.
#[derive(Clone, Debug)]
pub struct FileOracle {
    dir: PathBuf,
}

impl FileOracle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, entity_id: &str) -> PathBuf {
        self.dir.join(format!("{entity_id}.json"))
    }
}

impl TrendOracle for FileOracle {
    fn decompose(
        &self,
        entity_id: &str,
        values: &[f64],
        priors: &OraclePriors,
    ) -> Result<RawDecomposition, OracleError> {
        let started = Instant::now();
        let path = self.document_path(entity_id);
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            OracleError::new(format!(
                "no decomposition for '{entity_id}' at '{}': {err}",
                path.display()
            ))
        })?;
        let document: DecompositionDocument = serde_json::from_str(&raw).map_err(|err| {
            OracleError::new(format!(
                "malformed decomposition for '{entity_id}': {err}"
            ))
        })?;
        if document.trend.is_empty() {
            return Err(OracleError::new(format!(
                "decomposition for '{entity_id}' has an empty trend"
            )));
        }
        if values.is_empty() {
            return Err(OracleError::new(format!(
                "cleaned series for '{entity_id}' is empty"
            )));
        }
        if let Some(budget_ms) = priors.time_budget_ms {
            let elapsed_ms = started.elapsed().as_millis();
            if elapsed_ms > u128::from(budget_ms) {
                return Err(OracleError::new(format!(
                    "oracle budget of {budget_ms}ms exceeded ({elapsed_ms}ms)"
                )));
            }
        }
        Ok(RawDecomposition {
            trend: document.trend,
            changepoints: document
                .changepoints
                .into_iter()
                .map(|cp| cp.unwrap_or(f64::NAN))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FileOracle;
    use crate::{OraclePriors, TrendOracle};
    use std::io::Write;

    fn write_document(dir: &std::path::Path, id: &str, body: &str) {
        let mut file =
            std::fs::File::create(dir.join(format!("{id}.json"))).expect("create document");
        file.write_all(body.as_bytes()).expect("write document");
    }

    #[test]
    fn reads_trend_and_changepoints_from_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_document(
            dir.path(),
            "S1",
            r#"{"trend": [1.0, 0.8, 0.6], "changepoints": [1.0]}"#,
        );
        let oracle = FileOracle::new(dir.path());
        let raw = oracle
            .decompose("S1", &[1.0, 0.9, 0.5], &OraclePriors::default())
            .expect("document should load");
        assert_eq!(raw.trend, vec![1.0, 0.8, 0.6]);
        assert_eq!(raw.changepoints, vec![1.0]);
    }

    #[test]
    fn missing_changepoints_field_defaults_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_document(dir.path(), "S1", r#"{"trend": [1.0, 1.0]}"#);
        let oracle = FileOracle::new(dir.path());
        let raw = oracle
            .decompose("S1", &[1.0, 1.0], &OraclePriors::default())
            .expect("document should load");
        assert!(raw.changepoints.is_empty());
    }

    #[test]
    fn null_changepoint_entries_become_nan_placeholders() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_document(
            dir.path(),
            "S1",
            r#"{"trend": [1.0, 1.0, 1.0], "changepoints": [null, 1.0]}"#,
        );
        let oracle = FileOracle::new(dir.path());
        let raw = oracle
            .decompose("S1", &[1.0, 1.0, 1.0], &OraclePriors::default())
            .expect("document should load");
        assert!(raw.changepoints[0].is_nan());
        assert_eq!(raw.changepoints[1], 1.0);
    }

    #[test]
    fn missing_document_is_an_oracle_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let oracle = FileOracle::new(dir.path());
        let err = oracle
            .decompose("ABSENT", &[1.0], &OraclePriors::default())
            .expect_err("missing file must fail");
        assert!(err.to_string().contains("no decomposition for 'ABSENT'"));
    }

    #[test]
    fn malformed_document_is_an_oracle_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_document(dir.path(), "S1", "{not json");
        let oracle = FileOracle::new(dir.path());
        let err = oracle
            .decompose("S1", &[1.0], &OraclePriors::default())
            .expect_err("malformed file must fail");
        assert!(err.to_string().contains("malformed decomposition"));
    }
}
