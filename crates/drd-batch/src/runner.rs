// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use drd_core::{DetectionConfig, DrdError, EntityId, EntityOutcome, ObservationSeries, Summary};
use drd_oracle::TrendOracle;
use tracing::{debug, info, warn};

use crate::export;
use crate::processor::process_series;

/// One entity handed to the runner: either a validated series or the load
/// failure that prevented building one. Load failures count as errored, not
/// skipped, and never touch the pipeline.
#[derive(Debug)]
pub struct EntityInput {
    id: EntityId,
    series: Result<ObservationSeries, DrdError>,
}

impl EntityInput {
    pub fn ready(series: ObservationSeries) -> Self {
        Self {
            id: series.id().clone(),
            series: Ok(series),
        }
    }

    pub fn load_failed(id: EntityId, error: DrdError) -> Self {
        Self {
            id,
            series: Err(error),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Runner knobs. `output_dir` enables artifact export for completed
/// entities; `parallel` fans entities out over the rayon pool when the
/// `rayon` feature is on, and degrades to the sequential path otherwise.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub parallel: bool,
    pub output_dir: Option<PathBuf>,
}

/// Outcome of a whole batch: per-entity outcomes in input order plus the
/// aggregated summary, sorted by entity id.
#[derive(Debug)]
pub struct BatchRun {
    pub outcomes: Vec<(EntityId, EntityOutcome)>,
    pub summary: Summary,
}

/// Processes every entity, isolating failures to the entity that caused
/// them. The returned summary always satisfies
/// `processed + skipped + errored == inputs.len()`.
pub fn run_batch(
    inputs: &[EntityInput],
    oracle: &(dyn TrendOracle + Sync),
    config: &DetectionConfig,
    options: &RunOptions,
) -> Result<BatchRun, DrdError> {
    config.validate()?;

    let output_dir = options.output_dir.as_deref();
    let outcomes = if options.parallel {
        process_all_parallel(inputs, oracle, config, output_dir)
    } else {
        inputs
            .iter()
            .map(|input| process_input(input, oracle, config, output_dir))
            .collect()
    };

    let mut summary = Summary::new();
    for (_, outcome) in &outcomes {
        summary.record(outcome);
    }
    summary.sort_by_id();

    if let Some(root) = output_dir {
        export::write_summary_csv(root, &summary)?;
    }

    let counters = summary.counters();
    info!(
        processed = counters.processed,
        skipped = counters.skipped,
        errored = counters.errored,
        "batch finished"
    );
    Ok(BatchRun { outcomes, summary })
}

#[cfg(feature = "rayon")]
fn process_all_parallel(
    inputs: &[EntityInput],
    oracle: &(dyn TrendOracle + Sync),
    config: &DetectionConfig,
    output_dir: Option<&Path>,
) -> Vec<(EntityId, EntityOutcome)> {
    use rayon::prelude::*;
    inputs
        .par_iter()
        .map(|input| process_input(input, oracle, config, output_dir))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn process_all_parallel(
    inputs: &[EntityInput],
    oracle: &(dyn TrendOracle + Sync),
    config: &DetectionConfig,
    output_dir: Option<&Path>,
) -> Vec<(EntityId, EntityOutcome)> {
    inputs
        .iter()
        .map(|input| process_input(input, oracle, config, output_dir))
        .collect()
}

fn process_input(
    input: &EntityInput,
    oracle: &(dyn TrendOracle + Sync),
    config: &DetectionConfig,
    output_dir: Option<&Path>,
) -> (EntityId, EntityOutcome) {
    let id = input.id.clone();
    let series = match &input.series {
        Ok(series) => series,
        Err(err) => {
            warn!(entity = %id, error = %err, "entity load failed");
            return (id, EntityOutcome::Failed(err.to_string()));
        }
    };

    match process_series(series, oracle, config) {
        Ok(processed) => {
            if let Some(root) = output_dir {
                if let Err(err) = export::write_entity_artifacts(root, &processed) {
                    warn!(entity = %id, error = %err, "artifact export failed");
                    return (id, EntityOutcome::Failed(err.to_string()));
                }
            }
            info!(
                entity = %id,
                date = %processed.result.disturbance_date,
                drop = processed.result.drop_magnitude,
                recovery = processed.result.recovery.method.as_str(),
                "disturbance confirmed"
            );
            (id, EntityOutcome::Completed(Box::new(processed.result)))
        }
        Err(reason) => {
            debug!(entity = %id, code = reason.code(), reason = %reason, "entity skipped");
            (id, EntityOutcome::Skipped(reason))
        }
    }
}
