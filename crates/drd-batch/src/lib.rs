// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod export;
pub mod processor;
pub mod runner;

pub use export::{write_entity_artifacts, write_summary_csv};
pub use processor::{process_entity, process_series, ProcessedEntity};
pub use runner::{run_batch, BatchRun, EntityInput, RunOptions};

/// Batch namespace placeholder.
pub fn crate_name() -> &'static str {
    "drd-batch"
}
