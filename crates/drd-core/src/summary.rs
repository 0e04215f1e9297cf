// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{EntityOutcome, EntityResult};

/// Run-level counters; `processed + skipped + errored` equals the number of
/// entities the batch visited.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl RunCounters {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.errored
    }
}

/// Population-level aggregation: one row per completed entity plus the run
/// counters. The sole durable state the core produces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Summary {
    results: Vec<EntityResult>,
    counters: RunCounters,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one entity outcome, bumping the matching counter. Only
    /// completed outcomes contribute a row.
    pub fn record(&mut self, outcome: &EntityOutcome) {
        match outcome {
            EntityOutcome::Completed(result) => {
                self.results.push((**result).clone());
                self.counters.processed += 1;
            }
            EntityOutcome::Skipped(_) => self.counters.skipped += 1,
            EntityOutcome::Failed(_) => self.counters.errored += 1,
        }
    }

    pub fn results(&self) -> &[EntityResult] {
        &self.results
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Sorts rows by entity id so persisted output is deterministic
    /// regardless of completion order.
    pub fn sort_by_id(&mut self) {
        self.results.sort_by(|a, b| a.id.cmp(&b.id));
    }
}
