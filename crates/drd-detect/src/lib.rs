// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod fit;
pub mod recovery;
pub mod selector;
pub mod significance;

pub use fit::fit_stats;
pub use recovery::{detect_recovery, is_full_cycle, recovery_slope};
pub use selector::select_disturbance;
pub use significance::{assess_significance, cohens_d, welch_t_test, WelchTest};

/// Detection namespace placeholder.
pub fn crate_name() -> &'static str {
    "drd-detect"
}
