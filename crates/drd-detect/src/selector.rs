// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use drd_core::{AlignedSeries, DisturbanceCandidate};

/// Selects the single changepoint that qualifies as "the" disturbance.
///
/// A changepoint qualifies when its date falls within
/// `[event_date - window_days, event_date + window_days]` and it represents a
/// strictly downward trend shift. Among qualifiers the earliest index wins:
/// the first regime break inside the window is taken as causally closest to
/// the event, and later breaks are treated as secondary effects.
///
/// Returns `None` when no changepoint survives both filters; the caller maps
/// that to a skip, not an error.
pub fn select_disturbance(
    aligned: &AlignedSeries,
    event_date: NaiveDate,
    window_days: i64,
) -> Option<DisturbanceCandidate> {
    let decomposition = aligned.decomposition();
    for &cp in decomposition.changepoints() {
        let date = aligned.date_at(cp)?;
        if (date - event_date).num_days().abs() > window_days {
            continue;
        }
        let delta = decomposition.shift_at(cp)?;
        if delta >= 0.0 {
            // Upward shifts cannot be disturbances.
            continue;
        }
        let trend = decomposition.trend();
        return Some(DisturbanceCandidate {
            index: cp,
            date,
            pre_value: trend[cp],
            post_value: trend[cp + 1],
            delta,
        });
    }
    None
}
