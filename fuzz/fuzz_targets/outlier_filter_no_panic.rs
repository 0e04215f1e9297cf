// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use chrono::NaiveDate;
use drd_core::{EntityId, ObservationSeries};
use drd_preprocess::filter_outliers;
use libfuzzer_sys::fuzz_target;

fn value_from_bytes(chunk: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw[..chunk.len()].copy_from_slice(chunk);
    let value = f64::from_le_bytes(raw);
    if value.is_finite() {
        value
    } else {
        f64::from(chunk[0])
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let threshold = 0.5 + f64::from(data[0]) / 16.0;
    let values: Vec<f64> = data[1..].chunks(8).map(value_from_bytes).collect();

    let Some(start) = NaiveDate::from_ymd_opt(2021, 11, 1) else {
        return;
    };
    let dates: Vec<NaiveDate> = (0..values.len())
        .map(|i| start + chrono::Days::new(i as u64))
        .collect();
    let Ok(series) = ObservationSeries::new(EntityId::new("FUZZ"), dates, values) else {
        return;
    };

    if let Ok(filtered) = filter_outliers(&series, threshold) {
        assert!(filtered.len() <= series.len());
        assert!(filtered.values().iter().all(|v| v.is_finite()));
    }
});
