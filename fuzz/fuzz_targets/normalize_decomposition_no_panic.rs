// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use drd_oracle::{normalize_decomposition, RawDecomposition};
use libfuzzer_sys::fuzz_target;

fn f64_from_bytes(chunk: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw[..chunk.len()].copy_from_slice(chunk);
    f64::from_le_bytes(raw)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let split = usize::from(data[0]).min(data.len() - 1);
    let series_len = usize::from(data[1]);
    let body = &data[2..];

    let trend: Vec<f64> = body[..split.min(body.len())]
        .chunks(8)
        .map(f64_from_bytes)
        .collect();
    let changepoints: Vec<f64> = body[split.min(body.len())..]
        .chunks(8)
        .map(f64_from_bytes)
        .collect();

    let raw = RawDecomposition {
        trend,
        changepoints,
    };
    if let Ok(decomposition) = normalize_decomposition(&raw, series_len) {
        assert!(decomposition.len() <= series_len.max(raw.trend.len()));
        assert!(decomposition
            .changepoints()
            .windows(2)
            .all(|w| w[0] < w[1]));
        assert!(decomposition
            .changepoints()
            .iter()
            .all(|&cp| cp + 1 < decomposition.len()));
    }
});
