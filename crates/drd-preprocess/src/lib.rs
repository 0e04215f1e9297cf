// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use drd_core::{DetectionConfig, ObservationSeries, SkipReason};

/// Removes statistically extreme observations from a series.
///
/// A single non-recursive pass: z-scores are computed against the input
/// series' own mean and standard deviation, and every observation with
/// `|z| >= threshold` is dropped. The output never grows and retains the
/// input order.
///
/// A constant series (standard deviation zero) has undefined z-scores and is
/// rejected as [`SkipReason::DegenerateSeries`].
pub fn filter_outliers(
    series: &ObservationSeries,
    threshold: f64,
) -> Result<ObservationSeries, SkipReason> {
    let std_dev = series.std_dev();
    if std_dev == 0.0 {
        return Err(SkipReason::DegenerateSeries);
    }
    let mean = series.mean();

    let keep: Vec<bool> = series
        .values()
        .iter()
        .map(|v| ((v - mean) / std_dev).abs() < threshold)
        .collect();

    series
        .retain_rows(&keep)
        // The mask is built from the series itself, so lengths always match.
        .map_err(|err| SkipReason::insufficient_data(err.to_string()))
}

/// Null-signal / insufficient-data early exit, applied to the cleaned series
/// before any oracle call.
///
/// Rejects entities whose mean radiance sits at/below the brightness floor
/// (nothing to detect against) or whose series is shorter than the
/// configured minimum.
pub fn check_viability(
    series: &ObservationSeries,
    config: &DetectionConfig,
) -> Result<(), SkipReason> {
    let mean = series.mean();
    if mean <= config.brightness_floor {
        return Err(SkipReason::insufficient_data(format!(
            "mean radiance {mean:.4} at/below floor {:.4}",
            config.brightness_floor
        )));
    }
    if series.len() < config.min_observations {
        return Err(SkipReason::insufficient_data(format!(
            "{} observations, need at least {}",
            series.len(),
            config.min_observations
        )));
    }
    Ok(())
}

/// Convenience composition: outlier filter followed by the viability gate.
pub fn clean_series(
    series: &ObservationSeries,
    config: &DetectionConfig,
) -> Result<ObservationSeries, SkipReason> {
    let cleaned = filter_outliers(series, config.outlier_threshold)?;
    check_viability(&cleaned, config)?;
    Ok(cleaned)
}

/// Preprocessing namespace placeholder.
pub fn crate_name() -> &'static str {
    "drd-preprocess"
}

#[cfg(test)]
mod tests {
    use super::{check_viability, clean_series, filter_outliers};
    use chrono::NaiveDate;
    use drd_core::{DetectionConfig, EntityId, ObservationSeries, SkipReason};

    fn daily_series(values: &[f64]) -> ObservationSeries {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1).expect("valid date");
        let dates: Vec<NaiveDate> = (0..values.len())
            .map(|i| start + chrono::Days::new(i as u64))
            .collect();
        ObservationSeries::new(EntityId::new("S1"), dates, values.to_vec())
            .expect("test series should be valid")
    }

    #[test]
    fn constant_series_is_degenerate() {
        let series = daily_series(&[0.7; 50]);
        let err = filter_outliers(&series, 3.5).expect_err("zero std must be rejected");
        assert_eq!(err, SkipReason::DegenerateSeries);
    }

    #[test]
    fn extreme_spike_is_removed_and_order_preserved() {
        let mut values: Vec<f64> = (0..100).map(|i| 1.0 + 0.1 * ((i % 5) as f64)).collect();
        values.push(50.0);
        let series = daily_series(&values);
        let cleaned = filter_outliers(&series, 3.5).expect("filter should succeed");
        assert_eq!(cleaned.len(), values.len() - 1);
        assert!(cleaned.values().iter().all(|&v| v < 2.0));
        assert!(cleaned
            .dates()
            .windows(2)
            .all(|w| w[0] < w[1]));
    }

    #[test]
    fn filter_never_grows_the_series() {
        let series = daily_series(&[0.5, 0.6, 0.7, 0.8, 0.9]);
        let cleaned = filter_outliers(&series, 3.5).expect("filter should succeed");
        assert!(cleaned.len() <= series.len());
    }

    #[test]
    fn dim_entity_is_rejected_by_brightness_floor() {
        let series = daily_series(&[0.3; 200]);
        let config = DetectionConfig::default();
        let err = check_viability(&series, &config).expect_err("mean 0.3 < floor 0.5");
        assert_eq!(err.code(), "insufficient_data");
        assert!(err.to_string().contains("floor"));
    }

    #[test]
    fn short_series_is_rejected_by_min_observations() {
        let series = daily_series(&[1.0, 1.2, 0.9, 1.1, 1.0]);
        let config = DetectionConfig::default();
        let err = check_viability(&series, &config).expect_err("5 < 100 observations");
        assert!(err.to_string().contains("need at least 100"));
    }

    #[test]
    fn clean_series_composes_filter_and_gate() {
        let mut values: Vec<f64> = (0..150).map(|i| 1.0 + 0.1 * ((i % 7) as f64)).collect();
        values[75] = 40.0;
        let series = daily_series(&values);
        let config = DetectionConfig::default();
        let cleaned = clean_series(&series, &config).expect("bright long series passes");
        assert_eq!(cleaned.len(), 149);
    }
}
