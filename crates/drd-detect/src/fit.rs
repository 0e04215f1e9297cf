// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use drd_core::{AlignedSeries, FitStats};

/// Goodness-of-fit of the trend against the observed series.
///
/// `r_squared` is `1 - SS_res / SS_tot`; a constant observed series has no
/// variance to explain, so it reports 0 unless the residuals are also zero.
pub fn fit_stats(aligned: &AlignedSeries) -> FitStats {
    let observed = aligned.series().values();
    let n = observed.len() as f64;

    let ss_res: f64 = aligned.deviations().iter().map(|d| d * d).sum();
    let rmse = (ss_res / n).sqrt();

    let mean = observed.iter().sum::<f64>() / n;
    let ss_tot: f64 = observed.iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    FitStats { r_squared, rmse }
}

#[cfg(test)]
mod tests {
    use super::fit_stats;
    use chrono::NaiveDate;
    use drd_core::{AlignedSeries, EntityId, ObservationSeries, TrendDecomposition};

    fn aligned(observed: Vec<f64>, trend: Vec<f64>) -> AlignedSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).expect("test date should be valid");
        let dates: Vec<NaiveDate> = (0..observed.len())
            .map(|i| start + chrono::Days::new(i as u64))
            .collect();
        let series = ObservationSeries::new(EntityId::new("S1"), dates, observed)
            .expect("test series should be valid");
        let decomp = TrendDecomposition::new(trend, vec![]).expect("decomposition should be valid");
        AlignedSeries::new(&series, &decomp).expect("alignment should succeed")
    }

    #[test]
    fn perfect_fit_has_unit_r_squared_and_zero_rmse() {
        let a = aligned(vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0, 3.0, 4.0]);
        let stats = fit_stats(&a);
        assert_eq!(stats.r_squared, 1.0);
        assert_eq!(stats.rmse, 0.0);
    }

    #[test]
    fn constant_residual_matches_hand_computation() {
        // Trend offset by a constant 0.5: SS_res = 4 * 0.25, SS_tot = 5.
        let a = aligned(vec![1.0, 2.0, 3.0, 4.0], vec![0.5, 1.5, 2.5, 3.5]);
        let stats = fit_stats(&a);
        assert!((stats.rmse - 0.5).abs() < 1e-12);
        assert!((stats.r_squared - 0.8).abs() < 1e-12);
    }

    #[test]
    fn constant_observed_series_with_misfit_reports_zero_r_squared() {
        let a = aligned(vec![2.0, 2.0, 2.0], vec![1.0, 1.0, 1.0]);
        let stats = fit_stats(&a);
        assert_eq!(stats.r_squared, 0.0);
        assert!((stats.rmse - 1.0).abs() < 1e-12);
    }
}
