// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use drd_core::{DrdError, SignificanceReport, SkipReason};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Welch two-sample t-test output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WelchTest {
    pub t_stat: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
}

fn mean(sample: &[f64]) -> f64 {
    sample.iter().sum::<f64>() / sample.len() as f64
}

/// Sample variance with the n-1 denominator.
fn variance(sample: &[f64], sample_mean: f64) -> f64 {
    let ss: f64 = sample.iter().map(|v| (v - sample_mean).powi(2)).sum();
    ss / (sample.len() - 1) as f64
}

/// Welch's t-test for a difference in means under unequal variances.
///
/// Two-sided p-value from the Student's t CDF with Welch-Satterthwaite
/// degrees of freedom. Both samples need at least 2 observations.
pub fn welch_t_test(pre: &[f64], post: &[f64]) -> Result<WelchTest, DrdError> {
    if pre.len() < 2 || post.len() < 2 {
        return Err(DrdError::invalid_input(format!(
            "welch t-test needs at least 2 observations per window, got {} and {}",
            pre.len(),
            post.len()
        )));
    }

    let (n1, n2) = (pre.len() as f64, post.len() as f64);
    let (m1, m2) = (mean(pre), mean(post));
    let (v1, v2) = (variance(pre, m1), variance(post, m2));

    let se_sq = v1 / n1 + v2 / n2;
    if se_sq == 0.0 {
        // Both windows are exactly constant. Identical constants are
        // indistinguishable; different constants are trivially separated.
        let p_value = if m1 == m2 { 1.0 } else { 0.0 };
        return Ok(WelchTest {
            t_stat: if m1 == m2 { 0.0 } else { f64::INFINITY },
            p_value,
            degrees_of_freedom: n1 + n2 - 2.0,
        });
    }

    let t_stat = (m1 - m2) / se_sq.sqrt();
    let df = se_sq.powi(2)
        / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));
    if !t_stat.is_finite() || !df.is_finite() || df <= 0.0 {
        return Err(DrdError::numerical_issue(format!(
            "welch t-test produced non-finite statistics: t={t_stat}, df={df}"
        )));
    }

    let dist = StudentsT::new(0.0, 1.0, df).map_err(|err| {
        DrdError::numerical_issue(format!("failed to build t-distribution (df={df}): {err}"))
    })?;
    let p_value = 2.0 * (1.0 - dist.cdf(t_stat.abs()));

    Ok(WelchTest {
        t_stat,
        p_value,
        degrees_of_freedom: df,
    })
}

/// Population variance with the n denominator.
fn population_variance(sample: &[f64], sample_mean: f64) -> f64 {
    let ss: f64 = sample.iter().map(|v| (v - sample_mean).powi(2)).sum();
    ss / sample.len() as f64
}

/// Cohen's d: mean difference over the pooled standard deviation.
///
/// Pools the population variances as `sqrt((v1 + v2) / 2)`; the sign follows
/// `post - pre`, so a disturbance shows up as a negative effect size.
pub fn cohens_d(pre: &[f64], post: &[f64]) -> Option<f64> {
    if pre.len() < 2 || post.len() < 2 {
        return None;
    }
    let (m1, m2) = (mean(pre), mean(post));
    let (v1, v2) = (population_variance(pre, m1), population_variance(post, m2));
    let pooled = ((v1 + v2) / 2.0).sqrt();
    if pooled == 0.0 {
        return None;
    }
    Some((m2 - m1) / pooled)
}

/// The significance gate for a disturbance candidate.
///
/// Runs the Welch test on the pre/post deviation windows and rejects the
/// entity when `p > alpha`. Cohen's d annotates the report only when both
/// windows exceed `effect_size_min_window` observations; it never gates.
///
/// Windows too small to support the test are treated as not significant:
/// no defensible inference can be made from them.
pub fn assess_significance(
    pre: &[f64],
    post: &[f64],
    alpha: f64,
    effect_size_min_window: usize,
) -> Result<SignificanceReport, SkipReason> {
    if pre.len() < 2 || post.len() < 2 {
        return Err(SkipReason::NotSignificant { p_value: 1.0 });
    }
    // welch_t_test cannot fail for finite inputs once both windows hold at
    // least 2 observations; a breakdown is treated as an unprovable claim.
    let test = welch_t_test(pre, post)
        .map_err(|_| SkipReason::NotSignificant { p_value: 1.0 })?;
    if test.p_value > alpha {
        return Err(SkipReason::NotSignificant {
            p_value: test.p_value,
        });
    }
    let effect = if pre.len() > effect_size_min_window && post.len() > effect_size_min_window {
        cohens_d(pre, post)
    } else {
        None
    };
    Ok(SignificanceReport {
        t_stat: test.t_stat,
        p_value: test.p_value,
        degrees_of_freedom: test.degrees_of_freedom,
        cohens_d: effect,
    })
}

#[cfg(test)]
mod tests {
    use super::{assess_significance, cohens_d, welch_t_test};

    /// Deterministic pseudo-noise, bounded in [-0.5, 0.5).
    fn noise(i: usize) -> f64 {
        (((i * 2_654_435_761) % 1_000) as f64) / 1_000.0 - 0.5
    }

    fn sample(n: usize, center: f64, spread: f64) -> Vec<f64> {
        (0..n).map(|i| center + spread * noise(i)).collect()
    }

    #[test]
    fn equal_means_are_not_significant() {
        let pre = sample(60, 0.0, 1.0);
        let post = sample(60, 0.0, 1.0);
        let test = welch_t_test(&pre, &post).expect("test should run");
        assert!(test.p_value > 0.05, "p={} too small", test.p_value);
    }

    #[test]
    fn well_separated_means_are_significant() {
        let pre = sample(60, 0.0, 0.2);
        let post = sample(60, 2.0, 0.2);
        let test = welch_t_test(&pre, &post).expect("test should run");
        assert!(test.p_value < 0.001, "p={} too large", test.p_value);
        assert!(test.t_stat < 0.0, "pre < post should give negative t");
    }

    #[test]
    fn tiny_windows_are_rejected() {
        let err = welch_t_test(&[1.0], &[2.0, 3.0]).expect_err("n=1 must fail");
        assert!(err.to_string().contains("at least 2 observations"));
    }

    #[test]
    fn identical_constant_windows_give_p_one() {
        let test = welch_t_test(&[1.0, 1.0, 1.0], &[1.0, 1.0]).expect("test should run");
        assert_eq!(test.p_value, 1.0);
        assert_eq!(test.t_stat, 0.0);
    }

    #[test]
    fn different_constant_windows_give_p_zero() {
        let test = welch_t_test(&[1.0, 1.0, 1.0], &[2.0, 2.0]).expect("test should run");
        assert_eq!(test.p_value, 0.0);
    }

    #[test]
    fn cohens_d_sign_follows_post_minus_pre() {
        let pre = sample(40, 1.0, 0.3);
        let post = sample(40, 0.2, 0.3);
        let d = cohens_d(&pre, &post).expect("effect size should exist");
        assert!(d < -1.0, "a large drop should give a large negative d, got {d}");
    }

    #[test]
    fn cohens_d_pools_population_variances() {
        let pre = [1.0, 2.0, 3.0];
        let post = [5.0, 6.0, 7.0];
        let d = cohens_d(&pre, &post).expect("effect size should exist");
        // Both population variances are 2/3, so the pooled sd is sqrt(2/3)
        // and d = 4 / sqrt(2/3). The n-1 variant would give exactly 4.
        let expected = 4.0 / (2.0_f64 / 3.0).sqrt();
        assert!((d - expected).abs() < 1e-12, "got {d}");
    }

    #[test]
    fn gate_rejects_noise_and_accepts_separation() {
        let pre = sample(60, 0.0, 1.0);
        let same = sample(60, 0.0, 1.0);
        let shifted = sample(60, 3.0, 0.5);

        let err = assess_significance(&pre, &same, 0.05, 5).expect_err("noise must be rejected");
        assert_eq!(err.code(), "not_significant");

        let report =
            assess_significance(&pre, &shifted, 0.05, 5).expect("separation must be accepted");
        assert!(report.p_value < 0.05);
        assert!(report.cohens_d.is_some());
    }

    #[test]
    fn effect_size_is_withheld_for_small_windows() {
        let pre = vec![0.0, 0.1, -0.1, 0.05, 0.02];
        let post = vec![5.0, 5.1, 4.9, 5.05, 5.02];
        let report = assess_significance(&pre, &post, 0.05, 5)
            .expect("clear separation must be accepted");
        assert!(report.cohens_d.is_none(), "5 <= min window must withhold d");
    }
}
