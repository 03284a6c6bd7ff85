//! Conditional average treatment effects under two joint laws.
//!
//! Outcomes follow
//!
//! ```text
//! Y = tau * X1 + gamma * X2 + omega + sigma * eps,    eps ~ N(0, 1)
//! ```
//!
//! where X1 is the treatment, X2 the observed conditioning variable and omega
//! an unobserved factor. The true effect of moving X1 from x1 to x1' at any
//! X2 = x2 is `tau * (x1' - x1)`. Comparing conditional means recovers it only
//! when omega is independent of X1 given X2.

use crate::conditional::ConditionalSubset;
use crate::error::{EconSimError, Result};
use crate::generator::SampleGenerator;
use crate::types::DiscreteSupport;
use log::{debug, info};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal as StatNormal};
use std::fmt;

/// How the unobserved factor omega relates to the treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CateScenario {
    /// omega = X1^2 + c, c = +-1 with equal probability.
    Confounded,
    /// omega drawn from its own law, independent of (X1, X2).
    ConditionallyIndependent,
}

impl fmt::Display for CateScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CateScenario::Confounded => write!(f, "confounded"),
            CateScenario::ConditionallyIndependent => write!(f, "conditionally independent"),
        }
    }
}

/// Parameters of the data-generating process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CateDesign {
    /// Law of the treatment X1.
    pub treatment: DiscreteSupport,
    /// Law of the conditioning variable X2.
    pub covariate: DiscreteSupport,
    /// Law of omega in the conditionally independent scenario.
    pub independent_factor: DiscreteSupport,
    /// Per-unit effect of X1 on Y.
    pub tau: f64,
    /// Effect of X2 on Y.
    pub gamma: f64,
    /// Standard deviation of the idiosyncratic noise.
    pub noise_sd: f64,
}

impl Default for CateDesign {
    fn default() -> Self {
        Self {
            treatment: DiscreteSupport::new(vec![1, 2], vec![0.4, 0.6]),
            covariate: DiscreteSupport::bernoulli(0.5),
            independent_factor: DiscreteSupport::new(vec![0, 2, 3, 5], vec![0.2, 0.2, 0.3, 0.3]),
            tau: 0.1,
            gamma: 1.0,
            noise_sd: 1.0,
        }
    }
}

impl CateDesign {
    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_noise_sd(mut self, noise_sd: f64) -> Self {
        self.noise_sd = noise_sd;
        self
    }

    pub fn with_treatment(mut self, treatment: DiscreteSupport) -> Self {
        self.treatment = treatment;
        self
    }

    pub fn with_covariate(mut self, covariate: DiscreteSupport) -> Self {
        self.covariate = covariate;
        self
    }

    pub fn with_independent_factor(mut self, factor: DiscreteSupport) -> Self {
        self.independent_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, support) in [
            ("treatment", &self.treatment),
            ("covariate", &self.covariate),
            ("independent_factor", &self.independent_factor),
        ] {
            support
                .validate()
                .map_err(|msg| EconSimError::InvalidParameter(format!("{}: {}", name, msg)))?;
        }
        if !self.tau.is_finite() || !self.gamma.is_finite() {
            return Err(EconSimError::InvalidParameter(
                "tau and gamma must be finite".to_string(),
            ));
        }
        if !self.noise_sd.is_finite() || self.noise_sd < 0.0 {
            return Err(EconSimError::InvalidParameter(format!(
                "noise_sd must be finite and non-negative, got {}",
                self.noise_sd
            )));
        }
        Ok(())
    }

    /// Analytic effect of moving X1 from `from` to `to`, at any X2.
    pub fn true_effect(&self, from: i64, to: i64) -> f64 {
        self.tau * (to - from) as f64
    }

    /// E[omega | X1 = to, X2] - E[omega | X1 = from, X2] under `scenario`.
    ///
    /// This is exactly the bias of the naive conditional-mean contrast.
    pub fn omitted_factor_bias(&self, scenario: CateScenario, from: i64, to: i64) -> f64 {
        match scenario {
            CateScenario::Confounded => (to * to - from * from) as f64,
            CateScenario::ConditionallyIndependent => 0.0,
        }
    }
}

/// One simulated sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatePanel {
    pub scenario: CateScenario,
    pub y: Array1<f64>,
    pub x1: Array1<i64>,
    pub x2: Array1<i64>,
    pub omega: Array1<f64>,
}

impl CatePanel {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Draw `n_obs` units from `design` under `scenario`.
///
/// Draw order is X1, X2, omega, noise, so a fixed seed fixes every column.
pub fn simulate_panel(
    generator: &mut SampleGenerator,
    n_obs: usize,
    design: &CateDesign,
    scenario: CateScenario,
) -> Result<CatePanel> {
    design.validate()?;

    let x1 = generator.categorical(n_obs, &design.treatment)?;
    let x2 = generator.categorical(n_obs, &design.covariate)?;
    let omega: Array1<f64> = match scenario {
        CateScenario::Confounded => {
            let c = generator.rademacher(n_obs);
            x1.iter()
                .zip(c.iter())
                .map(|(&t, &c)| (t * t + c) as f64)
                .collect()
        }
        CateScenario::ConditionallyIndependent => generator
            .categorical(n_obs, &design.independent_factor)?
            .mapv(|v| v as f64),
    };
    let noise = generator.normal(n_obs, 0.0, design.noise_sd)?;

    let y: Array1<f64> = (0..n_obs)
        .map(|i| {
            design.tau * x1[i] as f64 + design.gamma * x2[i] as f64 + omega[i] + noise[i]
        })
        .collect();

    info!(
        "simulated {} scenario: n_obs={}, seed={}",
        scenario,
        n_obs,
        generator.seed()
    );

    Ok(CatePanel {
        scenario,
        y,
        x1,
        x2,
        omega,
    })
}

/// Empirical conditional effect next to the analytic truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CateComparison {
    pub x1_from: i64,
    pub x1_to: i64,
    pub x2: i64,
    pub n_from: usize,
    pub n_to: usize,
    /// E_n[Y | x1', x2] - E_n[Y | x1, x2].
    pub estimate: f64,
    pub true_effect: f64,
    /// estimate - true_effect.
    pub discrepancy: f64,
    /// Bias implied by the joint law of (X1, omega).
    pub analytic_bias: f64,
    /// Standard error of the difference of means, when both cells have two rows.
    pub standard_error: Option<f64>,
    /// Normal-approximation 95% interval around `estimate`.
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

impl CateComparison {
    /// Whether the truth lies inside the 95% interval.
    pub fn covers_truth(&self) -> bool {
        match (self.ci_lower, self.ci_upper) {
            (Some(lo), Some(hi)) => lo <= self.true_effect && self.true_effect <= hi,
            _ => false,
        }
    }
}

impl fmt::Display for CateComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CATE x1: {} -> {} | x2 = {}: estimate = {:.4}, truth = {:.4}, discrepancy = {:+.4}",
            self.x1_from, self.x1_to, self.x2, self.estimate, self.true_effect, self.discrepancy
        )?;
        if let (Some(lo), Some(hi)) = (self.ci_lower, self.ci_upper) {
            write!(f, ", 95% CI [{:.4}, {:.4}]", lo, hi)?;
        }
        write!(f, " (n = {} / {})", self.n_from, self.n_to)
    }
}

/// Difference of conditional means for X1 = `to` vs X1 = `from` at X2 = `x2`.
pub fn compare_cate(
    panel: &CatePanel,
    design: &CateDesign,
    from: i64,
    to: i64,
    x2: i64,
) -> Result<CateComparison> {
    let cell_from = ConditionalSubset::select(
        panel.y.view(),
        &[("x1", panel.x1.view(), from), ("x2", panel.x2.view(), x2)],
    )?;
    let cell_to = ConditionalSubset::select(
        panel.y.view(),
        &[("x1", panel.x1.view(), to), ("x2", panel.x2.view(), x2)],
    )?;

    let estimate = cell_to.mean()? - cell_from.mean()?;
    let true_effect = design.true_effect(from, to);

    let standard_error = match (cell_from.variance(), cell_to.variance()) {
        (Ok(v_from), Ok(v_to)) => {
            Some((v_from / cell_from.len() as f64 + v_to / cell_to.len() as f64).sqrt())
        }
        _ => None,
    };
    let z = StatNormal::new(0.0, 1.0)
        .map_err(|e| EconSimError::Distribution(e.to_string()))?
        .inverse_cdf(0.975);

    let comparison = CateComparison {
        x1_from: from,
        x1_to: to,
        x2,
        n_from: cell_from.len(),
        n_to: cell_to.len(),
        estimate,
        true_effect,
        discrepancy: estimate - true_effect,
        analytic_bias: design.omitted_factor_bias(panel.scenario, from, to),
        standard_error,
        ci_lower: standard_error.map(|se| estimate - z * se),
        ci_upper: standard_error.map(|se| estimate + z * se),
    };
    debug!("{}", comparison);
    Ok(comparison)
}

/// CATEs across every observed X2 stratum, averaged with empirical weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AverageEffect {
    pub estimate: f64,
    pub true_effect: f64,
    pub discrepancy: f64,
    pub strata: Vec<CateComparison>,
}

/// Average the stratum CATEs over the empirical distribution of X2.
///
/// Strata of the covariate support that were never drawn carry no weight;
/// a drawn stratum missing one of the treatment arms is an
/// [`EconSimError::EmptySubset`].
pub fn average_effect(
    panel: &CatePanel,
    design: &CateDesign,
    from: i64,
    to: i64,
) -> Result<AverageEffect> {
    design.validate()?;
    if panel.is_empty() {
        return Err(EconSimError::EmptySubset {
            condition: "<all rows>".to_string(),
        });
    }
    let n = panel.len() as f64;
    let mut strata = Vec::new();
    let mut estimate = 0.0;
    for &x2 in &design.covariate.values {
        let count = panel.x2.iter().filter(|&&v| v == x2).count();
        if count == 0 {
            continue;
        }
        let cmp = compare_cate(panel, design, from, to, x2)?;
        estimate += cmp.estimate * count as f64 / n;
        strata.push(cmp);
    }
    let true_effect = design.true_effect(from, to);
    Ok(AverageEffect {
        estimate,
        true_effect,
        discrepancy: estimate - true_effect,
        strata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_design_matches_reference_setup() {
        let design = CateDesign::default();
        assert!(design.validate().is_ok());
        assert_relative_eq!(design.true_effect(1, 2), 0.1, epsilon = 1e-12);
        assert_relative_eq!(design.treatment.probability_of(1), 0.4);
        assert_relative_eq!(design.covariate.probability_of(1), 0.5);
    }

    #[test]
    fn test_confounded_omega_tracks_treatment() {
        let mut generator = SampleGenerator::new(3);
        let panel =
            simulate_panel(&mut generator, 2_000, &CateDesign::default(), CateScenario::Confounded)
                .unwrap();

        for (&t, &w) in panel.x1.iter().zip(panel.omega.iter()) {
            let base = (t * t) as f64;
            assert!(w == base - 1.0 || w == base + 1.0);
        }
    }

    #[test]
    fn test_independent_omega_support() {
        let mut generator = SampleGenerator::new(3);
        let panel = simulate_panel(
            &mut generator,
            2_000,
            &CateDesign::default(),
            CateScenario::ConditionallyIndependent,
        )
        .unwrap();
        assert!(panel
            .omega
            .iter()
            .all(|&w| w == 0.0 || w == 2.0 || w == 3.0 || w == 5.0));
    }

    #[test]
    fn test_noiseless_independent_design_is_exact_within_cells() {
        // With no noise and a degenerate omega, every cell mean is its structural value.
        let design = CateDesign::default()
            .with_noise_sd(0.0)
            .with_independent_factor(DiscreteSupport::new(vec![4], vec![1.0]));
        let mut generator = SampleGenerator::new(10);
        let panel = simulate_panel(
            &mut generator,
            500,
            &design,
            CateScenario::ConditionallyIndependent,
        )
        .unwrap();

        let cmp = compare_cate(&panel, &design, 1, 2, 1).unwrap();
        assert_relative_eq!(cmp.estimate, 0.1, epsilon = 1e-12);
        assert_relative_eq!(cmp.discrepancy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_confounded_bias_matches_analytic_value() {
        let mut generator = SampleGenerator::new(77);
        let design = CateDesign::default();
        let panel =
            simulate_panel(&mut generator, 100_000, &design, CateScenario::Confounded).unwrap();

        let cmp = compare_cate(&panel, &design, 1, 2, 0).unwrap();
        assert_relative_eq!(cmp.analytic_bias, 3.0);
        assert_relative_eq!(cmp.estimate, 0.1 + 3.0, epsilon = 0.05);
        assert!(!cmp.covers_truth());
    }

    #[test]
    fn test_empty_cell_surfaces() {
        let design = CateDesign::default();
        let mut generator = SampleGenerator::new(1);
        let panel =
            simulate_panel(&mut generator, 50, &design, CateScenario::Confounded).unwrap();

        // X2 only takes values 0 and 1.
        let err = compare_cate(&panel, &design, 1, 2, 7).unwrap_err();
        assert!(matches!(err, EconSimError::EmptySubset { .. }));
    }

    #[test]
    fn test_invalid_design_rejected() {
        let design = CateDesign::default().with_noise_sd(-1.0);
        let mut generator = SampleGenerator::new(1);
        assert!(matches!(
            simulate_panel(&mut generator, 10, &design, CateScenario::Confounded),
            Err(EconSimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_average_effect_weights_strata() {
        let mut generator = SampleGenerator::new(21);
        let design = CateDesign::default();
        let panel = simulate_panel(
            &mut generator,
            200_000,
            &design,
            CateScenario::ConditionallyIndependent,
        )
        .unwrap();

        let ate = average_effect(&panel, &design, 1, 2).unwrap();
        assert_eq!(ate.strata.len(), 2);
        assert_relative_eq!(ate.estimate, 0.1, epsilon = 0.05);

        let lo = ate.strata.iter().map(|s| s.estimate).fold(f64::INFINITY, f64::min);
        let hi = ate
            .strata
            .iter()
            .map(|s| s.estimate)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(lo <= ate.estimate && ate.estimate <= hi);
    }

    #[test]
    fn test_average_effect_rejects_repeated_strata() {
        let mut generator = SampleGenerator::new(21);
        let design = CateDesign::default();
        let panel = simulate_panel(
            &mut generator,
            1_000,
            &design,
            CateScenario::ConditionallyIndependent,
        )
        .unwrap();

        // Stratum 1 listed twice would be weighted twice.
        let repeated = design.with_covariate(DiscreteSupport::new(
            vec![0, 1, 1],
            vec![0.5, 0.25, 0.25],
        ));
        assert!(matches!(
            average_effect(&panel, &repeated, 1, 2),
            Err(EconSimError::InvalidParameter(_))
        ));
    }
}
