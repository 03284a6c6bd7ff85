//! The two end-to-end procedures: generate, estimate, report.
//!
//! Each procedure is an ordered composition of the functions below and owns
//! every array it creates. Nothing is shared between runs except the config.

use crate::cate::{
    AverageEffect, CateComparison, CateDesign, CateScenario, average_effect, compare_cate,
    simulate_panel,
};
use crate::error::{EconSimError, Result};
use crate::fwl::{FwlComparison, frisch_waugh_lovell};
use crate::generator::SampleGenerator;
use crate::ols::{
    DEFAULT_ORTHOGONALITY_TOLERANCE, OlsFit, OlsInference, OrthogonalityCheck, design_matrix,
    fit_ols,
};
use crate::types::Intercept;
use log::{info, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// OLS orthogonality
// ============================================================================

/// Configuration of the OLS orthogonality demo.
///
/// The data are `y = intercept + beta1 * x1 + beta2 * x2 + noise_sd * eps`
/// with `x2, eps ~ N(0, 1)` and `x1 = z + x1_loading * x2`, `z ~ N(0, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsDemoConfig {
    pub seed: u64,
    pub n_obs: usize,
    pub intercept: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub noise_sd: f64,
    /// Dependence of x1 on x2; zero gives independent regressors.
    pub x1_loading: f64,
    /// Bound on the scale-free orthogonality statistic.
    pub tolerance: f64,
}

impl Default for OlsDemoConfig {
    fn default() -> Self {
        Self {
            seed: 1234,
            n_obs: 1000,
            intercept: 1.0,
            beta1: 1.0,
            beta2: 1.0,
            noise_sd: 1.0,
            x1_loading: 0.0,
            tolerance: DEFAULT_ORTHOGONALITY_TOLERANCE,
        }
    }
}

impl OlsDemoConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_obs(mut self, n_obs: usize) -> Self {
        self.n_obs = n_obs;
        self
    }

    pub fn with_coefficients(mut self, intercept: f64, beta1: f64, beta2: f64) -> Self {
        self.intercept = intercept;
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_noise_sd(mut self, noise_sd: f64) -> Self {
        self.noise_sd = noise_sd;
        self
    }

    pub fn with_x1_loading(mut self, loading: f64) -> Self {
        self.x1_loading = loading;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The coefficients the fit should recover, in design order.
    pub fn true_coefficients(&self) -> [f64; 3] {
        [self.intercept, self.beta1, self.beta2]
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_obs < 4 {
            return Err(EconSimError::InvalidParameter(format!(
                "n_obs must be at least 4 for a three-coefficient fit with inference, got {}",
                self.n_obs
            )));
        }
        let finite = [
            self.intercept,
            self.beta1,
            self.beta2,
            self.noise_sd,
            self.x1_loading,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(EconSimError::InvalidParameter(
                "coefficients, noise_sd and x1_loading must be finite".to_string(),
            ));
        }
        if self.noise_sd < 0.0 {
            return Err(EconSimError::InvalidParameter(format!(
                "noise_sd must be non-negative, got {}",
                self.noise_sd
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(EconSimError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Simulated regressors and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsSample {
    pub x1: Array1<f64>,
    pub x2: Array1<f64>,
    pub y: Array1<f64>,
}

/// Draw one sample. Draw order is z, x2, eps.
pub fn generate_ols_sample(
    generator: &mut SampleGenerator,
    config: &OlsDemoConfig,
) -> Result<OlsSample> {
    config.validate()?;
    let n = config.n_obs;
    let z = generator.standard_normal(n);
    let x2 = generator.standard_normal(n);
    let eps = generator.normal(n, 0.0, config.noise_sd)?;

    let x1 = &z + &(config.x1_loading * &x2);
    let y = config.intercept + config.beta1 * &x1 + config.beta2 * &x2 + &eps;
    Ok(OlsSample { x1, x2, y })
}

/// Everything the OLS demo reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsDemoReport {
    pub config: OlsDemoConfig,
    pub fit: OlsFit,
    pub inference: OlsInference,
    pub orthogonality: OrthogonalityCheck,
    pub fwl: FwlComparison,
}

impl OlsDemoReport {
    /// Largest |b_j - beta_j| over the three coefficients.
    pub fn max_coefficient_error(&self) -> f64 {
        self.fit
            .coefficients
            .iter()
            .zip(self.config.true_coefficients().iter())
            .map(|(b, beta)| (b - beta).abs())
            .fold(0.0, f64::max)
    }
}

/// Fit the full model on a sample and run both checks.
pub fn analyze_ols_sample(sample: &OlsSample, config: &OlsDemoConfig) -> Result<OlsDemoReport> {
    let x = design_matrix(&[sample.x1.view(), sample.x2.view()], Intercept::Included)?;
    let fit = fit_ols(&x.view(), &sample.y.view())?;
    let inference = fit.inference()?;
    let orthogonality = fit.check_orthogonality(&x.view(), &sample.y.view(), config.tolerance)?;
    let fwl = frisch_waugh_lovell(&sample.y.view(), &sample.x1.view(), &sample.x2.view())?;

    if !orthogonality.passed {
        warn!(
            "residuals not orthogonal to the design: max scaled |X'e| = {:e} > {:e}",
            orthogonality.max_scaled, orthogonality.tolerance
        );
    }
    if !fwl.holds(config.tolerance) {
        warn!(
            "partial and full coefficients differ by {:e}",
            fwl.discrepancy
        );
    }

    Ok(OlsDemoReport {
        config: config.clone(),
        fit,
        inference,
        orthogonality,
        fwl,
    })
}

/// Generate, fit and check, from a fresh generator seeded by `config.seed`.
pub fn run_ols_demo(config: &OlsDemoConfig) -> Result<OlsDemoReport> {
    info!(
        "OLS orthogonality demo: seed={}, n_obs={}",
        config.seed, config.n_obs
    );
    let mut generator = SampleGenerator::new(config.seed);
    let sample = generate_ols_sample(&mut generator, config)?;
    analyze_ols_sample(&sample, config)
}

impl fmt::Display for OlsDemoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 3] = ["const", "x1", "x2"];
        writeln!(
            f,
            "OLS y ~ 1 + x1 + x2 (seed = {}, n = {}, R^2 = {:.4})",
            self.config.seed,
            self.fit.n_obs(),
            self.fit.r_squared()
        )?;
        writeln!(
            f,
            "  {:<6} {:>10} {:>10} {:>10} {:>9} {:>10}",
            "", "coef", "true", "std err", "t", "P>|t|"
        )?;
        let truth = self.config.true_coefficients();
        for j in 0..self.fit.n_params() {
            writeln!(
                f,
                "  {:<6} {:>10.4} {:>10.4} {:>10.4} {:>9.2} {:>10.4}",
                NAMES.get(j).copied().unwrap_or("?"),
                self.fit.coefficients[j],
                truth.get(j).copied().unwrap_or(f64::NAN),
                self.inference.standard_errors[j],
                self.inference.t_stats[j],
                self.inference.p_values[j]
            )?;
        }
        writeln!(f, "Orthogonality")?;
        for (j, ip) in self.orthogonality.inner_products.iter().enumerate() {
            writeln!(
                f,
                "  {:<6}'e = {:+.3e}",
                NAMES.get(j).copied().unwrap_or("?"),
                ip
            )?;
        }
        writeln!(f, "  sum(e)   = {:+.3e}", self.orthogonality.residual_sum)?;
        writeln!(
            f,
            "  max scaled = {:.3e} (tolerance {:.0e}): {}",
            self.orthogonality.max_scaled,
            self.orthogonality.tolerance,
            if self.orthogonality.passed { "ok" } else { "FAILED" }
        )?;
        write!(f, "{}", self.fwl)
    }
}

// ============================================================================
// CATE simulation
// ============================================================================

/// Configuration of the CATE simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CateDemoConfig {
    pub seed: u64,
    pub n_obs: usize,
    pub design: CateDesign,
    /// Baseline treatment level.
    pub x1_from: i64,
    /// Contrast treatment level.
    pub x1_to: i64,
    /// Stratum of X2 for the conditional contrast.
    pub x2: i64,
}

impl Default for CateDemoConfig {
    fn default() -> Self {
        Self {
            seed: 1234,
            n_obs: 1_000_000,
            design: CateDesign::default(),
            x1_from: 1,
            x1_to: 2,
            x2: 1,
        }
    }
}

impl CateDemoConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_obs(mut self, n_obs: usize) -> Self {
        self.n_obs = n_obs;
        self
    }

    pub fn with_design(mut self, design: CateDesign) -> Self {
        self.design = design;
        self
    }

    pub fn with_contrast(mut self, x1_from: i64, x1_to: i64, x2: i64) -> Self {
        self.x1_from = x1_from;
        self.x1_to = x1_to;
        self.x2 = x2;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_obs == 0 {
            return Err(EconSimError::InvalidParameter(
                "n_obs must be positive".to_string(),
            ));
        }
        if self.x1_from == self.x1_to {
            return Err(EconSimError::InvalidParameter(format!(
                "contrast needs two distinct treatment levels, got {} twice",
                self.x1_from
            )));
        }
        self.design.validate()
    }
}

/// Result of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CateReport {
    pub scenario: CateScenario,
    pub n_obs: usize,
    pub conditional: CateComparison,
    pub average: AverageEffect,
}

impl fmt::Display for CateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {} (n = {})", self.scenario, self.n_obs)?;
        writeln!(f, "  {}", self.conditional)?;
        writeln!(
            f,
            "  analytic omitted-factor bias = {:+.4}",
            self.conditional.analytic_bias
        )?;
        write!(
            f,
            "  ATE over X2: estimate = {:.4}, truth = {:.4}, discrepancy = {:+.4}",
            self.average.estimate, self.average.true_effect, self.average.discrepancy
        )
    }
}

/// Simulate one scenario and compare its effects with the truth.
///
/// The generator is freshly seeded from `config.seed`, and X1, X2 are drawn
/// before omega, so both scenarios share the same treatment and covariate
/// columns and differ only in omega and the noise.
pub fn run_cate_demo(config: &CateDemoConfig, scenario: CateScenario) -> Result<CateReport> {
    config.validate()?;
    info!(
        "CATE demo ({}): seed={}, n_obs={}",
        scenario, config.seed, config.n_obs
    );
    let mut generator = SampleGenerator::new(config.seed);
    let panel = simulate_panel(&mut generator, config.n_obs, &config.design, scenario)?;

    let conditional = compare_cate(
        &panel,
        &config.design,
        config.x1_from,
        config.x1_to,
        config.x2,
    )?;
    let average = average_effect(&panel, &config.design, config.x1_from, config.x1_to)?;

    Ok(CateReport {
        scenario,
        n_obs: config.n_obs,
        conditional,
        average,
    })
}

/// Run the confounded scenario, then the conditionally independent one.
pub fn run_cate_demos(config: &CateDemoConfig) -> Result<Vec<CateReport>> {
    [
        CateScenario::Confounded,
        CateScenario::ConditionallyIndependent,
    ]
    .into_iter()
    .map(|scenario| run_cate_demo(config, scenario))
    .collect()
}
