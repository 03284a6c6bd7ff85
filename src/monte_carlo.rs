//! Repeated-sample study of the OLS demo.
//!
//! Every replication draws a fresh sample from its own forked generator, so the
//! sampling distribution of the coefficients can be summarised while each
//! replication stays reproducible on its own.

use crate::demo::{OlsDemoConfig, analyze_ols_sample, generate_ols_sample};
use crate::error::{EconSimError, Result};
use crate::generator::SampleGenerator;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;

/// Configuration of a Monte Carlo study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Settings shared by every replication; its seed is the study seed.
    pub base: OlsDemoConfig,
    pub replications: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            base: OlsDemoConfig::default(),
            replications: 500,
        }
    }
}

impl MonteCarloConfig {
    pub fn with_base(mut self, base: OlsDemoConfig) -> Self {
        self.base = base;
        self
    }

    pub fn with_replications(mut self, replications: usize) -> Self {
        self.replications = replications;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.replications < 2 {
            return Err(EconSimError::InvalidParameter(format!(
                "need at least 2 replications, got {}",
                self.replications
            )));
        }
        self.base.validate()
    }
}

/// Sampling distribution of one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSummary {
    pub name: String,
    pub truth: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl CoefficientSummary {
    fn from_draws(name: &str, truth: f64, draws: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            truth,
            mean: draws.iter().mean(),
            std_dev: draws.iter().std_dev(),
            min: Statistics::min(draws.iter()),
            max: Statistics::max(draws.iter()),
        }
    }

    /// Mean minus truth.
    pub fn bias(&self) -> f64 {
        self.mean - self.truth
    }
}

/// What the study found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub replications: usize,
    pub n_obs: usize,
    pub coefficients: Vec<CoefficientSummary>,
    /// Largest scale-free |X'e| statistic over all replications.
    pub worst_orthogonality: f64,
    /// Largest |partial - full| over all replications.
    pub worst_fwl_discrepancy: f64,
    /// Replications whose orthogonality check passed.
    pub orthogonality_passes: usize,
}

impl MonteCarloSummary {
    pub fn all_orthogonal(&self) -> bool {
        self.orthogonality_passes == self.replications
    }
}

impl fmt::Display for MonteCarloSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Monte Carlo: {} replications of n = {}",
            self.replications, self.n_obs
        )?;
        writeln!(
            f,
            "  {:<6} {:>8} {:>10} {:>10} {:>10} {:>10}",
            "", "true", "mean", "sd", "min", "max"
        )?;
        for c in &self.coefficients {
            writeln!(
                f,
                "  {:<6} {:>8.3} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                c.name, c.truth, c.mean, c.std_dev, c.min, c.max
            )?;
        }
        writeln!(
            f,
            "  orthogonality passed in {}/{} (worst {:.3e})",
            self.orthogonality_passes, self.replications, self.worst_orthogonality
        )?;
        write!(
            f,
            "  worst |partial - full| = {:.3e}",
            self.worst_fwl_discrepancy
        )
    }
}

/// Run `config.replications` independent OLS demos and summarise them.
pub fn run_study(config: &MonteCarloConfig) -> Result<MonteCarloSummary> {
    config.validate()?;
    info!(
        "Monte Carlo study: {} replications, n_obs={}, seed={}",
        config.replications, config.base.n_obs, config.base.seed
    );

    let root = SampleGenerator::new(config.base.seed);
    let mut draws: [Vec<f64>; 3] = Default::default();
    let mut worst_orthogonality: f64 = 0.0;
    let mut worst_fwl_discrepancy: f64 = 0.0;
    let mut orthogonality_passes = 0;

    for r in 0..config.replications {
        let mut generator = root.fork(r as u64)?;
        let sample = generate_ols_sample(&mut generator, &config.base)?;
        let report = analyze_ols_sample(&sample, &config.base)?;

        for (j, b) in report.fit.coefficients.iter().enumerate() {
            draws[j].push(*b);
        }
        worst_orthogonality = worst_orthogonality.max(report.orthogonality.max_scaled);
        worst_fwl_discrepancy = worst_fwl_discrepancy.max(report.fwl.discrepancy);
        if report.orthogonality.passed {
            orthogonality_passes += 1;
        }
        debug!(
            "replication {}: coefficients={:?}",
            r,
            report.fit.coefficients.as_slice()
        );
    }

    let truth = config.base.true_coefficients();
    let coefficients = ["const", "x1", "x2"]
        .iter()
        .zip(truth.iter())
        .zip(draws.iter())
        .map(|((name, &t), d)| CoefficientSummary::from_draws(name, t, d))
        .collect();

    Ok(MonteCarloSummary {
        replications: config.replications,
        n_obs: config.base.n_obs,
        coefficients,
        worst_orthogonality,
        worst_fwl_discrepancy,
        orthogonality_passes,
    })
}
