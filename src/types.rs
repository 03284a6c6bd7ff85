//! Small shared data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a design matrix carries a leading column of ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intercept {
    /// Prepend a constant column.
    Included,
    /// Use the regressors as given.
    Excluded,
}

impl Intercept {
    pub fn is_included(&self) -> bool {
        matches!(self, Intercept::Included)
    }
}

/// A finite support with its probabilities, e.g. the law of a discrete covariate.
///
/// Values and probabilities are index-aligned. Probabilities must be
/// non-negative and sum to one (within `1e-9`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteSupport {
    pub values: Vec<i64>,
    pub probabilities: Vec<f64>,
}

impl DiscreteSupport {
    pub fn new(values: Vec<i64>, probabilities: Vec<f64>) -> Self {
        Self {
            values,
            probabilities,
        }
    }

    /// Two-point support {0, 1} with `Pr(1) = p`.
    pub fn bernoulli(p: f64) -> Self {
        Self::new(vec![0, 1], vec![1.0 - p, p])
    }

    /// Expected value of the variable.
    pub fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(self.probabilities.iter())
            .map(|(&v, &p)| v as f64 * p)
            .sum()
    }

    /// Probability of a single support point (zero when absent).
    pub fn probability_of(&self, value: i64) -> f64 {
        self.values
            .iter()
            .zip(self.probabilities.iter())
            .filter(|(v, _)| **v == value)
            .map(|(_, &p)| p)
            .sum()
    }

    /// Check that the support is non-empty, aligned, duplicate-free and sums to one.
    pub fn validate(&self) -> Result<(), String> {
        if self.values.is_empty() {
            return Err("support must contain at least one value".to_string());
        }
        if let Some((i, v)) = self
            .values
            .iter()
            .enumerate()
            .find(|(i, v)| self.values[..*i].contains(v))
        {
            return Err(format!("value {} is listed twice (position {})", v, i));
        }
        if self.values.len() != self.probabilities.len() {
            return Err(format!(
                "{} values but {} probabilities",
                self.values.len(),
                self.probabilities.len()
            ));
        }
        if let Some(p) = self
            .probabilities
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0)
        {
            return Err(format!("probability {} is not a valid weight", p));
        }
        let total: f64 = self.probabilities.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(format!("probabilities sum to {}, expected 1", total));
        }
        Ok(())
    }
}

/// A conjunction of equality predicates, kept for error messages and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellKey(pub Vec<(String, i64)>);

impl CellKey {
    pub fn new<S: Into<String>>(pairs: impl IntoIterator<Item = (S, i64)>) -> Self {
        CellKey(pairs.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<all rows>");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| format!("{}=={}", name, value))
            .collect();
        write!(f, "{}", parts.join(" && "))
    }
}
