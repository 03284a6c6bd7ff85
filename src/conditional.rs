//! Conditional sample means over discrete covariates.

use crate::error::{EconSimError, Result};
use crate::types::CellKey;
use log::warn;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Rows of an outcome vector that match a conjunction of equality predicates.
///
/// The subset borrows the outcome; it only owns the matching row indices.
#[derive(Debug, Clone)]
pub struct ConditionalSubset<'a> {
    outcome: ArrayView1<'a, f64>,
    indices: Vec<usize>,
    key: CellKey,
}

impl<'a> ConditionalSubset<'a> {
    /// Select rows where every `(name, covariate, target)` predicate holds.
    ///
    /// An empty predicate list selects every row.
    pub fn select(
        outcome: ArrayView1<'a, f64>,
        predicates: &[(&str, ArrayView1<'_, i64>, i64)],
    ) -> Result<Self> {
        let n = outcome.len();
        if let Some((_, covariate, _)) = predicates.iter().find(|(_, c, _)| c.len() != n) {
            return Err(EconSimError::length_mismatch(n, covariate.len()));
        }

        let indices = (0..n)
            .filter(|&i| predicates.iter().all(|(_, c, target)| c[i] == *target))
            .collect();
        let key = CellKey::new(predicates.iter().map(|(name, _, target)| (*name, *target)));

        Ok(Self {
            outcome,
            indices,
            key,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn key(&self) -> &CellKey {
        &self.key
    }

    /// Matching outcome values, in row order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.indices.iter().map(move |&i| self.outcome[i])
    }

    /// Sample mean of the matching rows.
    pub fn mean(&self) -> Result<f64> {
        if self.is_empty() {
            warn!("conditional mean requested on empty cell {}", self.key);
            return Err(self.empty_error());
        }
        Ok(self.values().sum::<f64>() / self.len() as f64)
    }

    /// Unbiased sample variance of the matching rows.
    pub fn variance(&self) -> Result<f64> {
        if self.len() < 2 {
            if self.is_empty() {
                return Err(self.empty_error());
            }
            return Err(EconSimError::InsufficientDegreesOfFreedom {
                n_obs: self.len(),
                n_params: 1,
            });
        }
        let mean = self.mean()?;
        let ss: f64 = self.values().map(|v| (v - mean).powi(2)).sum();
        Ok(ss / (self.len() - 1) as f64)
    }

    /// Mean, size and variance in one value; the variance is absent for a singleton.
    pub fn summary(&self) -> Result<CellSummary> {
        Ok(CellSummary {
            key: self.key.clone(),
            count: self.len(),
            mean: self.mean()?,
            variance: self.variance().ok(),
        })
    }

    fn empty_error(&self) -> EconSimError {
        EconSimError::EmptySubset {
            condition: self.key.to_string(),
        }
    }
}

/// Snapshot of one conditioning cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    pub key: CellKey,
    pub count: usize,
    pub mean: f64,
    pub variance: Option<f64>,
}

/// Mean of `y` over rows with `x1 == x1_target` and `x2 == x2_target`.
///
/// Fails with [`EconSimError::EmptySubset`] rather than returning NaN when no
/// row matches.
pub fn conditional_mean(
    y: &ArrayView1<f64>,
    x1: &ArrayView1<i64>,
    x2: &ArrayView1<i64>,
    x1_target: i64,
    x2_target: i64,
) -> Result<f64> {
    ConditionalSubset::select(
        y.view(),
        &[("x1", x1.view(), x1_target), ("x2", x2.view(), x2_target)],
    )?
    .mean()
}
