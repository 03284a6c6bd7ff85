//! Ordinary least squares.
//!
//! The estimator takes the SVD of the design with every column scaled to unit
//! norm, so the rank decision does not depend on the units of the regressors.
//! The same decomposition gives (X'X)^-1 for classical inference. The fit
//! carries its residual vector so the defining property of OLS, X'e = 0, can be
//! checked directly against the design it came from.

use crate::error::{EconSimError, Result};
use crate::types::Intercept;
use log::debug;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;

/// Default bound on the scale-free orthogonality statistic.
pub const DEFAULT_ORTHOGONALITY_TOLERANCE: f64 = 1e-8;

/// Singular values of the unit-norm design below this fraction of the largest
/// count as zero.
pub const RANK_TOLERANCE: f64 = 1e-10;

/// Stack regressor columns into an N x k design matrix.
///
/// With [`Intercept::Included`] a column of ones is placed first, so the
/// intercept is always coefficient 0.
pub fn design_matrix(columns: &[ArrayView1<f64>], intercept: Intercept) -> Result<Array2<f64>> {
    let n_obs = match columns.first() {
        Some(c) => c.len(),
        None if intercept.is_included() => {
            return Err(EconSimError::InvalidInput(
                "cannot infer the number of rows from an intercept alone".to_string(),
            ));
        }
        None => {
            return Err(EconSimError::InvalidInput(
                "design matrix needs at least one column".to_string(),
            ));
        }
    };
    if let Some(bad) = columns.iter().find(|c| c.len() != n_obs) {
        return Err(EconSimError::length_mismatch(n_obs, bad.len()));
    }

    let offset = usize::from(intercept.is_included());
    let mut x = Array2::zeros((n_obs, columns.len() + offset));
    if intercept.is_included() {
        x.column_mut(0).fill(1.0);
    }
    for (j, column) in columns.iter().enumerate() {
        x.column_mut(j + offset).assign(column);
    }
    Ok(x)
}

/// Result of a least-squares fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsFit {
    /// Estimated coefficients, in design-matrix column order.
    pub coefficients: Array1<f64>,
    /// e = y - X b.
    pub residuals: Array1<f64>,
    /// X b.
    pub fitted: Array1<f64>,
    /// Whether one design column is identically one.
    pub has_intercept: bool,
    xtx_inv: Array2<f64>,
}

/// Fit y on the columns of `x` by least squares.
///
/// Fails with [`EconSimError::SingularMatrix`] when X'X is not invertible,
/// which includes every design with fewer rows than columns.
pub fn fit_ols(x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<OlsFit> {
    let (n_obs, n_params) = x.dim();
    if y.len() != n_obs {
        return Err(EconSimError::length_mismatch(n_obs, y.len()));
    }
    if n_params == 0 {
        return Err(EconSimError::InvalidInput(
            "design matrix has no columns".to_string(),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(EconSimError::InvalidInput(
            "design matrix and response must be finite".to_string(),
        ));
    }

    let (coefficients, xtx_inv) = solve_least_squares(x, y)?;

    let fitted = x.dot(&coefficients);
    let residuals = y - &fitted;
    let has_intercept = x
        .axis_iter(Axis(1))
        .any(|col| col.iter().all(|&v| v == 1.0));

    debug!(
        "OLS fit: n_obs={}, n_params={}, intercept={}, coefficients={:?}",
        n_obs,
        n_params,
        has_intercept,
        coefficients.as_slice()
    );

    Ok(OlsFit {
        coefficients,
        residuals,
        fitted,
        has_intercept,
        xtx_inv,
    })
}

/// Coefficients and (X'X)^-1 from one SVD of the column-equilibrated design.
///
/// With X = Z D, D = diag(||x_j||) and Z = U S V', the coefficients are
/// D^-1 V S^-1 U'y and (X'X)^-1 = D^-1 V S^-2 V' D^-1.
fn solve_least_squares(
    x: &ArrayView2<f64>,
    y: &ArrayView1<f64>,
) -> Result<(Array1<f64>, Array2<f64>)> {
    let (n_obs, n_params) = x.dim();
    if n_obs < n_params {
        return Err(EconSimError::SingularMatrix {
            rank: n_obs,
            n_params,
        });
    }

    let norms: Vec<f64> = x.axis_iter(Axis(1)).map(|c| c.dot(&c).sqrt()).collect();
    let z = DMatrix::from_fn(n_obs, n_params, |i, j| {
        if norms[j] > 0.0 { x[[i, j]] / norms[j] } else { 0.0 }
    });
    let rhs = DVector::from_iterator(n_obs, y.iter().copied());

    let svd = z.svd(true, true);
    let s = &svd.singular_values;
    let threshold = RANK_TOLERANCE * s.max();
    let rank = s.iter().filter(|&&v| v > threshold).count();
    if rank < n_params {
        debug!(
            "rank-deficient design: singular values {:?}, threshold {:e}",
            s.as_slice(),
            threshold
        );
        return Err(EconSimError::SingularMatrix { rank, n_params });
    }

    let scaled = svd
        .solve(&rhs, threshold)
        .map_err(|e| EconSimError::InvalidInput(e.to_string()))?;
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| EconSimError::InvalidInput("SVD did not return V'".to_string()))?;

    let coefficients = Array1::from_shape_fn(n_params, |j| scaled[j] / norms[j]);
    let xtx_inv = Array2::from_shape_fn((n_params, n_params), |(a, b)| {
        let vsv: f64 = (0..n_params)
            .map(|r| v_t[(r, a)] * v_t[(r, b)] / (s[r] * s[r]))
            .sum();
        vsv / (norms[a] * norms[b])
    });
    Ok((coefficients, xtx_inv))
}

impl OlsFit {
    pub fn n_obs(&self) -> usize {
        self.residuals.len()
    }

    pub fn n_params(&self) -> usize {
        self.coefficients.len()
    }

    /// X'e, one inner product per design column.
    pub fn orthogonality(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.dim() != (self.n_obs(), self.n_params()) {
            return Err(EconSimError::ShapeMismatch {
                expected_shape: format!("({}, {})", self.n_obs(), self.n_params()),
                actual_shape: format!("{:?}", x.dim()),
            });
        }
        Ok(x.t().dot(&self.residuals))
    }

    /// Sum of the residuals; zero up to rounding when an intercept is present.
    pub fn residual_sum(&self) -> f64 {
        self.residuals.sum()
    }

    pub fn residual_sum_of_squares(&self) -> f64 {
        self.residuals.dot(&self.residuals)
    }

    /// Coefficient of determination.
    ///
    /// Centered when the design has an intercept, uncentered otherwise.
    pub fn r_squared(&self) -> f64 {
        let y = &self.fitted + &self.residuals;
        let tss = if self.has_intercept {
            let mean = y.mean().unwrap_or(0.0);
            y.mapv(|v| (v - mean).powi(2)).sum()
        } else {
            y.dot(&y)
        };
        if tss > 0.0 {
            1.0 - self.residual_sum_of_squares() / tss
        } else {
            0.0
        }
    }

    /// Compare |x_j'e| with tolerance, scaled by ||x_j|| ||y||.
    ///
    /// By Cauchy-Schwarz the scaled statistic lies in [0, 1] for any data, so a
    /// single tolerance works whatever the units of y and X.
    pub fn check_orthogonality(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
        tolerance: f64,
    ) -> Result<OrthogonalityCheck> {
        if y.len() != self.n_obs() {
            return Err(EconSimError::length_mismatch(self.n_obs(), y.len()));
        }
        let inner_products = self.orthogonality(x)?;
        let y_norm = y.dot(y).sqrt();
        let scaled: Array1<f64> = inner_products
            .iter()
            .zip(x.axis_iter(Axis(1)))
            .map(|(&ip, col)| {
                let denom = col.dot(&col).sqrt() * y_norm;
                if denom > 0.0 {
                    ip.abs() / denom
                } else {
                    ip.abs()
                }
            })
            .collect();
        let max_scaled = scaled.iter().cloned().fold(0.0, f64::max);
        let residual_sum = self.residual_sum();
        let residual_sum_scaled = if self.has_intercept {
            let denom = (self.n_obs() as f64).sqrt() * y_norm;
            if denom > 0.0 {
                residual_sum.abs() / denom
            } else {
                residual_sum.abs()
            }
        } else {
            0.0
        };
        let passed = max_scaled <= tolerance && residual_sum_scaled <= tolerance;

        debug!(
            "orthogonality check: max scaled |X'e| = {:e}, scaled sum(e) = {:e}, passed = {}",
            max_scaled, residual_sum_scaled, passed
        );

        Ok(OrthogonalityCheck {
            inner_products,
            scaled,
            max_scaled,
            residual_sum,
            tolerance,
            passed,
        })
    }

    /// Classical (homoskedastic) standard errors, t statistics and p-values.
    pub fn inference(&self) -> Result<OlsInference> {
        let n_obs = self.n_obs();
        let n_params = self.n_params();
        if n_obs <= n_params {
            return Err(EconSimError::InsufficientDegreesOfFreedom { n_obs, n_params });
        }
        let df = (n_obs - n_params) as f64;
        let sigma2 = self.residual_sum_of_squares() / df;

        let standard_errors: Array1<f64> = self
            .xtx_inv
            .diag()
            .mapv(|v| (sigma2 * v.max(0.0)).sqrt());
        let t_stats: Array1<f64> = self
            .coefficients
            .iter()
            .zip(standard_errors.iter())
            .map(|(&b, &se)| if se > 0.0 { b / se } else { f64::INFINITY })
            .collect();

        let t_dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| EconSimError::Distribution(e.to_string()))?;
        let p_values = t_stats.mapv(|t| {
            if t.is_finite() {
                2.0 * (1.0 - t_dist.cdf(t.abs()))
            } else {
                0.0
            }
        });
        let critical = t_dist.inverse_cdf(0.975);
        let ci_lower = &self.coefficients - &(&standard_errors * critical);
        let ci_upper = &self.coefficients + &(&standard_errors * critical);

        Ok(OlsInference {
            degrees_of_freedom: n_obs - n_params,
            sigma2,
            standard_errors,
            t_stats,
            p_values,
            ci_lower,
            ci_upper,
        })
    }
}

impl fmt::Display for OlsFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "OLS: n = {}, k = {}, R^2 = {:.4}",
            self.n_obs(),
            self.n_params(),
            self.r_squared()
        )?;
        for (j, b) in self.coefficients.iter().enumerate() {
            writeln!(f, "  b[{}] = {:>10.6}", j, b)?;
        }
        Ok(())
    }
}

/// Outcome of [`OlsFit::check_orthogonality`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrthogonalityCheck {
    /// Raw x_j'e.
    pub inner_products: Array1<f64>,
    /// |x_j'e| / (||x_j|| ||y||).
    pub scaled: Array1<f64>,
    pub max_scaled: f64,
    pub residual_sum: f64,
    pub tolerance: f64,
    pub passed: bool,
}

/// Sampling-theory summary of a fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsInference {
    pub degrees_of_freedom: usize,
    /// Residual variance e'e / (n - k).
    pub sigma2: f64,
    pub standard_errors: Array1<f64>,
    pub t_stats: Array1<f64>,
    /// Two-sided p-values for H0: b_j = 0.
    pub p_values: Array1<f64>,
    /// 95% confidence bounds.
    pub ci_lower: Array1<f64>,
    pub ci_upper: Array1<f64>,
}
