//! Partialling-out regressions (Frisch-Waugh-Lovell).
//!
//! Regressing y on the part of x1 not explained by the controls recovers the
//! same x1 coefficient as the full multivariate regression. The short
//! regression of y on x1 alone generally does not, unless x1 and the controls
//! are uncorrelated in sample.

use crate::error::{EconSimError, Result};
use crate::ols::{OlsFit, design_matrix, fit_ols};
use crate::types::Intercept;
use log::debug;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Residual of `target` after regressing it on `controls`.
pub fn partial_out(
    target: &ArrayView1<f64>,
    controls: &[ArrayView1<f64>],
    intercept: Intercept,
) -> Result<Array1<f64>> {
    if controls.is_empty() && !intercept.is_included() {
        return Ok(target.to_owned());
    }
    let x = if controls.is_empty() {
        design_matrix(&[Array1::ones(target.len()).view()], Intercept::Excluded)?
    } else {
        design_matrix(controls, intercept)?
    };
    Ok(fit_ols(&x.view(), target)?.residuals)
}

/// Coefficient from the no-intercept regression of y on a single regressor.
pub fn slope_through_origin(y: &ArrayView1<f64>, r: &ArrayView1<f64>) -> Result<f64> {
    let x = design_matrix(&[r.view()], Intercept::Excluded)?;
    Ok(fit_ols(&x.view(), y)?.coefficients[0])
}

/// The three ways of estimating the effect of x1 on y, side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FwlComparison {
    /// y on the residual of x1 ~ (1, x2), without intercept.
    pub partial_coefficient: f64,
    /// Coefficient on x1 in y ~ (1, x1, x2).
    pub full_coefficient: f64,
    /// Coefficient on x1 in y ~ (1, x1).
    pub short_coefficient: f64,
    /// |partial - full|.
    pub discrepancy: f64,
    /// Sample correlation of x1 and x2.
    pub regressor_correlation: f64,
}

impl FwlComparison {
    /// Whether partialling out reproduced the full coefficient.
    pub fn holds(&self, tolerance: f64) -> bool {
        self.discrepancy <= tolerance * self.full_coefficient.abs().max(1.0)
    }
}

impl fmt::Display for FwlComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frisch-Waugh-Lovell check")?;
        writeln!(f, "  partial (y ~ r)       : {:.6}", self.partial_coefficient)?;
        writeln!(f, "  full (y ~ 1 + x1 + x2): {:.6}", self.full_coefficient)?;
        writeln!(f, "  short (y ~ 1 + x1)    : {:.6}", self.short_coefficient)?;
        writeln!(f, "  |partial - full|      : {:.3e}", self.discrepancy)?;
        write!(f, "  corr(x1, x2)          : {:.4}", self.regressor_correlation)
    }
}

/// Run the partial, full and short regressions of y on x1 (controlling for x2).
pub fn frisch_waugh_lovell(
    y: &ArrayView1<f64>,
    x1: &ArrayView1<f64>,
    x2: &ArrayView1<f64>,
) -> Result<FwlComparison> {
    if x1.len() != y.len() {
        return Err(EconSimError::length_mismatch(y.len(), x1.len()));
    }
    if x2.len() != y.len() {
        return Err(EconSimError::length_mismatch(y.len(), x2.len()));
    }

    // Full fit first: if x1 is collinear with (1, x2) only its X'X is flagged,
    // the auxiliary residual is just rounding noise.
    let full = design_matrix(&[x1.view(), x2.view()], Intercept::Included)?;
    let full_coefficient = fit_ols(&full.view(), y)?.coefficients[1];

    let r = partial_out(x1, &[x2.view()], Intercept::Included)?;
    let partial_coefficient = slope_through_origin(y, &r.view())?;

    let short = design_matrix(&[x1.view()], Intercept::Included)?;
    let short_coefficient = fit_ols(&short.view(), y)?.coefficients[1];

    let discrepancy = (partial_coefficient - full_coefficient).abs();
    debug!(
        "FWL: partial={:.8}, full={:.8}, short={:.8}, discrepancy={:e}",
        partial_coefficient, full_coefficient, short_coefficient, discrepancy
    );

    Ok(FwlComparison {
        partial_coefficient,
        full_coefficient,
        short_coefficient,
        discrepancy,
        regressor_correlation: correlation(x1, x2),
    })
}

/// Auxiliary regression fit of x1 on (1, x2), for callers that want the whole fit.
pub fn auxiliary_fit(x1: &ArrayView1<f64>, x2: &ArrayView1<f64>) -> Result<OlsFit> {
    let x = design_matrix(&[x2.view()], Intercept::Included)?;
    fit_ols(&x.view(), x1)
}

fn correlation(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        sab += da * db;
        saa += da * da;
        sbb += db * db;
    }
    if saa > 0.0 && sbb > 0.0 {
        sab / (saa * sbb).sqrt()
    } else {
        0.0
    }
}
