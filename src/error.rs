//! Error types for econsim.

use ndarray::ShapeError;
use thiserror::Error;

/// Result type alias for econsim operations.
pub type Result<T> = std::result::Result<T, EconSimError>;

/// Errors that can occur while generating samples or estimating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconSimError {
    /// X'X is not invertible (perfect collinearity or fewer rows than columns).
    #[error("Singular matrix: design has rank {rank} but {n_params} columns")]
    SingularMatrix { rank: usize, n_params: usize },
    /// A conditioning predicate matched no rows.
    #[error("Empty subset: no rows match {condition}")]
    EmptySubset { condition: String },
    /// Shape mismatch in arrays.
    #[error("Shape mismatch: expected {expected_shape}, got {actual_shape}")]
    ShapeMismatch {
        expected_shape: String,
        actual_shape: String,
    },
    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),
    /// Invalid parameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Residual-based inference needs more observations than coefficients.
    #[error("Insufficient degrees of freedom: {n_obs} observations for {n_params} parameters")]
    InsufficientDegreesOfFreedom { n_obs: usize, n_params: usize },
    /// A sampling or reference distribution could not be constructed.
    #[error("Distribution error: {0}")]
    Distribution(String),
}

impl EconSimError {
    /// Shorthand for a length mismatch between two vectors.
    pub(crate) fn length_mismatch(expected: usize, actual: usize) -> Self {
        EconSimError::ShapeMismatch {
            expected_shape: format!("length {}", expected),
            actual_shape: format!("length {}", actual),
        }
    }
}

impl From<ShapeError> for EconSimError {
    fn from(err: ShapeError) -> Self {
        EconSimError::ShapeMismatch {
            expected_shape: "unknown".to_string(),
            actual_shape: err.to_string(),
        }
    }
}

impl From<rand_distr::NormalError> for EconSimError {
    fn from(err: rand_distr::NormalError) -> Self {
        EconSimError::Distribution(err.to_string())
    }
}

impl From<rand::distr::weighted::Error> for EconSimError {
    fn from(err: rand::distr::weighted::Error) -> Self {
        EconSimError::Distribution(err.to_string())
    }
}

impl From<rand::distr::BernoulliError> for EconSimError {
    fn from(err: rand::distr::BernoulliError) -> Self {
        EconSimError::Distribution(err.to_string())
    }
}
