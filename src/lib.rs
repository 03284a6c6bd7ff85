//! # econsim
//!
//! Simulation demos of two textbook results in econometrics:
//!
//! - **OLS orthogonality**: least-squares residuals are orthogonal to every
//!   column of the design, including the constant, and partialling out a
//!   control reproduces the full-regression coefficient (Frisch-Waugh-Lovell).
//! - **Conditional average treatment effects**: a difference of conditional
//!   means recovers the causal effect only when the treatment is independent
//!   of the unobserved factor given the conditioning variable.
//!
//! Every draw goes through an explicit [`generator::SampleGenerator`], so a
//! run is reproducible from its seed alone.
//!
//! ## Example
//!
//! ```no_run
//! use econsim::demo::{CateDemoConfig, OlsDemoConfig, run_cate_demos, run_ols_demo};
//!
//! let report = run_ols_demo(&OlsDemoConfig::default())?;
//! println!("{}", report);
//!
//! for report in run_cate_demos(&CateDemoConfig::default())? {
//!     println!("{}", report);
//! }
//! # Ok::<(), econsim::error::EconSimError>(())
//! ```

pub mod cate;
pub mod conditional;
pub mod demo;
pub mod error;
pub mod fwl;
pub mod generator;
pub mod monte_carlo;
pub mod ols;
pub mod types;

pub mod prelude {
    //! Convenient re-exports of commonly used types.
    pub use crate::cate::{
        AverageEffect, CateComparison, CateDesign, CatePanel, CateScenario, average_effect,
        compare_cate, simulate_panel,
    };
    pub use crate::conditional::{CellSummary, ConditionalSubset, conditional_mean};
    pub use crate::demo::{
        CateDemoConfig, CateReport, OlsDemoConfig, OlsDemoReport, OlsSample, analyze_ols_sample,
        generate_ols_sample, run_cate_demo, run_cate_demos, run_ols_demo,
    };
    pub use crate::error::{EconSimError, Result};
    pub use crate::fwl::{FwlComparison, frisch_waugh_lovell, partial_out};
    pub use crate::generator::SampleGenerator;
    pub use crate::monte_carlo::{MonteCarloConfig, MonteCarloSummary, run_study};
    pub use crate::ols::{
        DEFAULT_ORTHOGONALITY_TOLERANCE, OlsFit, OlsInference, OrthogonalityCheck, design_matrix,
        fit_ols,
    };
    pub use crate::types::{CellKey, DiscreteSupport, Intercept};
}
