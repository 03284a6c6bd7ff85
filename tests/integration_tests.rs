//! Integration tests for econsim.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use econsim::prelude::*;
use ndarray::{Array1, array};

fn fit_with_intercept(columns: &[Array1<f64>], y: &Array1<f64>) -> (ndarray::Array2<f64>, OlsFit) {
    let views: Vec<_> = columns.iter().map(|c| c.view()).collect();
    let x = design_matrix(&views, Intercept::Included).unwrap();
    let fit = fit_ols(&x.view(), &y.view()).unwrap();
    (x, fit)
}

#[test]
fn test_residuals_orthogonal_for_many_designs() {
    for seed in [1_u64, 2, 3, 42, 1234] {
        let mut generator = SampleGenerator::new(seed);
        let x1 = generator.standard_normal(300);
        let x2 = generator.normal(300, 5.0, 3.0).unwrap();
        // Arbitrary, non-linear response: orthogonality does not need a true model.
        let y = x1.mapv(|v| v.powi(3)) + x2.mapv(f64::sin) + generator.standard_normal(300);

        let (x, fit) = fit_with_intercept(&[x1, x2], &y);
        let check = fit
            .check_orthogonality(&x.view(), &y.view(), DEFAULT_ORTHOGONALITY_TOLERANCE)
            .unwrap();

        assert!(check.passed, "seed {}: max scaled = {:e}", seed, check.max_scaled);
        assert_eq!(check.inner_products.len(), 3);
    }
}

#[test]
fn test_orthogonality_is_scale_free() {
    let mut generator = SampleGenerator::new(5);
    let x1 = generator.standard_normal(500);
    let y = 1e6 * (&x1 + &generator.standard_normal(500));

    let (x, fit) = fit_with_intercept(&[x1], &y);
    let check = fit
        .check_orthogonality(&x.view(), &y.view(), DEFAULT_ORTHOGONALITY_TOLERANCE)
        .unwrap();

    assert!(check.passed);
    // The raw residual sum grows with the scale of y; the scaled statistic does not.
    assert!(check.max_scaled < 1e-10);
}

#[test]
fn test_residuals_sum_to_zero_with_intercept() {
    let mut generator = SampleGenerator::new(9);
    let x1 = generator.standard_normal(1000);
    let y = 10.0 + 0.5 * &x1 + &generator.standard_normal(1000);

    let (_, fit) = fit_with_intercept(&[x1], &y);
    assert_abs_diff_eq!(fit.residual_sum(), 0.0, epsilon = 1e-8);
}

#[test]
fn test_residuals_need_not_sum_to_zero_without_intercept() {
    let x = array![[1.0], [2.0], [3.0]];
    let y = array![3.0, 3.0, 3.0];
    let fit = fit_ols(&x.view(), &y.view()).unwrap();

    assert!(!fit.has_intercept);
    assert!(fit.residual_sum().abs() > 0.1);
    // Still orthogonal to the one column there is.
    assert_abs_diff_eq!(fit.orthogonality(&x.view()).unwrap()[0], 0.0, epsilon = 1e-12);
}

#[test]
fn test_reference_scenario_recovers_coefficients() {
    // seed = 1234, N = 1000, y = 1 + x1 + x2 + eps
    let report = run_ols_demo(&OlsDemoConfig::default()).unwrap();

    assert_eq!(report.fit.n_obs(), 1000);
    assert_relative_eq!(report.fit.coefficients[0], 1.0, epsilon = 0.1);
    assert_relative_eq!(report.fit.coefficients[1], 1.0, epsilon = 0.1);
    assert_relative_eq!(report.fit.coefficients[2], 1.0, epsilon = 0.1);
    assert!(report.orthogonality.passed);
    assert_abs_diff_eq!(report.orthogonality.residual_sum, 0.0, epsilon = 1e-8);
}

#[test]
fn test_frisch_waugh_lovell_equivalence() {
    let report = run_ols_demo(&OlsDemoConfig::default()).unwrap();

    assert_relative_eq!(
        report.fwl.partial_coefficient,
        report.fit.coefficients[1],
        epsilon = 1e-9
    );
    assert_relative_eq!(
        report.fwl.full_coefficient,
        report.fit.coefficients[1],
        epsilon = 1e-12
    );
}

#[test]
fn test_manual_partialling_out() {
    let mut generator = SampleGenerator::new(31);
    let x2 = generator.standard_normal(400);
    let x1 = 0.5 * &x2 + &generator.standard_normal(400);
    let y = -2.0 + 3.0 * &x1 - &x2 + &generator.standard_normal(400);

    let r = partial_out(&x1.view(), &[x2.view()], Intercept::Included).unwrap();
    let on_residual = fit_ols(
        &design_matrix(&[r.view()], Intercept::Excluded).unwrap().view(),
        &y.view(),
    )
    .unwrap();
    let (_, full) = fit_with_intercept(&[x1, x2], &y);

    assert_relative_eq!(
        on_residual.coefficients[0],
        full.coefficients[1],
        epsilon = 1e-9
    );
}

#[test]
fn test_singular_design_is_fatal() {
    let mut generator = SampleGenerator::new(4);
    let x1 = generator.standard_normal(50);
    let x2 = 3.0 * &x1;
    let y = generator.standard_normal(50);

    let x = design_matrix(&[x1.view(), x2.view()], Intercept::Included).unwrap();
    let err = fit_ols(&x.view(), &y.view()).unwrap_err();
    assert!(matches!(err, EconSimError::SingularMatrix { .. }));
    assert!(err.to_string().starts_with("Singular matrix"));

    // FWL surfaces the same failure from its full regression.
    assert!(matches!(
        frisch_waugh_lovell(&y.view(), &x1.view(), &x2.view()),
        Err(EconSimError::SingularMatrix { .. })
    ));
}

#[test]
fn test_cate_confounded_scenario_is_biased() {
    let report = run_cate_demo(&CateDemoConfig::default(), CateScenario::Confounded).unwrap();

    assert_relative_eq!(report.conditional.true_effect, 0.1, epsilon = 1e-12);
    // The contrast picks up E[omega | X1 = 2] - E[omega | X1 = 1] = 3.
    assert!(report.conditional.discrepancy.abs() > 1.0);
    assert_relative_eq!(report.conditional.estimate, 3.1, epsilon = 0.05);
    assert!(!report.conditional.covers_truth());
}

#[test]
fn test_cate_conditionally_independent_scenario_recovers_truth() {
    let report = run_cate_demo(
        &CateDemoConfig::default(),
        CateScenario::ConditionallyIndependent,
    )
    .unwrap();

    assert_eq!(report.n_obs, 1_000_000);
    assert_relative_eq!(report.conditional.estimate, 0.1, epsilon = 0.02);
    assert_relative_eq!(report.average.estimate, 0.1, epsilon = 0.02);
    assert_relative_eq!(report.conditional.analytic_bias, 0.0);
}

#[test]
fn test_cate_cell_sizes_follow_design() {
    let config = CateDemoConfig::default().with_n_obs(100_000);
    let report = run_cate_demo(&config, CateScenario::ConditionallyIndependent).unwrap();

    // Pr(X1 = 1, X2 = 1) = 0.2, Pr(X1 = 2, X2 = 1) = 0.3
    assert_relative_eq!(report.conditional.n_from as f64 / 1e5, 0.2, epsilon = 0.01);
    assert_relative_eq!(report.conditional.n_to as f64 / 1e5, 0.3, epsilon = 0.01);
}

#[test]
fn test_empty_subset_at_small_n() {
    // With a single unit at least one of the two cells must be empty.
    let config = CateDemoConfig::default().with_n_obs(1);
    let err = run_cate_demo(&config, CateScenario::Confounded).unwrap_err();
    assert!(matches!(err, EconSimError::EmptySubset { .. }));
}

#[test]
fn test_conditional_mean_on_simulated_panel() {
    let mut generator = SampleGenerator::new(64);
    let design = CateDesign::default().with_noise_sd(0.0);
    let panel = simulate_panel(
        &mut generator,
        50_000,
        &design,
        CateScenario::Confounded,
    )
    .unwrap();

    // Without noise, Y | X1 = 2, X2 = 0 is 0.2 + 4 +- 1.
    let m = conditional_mean(&panel.y.view(), &panel.x1.view(), &panel.x2.view(), 2, 0).unwrap();
    assert_relative_eq!(m, 4.2, epsilon = 0.05);
}

#[test]
fn test_same_seed_same_statistics() {
    let ols = OlsDemoConfig::default();
    let a = run_ols_demo(&ols).unwrap();
    let b = run_ols_demo(&ols).unwrap();
    assert_eq!(a.fit.coefficients, b.fit.coefficients);
    assert_eq!(a.inference.standard_errors, b.inference.standard_errors);

    let cate = CateDemoConfig::default().with_n_obs(20_000);
    let a = run_cate_demos(&cate).unwrap();
    let b = run_cate_demos(&cate).unwrap();
    for (ra, rb) in a.iter().zip(b.iter()) {
        assert_eq!(ra.conditional.estimate, rb.conditional.estimate);
        assert_eq!(ra.average.estimate, rb.average.estimate);
    }
}

#[test]
fn test_different_seeds_differ() {
    let a = run_ols_demo(&OlsDemoConfig::default().with_seed(1)).unwrap();
    let b = run_ols_demo(&OlsDemoConfig::default().with_seed(2)).unwrap();
    assert_ne!(a.fit.coefficients, b.fit.coefficients);
}

#[test]
fn test_reports_serialize() {
    let report = run_ols_demo(&OlsDemoConfig::default().with_n_obs(50)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["config"]["seed"], 1234);
    assert!(json["fwl"]["partial_coefficient"].is_number());

    let config: CateDemoConfig =
        serde_json::from_str(&serde_json::to_string(&CateDemoConfig::default()).unwrap())
            .unwrap();
    assert_eq!(config, CateDemoConfig::default());
}

#[test]
fn test_monte_carlo_study() {
    let config = MonteCarloConfig::default()
        .with_base(OlsDemoConfig::default().with_n_obs(100))
        .with_replications(50);
    let summary = run_study(&config).unwrap();

    assert_eq!(summary.replications, 50);
    assert!(summary.all_orthogonal());
    assert!(summary.worst_fwl_discrepancy < 1e-8);
    for c in &summary.coefficients {
        assert_relative_eq!(c.mean, 1.0, epsilon = 0.1);
    }
}
