//! Sampling distribution of the OLS coefficients over repeated samples.

use econsim::demo::OlsDemoConfig;
use econsim::monte_carlo::{MonteCarloConfig, run_study};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = MonteCarloConfig::default()
        .with_base(OlsDemoConfig::default())
        .with_replications(1000);
    let summary = run_study(&config)?;
    println!("{}", summary);

    for c in &summary.coefficients {
        println!("  bias[{}] = {:+.5}", c.name, c.bias());
    }

    Ok(())
}
