use stock_forecast::config::{DecompositionCvConfig, ForecastConfig};
use stock_forecast::orchestrator::{ModelChoice, Orchestrator};
use stock_forecast::synthetic::{Scenario, SyntheticSeriesGenerator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Stock Forecast: Model Comparison Example");
    println!("========================================\n");

    // Three years of weekday closes with a yearly and a weekly cycle
    let series = SyntheticSeriesGenerator::new(7)
        .trading_days_only(true)
        .generate(Scenario::Seasonal, 780)?;
    println!(
        "Sample data created: {} closes from {} to {}\n",
        series.len(),
        series.first_date(),
        series.last_date()
    );

    let config = ForecastConfig {
        decomposition_cv: DecompositionCvConfig {
            initial_days: 365,
            step_days: 120,
            horizon_days: 180,
        },
        ..ForecastConfig::default()
    };
    let orchestrator = Orchestrator::new(config)?;
    let period = orchestrator.period(1)?;

    for choice in ModelChoice::ALL {
        let outcome = orchestrator.run_for_period(&series, period, choice)?;
        println!("{} ({})", choice, outcome.model);
        if let (Some(metrics), Some(accuracy)) = (&outcome.metrics, &outcome.accuracy) {
            println!("  Accuracy: {}", accuracy);
            for (label, value) in metrics.rows() {
                println!("  {:<40} {}", label, value);
            }
        }

        // Every 90th day of the forecast year
        for point in outcome.forecast.points().iter().step_by(90) {
            match (point.lower, point.upper) {
                (Some(lower), Some(upper)) => println!(
                    "  {}: {:.2} ({:.2} - {:.2})",
                    point.date, point.value, lower, upper
                ),
                _ => println!("  {}: {:.2}", point.date, point.value),
            }
        }
        println!();
    }

    Ok(())
}
