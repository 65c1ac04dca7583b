//! Command-line front end: load a daily price history, forecast it, and print the
//! forecast together with its backtest metrics.

use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::process::ExitCode;
use stock_forecast::orchestrator::{LogObserver, ModelChoice, Orchestrator};
use stock_forecast::provider::{validate_ticker, CsvDirectoryProvider, MarketDataProvider};
use stock_forecast::synthetic::{Scenario, SyntheticSeriesGenerator};
use stock_forecast::{DataLoader, ForecastConfig, ForecastOutcome, PriceSeries, Result};

#[derive(Parser)]
#[command(name = "stock_forecast")]
#[command(about = "Forecast daily closing prices and report backtest accuracy", long_about = None)]
struct Cli {
    /// CSV file with a date column and a close column
    #[arg(long, conflicts_with_all = ["data_dir", "demo"])]
    csv: Option<PathBuf>,

    /// Directory holding <TICKER>.csv (and optional <TICKER>.json) files
    #[arg(long, requires = "ticker")]
    data_dir: Option<PathBuf>,

    /// Ticker symbol to load from --data-dir
    #[arg(long)]
    ticker: Option<String>,

    /// Forecast a synthetic series generated from this seed
    #[arg(long, conflicts_with = "data_dir")]
    demo: Option<u64>,

    /// Forecast period in years
    #[arg(short, long, default_value_t = 1)]
    years: u32,

    /// Model: decomposition (prophet) or autoregressive (arima)
    #[arg(short, long, default_value = "decomposition")]
    model: String,

    /// JSON configuration file (defaults to stock_forecast.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Write the forecast to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn load_series(cli: &Cli) -> Result<(String, PriceSeries)> {
    if let Some(path) = &cli.csv {
        let series = DataLoader::from_csv(path)?;
        return Ok((path.display().to_string(), series));
    }

    if let (Some(dir), Some(input)) = (&cli.data_dir, &cli.ticker) {
        let provider = CsvDirectoryProvider::new(dir);
        let (ticker, series) = validate_ticker(&provider, input)?;
        let info = provider.info(&ticker)?;
        info.ensure_forecastable()?;
        return Ok((info.display_name().to_string(), series));
    }

    let seed = cli.demo.unwrap_or(42);
    let series = SyntheticSeriesGenerator::new(seed)
        .trading_days_only(true)
        .generate(Scenario::Seasonal, 1500)?;
    Ok((format!("synthetic series (seed {})", seed), series))
}

fn print_outcome(name: &str, outcome: &ForecastOutcome) {
    println!("{} - {}", name, outcome.model);
    match (&outcome.metrics, &outcome.accuracy) {
        (Some(metrics), Some(accuracy)) => {
            println!("Accuracy: {}", accuracy);
            print!("{}", metrics);
        }
        _ => {
            if let Some(warning) = &outcome.warning {
                println!("No accuracy available: {}", warning);
            }
        }
    }

    println!();
    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12}",
        "Date", "Forecast", "Trend", "Lower", "Upper"
    );
    let cell = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string());
    for point in outcome.forecast.points() {
        println!(
            "{:<12} {:>12.2} {:>12} {:>12} {:>12}",
            point.date.format("%Y-%m-%d"),
            point.value,
            cell(point.trend),
            cell(point.lower),
            cell(point.upper)
        );
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ForecastConfig::from_file(path)?,
        None => ForecastConfig::load(),
    };
    let orchestrator = Orchestrator::new(config)?.with_observer(LogObserver);
    let choice: ModelChoice = cli.model.parse()?;
    let period = orchestrator.period(cli.years)?;

    let (name, series) = load_series(&cli)?;
    log::info!(
        "Loaded {} observations for {} ({} to {})",
        series.len(),
        name,
        series.first_date(),
        series.last_date()
    );

    let outcome = orchestrator.run_for_period(&series, period, choice)?;

    if let Some(path) = &cli.output {
        outcome.forecast.save_csv(path)?;
        log::info!("Forecast written to {}", path.display());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&name, &outcome);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
