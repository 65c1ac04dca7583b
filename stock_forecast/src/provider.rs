//! Market data access
//!
//! The forecasting core never talks to a market data service directly: it asks a
//! [`MarketDataProvider`] for a [`PriceSeries`] and optional [`TickerInfo`]. The bundled
//! [`CsvDirectoryProvider`] serves exported files from a directory.

use crate::data::{DataLoader, PriceSeries};
use crate::error::{ForecastError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// First date requested when loading a full history
pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default()
}

/// Source of daily price histories and ticker metadata
pub trait MarketDataProvider {
    /// Daily bars for `ticker` dated within `[start, end]`. An empty result is an
    /// [`ForecastError::ExternalDataError`].
    fn history(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries>;

    /// Descriptive metadata; fields the provider does not know stay `None`
    fn info(&self, ticker: &str) -> Result<TickerInfo>;
}

/// Ticker metadata. Key names follow the common quote-summary JSON layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TickerInfo {
    pub symbol: String,
    pub long_name: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    /// EQUITY, ETF, FUTURE, OPTION, CURRENCY, ...
    pub quote_type: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub beta: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub total_revenue: Option<f64>,
    pub full_time_employees: Option<u64>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

const NOT_AVAILABLE: &str = "N/A";

fn billions(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v != 0.0 => format!("${:.*}B", decimals, v / 1e9),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn price(value: Option<f64>) -> String {
    value
        .map(|v| format!("${:.2}", v))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn plain<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

impl TickerInfo {
    /// Metadata carrying only the symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Long name, falling back to the symbol
    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.symbol)
    }

    /// Futures and options expire long before a multi-year forecast ends
    pub fn ensure_forecastable(&self) -> Result<()> {
        match self.quote_type.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("FUTURE") | Some("OPTION") => Err(ForecastError::InputError(format!(
                "{} is a {} contract; long-horizon forecasts need an instrument that does not expire",
                self.symbol,
                self.quote_type.as_deref().unwrap_or_default().to_ascii_lowercase()
            ))),
            _ => Ok(()),
        }
    }

    /// `(label, value)` rows for display; unknown values read "N/A"
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Company Name", plain(self.long_name.clone())),
            ("Country", plain(self.country.clone())),
            ("Sector", plain(self.sector.clone())),
            ("Industry", plain(self.industry.clone())),
            ("Market Cap", billions(self.market_cap, 1)),
            ("Enterprise Value", billions(self.enterprise_value, 1)),
            ("Beta", plain(self.beta)),
            ("Shares Outstanding", plain(self.shares_outstanding)),
            ("Revenue (TTM)", billions(self.total_revenue, 2)),
            ("Employees", plain(self.full_time_employees)),
            ("Current Price", price(self.current_price)),
            ("Previous Close", price(self.previous_close)),
            ("52 Week High", price(self.fifty_two_week_high)),
            ("52 Week Low", price(self.fifty_two_week_low)),
        ]
    }
}

/// Trim, reject empty or multi-symbol input, uppercase
pub fn normalize_ticker(input: &str) -> Result<String> {
    let symbols: Vec<&str> = input.split_whitespace().collect();
    match symbols.as_slice() {
        [] => Err(ForecastError::InputError(
            "Please enter a ticker".to_string(),
        )),
        [symbol] => Ok(symbol.to_uppercase()),
        _ => Err(ForecastError::InputError(format!(
            "Please provide only one ticker, got {}",
            symbols.len()
        ))),
    }
}

/// Full history from [`default_start`] to today
pub fn load_history<P: MarketDataProvider + ?Sized>(provider: &P, ticker: &str) -> Result<PriceSeries> {
    provider.history(ticker, default_start(), Local::now().date_naive())
}

/// Normalise `input` and check the provider has data for it.
/// Returns the symbol with its full history.
pub fn validate_ticker<P: MarketDataProvider + ?Sized>(
    provider: &P,
    input: &str,
) -> Result<(String, PriceSeries)> {
    let ticker = normalize_ticker(input)?;
    let history = load_history(provider, &ticker).map_err(|e| match e {
        ForecastError::ExternalDataError(_) => {
            ForecastError::ExternalDataError(format!("Invalid ticker {}", ticker))
        }
        other => other,
    })?;
    Ok((ticker, history))
}

/// Serves `<dir>/<TICKER>.csv` histories and optional `<dir>/<TICKER>.json` metadata
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, ticker: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", ticker, extension))
    }
}

impl MarketDataProvider for CsvDirectoryProvider {
    fn history(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries> {
        let path = self.path(ticker, "csv");
        if !path.exists() {
            return Err(ForecastError::ExternalDataError(format!(
                "No price file for {} in {}",
                ticker,
                self.dir.display()
            )));
        }
        log::debug!("Loading {} history from {}", ticker, path.display());
        let series = DataLoader::from_csv(&path)?;
        series.between(start, end).map_err(|e| match e {
            ForecastError::ExternalDataError(_) => ForecastError::ExternalDataError(format!(
                "No {} prices between {} and {}",
                ticker, start, end
            )),
            other => other,
        })
    }

    fn info(&self, ticker: &str) -> Result<TickerInfo> {
        let path = self.path(ticker, "json");
        if !path.exists() {
            return Ok(TickerInfo::new(ticker));
        }
        let content = fs::read_to_string(&path)?;
        let mut info: TickerInfo = serde_json::from_str(&content)?;
        if info.symbol.is_empty() {
            info.symbol = ticker.to_string();
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_ticker("btc=f").unwrap(), "BTC=F");
        assert!(normalize_ticker("AAPL MSFT").is_err());
        assert!(normalize_ticker("   ").is_err());
    }

    #[test]
    fn test_csv_directory_provider() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "ACME.csv",
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2017-12-29,9,10,8,9.5,9.5,100\n\
             2018-01-02,10,11,9,10.5,10.5,120\n\
             2018-01-03,11,12,10,11.5,11.5,130\n",
        );
        write_file(
            dir.path(),
            "ACME.json",
            r#"{ "longName": "Acme Corp", "quoteType": "EQUITY", "marketCap": 2500000000 }"#,
        );
        let provider = CsvDirectoryProvider::new(dir.path());

        let end = NaiveDate::from_ymd_opt(2018, 12, 31).unwrap();
        let series = provider.history("ACME", default_start(), end).unwrap();
        assert_eq!(series.closes(), vec![10.5, 11.5]);

        let info = provider.info("ACME").unwrap();
        assert_eq!(info.symbol, "ACME");
        assert_eq!(info.display_name(), "Acme Corp");
        assert!(info.ensure_forecastable().is_ok());
        assert!(info.rows().contains(&("Market Cap", "$2.5B".to_string())));
        assert!(info.rows().contains(&("Sector", "N/A".to_string())));

        let missing = provider.history("NOPE", default_start(), end);
        assert!(matches!(missing, Err(ForecastError::ExternalDataError(_))));
        assert_eq!(provider.info("NOPE").unwrap().display_name(), "NOPE");
    }

    #[test]
    fn test_futures_are_not_forecastable() {
        let info = TickerInfo {
            quote_type: Some("FUTURE".to_string()),
            ..TickerInfo::new("CL=F")
        };
        assert!(matches!(
            info.ensure_forecastable(),
            Err(ForecastError::InputError(_))
        ));
    }
}
