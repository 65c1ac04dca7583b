//! Daily price series and loading them from provider-style tables

use crate::error::{ForecastError, Result};
use crate::utils::parse_date;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One trading day. Only `date` and `close` are required by the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceBar {
    /// A bar carrying only a date and a close
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: None,
        }
    }
}

/// Validated daily price series: ascending dates, no duplicates, finite closes.
///
/// Read-only once built; the forecasters only ever borrow it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from bars in any order.
    ///
    /// An empty input means the provider had nothing for the request and is reported
    /// as an external data error rather than an input error.
    pub fn new(mut bars: Vec<PriceBar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(ForecastError::ExternalDataError(
                "The price series is empty".to_string(),
            ));
        }

        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite()) {
            return Err(ForecastError::InputError(format!(
                "Close value on {} is not a finite number",
                bad.date
            )));
        }

        bars.sort_by_key(|b| b.date);
        if let Some(pair) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ForecastError::InputError(format!(
                "Duplicate date {} in price series",
                pair[0].date
            )));
        }

        Ok(Self { bars })
    }

    /// Build a close-only series from parallel date and value vectors
    pub fn from_closes(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self> {
        if dates.len() != closes.len() {
            return Err(ForecastError::InputError(format!(
                "Dates length ({}) doesn't match closes length ({})",
                dates.len(),
                closes.len()
            )));
        }
        Self::new(
            dates
                .into_iter()
                .zip(closes)
                .map(|(d, c)| PriceBar::close_only(d, c))
                .collect(),
        )
    }

    /// Close-only series on consecutive calendar days starting at `start`
    pub fn daily(start: NaiveDate, closes: Vec<f64>) -> Result<Self> {
        let dates = (0..closes.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Self::from_closes(dates, closes)
    }

    /// Copy keeping only date and close
    pub fn close_only(&self) -> Self {
        Self {
            bars: self
                .bars
                .iter()
                .map(|b| PriceBar::close_only(b.date, b.close))
                .collect(),
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Rows `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.bars.len() {
            return Err(ForecastError::InputError(format!(
                "Invalid slice {}..{} of a series with {} rows",
                start,
                end,
                self.bars.len()
            )));
        }
        Ok(Self {
            bars: self.bars[start..end].to_vec(),
        })
    }

    /// All rows dated on or before `cutoff`
    pub fn until(&self, cutoff: NaiveDate) -> Result<Self> {
        let end = self.bars.partition_point(|b| b.date <= cutoff);
        if end == 0 {
            return Err(ForecastError::InputError(format!(
                "No observations on or before {}",
                cutoff
            )));
        }
        self.slice(0, end)
    }

    /// All rows dated within `[start, end]`
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let bars: Vec<PriceBar> = self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        Self::new(bars)
    }
}

/// Data loader for provider-style price tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a price series from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<PriceSeries> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(Some(100))
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Create a price series from an existing DataFrame
    pub fn from_dataframe(df: DataFrame) -> Result<PriceSeries> {
        if df.height() == 0 {
            return Err(ForecastError::ExternalDataError(
                "The provider returned an empty table".to_string(),
            ));
        }

        let time_column = Self::detect_time_column(&df)?;
        let close_column = Self::find_column(&df, &["close"])
            .or_else(|| Self::find_column(&df, &["price"]))
            .ok_or_else(|| {
                ForecastError::InputError("No close price column found in data".to_string())
            })?;

        let dates = Self::column_as_dates(&df, &time_column)?;
        let closes = Self::column_as_f64(&df, &close_column)?;
        let optional = |names: &[&str]| -> Result<Vec<Option<f64>>> {
            match Self::find_column(&df, names) {
                Some(name) => Self::column_as_f64(&df, &name),
                None => Ok(vec![None; df.height()]),
            }
        };
        let opens = optional(&["open"])?;
        let highs = optional(&["high"])?;
        let lows = optional(&["low"])?;
        let adj_closes = optional(&["adjclose", "adjustedclose"])?;
        let volumes = optional(&["volume", "vol"])?;

        let mut bars = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let close = closes[i].ok_or_else(|| {
                ForecastError::InputError(format!(
                    "Close value on {} is missing or not numeric",
                    dates[i]
                ))
            })?;
            bars.push(PriceBar {
                date: dates[i],
                open: opens[i],
                high: highs[i],
                low: lows[i],
                close,
                adj_close: adj_closes[i],
                volume: volumes[i],
            });
        }

        PriceSeries::new(bars)
    }

    /// Detect the time column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("date") || lower_name.contains("time") || lower_name == "ds" {
                return Ok(name.to_string());
            }
        }

        // If not found, use the first column if it is temporal
        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(ForecastError::InputError(
            "No date column found in data".to_string(),
        ))
    }

    /// First column whose normalised name (lowercase, alphanumerics only) equals one
    /// of `candidates`
    fn find_column(df: &DataFrame, candidates: &[&str]) -> Option<String> {
        df.get_column_names()
            .into_iter()
            .find(|name| {
                let normalised: String = name
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_lowercase();
                candidates.contains(&normalised.as_str())
            })
            .map(|name| name.to_string())
    }

    fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<Option<f64>>> {
        let series = df.column(column_name)?.cast(&DataType::Float64)?;
        let values = series.f64()?;
        Ok(values.into_iter().collect())
    }

    fn column_as_dates(df: &DataFrame, column_name: &str) -> Result<Vec<NaiveDate>> {
        let series = df.column(column_name)?.cast(&DataType::Utf8)?;
        let values = series.utf8()?;
        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(text) => parse_date(text),
                None => Err(ForecastError::InputError(format!(
                    "Missing date in row {}",
                    row
                ))),
            })
            .collect()
    }
}
