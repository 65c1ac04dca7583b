//! Forecasting models for daily price series

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{calculate_metrics, MetricsReport};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    /// Point forecast
    pub value: f64,
    /// Lower bound of the uncertainty interval
    pub lower: Option<f64>,
    /// Upper bound of the uncertainty interval
    pub upper: Option<f64>,
    /// Trend component of `value`
    pub trend: Option<f64>,
    /// Sum of the seasonal components of `value`
    pub additive_terms: Option<f64>,
}

impl ForecastPoint {
    /// A bare point forecast without components or interval
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            lower: None,
            upper: None,
            trend: None,
            additive_terms: None,
        }
    }
}

/// Forecast result: one point per calendar day, in date order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Name of the model that produced the forecast
    model: String,
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(model: impl Into<String>, points: Vec<ForecastPoint>) -> Result<Self> {
        if let Some(pair) = points.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(ForecastError::InputError(format!(
                "Forecast dates must be strictly increasing ({} is followed by {})",
                pair[0].date, pair[1].date
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(ForecastError::ModelFittingError(format!(
                "Forecast for {} is not a finite number",
                bad.date
            )));
        }

        Ok(Self {
            model: model.into(),
            points,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Number of forecast days
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the forecasted values
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// `(lower, upper)` per point, if every point carries an interval
    pub fn intervals(&self) -> Option<Vec<(f64, f64)>> {
        self.points
            .iter()
            .map(|p| Some((p.lower?, p.upper?)))
            .collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as CSV with the columns `date,value,trend,lower,upper,additive_terms`.
    /// Missing components are left empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["date", "value", "trend", "lower", "upper", "additive_terms"])?;
        let optional = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        for p in &self.points {
            wtr.write_record([
                p.date.format("%Y-%m-%d").to_string(),
                p.value.to_string(),
                optional(p.trend),
                optional(p.lower),
                optional(p.upper),
                optional(p.additive_terms),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the CSV form to a file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_csv(file)
    }
}

/// One held-out observation from a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvRecord {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// Last training date of the fold that produced the prediction
    pub cutoff: NaiveDate,
}

/// Paired actual and predicted values collected over all backtest folds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationTable {
    records: Vec<CvRecord>,
}

impl CrossValidationTable {
    pub fn new(records: Vec<CvRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CvRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn actuals(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.actual).collect()
    }

    pub fn predictions(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.predicted).collect()
    }

    /// Distinct fold cutoffs in ascending order
    pub fn cutoffs(&self) -> Vec<NaiveDate> {
        let mut cutoffs: Vec<NaiveDate> = self.records.iter().map(|r| r.cutoff).collect();
        cutoffs.sort();
        cutoffs.dedup();
        cutoffs
    }

    /// MAPE, MAE and RMSE over every record
    pub fn metrics(&self) -> Result<MetricsReport> {
        calculate_metrics(&self.actuals(), &self.predictions())
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast `horizon_days` calendar days past the end of the training data
    fn forecast(&self, horizon_days: usize) -> Result<ForecastResult>;

    /// Last date of the training data
    fn last_date(&self) -> NaiveDate;

    /// Name of the model
    fn name(&self) -> &str;

    /// One-line description of the fitted structure
    fn summary(&self) -> String {
        self.name().to_string()
    }
}

/// Forecast model that can be trained on a price series and backtested
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a price series
    fn train(&self, series: &PriceSeries) -> Result<Self::Trained>;

    /// Backtest the trained model against `series`, its training data
    fn cross_validate(
        &self,
        series: &PriceSeries,
        trained: &Self::Trained,
    ) -> Result<CrossValidationTable>;

    /// Get the name of the model
    fn name(&self) -> &str;

    /// Train, then forecast `horizon_days` ahead
    fn fit(
        &self,
        series: &PriceSeries,
        horizon_days: usize,
    ) -> Result<(Self::Trained, ForecastResult)> {
        let trained = self.train(series)?;
        let forecast = trained.forecast(horizon_days)?;
        Ok((trained, forecast))
    }
}

pub mod arima;
pub mod auto_arima;
pub mod decomposition;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_forecast_result_rejects_unordered_dates() {
        let points = vec![
            ForecastPoint::new(date("2024-01-02"), 1.0),
            ForecastPoint::new(date("2024-01-01"), 2.0),
        ];
        assert!(ForecastResult::new("test", points).is_err());
    }

    #[test]
    fn test_intervals_only_when_complete() {
        let mut first = ForecastPoint::new(date("2024-01-01"), 1.0);
        first.lower = Some(0.5);
        first.upper = Some(1.5);
        let second = ForecastPoint::new(date("2024-01-02"), 2.0);

        let partial = ForecastResult::new("test", vec![first.clone(), second]).unwrap();
        assert!(partial.intervals().is_none());

        let complete = ForecastResult::new("test", vec![first]).unwrap();
        assert_eq!(complete.intervals(), Some(vec![(0.5, 1.5)]));
    }

    #[test]
    fn test_write_csv_leaves_missing_components_empty() {
        let result = ForecastResult::new(
            "test",
            vec![ForecastPoint::new(date("2024-01-01"), 10.5)],
        )
        .unwrap();
        let mut buffer = Vec::new();
        result.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "date,value,trend,lower,upper,additive_terms\n2024-01-01,10.5,,,,\n"
        );
    }

    #[test]
    fn test_cross_validation_table_accessors() {
        let table = CrossValidationTable::new(vec![
            CvRecord {
                date: date("2024-01-03"),
                actual: 100.0,
                predicted: 110.0,
                lower: None,
                upper: None,
                cutoff: date("2024-01-02"),
            },
            CvRecord {
                date: date("2024-01-02"),
                actual: 200.0,
                predicted: 180.0,
                lower: None,
                upper: None,
                cutoff: date("2024-01-01"),
            },
        ]);
        assert_eq!(table.actuals(), vec![100.0, 200.0]);
        assert_eq!(table.predictions(), vec![110.0, 180.0]);
        assert_eq!(table.cutoffs(), vec![date("2024-01-01"), date("2024-01-02")]);
        let report = table.metrics().unwrap();
        assert_eq!(report.mape_display(), "10.00%");
    }
}
