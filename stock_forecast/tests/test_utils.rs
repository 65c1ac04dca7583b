use chrono::NaiveDate;
use rstest::rstest;
use stock_forecast::utils::{
    future_dates, parse_date, round2, time_series_splits, TimeSeriesSplit, DAYS_PER_YEAR,
};
use stock_forecast::ForecastError;

#[rstest]
#[case("2023-03-15")]
#[case("2023-03-15 00:00:00")]
#[case("2023-03-15T09:30:00-04:00")]
#[case("03/15/2023")]
#[case("  2023-03-15 ")]
fn test_parse_date_variants(#[case] text: &str) {
    assert_eq!(
        parse_date(text).unwrap(),
        NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()
    );
}

#[test]
fn test_parse_date_rejects_garbage() {
    assert!(matches!(
        parse_date("last tuesday"),
        Err(ForecastError::InputError(_))
    ));
}

#[test]
fn test_future_dates_cover_leap_day() {
    let last = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
    let dates = future_dates(last, 3);
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ]
    );
    assert_eq!(future_dates(last, DAYS_PER_YEAR).len(), 365);
    assert!(future_dates(last, 0).is_empty());
}

#[test]
fn test_time_series_splits_expand() {
    // 12 rows, 3 folds: blocks of 3, first training window takes the leftover
    let splits = time_series_splits(12, 3).unwrap();
    assert_eq!(
        splits,
        vec![
            TimeSeriesSplit { train_end: 3, test_start: 3, test_end: 6 },
            TimeSeriesSplit { train_end: 6, test_start: 6, test_end: 9 },
            TimeSeriesSplit { train_end: 9, test_start: 9, test_end: 12 },
        ]
    );

    let uneven = time_series_splits(14, 3).unwrap();
    assert_eq!(uneven[0].train_end, 5);
    assert_eq!(uneven[2].test_end, 14);
    assert!(uneven.iter().all(|s| s.test_len() == 3));
}

#[test]
fn test_time_series_splits_errors() {
    assert!(matches!(
        time_series_splits(5, 5),
        Err(ForecastError::CrossValidationError(_))
    ));
    assert!(matches!(
        time_series_splits(100, 0),
        Err(ForecastError::InputError(_))
    ));
}

#[rstest]
#[case(1.234, 1.23)]
#[case(-2.5, -2.5)]
#[case(99.999, 100.0)]
fn test_round2(#[case] value: f64, #[case] expected: f64) {
    assert_eq!(round2(value), expected);
}
