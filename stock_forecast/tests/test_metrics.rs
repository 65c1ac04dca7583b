use assert_approx_eq::assert_approx_eq;
use rstest::rstest;
use stock_forecast::metrics::{
    calculate_metrics, mean_absolute_error, mean_absolute_percentage_error, mean_squared_error,
    root_mean_squared_error, Accuracy, MetricsReport,
};
use stock_forecast::ForecastError;

#[test]
fn test_metrics_on_known_values() {
    let actual = vec![100.0, 200.0, 400.0];
    let predicted = vec![110.0, 180.0, 400.0];

    // |10|/100 + |20|/200 + 0 = 0.2 over three points
    let report = calculate_metrics(&actual, &predicted).unwrap();
    assert_approx_eq!(report.mape, 20.0 / 3.0, 1e-9);
    assert_approx_eq!(report.mae, 10.0, 1e-9);
    assert_approx_eq!(report.rmse, (500.0_f64 / 3.0).sqrt(), 1e-9);

    assert_eq!(report.mape_display(), "6.67%");
    assert_eq!(report.mae_display(), "10.00");
    assert_eq!(report.rmse_display(), "12.91");
}

#[rstest]
#[case(vec![100.0, 200.0, 300.0], vec![100.0, 200.0, 300.0])]
#[case(vec![5.0], vec![5.0])]
#[case(vec![-3.0, 7.5], vec![-3.0, 7.5])]
fn test_perfect_forecast_scores_zero(#[case] actual: Vec<f64>, #[case] predicted: Vec<f64>) {
    let report = calculate_metrics(&actual, &predicted).unwrap();
    assert_eq!(report, MetricsReport::new(0.0, 0.0, 0.0));
    assert_eq!(Accuracy::from_report(&report).rounded(), 100.0);
}

#[rstest]
#[case(vec![], vec![])]
#[case(vec![1.0, 2.0], vec![1.0])]
#[case(vec![1.0, 0.0], vec![1.0, 1.0])]
#[case(vec![1.0, f64::NAN], vec![1.0, 1.0])]
fn test_invalid_inputs(#[case] actual: Vec<f64>, #[case] predicted: Vec<f64>) {
    let result = calculate_metrics(&actual, &predicted);
    assert!(matches!(result, Err(ForecastError::InputError(_))));
}

#[test]
fn test_rmse_is_at_least_mae() {
    let actual = [120.0, 95.0, 130.0, 101.0, 88.0];
    let predicted = [118.0, 99.0, 121.0, 104.0, 90.0];
    let mae = mean_absolute_error(&actual, &predicted).unwrap();
    let rmse = root_mean_squared_error(&actual, &predicted).unwrap();
    assert!(rmse >= mae);
    assert_approx_eq!(rmse * rmse, mean_squared_error(&actual, &predicted).unwrap(), 1e-9);
}

#[test]
fn test_mape_uses_signed_actuals() {
    // A negative actual contributes a negative term
    let mape = mean_absolute_percentage_error(&[-10.0, 10.0], &[-12.0, 12.0]).unwrap();
    assert_approx_eq!(mape, 0.0, 1e-12);
}

#[test]
fn test_accuracy_passes_through_unclamped() {
    let report = calculate_metrics(&[10.0], &[35.0]).unwrap();
    assert_approx_eq!(report.mape, 250.0, 1e-9);
    let accuracy = Accuracy::from_report(&report);
    assert_eq!(accuracy.rounded(), -150.0);
    assert_eq!(accuracy.to_string(), "-150.00%");
}

#[test]
fn test_report_display_lists_all_metrics() {
    let report = MetricsReport::new(12.346, 1.234, 4.567);
    let text = report.to_string();
    assert!(text.contains("12.35%"));
    assert!(text.contains("1.23"));
    assert!(text.contains("4.57"));
}
