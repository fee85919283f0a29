//! Integration tests for multi-asset loading and price normalization.

use std::rc::Rc;

use charter::recording::RecordingLibrary;
use charter::*;
use charter_config::Config;
use charter_core::SeriesData;
use charter_data::StaticSource;
use charter_indicators::IndicatorKind;

const CHEAP: &str = r#"[
    {"time": "2024-03-01", "open": 10.0, "high": 10.5, "low": 9.5, "close": 10.0, "volume": 1200},
    {"time": "2024-03-04", "open": 10.0, "high": 11.0, "low": 9.8, "close": 10.8, "volume": 1500},
    null,
    {"time": "2024-03-05", "open": 10.8, "high": 11.2, "low": 10.4, "close": 11.0},
    {"time": "2024-03-06", "open": 11.0, "high": 11.5, "low": 10.9, "close": 11.4, "volume": 900}
]"#;

const EXPENSIVE: &str = r#"[
    {"time": "2024-03-01", "open": 500.0, "high": 505.0, "low": 495.0, "close": 500.0, "volume": 80},
    {"time": "2024-03-04", "open": 500.0, "high": 520.0, "low": 498.0, "close": 515.0, "volume": 95},
    {"time": "2024-03-05", "open": 515.0, "high": null, "low": 510.0, "close": 512.0},
    {"time": "2024-03-06", "open": 512.0, "high": 530.0, "low": 511.0, "close": 525.0, "volume": 70}
]"#;

fn source() -> StaticSource {
    StaticSource::new()
        .with_json("CHEAP", CHEAP)
        .unwrap()
        .with_json("EXPENSIVE", EXPENSIVE)
        .unwrap()
}

fn setup(config: Config) -> (MainChart, Rc<RecordingLibrary>) {
    let library = RecordingLibrary::new();
    let ctx = ChartContext::new(Some(library.clone()), Rc::new(ManualScheduler::new()), config);
    (MainChart::new(&ctx, Container::new("main", 1000, 400)), library)
}

fn closes(data: Option<SeriesData>) -> Vec<f64> {
    match data {
        Some(SeriesData::Candles(candles)) => candles.iter().map(|c| c.close).collect(),
        other => panic!("expected candles, got {other:?}"),
    }
}

/// Test that invalid records are dropped before drawing.
#[tokio::test]
async fn test_invalid_records_are_dropped() {
    let (main, _) = setup(Config::default());
    main.load_data(&source(), &["CHEAP", "EXPENSIVE"], &[]).await.unwrap();

    assert_eq!(main.stock(0).unwrap().data.len(), 4);
    assert_eq!(main.stock(1).unwrap().data.len(), 3);
    assert_eq!(main.stock(1).unwrap().name, "股票EXPENSIVE");
}

/// Test that assets on different scales are normalized onto the first.
#[tokio::test]
async fn test_load_normalizes_onto_first_asset() {
    let (main, library) = setup(Config::default());
    let report = main.load_data(&source(), &["CHEAP", "EXPENSIVE"], &[]).await.unwrap();
    assert!(report.normalized);
    assert_eq!(main.normalization_ratios(), vec![1.0, 10.0 / 500.0]);

    let series = library.chart_for("main").unwrap().series_of(SeriesKind::Candlestick);
    let scaled = closes(series[1].data());
    assert!((scaled[0] - 10.0).abs() < 1e-9);
    assert!((scaled[2] - 10.5).abs() < 1e-9);

    main.disable_normalization();
    assert_eq!(closes(series[1].data()), vec![500.0, 515.0, 525.0]);
}

/// Test that hiding the reference asset re-bases the ratios.
#[tokio::test]
async fn test_hiding_reference_rebases() {
    let (main, _) = setup(Config::default());
    main.load_data(&source(), &["CHEAP", "EXPENSIVE"], &[IndicatorKind::MovingAverage(2)])
        .await
        .unwrap();

    assert_eq!(main.toggle_stock_visibility(0), Some(false));
    assert_eq!(main.normalization_ratios(), vec![50.0, 1.0]);
    assert!(!main.should_enable_normalization());
}

/// Test the normalization threshold from configuration.
#[tokio::test]
async fn test_threshold_is_configurable() {
    let mut config = Config::default();
    config.normalization.threshold = 100.0;
    let (main, _) = setup(config);

    let report = main.load_data(&source(), &["CHEAP", "EXPENSIVE"], &[]).await.unwrap();
    assert!(!report.normalized);
    assert!(!main.toggle_normalization());
    assert!(main.normalization_ratios().is_empty());
}
