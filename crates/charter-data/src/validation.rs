//! Validation of raw records delivered by data sources.

use charter_core::{Candle, LinePoint, Time};
use serde::{Deserialize, Serialize};

/// One record as a data source delivers it. Every field may be missing.
///
/// OHLC records carry `open`/`high`/`low`/`close`; single-value records
/// (precomputed indicators) carry `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBar {
    pub time: Option<Time>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub value: Option<f64>,
}

impl RawBar {
    /// A fully populated OHLC record.
    pub fn ohlc(time: impl Into<Time>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time: Some(time.into()),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Convert to a candle if the record passes validation.
    ///
    /// A non-finite volume is dropped rather than rejecting the bar.
    pub fn to_candle(&self) -> Option<Candle> {
        let time = self.time.clone()?;
        let candle = Candle {
            time,
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
            volume: self.volume.filter(|v| v.is_finite()),
        };
        validate_candle(&candle).then_some(candle)
    }

    /// Convert to a line point if the record has a time and a finite value.
    pub fn to_line_point(&self) -> Option<LinePoint> {
        let time = self.time.clone()?;
        let value = self.value.filter(|v| v.is_finite())?;
        Some(LinePoint { time, value })
    }
}

/// Validate a candle has plottable values.
pub fn validate_candle(candle: &Candle) -> bool {
    candle.open.is_finite()
        && candle.high.is_finite()
        && candle.low.is_finite()
        && candle.close.is_finite()
        && candle.high >= candle.low
}

/// Keep the OHLC records that are present and valid, in their original order.
pub fn filter_valid_data(records: &[Option<RawBar>]) -> Vec<Candle> {
    let candles: Vec<Candle> = records
        .iter()
        .flatten()
        .filter_map(RawBar::to_candle)
        .collect();
    if candles.len() < records.len() {
        log::debug!(
            "Dropped {} invalid records out of {}",
            records.len() - candles.len(),
            records.len()
        );
    }
    candles
}

/// Keep the single-value records that are present and valid, in order.
pub fn filter_valid_points(records: &[Option<RawBar>]) -> Vec<LinePoint> {
    records
        .iter()
        .flatten()
        .filter_map(RawBar::to_line_point)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_valid_in_order() {
        let records = vec![
            Some(RawBar::ohlc("2023-01-01", 100.0, 105.0, 95.0, 102.0)),
            Some(RawBar {
                time: None,
                ..RawBar::ohlc("2023-01-02", 100.0, 105.0, 95.0, 102.0)
            }),
            None,
            Some(RawBar::ohlc("2023-01-04", 100.0, 90.0, 95.0, 102.0)),
            Some(RawBar::ohlc("2023-01-05", 101.0, 106.0, 96.0, 103.0)),
        ];
        let valid = filter_valid_data(&records);

        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].time, Time::from("2023-01-01"));
        assert_eq!(valid[1].time, Time::from("2023-01-05"));
    }

    #[test]
    fn test_filter_rejects_missing_and_nan_prices() {
        let mut missing_close = RawBar::ohlc(1.0, 1.0, 2.0, 0.5, 1.0);
        missing_close.close = None;
        let nan_open = RawBar::ohlc(2.0, f64::NAN, 2.0, 0.5, 1.0);

        assert!(filter_valid_data(&[Some(missing_close), Some(nan_open)]).is_empty());
    }

    #[test]
    fn test_volume_is_optional() {
        let bar = RawBar::ohlc(1.0, 1.0, 2.0, 0.5, 1.5).with_volume(f64::INFINITY);
        let candle = bar.to_candle().unwrap();
        assert_eq!(candle.volume, None);

        let bar = RawBar::ohlc(1.0, 1.0, 2.0, 0.5, 1.5).with_volume(300.0);
        assert_eq!(bar.to_candle().unwrap().volume, Some(300.0));
    }

    #[test]
    fn test_value_records() {
        let records = vec![
            Some(RawBar {
                time: Some(Time::from("2023-01-01")),
                value: Some(100.0),
                ..Default::default()
            }),
            Some(RawBar {
                time: Some(Time::from("2023-01-02")),
                value: None,
                ..Default::default()
            }),
            Some(RawBar {
                time: None,
                value: Some(5.0),
                ..Default::default()
            }),
        ];
        let points = filter_valid_points(&records);
        assert_eq!(points, vec![LinePoint::new("2023-01-01", 100.0)]);
    }

    #[test]
    fn test_validate_candle_high_below_low() {
        let candle = Candle::new(1000.0, 100.0, 90.0, 95.0, 102.0);
        assert!(!validate_candle(&candle));
    }

    #[test]
    fn test_deserialize_with_nulls() {
        let json = r#"[{"time": "2023-01-01", "open": 1, "high": 2, "low": 0.5, "close": 1.5}, null,
                       {"time": 1672617600, "open": null, "high": 2, "low": 1, "close": 1}]"#;
        let records: Vec<Option<RawBar>> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[1].is_none());
        assert_eq!(filter_valid_data(&records).len(), 1);
    }
}
