//! Candle data structures for OHLCV data.

use serde::{Deserialize, Serialize};

use crate::time::Time;

/// One validated OHLCV bar.
///
/// `time` keeps the representation the data source used; volume is optional
/// because not every source reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: Time,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Candle {
    pub fn new(time: impl Into<Time>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time: time.into(),
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    #[must_use]
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Whether the bar closed at or above its open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Copy of this bar with every price multiplied by `ratio`.
    ///
    /// Time and volume are left untouched.
    #[must_use]
    pub fn scaled(&self, ratio: f64) -> Self {
        Self {
            time: self.time.clone(),
            open: self.open * ratio,
            high: self.high * ratio,
            low: self.low * ratio,
            close: self.close * ratio,
            volume: self.volume,
        }
    }
}

/// Trait for types that provide OHLCV data.
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> Option<f64>;
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> Option<f64> {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_leaves_volume_and_time() {
        let candle = Candle::new("2023-01-01", 2000.0, 2050.0, 1950.0, 2000.0).with_volume(1500.0);
        let scaled = candle.scaled(0.5);

        assert_eq!(scaled.time, candle.time);
        assert_eq!(scaled.volume, Some(1500.0));
        assert_eq!(scaled.open, 1000.0);
        assert_eq!(scaled.high, 1025.0);
        assert_eq!(scaled.low, 975.0);
        assert_eq!(scaled.close, 1000.0);
    }

    #[test]
    fn test_bullish() {
        assert!(Candle::new(1.0, 10.0, 12.0, 9.0, 11.0).is_bullish());
        assert!(Candle::new(1.0, 10.0, 12.0, 9.0, 10.0).is_bullish());
        assert!(!Candle::new(1.0, 10.0, 12.0, 9.0, 9.5).is_bullish());
    }
}
