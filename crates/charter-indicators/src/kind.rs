//! Indicator identifiers and their price-scale classification.

use std::fmt;

use charter_core::{Candle, TimeSeries};

use crate::bollinger::{Bollinger, BollingerConfig};
use crate::indicator::Indicator;
use crate::macd::{Macd, MacdConfig};
use crate::moving_average::{MovingAverage, MovingAverageConfig};
use crate::rsi::{Rsi, RsiConfig};
use crate::squeeze::{SqueezeConfig, SqueezeMomentum};
use crate::supertrend::{SuperTrend, SuperTrendConfig};

/// Indicators that can be attached to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    /// Simple moving average over `n` bars (`ma5`, `ma20`).
    MovingAverage(usize),
    /// Exponential moving average over `n` bars (`ema12`).
    Ema(usize),
    Bollinger,
    SuperTrend,
    Macd,
    Rsi,
    Squeeze,
    Volume,
}

impl IndicatorKind {
    /// Parse identifiers such as `ma5`, `ema20`, `macd` or `squeeze`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let suffix_period = |prefix: &str| {
            name.strip_prefix(prefix)
                .and_then(|digits| digits.parse::<usize>().ok())
        };
        if let Some(period) = suffix_period("ema") {
            return (period > 0).then_some(IndicatorKind::Ema(period));
        }
        if let Some(period) = suffix_period("ma") {
            return (period > 0).then_some(IndicatorKind::MovingAverage(period));
        }
        match name.as_str() {
            "boll" | "bollinger" => Some(IndicatorKind::Bollinger),
            "supertrend" => Some(IndicatorKind::SuperTrend),
            "macd" => Some(IndicatorKind::Macd),
            "rsi" => Some(IndicatorKind::Rsi),
            "squeeze" => Some(IndicatorKind::Squeeze),
            "volume" | "vol" => Some(IndicatorKind::Volume),
            _ => None,
        }
    }

    /// The calculation behind this kind with its default parameters.
    /// Volume is read straight from the bars and has none.
    pub fn indicator(&self) -> Option<Box<dyn Indicator>> {
        let indicator: Box<dyn Indicator> = match *self {
            IndicatorKind::MovingAverage(period) => Box::new(MovingAverage::new(MovingAverageConfig {
                period,
                ..Default::default()
            })),
            IndicatorKind::Ema(period) => Box::new(MovingAverage::new(MovingAverageConfig {
                period,
                exponential: true,
                ..Default::default()
            })),
            IndicatorKind::Bollinger => Box::new(Bollinger::new(BollingerConfig::default())),
            IndicatorKind::SuperTrend => Box::new(SuperTrend::new(SuperTrendConfig::default())),
            IndicatorKind::Macd => Box::new(Macd::new(MacdConfig::default())),
            IndicatorKind::Rsi => Box::new(Rsi::new(RsiConfig::default())),
            IndicatorKind::Squeeze => Box::new(SqueezeMomentum::new(SqueezeConfig::default())),
            IndicatorKind::Volume => return None,
        };
        Some(indicator)
    }

    /// Whether the indicator's values are in price units and must be rescaled
    /// together with the asset's prices.
    pub fn is_price_scaled(&self) -> bool {
        self.indicator().is_some_and(|indicator| indicator.is_overlay())
    }

    /// Compute the line plotted for this indicator. Multi-line indicators
    /// yield their first line.
    ///
    /// Returns `None` for kinds without a candle calculation and when there
    /// are fewer candles than the indicator needs for a single value.
    pub fn compute(&self, candles: &[Candle]) -> Option<TimeSeries<f64>> {
        let indicator = self.indicator()?;
        if candles.len() < indicator.min_periods() {
            log::debug!(
                "{} needs {} candles, got {}",
                indicator.name(),
                indicator.min_periods(),
                candles.len()
            );
            return None;
        }
        indicator.calculate(candles).into_primary()
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::MovingAverage(period) => write!(f, "ma{period}"),
            IndicatorKind::Ema(period) => write!(f, "ema{period}"),
            IndicatorKind::Bollinger => f.write_str("bollinger"),
            IndicatorKind::SuperTrend => f.write_str("supertrend"),
            IndicatorKind::Macd => f.write_str("macd"),
            IndicatorKind::Rsi => f.write_str("rsi"),
            IndicatorKind::Squeeze => f.write_str("squeeze"),
            IndicatorKind::Volume => f.write_str("volume"),
        }
    }
}
