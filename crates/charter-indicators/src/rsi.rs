//! Relative strength index with Wilder smoothing.

use charter_core::{Candle, TimeSeries};

use crate::indicator::{Indicator, IndicatorOutput, PriceSource};

#[derive(Debug, Clone)]
pub struct RsiConfig {
    pub period: usize,
    pub price_source: PriceSource,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            price_source: PriceSource::Close,
        }
    }
}

/// Oscillator bounded to 0..=100.
pub struct Rsi {
    config: RsiConfig,
}

impl Rsi {
    pub fn new(config: RsiConfig) -> Self {
        Self { config }
    }
}

impl Indicator for Rsi {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput {
        let period = self.config.period;
        let prices = self.config.price_source.prices(candles);
        let values = calculate_rsi(&prices, period);
        if values.is_empty() {
            return IndicatorOutput::Line(TimeSeries::new());
        }
        IndicatorOutput::Line(TimeSeries::from_values(&values, period))
    }

    fn min_periods(&self) -> usize {
        self.config.period + 1
    }

    fn is_overlay(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

/// RSI values; the first one belongs to `prices[period]`, the first price
/// with `period` changes behind it.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() <= period {
        return Vec::new();
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let (mut avg_gain, mut avg_loss) = changes[..period].iter().fold((0.0, 0.0), |(g, l), c| {
        (g + c.max(0.0), l + (-c).max(0.0))
    });
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let mut values = Vec::with_capacity(changes.len() + 1 - period);
    values.push(rsi_value(avg_gain, avg_loss));
    for change in &changes[period..] {
        avg_gain = (avg_gain * (period - 1) as f64 + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + (-change).max(0.0)) / period as f64;
        values.push(rsi_value(avg_gain, avg_loss));
    }
    values
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // no movement at all sits in the middle
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
