//! MACD (Moving Average Convergence Divergence) oscillator.

use charter_core::{Candle, TimeSeries};

use crate::indicator::{Indicator, IndicatorOutput, PriceSource};
use crate::moving_average::calculate_ema;

/// MACD indicator configuration.
#[derive(Debug, Clone)]
pub struct MacdConfig {
    /// Fast EMA period (default: 12).
    pub fast_period: usize,
    /// Slow EMA period (default: 26).
    pub slow_period: usize,
    /// Signal line EMA period (default: 9).
    pub signal_period: usize,
    pub price_source: PriceSource,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            price_source: PriceSource::Close,
        }
    }
}

/// MACD indicator output.
#[derive(Debug, Clone)]
pub struct MacdOutput {
    /// Fast EMA minus slow EMA.
    pub macd_line: TimeSeries<f64>,
    /// EMA of the MACD line.
    pub signal_line: TimeSeries<f64>,
    /// MACD minus signal.
    pub histogram: TimeSeries<f64>,
}

/// MACD indicator. Its values are price differences centred on zero, so it
/// lives on its own scale and is never rescaled with prices.
pub struct Macd {
    config: MacdConfig,
}

impl Indicator for Macd {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput {
        let output = self.calculate_macd(candles);

        IndicatorOutput::MultiLine(vec![
            ("MACD".to_string(), output.macd_line),
            ("Signal".to_string(), output.signal_line),
            ("Histogram".to_string(), output.histogram),
        ])
    }

    fn min_periods(&self) -> usize {
        self.config.slow_period + self.config.signal_period - 1
    }

    fn is_overlay(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

impl Macd {
    pub fn new(config: MacdConfig) -> Self {
        Self { config }
    }

    /// Calculate MACD values and return structured output.
    pub fn calculate_macd(&self, candles: &[Candle]) -> MacdOutput {
        let MacdConfig {
            fast_period,
            slow_period,
            signal_period,
            price_source,
        } = self.config;

        let prices = price_source.prices(candles);

        if fast_period == 0 || signal_period == 0 || prices.len() < slow_period || fast_period > slow_period {
            return MacdOutput {
                macd_line: TimeSeries::new(),
                signal_line: TimeSeries::new(),
                histogram: TimeSeries::new(),
            };
        }

        let fast_ema = calculate_ema(&prices, fast_period);
        let slow_ema = calculate_ema(&prices, slow_period);

        // Both EMAs are defined from the slow EMA's first index onwards
        let macd_start = slow_period - 1;
        let macd_values: Vec<f64> = (macd_start..prices.len())
            .map(|i| fast_ema[i + 1 - fast_period] - slow_ema[i - macd_start])
            .collect();

        let signal_ema = calculate_ema(&macd_values, signal_period);
        let signal_start = macd_start + signal_period - 1;

        let histogram: Vec<f64> = signal_ema
            .iter()
            .enumerate()
            .map(|(i, signal)| macd_values[i + signal_period - 1] - signal)
            .collect();

        MacdOutput {
            macd_line: TimeSeries::from_values(&macd_values, macd_start),
            signal_line: TimeSeries::from_values(&signal_ema, signal_start),
            histogram: TimeSeries::from_values(&histogram, signal_start),
        }
    }

    pub fn config(&self) -> &MacdConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle::new(i as f64, close, close + 1.0, close - 1.0, close))
            .collect()
    }

    #[test]
    fn test_macd_basic() {
        let closes: Vec<f64> = (1..=50).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);

        let macd = Macd::new(MacdConfig::default());
        let output = macd.calculate_macd(&candles);

        // MACD line starts at slow_period - 1
        assert_eq!(output.macd_line.start_index(), 25);
        // Signal line starts at slow_period + signal_period - 2
        assert_eq!(output.signal_line.start_index(), 33);
        assert_eq!(output.histogram.start_index(), 33);

        assert_eq!(output.macd_line.len(), 25);
        assert_eq!(output.signal_line.len(), 17);
        assert!(output.macd_line.get(25).is_some());
        assert!(output.histogram.get(49).is_some());

        // Rising prices keep the fast EMA above the slow one
        assert!(output.macd_line.iter().all(|(_, v)| *v > 0.0));
    }

    #[test]
    fn test_macd_short_input() {
        let macd = Macd::new(MacdConfig::default());
        let output = macd.calculate_macd(&make_candles(&[1.0, 2.0, 3.0]));
        assert!(output.macd_line.is_empty());
        assert!(output.signal_line.is_empty());
    }

    #[test]
    fn test_macd_min_periods() {
        let macd = Macd::new(MacdConfig::default());
        assert_eq!(macd.min_periods(), 34);
        assert!(!macd.is_overlay());
    }
}
