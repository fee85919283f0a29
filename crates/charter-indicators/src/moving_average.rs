//! Simple and exponential moving averages.

use charter_core::{Candle, TimeSeries};

use crate::indicator::{Indicator, IndicatorOutput, PriceSource};

/// Moving average configuration.
#[derive(Debug, Clone)]
pub struct MovingAverageConfig {
    pub period: usize,
    pub price_source: PriceSource,
    /// Exponential weighting instead of a plain mean.
    pub exponential: bool,
}

impl Default for MovingAverageConfig {
    fn default() -> Self {
        Self {
            period: 5,
            price_source: PriceSource::Close,
            exponential: false,
        }
    }
}

/// Price overlay averaging the last `period` bars.
pub struct MovingAverage {
    config: MovingAverageConfig,
    name: String,
}

impl MovingAverage {
    pub fn new(config: MovingAverageConfig) -> Self {
        let prefix = if config.exponential { "EMA" } else { "MA" };
        let name = format!("{prefix}{}", config.period);
        Self { config, name }
    }
}

impl Indicator for MovingAverage {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput {
        let prices = self.config.price_source.prices(candles);
        let values = if self.config.exponential {
            calculate_ema(&prices, self.config.period)
        } else {
            calculate_sma(&prices, self.config.period)
        };
        if values.is_empty() {
            return IndicatorOutput::Line(TimeSeries::new());
        }
        IndicatorOutput::Line(TimeSeries::from_values(&values, self.config.period - 1))
    }

    fn min_periods(&self) -> usize {
        self.config.period
    }

    fn is_overlay(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Calculate Simple Moving Average. The first value covers `prices[..period]`.
pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.len() < period || period == 0 {
        return Vec::new();
    }
    prices
        .windows(period)
        .map(|window| window.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Calculate Exponential Moving Average, seeded with the SMA of the first
/// `period` prices.
pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.len() < period || period == 0 {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(prices.len() - period + 1);

    let mut prev_ema = prices[..period].iter().sum::<f64>() / period as f64;
    ema_values.push(prev_ema);

    for price in &prices[period..] {
        prev_ema = (price - prev_ema) * multiplier + prev_ema;
        ema_values.push(prev_ema);
    }

    ema_values
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
    fn test_sma_calculation() {
        let sma = calculate_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(sma, vec![2.0, 3.0, 4.0]);
        assert!(calculate_sma(&[1.0, 2.0], 3).is_empty());
        assert!(calculate_sma(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_ema_calculation() {
        let prices = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let ema = calculate_ema(&prices, 3);

        assert_eq!(ema.len(), 8);
        assert!((ema[0] - 2.0).abs() < 1e-9);
        assert!((ema[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_offset_and_name() {
        let ma = MovingAverage::new(MovingAverageConfig {
            period: 5,
            ..Default::default()
        });
        assert_eq!(ma.name(), "MA5");
        assert!(ma.is_overlay());

        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let IndicatorOutput::Line(series) = ma.calculate(&candles) else {
            panic!("expected a single line");
        };
        assert_eq!(series.start_index(), 4);
        assert_eq!(series.get(4), Some(&12.0));
        assert_eq!(series.get(5), Some(&13.0));
    }

    #[test]
    fn test_short_input_gives_empty_line() {
        let ema = MovingAverage::new(MovingAverageConfig {
            period: 20,
            exponential: true,
            ..Default::default()
        });
        assert_eq!(ema.name(), "EMA20");
        let output = ema.calculate(&make_candles(&[1.0, 2.0]));
        assert!(output.primary().map(|s| s.is_empty()).unwrap_or(false));
    }
}
