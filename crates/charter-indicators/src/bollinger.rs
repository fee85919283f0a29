//! Bollinger bands: a moving average wrapped in a standard deviation envelope.

use charter_core::{Candle, TimeSeries};

use crate::indicator::{std_dev, Indicator, IndicatorOutput, PriceSource};

#[derive(Debug, Clone)]
pub struct BollingerConfig {
    pub period: usize,
    /// Band width in standard deviations.
    pub multiplier: f64,
    pub price_source: PriceSource,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            multiplier: 2.0,
            price_source: PriceSource::Close,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BollingerOutput {
    pub middle: TimeSeries<f64>,
    pub upper: TimeSeries<f64>,
    pub lower: TimeSeries<f64>,
}

/// Price overlay. The deviation is the population one, over the same window
/// as the middle band.
pub struct Bollinger {
    config: BollingerConfig,
}

impl Bollinger {
    pub fn new(config: BollingerConfig) -> Self {
        Self { config }
    }

    pub fn calculate_bands(&self, candles: &[Candle]) -> BollingerOutput {
        let BollingerConfig {
            period,
            multiplier,
            price_source,
        } = self.config;
        let prices = price_source.prices(candles);

        if period == 0 || prices.len() < period {
            return BollingerOutput {
                middle: TimeSeries::new(),
                upper: TimeSeries::new(),
                lower: TimeSeries::new(),
            };
        }

        let mut middle = Vec::with_capacity(prices.len() + 1 - period);
        let mut upper = Vec::with_capacity(middle.capacity());
        let mut lower = Vec::with_capacity(middle.capacity());
        for window in prices.windows(period) {
            let mean = window.iter().sum::<f64>() / period as f64;
            let width = multiplier * std_dev(window);
            middle.push(mean);
            upper.push(mean + width);
            lower.push(mean - width);
        }

        let start = period - 1;
        BollingerOutput {
            middle: TimeSeries::from_values(&middle, start),
            upper: TimeSeries::from_values(&upper, start),
            lower: TimeSeries::from_values(&lower, start),
        }
    }
}

impl Indicator for Bollinger {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput {
        let bands = self.calculate_bands(candles);
        IndicatorOutput::MultiLine(vec![
            ("Middle".to_string(), bands.middle),
            ("Upper".to_string(), bands.upper),
            ("Lower".to_string(), bands.lower),
        ])
    }

    fn min_periods(&self) -> usize {
        self.config.period
    }

    fn is_overlay(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "BOLL"
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
    fn test_bands_surround_mean() {
        let boll = Bollinger::new(BollingerConfig {
            period: 4,
            ..Default::default()
        });
        let bands = boll.calculate_bands(&make_candles(&[2.0, 4.0, 4.0, 6.0, 6.0]));

        assert_eq!(bands.middle.start_index(), 3);
        assert_eq!(bands.middle.get(3), Some(&4.0));
        // std of [2, 4, 4, 6] is sqrt(2)
        let width = 2.0 * 2.0_f64.sqrt();
        assert!((bands.upper.get(3).unwrap() - (4.0 + width)).abs() < 1e-9);
        assert!((bands.lower.get(3).unwrap() - (4.0 - width)).abs() < 1e-9);
        assert_eq!(bands.middle.get(4), Some(&5.0));
    }

    #[test]
    fn test_flat_prices_collapse_bands() {
        let bands = Bollinger::new(BollingerConfig::default()).calculate_bands(&make_candles(&[10.0; 25]));
        assert_eq!(bands.middle.len(), 6);
        assert!(bands.upper.iter().all(|(_, v)| *v == 10.0));
        assert!(bands.lower.iter().all(|(_, v)| *v == 10.0));
    }

    #[test]
    fn test_short_input() {
        let boll = Bollinger::new(BollingerConfig::default());
        assert!(boll.calculate_bands(&make_candles(&[1.0; 19])).middle.is_empty());
        assert_eq!(boll.min_periods(), 20);
        assert!(boll.is_overlay());
    }
}
