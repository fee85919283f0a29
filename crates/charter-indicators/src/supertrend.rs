//! SuperTrend: an ATR trailing stop that flips sides with the trend.

use charter_core::{Candle, TimeSeries};

use crate::indicator::{true_range, Indicator, IndicatorOutput, PriceSource};
use crate::moving_average::calculate_sma;

#[derive(Debug, Clone)]
pub struct SuperTrendConfig {
    /// ATR window.
    pub period: usize,
    /// Band distance from the bar midpoint, in ATRs.
    pub multiplier: f64,
}

impl Default for SuperTrendConfig {
    fn default() -> Self {
        Self {
            period: 10,
            multiplier: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct SuperTrendOutput {
    /// The active stop: the lower band in an uptrend, the upper one in a downtrend.
    pub line: TimeSeries<f64>,
    /// Ratcheted lower band.
    pub up: TimeSeries<f64>,
    /// Ratcheted upper band.
    pub down: TimeSeries<f64>,
    pub trend: TimeSeries<Trend>,
}

impl SuperTrendOutput {
    /// Indices where the trend turned up.
    pub fn buy_signals(&self) -> Vec<usize> {
        self.flips(Trend::Up)
    }

    /// Indices where the trend turned down.
    pub fn sell_signals(&self) -> Vec<usize> {
        self.flips(Trend::Down)
    }

    fn flips(&self, to: Trend) -> Vec<usize> {
        self.trend
            .iter()
            .filter(|&(i, trend)| *trend == to && i > 0 && self.trend.get(i - 1).is_some_and(|prev| *prev != to))
            .map(|(i, _)| i)
            .collect()
    }
}

pub struct SuperTrend {
    config: SuperTrendConfig,
}

impl SuperTrend {
    pub fn new(config: SuperTrendConfig) -> Self {
        Self { config }
    }

    pub fn calculate_trend(&self, candles: &[Candle]) -> SuperTrendOutput {
        let SuperTrendConfig { period, multiplier } = self.config;
        let atr = calculate_sma(&true_range(candles), period);
        if atr.is_empty() {
            return SuperTrendOutput {
                line: TimeSeries::new(),
                up: TimeSeries::new(),
                down: TimeSeries::new(),
                trend: TimeSeries::new(),
            };
        }

        let start = period - 1;
        let mid = PriceSource::Median.prices(candles);
        let mut up = Vec::with_capacity(atr.len());
        let mut down = Vec::with_capacity(atr.len());
        let mut trend = Vec::with_capacity(atr.len());
        let mut line = Vec::with_capacity(atr.len());

        for (offset, atr) in atr.iter().enumerate() {
            let i = start + offset;
            let raw_up = mid[i] - multiplier * atr;
            let raw_down = mid[i] + multiplier * atr;

            let (band_up, band_down, direction) = match offset.checked_sub(1) {
                None => (raw_up, raw_down, Trend::Up),
                Some(prev) => {
                    let prev_close = candles[i - 1].close;
                    let close = candles[i].close;
                    // bands only tighten while price stays on their side
                    let band_up = if prev_close > up[prev] { raw_up.max(up[prev]) } else { raw_up };
                    let band_down = if prev_close < down[prev] { raw_down.min(down[prev]) } else { raw_down };
                    let direction = match trend[prev] {
                        Trend::Down if close > down[prev] => Trend::Up,
                        Trend::Up if close < up[prev] => Trend::Down,
                        same => same,
                    };
                    (band_up, band_down, direction)
                }
            };

            up.push(band_up);
            down.push(band_down);
            trend.push(direction);
            line.push(if direction == Trend::Up { band_up } else { band_down });
        }

        SuperTrendOutput {
            line: TimeSeries::from_values(&line, start),
            up: TimeSeries::from_values(&up, start),
            down: TimeSeries::from_values(&down, start),
            trend: TimeSeries::from_values(&trend, start),
        }
    }
}

impl Indicator for SuperTrend {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput {
        let output = self.calculate_trend(candles);
        IndicatorOutput::MultiLine(vec![
            ("SuperTrend".to_string(), output.line),
            ("Up".to_string(), output.up),
            ("Down".to_string(), output.down),
        ])
    }

    fn min_periods(&self) -> usize {
        self.config.period
    }

    fn is_overlay(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "SuperTrend"
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
    fn test_uptrend_stop_sits_below_price() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let output = SuperTrend::new(SuperTrendConfig::default()).calculate_trend(&candles);

        assert_eq!(output.line.start_index(), 9);
        assert_eq!(output.line.len(), 21);
        assert!(output.trend.iter().all(|(_, t)| *t == Trend::Up));
        assert!(output.line.iter().all(|(i, v)| *v < candles[i].close));
        assert!(output.buy_signals().is_empty());

        // the lower band never loosens during an uptrend
        let ups: Vec<f64> = output.up.iter().map(|(_, v)| *v).collect();
        assert!(ups.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_crash_flips_trend() {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..10).map(|i| 80.0 - 5.0 * i as f64));
        let candles = make_candles(&closes);
        let output = SuperTrend::new(SuperTrendConfig::default()).calculate_trend(&candles);

        let sells = output.sell_signals();
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0], 20);
        let last = candles.len() - 1;
        assert_eq!(output.trend.get(last), Some(&Trend::Down));
        assert!(*output.line.get(last).unwrap() > candles[last].close);
    }

    #[test]
    fn test_short_input() {
        let st = SuperTrend::new(SuperTrendConfig::default());
        assert!(st.calculate_trend(&make_candles(&[1.0; 9])).line.is_empty());
        assert_eq!(st.min_periods(), 10);
    }
}
