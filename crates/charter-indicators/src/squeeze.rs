//! Squeeze momentum: Bollinger bands inside Keltner channels, plus a
//! linear-regression momentum line.

use charter_core::{Candle, TimeSeries};

use crate::indicator::{std_dev, true_range, Indicator, IndicatorOutput};
use crate::moving_average::calculate_sma;

#[derive(Debug, Clone)]
pub struct SqueezeConfig {
    pub bb_length: usize,
    pub bb_mult: f64,
    pub kc_length: usize,
    pub kc_mult: f64,
    /// Keltner width from true range instead of the plain high-low span.
    pub use_true_range: bool,
}

impl Default for SqueezeConfig {
    fn default() -> Self {
        Self {
            bb_length: 20,
            bb_mult: 2.0,
            kc_length: 20,
            kc_mult: 1.5,
            use_true_range: true,
        }
    }
}

/// Volatility state of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqueezeState {
    /// Bollinger bands inside the Keltner channel.
    On,
    /// Bollinger bands outside the Keltner channel.
    Off,
    Neither,
}

#[derive(Debug, Clone)]
pub struct SqueezeOutput {
    pub momentum: TimeSeries<f64>,
    pub state: TimeSeries<SqueezeState>,
}

/// Oscillator centred on zero.
pub struct SqueezeMomentum {
    config: SqueezeConfig,
}

impl SqueezeMomentum {
    pub fn new(config: SqueezeConfig) -> Self {
        Self { config }
    }

    pub fn calculate_squeeze(&self, candles: &[Candle]) -> SqueezeOutput {
        SqueezeOutput {
            momentum: self.momentum(candles),
            state: self.state(candles),
        }
    }

    fn state(&self, candles: &[Candle]) -> TimeSeries<SqueezeState> {
        let SqueezeConfig {
            bb_length,
            bb_mult,
            kc_length,
            kc_mult,
            use_true_range,
        } = self.config;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ranges = if use_true_range {
            true_range(candles)
        } else {
            candles.iter().map(|c| c.high - c.low).collect()
        };

        let bb_basis = calculate_sma(&closes, bb_length);
        let kc_basis = calculate_sma(&closes, kc_length);
        let kc_range = calculate_sma(&ranges, kc_length);
        if bb_basis.is_empty() || kc_basis.is_empty() {
            return TimeSeries::new();
        }

        let start = bb_length.max(kc_length) - 1;
        let states: Vec<SqueezeState> = (start..candles.len())
            .map(|i| {
                let basis = bb_basis[i + 1 - bb_length];
                let dev = bb_mult * std_dev(&closes[i + 1 - bb_length..=i]);
                let (upper_bb, lower_bb) = (basis + dev, basis - dev);

                let kc = kc_basis[i + 1 - kc_length];
                let width = kc_mult * kc_range[i + 1 - kc_length];
                let (upper_kc, lower_kc) = (kc + width, kc - width);

                if lower_bb > lower_kc && upper_bb < upper_kc {
                    SqueezeState::On
                } else if lower_bb < lower_kc && upper_bb > upper_kc {
                    SqueezeState::Off
                } else {
                    SqueezeState::Neither
                }
            })
            .collect();
        TimeSeries::from_values(&states, start)
    }

    /// Close minus the midpoint of the Donchian mean and the close SMA,
    /// smoothed by a linear regression over the Keltner window.
    fn momentum(&self, candles: &[Candle]) -> TimeSeries<f64> {
        let length = self.config.kc_length;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let sma = calculate_sma(&closes, length);
        if length == 0 || sma.is_empty() {
            return TimeSeries::new();
        }

        let deltas: Vec<f64> = (length - 1..candles.len())
            .map(|i| {
                let window = &candles[i + 1 - length..=i];
                let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
                let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
                closes[i] - ((highest + lowest) / 2.0 + sma[i + 1 - length]) / 2.0
            })
            .collect();
        if deltas.len() < length {
            return TimeSeries::new();
        }

        let values: Vec<f64> = deltas.windows(length).map(linreg_last).collect();
        TimeSeries::from_values(&values, 2 * length - 2)
    }
}

/// Value of the least-squares line through `values` at their last position.
fn linreg_last(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum_x = (0..values.len()).map(|x| x as f64).sum::<f64>();
    let sum_xx = (0..values.len()).map(|x| (x * x) as f64).sum::<f64>();
    let sum_y = values.iter().sum::<f64>();
    let sum_xy = values.iter().enumerate().map(|(x, y)| x as f64 * y).sum::<f64>();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return sum_y / n;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    intercept + slope * (n - 1.0)
}

impl Indicator for SqueezeMomentum {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput {
        IndicatorOutput::Line(self.momentum(candles))
    }

    fn min_periods(&self) -> usize {
        (2 * self.config.kc_length).saturating_sub(1).max(self.config.bb_length)
    }

    fn is_overlay(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "SQZMOM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles_with_spread(closes: &[f64], spread: impl Fn(usize) -> f64) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle::new(i as f64, close, close + spread(i), close - spread(i), close))
            .collect()
    }

    #[test]
    fn test_linreg_last() {
        assert!((linreg_last(&[1.0, 2.0, 3.0, 4.0]) - 4.0).abs() < 1e-9);
        assert!((linreg_last(&[5.0, 5.0, 5.0]) - 5.0).abs() < 1e-9);
        assert_eq!(linreg_last(&[7.0]), 7.0);
    }

    #[test]
    fn test_momentum_sign_follows_trend() {
        let sqz = SqueezeMomentum::new(SqueezeConfig::default());
        let rising: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let output = sqz.calculate_squeeze(&candles_with_spread(&rising, |_| 1.0));
        assert_eq!(output.momentum.start_index(), 38);
        assert_eq!(output.momentum.len(), 22);
        assert!(output.momentum.iter().all(|(_, v)| *v > 0.0));

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let output = sqz.calculate_squeeze(&candles_with_spread(&falling, |_| 1.0));
        assert!(output.momentum.iter().all(|(_, v)| *v < 0.0));
    }

    #[test]
    fn test_quiet_closes_with_wide_bars_squeeze() {
        // closes barely move but every bar spans 10 points, so the Keltner
        // channel is far wider than the Bollinger bands
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        let output = SqueezeMomentum::new(SqueezeConfig::default()).calculate_squeeze(&candles_with_spread(&closes, |_| 5.0));

        assert_eq!(output.state.start_index(), 19);
        assert!(output.state.iter().all(|(_, s)| *s == SqueezeState::On));
    }

    #[test]
    fn test_volatile_closes_with_tight_bars_release() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + if i % 2 == 0 { 10.0 } else { -10.0 }).collect();
        let config = SqueezeConfig {
            use_true_range: false,
            ..Default::default()
        };
        let output = SqueezeMomentum::new(config).calculate_squeeze(&candles_with_spread(&closes, |_| 0.5));
        assert!(output.state.iter().all(|(_, s)| *s == SqueezeState::Off));
    }

    #[test]
    fn test_short_input() {
        let sqz = SqueezeMomentum::new(SqueezeConfig::default());
        assert_eq!(sqz.min_periods(), 39);
        let closes = [100.0; 38];
        assert!(sqz.calculate_squeeze(&candles_with_spread(&closes, |_| 1.0)).momentum.is_empty());
    }
}
