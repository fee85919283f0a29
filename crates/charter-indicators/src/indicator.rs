//! Shared shape of every indicator calculation.

use charter_core::{Candle, TimeSeries};

/// Which price of a bar an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceSource {
    #[default]
    Close,
    /// Bar midpoint, (high + low) / 2.
    Median,
}

impl PriceSource {
    pub fn extract(&self, candle: &Candle) -> f64 {
        match self {
            PriceSource::Close => candle.close,
            PriceSource::Median => (candle.high + candle.low) / 2.0,
        }
    }

    /// One price per candle, in candle order.
    pub fn prices(&self, candles: &[Candle]) -> Vec<f64> {
        candles.iter().map(|c| self.extract(c)).collect()
    }
}

/// Result of running an indicator over a candle slice. Indices in every
/// series refer back to positions in that slice.
#[derive(Debug, Clone)]
pub enum IndicatorOutput {
    Line(TimeSeries<f64>),
    /// Named lines; the first one is the line plotted on its own.
    MultiLine(Vec<(String, TimeSeries<f64>)>),
}

impl IndicatorOutput {
    pub fn primary(&self) -> Option<&TimeSeries<f64>> {
        match self {
            IndicatorOutput::Line(series) => Some(series),
            IndicatorOutput::MultiLine(lines) => lines.first().map(|(_, series)| series),
        }
    }

    pub fn into_primary(self) -> Option<TimeSeries<f64>> {
        match self {
            IndicatorOutput::Line(series) => Some(series),
            IndicatorOutput::MultiLine(lines) => lines.into_iter().next().map(|(_, series)| series),
        }
    }

    /// Look up a line of a multi-line output by name.
    pub fn line(&self, name: &str) -> Option<&TimeSeries<f64>> {
        match self {
            IndicatorOutput::Line(_) => None,
            IndicatorOutput::MultiLine(lines) => lines.iter().find(|(n, _)| n == name).map(|(_, s)| s),
        }
    }
}

/// A calculation over candles.
///
/// Implementations are object safe so that [`crate::IndicatorKind`] can hand
/// out a boxed indicator for any kind it knows how to compute.
pub trait Indicator {
    fn calculate(&self, candles: &[Candle]) -> IndicatorOutput;

    /// Fewest candles for which `calculate` yields at least one value.
    fn min_periods(&self) -> usize;

    /// Whether values are in price units and drawn over the price series.
    ///
    /// Overlay outputs must be rescaled together with the prices they are
    /// derived from; everything else lives on its own scale.
    fn is_overlay(&self) -> bool;

    fn name(&self) -> &str;
}

/// Population standard deviation of `values`.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// True range of every bar. The first bar has no previous close and uses
/// its own high-low span.
pub(crate) fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let span = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => span.max((c.high - prev_close).abs()).max((c.low - prev_close).abs()),
                None => span,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_source() {
        let candle = Candle::new(0.0, 10.0, 14.0, 8.0, 12.0);
        assert_eq!(PriceSource::Close.extract(&candle), 12.0);
        assert_eq!(PriceSource::Median.extract(&candle), 11.0);
        assert_eq!(PriceSource::default(), PriceSource::Close);
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let candles = vec![
            Candle::new(0.0, 10.0, 11.0, 9.0, 10.0),
            // gap up: high - prev close dominates
            Candle::new(1.0, 14.0, 15.0, 13.5, 14.0),
        ];
        assert_eq!(true_range(&candles), vec![2.0, 5.0]);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn test_multi_line_lookup() {
        let output = IndicatorOutput::MultiLine(vec![
            ("a".to_string(), TimeSeries::from_values(&[1.0], 0)),
            ("b".to_string(), TimeSeries::from_values(&[2.0], 3)),
        ]);
        assert_eq!(output.line("b").map(|s| s.start_index()), Some(3));
        assert!(output.line("c").is_none());
        assert_eq!(output.into_primary().and_then(|s| s.get(0).copied()), Some(1.0));
    }
}
