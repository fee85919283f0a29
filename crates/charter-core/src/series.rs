//! Series payloads and the TimeSeries container for indicator output.

use serde::{Deserialize, Serialize};

use crate::candle::Candle;
use crate::time::Time;

/// A single value plotted at a time, used by line series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub time: Time,
    pub value: f64,
}

impl LinePoint {
    pub fn new(time: impl Into<Time>, value: f64) -> Self {
        Self {
            time: time.into(),
            value,
        }
    }

    /// Copy with the value multiplied by `ratio`.
    #[must_use]
    pub fn scaled(&self, ratio: f64) -> Self {
        Self {
            time: self.time.clone(),
            value: self.value * ratio,
        }
    }
}

/// A bar in a histogram series with an optional per-bar color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPoint {
    pub time: Time,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Data handed to a renderer series in one `set_data` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Candles(Vec<Candle>),
    Line(Vec<LinePoint>),
    Histogram(Vec<HistogramPoint>),
}

impl SeriesData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Candles(data) => data.len(),
            SeriesData::Line(data) => data.len(),
            SeriesData::Histogram(data) => data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A time-indexed series of values, typically used for indicator output.
#[derive(Debug, Clone)]
pub struct TimeSeries<T> {
    /// The values in the series, aligned with candle indices.
    values: Vec<Option<T>>,
    /// Starting index (offset from the first candle).
    start_index: usize,
}

impl<T> TimeSeries<T> {
    /// Creates a new empty TimeSeries.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            start_index: 0,
        }
    }

    /// Creates a TimeSeries with the given values starting at the specified index.
    pub fn with_offset(values: Vec<Option<T>>, start_index: usize) -> Self {
        Self {
            values,
            start_index,
        }
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Gets the value at the given candle index, if available.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.start_index {
            return None;
        }
        self.values
            .get(index - self.start_index)
            .and_then(|v| v.as_ref())
    }

    /// Returns an iterator over (candle index, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|val| (self.start_index + i, val)))
    }

    pub fn values(&self) -> &[Option<T>] {
        &self.values
    }
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TimeSeries<T> {
    /// Creates a TimeSeries from a slice of values, all present.
    pub fn from_values(values: &[T], start_index: usize) -> Self {
        Self {
            values: values.iter().cloned().map(Some).collect(),
            start_index,
        }
    }
}

impl TimeSeries<f64> {
    /// Pair each present value with the time of the candle it is aligned to.
    ///
    /// Values whose index falls outside `candles` are dropped.
    pub fn to_line_points(&self, candles: &[Candle]) -> Vec<LinePoint> {
        self.iter()
            .filter_map(|(index, value)| {
                candles.get(index).map(|candle| LinePoint {
                    time: candle.time.clone(),
                    value: *value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_lookup() {
        let series = TimeSeries::with_offset(vec![Some(1.0), None, Some(3.0)], 2);
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(2), Some(&1.0));
        assert_eq!(series.get(3), None);
        assert_eq!(series.get(4), Some(&3.0));
        assert_eq!(series.iter().count(), 2);
    }

    #[test]
    fn test_to_line_points_uses_candle_times() {
        let candles = vec![
            Candle::new("2023-01-01", 1.0, 1.0, 1.0, 1.0),
            Candle::new("2023-01-02", 1.0, 1.0, 1.0, 1.0),
            Candle::new("2023-01-03", 1.0, 1.0, 1.0, 1.0),
        ];
        let series = TimeSeries::with_offset(vec![Some(10.0), Some(11.0), Some(12.0)], 1);
        let points = series.to_line_points(&candles);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0], LinePoint::new("2023-01-02", 10.0));
        assert_eq!(points[1], LinePoint::new("2023-01-03", 11.0));
    }

    #[test]
    fn test_series_data_len() {
        let data = SeriesData::Line(vec![LinePoint::new(1.0, 2.0)]);
        assert_eq!(data.len(), 1);
        assert!(!data.is_empty());
        assert!(SeriesData::Histogram(Vec::new()).is_empty());
    }
}
