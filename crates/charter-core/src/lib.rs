//! Core types for the charter workspace.
//!
//! This crate provides the data structures shared by every other crate:
//! - `Candle` - OHLCV bar data
//! - `Time`, `TimeRange`, `LogicalRange` - time values and viewport ranges
//! - `LinePoint`, `HistogramPoint`, `SeriesData` - renderer series payloads
//! - `TimeSeries` - container for indicator output

pub mod candle;
pub mod series;
pub mod time;

pub use candle::{Candle, OHLCV};
pub use series::{HistogramPoint, LinePoint, SeriesData, TimeSeries};
pub use time::{LogicalRange, Time, TimeRange};
