//! Data loading utilities for charter.

pub mod csv;
pub mod memory;
pub mod source;
pub mod validation;

pub use self::csv::CsvSource;
pub use memory::StaticSource;
pub use source::DataSource;
pub use validation::{filter_valid_data, filter_valid_points, validate_candle, RawBar};
