//! Data source trait definition.

use std::future::Future;

use crate::validation::RawBar;

/// Trait for types that can fetch raw records for one asset.
///
/// One request per asset code. Records may contain nulls; validation happens
/// on the consumer side with [`crate::filter_valid_data`]. Futures are not
/// required to be `Send`; charts fetch on a single-threaded executor.
///
/// This trait uses `anyhow::Result` for flexible error handling.
pub trait DataSource {
    fn fetch(&self, code: &str) -> impl Future<Output = anyhow::Result<Vec<Option<RawBar>>>>;
}
