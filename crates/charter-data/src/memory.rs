//! In-memory data source.

use std::collections::HashMap;

use crate::source::DataSource;
use crate::validation::RawBar;

/// Serves records held in memory, keyed by asset code.
///
/// Useful for headless rendering, demos and tests. Codes registered with
/// [`StaticSource::fail`] return an error when fetched.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: HashMap<String, Vec<Option<RawBar>>>,
    failures: HashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register records for `code`.
    #[must_use]
    pub fn with(mut self, code: &str, records: Vec<Option<RawBar>>) -> Self {
        self.records.insert(code.to_string(), records);
        self
    }

    /// Register records for `code` from a JSON array (nulls allowed).
    pub fn with_json(self, code: &str, json: &str) -> anyhow::Result<Self> {
        let records = parse_records(json)?;
        Ok(self.with(code, records))
    }

    /// Make every fetch of `code` fail with `reason`.
    #[must_use]
    pub fn fail(mut self, code: &str, reason: &str) -> Self {
        self.failures.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataSource for StaticSource {
    async fn fetch(&self, code: &str) -> anyhow::Result<Vec<Option<RawBar>>> {
        if let Some(reason) = self.failures.get(code) {
            anyhow::bail!("{reason}");
        }
        self.records
            .get(code)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no records for {code}"))
    }
}

/// Parse a JSON array of records.
pub fn parse_records(json: &str) -> anyhow::Result<Vec<Option<RawBar>>> {
    Ok(serde_json::from_str(json)?)
}
