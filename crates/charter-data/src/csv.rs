//! CSV data source: one `<code>.csv` file per asset.

use std::path::{Path, PathBuf};

use charter_core::Time;

use crate::source::DataSource;
use crate::validation::RawBar;

/// Loads raw records from a directory of CSV files.
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding `code`'s records.
    pub fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.csv"))
    }
}

impl DataSource for CsvSource {
    async fn fetch(&self, code: &str) -> anyhow::Result<Vec<Option<RawBar>>> {
        load_bars_from_csv(self.path_for(code))
    }
}

/// Load raw records from a CSV file.
///
/// Columns are located by header name (`time`/`timestamp`/`date`, `open`,
/// `high`, `low`, `close`, `volume`, `value`); without a recognisable
/// header the order `time,open,high,low,close,volume` is assumed. Cells
/// that are empty or unparsable become `None` so validation can reject
/// the record instead of the whole file failing.
pub fn load_bars_from_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Option<RawBar>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let headers_lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let find = |names: &[&str]| headers_lower.iter().position(|h| names.contains(&h.as_str()));

    let time_col = find(&["time", "timestamp", "date", "datetime"]).unwrap_or(0);
    let open_col = find(&["open"]).unwrap_or(1);
    let high_col = find(&["high"]).unwrap_or(2);
    let low_col = find(&["low"]).unwrap_or(3);
    let close_col = find(&["close"]).unwrap_or(4);
    let volume_col = find(&["volume", "vol"]).unwrap_or(5);
    let value_col = find(&["value"]);

    let mut bars = Vec::new();
    for result in reader.records() {
        let record = result?;
        let number = |col: usize| record.get(col).and_then(|s| s.trim().parse::<f64>().ok());

        let time = record
            .get(time_col)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_time_cell);

        bars.push(Some(RawBar {
            time,
            open: number(open_col),
            high: number(high_col),
            low: number(low_col),
            close: number(close_col),
            volume: number(volume_col),
            value: value_col.and_then(number),
        }));
    }

    log::debug!("Loaded {} CSV records", bars.len());
    Ok(bars)
}

fn parse_time_cell(cell: &str) -> Time {
    match cell.parse::<f64>() {
        Ok(ts) => Time::Timestamp(ts),
        Err(_) => Time::Text(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_valid_data;

    fn write_csv(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("charter-csv-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("AAPL.csv"), content).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_fetch_with_header() {
        let dir = write_csv(
            "header",
            "Date,Open,High,Low,Close,Volume\n\
             2023-01-01,100,105,95,102,1000\n\
             2023-01-02,102,,101,104,1100\n\
             1672704000,104,108,103,107,900\n",
        );
        let source = CsvSource::new(&dir);
        let bars = source.fetch("AAPL").await.unwrap();

        assert_eq!(bars.len(), 3);
        let first = bars[0].as_ref().unwrap();
        assert_eq!(first.time, Some(Time::from("2023-01-01")));
        assert_eq!(first.volume, Some(1000.0));
        assert_eq!(bars[2].as_ref().unwrap().time, Some(Time::Timestamp(1_672_704_000.0)));

        // The row with an empty high is rejected by validation, not by the loader
        assert_eq!(filter_valid_data(&bars).len(), 2);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let source = CsvSource::new(std::env::temp_dir().join("charter-csv-does-not-exist"));
        assert!(source.fetch("NOPE").await.is_err());
    }
}
