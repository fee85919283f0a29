//! Error types for chart widgets and synchronization.

use thiserror::Error;

use crate::render::SeriesKind;

/// Errors produced by chart widgets and the sync coordinator.
///
/// Construction-time failures are returned to the caller. Failures during
/// steady-state updates are published as error events and the widget keeps
/// running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("chart library is not available: {0}")]
    LibraryUnavailable(String),

    #[error("invalid chart container: {0}")]
    InvalidContainer(String),

    #[error("failed to build chart: {0}")]
    ChartCreationFailed(String),

    #[error("invalid time range: {from} .. {to}")]
    InvalidRange { from: f64, to: f64 },

    #[error("failed to add {kind} series: {reason}")]
    SeriesCreationFailed { kind: SeriesKind, reason: String },

    #[error("failed to sync chart '{key}': {reason}")]
    SyncFailure { key: String, reason: String },

    #[error("failed to load data for {code}: {reason}")]
    DataLoadFailure { code: String, reason: String },

    #[error("chart has been destroyed")]
    Destroyed,
}

impl ChartError {
    /// Construction-time errors that leave the widget unusable until the
    /// caller fixes its environment.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChartError::LibraryUnavailable(_)
                | ChartError::InvalidContainer(_)
                | ChartError::ChartCreationFailed(_)
                | ChartError::Destroyed
        )
    }
}

/// Result type for chart operations.
pub type Result<T> = std::result::Result<T, ChartError>;

/// Flatten a collaborator error chain into one line.
pub(crate) fn reason(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ChartError::SeriesCreationFailed {
            kind: SeriesKind::Histogram,
            reason: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "failed to add histogram series: boom");

        let err = ChartError::SyncFailure {
            key: "volume".to_string(),
            reason: "detached".to_string(),
        };
        assert_eq!(err.to_string(), "failed to sync chart 'volume': detached");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ChartError::Destroyed.is_fatal());
        assert!(ChartError::LibraryUnavailable("missing".into()).is_fatal());
        assert!(!ChartError::InvalidRange { from: 2.0, to: 1.0 }.is_fatal());
        assert!(!ChartError::DataLoadFailure {
            code: "AAPL".into(),
            reason: "timeout".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_reason_keeps_context() {
        let err = anyhow::anyhow!("socket closed").context("fetch failed");
        assert_eq!(reason(&err), "fetch failed: socket closed");
    }
}
