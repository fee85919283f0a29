//! Per-chart status flags.

use charter_config::ChartKind;
use serde::Serialize;

/// Status flags of one chart widget, published with every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChartState {
    pub is_loading: bool,
    pub is_data_loaded: bool,
    pub is_aligned: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl ChartState {
    /// Record a failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.has_error = true;
        self.error_message = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.has_error = false;
        self.error_message = None;
    }
}

/// Lifecycle of a chart widget. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Created,
    Destroyed,
}

/// Snapshot returned by [`crate::ChartHandle::info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartInfo {
    pub id: String,
    pub kind: ChartKind,
    pub lifecycle: Lifecycle,
    pub state: ChartState,
    pub series_count: usize,
    pub has_chart: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ChartState::default();
        assert!(!state.is_loading);
        assert!(!state.is_data_loaded);
        assert!(!state.is_aligned);
        assert!(!state.has_error);
        assert_eq!(state.error_message, None);
    }

    #[test]
    fn test_fail_and_clear() {
        let mut state = ChartState::default();
        state.fail("no container");
        assert!(state.has_error);
        assert_eq!(state.error_message.as_deref(), Some("no container"));

        state.clear_error();
        assert_eq!(state, ChartState::default());
    }
}
