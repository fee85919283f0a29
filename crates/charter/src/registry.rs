//! Lookup of live chart handles by id.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::widget::handle::{ChartHandle, WeakChartHandle};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate an id of the form `<prefix>_<unix millis>_<sequence>`.
pub fn generate_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{:x}", prefix, Utc::now().timestamp_millis(), seq)
}

/// Every chart handle created through a context, by id.
///
/// Entries are weak: the registry never keeps a chart alive. Destroyed
/// charts unregister themselves.
#[derive(Default)]
pub struct ChartRegistry {
    charts: RefCell<Vec<(String, WeakChartHandle)>>,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: &ChartHandle) {
        let mut charts = self.charts.borrow_mut();
        charts.retain(|(id, _)| id != handle.id());
        charts.push((handle.id().to_string(), handle.downgrade()));
    }

    /// Returns false if `id` was not registered.
    pub fn unregister(&self, id: &str) -> bool {
        let mut charts = self.charts.borrow_mut();
        let before = charts.len();
        charts.retain(|(chart_id, _)| chart_id != id);
        charts.len() != before
    }

    pub fn get(&self, id: &str) -> Option<ChartHandle> {
        self.charts
            .borrow()
            .iter()
            .find(|(chart_id, _)| chart_id == id)
            .and_then(|(_, weak)| weak.upgrade())
    }

    /// Live charts, in registration order.
    pub fn charts(&self) -> Vec<ChartHandle> {
        self.charts
            .borrow()
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    /// Number of live charts.
    pub fn len(&self) -> usize {
        self.charts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose chart no longer exists.
    pub fn prune(&self) {
        self.charts
            .borrow_mut()
            .retain(|(_, weak)| weak.upgrade().is_some());
    }

    pub fn clear(&self) {
        self.charts.borrow_mut().clear();
    }
}
