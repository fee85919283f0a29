//! Event publishing for chart widgets and the sync coordinator.

pub mod bus;
pub mod types;

pub use bus::{EventBus, Handler};
pub use types::{BusEvent, ChartEvent, ChartEventKind, RangeOrigin, SyncEvent, SyncEventKind};
