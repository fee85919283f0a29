//! Event type definitions.
//!
//! This module defines the events published by the widgets and the
//! coordinator:
//! - [`ChartEvent`] - lifecycle, series and viewport changes of one chart
//! - [`SyncEvent`] - outcomes of coordinator sync passes
//! - [`BusEvent`] - the trait that lets [`super::EventBus`] route them

use std::fmt;
use std::hash::Hash;

use charter_core::{Time, TimeRange};

use crate::error::ChartError;
use crate::render::{SeriesKind, SeriesOptions};
use crate::series::SeriesHandle;
use crate::sync::repair::RepairOutcome;
use crate::widget::state::ChartState;

/// An event that can be published on an [`super::EventBus`].
///
/// Handlers are registered per kind, so every event must report the
/// discriminant it is routed by.
pub trait BusEvent {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Events published by a chart widget.
#[derive(Debug, Clone)]
pub enum ChartEvent {
    /// A renderer instance was built.
    Created { chart_id: String },

    /// The renderer instance was torn down.
    Destroyed { chart_id: String },

    /// A series was added to the chart.
    SeriesAdded {
        kind: SeriesKind,
        series: SeriesHandle,
        options: SeriesOptions,
    },

    /// A failure that did not stop the widget.
    Error(ChartError),

    /// The visible time range moved.
    TimeRangeChanged {
        chart_id: String,
        /// Kind name of the emitting chart: `main`, `volume` or `indicator`.
        source: &'static str,
        origin: RangeOrigin,
        range: TimeRange,
    },

    /// The status flags changed.
    StateChange {
        old_state: ChartState,
        new_state: ChartState,
    },

    /// The chart scrolled and zoomed to show all data.
    ContentFitted,

    /// The crosshair moved to the bar at `time`; `None` when it left the plot.
    CrosshairMoved { time: Option<Time> },
}

/// What moved a chart's visible time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOrigin {
    /// The user scrolled or zoomed the primary chart.
    User,
    /// The coordinator copied the primary's range onto a secondary.
    Sync,
    /// A caller set the range through the widget.
    Api,
}

/// Routing key for [`ChartEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartEventKind {
    Created,
    Destroyed,
    SeriesAdded,
    Error,
    TimeRangeChanged,
    StateChange,
    ContentFitted,
    CrosshairMoved,
}

impl ChartEventKind {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ChartEventKind::Created => "created",
            ChartEventKind::Destroyed => "destroyed",
            ChartEventKind::SeriesAdded => "seriesAdded",
            ChartEventKind::Error => "error",
            ChartEventKind::TimeRangeChanged => "timeRangeChanged",
            ChartEventKind::StateChange => "stateChange",
            ChartEventKind::ContentFitted => "contentFitted",
            ChartEventKind::CrosshairMoved => "crosshairMove",
        }
    }
}

impl BusEvent for ChartEvent {
    type Kind = ChartEventKind;

    fn kind(&self) -> ChartEventKind {
        match self {
            ChartEvent::Created { .. } => ChartEventKind::Created,
            ChartEvent::Destroyed { .. } => ChartEventKind::Destroyed,
            ChartEvent::SeriesAdded { .. } => ChartEventKind::SeriesAdded,
            ChartEvent::Error(_) => ChartEventKind::Error,
            ChartEvent::TimeRangeChanged { .. } => ChartEventKind::TimeRangeChanged,
            ChartEvent::StateChange { .. } => ChartEventKind::StateChange,
            ChartEvent::ContentFitted => ChartEventKind::ContentFitted,
            ChartEvent::CrosshairMoved { .. } => ChartEventKind::CrosshairMoved,
        }
    }
}

/// Events published by the sync coordinator.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A sync pass finished; `charts` secondaries were updated.
    Synced { charts: usize },

    /// Updating one secondary failed. The pass continued with the others.
    Error(ChartError),

    /// A new chart became the primary.
    PrimaryChanged { key: String },

    /// The primary's logical range was scrolled before the first bar and
    /// had to be repaired.
    Repaired { key: String, outcome: RepairOutcome },
}

/// Routing key for [`SyncEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEventKind {
    Synced,
    Error,
    PrimaryChanged,
    Repaired,
}

impl BusEvent for SyncEvent {
    type Kind = SyncEventKind;

    fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::Synced { .. } => SyncEventKind::Synced,
            SyncEvent::Error(_) => SyncEventKind::Error,
            SyncEvent::PrimaryChanged { .. } => SyncEventKind::PrimaryChanged,
            SyncEvent::Repaired { .. } => SyncEventKind::Repaired,
        }
    }
}
