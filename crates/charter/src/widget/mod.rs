//! Chart widgets.
//!
//! Every widget composes a [`handle::ChartHandle`] and exposes the common
//! capabilities through [`ChartWidget`]. Widgets differ in what they draw:
//! the [`main_chart::MainChart`] draws one candlestick series per asset and
//! drives the viewport, the sub-charts follow it.

use charter_core::{LogicalRange, TimeRange};

use crate::error::Result;
use crate::events::{ChartEvent, EventBus};
use crate::render::{SeriesKind, SeriesOptions};
use crate::series::SeriesHandle;

pub mod handle;
pub mod indicator;
pub mod main_chart;
pub mod state;
pub mod volume;

pub use handle::{ChartHandle, WeakChartHandle};
pub use indicator::IndicatorChart;
pub use main_chart::{format_volume, LoadReport, MainChart, StockQuote};
pub use state::{ChartInfo, ChartState, Lifecycle};
pub use volume::{volume_points, VolumeChart};

/// Capabilities shared by every chart widget.
pub trait ChartWidget {
    fn handle(&self) -> &ChartHandle;

    /// Build the renderer instance and the widget's own series.
    fn create(&self) -> Result<()> {
        self.handle().create().map(|_| ())
    }

    fn destroy(&self) {
        self.handle().destroy();
    }

    fn add_series(&self, kind: SeriesKind, options: SeriesOptions) -> Option<SeriesHandle> {
        self.handle().add_series(kind, options)
    }

    fn set_time_range(&self, range: TimeRange) {
        self.handle().set_time_range(range);
    }

    fn time_range(&self) -> Option<TimeRange> {
        self.handle().time_range()
    }

    fn logical_range(&self) -> Option<LogicalRange> {
        self.handle().logical_range()
    }

    fn events(&self) -> &EventBus<ChartEvent> {
        self.handle().events()
    }
}
