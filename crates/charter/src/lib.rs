//! Synchronized multi-chart widgets.
//!
//! A [`MainChart`] draws one candlestick series per asset and acts as the
//! primary chart of a [`SyncCoordinator`]. Volume and indicator sub-charts
//! register as secondaries and follow every scroll and zoom of the main
//! chart. Prices of assets on very different scales can be normalized onto
//! the first visible asset.
//!
//! Rendering is delegated to a [`ChartLibrary`]. With the `testing` feature,
//! `recording` provides an in-memory implementation for headless use and
//! tests.
//!
//! # Usage Pattern
//!
//! ```ignore
//! let ctx = ChartContext::new(Some(library), Rc::new(TokioScheduler), Config::load_default());
//! let main = MainChart::new(&ctx, Container::new("main", 1000, 400));
//! let report = main.load_data(&source, &["600000", "000001"], &[IndicatorKind::MovingAverage(5)]).await?;
//! main.create_volume_subchart(Container::new("volume", 1000, 150))?;
//! ```

pub mod context;
pub mod error;
pub mod events;
pub mod normalize;
#[cfg(any(test, feature = "testing"))]
pub mod recording;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod series;
pub mod sync;
pub mod widget;

pub use context::ChartContext;
pub use error::{ChartError, Result};
pub use events::{ChartEvent, ChartEventKind, EventBus, RangeOrigin, SyncEvent, SyncEventKind};
pub use normalize::{ColorScheme, StockBook, StockInfo};
pub use registry::ChartRegistry;
pub use render::{ChartApi, ChartLibrary, Container, CrosshairCallback, SeriesApi, SeriesKind, SeriesOptions, TimeScaleApi};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use series::SeriesHandle;
pub use sync::{RepairOutcome, SyncCoordinator};
pub use widget::{format_volume, ChartHandle, ChartWidget, IndicatorChart, LoadReport, MainChart, StockQuote, VolumeChart};
