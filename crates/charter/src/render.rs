//! Rendering collaborator contract.
//!
//! The chart engine that draws pixels lives outside this crate. These traits
//! are the seam: a [`ChartLibrary`] builds [`ChartApi`] instances inside a
//! [`Container`], each chart owns series ([`SeriesApi`]) and one horizontal
//! axis ([`TimeScaleApi`]). Implementations report failures through
//! `anyhow::Result`; the widgets translate them into [`crate::ChartError`].
//!
//! All handles are `Rc`-shared and single-threaded. Subscription callbacks
//! may be invoked synchronously from inside a setter call, so callers must
//! not hold `RefCell` borrows across calls into these traits.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use charter_config::{ChartOptions, TimeScaleOptions, TimeScalePatch};
use charter_core::{LogicalRange, SeriesData, Time, TimeRange};
use serde::Serialize;

/// Mount target for a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Whether the container is attached to a live surface.
    pub mounted: bool,
}

impl Container {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            mounted: true,
        }
    }

    /// A container that exists but is not attached to anything.
    pub fn detached(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            width: 0,
            height: 0,
            mounted: false,
        }
    }
}

/// Series types a chart can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Candlestick,
    Line,
    Histogram,
    Area,
    Bar,
    Baseline,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Candlestick => "candlestick",
            SeriesKind::Line => "line",
            SeriesKind::Histogram => "histogram",
            SeriesKind::Area => "area",
            SeriesKind::Bar => "bar",
            SeriesKind::Baseline => "baseline",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candlestick" => Ok(SeriesKind::Candlestick),
            "line" => Ok(SeriesKind::Line),
            "histogram" => Ok(SeriesKind::Histogram),
            "area" => Ok(SeriesKind::Area),
            "bar" => Ok(SeriesKind::Bar),
            "baseline" => Ok(SeriesKind::Baseline),
            other => Err(format!("unknown series kind: {other}")),
        }
    }
}

/// How a series formats its price labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceFormat {
    Price,
    Volume,
    Percent,
}

/// Series styling. Unset fields keep the renderer's current value, so the
/// same struct serves for creation and for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_up_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_down_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wick_up_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wick_down_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_scale_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_format: Option<PriceFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_line_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_value_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl SeriesOptions {
    /// Update that only toggles visibility.
    pub fn visibility(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Default::default()
        }
    }
}

/// Builds chart instances.
pub trait ChartLibrary {
    fn create_chart(&self, container: &Container, options: &ChartOptions) -> anyhow::Result<Rc<dyn ChartApi>>;
}

/// One chart instance owned by the renderer.
pub trait ChartApi {
    fn add_series(&self, kind: SeriesKind, options: &SeriesOptions) -> anyhow::Result<Rc<dyn SeriesApi>>;

    fn remove_series(&self, series: &Rc<dyn SeriesApi>) -> anyhow::Result<()>;

    /// Release the instance. The handle must not be used afterwards.
    fn remove(&self) -> anyhow::Result<()>;

    fn time_scale(&self) -> Rc<dyn TimeScaleApi>;

    /// Notify `callback` with the bar time under the crosshair, or `None`
    /// when the crosshair leaves the plot.
    fn subscribe_crosshair_move(&self, callback: CrosshairCallback);
}

/// One plotted series.
pub trait SeriesApi {
    fn set_data(&self, data: &SeriesData) -> anyhow::Result<()>;

    fn apply_options(&self, options: &SeriesOptions) -> anyhow::Result<()>;
}

/// Callback receiving the new range, or `None` when the chart has no data.
pub type RangeCallback<T> = Box<dyn Fn(Option<T>)>;

pub type CrosshairCallback = Box<dyn Fn(Option<Time>)>;

/// The horizontal axis of one chart.
pub trait TimeScaleApi {
    fn visible_range(&self) -> Option<TimeRange>;

    fn set_visible_range(&self, range: TimeRange) -> anyhow::Result<()>;

    fn visible_logical_range(&self) -> Option<LogicalRange>;

    fn set_visible_logical_range(&self, range: LogicalRange) -> anyhow::Result<()>;

    fn options(&self) -> anyhow::Result<TimeScaleOptions>;

    fn apply_options(&self, patch: &TimeScalePatch) -> anyhow::Result<()>;

    fn subscribe_visible_time_range_change(&self, callback: RangeCallback<TimeRange>);

    fn subscribe_visible_logical_range_change(&self, callback: RangeCallback<LogicalRange>);

    /// Scroll and zoom so every bar is visible.
    fn fit_content(&self) -> anyhow::Result<()>;
}
