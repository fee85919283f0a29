//! In-memory rendering collaborator.
//!
//! [`RecordingLibrary`] implements the rendering traits without drawing
//! anything. It stores the state a real renderer would hold, logs every call
//! and can be told to fail specific operations. Headless runs and the test
//! suites use it in place of a real chart engine.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use anyhow::bail;
use charter_config::{ChartOptions, TimeScaleOptions, TimeScalePatch};
use charter_core::{LogicalRange, SeriesData, Time, TimeRange};

use crate::render::{
    ChartApi, ChartLibrary, Container, CrosshairCallback, RangeCallback, SeriesApi, SeriesKind, SeriesOptions, TimeScaleApi,
};

/// Builds [`RecordingChart`]s and keeps every chart it built.
#[derive(Default)]
pub struct RecordingLibrary {
    charts: RefCell<Vec<Rc<RecordingChart>>>,
    fail_create: RefCell<Option<String>>,
}

impl RecordingLibrary {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Make the next `create_chart` calls fail with `reason`.
    pub fn fail_create(&self, reason: &str) {
        *self.fail_create.borrow_mut() = Some(reason.to_string());
    }

    pub fn charts(&self) -> Vec<Rc<RecordingChart>> {
        self.charts.borrow().clone()
    }

    /// The most recently built chart.
    pub fn last_chart(&self) -> Option<Rc<RecordingChart>> {
        self.charts.borrow().last().cloned()
    }

    /// The most recent chart built inside the container with `id`.
    pub fn chart_for(&self, container_id: &str) -> Option<Rc<RecordingChart>> {
        self.charts
            .borrow()
            .iter()
            .rev()
            .find(|chart| chart.container.id == container_id)
            .cloned()
    }
}

impl ChartLibrary for RecordingLibrary {
    fn create_chart(&self, container: &Container, options: &ChartOptions) -> anyhow::Result<Rc<dyn ChartApi>> {
        if let Some(reason) = self.fail_create.borrow().as_ref() {
            bail!("{reason}");
        }
        let chart = Rc::new(RecordingChart::new(container.clone(), options.clone()));
        self.charts.borrow_mut().push(Rc::clone(&chart));
        Ok(chart)
    }
}

/// A chart that records what was done to it.
pub struct RecordingChart {
    pub container: Container,
    pub options: ChartOptions,
    series: RefCell<Vec<Rc<RecordingSeries>>>,
    removed: Cell<bool>,
    removed_series: Cell<usize>,
    time_scale: Rc<RecordingTimeScale>,
    fail_series: RefCell<Option<String>>,
    crosshair_subscribers: RefCell<Vec<Rc<dyn Fn(Option<Time>)>>>,
}

impl RecordingChart {
    fn new(container: Container, options: ChartOptions) -> Self {
        let time_scale = Rc::new(RecordingTimeScale::new(options.time_scale.clone()));
        Self {
            container,
            options,
            series: RefCell::new(Vec::new()),
            removed: Cell::new(false),
            removed_series: Cell::new(0),
            time_scale,
            fail_series: RefCell::new(None),
            crosshair_subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Make `add_series` fail with `reason`.
    pub fn fail_series(&self, reason: &str) {
        *self.fail_series.borrow_mut() = Some(reason.to_string());
    }

    /// Live series, in creation order.
    pub fn series(&self) -> Vec<Rc<RecordingSeries>> {
        self.series.borrow().clone()
    }

    pub fn series_of(&self, kind: SeriesKind) -> Vec<Rc<RecordingSeries>> {
        self.series
            .borrow()
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub fn removed_series_count(&self) -> usize {
        self.removed_series.get()
    }

    pub fn recording_time_scale(&self) -> Rc<RecordingTimeScale> {
        Rc::clone(&self.time_scale)
    }

    pub fn crosshair_subscriber_count(&self) -> usize {
        self.crosshair_subscribers.borrow().len()
    }

    /// Simulate the user hovering over the bar at `time`, or leaving the
    /// plot with `None`.
    pub fn simulate_crosshair(&self, time: Option<Time>) {
        let subscribers = self.crosshair_subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(time.clone());
        }
    }
}

impl ChartApi for RecordingChart {
    fn add_series(&self, kind: SeriesKind, options: &SeriesOptions) -> anyhow::Result<Rc<dyn SeriesApi>> {
        if self.removed.get() {
            bail!("chart has been removed");
        }
        if let Some(reason) = self.fail_series.borrow().as_ref() {
            bail!("{reason}");
        }
        let series = Rc::new(RecordingSeries::new(kind, options.clone()));
        self.series.borrow_mut().push(Rc::clone(&series));
        Ok(series)
    }

    fn remove_series(&self, series: &Rc<dyn SeriesApi>) -> anyhow::Result<()> {
        let target = Rc::as_ptr(series) as *const ();
        let mut list = self.series.borrow_mut();
        let before = list.len();
        list.retain(|s| Rc::as_ptr(s) as *const () != target);
        if list.len() == before {
            bail!("series does not belong to this chart");
        }
        self.removed_series.set(self.removed_series.get() + 1);
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        if self.removed.replace(true) {
            bail!("chart already removed");
        }
        Ok(())
    }

    fn time_scale(&self) -> Rc<dyn TimeScaleApi> {
        self.time_scale.clone()
    }

    fn subscribe_crosshair_move(&self, callback: CrosshairCallback) {
        self.crosshair_subscribers.borrow_mut().push(Rc::from(callback));
    }
}

/// A series that keeps its last data and options.
pub struct RecordingSeries {
    pub kind: SeriesKind,
    options: RefCell<SeriesOptions>,
    data: RefCell<Option<SeriesData>>,
    set_data_calls: Cell<usize>,
    option_updates: RefCell<Vec<SeriesOptions>>,
    fail_set_data: Cell<bool>,
}

impl RecordingSeries {
    fn new(kind: SeriesKind, options: SeriesOptions) -> Self {
        Self {
            kind,
            options: RefCell::new(options),
            data: RefCell::new(None),
            set_data_calls: Cell::new(0),
            option_updates: RefCell::new(Vec::new()),
            fail_set_data: Cell::new(false),
        }
    }

    /// Data from the last successful `set_data`.
    pub fn data(&self) -> Option<SeriesData> {
        self.data.borrow().clone()
    }

    pub fn set_data_calls(&self) -> usize {
        self.set_data_calls.get()
    }

    /// Options as created, with every update applied.
    pub fn options(&self) -> SeriesOptions {
        self.options.borrow().clone()
    }

    pub fn option_updates(&self) -> Vec<SeriesOptions> {
        self.option_updates.borrow().clone()
    }

    pub fn fail_set_data(&self, fail: bool) {
        self.fail_set_data.set(fail);
    }
}

impl SeriesApi for RecordingSeries {
    fn set_data(&self, data: &SeriesData) -> anyhow::Result<()> {
        self.set_data_calls.set(self.set_data_calls.get() + 1);
        if self.fail_set_data.get() {
            bail!("set_data rejected");
        }
        *self.data.borrow_mut() = Some(data.clone());
        Ok(())
    }

    fn apply_options(&self, options: &SeriesOptions) -> anyhow::Result<()> {
        let mut current = self.options.borrow_mut();
        macro_rules! take {
            ($($field:ident),*) => {
                $(if options.$field.is_some() {
                    current.$field = options.$field.clone();
                })*
            };
        }
        take!(
            title, color, up_color, down_color, border_up_color, border_down_color, wick_up_color,
            wick_down_color, line_width, price_scale_id, price_format, price_line_visible,
            last_value_visible, visible
        );
        self.option_updates.borrow_mut().push(options.clone());
        Ok(())
    }
}

/// Operations of [`TimeScaleApi`], for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeScaleOp {
    VisibleRange,
    SetVisibleRange,
    VisibleLogicalRange,
    SetVisibleLogicalRange,
    Options,
    ApplyOptions,
    FitContent,
}

/// One logged call.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeScaleCall {
    VisibleRange,
    SetVisibleRange(TimeRange),
    VisibleLogicalRange,
    SetVisibleLogicalRange(LogicalRange),
    Options,
    ApplyOptions(TimeScalePatch),
    FitContent,
}

impl TimeScaleCall {
    pub fn op(&self) -> TimeScaleOp {
        match self {
            TimeScaleCall::VisibleRange => TimeScaleOp::VisibleRange,
            TimeScaleCall::SetVisibleRange(_) => TimeScaleOp::SetVisibleRange,
            TimeScaleCall::VisibleLogicalRange => TimeScaleOp::VisibleLogicalRange,
            TimeScaleCall::SetVisibleLogicalRange(_) => TimeScaleOp::SetVisibleLogicalRange,
            TimeScaleCall::Options => TimeScaleOp::Options,
            TimeScaleCall::ApplyOptions(_) => TimeScaleOp::ApplyOptions,
            TimeScaleCall::FitContent => TimeScaleOp::FitContent,
        }
    }
}

type Subscribers<T> = RefCell<Vec<Rc<dyn Fn(Option<T>)>>>;

/// A time scale that stores ranges and notifies subscribers like a renderer.
///
/// Setters notify subscribers synchronously, as interactive renderers do.
/// `fit_content` jumps to the configured content range.
pub struct RecordingTimeScale {
    visible: Cell<Option<TimeRange>>,
    logical: Cell<Option<LogicalRange>>,
    content: Cell<LogicalRange>,
    options: RefCell<TimeScaleOptions>,
    calls: RefCell<Vec<TimeScaleCall>>,
    failing: RefCell<HashSet<TimeScaleOp>>,
    time_subscribers: Subscribers<TimeRange>,
    logical_subscribers: Subscribers<LogicalRange>,
}

impl RecordingTimeScale {
    fn new(options: TimeScaleOptions) -> Self {
        Self {
            visible: Cell::new(None),
            logical: Cell::new(None),
            content: Cell::new(LogicalRange::new(0.0, 100.0)),
            options: RefCell::new(options),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            time_subscribers: RefCell::new(Vec::new()),
            logical_subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<TimeScaleCall> {
        self.calls.borrow().clone()
    }

    /// Calls that changed state, without the reads.
    pub fn writes(&self) -> Vec<TimeScaleCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| {
                !matches!(
                    call,
                    TimeScaleCall::VisibleRange | TimeScaleCall::VisibleLogicalRange | TimeScaleCall::Options
                )
            })
            .cloned()
            .collect()
    }

    pub fn count(&self, op: TimeScaleOp) -> usize {
        self.calls.borrow().iter().filter(|call| call.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Make `op` fail until [`RecordingTimeScale::recover`] is called.
    pub fn fail(&self, op: TimeScaleOp) {
        self.failing.borrow_mut().insert(op);
    }

    pub fn recover(&self, op: TimeScaleOp) {
        self.failing.borrow_mut().remove(&op);
    }

    /// Range `fit_content` scrolls to.
    pub fn set_content_range(&self, range: LogicalRange) {
        self.content.set(range);
    }

    /// Set state without logging or notifying.
    pub fn preset(&self, visible: Option<TimeRange>, logical: Option<LogicalRange>) {
        self.visible.set(visible);
        self.logical.set(logical);
    }

    pub fn current_options(&self) -> TimeScaleOptions {
        self.options.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.time_subscribers.borrow().len() + self.logical_subscribers.borrow().len()
    }

    /// Simulate the user scrolling: store both ranges and notify subscribers.
    pub fn simulate_scroll(&self, visible: TimeRange, logical: LogicalRange) {
        self.visible.set(Some(visible));
        self.logical.set(Some(logical));
        self.notify_time(Some(visible));
        self.notify_logical(Some(logical));
    }

    /// Simulate a logical-range notification only.
    pub fn simulate_logical(&self, logical: LogicalRange) {
        self.logical.set(Some(logical));
        self.notify_logical(Some(logical));
    }

    fn record(&self, call: TimeScaleCall) -> anyhow::Result<()> {
        let op = call.op();
        self.calls.borrow_mut().push(call);
        if self.failing.borrow().contains(&op) {
            bail!("{op:?} failed");
        }
        Ok(())
    }

    fn notify_time(&self, range: Option<TimeRange>) {
        let subscribers = self.time_subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(range);
        }
    }

    fn notify_logical(&self, range: Option<LogicalRange>) {
        let subscribers = self.logical_subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(range);
        }
    }
}

impl TimeScaleApi for RecordingTimeScale {
    fn visible_range(&self) -> Option<TimeRange> {
        self.record(TimeScaleCall::VisibleRange).ok()?;
        self.visible.get()
    }

    fn set_visible_range(&self, range: TimeRange) -> anyhow::Result<()> {
        self.record(TimeScaleCall::SetVisibleRange(range))?;
        self.visible.set(Some(range));
        self.notify_time(Some(range));
        Ok(())
    }

    fn visible_logical_range(&self) -> Option<LogicalRange> {
        self.record(TimeScaleCall::VisibleLogicalRange).ok()?;
        self.logical.get()
    }

    fn set_visible_logical_range(&self, range: LogicalRange) -> anyhow::Result<()> {
        self.record(TimeScaleCall::SetVisibleLogicalRange(range))?;
        self.logical.set(Some(range));
        self.notify_logical(Some(range));
        Ok(())
    }

    fn options(&self) -> anyhow::Result<TimeScaleOptions> {
        self.record(TimeScaleCall::Options)?;
        Ok(self.options.borrow().clone())
    }

    fn apply_options(&self, patch: &TimeScalePatch) -> anyhow::Result<()> {
        self.record(TimeScaleCall::ApplyOptions(patch.clone()))?;
        let merged = self.options.borrow().merge(patch);
        *self.options.borrow_mut() = merged;
        Ok(())
    }

    fn subscribe_visible_time_range_change(&self, callback: RangeCallback<TimeRange>) {
        self.time_subscribers.borrow_mut().push(Rc::from(callback));
    }

    fn subscribe_visible_logical_range_change(&self, callback: RangeCallback<LogicalRange>) {
        self.logical_subscribers.borrow_mut().push(Rc::from(callback));
    }

    fn fit_content(&self) -> anyhow::Result<()> {
        self.record(TimeScaleCall::FitContent)?;
        let content = self.content.get();
        self.logical.set(Some(content));
        self.notify_logical(Some(content));
        Ok(())
    }
}
