//! Lifecycle wrapper around one renderer chart instance.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use charter_config::{ChartKind, ChartOptionsOverride, Config, TimeScalePatch};
use charter_core::{LogicalRange, Time, TimeRange};

use crate::context::ChartContext;
use crate::error::{reason, ChartError, Result};
use crate::events::{ChartEvent, EventBus, RangeOrigin};
use crate::registry::{generate_id, ChartRegistry};
use crate::render::{
    ChartApi, ChartLibrary, Container, CrosshairCallback, RangeCallback, SeriesKind, SeriesOptions, TimeScaleApi,
};
use crate::scheduler::Scheduler;
use crate::series::SeriesHandle;
use crate::sync::coordinator::SyncCoordinator;
use crate::sync::repair;
use crate::widget::state::{ChartInfo, ChartState, Lifecycle};

/// Shared handle to one chart widget's renderer instance, series, status
/// flags and event bus.
///
/// Cloning is cheap and shares the same chart. The handle moves through
/// `Uninitialized -> Created -> Destroyed`; `Destroyed` is terminal.
#[derive(Clone)]
pub struct ChartHandle {
    inner: Rc<HandleInner>,
}

/// Non-owning reference to a [`ChartHandle`].
#[derive(Clone)]
pub struct WeakChartHandle {
    inner: Weak<HandleInner>,
}

impl WeakChartHandle {
    pub fn upgrade(&self) -> Option<ChartHandle> {
        self.inner.upgrade().map(|inner| ChartHandle { inner })
    }
}

struct HandleInner {
    id: String,
    kind: ChartKind,
    container: Option<Container>,
    overrides: ChartOptionsOverride,
    library: Option<Rc<dyn ChartLibrary>>,
    scheduler: Rc<dyn Scheduler>,
    config: Rc<Config>,
    registry: Weak<ChartRegistry>,
    coordinator: RefCell<Option<(Weak<SyncCoordinator>, String)>>,
    instance: RefCell<Option<Rc<dyn ChartApi>>>,
    series: RefCell<Vec<SeriesHandle>>,
    lifecycle: Cell<Lifecycle>,
    state: RefCell<ChartState>,
    events: EventBus<ChartEvent>,
    retry_count: Cell<u32>,
}

impl ChartHandle {
    /// Create an uninitialized handle and register it in the context's
    /// registry. No renderer call happens until [`ChartHandle::create`].
    pub fn new(
        ctx: &ChartContext,
        kind: ChartKind,
        container: Option<Container>,
        overrides: ChartOptionsOverride,
    ) -> Self {
        let handle = Self {
            inner: Rc::new(HandleInner {
                id: generate_id("chart"),
                kind,
                container,
                overrides,
                library: ctx.library(),
                scheduler: ctx.scheduler(),
                config: ctx.config(),
                registry: Rc::downgrade(ctx.registry()),
                coordinator: RefCell::new(None),
                instance: RefCell::new(None),
                series: RefCell::new(Vec::new()),
                lifecycle: Cell::new(Lifecycle::Uninitialized),
                state: RefCell::new(ChartState::default()),
                events: EventBus::new(),
                retry_count: Cell::new(0),
            }),
        };
        ctx.registry().register(&handle);
        handle
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> ChartKind {
        self.inner.kind
    }

    pub fn container(&self) -> Option<&Container> {
        self.inner.container.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    /// Whether a live renderer instance exists.
    pub fn is_created(&self) -> bool {
        self.lifecycle() == Lifecycle::Created
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// The widget's event bus.
    pub fn events(&self) -> &EventBus<ChartEvent> {
        &self.inner.events
    }

    pub fn downgrade(&self) -> WeakChartHandle {
        WeakChartHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &ChartHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy of the status flags.
    pub fn state(&self) -> ChartState {
        self.inner.state.borrow().clone()
    }

    /// Change the status flags and publish `StateChange` with the old and
    /// new values.
    pub fn update_state(&self, f: impl FnOnce(&mut ChartState)) {
        let (old_state, new_state) = {
            let mut state = self.inner.state.borrow_mut();
            let old_state = state.clone();
            f(&mut state);
            (old_state, state.clone())
        };
        self.inner.events.emit(&ChartEvent::StateChange { old_state, new_state });
    }

    pub fn info(&self) -> ChartInfo {
        ChartInfo {
            id: self.inner.id.clone(),
            kind: self.inner.kind,
            lifecycle: self.lifecycle(),
            state: self.state(),
            series_count: self.series_count(),
            has_chart: self.instance().is_some(),
        }
    }

    /// The live renderer instance.
    pub fn instance(&self) -> Option<Rc<dyn ChartApi>> {
        self.inner.instance.borrow().clone()
    }

    pub fn time_scale(&self) -> Option<Rc<dyn TimeScaleApi>> {
        self.instance().map(|instance| instance.time_scale())
    }

    /// Build the renderer instance.
    ///
    /// Options are the preset for this chart's kind merged with the
    /// handle's overrides. An existing instance is torn down first (emitting
    /// `Destroyed`). Environment problems are recorded in the status flags
    /// and returned; a renderer failure is also published as an error event.
    pub fn create(&self) -> Result<Rc<dyn ChartApi>> {
        let inner = &self.inner;
        if self.is_destroyed() {
            return Err(ChartError::Destroyed);
        }

        let Some(library) = inner.library.clone() else {
            return Err(self.fail_creation(ChartError::LibraryUnavailable(
                "no rendering library configured".to_string(),
            )));
        };
        let container = match &inner.container {
            Some(container) if container.mounted => container.clone(),
            Some(container) => {
                return Err(self.fail_creation(ChartError::InvalidContainer(format!(
                    "container '{}' is not mounted",
                    container.id
                ))));
            }
            None => {
                return Err(self.fail_creation(ChartError::InvalidContainer(
                    "no container provided".to_string(),
                )));
            }
        };

        let options = inner.config.chart_options_with(inner.kind, &inner.overrides);
        if let Err(e) = options.validate() {
            return Err(self.fail_creation(ChartError::ChartCreationFailed(e.to_string())));
        }

        // a failed rebuild must not report the old instance as live
        if self.teardown_instance(true) {
            inner.lifecycle.set(Lifecycle::Uninitialized);
        }

        let instance = match library.create_chart(&container, &options) {
            Ok(instance) => instance,
            Err(e) => {
                let err = self.fail_creation(ChartError::ChartCreationFailed(reason(&e)));
                inner.events.emit(&ChartEvent::Error(err.clone()));
                return Err(err);
            }
        };

        let weak = self.downgrade();
        instance.subscribe_crosshair_move(Box::new(move |time: Option<Time>| {
            if let Some(handle) = weak.upgrade() {
                handle.events().emit(&ChartEvent::CrosshairMoved { time });
            }
        }));
        *inner.instance.borrow_mut() = Some(Rc::clone(&instance));
        inner.lifecycle.set(Lifecycle::Created);
        inner.retry_count.set(0);
        if self.state().has_error {
            self.update_state(ChartState::clear_error);
        }

        log::info!("Created {} chart {}", inner.kind.as_str(), inner.id);
        inner.events.emit(&ChartEvent::Created {
            chart_id: inner.id.clone(),
        });
        Ok(instance)
    }

    fn fail_creation(&self, err: ChartError) -> ChartError {
        log::error!("Failed to create chart {}: {}", self.inner.id, err);
        let message = err.to_string();
        self.update_state(|state| state.fail(message));
        err
    }

    /// Add a series to the live instance.
    ///
    /// Returns `None` without an instance, or when the renderer refuses the
    /// series (published as an error event). A logical range pushed before
    /// the first bar by the new series is repaired.
    pub fn add_series(&self, kind: SeriesKind, options: SeriesOptions) -> Option<SeriesHandle> {
        let Some(instance) = self.instance() else {
            log::debug!("Cannot add {} series to chart {}: not created", kind, self.inner.id);
            return None;
        };

        let before = self.logical_range();
        match instance.add_series(kind, &options) {
            Ok(api) => {
                let series = SeriesHandle::new(kind, options.clone(), api);
                self.inner.series.borrow_mut().push(series.clone());
                self.inner.events.emit(&ChartEvent::SeriesAdded {
                    kind,
                    series: series.clone(),
                    options,
                });
                let after = self.logical_range();
                repair::check_and_fix_negative_logical_range(self, before, after, kind);
                Some(series)
            }
            Err(e) => {
                let err = ChartError::SeriesCreationFailed {
                    kind,
                    reason: reason(&e),
                };
                log::warn!("{}", err);
                self.inner.events.emit(&ChartEvent::Error(err));
                None
            }
        }
    }

    /// Add a series by kind name. Unknown names return `None`.
    pub fn add_series_by_name(&self, kind: &str, options: SeriesOptions) -> Option<SeriesHandle> {
        match kind.parse::<SeriesKind>() {
            Ok(kind) => self.add_series(kind, options),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    /// Remove one series. Returns false if it does not belong to this chart.
    pub fn remove_series(&self, series: &SeriesHandle) -> bool {
        let removed = {
            let mut list = self.inner.series.borrow_mut();
            let before = list.len();
            list.retain(|s| !s.ptr_eq(series));
            list.len() != before
        };
        if removed {
            if let Some(instance) = self.instance() {
                if let Err(e) = instance.remove_series(series.api()) {
                    log::warn!("Failed to remove series from chart {}: {:#}", self.inner.id, e);
                }
            }
        }
        removed
    }

    pub fn series(&self) -> Vec<SeriesHandle> {
        self.inner.series.borrow().clone()
    }

    pub fn series_count(&self) -> usize {
        self.inner.series.borrow().len()
    }

    /// Apply a visible time range.
    ///
    /// Invalid ranges and charts without an instance are ignored. While the
    /// chart has no series the request is retried after the configured
    /// delay, up to the configured number of attempts.
    pub fn set_time_range(&self, range: TimeRange) {
        if !range.is_valid() {
            log::debug!("Ignoring invalid time range {:?} for chart {}", range, self.inner.id);
            return;
        }
        let Some(time_scale) = self.time_scale() else {
            log::debug!("Ignoring time range for chart {}: not created", self.inner.id);
            return;
        };
        if self.inner.series.borrow().is_empty() {
            self.schedule_retry(range);
            return;
        }

        match time_scale.set_visible_range(range) {
            Ok(()) => {
                self.inner.retry_count.set(0);
                self.notify_time_range(range, RangeOrigin::Api);
            }
            Err(e) => {
                let err = ChartError::SyncFailure {
                    key: self.inner.id.clone(),
                    reason: reason(&e),
                };
                log::warn!("{}", err);
                self.inner.events.emit(&ChartEvent::Error(err));
            }
        }
    }

    /// Apply a visible range given as data-source times. Times that cannot
    /// be converted leave the chart untouched.
    pub fn set_time_span(&self, from: &Time, to: &Time) {
        match TimeRange::from_times(from, to) {
            Some(range) => self.set_time_range(range),
            None => log::debug!("Ignoring unconvertible time span {:?} .. {:?}", from, to),
        }
    }

    /// Publish `TimeRangeChanged` for a range that is already on screen.
    pub(crate) fn notify_time_range(&self, range: TimeRange, origin: RangeOrigin) {
        self.inner.events.emit(&ChartEvent::TimeRangeChanged {
            chart_id: self.inner.id.clone(),
            source: self.inner.kind.as_str(),
            origin,
            range,
        });
    }

    /// Number of pending time-range retries.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.get()
    }

    fn schedule_retry(&self, range: TimeRange) {
        let sync = &self.inner.config.sync;
        let attempts = self.inner.retry_count.get();
        if attempts >= sync.retry_max_attempts {
            log::warn!(
                "Dropping time range for chart {} after {} attempts without series",
                self.inner.id,
                attempts
            );
            self.inner.retry_count.set(0);
            return;
        }
        self.inner.retry_count.set(attempts + 1);

        let weak = self.downgrade();
        self.inner.scheduler.schedule(
            sync.retry_delay(),
            Box::new(move || {
                let Some(handle) = weak.upgrade() else {
                    return;
                };
                if !handle.is_created() {
                    log::debug!("Abandoning time range retry for chart {}", handle.id());
                    return;
                }
                handle.set_time_range(range);
            }),
        );
    }

    /// The visible time range, or `None` without an instance or when the
    /// renderer reports a non-finite or negative range.
    pub fn time_range(&self) -> Option<TimeRange> {
        let range = self.time_scale()?.visible_range()?;
        range.is_readable().then_some(range)
    }

    pub fn logical_range(&self) -> Option<LogicalRange> {
        self.time_scale()?.visible_logical_range()
    }

    /// Scroll and zoom so all data is visible. Returns false on failure.
    pub fn fit_content(&self) -> bool {
        let Some(time_scale) = self.time_scale() else {
            return false;
        };
        match time_scale.fit_content() {
            Ok(()) => {
                self.inner.events.emit(&ChartEvent::ContentFitted);
                true
            }
            Err(e) => {
                log::warn!("Failed to fit content of chart {}: {:#}", self.inner.id, e);
                false
            }
        }
    }

    /// Apply the shared time-scale settings, with `custom` taking precedence.
    pub fn apply_unified_time_scale(&self, custom: &TimeScalePatch) -> bool {
        let Some(time_scale) = self.time_scale() else {
            return false;
        };
        let patch = self.inner.config.unified_time_scale(custom);
        match time_scale.apply_options(&patch) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to apply time scale options to chart {}: {:#}", self.inner.id, e);
                false
            }
        }
    }

    /// Forward visible time-range notifications. Returns false without an
    /// instance.
    pub fn subscribe_time_range_change(&self, callback: RangeCallback<TimeRange>) -> bool {
        match self.time_scale() {
            Some(time_scale) => {
                time_scale.subscribe_visible_time_range_change(callback);
                true
            }
            None => false,
        }
    }

    /// Forward crosshair notifications. Returns false without an instance.
    ///
    /// Every created chart already republishes them as
    /// [`ChartEvent::CrosshairMoved`].
    pub fn subscribe_crosshair_move(&self, callback: CrosshairCallback) -> bool {
        match self.instance() {
            Some(instance) => {
                instance.subscribe_crosshair_move(callback);
                true
            }
            None => false,
        }
    }

    /// Forward logical-range notifications. Returns false without an instance.
    pub fn subscribe_logical_range_change(&self, callback: RangeCallback<LogicalRange>) -> bool {
        match self.time_scale() {
            Some(time_scale) => {
                time_scale.subscribe_visible_logical_range_change(callback);
                true
            }
            None => false,
        }
    }

    /// Tear the widget down for good.
    ///
    /// Removes every series and the instance, publishes `Destroyed`, drops
    /// all listeners and unregisters from the registry and coordinator.
    /// Every step runs even if an earlier renderer call failed. Safe to call
    /// on a handle that was never created or is already destroyed.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.teardown_instance(false);
        self.inner.lifecycle.set(Lifecycle::Destroyed);

        self.inner.events.emit(&ChartEvent::Destroyed {
            chart_id: self.inner.id.clone(),
        });
        self.inner.events.clear();

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(&self.inner.id);
        }
        let attached = self.inner.coordinator.borrow_mut().take();
        if let Some((coordinator, key)) = attached {
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.unregister_chart(&key);
            }
        }
        log::info!("Destroyed chart {}", self.inner.id);
    }

    /// Remove series and instance. Returns false if there was no instance.
    fn teardown_instance(&self, emit: bool) -> bool {
        let series: Vec<SeriesHandle> = self.inner.series.borrow_mut().drain(..).collect();
        let instance = self.inner.instance.borrow_mut().take();
        let Some(instance) = instance else {
            return false;
        };

        for s in &series {
            if let Err(e) = instance.remove_series(s.api()) {
                log::warn!("Failed to remove {} series from chart {}: {:#}", s.kind(), self.inner.id, e);
            }
        }
        if let Err(e) = instance.remove() {
            log::warn!("Failed to remove chart {}: {:#}", self.inner.id, e);
        }
        if emit {
            self.inner.events.emit(&ChartEvent::Destroyed {
                chart_id: self.inner.id.clone(),
            });
        }
        true
    }

    pub(crate) fn attach_coordinator(&self, coordinator: Weak<SyncCoordinator>, key: &str) {
        *self.inner.coordinator.borrow_mut() = Some((coordinator, key.to_string()));
    }

    pub(crate) fn detach_coordinator(&self) {
        self.inner.coordinator.borrow_mut().take();
    }

    /// Key under which the chart is registered with a coordinator.
    pub fn coordinator_key(&self) -> Option<String> {
        self.inner
            .coordinator
            .borrow()
            .as_ref()
            .map(|(_, key)| key.clone())
    }
}
