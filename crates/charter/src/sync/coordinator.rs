//! Keeps every registered chart's viewport in step with the primary chart.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use charter_config::{SyncConfig, TimeScalePatch};
use charter_core::{LogicalRange, TimeRange};

use crate::error::{reason, ChartError};
use crate::events::{ChartEvent, ChartEventKind, EventBus, Handler, RangeOrigin, SyncEvent};
use crate::render::TimeScaleApi;
use crate::widget::handle::{ChartHandle, WeakChartHandle};

use super::repair::{self, RepairOutcome};

/// One chart known to the coordinator.
#[derive(Clone)]
pub struct ChartRegistration {
    pub key: String,
    pub chart: ChartHandle,
    pub is_primary: bool,
}

/// Subscriptions the coordinator holds on the primary chart.
struct PrimaryHooks {
    key: String,
    chart: WeakChartHandle,
    on_created: Handler<ChartEvent>,
    /// Renderer range callbacks cannot be removed, so they check this flag.
    live: Rc<Cell<bool>>,
}

impl PrimaryHooks {
    fn release(self) {
        self.live.set(false);
        if let Some(chart) = self.chart.upgrade() {
            chart.events().off(ChartEventKind::Created, Some(&self.on_created));
        }
        log::debug!("Released range subscriptions of '{}'", self.key);
    }
}

/// Sets a flag for the lifetime of the guard.
struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Propagates the primary chart's viewport to every secondary chart.
///
/// The primary is the chart the user scrolls. The coordinator listens to its
/// time-range and logical-range notifications, stores the latest values as
/// the canonical viewport and pushes them to each secondary in registration
/// order, followed by the shared bar spacing and right offset.
///
/// A pass never starts while another is running: renderer notifications
/// caused by the pass itself are dropped instead of echoing back.
pub struct SyncCoordinator {
    this: Weak<SyncCoordinator>,
    config: SyncConfig,
    charts: RefCell<Vec<ChartRegistration>>,
    hooks: RefCell<Option<PrimaryHooks>>,
    domain: Cell<Option<TimeRange>>,
    logical: Cell<Option<LogicalRange>>,
    bar_spacing: Cell<Option<f64>>,
    right_offset: Cell<f64>,
    updating: Cell<bool>,
    repairing: Cell<bool>,
    events: EventBus<SyncEvent>,
}

impl SyncCoordinator {
    pub fn new(config: SyncConfig) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            right_offset: Cell::new(config.default_right_offset),
            config,
            charts: RefCell::new(Vec::new()),
            hooks: RefCell::new(None),
            domain: Cell::new(None),
            logical: Cell::new(None),
            bar_spacing: Cell::new(None),
            updating: Cell::new(false),
            repairing: Cell::new(false),
            events: EventBus::new(),
        })
    }

    /// Register `chart` under `key`.
    ///
    /// A key that is already registered is replaced. Registering a primary
    /// demotes the previous one. The primary's range notifications are
    /// followed from now on, including across re-creation of its renderer
    /// instance.
    pub fn register_chart(&self, key: &str, chart: &ChartHandle, is_primary: bool) {
        let replaced = {
            let mut charts = self.charts.borrow_mut();
            let index = charts.iter().position(|r| r.key == key);
            let replaced = index.map(|index| charts.remove(index));
            if is_primary {
                for registration in charts.iter_mut().filter(|r| r.is_primary) {
                    log::info!("Chart '{}' is no longer the primary", registration.key);
                    registration.is_primary = false;
                }
            }
            charts.push(ChartRegistration {
                key: key.to_string(),
                chart: chart.clone(),
                is_primary,
            });
            replaced
        };
        if let Some(old) = replaced {
            if !old.chart.ptr_eq(chart) {
                old.chart.detach_coordinator();
            }
        }
        if is_primary || self.hooks.borrow().as_ref().is_some_and(|hooks| hooks.key == key) {
            self.release_hooks();
        }
        chart.attach_coordinator(self.this.clone(), key);
        log::debug!("Registered chart '{}' ({}), primary: {}", key, chart.id(), is_primary);

        if !is_primary {
            return;
        }
        let live = Rc::new(Cell::new(true));
        if chart.is_created() {
            self.follow_primary(key, chart, &live);
        }
        let coordinator = self.this.clone();
        let weak_chart = chart.downgrade();
        let primary_key = key.to_string();
        let token = Rc::clone(&live);
        let on_created = chart.events().subscribe(ChartEventKind::Created, move |_: &ChartEvent| {
            let (Some(coordinator), Some(chart)) = (coordinator.upgrade(), weak_chart.upgrade()) else {
                return Ok(());
            };
            if token.get() {
                coordinator.follow_primary(&primary_key, &chart, &token);
            }
            Ok(())
        });
        *self.hooks.borrow_mut() = Some(PrimaryHooks {
            key: key.to_string(),
            chart: chart.downgrade(),
            on_created,
            live,
        });
        self.events.emit(&SyncEvent::PrimaryChanged { key: key.to_string() });
    }

    fn release_hooks(&self) {
        let hooks = self.hooks.borrow_mut().take();
        if let Some(hooks) = hooks {
            hooks.release();
        }
    }

    /// Subscribe to the primary's current renderer instance. The callbacks
    /// go quiet once `live` is cleared.
    fn follow_primary(&self, key: &str, chart: &ChartHandle, live: &Rc<Cell<bool>>) {
        let coordinator = self.this.clone();
        let weak_chart = chart.downgrade();
        let primary_key = key.to_string();
        let token = Rc::clone(live);
        chart.subscribe_time_range_change(Box::new(move |range: Option<TimeRange>| {
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if let Some(range) = range {
                if token.get() && coordinator.accepts_notification(&primary_key) {
                    if let Some(chart) = weak_chart.upgrade() {
                        chart.notify_time_range(range, RangeOrigin::User);
                    }
                    coordinator.update_domain(range);
                }
            }
        }));

        let coordinator = self.this.clone();
        let primary_key = key.to_string();
        let token = Rc::clone(live);
        chart.subscribe_logical_range_change(Box::new(move |range: Option<LogicalRange>| {
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if let Some(range) = range {
                if token.get() && coordinator.accepts_notification(&primary_key) {
                    coordinator.update_logical_range(range);
                }
            }
        }));
    }

    fn accepts_notification(&self, key: &str) -> bool {
        !self.updating.get() && self.is_primary_key(key)
    }

    /// Remove the chart registered under `key`. Unknown keys are ignored.
    pub fn unregister_chart(&self, key: &str) -> bool {
        let removed = {
            let mut charts = self.charts.borrow_mut();
            let index = charts.iter().position(|r| r.key == key);
            index.map(|index| charts.remove(index))
        };
        if self.hooks.borrow().as_ref().is_some_and(|hooks| hooks.key == key) {
            self.release_hooks();
        }
        match removed {
            Some(registration) => {
                registration.chart.detach_coordinator();
                log::debug!("Unregistered chart '{}'", key);
                true
            }
            None => false,
        }
    }

    /// Store a new canonical time range and sync. Invalid ranges are ignored.
    pub fn update_domain(&self, range: TimeRange) {
        if !range.is_valid() {
            log::debug!("Ignoring invalid domain {:?}", range);
            return;
        }
        self.domain.set(Some(range));
        self.sync_all_charts();
    }

    /// Store a new canonical logical range and sync.
    ///
    /// A negative or non-finite range is not stored: the primary is repaired
    /// instead, and the repaired range arrives through its notifications.
    pub fn update_logical_range(&self, range: LogicalRange) {
        if !range.is_healthy() {
            self.repair_primary(range);
            return;
        }
        self.logical.set(Some(range));
        self.sync_all_charts();
    }

    /// Store new spacing values and sync. Non-finite values are ignored.
    pub fn update_spacing(&self, bar_spacing: Option<f64>, right_offset: Option<f64>) {
        self.store_spacing(bar_spacing, right_offset);
        self.sync_all_charts();
    }

    fn store_spacing(&self, bar_spacing: Option<f64>, right_offset: Option<f64>) {
        if let Some(spacing) = bar_spacing.filter(|s| s.is_finite() && *s > 0.0) {
            self.bar_spacing.set(Some(spacing));
        }
        if let Some(offset) = right_offset.filter(|o| o.is_finite()) {
            self.right_offset.set(offset);
        }
    }

    /// Correct a negative logical range reported by the primary.
    ///
    /// Returns `None` without a primary or while a repair is already running.
    pub fn repair_primary(&self, problematic: LogicalRange) -> Option<RepairOutcome> {
        if self.repairing.get() {
            log::debug!("Repair already in progress, ignoring {:?}", problematic);
            return None;
        }
        let (key, chart) = self.primary()?;
        let _guard = FlagGuard::set(&self.repairing);

        log::warn!(
            "Primary chart '{}' reported logical range {:.2} .. {:.2}",
            key,
            problematic.from,
            problematic.to
        );
        let outcome = repair::fix_negative_logical_range(&chart, problematic, self.config.min_logical_width);
        self.events.emit(&SyncEvent::Repaired { key, outcome });
        Some(outcome)
    }

    /// Push the canonical viewport to every secondary chart.
    ///
    /// Returns the number of secondaries updated. A call made while a pass is
    /// running is skipped. A secondary without a renderer instance is
    /// skipped; one that fails is reported and the pass moves on.
    pub fn sync_all_charts(&self) -> usize {
        if self.updating.get() {
            log::debug!("Sync already in progress");
            return 0;
        }
        let _guard = FlagGuard::set(&self.updating);

        let secondaries: Vec<ChartRegistration> = self
            .charts
            .borrow()
            .iter()
            .filter(|r| !r.is_primary)
            .cloned()
            .collect();
        let domain = self.domain.get();
        let logical = self.logical.get();
        let patch = TimeScalePatch::spacing(self.bar_spacing.get(), self.right_offset.get());

        let mut synced = 0;
        for registration in &secondaries {
            let Some(time_scale) = registration.chart.time_scale() else {
                continue;
            };
            let result = catch_unwind(AssertUnwindSafe(|| {
                apply_viewport(&*time_scale, domain, logical, &patch)
            }));
            match result {
                Ok(Ok(())) => {
                    synced += 1;
                    if let Some(range) = domain {
                        registration.chart.notify_time_range(range, RangeOrigin::Sync);
                    }
                }
                Ok(Err(e)) => self.report_failure(&registration.key, reason(&e)),
                Err(_) => self.report_failure(&registration.key, "panicked during sync".to_string()),
            }
        }

        log::debug!("Synced {} of {} secondary charts", synced, secondaries.len());
        self.events.emit(&SyncEvent::Synced { charts: synced });
        synced
    }

    fn report_failure(&self, key: &str, reason: String) {
        let err = ChartError::SyncFailure {
            key: key.to_string(),
            reason,
        };
        log::error!("{}", err);
        self.events.emit(&SyncEvent::Error(err));
    }

    /// Read the primary's current viewport and push it to every secondary.
    ///
    /// Returns the number of secondaries updated; 0 without a live primary.
    pub fn force_sync(&self) -> usize {
        let Some((key, chart)) = self.primary() else {
            log::debug!("Nothing to sync: no primary chart");
            return 0;
        };
        let Some(time_scale) = chart.time_scale() else {
            log::debug!("Nothing to sync: primary '{}' is not created", key);
            return 0;
        };

        if let Some(range) = chart.time_range().filter(|r| r.is_valid()) {
            self.domain.set(Some(range));
        }
        match chart.logical_range() {
            Some(range) if range.is_healthy() => self.logical.set(Some(range)),
            Some(range) => {
                self.repair_primary(range);
            }
            None => {}
        }
        match time_scale.options() {
            Ok(options) => self.store_spacing(Some(options.bar_spacing), Some(options.right_offset)),
            Err(e) => log::warn!("Failed to read time scale options of '{}': {:#}", key, e),
        }
        self.sync_all_charts()
    }

    fn primary(&self) -> Option<(String, ChartHandle)> {
        self.charts
            .borrow()
            .iter()
            .find(|r| r.is_primary)
            .map(|r| (r.key.clone(), r.chart.clone()))
    }

    pub fn primary_chart(&self) -> Option<ChartHandle> {
        self.primary().map(|(_, chart)| chart)
    }

    pub fn primary_key(&self) -> Option<String> {
        self.primary().map(|(key, _)| key)
    }

    pub fn is_primary_key(&self, key: &str) -> bool {
        self.charts.borrow().iter().any(|r| r.is_primary && r.key == key)
    }

    pub fn chart(&self, key: &str) -> Option<ChartHandle> {
        self.charts
            .borrow()
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.chart.clone())
    }

    /// Secondary charts, in registration order.
    pub fn secondaries(&self) -> Vec<ChartHandle> {
        self.charts
            .borrow()
            .iter()
            .filter(|r| !r.is_primary)
            .map(|r| r.chart.clone())
            .collect()
    }

    pub fn domain(&self) -> Option<TimeRange> {
        self.domain.get()
    }

    pub fn logical_range(&self) -> Option<LogicalRange> {
        self.logical.get()
    }

    pub fn bar_spacing(&self) -> Option<f64> {
        self.bar_spacing.get()
    }

    pub fn right_offset(&self) -> f64 {
        self.right_offset.get()
    }

    /// Whether a sync pass is running.
    pub fn is_updating(&self) -> bool {
        self.updating.get()
    }

    pub fn is_repairing(&self) -> bool {
        self.repairing.get()
    }

    pub fn len(&self) -> usize {
        self.charts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.borrow().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.charts.borrow().iter().any(|r| r.key == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.charts.borrow().iter().map(|r| r.key.clone()).collect()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus<SyncEvent> {
        &self.events
    }
}

fn apply_viewport(
    time_scale: &dyn TimeScaleApi,
    domain: Option<TimeRange>,
    logical: Option<LogicalRange>,
    patch: &TimeScalePatch,
) -> anyhow::Result<()> {
    if let Some(range) = domain {
        time_scale.set_visible_range(range)?;
    }
    if let Some(range) = logical {
        time_scale.set_visible_logical_range(range)?;
    }
    time_scale.apply_options(patch)
}
