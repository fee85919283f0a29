//! The main chart: one candlestick series per asset, the primary viewport.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use charter_config::{ChartKind, ChartOptionsOverride};
use charter_core::{Candle, LinePoint, SeriesData, Time, TimeRange};
use charter_data::{filter_valid_data, DataSource};
use charter_indicators::IndicatorKind;
use futures_util::future::join_all;

use crate::context::ChartContext;
use crate::error::{reason, ChartError, Result};
use crate::events::ChartEvent;
use crate::normalize::{IndicatorSeries, StockBook, StockInfo};
use crate::render::{Container, SeriesKind, SeriesOptions};
use crate::series::SeriesHandle;
use crate::sync::repair::{self, AlignmentReport, AlignmentResult, RepairOutcome};

use super::handle::ChartHandle;
use super::indicator::IndicatorChart;
use super::volume::VolumeChart;
use super::ChartWidget;

/// Key the main chart is registered under with the coordinator.
pub const MAIN_KEY: &str = "main";

/// Outcome of [`MainChart::load_data`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Codes that were installed, in index order.
    pub loaded: Vec<String>,
    /// One entry per asset that could not be installed.
    pub failures: Vec<ChartError>,
    /// Whether normalization is active after the load.
    pub normalized: bool,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bars closer than this to the crosshair time count as under it.
const CROSSHAIR_TOLERANCE_SECS: f64 = 30.0;

/// One asset's bar, as shown in the info bar.
#[derive(Debug, Clone, PartialEq)]
pub struct StockQuote {
    pub index: usize,
    pub code: String,
    pub name: String,
    /// Unscaled bar, even while normalization is active.
    pub candle: Candle,
}

/// Volume with Chinese unit suffixes: `1.50万` from ten thousand, `1.50亿`
/// from a hundred million. Smaller volumes are printed as is.
pub fn format_volume(volume: f64) -> String {
    if volume >= 1e8 {
        format!("{:.2}亿", volume / 1e8)
    } else if volume >= 1e4 {
        format!("{:.2}万", volume / 1e4)
    } else {
        volume.to_string()
    }
}

fn bar_matches(candle: &Time, target: &Time, target_secs: Option<f64>) -> bool {
    if let (Some(secs), Some(target)) = (candle.to_seconds(), target_secs) {
        if (secs - target).abs() < CROSSHAIR_TOLERANCE_SECS {
            return true;
        }
    }
    match (candle, target) {
        (Time::Text(candle), Time::Text(target)) => candle.starts_with(target.as_str()),
        _ => false,
    }
}

/// Candlestick chart for one or more assets, with optional volume and
/// indicator sub-charts kept in step with it.
///
/// The main chart is the coordinator's primary: scrolling it moves every
/// sub-chart.
pub struct MainChart {
    ctx: ChartContext,
    handle: ChartHandle,
    book: RefCell<StockBook>,
    volume: RefCell<Option<Rc<VolumeChart>>>,
    indicator_charts: RefCell<Vec<Rc<IndicatorChart>>>,
    initial_fit_done: Cell<bool>,
}

impl MainChart {
    pub fn new(ctx: &ChartContext, container: Container) -> Self {
        Self::with_overrides(ctx, container, ChartOptionsOverride::default())
    }

    pub fn with_overrides(ctx: &ChartContext, container: Container, overrides: ChartOptionsOverride) -> Self {
        let handle = ChartHandle::new(ctx, ChartKind::Main, Some(container), overrides);
        ctx.coordinator().register_chart(MAIN_KEY, &handle, true);
        Self {
            ctx: ctx.clone(),
            handle,
            book: RefCell::new(StockBook::new()),
            volume: RefCell::new(None),
            indicator_charts: RefCell::new(Vec::new()),
            initial_fit_done: Cell::new(false),
        }
    }

    /// Fetch every asset in `codes` concurrently and draw them.
    ///
    /// Existing data is cleared first. Each asset keeps its position in
    /// `codes` as its index, so colors and ratios are stable even when an
    /// earlier asset fails. Failed assets are reported, published as error
    /// events and left out. The chart is created if needed.
    pub async fn load_data<S: DataSource>(
        &self,
        source: &S,
        codes: &[&str],
        indicators: &[IndicatorKind],
    ) -> Result<LoadReport> {
        if !self.handle.is_created() {
            self.handle.create()?;
        }
        self.clear_data();
        self.handle.update_state(|state| {
            state.is_loading = true;
            state.is_data_loaded = false;
        });

        log::info!("Loading {} assets: {:?}", codes.len(), codes);
        let results = join_all(codes.iter().map(|code| source.fetch(code))).await;
        if self.handle.is_destroyed() {
            return Err(ChartError::Destroyed);
        }

        let mut report = LoadReport::default();
        for (index, (code, result)) in codes.iter().zip(results).enumerate() {
            let candles = match result {
                Ok(records) => filter_valid_data(&records),
                Err(e) => {
                    self.record_failure(&mut report, ChartError::DataLoadFailure {
                        code: code.to_string(),
                        reason: reason(&e),
                    });
                    continue;
                }
            };
            if candles.is_empty() {
                self.record_failure(&mut report, ChartError::DataLoadFailure {
                    code: code.to_string(),
                    reason: "no valid records".to_string(),
                });
                continue;
            }
            match self.install_stock(index, code, candles, indicators) {
                Ok(()) => report.loaded.push(code.to_string()),
                Err(err) => self.record_failure(&mut report, err),
            }
        }

        report.normalized = self.finalize_load(!report.loaded.is_empty());
        log::info!(
            "Loaded {} of {} assets, normalized: {}",
            report.loaded.len(),
            codes.len(),
            report.normalized
        );
        Ok(report)
    }

    fn record_failure(&self, report: &mut LoadReport, err: ChartError) {
        log::error!("{}", err);
        self.handle.events().emit(&ChartEvent::Error(err.clone()));
        report.failures.push(err);
    }

    fn install_stock(&self, index: usize, code: &str, candles: Vec<Candle>, indicators: &[IndicatorKind]) -> Result<()> {
        self.store_stock_info(index, code, candles);
        if let Err(err) = self.create_candlestick_series(index) {
            self.book.borrow_mut().remove(index);
            return Err(err);
        }
        for kind in indicators {
            self.add_stock_indicator(index, *kind);
        }
        Ok(())
    }

    /// Record an asset's validated candles at `index`, visible.
    pub fn store_stock_info(&self, index: usize, code: &str, candles: Vec<Candle>) {
        log::debug!("Storing {} candles of {} at index {}", candles.len(), code, index);
        self.book
            .borrow_mut()
            .insert(index, StockInfo::new(index, code, candles));
    }

    /// Draw the asset at `index` as a candlestick series in its colors.
    pub fn create_candlestick_series(&self, index: usize) -> Result<SeriesHandle> {
        let (code, options, candles) = {
            let book = self.book.borrow();
            let stock = book.stock(index).ok_or_else(|| ChartError::DataLoadFailure {
                code: format!("#{index}"),
                reason: "no asset at this index".to_string(),
            })?;
            let options = stock.color_scheme.candlestick_options(stock.is_main);
            (stock.code.clone(), options, stock.data.clone())
        };

        let series = self
            .handle
            .add_series(SeriesKind::Candlestick, options)
            .ok_or_else(|| ChartError::SeriesCreationFailed {
                kind: SeriesKind::Candlestick,
                reason: format!("no series for {code}"),
            })?;
        if let Err(e) = series.set_data(&SeriesData::Candles(candles)) {
            self.handle.remove_series(&series);
            return Err(ChartError::SeriesCreationFailed {
                kind: SeriesKind::Candlestick,
                reason: reason(&e),
            });
        }
        self.book.borrow_mut().set_candle_series(index, series.clone());
        Ok(series)
    }

    /// Compute `kind` from the asset's candles and draw it over them.
    ///
    /// Only price-scaled indicators are drawn on the main chart; oscillators
    /// belong in a sub-chart. Returns `None` for an unknown asset or when
    /// it has too few candles for the indicator.
    pub fn add_stock_indicator(&self, index: usize, kind: IndicatorKind) -> Option<SeriesHandle> {
        if !kind.is_price_scaled() {
            log::debug!("{} is drawn in a sub-chart, not over asset {}", kind, index);
            return None;
        }
        let candles = self.book.borrow().stock(index)?.data.clone();
        let Some(values) = kind.compute(&candles) else {
            log::warn!("Not enough candles for {} on asset {}", kind, index);
            return None;
        };
        self.attach_indicator_series(index, kind, values.to_line_points(&candles))
    }

    /// Draw precomputed indicator points over the asset at `index`.
    ///
    /// `points` are unscaled; if normalization is active they are drawn
    /// scaled and restored with the asset.
    pub fn attach_indicator_series(&self, index: usize, kind: IndicatorKind, points: Vec<LinePoint>) -> Option<SeriesHandle> {
        let (color, visible, ratio) = {
            let book = self.book.borrow();
            let stock = book.stock(index)?;
            (stock.color_scheme.up_color, book.is_visible(index), book.ratio(index))
        };

        let options = SeriesOptions {
            title: Some(kind.to_string()),
            color: Some(color.to_string()),
            line_width: Some(1.0),
            price_line_visible: Some(false),
            last_value_visible: Some(false),
            visible: Some(visible),
            ..Default::default()
        };
        let series = self.handle.add_series(SeriesKind::Line, options)?;

        let data = if kind.is_price_scaled() {
            points.iter().map(|p| p.scaled(ratio)).collect()
        } else {
            points.clone()
        };
        if let Err(e) = series.set_data(&SeriesData::Line(data)) {
            log::warn!("Failed to draw {} for asset {}: {:#}", kind, index, e);
        }
        self.book.borrow_mut().add_indicator(index, IndicatorSeries {
            kind,
            series: series.clone(),
            original: points,
        });
        Some(series)
    }

    fn finalize_load(&self, any_loaded: bool) -> bool {
        self.handle.update_state(|state| {
            state.is_loading = false;
            state.is_data_loaded = any_loaded;
        });
        if !any_loaded {
            return false;
        }

        if !self.initial_fit_done.get() {
            self.handle.fit_content();
            self.initial_fit_done.set(true);
        }
        self.adjust_time_range_to_visible_stocks();

        let normalized = if self.ctx.config().normalization.auto_enable {
            self.auto_normalize()
        } else {
            self.is_normalization_enabled()
        };
        self.refresh_sub_charts();
        self.ctx.coordinator().force_sync();
        normalized
    }

    /// Number of loaded assets.
    pub fn stock_count(&self) -> usize {
        self.book.borrow().stocks().count()
    }

    pub fn stock(&self, index: usize) -> Option<StockInfo> {
        self.book.borrow().stock(index).cloned()
    }

    /// Codes of loaded assets, in index order.
    pub fn stock_codes(&self) -> Vec<String> {
        self.book
            .borrow()
            .stocks()
            .map(|(_, stock)| stock.code.clone())
            .collect()
    }

    pub fn is_stock_visible(&self, index: usize) -> bool {
        self.book.borrow().is_visible(index)
    }

    pub fn candle_series(&self, index: usize) -> Option<SeriesHandle> {
        self.book.borrow().candle_series(index).cloned()
    }

    pub fn indicator_series(&self, index: usize) -> Vec<SeriesHandle> {
        self.book
            .borrow()
            .indicators(index)
            .iter()
            .map(|indicator| indicator.series.clone())
            .collect()
    }

    /// Each visible asset's bar at `time`, in index order. Assets without a
    /// bar at that time are left out.
    pub fn stock_data_at(&self, time: &Time) -> Vec<StockQuote> {
        let target_secs = time.to_seconds();
        self.visible_quotes(|data| data.iter().find(|candle| bar_matches(&candle.time, time, target_secs)))
    }

    /// Last bar of each visible asset.
    pub fn latest_stock_data(&self) -> Vec<StockQuote> {
        self.visible_quotes(|data| data.last())
    }

    /// What the info bar shows for a crosshair at `time`.
    ///
    /// Falls back to the latest bars when the crosshair is off the plot or
    /// reports a time that cannot be read.
    pub fn info_at(&self, time: Option<&Time>) -> Vec<StockQuote> {
        match time.filter(|t| t.to_seconds().is_some()) {
            Some(time) => self.stock_data_at(time),
            None => self.latest_stock_data(),
        }
    }

    fn visible_quotes(&self, pick: impl Fn(&[Candle]) -> Option<&Candle>) -> Vec<StockQuote> {
        let book = self.book.borrow();
        book.stocks()
            .filter(|(index, _)| book.is_visible(*index))
            .filter_map(|(index, stock)| {
                pick(&stock.data).map(|candle| StockQuote {
                    index,
                    code: stock.code.clone(),
                    name: stock.name.clone(),
                    candle: candle.clone(),
                })
            })
            .collect()
    }

    fn first_stock_candles(&self) -> Option<Vec<Candle>> {
        self.book
            .borrow()
            .stocks()
            .next()
            .map(|(_, stock)| stock.data.clone())
    }

    /// Whether visible assets are spread far enough apart to normalize.
    pub fn should_enable_normalization(&self) -> bool {
        let threshold = self.ctx.config().normalization.threshold;
        self.book.borrow().should_normalize(threshold)
    }

    /// Rescale every asset to the reference asset. A no-op returning false
    /// with fewer than two visible assets.
    pub fn enable_normalization(&self) -> bool {
        self.book.borrow_mut().enable()
    }

    /// Restore original prices.
    pub fn disable_normalization(&self) {
        self.book.borrow_mut().disable();
    }

    pub fn is_normalization_enabled(&self) -> bool {
        self.book.borrow().is_enabled()
    }

    pub fn normalization_ratios(&self) -> Vec<f64> {
        self.book.borrow().ratios().to_vec()
    }

    /// Flip normalization, but only when it is recommended.
    ///
    /// When it is not recommended, normalization is switched off if active
    /// and false is returned. Otherwise returns true after toggling.
    pub fn toggle_normalization(&self) -> bool {
        if !self.should_enable_normalization() {
            if self.is_normalization_enabled() {
                self.disable_normalization();
            }
            return false;
        }
        if self.is_normalization_enabled() {
            self.disable_normalization();
        } else {
            self.enable_normalization();
        }
        true
    }

    /// Enable normalization when recommended and disable it otherwise.
    /// Returns whether normalization is active afterwards.
    pub fn auto_normalize(&self) -> bool {
        let recommended = self.should_enable_normalization();
        let enabled = self.is_normalization_enabled();
        if recommended && !enabled {
            self.enable_normalization();
        } else if !recommended && enabled {
            self.disable_normalization();
        }
        self.is_normalization_enabled()
    }

    /// Show or hide the asset at `index` with its indicators.
    ///
    /// Ratios are re-derived while normalization is active and the visible
    /// time range is fitted to the remaining assets. Returns the new
    /// visibility, or `None` for an unknown index.
    pub fn toggle_stock_visibility(&self, index: usize) -> Option<bool> {
        let (visible, series) = {
            let mut book = self.book.borrow_mut();
            book.stock(index)?;
            let visible = !book.is_visible(index);
            book.set_visible(index, visible);
            (visible, book.series_of(index))
        };

        let update = SeriesOptions::visibility(visible);
        for s in &series {
            if let Err(e) = s.apply_options(&update) {
                log::warn!("Failed to change visibility of asset {}: {:#}", index, e);
            }
        }
        self.book.borrow_mut().refresh();
        self.adjust_time_range_to_visible_stocks();
        log::debug!("Asset {} visible: {}", index, visible);
        Some(visible)
    }

    /// Set the visible range to the span of visible assets.
    pub fn adjust_time_range_to_visible_stocks(&self) -> Option<TimeRange> {
        let bounds = self.book.borrow().visible_time_bounds()?;
        self.handle.set_time_range(bounds);
        Some(bounds)
    }

    /// Remove every asset and its series. Sub-charts are emptied, not
    /// destroyed.
    pub fn clear_data(&self) {
        let series = {
            let mut book = self.book.borrow_mut();
            let series = book.all_series();
            book.clear();
            series
        };
        for s in &series {
            self.handle.remove_series(s);
        }
        self.refresh_sub_charts();
    }

    fn refresh_sub_charts(&self) {
        let candles = self.first_stock_candles().unwrap_or_default();
        if let Some(volume) = self.volume_chart() {
            volume.set_candles(&candles);
        }
        for chart in self.indicator_charts() {
            chart.set_candles(&candles);
        }
    }

    /// Build the volume sub-chart in `container`, replacing any existing one,
    /// and align it with this chart.
    pub fn create_volume_subchart(&self, container: Container) -> Result<Rc<VolumeChart>> {
        self.destroy_volume_subchart();
        let volume = Rc::new(VolumeChart::new(&self.ctx, container));
        if let Err(err) = volume.create() {
            volume.destroy();
            return Err(err);
        }
        if let Some(candles) = self.first_stock_candles() {
            volume.set_candles(&candles);
        }
        repair::force_alignment(&self.handle, volume.handle());
        *self.volume.borrow_mut() = Some(Rc::clone(&volume));
        Ok(volume)
    }

    /// Returns false if there was no volume sub-chart.
    pub fn destroy_volume_subchart(&self) -> bool {
        let volume = self.volume.borrow_mut().take();
        match volume {
            Some(volume) => {
                volume.destroy();
                true
            }
            None => false,
        }
    }

    pub fn volume_chart(&self) -> Option<Rc<VolumeChart>> {
        self.volume.borrow().clone()
    }

    /// Build a sub-chart plotting `kind` for the first asset, replacing an
    /// existing one for the same indicator.
    pub fn create_indicator_subchart(&self, container: Container, kind: IndicatorKind) -> Result<Rc<IndicatorChart>> {
        self.destroy_indicator_subchart(kind);
        let chart = Rc::new(IndicatorChart::new(&self.ctx, container, kind));
        if let Err(err) = chart.create() {
            chart.destroy();
            return Err(err);
        }
        if let Some(candles) = self.first_stock_candles() {
            chart.set_candles(&candles);
        }
        repair::force_alignment(&self.handle, chart.handle());
        self.indicator_charts.borrow_mut().push(Rc::clone(&chart));
        Ok(chart)
    }

    /// Returns false if no sub-chart shows `kind`.
    pub fn destroy_indicator_subchart(&self, kind: IndicatorKind) -> bool {
        let removed: Vec<Rc<IndicatorChart>> = {
            let mut charts = self.indicator_charts.borrow_mut();
            let (removed, kept): (Vec<_>, Vec<_>) = charts.drain(..).partition(|chart| chart.indicator() == kind);
            *charts = kept;
            removed
        };
        for chart in &removed {
            chart.destroy();
        }
        !removed.is_empty()
    }

    pub fn indicator_charts(&self) -> Vec<Rc<IndicatorChart>> {
        self.indicator_charts.borrow().clone()
    }

    /// Every live sub-chart with its coordinator key.
    pub fn sub_charts(&self) -> Vec<(String, ChartHandle)> {
        let volume = self.volume_chart().map(|v| v.handle().clone());
        let indicators = self.indicator_charts().into_iter().map(|c| c.handle().clone());
        volume
            .into_iter()
            .chain(indicators)
            .map(|chart| {
                let key = chart.coordinator_key().unwrap_or_else(|| chart.id().to_string());
                (key, chart)
            })
            .collect()
    }

    /// Compare every sub-chart's viewport with this chart's.
    pub fn verify_time_axis_alignment(&self) -> Vec<(String, AlignmentReport)> {
        let tolerance = self.ctx.config().sync.alignment_tolerance;
        self.sub_charts()
            .into_iter()
            .filter_map(|(key, chart)| repair::verify_alignment(&self.handle, &chart, tolerance).map(|r| (key, r)))
            .collect()
    }

    /// Copy this chart's viewport to every sub-chart.
    pub fn force_time_axis_alignment(&self) -> Vec<(String, AlignmentResult)> {
        self.sub_charts()
            .into_iter()
            .map(|(key, chart)| {
                let result = repair::force_alignment(&self.handle, &chart);
                (key, result)
            })
            .collect()
    }

    /// Copy this chart's bar spacing to every sub-chart.
    pub fn sync_bar_spacing_to_sub_charts(&self) -> usize {
        let charts: Vec<ChartHandle> = self.sub_charts().into_iter().map(|(_, chart)| chart).collect();
        repair::sync_bar_spacing(&self.handle, &charts)
    }

    /// Repair this chart's logical range if it starts before the first bar.
    pub fn fix_negative_logical_range(&self) -> RepairOutcome {
        if self.handle.time_scale().is_none() {
            return RepairOutcome::NoChart;
        }
        match self.handle.logical_range() {
            Some(range) if !range.is_healthy() => {
                let min_width = self.ctx.config().sync.min_logical_width;
                repair::fix_negative_logical_range(&self.handle, range, min_width)
            }
            _ => RepairOutcome::NotNeeded,
        }
    }
}

impl ChartWidget for MainChart {
    fn handle(&self) -> &ChartHandle {
        &self.handle
    }

    /// Tear down sub-charts, then this chart.
    fn destroy(&self) {
        self.destroy_volume_subchart();
        let indicators: Vec<Rc<IndicatorChart>> = self.indicator_charts.borrow_mut().drain(..).collect();
        for chart in &indicators {
            chart.destroy();
        }
        self.book.borrow_mut().clear();
        self.handle.destroy();
    }
}

#[cfg(test)]
mod tests {
    use charter_config::Config;
    use charter_core::LogicalRange;
    use charter_data::{RawBar, StaticSource};

    use super::*;
    use crate::recording::{RecordingLibrary, RecordingTimeScale, TimeScaleOp};
    use crate::render::TimeScaleApi;
    use crate::scheduler::ManualScheduler;

    struct Fixture {
        ctx: ChartContext,
        library: Rc<RecordingLibrary>,
        main: MainChart,
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default())
    }

    fn fixture_with(config: Config) -> Fixture {
        let library = RecordingLibrary::new();
        let ctx = ChartContext::new(Some(library.clone()), Rc::new(ManualScheduler::new()), config);
        let main = MainChart::new(&ctx, Container::new("main", 1000, 400));
        Fixture { ctx, library, main }
    }

    fn bars(closes: &[f64]) -> Vec<Option<RawBar>> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Some(RawBar::ohlc(format!("2023-01-{:02}", i + 1), close, close * 1.02, close * 0.98, close).with_volume(1_000.0))
            })
            .collect()
    }

    fn source() -> StaticSource {
        StaticSource::new()
            .with("AAA", bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]))
            .with("BBB", bars(&[2000.0, 2010.0, 2020.0, 2030.0, 2040.0, 2050.0]))
            .with("CCC", bars(&[110.0, 111.0, 112.0, 113.0, 114.0, 115.0]))
            .with("EMPTY", vec![None, Some(RawBar::default())])
            .fail("DOWN", "connection refused")
    }

    fn main_scale(f: &Fixture) -> Rc<RecordingTimeScale> {
        f.library.chart_for("main").unwrap().recording_time_scale()
    }

    #[tokio::test]
    async fn test_load_single_asset() {
        let f = fixture();
        let report = f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();

        assert_eq!(report.loaded, vec!["AAA".to_string()]);
        assert!(report.is_complete());
        assert!(!report.normalized);
        assert_eq!(f.main.stock_count(), 1);

        let state = f.main.handle().state();
        assert!(!state.is_loading);
        assert!(state.is_data_loaded);

        let recorded = f.library.chart_for("main").unwrap();
        let candles = recorded.series_of(SeriesKind::Candlestick);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].options().price_line_visible, Some(true));
        assert_eq!(candles[0].data().map(|d| d.len()), Some(6));
        assert_eq!(main_scale(&f).count(TimeScaleOp::FitContent), 1);
        assert_eq!(
            f.main.time_range(),
            Some(TimeRange { from: 1_672_531_200.0, to: 1_672_963_200.0 })
        );
    }

    #[tokio::test]
    async fn test_load_isolates_failures() {
        let f = fixture();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        f.main
            .events()
            .subscribe(crate::events::ChartEventKind::Error, move |event: &ChartEvent| {
                if let ChartEvent::Error(err) = event {
                    sink.borrow_mut().push(err.clone());
                }
                Ok(())
            });

        let report = f
            .main
            .load_data(&source(), &["DOWN", "AAA", "EMPTY", "CCC"], &[])
            .await
            .unwrap();

        assert_eq!(report.loaded, vec!["AAA".to_string(), "CCC".to_string()]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(
            report.failures[0],
            ChartError::DataLoadFailure {
                code: "DOWN".to_string(),
                reason: "connection refused".to_string()
            }
        );
        assert!(matches!(&report.failures[1], ChartError::DataLoadFailure { code, .. } if code == "EMPTY"));
        assert_eq!(*errors.borrow(), report.failures);

        assert!(f.main.stock(0).is_none());
        assert_eq!(f.main.stock(1).unwrap().code, "AAA");
        assert_eq!(f.main.stock(3).unwrap().code, "CCC");
        // Only index 0 shows the price line, and it failed
        let recorded = f.library.chart_for("main").unwrap();
        assert!(recorded
            .series_of(SeriesKind::Candlestick)
            .iter()
            .all(|s| s.options().price_line_visible == Some(false)));
    }

    #[tokio::test]
    async fn test_load_auto_normalizes() {
        let f = fixture();
        let report = f.main.load_data(&source(), &["AAA", "BBB"], &[]).await.unwrap();

        assert!(report.normalized);
        assert!(f.main.is_normalization_enabled());
        assert_eq!(f.main.normalization_ratios(), vec![1.0, 0.05]);

        let recorded = f.library.chart_for("main").unwrap();
        let series = recorded.series_of(SeriesKind::Candlestick);
        match series[1].data() {
            Some(SeriesData::Candles(data)) => assert!((data[0].close - 100.0).abs() < 1e-9),
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auto_normalize_can_be_disabled() {
        let mut config = Config::default();
        config.normalization.auto_enable = false;
        let f = fixture_with(config);

        let report = f.main.load_data(&source(), &["AAA", "BBB"], &[]).await.unwrap();
        assert!(!report.normalized);
        assert!(f.main.should_enable_normalization());
    }

    #[tokio::test]
    async fn test_toggle_normalization() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA", "CCC"], &[]).await.unwrap();
        assert!(!f.main.should_enable_normalization());
        assert!(!f.main.toggle_normalization());
        assert!(!f.main.is_normalization_enabled());

        f.main.load_data(&source(), &["AAA", "BBB"], &[]).await.unwrap();
        assert!(f.main.is_normalization_enabled());
        assert!(f.main.toggle_normalization());
        assert!(!f.main.is_normalization_enabled());
        assert!(f.main.toggle_normalization());
        assert!(f.main.is_normalization_enabled());
    }

    #[tokio::test]
    async fn test_disable_restores_originals() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA", "BBB"], &[]).await.unwrap();
        f.main.disable_normalization();

        let recorded = f.library.chart_for("main").unwrap();
        let series = recorded.series_of(SeriesKind::Candlestick);
        let expected = filter_valid_data(&bars(&[2000.0, 2010.0, 2020.0, 2030.0, 2040.0, 2050.0]));
        assert_eq!(series[1].data(), Some(SeriesData::Candles(expected)));
    }

    #[tokio::test]
    async fn test_indicators_follow_normalization() {
        let f = fixture();
        f.main
            .load_data(&source(), &["AAA", "BBB"], &[IndicatorKind::MovingAverage(3), IndicatorKind::Macd])
            .await
            .unwrap();

        // MACD is an oscillator and stays off the main chart
        assert_eq!(f.main.indicator_series(1).len(), 1);
        let recorded = f.library.chart_for("main").unwrap();
        let lines = recorded.series_of(SeriesKind::Line);
        assert_eq!(lines.len(), 2);
        match lines[1].data() {
            Some(SeriesData::Line(points)) => {
                assert_eq!(points.len(), 4);
                assert!((points[0].value - 2010.0 * 0.05).abs() < 1e-9);
            }
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_toggle_stock_visibility() {
        let f = fixture();
        f.main
            .load_data(&source(), &["AAA", "BBB"], &[IndicatorKind::MovingAverage(3)])
            .await
            .unwrap();

        assert_eq!(f.main.toggle_stock_visibility(0), Some(false));
        assert!(!f.main.is_stock_visible(0));
        let recorded = f.library.chart_for("main").unwrap();
        let hidden = &recorded.series()[0];
        assert_eq!(hidden.options().visible, Some(false));
        assert_eq!(f.main.normalization_ratios(), vec![20.0, 1.0]);

        assert_eq!(f.main.toggle_stock_visibility(9), None);
        assert_eq!(f.main.toggle_stock_visibility(0), Some(true));
        assert_eq!(f.main.normalization_ratios(), vec![1.0, 0.05]);
    }

    #[tokio::test]
    async fn test_reload_clears_previous_series() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA", "BBB"], &[]).await.unwrap();
        f.main.load_data(&source(), &["CCC"], &[]).await.unwrap();

        let recorded = f.library.chart_for("main").unwrap();
        assert_eq!(recorded.series().len(), 1);
        assert_eq!(f.main.stock_codes(), vec!["CCC".to_string()]);
        assert!(!f.main.is_normalization_enabled());
    }

    #[tokio::test]
    async fn test_volume_subchart_follows_main() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();
        let volume = f.main.create_volume_subchart(Container::new("volume", 1000, 150)).unwrap();

        let recorded = f.library.chart_for("volume").unwrap();
        let histogram = &recorded.series_of(SeriesKind::Histogram)[0];
        assert_eq!(histogram.data().map(|d| d.len()), Some(6));
        assert_eq!(volume.time_range(), f.main.time_range());

        main_scale(&f).simulate_scroll(
            TimeRange { from: 1_672_617_600.0, to: 1_672_790_400.0 },
            LogicalRange::new(1.0, 3.0),
        );
        assert_eq!(volume.logical_range(), Some(LogicalRange::new(1.0, 3.0)));

        let reports = f.main.verify_time_axis_alignment();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "volume");
        assert!(reports[0].1.is_aligned());

        assert!(f.main.destroy_volume_subchart());
        assert!(!f.main.destroy_volume_subchart());
        assert!(!f.ctx.coordinator().contains("volume"));
    }

    #[tokio::test]
    async fn test_indicator_subchart() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();
        f.main
            .create_indicator_subchart(Container::new("macd", 1000, 120), IndicatorKind::Macd)
            .unwrap();

        assert_eq!(f.main.sub_charts().len(), 1);
        assert_eq!(f.main.sub_charts()[0].0, "indicator_macd");
        assert_eq!(f.main.force_time_axis_alignment().len(), 1);
        assert!(f.main.destroy_indicator_subchart(IndicatorKind::Macd));
        assert!(f.main.sub_charts().is_empty());
    }

    #[tokio::test]
    async fn test_sync_bar_spacing_to_sub_charts() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();
        f.main.create_volume_subchart(Container::new("volume", 1000, 150)).unwrap();
        main_scale(&f)
            .apply_options(&charter_config::TimeScalePatch {
                bar_spacing: Some(10.0),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(f.main.sync_bar_spacing_to_sub_charts(), 1);
        let volume_scale = f.library.chart_for("volume").unwrap().recording_time_scale();
        assert_eq!(volume_scale.current_options().bar_spacing, 10.0);
    }

    #[tokio::test]
    async fn test_fix_negative_logical_range() {
        let f = fixture();
        assert_eq!(f.main.fix_negative_logical_range(), RepairOutcome::NoChart);

        f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();
        assert_eq!(f.main.fix_negative_logical_range(), RepairOutcome::NotNeeded);

        main_scale(&f).preset(None, Some(LogicalRange::new(-4.0, 10.0)));
        assert_eq!(f.main.fix_negative_logical_range(), RepairOutcome::Fitted);
    }

    #[tokio::test]
    async fn test_destroy_tears_down_sub_charts() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();
        f.main.create_volume_subchart(Container::new("volume", 1000, 150)).unwrap();
        f.main
            .create_indicator_subchart(Container::new("macd", 1000, 120), IndicatorKind::Macd)
            .unwrap();

        f.main.destroy();

        assert!(f.main.handle().is_destroyed());
        assert!(f.ctx.coordinator().is_empty());
        assert!(f.ctx.registry().is_empty());
        assert!(f.library.charts().iter().all(|chart| chart.is_removed()));
        assert_eq!(
            f.main.load_data(&source(), &["AAA"], &[]).await.unwrap_err(),
            ChartError::Destroyed
        );
    }

    #[tokio::test]
    async fn test_load_requires_library() {
        let ctx = ChartContext::new(None, Rc::new(ManualScheduler::new()), Config::default());
        let main = MainChart::new(&ctx, Container::new("main", 1000, 400));
        let err = main.load_data(&source(), &["AAA"], &[]).await.unwrap_err();
        assert!(matches!(err, ChartError::LibraryUnavailable(_)));
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(500.0), "500");
        assert_eq!(format_volume(1000.0), "1000");
        assert_eq!(format_volume(15_000.0), "1.50万");
        assert_eq!(format_volume(150_000_000.0), "1.50亿");
    }

    #[tokio::test]
    async fn test_stock_data_at() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA", "BBB"], &[]).await.unwrap();

        let quotes = f.main.stock_data_at(&Time::from("2023-01-03"));
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].code, "AAA");
        assert_eq!(quotes[0].name, "股票AAA");
        assert_eq!(quotes[0].candle.close, 102.0);
        // bars keep their own prices while normalization is active
        assert!(f.main.is_normalization_enabled());
        assert_eq!(quotes[1].candle.close, 2020.0);
        assert_eq!(quotes[1].candle.volume, Some(1_000.0));

        // numeric crosshair times match within the tolerance
        let quotes = f.main.stock_data_at(&Time::from(1_672_704_000.0 + 10.0));
        assert_eq!(quotes.iter().map(|q| q.candle.close).collect::<Vec<_>>(), vec![102.0, 2020.0]);

        f.main.toggle_stock_visibility(0);
        let quotes = f.main.stock_data_at(&Time::from("2023-01-03"));
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].index, 1);

        assert!(f.main.stock_data_at(&Time::from("2024-06-01")).is_empty());
    }

    #[tokio::test]
    async fn test_info_at_falls_back_to_latest() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA"], &[]).await.unwrap();

        for time in [None, Some(Time::from("invalid-time"))] {
            let quotes = f.main.info_at(time.as_ref());
            assert_eq!(quotes.len(), 1);
            assert_eq!(quotes[0].candle.close, 105.0);
        }
        let at = f.main.info_at(Some(&Time::from("2023-01-02")));
        assert_eq!(at[0].candle.close, 101.0);
    }

    #[tokio::test]
    async fn test_crosshair_drives_lookup() {
        let f = fixture();
        f.main.load_data(&source(), &["AAA", "CCC"], &[]).await.unwrap();
        let hovered = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&hovered);
        f.main
            .events()
            .subscribe(crate::events::ChartEventKind::CrosshairMoved, move |event: &ChartEvent| {
                if let ChartEvent::CrosshairMoved { time } = event {
                    sink.borrow_mut().push(time.clone());
                }
                Ok(())
            });

        let recorded = f.library.chart_for("main").unwrap();
        recorded.simulate_crosshair(Some(Time::from(1_672_531_200_i64)));
        recorded.simulate_crosshair(None);

        let hovered = hovered.borrow();
        assert_eq!(hovered.len(), 2);
        let first = f.main.info_at(hovered[0].as_ref());
        assert_eq!(first.iter().map(|q| q.candle.close).collect::<Vec<_>>(), vec![100.0, 110.0]);
        let left = f.main.info_at(hovered[1].as_ref());
        assert_eq!(left.iter().map(|q| q.candle.close).collect::<Vec<_>>(), vec![105.0, 115.0]);
    }
}
