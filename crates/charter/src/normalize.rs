//! Price normalization across assets shown on one chart.
//!
//! Assets with very different price levels are hard to compare on a shared
//! price scale. Normalization rescales every asset so its first close lands
//! on the reference asset's first close, keeping the untouched originals to
//! restore later.

use charter_core::{Candle, LinePoint, SeriesData, TimeRange};
use charter_indicators::IndicatorKind;

use crate::render::SeriesOptions;
use crate::series::SeriesHandle;

/// Candle colors assigned to an asset by its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorScheme {
    pub up_color: &'static str,
    pub down_color: &'static str,
    pub border_up_color: &'static str,
    pub border_down_color: &'static str,
    pub wick_up_color: &'static str,
    pub wick_down_color: &'static str,
}

impl ColorScheme {
    const fn pair(up: &'static str, down: &'static str) -> Self {
        Self {
            up_color: up,
            down_color: down,
            border_up_color: up,
            border_down_color: down,
            wick_up_color: up,
            wick_down_color: down,
        }
    }

    /// Scheme for the asset at `index`. Indices past the palette reuse the
    /// first scheme.
    pub fn for_index(index: usize) -> ColorScheme {
        PALETTE.get(index).copied().unwrap_or(PALETTE[0])
    }

    /// Candlestick options in this scheme. Only the main asset shows its
    /// price line and last value.
    pub fn candlestick_options(&self, is_main: bool) -> SeriesOptions {
        SeriesOptions {
            up_color: Some(self.up_color.to_string()),
            down_color: Some(self.down_color.to_string()),
            border_up_color: Some(self.border_up_color.to_string()),
            border_down_color: Some(self.border_down_color.to_string()),
            wick_up_color: Some(self.wick_up_color.to_string()),
            wick_down_color: Some(self.wick_down_color.to_string()),
            price_scale_id: Some("right".to_string()),
            price_line_visible: Some(is_main),
            last_value_visible: Some(is_main),
            ..Default::default()
        }
    }
}

const PALETTE: [ColorScheme; 3] = [
    ColorScheme::pair("#26a69a", "#ef5350"),
    ColorScheme::pair("#2196f3", "#ff9800"),
    ColorScheme::pair("#9c27b0", "#4caf50"),
];

/// One loaded asset. `data` holds the validated, unscaled candles.
#[derive(Debug, Clone, PartialEq)]
pub struct StockInfo {
    pub code: String,
    pub name: String,
    pub color_scheme: ColorScheme,
    pub data: Vec<Candle>,
    pub is_main: bool,
}

impl StockInfo {
    pub fn new(index: usize, code: &str, data: Vec<Candle>) -> Self {
        Self {
            code: code.to_string(),
            name: stock_name(code),
            color_scheme: ColorScheme::for_index(index),
            data,
            is_main: index == 0,
        }
    }

    pub fn baseline(&self) -> Option<f64> {
        baseline_price(&self.data)
    }
}

/// Display name for an asset code until a real name is known.
pub fn stock_name(code: &str) -> String {
    format!("股票{code}")
}

/// Close of the first bar.
pub fn baseline_price(data: &[Candle]) -> Option<f64> {
    data.first().map(|candle| candle.close)
}

/// Replace a non-finite ratio with 1.
pub fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio
    } else {
        1.0
    }
}

/// Ratio of each baseline to `reference`: `reference / baseline[i]`.
/// Missing baselines get 1.
pub fn compute_ratios(reference: f64, baselines: &[Option<f64>]) -> Vec<f64> {
    baselines
        .iter()
        .map(|baseline| baseline.map_or(1.0, |b| sanitize_ratio(reference / b)))
        .collect()
}

/// Whether the baselines are spread far enough apart to recommend
/// normalization: `max / min - 1 > threshold`. Fewer than two usable
/// baselines never qualify.
pub fn should_normalize(baselines: &[f64], threshold: f64) -> bool {
    let usable: Vec<f64> = baselines
        .iter()
        .copied()
        .filter(|b| b.is_finite() && *b > 0.0)
        .collect();
    if usable.len() < 2 {
        return false;
    }
    let max = usable.iter().copied().fold(f64::MIN, f64::max);
    let min = usable.iter().copied().fold(f64::MAX, f64::min);
    max / min - 1.0 > threshold
}

/// An indicator line drawn over an asset, with its unscaled points.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub series: SeriesHandle,
    pub original: Vec<LinePoint>,
}

/// Per-asset storage of the main chart, indexed by load position.
///
/// Slots may be empty: an asset whose load failed leaves a hole so that the
/// remaining assets keep their index, colors and ratios.
#[derive(Debug, Default)]
pub struct StockBook {
    stocks: Vec<Option<StockInfo>>,
    visibility: Vec<bool>,
    candle_series: Vec<Option<SeriesHandle>>,
    indicators: Vec<Vec<IndicatorSeries>>,
    ratios: Vec<f64>,
    enabled: bool,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_slot(&mut self, index: usize) {
        if self.stocks.len() <= index {
            self.stocks.resize(index + 1, None);
            self.visibility.resize(index + 1, true);
            self.candle_series.resize(index + 1, None);
            self.indicators.resize_with(index + 1, Vec::new);
        }
    }

    /// Store `info` at `index`, visible.
    pub fn insert(&mut self, index: usize, info: StockInfo) {
        self.ensure_slot(index);
        self.stocks[index] = Some(info);
        self.visibility[index] = true;
    }

    /// Empty the slot at `index`, forgetting its series.
    pub fn remove(&mut self, index: usize) -> Option<StockInfo> {
        let info = self.stocks.get_mut(index)?.take();
        self.candle_series[index] = None;
        self.indicators[index].clear();
        info
    }

    /// Number of slots, including empty ones.
    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.iter().all(Option::is_none)
    }

    pub fn stock(&self, index: usize) -> Option<&StockInfo> {
        self.stocks.get(index).and_then(Option::as_ref)
    }

    /// Loaded assets with their index.
    pub fn stocks(&self) -> impl Iterator<Item = (usize, &StockInfo)> {
        self.stocks
            .iter()
            .enumerate()
            .filter_map(|(index, stock)| stock.as_ref().map(|s| (index, s)))
    }

    pub fn set_candle_series(&mut self, index: usize, series: SeriesHandle) {
        self.ensure_slot(index);
        self.candle_series[index] = Some(series);
    }

    pub fn candle_series(&self, index: usize) -> Option<&SeriesHandle> {
        self.candle_series.get(index).and_then(Option::as_ref)
    }

    pub fn add_indicator(&mut self, index: usize, indicator: IndicatorSeries) {
        self.ensure_slot(index);
        self.indicators[index].push(indicator);
    }

    pub fn indicators(&self, index: usize) -> &[IndicatorSeries] {
        self.indicators.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every series drawn for the asset at `index`.
    pub fn series_of(&self, index: usize) -> Vec<SeriesHandle> {
        self.candle_series(index)
            .into_iter()
            .cloned()
            .chain(self.indicators(index).iter().map(|i| i.series.clone()))
            .collect()
    }

    /// Every series drawn for any asset.
    pub fn all_series(&self) -> Vec<SeriesHandle> {
        (0..self.len()).flat_map(|index| self.series_of(index)).collect()
    }

    /// Visibility of a slot. Empty and unknown slots are reported hidden.
    pub fn is_visible(&self, index: usize) -> bool {
        self.stock(index).is_some() && self.visibility.get(index).copied().unwrap_or(false)
    }

    /// Change visibility of a loaded asset. Returns false for an empty or
    /// unknown slot.
    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        if self.stock(index).is_none() {
            return false;
        }
        self.visibility[index] = visible;
        true
    }

    /// Indices of visible assets that have price data.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.stocks()
            .filter(|(index, stock)| self.is_visible(*index) && !stock.data.is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    /// The asset ratios are computed against: the first visible asset with
    /// data, else the first asset with data.
    pub fn reference_index(&self) -> Option<usize> {
        self.visible_indices().first().copied().or_else(|| {
            self.stocks()
                .find(|(_, stock)| !stock.data.is_empty())
                .map(|(index, _)| index)
        })
    }

    /// Ratio for every slot, or `None` without a reference asset.
    pub fn compute_ratios(&self) -> Option<Vec<f64>> {
        let reference = self.stock(self.reference_index()?)?.baseline()?;
        let baselines: Vec<Option<f64>> = (0..self.len())
            .map(|index| self.stock(index).and_then(StockInfo::baseline))
            .collect();
        Some(compute_ratios(reference, &baselines))
    }

    /// Recommend normalization from the baselines of visible assets.
    pub fn should_normalize(&self, threshold: f64) -> bool {
        let baselines: Vec<f64> = self
            .visible_indices()
            .into_iter()
            .filter_map(|index| self.stock(index).and_then(StockInfo::baseline))
            .collect();
        should_normalize(&baselines, threshold)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Ratios in effect; empty while normalization is off.
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// Compute ratios and push scaled data to every series.
    ///
    /// A no-op returning false with fewer than two visible assets with data.
    pub fn enable(&mut self) -> bool {
        if self.visible_indices().len() < 2 {
            log::debug!("Not normalizing: fewer than two visible assets");
            return false;
        }
        let Some(ratios) = self.compute_ratios() else {
            return false;
        };
        log::info!("Normalizing prices with ratios {:?}", ratios);
        self.ratios = ratios;
        self.enabled = true;
        self.apply();
        true
    }

    /// Recompute ratios after visibility changed. No-op while disabled.
    pub fn refresh(&mut self) {
        if !self.enabled {
            return;
        }
        match self.compute_ratios() {
            Some(ratios) => {
                self.ratios = ratios;
                self.apply();
            }
            None => self.disable(),
        }
    }

    /// Push data scaled by the current ratios. Absent assets are skipped and
    /// only price-scaled indicators are rescaled. Returns the number of
    /// series updated.
    pub fn apply(&self) -> usize {
        let mut updated = 0;
        for (index, stock) in self.stocks() {
            let ratio = self.ratios.get(index).copied().map_or(1.0, sanitize_ratio);
            if let Some(series) = self.candle_series(index) {
                let data = stock.data.iter().map(|c| c.scaled(ratio)).collect();
                updated += push(series, SeriesData::Candles(data), &stock.code);
            }
            for indicator in self.indicators(index).iter().filter(|i| i.kind.is_price_scaled()) {
                let data = indicator.original.iter().map(|p| p.scaled(ratio)).collect();
                updated += push(&indicator.series, SeriesData::Line(data), &stock.code);
            }
        }
        updated
    }

    /// Restore the original data exactly and drop the ratios.
    pub fn disable(&mut self) {
        for (index, stock) in self.stocks() {
            if let Some(series) = self.candle_series(index) {
                push(series, SeriesData::Candles(stock.data.clone()), &stock.code);
            }
            for indicator in self.indicators(index).iter().filter(|i| i.kind.is_price_scaled()) {
                push(&indicator.series, SeriesData::Line(indicator.original.clone()), &stock.code);
            }
        }
        self.ratios.clear();
        self.enabled = false;
        log::info!("Normalization disabled, original prices restored");
    }

    /// Ratio currently applied to the asset at `index`.
    pub fn ratio(&self, index: usize) -> f64 {
        self.ratios.get(index).copied().map_or(1.0, sanitize_ratio)
    }

    /// Time span covered by visible assets. Times that cannot be converted
    /// are ignored.
    pub fn visible_time_bounds(&self) -> Option<TimeRange> {
        let seconds: Vec<f64> = self
            .visible_indices()
            .into_iter()
            .filter_map(|index| self.stock(index))
            .flat_map(|stock| stock.data.iter().filter_map(|c| c.time.to_seconds()))
            .collect();
        let from = seconds.iter().copied().reduce(f64::min)?;
        let to = seconds.iter().copied().reduce(f64::max)?;
        TimeRange::new(from, to)
    }

    /// Forget every asset and series.
    pub fn clear(&mut self) {
        self.stocks.clear();
        self.visibility.clear();
        self.candle_series.clear();
        self.indicators.clear();
        self.ratios.clear();
        self.enabled = false;
    }
}

fn push(series: &SeriesHandle, data: SeriesData, code: &str) -> usize {
    match series.set_data(&data) {
        Ok(()) => 1,
        Err(e) => {
            log::warn!("Failed to update {} series of {}: {:#}", series.kind(), code, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use charter_config::ChartOptions;

    use super::*;
    use crate::recording::{RecordingChart, RecordingLibrary};
    use crate::render::{ChartApi, ChartLibrary, Container, SeriesKind};

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle::new(format!("2023-01-{:02}", i + 1), close, close + 1.0, close - 1.0, close))
            .collect()
    }

    struct Fixture {
        chart: Rc<dyn ChartApi>,
        recorded: Rc<RecordingChart>,
        book: StockBook,
    }

    fn fixture(stocks: &[(&str, Vec<Candle>)]) -> Fixture {
        let library = RecordingLibrary::new();
        let chart = library
            .create_chart(&Container::new("main", 800, 400), &ChartOptions::default())
            .unwrap();
        let recorded = library.last_chart().unwrap();
        let mut book = StockBook::new();
        for (index, (code, data)) in stocks.iter().enumerate() {
            book.insert(index, StockInfo::new(index, code, data.clone()));
            let options = ColorScheme::for_index(index).candlestick_options(index == 0);
            let api = chart.add_series(SeriesKind::Candlestick, &options).unwrap();
            let series = SeriesHandle::new(SeriesKind::Candlestick, options, api);
            series.set_data(&SeriesData::Candles(data.clone())).unwrap();
            book.set_candle_series(index, series);
        }
        Fixture { chart, recorded, book }
    }

    fn candles_of(f: &Fixture, index: usize) -> Vec<Candle> {
        match f.recorded.series()[index].data() {
            Some(SeriesData::Candles(data)) => data,
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn test_stock_name() {
        assert_eq!(stock_name("AAPL"), "股票AAPL");
        assert_eq!(stock_name("SZ.000001"), "股票SZ.000001");
        assert_eq!(StockInfo::new(2, "SH.600000", Vec::new()).name, "股票SH.600000");
    }

    #[test]
    fn test_ratio_example() {
        let ratios = compute_ratios(100.0, &[Some(100.0), Some(2000.0)]);
        assert_eq!(ratios, vec![1.0, 0.05]);

        let scaled = Candle::new("2023-01-01", 2000.0, 2050.0, 1950.0, 2000.0).scaled(0.05);
        assert!(close_to(scaled.open, 100.0));
        assert!(close_to(scaled.high, 102.5));
        assert!(close_to(scaled.low, 97.5));
        assert!(close_to(scaled.close, 100.0));
    }

    #[test]
    fn test_non_finite_ratio_becomes_one() {
        assert_eq!(compute_ratios(100.0, &[Some(0.0), None, Some(f64::NAN)]), vec![1.0, 1.0, 1.0]);
        assert_eq!(sanitize_ratio(f64::INFINITY), 1.0);
        assert_eq!(sanitize_ratio(0.5), 0.5);
    }

    #[test]
    fn test_should_normalize() {
        assert!(should_normalize(&[100.0, 2000.0], 0.3));
        assert!(!should_normalize(&[100.0, 120.0], 0.3));
        assert!(!should_normalize(&[100.0], 0.3));
        assert!(!should_normalize(&[], 0.3));
        assert!(!should_normalize(&[100.0, f64::NAN], 0.3));
        assert!(should_normalize(&[100.0, 120.0], 0.1));
    }

    #[test]
    fn test_color_schemes() {
        assert_eq!(ColorScheme::for_index(0).up_color, "#26a69a");
        assert_eq!(ColorScheme::for_index(2).down_color, "#4caf50");
        assert_eq!(ColorScheme::for_index(7), ColorScheme::for_index(0));

        let options = ColorScheme::for_index(1).candlestick_options(false);
        assert_eq!(options.up_color.as_deref(), Some("#2196f3"));
        assert_eq!(options.price_line_visible, Some(false));
        assert_eq!(options.last_value_visible, Some(false));
    }

    #[test]
    fn test_enable_scales_and_disable_restores() {
        let a = candles(&[100.0, 101.0]);
        let b = vec![
            Candle::new("2023-01-01", 2000.0, 2050.0, 1950.0, 2000.0).with_volume(5.0),
            Candle::new("2023-01-02", 2010.0, 2060.0, 1990.0, 2020.0),
        ];
        let mut f = fixture(&[("A", a.clone()), ("B", b.clone())]);

        assert!(f.book.enable());
        assert!(f.book.is_enabled());
        assert_eq!(f.book.ratios(), &[1.0, 0.05]);

        let scaled = candles_of(&f, 1);
        assert!(close_to(scaled[0].high, 102.5));
        assert!(close_to(scaled[0].low, 97.5));
        assert_eq!(scaled[0].volume, Some(5.0));
        assert_eq!(candles_of(&f, 0), a);

        f.book.disable();
        assert!(!f.book.is_enabled());
        assert!(f.book.ratios().is_empty());
        assert_eq!(candles_of(&f, 1), b);
        assert_eq!(candles_of(&f, 0), a);
    }

    #[test]
    fn test_enable_requires_two_visible_assets() {
        let mut single = fixture(&[("A", candles(&[100.0]))]);
        assert!(!single.book.enable());
        assert!(!single.book.is_enabled());

        let mut f = fixture(&[("A", candles(&[100.0])), ("B", candles(&[2000.0]))]);
        f.book.set_visible(1, false);
        assert!(!f.book.enable());
        assert_eq!(f.recorded.series()[1].set_data_calls(), 1);

        let mut empty = StockBook::new();
        assert!(!empty.enable());
    }

    #[test]
    fn test_reference_is_first_visible_asset() {
        let mut f = fixture(&[
            ("A", candles(&[50.0])),
            ("B", candles(&[100.0])),
            ("C", candles(&[400.0])),
        ]);
        f.book.set_visible(0, false);

        assert_eq!(f.book.reference_index(), Some(1));
        let ratios = f.book.compute_ratios().unwrap();
        assert_eq!(ratios, vec![2.0, 1.0, 0.25]);

        f.book.set_visible(1, false);
        f.book.set_visible(2, false);
        assert_eq!(f.book.reference_index(), Some(0));
    }

    #[test]
    fn test_absent_assets_are_skipped() {
        let mut f = fixture(&[("A", candles(&[100.0]))]);
        f.book.insert(2, StockInfo::new(2, "C", candles(&[300.0])));

        assert_eq!(f.book.len(), 3);
        assert!(f.book.stock(1).is_none());
        assert!(!f.book.is_visible(1));
        assert_eq!(f.book.visible_indices(), vec![0, 2]);
        assert!(f.book.enable());
        assert_eq!(f.book.ratios()[1], 1.0);
        assert!(close_to(f.book.ratio(2), 1.0 / 3.0));
    }

    #[test]
    fn test_price_scaled_indicators_follow_ratio() {
        let mut f = fixture(&[("A", candles(&[100.0])), ("B", candles(&[1000.0]))]);
        let line = |kind: IndicatorKind| {
            let options = SeriesOptions::default();
            let api = f.chart.add_series(SeriesKind::Line, &options).unwrap();
            IndicatorSeries {
                kind,
                series: SeriesHandle::new(SeriesKind::Line, options, api),
                original: vec![LinePoint::new("2023-01-01", 1000.0)],
            }
        };
        let ma = line(IndicatorKind::MovingAverage(5));
        let macd = line(IndicatorKind::Macd);
        f.book.add_indicator(1, ma);
        f.book.add_indicator(1, macd);
        let lines = f.recorded.series_of(SeriesKind::Line);

        assert!(f.book.enable());
        assert_eq!(
            lines[0].data(),
            Some(SeriesData::Line(vec![LinePoint::new("2023-01-01", 100.0)]))
        );
        assert_eq!(lines[1].set_data_calls(), 0);

        f.book.disable();
        assert_eq!(
            lines[0].data(),
            Some(SeriesData::Line(vec![LinePoint::new("2023-01-01", 1000.0)]))
        );
        assert_eq!(f.book.series_of(1).len(), 3);
    }

    #[test]
    fn test_refresh_after_visibility_change() {
        let mut f = fixture(&[
            ("A", candles(&[100.0])),
            ("B", candles(&[200.0])),
            ("C", candles(&[400.0])),
        ]);
        assert!(f.book.enable());
        assert_eq!(f.book.ratios(), &[1.0, 0.5, 0.25]);

        f.book.set_visible(0, false);
        f.book.refresh();
        assert_eq!(f.book.ratios(), &[2.0, 1.0, 0.5]);
    }

    #[test]
    fn test_visible_time_bounds() {
        let mut f = fixture(&[
            ("A", candles(&[1.0, 2.0])),
            ("B", vec![Candle::new("2023-01-05", 1.0, 1.0, 1.0, 1.0), Candle::new("garbage", 1.0, 1.0, 1.0, 1.0)]),
        ]);
        assert_eq!(
            f.book.visible_time_bounds(),
            Some(TimeRange { from: 1_672_531_200.0, to: 1_672_876_800.0 })
        );

        f.book.set_visible(1, false);
        assert_eq!(
            f.book.visible_time_bounds(),
            Some(TimeRange { from: 1_672_531_200.0, to: 1_672_617_600.0 })
        );
        assert!(!f.book.set_visible(9, true));
    }

    #[test]
    fn test_clear() {
        let mut f = fixture(&[("A", candles(&[1.0])), ("B", candles(&[9.0]))]);
        f.book.enable();
        f.book.clear();
        assert!(f.book.is_empty());
        assert!(!f.book.is_enabled());
        assert!(f.book.all_series().is_empty());
    }
}
