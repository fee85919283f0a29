//! Oscillator sub-chart.

use std::cell::RefCell;

use charter_config::{ChartKind, ChartOptionsOverride, TimeScalePatch};
use charter_core::{Candle, SeriesData};
use charter_indicators::IndicatorKind;

use crate::context::ChartContext;
use crate::error::{ChartError, Result};
use crate::render::{Container, SeriesKind, SeriesOptions};
use crate::series::SeriesHandle;

use super::handle::ChartHandle;
use super::ChartWidget;

/// A sub-chart plotting one indicator in its own price scale.
pub struct IndicatorChart {
    handle: ChartHandle,
    indicator: IndicatorKind,
    key: String,
    series: RefCell<Option<SeriesHandle>>,
}

impl IndicatorChart {
    /// Build the widget and register it with the coordinator under
    /// `indicator_<kind>`.
    pub fn new(ctx: &ChartContext, container: Container, indicator: IndicatorKind) -> Self {
        Self::with_overrides(ctx, container, indicator, ChartOptionsOverride::default())
    }

    pub fn with_overrides(
        ctx: &ChartContext,
        container: Container,
        indicator: IndicatorKind,
        overrides: ChartOptionsOverride,
    ) -> Self {
        let handle = ChartHandle::new(ctx, ChartKind::Indicator, Some(container), overrides);
        let key = format!("indicator_{indicator}");
        ctx.coordinator().register_chart(&key, &handle, false);
        Self {
            handle,
            indicator,
            key,
            series: RefCell::new(None),
        }
    }

    pub fn indicator(&self) -> IndicatorKind {
        self.indicator
    }

    /// Coordinator key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn series(&self) -> Option<SeriesHandle> {
        self.series.borrow().clone()
    }

    /// Recompute the indicator from `candles` and redraw it.
    ///
    /// Returns false before the chart is created, when there are too few
    /// candles for the indicator, or when the renderer rejects the data.
    pub fn set_candles(&self, candles: &[Candle]) -> bool {
        let Some(series) = self.series() else {
            return false;
        };
        let Some(values) = self.indicator.compute(candles) else {
            log::warn!("Not enough candles for {} ({})", self.indicator, candles.len());
            return false;
        };
        let points = values.to_line_points(candles);
        match series.set_data(&SeriesData::Line(points)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to set {} data: {:#}", self.indicator, e);
                false
            }
        }
    }
}

impl ChartWidget for IndicatorChart {
    fn handle(&self) -> &ChartHandle {
        &self.handle
    }

    fn create(&self) -> Result<()> {
        self.handle.create()?;
        let options = SeriesOptions {
            title: Some(self.indicator.to_string()),
            color: Some("#2962ff".to_string()),
            line_width: Some(1.0),
            price_line_visible: Some(false),
            ..Default::default()
        };
        let series = self
            .handle
            .add_series(SeriesKind::Line, options)
            .ok_or_else(|| ChartError::SeriesCreationFailed {
                kind: SeriesKind::Line,
                reason: format!("renderer refused the {} series", self.indicator),
            })?;
        *self.series.borrow_mut() = Some(series);
        self.handle.apply_unified_time_scale(&TimeScalePatch::default());
        Ok(())
    }

    fn destroy(&self) {
        self.series.borrow_mut().take();
        self.handle.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use charter_config::Config;

    use super::*;
    use crate::recording::RecordingLibrary;
    use crate::scheduler::ManualScheduler;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                Candle::new(1_672_531_200 + i as i64 * 86_400, close, close + 1.0, close - 1.0, close)
            })
            .collect()
    }

    #[test]
    fn test_macd_subchart() {
        let library = RecordingLibrary::new();
        let ctx = ChartContext::new(Some(library.clone()), Rc::new(ManualScheduler::new()), Config::default());
        let chart = IndicatorChart::new(&ctx, Container::new("macd", 800, 120), IndicatorKind::Macd);
        assert_eq!(chart.key(), "indicator_macd");
        assert!(ctx.coordinator().contains("indicator_macd"));

        chart.create().unwrap();
        assert!(chart.set_candles(&candles(60)));

        let recorded = library.chart_for("macd").unwrap();
        assert_eq!(recorded.options.height, 120);
        let line = &recorded.series_of(SeriesKind::Line)[0];
        assert_eq!(line.options().title.as_deref(), Some("macd"));
        assert!(line.data().is_some_and(|data| !data.is_empty()));
    }

    #[test]
    fn test_squeeze_subchart() {
        let library = RecordingLibrary::new();
        let ctx = ChartContext::new(Some(library.clone()), Rc::new(ManualScheduler::new()), Config::default());
        let chart = IndicatorChart::new(&ctx, Container::new("squeeze", 800, 120), IndicatorKind::Squeeze);
        chart.create().unwrap();

        // one bar short of the first momentum value
        assert!(!chart.set_candles(&candles(38)));
        assert!(chart.set_candles(&candles(60)));
        let recorded = library.chart_for("squeeze").unwrap();
        let line = &recorded.series_of(SeriesKind::Line)[0];
        match line.data() {
            Some(SeriesData::Line(points)) => assert_eq!(points.len(), 22),
            other => panic!("unexpected data {other:?}"),
        }

        chart.destroy();
        assert!(!ctx.coordinator().contains("indicator_squeeze"));
    }
}
