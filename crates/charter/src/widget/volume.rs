//! Volume sub-chart.

use std::cell::RefCell;

use charter_config::{ChartKind, ChartOptionsOverride, TimeScalePatch};
use charter_core::{Candle, HistogramPoint, SeriesData};

use crate::context::ChartContext;
use crate::error::{ChartError, Result};
use crate::render::{Container, PriceFormat, SeriesKind, SeriesOptions};
use crate::series::SeriesHandle;

use super::handle::ChartHandle;
use super::ChartWidget;

/// Key the volume chart is registered under with the coordinator.
pub const VOLUME_KEY: &str = "volume";

const UP_COLOR: &str = "#26a69a";
const DOWN_COLOR: &str = "#ef5350";
const EMPTY_COLOR: &str = "rgba(0,0,0,0)";

/// Histogram bars for `candles`, colored by candle direction.
///
/// A candle without volume yields a transparent zero-height bar so the
/// histogram keeps one bar per candle.
pub fn volume_points(candles: &[Candle]) -> Vec<HistogramPoint> {
    candles
        .iter()
        .map(|candle| match candle.volume {
            Some(volume) => HistogramPoint {
                time: candle.time.clone(),
                value: volume,
                color: Some(if candle.is_bullish() { UP_COLOR } else { DOWN_COLOR }.to_string()),
            },
            None => HistogramPoint {
                time: candle.time.clone(),
                value: 0.0,
                color: Some(EMPTY_COLOR.to_string()),
            },
        })
        .collect()
}

/// Histogram of traded volume below the main chart.
///
/// Registered as a secondary chart, so it follows the main chart's viewport.
pub struct VolumeChart {
    handle: ChartHandle,
    series: RefCell<Option<SeriesHandle>>,
}

impl VolumeChart {
    pub fn new(ctx: &ChartContext, container: Container) -> Self {
        Self::with_overrides(ctx, container, ChartOptionsOverride::default())
    }

    pub fn with_overrides(ctx: &ChartContext, container: Container, overrides: ChartOptionsOverride) -> Self {
        let handle = ChartHandle::new(ctx, ChartKind::Volume, Some(container), overrides);
        ctx.coordinator().register_chart(VOLUME_KEY, &handle, false);
        Self {
            handle,
            series: RefCell::new(None),
        }
    }

    /// The histogram series, once created.
    pub fn series(&self) -> Option<SeriesHandle> {
        self.series.borrow().clone()
    }

    /// Replace the histogram with bars for `candles`. Returns false before
    /// the chart is created or when the renderer rejects the data.
    pub fn set_candles(&self, candles: &[Candle]) -> bool {
        let Some(series) = self.series() else {
            log::debug!("Volume chart {} has no series yet", self.handle.id());
            return false;
        };
        match series.set_data(&SeriesData::Histogram(volume_points(candles))) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to set volume data: {:#}", e);
                false
            }
        }
    }
}

impl ChartWidget for VolumeChart {
    fn handle(&self) -> &ChartHandle {
        &self.handle
    }

    fn create(&self) -> Result<()> {
        self.handle.create()?;
        let options = SeriesOptions {
            title: Some("Volume".to_string()),
            price_format: Some(PriceFormat::Volume),
            price_scale_id: Some("right".to_string()),
            price_line_visible: Some(false),
            last_value_visible: Some(false),
            ..Default::default()
        };
        let series = self
            .handle
            .add_series(SeriesKind::Histogram, options)
            .ok_or_else(|| ChartError::SeriesCreationFailed {
                kind: SeriesKind::Histogram,
                reason: "renderer refused the volume series".to_string(),
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
