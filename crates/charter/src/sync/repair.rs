//! Viewport repair and alignment.
//!
//! Renderers report a logical range with a negative start when the user
//! scrolls before the first bar or when a new series shifts the bar index.
//! Such ranges are never copied to other charts: they are corrected on the
//! chart that produced them, first by fitting content and then by setting a
//! range starting at bar zero.

use charter_config::TimeScalePatch;
use charter_core::LogicalRange;

use crate::error::reason;
use crate::render::{SeriesKind, TimeScaleApi};
use crate::widget::handle::ChartHandle;

/// How a negative logical range was dealt with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepairOutcome {
    /// The range was healthy.
    NotNeeded,
    /// Fitting content produced a healthy range.
    Fitted,
    /// Fitting did not help; the range was set by hand.
    ManuallyFixed(LogicalRange),
    /// Every corrective call failed.
    Failed,
    /// The chart has no renderer instance.
    NoChart,
}

impl RepairOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, RepairOutcome::Fitted | RepairOutcome::ManuallyFixed(_))
    }
}

/// Correct `problematic`, the range `chart` currently reports.
///
/// Fits content first. If the chart still reports a negative or non-finite
/// range afterwards, or fitting failed, a range of the same width starting at
/// bar zero is applied, never narrower than `min_width` bars.
pub fn fix_negative_logical_range(chart: &ChartHandle, problematic: LogicalRange, min_width: f64) -> RepairOutcome {
    if chart.time_scale().is_none() {
        return RepairOutcome::NoChart;
    }

    log::debug!(
        "Repairing logical range {:.2} .. {:.2} of chart {}",
        problematic.from,
        problematic.to,
        chart.id()
    );
    if chart.fit_content() && chart.logical_range().is_some_and(|range| range.is_healthy()) {
        return RepairOutcome::Fitted;
    }
    manual_fix_logical_range(chart, problematic, min_width)
}

/// Apply `{0, max(width, min_width)}` where width is that of `problematic`.
pub fn manual_fix_logical_range(chart: &ChartHandle, problematic: LogicalRange, min_width: f64) -> RepairOutcome {
    let Some(time_scale) = chart.time_scale() else {
        return RepairOutcome::NoChart;
    };

    let width = problematic.width();
    let width = if width.is_finite() { width.max(min_width) } else { min_width };
    let range = LogicalRange::new(0.0, width);
    match time_scale.set_visible_logical_range(range) {
        Ok(()) => {
            log::info!("Set logical range of chart {} to 0 .. {:.2}", chart.id(), width);
            RepairOutcome::ManuallyFixed(range)
        }
        Err(e) => {
            log::error!("Failed to repair logical range of chart {}: {:#}", chart.id(), e);
            RepairOutcome::Failed
        }
    }
}

/// Called around adding a series: repairs the chart when the new series
/// left its logical range negative. Returns true if a repair happened.
pub fn check_and_fix_negative_logical_range(
    chart: &ChartHandle,
    before: Option<LogicalRange>,
    after: Option<LogicalRange>,
    kind: SeriesKind,
) -> bool {
    let Some(after) = after else {
        return false;
    };
    if after.is_healthy() {
        return false;
    }

    match before {
        Some(before) => log::warn!(
            "Adding {} series moved logical range of chart {} from {:.2} .. {:.2} to {:.2} .. {:.2}",
            kind,
            chart.id(),
            before.from,
            before.to,
            after.from,
            after.to
        ),
        None => log::warn!(
            "Adding {} series left chart {} at logical range {:.2} .. {:.2}",
            kind,
            chart.id(),
            after.from,
            after.to
        ),
    }

    let min_width = chart.config().sync.min_logical_width;
    fix_negative_logical_range(chart, after, min_width).is_repaired()
}

/// Result of comparing a secondary chart's viewport with the primary's.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentReport {
    pub primary_logical: Option<LogicalRange>,
    pub secondary_logical: Option<LogicalRange>,
    pub primary_bar_spacing: Option<f64>,
    pub secondary_bar_spacing: Option<f64>,
    pub logical_aligned: bool,
    pub spacing_aligned: bool,
}

impl AlignmentReport {
    pub fn is_aligned(&self) -> bool {
        self.logical_aligned && self.spacing_aligned
    }
}

/// Compare logical ranges and bar spacing of two charts.
///
/// Diagnostic only: nothing is changed. Returns `None` when either chart has
/// no renderer instance.
pub fn verify_alignment(primary: &ChartHandle, secondary: &ChartHandle, tolerance: f64) -> Option<AlignmentReport> {
    let primary_scale = primary.time_scale()?;
    let secondary_scale = secondary.time_scale()?;

    let primary_logical = primary.logical_range();
    let secondary_logical = secondary.logical_range();
    let primary_bar_spacing = primary_scale.options().ok().map(|o| o.bar_spacing);
    let secondary_bar_spacing = secondary_scale.options().ok().map(|o| o.bar_spacing);

    let logical_aligned = match (primary_logical, secondary_logical) {
        (Some(a), Some(b)) => a.approx_eq(&b, tolerance),
        (None, None) => true,
        _ => false,
    };
    let spacing_aligned = match (primary_bar_spacing, secondary_bar_spacing) {
        (Some(a), Some(b)) => (a - b).abs() <= f64::EPSILON,
        _ => false,
    };

    let report = AlignmentReport {
        primary_logical,
        secondary_logical,
        primary_bar_spacing,
        secondary_bar_spacing,
        logical_aligned,
        spacing_aligned,
    };
    if report.is_aligned() {
        log::debug!("Chart {} is aligned with {}", secondary.id(), primary.id());
    } else {
        log::warn!("Chart {} drifted from {}: {:?}", secondary.id(), primary.id(), report);
    }
    Some(report)
}

/// Outcome of one step of [`force_alignment`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Applied,
    /// The primary had nothing usable to copy.
    Skipped,
    Failed(String),
}

/// Which steps of [`force_alignment`] took effect.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    pub spacing: StepOutcome,
    pub visible_range: StepOutcome,
    pub logical_range: StepOutcome,
}

impl AlignmentResult {
    fn skipped() -> Self {
        Self {
            spacing: StepOutcome::Skipped,
            visible_range: StepOutcome::Skipped,
            logical_range: StepOutcome::Skipped,
        }
    }

    /// True if no step failed.
    pub fn is_complete(&self) -> bool {
        ![&self.spacing, &self.visible_range, &self.logical_range]
            .iter()
            .any(|step| matches!(step, StepOutcome::Failed(_)))
    }
}

/// Copy spacing options, the visible time range and the logical range from
/// `primary` to `secondary`, in that order. A failing step does not stop the
/// following ones. A negative logical range is not copied.
pub fn force_alignment(primary: &ChartHandle, secondary: &ChartHandle) -> AlignmentResult {
    let (Some(primary_scale), Some(secondary_scale)) = (primary.time_scale(), secondary.time_scale()) else {
        log::debug!("Cannot align chart {} with {}: not created", secondary.id(), primary.id());
        return AlignmentResult::skipped();
    };

    let spacing = match primary_scale.options() {
        Ok(options) => step(secondary_scale.apply_options(&options.spacing_patch())),
        Err(e) => StepOutcome::Failed(reason(&e)),
    };
    let visible_range = match primary.time_range() {
        Some(range) => step(secondary_scale.set_visible_range(range)),
        None => StepOutcome::Skipped,
    };
    let logical_range = match primary.logical_range() {
        Some(range) if range.is_healthy() => step(secondary_scale.set_visible_logical_range(range)),
        _ => StepOutcome::Skipped,
    };

    let result = AlignmentResult {
        spacing,
        visible_range,
        logical_range,
    };
    let aligned = result.is_complete();
    if !aligned {
        log::warn!("Forced alignment of chart {} incomplete: {:?}", secondary.id(), result);
    }
    if secondary.state().is_aligned != aligned {
        secondary.update_state(|state| state.is_aligned = aligned);
    }
    result
}

fn step(result: anyhow::Result<()>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Applied,
        Err(e) => StepOutcome::Failed(reason(&e)),
    }
}

/// Copy the primary's bar spacing to every secondary. Returns how many
/// secondaries were updated; a non-finite or non-positive spacing copies
/// nothing.
pub fn sync_bar_spacing(primary: &ChartHandle, secondaries: &[ChartHandle]) -> usize {
    let Some(bar_spacing) = primary
        .time_scale()
        .and_then(|time_scale| time_scale.options().ok())
        .map(|options| options.bar_spacing)
    else {
        return 0;
    };
    if !bar_spacing.is_finite() || bar_spacing <= 0.0 {
        log::warn!("Not copying invalid bar spacing {} from chart {}", bar_spacing, primary.id());
        return 0;
    }

    let patch = TimeScalePatch {
        bar_spacing: Some(bar_spacing),
        ..Default::default()
    };
    secondaries
        .iter()
        .filter_map(|chart| chart.time_scale().map(|time_scale| (chart, time_scale)))
        .filter(|(chart, time_scale)| match time_scale.apply_options(&patch) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to copy bar spacing to chart {}: {:#}", chart.id(), e);
                false
            }
        })
        .count()
}
