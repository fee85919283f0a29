//! Configuration management for charter.
//!
//! Loads chart presets, synchronization and normalization settings from TOML
//! files. Presets follow a "full defaults + per-kind override" layout: every
//! chart starts from `[charts.defaults]` and the override registered for its
//! kind is merged on top, then any caller-supplied override.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid chart options: {0}")]
    InvalidOptions(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub charts: ChartsConfig,
    pub sync: SyncConfig,
    pub normalization: NormalizationConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations.
    ///
    /// Searches in order:
    /// 1. `./charter.toml`
    /// 2. `~/.config/charter/config.toml`
    ///
    /// Returns default config if no file found.
    pub fn load_default() -> Self {
        if let Ok(config) = Self::load(Self::default_path()) {
            return config;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("charter").join("config.toml");
            if let Ok(config) = Self::load(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Save configuration to a file path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("charter.toml")
    }

    /// Chart options for a kind: defaults merged with the kind's preset.
    pub fn chart_options(&self, kind: ChartKind) -> ChartOptions {
        self.charts
            .presets
            .get(kind.as_str())
            .map(|preset| self.charts.defaults.merge(preset))
            .unwrap_or_else(|| self.charts.defaults.clone())
    }

    /// Chart options looked up by preset name; unknown names get the defaults.
    pub fn chart_options_named(&self, name: &str) -> ChartOptions {
        match ChartKind::from_name(name) {
            Some(kind) => self.chart_options(kind),
            None => self.charts.defaults.clone(),
        }
    }

    /// Chart options for a kind with a caller override merged last.
    pub fn chart_options_with(&self, kind: ChartKind, custom: &ChartOptionsOverride) -> ChartOptions {
        self.chart_options(kind).merge(custom)
    }

    /// Time-scale settings shared by every synchronized chart, with `custom`
    /// taking precedence.
    pub fn unified_time_scale(&self, custom: &TimeScalePatch) -> TimeScalePatch {
        self.charts.unified_time_scale.merge(custom)
    }
}

/// The chart kinds that have presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Main,
    Volume,
    Indicator,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Main => "main",
            ChartKind::Volume => "volume",
            ChartKind::Indicator => "indicator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "main" => Some(ChartKind::Main),
            "volume" => Some(ChartKind::Volume),
            "indicator" => Some(ChartKind::Indicator),
            _ => None,
        }
    }
}

/// Chart presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    /// Options every chart starts from.
    pub defaults: ChartOptions,
    /// Per-kind overrides keyed by `main`, `volume`, `indicator`.
    pub presets: HashMap<String, ChartOptionsOverride>,
    /// Time-scale options applied to every synchronized chart.
    pub unified_time_scale: TimeScalePatch,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        let mut presets = HashMap::new();

        presets.insert(ChartKind::Main.as_str().to_string(), ChartOptionsOverride {
            height: Some(400),
            scale_margins: Some(ScaleMargins { top: 0.05, bottom: 0.35 }),
            ..Default::default()
        });
        presets.insert(ChartKind::Volume.as_str().to_string(), ChartOptionsOverride {
            height: Some(150),
            time_scale: TimeScalePatch {
                time_visible: Some(false),
                ..Default::default()
            },
            scale_margins: Some(ScaleMargins { top: 0.1, bottom: 0.0 }),
            ..Default::default()
        });
        presets.insert(ChartKind::Indicator.as_str().to_string(), ChartOptionsOverride {
            height: Some(120),
            time_scale: TimeScalePatch {
                time_visible: Some(false),
                ..Default::default()
            },
            scale_margins: Some(ScaleMargins { top: 0.1, bottom: 0.1 }),
            ..Default::default()
        });

        Self {
            defaults: ChartOptions::default(),
            presets,
            unified_time_scale: TimeScalePatch {
                bar_spacing: Some(6.0),
                right_offset: Some(12.0),
                fix_left_edge: Some(false),
                fix_right_edge: Some(false),
                lock_visible_time_range_on_resize: Some(false),
                ..Default::default()
            },
        }
    }
}

/// Full set of options handed to the renderer when a chart is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    pub layout: LayoutOptions,
    pub grid: GridOptions,
    pub time_scale: TimeScaleOptions,
    pub right_price_scale: PriceScaleOptions,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 400,
            layout: LayoutOptions::default(),
            grid: GridOptions::default(),
            time_scale: TimeScaleOptions::default(),
            right_price_scale: PriceScaleOptions::default(),
        }
    }
}

impl ChartOptions {
    /// Merge with an override, using override values where present.
    pub fn merge(&self, override_options: &ChartOptionsOverride) -> Self {
        let mut layout = self.layout.clone();
        if let Some(background) = &override_options.background_color {
            layout.background_color = background.clone();
        }
        if let Some(text) = &override_options.text_color {
            layout.text_color = text.clone();
        }

        let mut grid = self.grid.clone();
        if let Some(color) = &override_options.grid_color {
            grid.vert_lines_color = color.clone();
            grid.horz_lines_color = color.clone();
        }

        let mut right_price_scale = self.right_price_scale.clone();
        if let Some(margins) = override_options.scale_margins {
            right_price_scale.scale_margins = margins;
        }

        Self {
            width: override_options.width.unwrap_or(self.width),
            height: override_options.height.unwrap_or(self.height),
            layout,
            grid,
            time_scale: self.time_scale.merge(&override_options.time_scale),
            right_price_scale,
        }
    }

    /// Check the options describe a drawable chart.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidOptions(format!(
                "chart size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.time_scale.bar_spacing.is_finite() || self.time_scale.bar_spacing <= 0.0 {
            return Err(ConfigError::InvalidOptions(format!(
                "bar spacing must be positive, got {}",
                self.time_scale.bar_spacing
            )));
        }
        if !self.time_scale.right_offset.is_finite() {
            return Err(ConfigError::InvalidOptions("right offset must be finite".to_string()));
        }
        let margins = self.right_price_scale.scale_margins;
        if margins.top < 0.0 || margins.bottom < 0.0 || margins.top + margins.bottom >= 1.0 {
            return Err(ConfigError::InvalidOptions(format!(
                "scale margins {}/{} leave no room for the series",
                margins.top, margins.bottom
            )));
        }
        Ok(())
    }
}

/// Chart options override (all fields optional for partial overrides).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptionsOverride {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub grid_color: Option<String>,
    pub scale_margins: Option<ScaleMargins>,
    pub time_scale: TimeScalePatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub background_color: String,
    pub text_color: String,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            background_color: "#ffffff".to_string(),
            text_color: "#333".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    pub vert_lines_color: String,
    pub horz_lines_color: String,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            vert_lines_color: "#e0e0e0".to_string(),
            horz_lines_color: "#e0e0e0".to_string(),
        }
    }
}

/// Fraction of the pane kept empty above and below the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleMargins {
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceScaleOptions {
    pub scale_margins: ScaleMargins,
    pub border_visible: bool,
    pub auto_scale: bool,
}

impl Default for PriceScaleOptions {
    fn default() -> Self {
        Self {
            scale_margins: ScaleMargins { top: 0.1, bottom: 0.1 },
            border_visible: true,
            auto_scale: true,
        }
    }
}

/// Horizontal axis settings of one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeScaleOptions {
    /// Pixels per bar.
    pub bar_spacing: f64,
    /// Empty bars kept right of the last bar.
    pub right_offset: f64,
    pub fix_left_edge: bool,
    pub fix_right_edge: bool,
    pub lock_visible_time_range_on_resize: bool,
    pub shift_visible_range_on_new_bar: bool,
    pub time_visible: bool,
    pub seconds_visible: bool,
}

impl Default for TimeScaleOptions {
    fn default() -> Self {
        Self {
            bar_spacing: 6.0,
            right_offset: 12.0,
            fix_left_edge: false,
            fix_right_edge: false,
            lock_visible_time_range_on_resize: false,
            shift_visible_range_on_new_bar: true,
            time_visible: true,
            seconds_visible: false,
        }
    }
}

impl TimeScaleOptions {
    /// Merge with a patch, using patch values where present.
    pub fn merge(&self, patch: &TimeScalePatch) -> Self {
        Self {
            bar_spacing: patch.bar_spacing.unwrap_or(self.bar_spacing),
            right_offset: patch.right_offset.unwrap_or(self.right_offset),
            fix_left_edge: patch.fix_left_edge.unwrap_or(self.fix_left_edge),
            fix_right_edge: patch.fix_right_edge.unwrap_or(self.fix_right_edge),
            lock_visible_time_range_on_resize: patch
                .lock_visible_time_range_on_resize
                .unwrap_or(self.lock_visible_time_range_on_resize),
            shift_visible_range_on_new_bar: patch
                .shift_visible_range_on_new_bar
                .unwrap_or(self.shift_visible_range_on_new_bar),
            time_visible: patch.time_visible.unwrap_or(self.time_visible),
            seconds_visible: patch.seconds_visible.unwrap_or(self.seconds_visible),
        }
    }

    /// The spacing-related fields as a patch, for copying one chart's
    /// horizontal geometry onto another. Label visibility is left out.
    pub fn spacing_patch(&self) -> TimeScalePatch {
        TimeScalePatch {
            bar_spacing: Some(self.bar_spacing),
            right_offset: Some(self.right_offset),
            fix_left_edge: Some(self.fix_left_edge),
            fix_right_edge: Some(self.fix_right_edge),
            lock_visible_time_range_on_resize: Some(self.lock_visible_time_range_on_resize),
            shift_visible_range_on_new_bar: Some(self.shift_visible_range_on_new_bar),
            time_visible: None,
            seconds_visible: None,
        }
    }
}

/// Partial time-scale update (all fields optional).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeScalePatch {
    pub bar_spacing: Option<f64>,
    pub right_offset: Option<f64>,
    pub fix_left_edge: Option<bool>,
    pub fix_right_edge: Option<bool>,
    pub lock_visible_time_range_on_resize: Option<bool>,
    pub shift_visible_range_on_new_bar: Option<bool>,
    pub time_visible: Option<bool>,
    pub seconds_visible: Option<bool>,
}

impl TimeScalePatch {
    /// Patch touching only bar spacing and right offset.
    pub fn spacing(bar_spacing: Option<f64>, right_offset: f64) -> Self {
        Self {
            bar_spacing,
            right_offset: Some(right_offset),
            ..Default::default()
        }
    }

    /// Combine two patches; fields set in `other` win.
    pub fn merge(&self, other: &TimeScalePatch) -> Self {
        Self {
            bar_spacing: other.bar_spacing.or(self.bar_spacing),
            right_offset: other.right_offset.or(self.right_offset),
            fix_left_edge: other.fix_left_edge.or(self.fix_left_edge),
            fix_right_edge: other.fix_right_edge.or(self.fix_right_edge),
            lock_visible_time_range_on_resize: other
                .lock_visible_time_range_on_resize
                .or(self.lock_visible_time_range_on_resize),
            shift_visible_range_on_new_bar: other
                .shift_visible_range_on_new_bar
                .or(self.shift_visible_range_on_new_bar),
            time_visible: other.time_visible.or(self.time_visible),
            seconds_visible: other.seconds_visible.or(self.seconds_visible),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Viewport synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How many times a time-range request waits for series to appear.
    pub retry_max_attempts: u32,
    /// Delay between time-range retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Minimum width in bars of a manually repaired logical range.
    pub min_logical_width: f64,
    /// Right offset published before the primary reports one.
    pub default_right_offset: f64,
    /// Allowed drift in bars before two charts count as misaligned.
    pub alignment_tolerance: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 10,
            retry_delay_ms: 100,
            min_logical_width: 50.0,
            default_right_offset: 12.0,
            alignment_tolerance: 0.5,
        }
    }
}

impl SyncConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Price normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Relative spread of baseline prices above which normalization is
    /// recommended: `max / min - 1 > threshold`.
    pub threshold: f64,
    /// Engage normalization automatically after a load when recommended.
    pub auto_enable: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            auto_enable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let defaults = &config.charts.defaults;
        assert_eq!(defaults.width, 1000);
        assert_eq!(defaults.height, 400);
        assert_eq!(defaults.layout.background_color, "#ffffff");
        assert_eq!(defaults.layout.text_color, "#333");
        assert_eq!(defaults.grid.vert_lines_color, "#e0e0e0");
        assert!(defaults.time_scale.time_visible);
        assert!(!defaults.time_scale.seconds_visible);
        assert_eq!(defaults.time_scale.bar_spacing, 6.0);
        assert_eq!(defaults.time_scale.right_offset, 12.0);
        assert_eq!(config.sync.retry_max_attempts, 10);
        assert_eq!(config.normalization.threshold, 0.3);
    }

    #[test]
    fn test_kind_presets() {
        let config = Config::default();

        let main = config.chart_options(ChartKind::Main);
        assert_eq!(main.height, 400);
        assert_eq!(main.right_price_scale.scale_margins, ScaleMargins { top: 0.05, bottom: 0.35 });

        let volume = config.chart_options(ChartKind::Volume);
        assert_eq!(volume.height, 150);
        assert!(!volume.time_scale.time_visible);
        assert_eq!(volume.right_price_scale.scale_margins.top, 0.1);

        let indicator = config.chart_options(ChartKind::Indicator);
        assert_eq!(indicator.height, 120);
        assert!(!indicator.time_scale.time_visible);

        // Unknown preset names use the defaults
        assert_eq!(config.chart_options_named("unknown"), config.charts.defaults);
    }

    #[test]
    fn test_caller_override_merges_over_preset() {
        let config = Config::default();
        let custom = ChartOptionsOverride {
            height: Some(500),
            time_scale: TimeScalePatch {
                bar_spacing: Some(10.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let options = config.chart_options_with(ChartKind::Volume, &custom);

        assert_eq!(options.height, 500);
        assert_eq!(options.width, 1000);
        assert_eq!(options.time_scale.bar_spacing, 10.0);
        assert!(!options.time_scale.time_visible);
    }

    #[test]
    fn test_unified_time_scale() {
        let config = Config::default();
        let unified = config.unified_time_scale(&TimeScalePatch::default());
        assert_eq!(unified.bar_spacing, Some(6.0));
        assert_eq!(unified.right_offset, Some(12.0));
        assert_eq!(unified.fix_left_edge, Some(false));
        assert_eq!(unified.fix_right_edge, Some(false));
        assert_eq!(unified.lock_visible_time_range_on_resize, Some(false));

        let custom = config.unified_time_scale(&TimeScalePatch {
            bar_spacing: Some(8.0),
            ..Default::default()
        });
        assert_eq!(custom.bar_spacing, Some(8.0));
        assert_eq!(custom.right_offset, Some(12.0));
    }

    #[test]
    fn test_validate() {
        let config = Config::default();
        assert!(config.chart_options(ChartKind::Main).validate().is_ok());

        let mut broken = config.chart_options(ChartKind::Main);
        broken.time_scale.bar_spacing = f64::NAN;
        assert!(broken.validate().is_err());

        let mut zero = config.chart_options(ChartKind::Volume);
        zero.width = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_spacing_patch_skips_labels() {
        let options = TimeScaleOptions {
            bar_spacing: 9.0,
            time_visible: false,
            ..Default::default()
        };
        let patch = options.spacing_patch();
        assert_eq!(patch.bar_spacing, Some(9.0));
        assert_eq!(patch.right_offset, Some(12.0));
        assert_eq!(patch.time_visible, None);
        assert!(!patch.is_empty());
        assert!(TimeScalePatch::default().is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[charts.defaults]
width = 800

[charts.presets.volume]
height = 200

[sync]
retry_max_attempts = 3

[normalization]
threshold = 0.5
auto_enable = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.charts.defaults.width, 800);
        assert_eq!(config.chart_options(ChartKind::Volume).height, 200);
        assert_eq!(config.chart_options(ChartKind::Volume).width, 800);
        assert_eq!(config.sync.retry_max_attempts, 3);
        assert_eq!(config.sync.retry_delay_ms, 100);
        assert_eq!(config.normalization.threshold, 0.5);
        assert!(!config.normalization.auto_enable);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("charter-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.sync.retry_delay_ms = 250;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sync.retry_delay_ms, 250);
        assert_eq!(loaded.chart_options(ChartKind::Main).height, 400);
        let _ = fs::remove_file(&path);
    }
}
