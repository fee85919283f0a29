//! Indicator framework for chart overlays and oscillators.

pub mod bollinger;
pub mod indicator;
pub mod kind;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod squeeze;
pub mod supertrend;

pub use bollinger::{Bollinger, BollingerConfig, BollingerOutput};
pub use indicator::{Indicator, IndicatorOutput, PriceSource};
pub use kind::IndicatorKind;
pub use macd::{Macd, MacdConfig, MacdOutput};
pub use moving_average::{calculate_ema, calculate_sma, MovingAverage, MovingAverageConfig};
pub use rsi::{calculate_rsi, Rsi, RsiConfig};
pub use squeeze::{SqueezeConfig, SqueezeMomentum, SqueezeOutput, SqueezeState};
pub use supertrend::{SuperTrend, SuperTrendConfig, SuperTrendOutput, Trend};
