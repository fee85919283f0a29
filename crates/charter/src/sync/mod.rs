//! Viewport synchronization across charts.
//!
//! The [`SyncCoordinator`] copies the primary chart's viewport to every
//! secondary; [`repair`] holds the corrective and diagnostic routines used
//! when a viewport is scrolled before the first bar or has drifted.

pub mod coordinator;
pub mod repair;

pub use coordinator::{ChartRegistration, SyncCoordinator};
pub use repair::{AlignmentReport, AlignmentResult, RepairOutcome, StepOutcome};
