//! Composable risk signals
//!
//! Five engines applied after the ensemble score, in strict order:
//! trust discount, graph blend, cumulative risk buffer, dynamic thresholds
//! and the observational drift monitor. Each reads/writes the rolling
//! store, transforms the score or the thresholds, and returns a details
//! payload for the persisted explanation.

pub mod buffer;
pub mod drift;
pub mod graph;
pub mod thresholds;
pub mod trust;

pub use buffer::{BufferDetails, BufferOverride, BufferSample, BufferState, BufferUpdate, RiskBufferEngine};
pub use drift::{DriftMonitor, DriftReport, DriftStatus};
pub use graph::{GraphDetails, GraphEngine, RecipientProfile};
pub use thresholds::{compute_dynamic_thresholds, ThresholdAdjustments, ThresholdDetails};
pub use trust::{TrustDetails, TrustEngine};
