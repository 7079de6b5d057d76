//! Pattern mapping and reason generation
//!
//! Deterministic, explainable classification of features and model scores
//! into named fraud patterns, plus the human-readable reasons attached to
//! every decision. All thresholds are explicit and documented.

pub mod mapper;
pub mod reasons;

pub use mapper::{DetectedPattern, PatternMapper, PatternResult, PatternSummary};
pub use reasons::{merge_reasons, scorer_reasons, signal_reasons};
