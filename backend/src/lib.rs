//! Fraud Detection Core - Rust Engine
//!
//! Real-time fraud-detection pipeline for instant (UPI-style) payments.
//!
//! # Architecture
//!
//! - **core**: Clock abstraction and regional time helpers
//! - **store**: Rolling per-key state (velocity, trust, graph, buffer, drift)
//! - **models**: Domain types (User, Transaction, Ledger, Alerts, Events, Features)
//! - **features**: Feature extraction from raw transactions
//! - **scoring**: Ensemble model scoring with rule-based fallback
//! - **signals**: Trust, graph, risk-buffer, dynamic-threshold and drift engines
//! - **patterns**: Deterministic pattern mapping and reason generation
//! - **decision**: The composed scoring pipeline (risk, action, explainability)
//! - **lifecycle**: Transaction ids, persistence, state machine, auto-refund sweep
//! - **events**: In-process fan-out of lifecycle events to subscribers
//!
//! # Critical Invariants
//!
//! 1. All ledger and balance values are i64 (paise); feature space is f64 rupees
//! 2. A rejected transaction never teaches the recipient set (ALLOW/confirm only)
//! 3. Rolling-store outages degrade to documented defaults, never to errors
//! 4. Terminal transaction states are sticky

// Module declarations
pub mod config;
pub mod core;
pub mod decision;
pub mod events;
pub mod features;
pub mod lifecycle;
pub mod models;
pub mod patterns;
pub mod scoring;
pub mod signals;
pub mod store;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use core::time::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, DecisionEngine, Explainability};
pub use events::EventBus;
pub use features::{ExtractedFeatures, FeatureExtractor};
pub use lifecycle::{
    database::Database,
    engine::{LifecycleError, SubmitRequest, TransactionLifecycle},
};
pub use models::{
    features::FeatureVector,
    transaction::{Action, Channel, DbStatus, TransactionRecord, TxType},
    user::User,
};
pub use scoring::{ConfidenceLevel, EnsembleScorer, ModelScores, Predictor};
pub use store::{MemoryStore, OfflineStore, RollingStore};
