//! Domain models
//!
//! Strongly typed records for users, transactions, ledger entries, fraud
//! alerts, admin logs, lifecycle events and the feature vector.

pub mod event;
pub mod features;
pub mod ledger;
pub mod transaction;
pub mod user;

pub use event::TxEvent;
pub use features::{FeatureVector, FEATURE_NAMES};
pub use ledger::{AdminLog, AlertKind, DailyStats, FraudAlert, LedgerEntry, LedgerOp, UserDecision};
pub use transaction::{
    Action, Channel, DbStatus, TransactionRecord, TransactionRequest, TxType,
};
pub use user::{User, UserError};
