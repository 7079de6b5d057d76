//! Transaction lifecycle
//!
//! Id allocation, persistence, the state machine (submit, confirm, cancel,
//! admin unblock), the ledger, daily aggregation and the auto-refund
//! sweeper.

pub mod database;
pub mod engine;
pub mod scheduler;
pub mod txid;

pub use database::Database;
pub use engine::{LifecycleError, SubmitRequest, TransactionLifecycle};
pub use scheduler::spawn_auto_refund_task;
pub use txid::{format_tx_id, is_valid_tx_id, parse_tx_id, ParsedTxId, TxIdError};
