//! Lifecycle events pushed to subscribed clients
//!
//! Every significant transaction state change is published on the event bus
//! and serialized to clients as `{"type": <kind>, "tx_id": ..., "amount":
//! ..., ...}`. Amounts on the wire are rupees (JSON numbers); the ledger
//! keeps paise.

use serde::{Deserialize, Serialize};

use crate::models::transaction::{Action, DbStatus};

/// A lifecycle event delivered to per-user subscriber sessions.
///
/// Ordering within one session is preserved; delivery is best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxEvent {
    /// A transaction was created (any action)
    TransactionCreated {
        tx_id: String,
        amount: f64,
        action: Action,
        db_status: DbStatus,
        risk_score: f64,
        recipient_vpa: String,
    },

    /// The sender confirmed a delayed transaction
    TransactionConfirmed { tx_id: String, amount: f64 },

    /// The sender cancelled a delayed transaction
    TransactionCancelled {
        tx_id: String,
        amount: f64,
        /// Whether a REFUND was emitted (funds had been deducted)
        refunded: bool,
    },

    /// A pending transaction aged out and was refunded by the sweeper
    TransactionAutoRefunded {
        tx_id: String,
        amount: f64,
        refunded: bool,
    },

    /// Money arrived (sent to the receiving user)
    TransactionReceived {
        tx_id: String,
        amount: f64,
        sender_id: String,
    },

    /// A user's balance changed
    BalanceUpdated {
        tx_id: String,
        /// Signed delta in rupees
        amount: f64,
        /// New balance in rupees
        balance: f64,
    },
}

impl TxEvent {
    /// Stable event kind, as it appears in the `type` field on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            TxEvent::TransactionCreated { .. } => "transaction_created",
            TxEvent::TransactionConfirmed { .. } => "transaction_confirmed",
            TxEvent::TransactionCancelled { .. } => "transaction_cancelled",
            TxEvent::TransactionAutoRefunded { .. } => "transaction_auto_refunded",
            TxEvent::TransactionReceived { .. } => "transaction_received",
            TxEvent::BalanceUpdated { .. } => "balance_updated",
        }
    }

    pub fn tx_id(&self) -> &str {
        match self {
            TxEvent::TransactionCreated { tx_id, .. }
            | TxEvent::TransactionConfirmed { tx_id, .. }
            | TxEvent::TransactionCancelled { tx_id, .. }
            | TxEvent::TransactionAutoRefunded { tx_id, .. }
            | TxEvent::TransactionReceived { tx_id, .. }
            | TxEvent::BalanceUpdated { tx_id, .. } => tx_id,
        }
    }
}
