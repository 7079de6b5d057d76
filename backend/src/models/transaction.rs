//! Transaction model
//!
//! Represents an instant payment from a sender to a recipient VPA.
//! Each transaction carries:
//! - A 12-digit id (`YYMMDD` + 6-digit daily sequence)
//! - Sender, optional resolved receiver, device and channel
//! - Amount (i64 paise)
//! - The gate decision (risk score, action) and persistence status
//! - The explainability snapshot frozen at scoring time
//!
//! CRITICAL: All money values are i64 (paise)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gate decision for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Delay,
    Block,
}

/// Persistence status of a transaction
///
/// `Pending` is the only non-terminal state; every other state is sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Success,
    Pending,
    Blocked,
    Cancelled,
    Confirmed,
    #[serde(rename = "auto-refunded")]
    AutoRefunded,
}

impl DbStatus {
    /// Whether further user decisions must be rejected
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DbStatus::Pending)
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    #[serde(rename = "P2P")]
    P2p,
    #[serde(rename = "P2M")]
    P2m,
}

/// Origination channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    App,
    Qr,
    Web,
}

/// Errors raised by transaction state transitions
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Transaction is in terminal state {0:?}")]
    TerminalState(DbStatus),

    #[error("Amount must be positive")]
    InvalidAmount,
}

/// A raw transaction as submitted for scoring, before an id is allocated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender_id: String,
    pub device_id: String,
    /// Event time; the reference instant for all temporal features
    pub ts: DateTime<Utc>,
    /// Amount in paise (must be > 0)
    pub amount: i64,
    pub recipient_vpa: String,
    pub tx_type: TxType,
    pub channel: Channel,
}

impl TransactionRequest {
    /// Amount in rupees, the unit of the feature space
    pub fn amount_rupees(&self) -> f64 {
        self.amount as f64 / 100.0
    }

    /// Local part of the recipient VPA (before '@')
    pub fn vpa_local_part(&self) -> &str {
        self.recipient_vpa
            .split('@')
            .next()
            .unwrap_or(&self.recipient_vpa)
    }
}

/// A persisted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// 12-digit id: YYMMDD + 6-digit daily sequence
    pub tx_id: String,
    pub sender_id: String,
    /// Set iff the recipient VPA resolved to a known user at insert time
    pub receiver_id: Option<String>,
    pub device_id: String,
    pub ts: DateTime<Utc>,
    /// Amount in paise
    pub amount: i64,
    pub recipient_vpa: String,
    pub tx_type: TxType,
    pub channel: Channel,
    pub risk_score: f64,
    pub action: Action,
    pub db_status: DbStatus,
    /// Structured explanation frozen at scoring time
    pub explainability: serde_json::Value,
    /// Set the first time the sender is debited
    pub amount_deducted_at: Option<DateTime<Utc>>,
    /// Set when (and only when) the receiver is credited
    pub amount_credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Amount in rupees
    pub fn amount_rupees(&self) -> f64 {
        self.amount as f64 / 100.0
    }

    pub fn is_pending(&self) -> bool {
        self.db_status == DbStatus::Pending
    }

    /// Guard a user decision (confirm/cancel): only pending transactions
    /// may transition.
    pub fn ensure_pending(&self) -> Result<(), TransactionError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TransactionError::TerminalState(self.db_status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization_matches_schema() {
        assert_eq!(
            serde_json::to_string(&DbStatus::AutoRefunded).unwrap(),
            "\"auto-refunded\""
        );
        assert_eq!(serde_json::to_string(&DbStatus::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::to_string(&Action::Block).unwrap(), "\"BLOCK\"");
        assert_eq!(serde_json::to_string(&TxType::P2m).unwrap(), "\"P2M\"");
        assert_eq!(serde_json::to_string(&Channel::Qr).unwrap(), "\"qr\"");
    }

    #[test]
    fn test_pending_is_the_only_non_terminal_state() {
        assert!(!DbStatus::Pending.is_terminal());
        for status in [
            DbStatus::Success,
            DbStatus::Blocked,
            DbStatus::Cancelled,
            DbStatus::Confirmed,
            DbStatus::AutoRefunded,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_vpa_local_part() {
        let req = TransactionRequest {
            sender_id: "u1".into(),
            device_id: "d1".into(),
            ts: Utc::now(),
            amount: 20_000,
            recipient_vpa: "alice@upi".into(),
            tx_type: TxType::P2p,
            channel: Channel::App,
        };
        assert_eq!(req.vpa_local_part(), "alice");
        assert!((req.amount_rupees() - 200.0).abs() < 1e-9);
    }
}
