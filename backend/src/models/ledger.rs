//! Ledger, fraud alerts, admin logs and daily aggregates
//!
//! The ledger is append-only: every monetary movement tied to a transaction
//! becomes one more entry, never an update. Pairing rules:
//! - every DEBIT has at most one CREDIT (receiver known, allowed/confirmed)
//!   and at most one REFUND, never both;
//! - BLOCK produces neither.
//!
//! CRITICAL: All money values are i64 (paise)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monetary operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerOp {
    Debit,
    Credit,
    Refund,
}

/// One append-only ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonically increasing entry id
    pub entry_id: u64,
    pub tx_id: String,
    pub operation: LedgerOp,
    pub user_id: String,
    /// Amount in paise
    pub amount: i64,
    pub ts: DateTime<Utc>,
    pub remark: String,
}

/// Why an alert was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    Delay,
    Block,
}

/// The sender's resolution of a delayed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserDecision {
    Confirm,
    Cancel,
}

/// A fraud alert raised for a delayed or blocked transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    pub alert_id: Uuid,
    pub tx_id: String,
    pub user_id: String,
    pub kind: AlertKind,
    pub risk_score: f64,
    pub reason: String,
    pub user_decision: Option<UserDecision>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FraudAlert {
    pub fn new(
        tx_id: String,
        user_id: String,
        kind: AlertKind,
        risk_score: f64,
        reason: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            tx_id,
            user_id,
            kind,
            risk_score,
            reason,
            user_decision: None,
            resolved_at: None,
            created_at,
        }
    }

    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Audit record of an administrative action on a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLog {
    pub log_id: Uuid,
    pub tx_id: String,
    pub user_id: String,
    pub action: String,
    pub admin_username: String,
    pub source_ip: String,
    pub created_at: DateTime<Utc>,
}

/// Per-sender, per-local-date transaction aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub user_id: String,
    pub date: chrono::NaiveDate,
    /// Total amount in paise
    pub total_amount: i64,
    pub transaction_count: u32,
}
