//! Persistent state authority
//!
//! In-process store of users, transactions, the append-only ledger, fraud
//! alerts, admin logs and per-(user, date) daily aggregates. The lifecycle
//! engine wraps it in a single lock; every multi-row mutation (insert +
//! ledger + balance + aggregate) commits under one guard, which is what
//! makes the ledger-pairing semantics atomic.
//!
//! The database is policy-free: demo-mode vs. strict balance handling is
//! decided by the caller, which applies balance effects through `user_mut`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ledger::{AdminLog, DailyStats, FraudAlert, LedgerEntry, LedgerOp, UserDecision};
use crate::models::transaction::TransactionRecord;
use crate::models::user::User;

/// Errors from database mutations
#[derive(Debug, Error, PartialEq)]
pub enum DatabaseError {
    #[error("Transaction id already exists: {0}")]
    DuplicateTransaction(String),

    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("Phone already registered: {0}")]
    DuplicatePhone(String),
}

/// In-process table store.
#[derive(Debug, Default)]
pub struct Database {
    users: HashMap<String, User>,
    /// phone -> user_id
    phone_index: HashMap<String, String>,
    /// Ordered by tx_id, which sorts by date + daily sequence
    transactions: BTreeMap<String, TransactionRecord>,
    ledger: Vec<LedgerEntry>,
    next_entry_id: u64,
    alerts: Vec<FraudAlert>,
    admin_logs: Vec<AdminLog>,
    daily: HashMap<(String, NaiveDate), DailyStats>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- users ----

    /// Register a user. Fails on duplicate id or phone.
    pub fn create_user(
        &mut self,
        user_id: &str,
        phone: &str,
        balance: i64,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        if self.users.contains_key(user_id) {
            return Err(DatabaseError::DuplicateUser(user_id.to_string()));
        }
        if self.phone_index.contains_key(phone) {
            return Err(DatabaseError::DuplicatePhone(phone.to_string()));
        }
        self.users.insert(
            user_id.to_string(),
            User::new(user_id.to_string(), phone.to_string(), balance, now),
        );
        self.phone_index
            .insert(phone.to_string(), user_id.to_string());
        Ok(())
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn user_mut(&mut self, user_id: &str) -> Option<&mut User> {
        self.users.get_mut(user_id)
    }

    /// Resolve a VPA local part to an active user: either their phone or
    /// their user id. Resolution happens once at insert time.
    pub fn resolve_vpa_local(&self, local: &str) -> Option<&User> {
        let by_phone = self
            .phone_index
            .get(local)
            .and_then(|id| self.users.get(id));
        by_phone
            .or_else(|| self.users.get(local))
            .filter(|u| u.is_active())
    }

    // ---- transactions ----

    /// Highest daily sequence already used for a `YYMMDD` prefix.
    pub fn max_sequence_for_prefix(&self, prefix: &str) -> u32 {
        // BTreeMap range over the prefix: ids are "<prefix><6 digits>"
        let start = format!("{prefix}000000");
        let end = format!("{prefix}999999");
        self.transactions
            .range(start..=end)
            .filter_map(|(id, _)| id[6..].parse::<u32>().ok())
            .max()
            .unwrap_or(0)
    }

    /// Insert a transaction; primary-key uniqueness enforced here.
    pub fn insert_transaction(&mut self, record: TransactionRecord) -> Result<(), DatabaseError> {
        if self.transactions.contains_key(&record.tx_id) {
            return Err(DatabaseError::DuplicateTransaction(record.tx_id));
        }
        self.transactions.insert(record.tx_id.clone(), record);
        Ok(())
    }

    pub fn transaction(&self, tx_id: &str) -> Option<&TransactionRecord> {
        self.transactions.get(tx_id)
    }

    pub fn transaction_mut(&mut self, tx_id: &str) -> Option<&mut TransactionRecord> {
        self.transactions.get_mut(tx_id)
    }

    pub fn transactions_for_sender(&self, sender_id: &str) -> Vec<&TransactionRecord> {
        self.transactions
            .values()
            .filter(|t| t.sender_id == sender_id)
            .collect()
    }

    /// Ids of pending transactions created at or before `cutoff`.
    pub fn pending_created_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.transactions
            .values()
            .filter(|t| t.is_pending() && t.created_at <= cutoff)
            .map(|t| t.tx_id.clone())
            .collect()
    }

    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    // ---- ledger ----

    /// Append one ledger row. Append-only: there is no update or delete.
    pub fn append_ledger(
        &mut self,
        tx_id: &str,
        operation: LedgerOp,
        user_id: &str,
        amount: i64,
        ts: DateTime<Utc>,
        remark: &str,
    ) -> &LedgerEntry {
        let entry = LedgerEntry {
            entry_id: self.next_entry_id,
            tx_id: tx_id.to_string(),
            operation,
            user_id: user_id.to_string(),
            amount,
            ts,
            remark: remark.to_string(),
        };
        self.next_entry_id += 1;
        self.ledger.push(entry);
        self.ledger.last().expect("just pushed")
    }

    pub fn ledger_for(&self, tx_id: &str) -> Vec<&LedgerEntry> {
        self.ledger.iter().filter(|e| e.tx_id == tx_id).collect()
    }

    pub fn ledger_for_user(&self, user_id: &str) -> Vec<&LedgerEntry> {
        self.ledger.iter().filter(|e| e.user_id == user_id).collect()
    }

    // ---- fraud alerts ----

    pub fn push_alert(&mut self, alert: FraudAlert) {
        self.alerts.push(alert);
    }

    /// The open alert for a transaction, if any.
    pub fn open_alert_mut(&mut self, tx_id: &str) -> Option<&mut FraudAlert> {
        self.alerts
            .iter_mut()
            .find(|a| a.tx_id == tx_id && a.is_open())
    }

    /// Resolve a transaction's open alert with the user's decision
    /// (None for the auto-refund path).
    pub fn resolve_alert(
        &mut self,
        tx_id: &str,
        decision: Option<UserDecision>,
        resolved_at: DateTime<Utc>,
    ) {
        if let Some(alert) = self.open_alert_mut(tx_id) {
            alert.user_decision = decision;
            alert.resolved_at = Some(resolved_at);
        }
    }

    pub fn alerts_for(&self, tx_id: &str) -> Vec<&FraudAlert> {
        self.alerts.iter().filter(|a| a.tx_id == tx_id).collect()
    }

    pub fn alerts_for_user(&self, user_id: &str) -> Vec<&FraudAlert> {
        self.alerts.iter().filter(|a| a.user_id == user_id).collect()
    }

    // ---- admin logs ----

    pub fn push_admin_log(
        &mut self,
        tx_id: &str,
        user_id: &str,
        action: &str,
        admin_username: &str,
        source_ip: &str,
        now: DateTime<Utc>,
    ) {
        self.admin_logs.push(AdminLog {
            log_id: Uuid::new_v4(),
            tx_id: tx_id.to_string(),
            user_id: user_id.to_string(),
            action: action.to_string(),
            admin_username: admin_username.to_string(),
            source_ip: source_ip.to_string(),
            created_at: now,
        });
    }

    pub fn admin_logs_for(&self, tx_id: &str) -> Vec<&AdminLog> {
        self.admin_logs.iter().filter(|l| l.tx_id == tx_id).collect()
    }

    // ---- daily aggregates ----

    /// Fold one transaction into the sender's daily aggregate.
    pub fn bump_daily(&mut self, user_id: &str, date: NaiveDate, amount: i64) {
        let stats = self
            .daily
            .entry((user_id.to_string(), date))
            .or_insert_with(|| DailyStats {
                user_id: user_id.to_string(),
                date,
                total_amount: 0,
                transaction_count: 0,
            });
        stats.total_amount += amount;
        stats.transaction_count += 1;
    }

    pub fn daily_stats(&self, user_id: &str, date: NaiveDate) -> Option<&DailyStats> {
        self.daily.get(&(user_id.to_string(), date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap()
    }

    fn db_with_users() -> Database {
        let mut db = Database::new();
        db.create_user("u1", "9876543210", 1_000_000, now()).unwrap();
        db.create_user("u2", "9123456780", 500_000, now()).unwrap();
        db
    }

    #[test]
    fn test_phone_uniqueness() {
        let mut db = db_with_users();
        assert_eq!(
            db.create_user("u3", "9876543210", 0, now()).unwrap_err(),
            DatabaseError::DuplicatePhone("9876543210".to_string())
        );
    }

    #[test]
    fn test_vpa_resolution_by_phone_and_id() {
        let mut db = db_with_users();
        assert_eq!(db.resolve_vpa_local("9876543210").unwrap().user_id(), "u1");
        assert_eq!(db.resolve_vpa_local("u2").unwrap().user_id(), "u2");
        assert!(db.resolve_vpa_local("stranger").is_none());

        db.user_mut("u1").unwrap().deactivate();
        assert!(db.resolve_vpa_local("9876543210").is_none());
    }

    #[test]
    fn test_max_sequence_scans_only_the_prefix() {
        let mut db = db_with_users();
        for (id, seq) in [("260214", 3u32), ("260213", 9)] {
            for s in 1..=seq {
                let record = sample_record(&format!("{id}{s:06}"));
                db.insert_transaction(record).unwrap();
            }
        }
        assert_eq!(db.max_sequence_for_prefix("260214"), 3);
        assert_eq!(db.max_sequence_for_prefix("260213"), 9);
        assert_eq!(db.max_sequence_for_prefix("260215"), 0);
    }

    #[test]
    fn test_duplicate_transaction_is_a_conflict() {
        let mut db = db_with_users();
        db.insert_transaction(sample_record("260214000001")).unwrap();
        assert_eq!(
            db.insert_transaction(sample_record("260214000001"))
                .unwrap_err(),
            DatabaseError::DuplicateTransaction("260214000001".to_string())
        );
    }

    #[test]
    fn test_ledger_entry_ids_are_monotonic() {
        let mut db = db_with_users();
        let first = db
            .append_ledger("260214000001", LedgerOp::Debit, "u1", 100, now(), "debit")
            .entry_id;
        let second = db
            .append_ledger("260214000001", LedgerOp::Credit, "u2", 100, now(), "credit")
            .entry_id;
        assert_eq!(second, first + 1);
        assert_eq!(db.ledger_for("260214000001").len(), 2);
    }

    #[test]
    fn test_daily_aggregate_upserts() {
        let mut db = db_with_users();
        let date = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        db.bump_daily("u1", date, 20_000);
        db.bump_daily("u1", date, 30_000);
        let stats = db.daily_stats("u1", date).unwrap();
        assert_eq!(stats.total_amount, 50_000);
        assert_eq!(stats.transaction_count, 2);
    }

    fn sample_record(tx_id: &str) -> TransactionRecord {
        use crate::models::transaction::{Action, Channel, DbStatus, TxType};
        TransactionRecord {
            tx_id: tx_id.to_string(),
            sender_id: "u1".into(),
            receiver_id: Some("u2".into()),
            device_id: "d1".into(),
            ts: now(),
            amount: 20_000,
            recipient_vpa: "9123456780@upi".into(),
            tx_type: TxType::P2p,
            channel: Channel::App,
            risk_score: 0.1,
            action: Action::Allow,
            db_status: DbStatus::Success,
            explainability: serde_json::Value::Null,
            amount_deducted_at: Some(now()),
            amount_credited_at: Some(now()),
            created_at: now(),
            updated_at: now(),
        }
    }
}
