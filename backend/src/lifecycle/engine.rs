//! Transaction lifecycle engine
//!
//! Drives a transaction from submission through its terminal state:
//!
//! - submit: score, allocate an id, persist, write ledger rows, raise
//!   alerts, update behavioural state, publish events
//! - confirm / cancel: the sender's resolution of a delayed transaction
//! - admin unblock: dispute-resolution flag on a blocked transaction
//! - auto-refund sweep: ages out pending transactions
//!
//! All multi-row mutations commit under one database guard, so a ledger
//! row can never exist without its transaction (and vice versa). The
//! decision pipeline runs before the guard is taken: the per-user lock is
//! never held across scoring.
//!
//! Balance handling defaults to the documented ledger-only behaviour:
//! DEBIT and REFUND rows do not move balances, CREDIT rows do. The
//! `strict_balance` flag makes all three move balances.

use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::core::time::{days_between, to_regional, Clock};
use crate::decision::DecisionEngine;
use crate::events::EventBus;
use crate::lifecycle::database::{Database, DatabaseError};
use crate::lifecycle::txid::{date_prefix, format_tx_id, MAX_DAILY_SEQUENCE};
use crate::models::event::TxEvent;
use crate::models::ledger::{AlertKind, FraudAlert, LedgerOp, UserDecision};
use crate::models::transaction::{
    Action, Channel, DbStatus, TransactionRecord, TransactionRequest, TxType,
};

/// User-visible lifecycle failures, with stable kind tags
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A user-submitted transaction before scoring
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub sender_id: String,
    pub device_id: String,
    /// Amount in paise (must be > 0)
    pub amount: i64,
    pub recipient_vpa: String,
    pub tx_type: TxType,
    pub channel: Channel,
    /// Event time; defaults to the engine clock
    pub ts: Option<DateTime<Utc>>,
}

/// Result of one auto-refund sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepResult {
    /// Pending transactions past the window that were examined
    pub examined: usize,
    /// Transactions transitioned to auto-refunded
    pub refunded: usize,
}

/// The lifecycle engine: persistence, state machine, events.
pub struct TransactionLifecycle {
    db: RwLock<Database>,
    decision: DecisionEngine,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for TransactionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLifecycle").finish_non_exhaustive()
    }
}

impl TransactionLifecycle {
    pub fn new(
        db: Database,
        decision: DecisionEngine,
        clock: Arc<dyn Clock>,
        bus: Arc<EventBus>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            db: RwLock::new(db),
            decision,
            clock,
            bus,
            config,
        }
    }

    /// Read access to the persistent state (queries, tests, dashboards).
    pub fn database(&self) -> RwLockReadGuard<'_, Database> {
        self.db.read().expect("database lock poisoned")
    }

    /// The composed decision pipeline (drift reports, buffer maintenance).
    pub fn decision_engine(&self) -> &DecisionEngine {
        &self.decision
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The configured sweep interval, for the scheduler task.
    pub fn sweep_interval(&self) -> std::time::Duration {
        self.config.lifecycle.sweep_interval
    }

    /// Register a user with the default opening balance.
    pub fn create_user(&self, user_id: &str, phone: &str) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let balance = self.config.lifecycle.default_opening_balance;
        self.db
            .write()
            .expect("database lock poisoned")
            .create_user(user_id, phone, balance, now)
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))
    }

    /// Submit a transaction: score it, persist it and apply its decision.
    pub fn submit(&self, req: SubmitRequest) -> Result<TransactionRecord, LifecycleError> {
        if req.amount <= 0 {
            return Err(LifecycleError::InvalidInput(
                "amount must be positive".to_string(),
            ));
        }
        let local = req
            .recipient_vpa
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string();
        if local.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "malformed recipient VPA".to_string(),
            ));
        }

        let now = self.clock.now();
        let ts = req.ts.unwrap_or(now);

        // Sender checks + account age under a read guard
        let account_age_days = {
            let db = self.database();
            let sender = db.user(&req.sender_id).ok_or_else(|| {
                LifecycleError::InvalidInput(format!("unknown sender: {}", req.sender_id))
            })?;
            if !sender.is_active() {
                return Err(LifecycleError::InvalidInput(
                    "sender account is inactive".to_string(),
                ));
            }
            days_between(sender.created_at(), now)
        };

        let tx_request = TransactionRequest {
            sender_id: req.sender_id.clone(),
            device_id: req.device_id.clone(),
            ts,
            amount: req.amount,
            recipient_vpa: req.recipient_vpa.clone(),
            tx_type: req.tx_type,
            channel: req.channel,
        };

        // Score outside any database guard
        let decision = self.decision.decide(&tx_request, account_age_days);

        let explainability = serde_json::to_value(&decision.explainability)
            .map_err(|e| LifecycleError::Internal(format!("explainability encoding: {e}")))?;

        let mut events: Vec<(String, TxEvent)> = Vec::new();
        let record = {
            let mut db = self.db.write().expect("database lock poisoned");

            let receiver_id = db.resolve_vpa_local(&local).map(|u| u.user_id().to_string());

            // Strict mode refuses unpayable debits before any row is written
            let will_debit = decision.action != Action::Block;
            if self.config.lifecycle.strict_balance && will_debit {
                let sender = db.user(&req.sender_id).expect("sender checked above");
                if !sender.can_pay(req.amount) {
                    return Err(LifecycleError::InvalidInput(format!(
                        "insufficient balance: {} < {}",
                        sender.balance(),
                        req.amount
                    )));
                }
            }

            let db_status = match decision.action {
                Action::Allow => DbStatus::Success,
                Action::Delay => DbStatus::Pending,
                Action::Block => DbStatus::Blocked,
            };

            // Allocate the id and insert; retried on collision
            let prefix = date_prefix(now.date_naive());
            let mut record = None;
            for attempt in 0..self.config.lifecycle.tx_id_insert_retries {
                let mut sequence = db.max_sequence_for_prefix(&prefix) + 1;
                if sequence > MAX_DAILY_SEQUENCE {
                    sequence = 1;
                }
                let tx_id = format_tx_id(now.date_naive(), sequence);

                let candidate = TransactionRecord {
                    tx_id: tx_id.clone(),
                    sender_id: req.sender_id.clone(),
                    receiver_id: receiver_id.clone(),
                    device_id: req.device_id.clone(),
                    ts,
                    amount: req.amount,
                    recipient_vpa: req.recipient_vpa.clone(),
                    tx_type: req.tx_type,
                    channel: req.channel,
                    risk_score: decision.risk_score,
                    action: decision.action,
                    db_status,
                    explainability: explainability.clone(),
                    amount_deducted_at: None,
                    amount_credited_at: None,
                    created_at: now,
                    updated_at: now,
                };

                match db.insert_transaction(candidate.clone()) {
                    Ok(()) => {
                        record = Some(candidate);
                        break;
                    }
                    Err(DatabaseError::DuplicateTransaction(id)) => {
                        warn!(tx_id = %id, attempt, "transaction id collision; retrying");
                        continue;
                    }
                    Err(other) => return Err(LifecycleError::Internal(other.to_string())),
                }
            }
            let mut record = record.ok_or_else(|| {
                LifecycleError::Conflict("transaction id allocation exhausted retries".to_string())
            })?;

            // Ledger + balances per action
            match decision.action {
                Action::Allow => {
                    self.apply_debit(&mut db, &mut record, now, "payment debit", &mut events);
                    if record.receiver_id.is_some() {
                        self.apply_credit(&mut db, &mut record, now, "payment credit", &mut events);
                    }
                }
                Action::Delay => {
                    // Funds leave immediately; a cancel or the sweeper refunds them
                    self.apply_debit(&mut db, &mut record, now, "pending debit", &mut events);
                }
                Action::Block => {}
            }

            if decision.action != Action::Allow {
                let kind = if decision.action == Action::Block {
                    AlertKind::Block
                } else {
                    AlertKind::Delay
                };
                db.push_alert(FraudAlert::new(
                    record.tx_id.clone(),
                    record.sender_id.clone(),
                    kind,
                    decision.risk_score,
                    decision.explainability.reasons.join("; "),
                    now,
                ));
            }

            db.bump_daily(
                &record.sender_id,
                to_regional(ts).date_naive(),
                record.amount,
            );

            *db.transaction_mut(&record.tx_id).expect("just inserted") = record.clone();
            record
        };

        // Behavioural state, best-effort, after the guard is released
        match record.action {
            Action::Allow => self.decision.record_allowed(&tx_request),
            Action::Delay => self.decision.record_edge(&tx_request),
            Action::Block => {
                self.decision.record_edge(&tx_request);
                self.decision.record_fraud(&tx_request);
            }
        }

        events.insert(
            0,
            (
                record.sender_id.clone(),
                TxEvent::TransactionCreated {
                    tx_id: record.tx_id.clone(),
                    amount: record.amount_rupees(),
                    action: record.action,
                    db_status: record.db_status,
                    risk_score: record.risk_score,
                    recipient_vpa: record.recipient_vpa.clone(),
                },
            ),
        );
        if record.action == Action::Allow {
            if let Some(receiver_id) = &record.receiver_id {
                events.push((
                    receiver_id.clone(),
                    TxEvent::TransactionReceived {
                        tx_id: record.tx_id.clone(),
                        amount: record.amount_rupees(),
                        sender_id: record.sender_id.clone(),
                    },
                ));
            }
        }
        self.publish_all(events);

        info!(
            tx_id = %record.tx_id,
            action = ?record.action,
            risk = record.risk_score,
            "transaction submitted"
        );
        Ok(record)
    }

    /// The sender confirms a delayed transaction.
    pub fn confirm(&self, tx_id: &str, user_id: &str) -> Result<TransactionRecord, LifecycleError> {
        let now = self.clock.now();
        let mut events = Vec::new();

        let (record, tx_request) = {
            let mut db = self.db.write().expect("database lock poisoned");
            let mut record = self.checked_user_decision(&db, tx_id, user_id)?;

            if self.config.lifecycle.strict_balance && record.amount_deducted_at.is_none() {
                let sender = db.user(&record.sender_id).expect("sender exists");
                if !sender.can_pay(record.amount) {
                    return Err(LifecycleError::InvalidInput(format!(
                        "insufficient balance: {} < {}",
                        sender.balance(),
                        record.amount
                    )));
                }
            }

            record.action = Action::Allow;
            record.db_status = DbStatus::Confirmed;
            record.updated_at = now;

            if record.amount_deducted_at.is_none() {
                self.apply_debit(&mut db, &mut record, now, "confirmed debit", &mut events);
            }
            if record.receiver_id.is_some() && record.amount_credited_at.is_none() {
                self.apply_credit(&mut db, &mut record, now, "confirmed credit", &mut events);
            }

            db.resolve_alert(tx_id, Some(UserDecision::Confirm), now);
            *db.transaction_mut(tx_id).expect("checked above") = record.clone();

            (record.clone(), request_from_record(&record))
        };

        self.decision.record_allowed(&tx_request);

        events.insert(
            0,
            (
                record.sender_id.clone(),
                TxEvent::TransactionConfirmed {
                    tx_id: record.tx_id.clone(),
                    amount: record.amount_rupees(),
                },
            ),
        );
        if let Some(receiver_id) = &record.receiver_id {
            events.push((
                receiver_id.clone(),
                TxEvent::TransactionReceived {
                    tx_id: record.tx_id.clone(),
                    amount: record.amount_rupees(),
                    sender_id: record.sender_id.clone(),
                },
            ));
        }
        self.publish_all(events);

        info!(tx_id, "transaction confirmed by sender");
        Ok(record)
    }

    /// The sender cancels a delayed transaction.
    pub fn cancel(&self, tx_id: &str, user_id: &str) -> Result<TransactionRecord, LifecycleError> {
        let now = self.clock.now();
        let mut events = Vec::new();

        let (record, tx_request, refunded) = {
            let mut db = self.db.write().expect("database lock poisoned");
            let mut record = self.checked_user_decision(&db, tx_id, user_id)?;

            record.action = Action::Block;
            record.db_status = DbStatus::Cancelled;
            record.updated_at = now;

            let refunded = record.amount_deducted_at.is_some();
            if refunded {
                self.apply_refund(&mut db, &mut record, now, "cancelled refund", &mut events);
            }

            db.resolve_alert(tx_id, Some(UserDecision::Cancel), now);
            *db.transaction_mut(tx_id).expect("checked above") = record.clone();

            (record.clone(), request_from_record(&record), refunded)
        };

        // A sender-cancelled delay counts as a fraud outcome on the edge
        self.decision.record_fraud(&tx_request);

        events.insert(
            0,
            (
                record.sender_id.clone(),
                TxEvent::TransactionCancelled {
                    tx_id: record.tx_id.clone(),
                    amount: record.amount_rupees(),
                    refunded,
                },
            ),
        );
        self.publish_all(events);

        info!(tx_id, refunded, "transaction cancelled by sender");
        Ok(record)
    }

    /// Admin override: flip a blocked transaction's action to ALLOW.
    ///
    /// A dispute-resolution flag, not a replay of the payment: no ledger
    /// entry and no balance change. Only `ALLOW` is accepted; the audit
    /// log records the admin, source address and time.
    pub fn admin_unblock(
        &self,
        tx_id: &str,
        requested_action: Action,
        admin_username: &str,
        source_ip: &str,
    ) -> Result<TransactionRecord, LifecycleError> {
        if requested_action != Action::Allow {
            return Err(LifecycleError::Unauthorized(
                "admin override accepts only ALLOW".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut db = self.db.write().expect("database lock poisoned");
        let mut record = db
            .transaction(tx_id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotFound(format!("transaction {tx_id}")))?;

        if record.action != Action::Block || record.db_status != DbStatus::Blocked {
            return Err(LifecycleError::InvalidInput(
                "only blocked transactions can be overridden".to_string(),
            ));
        }

        record.action = Action::Allow;
        record.updated_at = now;
        db.push_admin_log(
            tx_id,
            &record.sender_id,
            "unblock",
            admin_username,
            source_ip,
            now,
        );
        *db.transaction_mut(tx_id).expect("checked above") = record.clone();

        info!(tx_id, admin_username, source_ip, "admin unblocked transaction");
        Ok(record)
    }

    /// Transition pending transactions older than the refund window to
    /// auto-refunded. Idempotent per transaction; safe to run overlapping.
    pub fn sweep_auto_refunds(&self) -> SweepResult {
        let now = self.clock.now();
        let window = chrono::Duration::from_std(self.config.lifecycle.auto_refund_after)
            .expect("refund window fits");
        let cutoff = now - window;

        let mut result = SweepResult::default();
        let mut events = Vec::new();

        {
            let mut db = self.db.write().expect("database lock poisoned");
            let expired = db.pending_created_before(cutoff);
            result.examined = expired.len();

            for tx_id in expired {
                let Some(mut record) = db.transaction(&tx_id).cloned() else {
                    continue;
                };
                if !record.is_pending() {
                    continue;
                }

                record.action = Action::Block;
                record.db_status = DbStatus::AutoRefunded;
                record.updated_at = now;

                let refunded = record.amount_deducted_at.is_some();
                if refunded {
                    self.apply_refund(&mut db, &mut record, now, "auto refund", &mut events);
                }

                db.resolve_alert(&tx_id, None, now);
                *db.transaction_mut(&tx_id).expect("fetched above") = record.clone();

                events.push((
                    record.sender_id.clone(),
                    TxEvent::TransactionAutoRefunded {
                        tx_id: record.tx_id.clone(),
                        amount: record.amount_rupees(),
                        refunded,
                    },
                ));
                result.refunded += 1;
            }
        }

        self.publish_all(events);

        if result.refunded > 0 {
            info!(refunded = result.refunded, "auto-refund sweep completed");
        }
        result
    }

    // ---- internals ----

    /// Shared guard for confirm/cancel: the transaction exists, the caller
    /// is its sender, and it is still pending.
    fn checked_user_decision(
        &self,
        db: &Database,
        tx_id: &str,
        user_id: &str,
    ) -> Result<TransactionRecord, LifecycleError> {
        let record = db
            .transaction(tx_id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotFound(format!("transaction {tx_id}")))?;
        if record.sender_id != user_id {
            return Err(LifecycleError::Unauthorized(
                "only the sender may decide this transaction".to_string(),
            ));
        }
        record
            .ensure_pending()
            .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
        Ok(record)
    }

    fn apply_debit(
        &self,
        db: &mut Database,
        record: &mut TransactionRecord,
        now: DateTime<Utc>,
        remark: &str,
        events: &mut Vec<(String, TxEvent)>,
    ) {
        db.append_ledger(
            &record.tx_id,
            LedgerOp::Debit,
            &record.sender_id,
            record.amount,
            now,
            remark,
        );
        if self.config.lifecycle.strict_balance {
            let sender = db.user_mut(&record.sender_id).expect("sender exists");
            sender.debit(record.amount).expect("pre-checked balance");
        }
        record.amount_deducted_at = Some(now);

        let balance = db.user(&record.sender_id).expect("sender exists").balance();
        events.push((
            record.sender_id.clone(),
            TxEvent::BalanceUpdated {
                tx_id: record.tx_id.clone(),
                amount: -record.amount_rupees(),
                balance: balance as f64 / 100.0,
            },
        ));
    }

    fn apply_credit(
        &self,
        db: &mut Database,
        record: &mut TransactionRecord,
        now: DateTime<Utc>,
        remark: &str,
        events: &mut Vec<(String, TxEvent)>,
    ) {
        let receiver_id = record.receiver_id.clone().expect("receiver resolved");
        db.append_ledger(
            &record.tx_id,
            LedgerOp::Credit,
            &receiver_id,
            record.amount,
            now,
            remark,
        );
        if let Some(receiver) = db.user_mut(&receiver_id) {
            receiver.credit(record.amount);
        }
        record.amount_credited_at = Some(now);

        let balance = db.user(&receiver_id).map_or(0, |u| u.balance());
        events.push((
            receiver_id,
            TxEvent::BalanceUpdated {
                tx_id: record.tx_id.clone(),
                amount: record.amount_rupees(),
                balance: balance as f64 / 100.0,
            },
        ));
    }

    fn apply_refund(
        &self,
        db: &mut Database,
        record: &mut TransactionRecord,
        now: DateTime<Utc>,
        remark: &str,
        events: &mut Vec<(String, TxEvent)>,
    ) {
        db.append_ledger(
            &record.tx_id,
            LedgerOp::Refund,
            &record.sender_id,
            record.amount,
            now,
            remark,
        );
        if self.config.lifecycle.strict_balance {
            if let Some(sender) = db.user_mut(&record.sender_id) {
                sender.credit(record.amount);
            }
        }

        let balance = db.user(&record.sender_id).map_or(0, |u| u.balance());
        events.push((
            record.sender_id.clone(),
            TxEvent::BalanceUpdated {
                tx_id: record.tx_id.clone(),
                amount: record.amount_rupees(),
                balance: balance as f64 / 100.0,
            },
        ));
    }

    fn publish_all(&self, events: Vec<(String, TxEvent)>) {
        for (user_id, event) in events {
            self.bus.publish(&user_id, event);
        }
    }
}

fn request_from_record(record: &TransactionRecord) -> TransactionRequest {
    TransactionRequest {
        sender_id: record.sender_id.clone(),
        device_id: record.device_id.clone(),
        ts: record.ts,
        amount: record.amount,
        recipient_vpa: record.recipient_vpa.clone(),
        tx_type: record.tx_type,
        channel: record.channel,
    }
}
