//! Gradual recipient trust
//!
//! A continuous [0, 1] familiarity score for each (sender, recipient) pair,
//! replacing a binary known-recipient discount. Built from how often and
//! how much the sender has paid this recipient, for how long, minus a
//! penalty for past fraud flags on the pair.
//!
//! Effect on risk: `risk * (1 - 0.3 * trust)`; full trust buys at most a
//! 30% discount.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PipelineConfig;
use crate::core::math::{clamp01, round_dp};
use crate::core::time::Clock;
use crate::store::{RollingStore, StoreResult};

/// Sub-component values backing a trust score, persisted for
/// explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustDetails {
    pub tx_count: u64,
    pub total_amount: f64,
    pub days_known: f64,
    pub fraud_flags: u64,
    pub freq_score: f64,
    pub vol_score: f64,
    pub lon_score: f64,
    pub fraud_penalty: f64,
    pub trust_score: f64,
    /// Whether the new-recipient floor was applied
    pub baseline_trust: bool,
}

impl TrustDetails {
    fn baseline(baseline_trust: f64) -> Self {
        Self {
            tx_count: 0,
            total_amount: 0.0,
            days_known: 0.0,
            fraud_flags: 0,
            freq_score: 0.0,
            vol_score: 0.0,
            lon_score: 0.0,
            fraud_penalty: 0.0,
            trust_score: baseline_trust,
            baseline_trust: true,
        }
    }
}

/// Computes and maintains per-(sender, recipient) trust state.
pub struct TrustEngine {
    store: Arc<dyn RollingStore>,
    clock: Arc<dyn Clock>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for TrustEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustEngine").finish_non_exhaustive()
    }
}

fn key_tx_count(user_id: &str, recipient: &str) -> String {
    format!("trust:{user_id}:{recipient}:tx_count")
}

fn key_total_amount(user_id: &str, recipient: &str) -> String {
    format!("trust:{user_id}:{recipient}:total_amount")
}

fn key_first_ts(user_id: &str, recipient: &str) -> String {
    format!("trust:{user_id}:{recipient}:first_ts")
}

fn key_fraud_flags(user_id: &str, recipient: &str) -> String {
    format!("trust:{user_id}:{recipient}:fraud_flags")
}

impl TrustEngine {
    pub fn new(
        store: Arc<dyn RollingStore>,
        clock: Arc<dyn Clock>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Compute the trust score for a (sender, recipient) pair.
    ///
    /// New pairs with no fraud history are floored at the baseline so a
    /// user's typical first payment is not reflexively suspicious. A store
    /// outage yields the same baseline.
    pub fn compute(&self, user_id: &str, recipient: &str) -> (f64, TrustDetails) {
        let cfg = &self.config.trust;
        match self.read_state(user_id, recipient) {
            Ok((tx_count, total_amount, first_ts, fraud_flags)) => {
                let days_known = match first_ts {
                    Some(first) => {
                        let now = self.clock.now().timestamp_micros() as f64 / 1e6;
                        ((now - first) / 86_400.0).max(0.0)
                    }
                    None => 0.0,
                };

                let freq_score =
                    ((tx_count as f64).ln_1p() / cfg.freq_saturation.ln_1p()).min(1.0);
                let vol_score = (total_amount.ln_1p() / cfg.volume_saturation.ln_1p()).min(1.0);
                let lon_score = (days_known / cfg.longevity_days).min(1.0);
                let fraud_penalty = (fraud_flags as f64 * cfg.fraud_penalty_per_flag).min(1.0);

                let raw = cfg.weight_freq * freq_score
                    + cfg.weight_volume * vol_score
                    + cfg.weight_longevity * lon_score;
                let mut trust = (raw - fraud_penalty).max(0.0);

                let mut baseline_applied = false;
                if tx_count == 0 && fraud_flags == 0 {
                    trust = trust.max(cfg.baseline_trust);
                    baseline_applied = true;
                }
                trust = clamp01(trust);

                let details = TrustDetails {
                    tx_count,
                    total_amount,
                    days_known: round_dp(days_known, 1),
                    fraud_flags,
                    freq_score: round_dp(freq_score, 3),
                    vol_score: round_dp(vol_score, 3),
                    lon_score: round_dp(lon_score, 3),
                    fraud_penalty: round_dp(fraud_penalty, 3),
                    trust_score: round_dp(trust, 4),
                    baseline_trust: baseline_applied,
                };
                (trust, details)
            }
            Err(_) => {
                warn!(user_id, "trust state unavailable; applying baseline trust");
                (
                    cfg.baseline_trust,
                    TrustDetails::baseline(cfg.baseline_trust),
                )
            }
        }
    }

    /// Discount a risk score by earned trust.
    pub fn apply_discount(&self, risk: f64, trust: f64) -> f64 {
        risk * (1.0 - self.config.trust.risk_discount * trust)
    }

    /// Record a successful (allowed/confirmed) payment on the pair.
    /// Best-effort: a store failure is logged and skipped.
    pub fn record_success(&self, user_id: &str, recipient: &str, amount_rupees: f64) {
        if let Err(err) = self.try_record_success(user_id, recipient, amount_rupees) {
            warn!(user_id, %err, "failed to record trust success");
        }
    }

    fn try_record_success(
        &self,
        user_id: &str,
        recipient: &str,
        amount_rupees: f64,
    ) -> StoreResult<()> {
        let ttl = self.config.ttl.trust;
        self.store.incr_by(&key_tx_count(user_id, recipient), 1, ttl)?;
        self.store
            .incr_by_float(&key_total_amount(user_id, recipient), amount_rupees, ttl)?;
        let now = self.clock.now().timestamp_micros() as f64 / 1e6;
        self.store
            .put_if_absent(&key_first_ts(user_id, recipient), &now.to_string(), ttl)?;
        Ok(())
    }

    /// Record a fraud flag on the pair (blocked or cancelled as fraud).
    pub fn record_fraud_flag(&self, user_id: &str, recipient: &str) {
        let ttl = self.config.ttl.trust;
        if let Err(err) = self.store.incr_by(&key_fraud_flags(user_id, recipient), 1, ttl) {
            warn!(user_id, %err, "failed to record trust fraud flag");
        }
    }

    fn read_state(
        &self,
        user_id: &str,
        recipient: &str,
    ) -> StoreResult<(u64, f64, Option<f64>, u64)> {
        let tx_count = self
            .store
            .get(&key_tx_count(user_id, recipient))?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let total_amount = self
            .store
            .get(&key_total_amount(user_id, recipient))?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let first_ts = self
            .store
            .get(&key_first_ts(user_id, recipient))?
            .and_then(|v| v.parse::<f64>().ok());
        let fraud_flags = self
            .store
            .get(&key_fraud_flags(user_id, recipient))?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        Ok((tx_count, total_amount, first_ts, fraud_flags))
    }
}
