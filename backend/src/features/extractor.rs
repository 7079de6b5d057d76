//! Feature extraction
//!
//! Derives the fixed feature vector from a raw transaction plus the
//! sender's rolling state. Extraction has side effects: it records the
//! transaction's timestamp into the velocity windows and its amount into
//! the 7-day amount history, so a transaction sees itself in its own
//! velocity counts (downstream patterns assume this).
//!
//! It does NOT add the recipient to the sender's known-recipient set; that
//! happens only when a transaction is finally allowed. A rejected
//! transaction must not teach the system that the recipient is familiar.
//!
//! When the rolling store is unreachable every group falls back to stable,
//! documented neutral values so drift monitoring is not polluted.

use std::sync::Arc;

use chrono::{Datelike, Timelike};
use tracing::warn;

use crate::config::PipelineConfig;
use crate::core::time::{is_business_hour, is_night_hour, is_weekend, to_regional};
use crate::models::features::FeatureVector;
use crate::models::transaction::{Channel, TransactionRequest, TxType};
use crate::store::RollingStore;

/// Result of feature extraction.
#[derive(Debug, Clone)]
pub struct ExtractedFeatures {
    pub vector: FeatureVector,
    /// True when any rolling-store lookup failed and neutral defaults were
    /// substituted; the decision engine lowers its confidence accordingly.
    pub degraded: bool,
}

/// Derives the model input vector for a transaction.
pub struct FeatureExtractor {
    store: Arc<dyn RollingStore>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor").finish_non_exhaustive()
    }
}

struct VelocityCounts {
    c1min: f64,
    c5min: f64,
    c1h: f64,
    c6h: f64,
    c24h: f64,
}

struct AmountStats {
    mean: f64,
    std: f64,
    max: f64,
    deviation: f64,
}

impl FeatureExtractor {
    pub fn new(store: Arc<dyn RollingStore>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    /// Extract the feature vector for `tx`, updating the sender's velocity
    /// and amount histories.
    pub fn extract(&self, tx: &TransactionRequest) -> ExtractedFeatures {
        let regional = to_regional(tx.ts);
        let hour = regional.hour();
        let amount = tx.amount_rupees();
        let mut degraded = false;

        let velocity = match self.record_and_count_velocity(tx) {
            Ok(counts) => counts,
            Err(_) => {
                degraded = true;
                VelocityCounts {
                    c1min: 1.0,
                    c5min: 1.0,
                    c1h: 1.0,
                    c6h: 2.0,
                    c24h: 5.0,
                }
            }
        };

        let (is_new_recipient, recipient_tx_count) = match self.recipient_features(tx) {
            Ok(pair) => pair,
            Err(_) => {
                degraded = true;
                (0.3, 5.0)
            }
        };

        let stats = match self.record_and_summarize_amounts(tx, amount) {
            Ok(stats) => stats,
            Err(_) => {
                degraded = true;
                AmountStats {
                    mean: amount,
                    std: amount * 0.3,
                    max: amount * 1.5,
                    deviation: 0.5,
                }
            }
        };

        if degraded {
            warn!(sender = %tx.sender_id, "rolling store unavailable; using neutral feature defaults");
        }

        let vector = FeatureVector {
            amount,
            log_amount: amount.ln_1p(),
            is_round_amount: flag(amount % 100.0 == 0.0 || amount % 500.0 == 0.0),
            hour_of_day: hour as f64,
            month_of_year: regional.month() as f64,
            day_of_week: regional.weekday().num_days_from_monday() as f64,
            is_weekend: flag(is_weekend(regional)),
            is_night: flag(is_night_hour(hour)),
            is_business_hours: flag(is_business_hour(hour)),
            tx_count_1h: velocity.c1h,
            tx_count_6h: velocity.c6h,
            tx_count_24h: velocity.c24h,
            tx_count_1min: velocity.c1min,
            tx_count_5min: velocity.c5min,
            is_new_recipient,
            recipient_tx_count,
            // Device novelty disabled by policy; neutral constants keep the
            // hook point alive.
            is_new_device: 0.0,
            device_count: 1.0,
            is_p2m: flag(tx.tx_type == TxType::P2m),
            is_p2p: flag(tx.tx_type == TxType::P2p),
            amount_mean: stats.mean,
            amount_std: stats.std,
            amount_max: stats.max,
            amount_deviation: stats.deviation,
            merchant_risk_score: merchant_risk(tx.vpa_local_part()),
            is_qr_channel: flag(tx.channel == Channel::Qr),
            is_web_channel: flag(tx.channel == Channel::Web),
        };

        ExtractedFeatures { vector, degraded }
    }

    /// Record this transaction's timestamp, prune stale entries, count the
    /// rolling windows. The current transaction is included in each count.
    fn record_and_count_velocity(
        &self,
        tx: &TransactionRequest,
    ) -> Result<VelocityCounts, crate::store::StoreError> {
        let uid = &tx.sender_id;
        let now_ts = epoch_seconds(tx.ts);
        let member = now_ts.to_string();
        let ttl = &self.config.ttl;

        let tx_key = format!("user:{uid}:timestamps");
        self.store.seq_add(&tx_key, now_ts, &member, ttl.velocity)?;
        self.store.seq_remove_below(&tx_key, now_ts - 86_400.0)?;

        let vel_1m_key = format!("user:{uid}:vel_1m");
        let vel_5m_key = format!("user:{uid}:vel_5m");
        self.store.seq_add(&vel_1m_key, now_ts, &member, ttl.velocity_1m)?;
        self.store.seq_add(&vel_5m_key, now_ts, &member, ttl.velocity_5m)?;
        self.store.seq_remove_below(&vel_1m_key, now_ts - 60.0)?;
        self.store.seq_remove_below(&vel_5m_key, now_ts - 300.0)?;

        Ok(VelocityCounts {
            c1min: self.store.seq_count(&vel_1m_key, now_ts - 60.0, now_ts)? as f64,
            c5min: self.store.seq_count(&vel_5m_key, now_ts - 300.0, now_ts)? as f64,
            c1h: self.store.seq_count(&tx_key, now_ts - 3_600.0, now_ts)? as f64,
            c6h: self.store.seq_count(&tx_key, now_ts - 21_600.0, now_ts)? as f64,
            c24h: self.store.seq_count(&tx_key, now_ts - 86_400.0, now_ts)? as f64,
        })
    }

    /// Check recipient familiarity without recording it.
    fn recipient_features(
        &self,
        tx: &TransactionRequest,
    ) -> Result<(f64, f64), crate::store::StoreError> {
        let rec_key = format!("user:{}:recipients", tx.sender_id);
        let known = self.store.set_contains(&rec_key, &tx.recipient_vpa)?;
        self.store.set_touch(&rec_key, self.config.ttl.recipients)?;
        let count = self.store.set_card(&rec_key)? as f64;
        Ok((flag(!known), count))
    }

    /// Record the amount, prune beyond 7 days, compute window statistics.
    fn record_and_summarize_amounts(
        &self,
        tx: &TransactionRequest,
        amount: f64,
    ) -> Result<AmountStats, crate::store::StoreError> {
        let amt_key = format!("user:{}:amounts", tx.sender_id);
        let now_ts = epoch_seconds(tx.ts);
        let week_ago = now_ts - 86_400.0 * 7.0;

        self.store
            .seq_add(&amt_key, now_ts, &amount.to_string(), self.config.ttl.amounts)?;
        self.store.seq_remove_below(&amt_key, week_ago)?;

        let recent: Vec<f64> = self
            .store
            .seq_range(&amt_key, week_ago, now_ts)?
            .iter()
            .filter_map(|v| v.parse().ok())
            .collect();

        if recent.is_empty() {
            return Ok(AmountStats {
                mean: amount,
                std: 0.0,
                max: amount,
                deviation: 0.0,
            });
        }

        let n = recent.len() as f64;
        let mean = recent.iter().sum::<f64>() / n;
        let std = if recent.len() > 1 {
            let var = recent.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        let max = recent.iter().cloned().fold(f64::MIN, f64::max);

        Ok(AmountStats {
            mean,
            std,
            max,
            deviation: (amount - mean).abs() / (std + 1.0),
        })
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn epoch_seconds(ts: chrono::DateTime<chrono::Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1e6
}

/// Heuristic riskiness of a recipient VPA local part.
///
/// +0.5 when it starts with a digit, +0.3 when shorter than 4 chars,
/// +0.2 when composed solely of '0' and '1'; clamped to 1.0. An empty
/// local part scores 0.
pub(crate) fn merchant_risk(local: &str) -> f64 {
    if local.is_empty() {
        return 0.0;
    }
    let mut risk: f64 = 0.0;
    if local.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        risk += 0.5;
    }
    if local.len() < 4 {
        risk += 0.3;
    }
    if local.chars().all(|c| c == '0' || c == '1') {
        risk += 0.2;
    }
    risk.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merchant_risk_bands() {
        assert_eq!(merchant_risk("alice"), 0.0);
        assert_eq!(merchant_risk("9alice"), 0.5);
        assert_eq!(merchant_risk("ab"), 0.3);
        // leading digit + short + all binary
        assert_eq!(merchant_risk("101"), 1.0);
        assert_eq!(merchant_risk("010101"), 0.7);
        assert_eq!(merchant_risk(""), 0.0);
    }

    #[test]
    fn test_merchant_risk_clamped() {
        // 0.5 + 0.3 + 0.2 exactly reaches the clamp
        assert!(merchant_risk("01") <= 1.0);
    }
}
