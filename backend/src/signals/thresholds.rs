//! Dynamic decision thresholds
//!
//! Replaces static delay/block cutoffs with thresholds that tighten under
//! risky context: large amounts, young accounts, an elevated risk buffer,
//! night-time and high velocity. Higher-risk context lowers both
//! thresholds, so more transactions are flagged.
//!
//! The clamped result always keeps `delay < block`.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::core::math::round_dp;
use crate::models::features::FeatureVector;

/// The adjustment factors that fired, as signed deltas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAdjustments {
    #[serde(rename = "amount_adj", skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "account_age_adj", skip_serializing_if = "Option::is_none")]
    pub account_age: Option<f64>,
    #[serde(rename = "risk_buffer_adj", skip_serializing_if = "Option::is_none")]
    pub risk_buffer: Option<f64>,
    #[serde(rename = "night_adj", skip_serializing_if = "Option::is_none")]
    pub night: Option<f64>,
    #[serde(rename = "velocity_adj", skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

/// Threshold computation snapshot for the explainability payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDetails {
    pub base_delay: f64,
    pub base_block: f64,
    pub delay_threshold: f64,
    pub block_threshold: f64,
    pub total_delay_adj: f64,
    pub total_block_adj: f64,
    pub adjustments: ThresholdAdjustments,
}

/// Compute the delay and block thresholds for one transaction.
///
/// # Arguments
/// * `amount_rupees` - Transaction amount
/// * `features` - Extracted features (night flag, 1-hour velocity)
/// * `risk_buffer_value` - The sender's cumulative risk buffer
/// * `account_age_days` - Age of the sender's account
pub fn compute_dynamic_thresholds(
    amount_rupees: f64,
    features: &FeatureVector,
    risk_buffer_value: f64,
    account_age_days: f64,
    cfg: &ThresholdConfig,
) -> (f64, f64, ThresholdDetails) {
    let mut adj = 0.0;
    let mut adjustments = ThresholdAdjustments::default();

    if amount_rupees > 0.0 {
        let amount_factor = amount_rupees.ln_1p() / cfg.amount_divisor;
        adj -= amount_factor;
        adjustments.amount = Some(round_dp(-amount_factor, 4));
    }

    if account_age_days < cfg.new_account_days {
        let age_factor = cfg.new_account_max_adj * (1.0 - account_age_days / cfg.new_account_days);
        adj -= age_factor;
        adjustments.account_age = Some(round_dp(-age_factor, 4));
    }

    if risk_buffer_value > cfg.buffer_trigger {
        let buffer_factor = (risk_buffer_value * cfg.buffer_factor).min(cfg.buffer_cap);
        adj -= buffer_factor;
        adjustments.risk_buffer = Some(round_dp(-buffer_factor, 4));
    }

    // Device novelty adjustment is disabled by policy (hook point).

    if features.is_night > 0.0 {
        adj -= cfg.night_adj;
        adjustments.night = Some(-cfg.night_adj);
    }

    if features.tx_count_1h > cfg.velocity_knee {
        let vel_factor =
            ((features.tx_count_1h - cfg.velocity_knee) * cfg.velocity_per_tx).min(cfg.velocity_cap);
        adj -= vel_factor;
        adjustments.velocity = Some(round_dp(-vel_factor, 4));
    }

    let mut delay = (cfg.base_delay + adj).clamp(cfg.min_delay, cfg.max_delay);
    let block = (cfg.base_block + adj).clamp(cfg.min_block, cfg.max_block);

    if delay >= block {
        delay = block - cfg.min_gap;
    }

    let details = ThresholdDetails {
        base_delay: cfg.base_delay,
        base_block: cfg.base_block,
        delay_threshold: round_dp(delay, 4),
        block_threshold: round_dp(block, 4),
        total_delay_adj: round_dp(adj, 4),
        total_block_adj: round_dp(adj, 4),
        adjustments,
    };

    (delay, block, details)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(is_night: f64, tx_count_1h: f64) -> FeatureVector {
        FeatureVector {
            amount: 0.0,
            log_amount: 0.0,
            is_round_amount: 0.0,
            hour_of_day: 12.0,
            month_of_year: 2.0,
            day_of_week: 2.0,
            is_weekend: 0.0,
            is_night,
            is_business_hours: 1.0,
            tx_count_1h,
            tx_count_6h: 1.0,
            tx_count_24h: 1.0,
            tx_count_1min: 1.0,
            tx_count_5min: 1.0,
            is_new_recipient: 0.0,
            recipient_tx_count: 1.0,
            is_new_device: 0.0,
            device_count: 1.0,
            is_p2m: 0.0,
            is_p2p: 1.0,
            amount_mean: 0.0,
            amount_std: 0.0,
            amount_max: 0.0,
            amount_deviation: 0.0,
            merchant_risk_score: 0.0,
            is_qr_channel: 0.0,
            is_web_channel: 0.0,
        }
    }

    #[test]
    fn test_calm_context_keeps_near_base() {
        let cfg = ThresholdConfig::default();
        let (delay, block, details) =
            compute_dynamic_thresholds(1_000.0, &features(0.0, 1.0), 0.0, 365.0, &cfg);
        // Only the amount factor fires: ln(1001)/200 ~ 0.0345
        assert!((delay - (0.45 - 1_001.0f64.ln() / 200.0)).abs() < 1e-9);
        assert!(delay < block);
        assert!(details.adjustments.account_age.is_none());
        assert!(details.adjustments.night.is_none());
    }

    #[test]
    fn test_risky_context_tightens_both() {
        let cfg = ThresholdConfig::default();
        let (calm_delay, calm_block, _) =
            compute_dynamic_thresholds(1_000.0, &features(0.0, 1.0), 0.0, 365.0, &cfg);
        let (delay, block, details) =
            compute_dynamic_thresholds(75_000.0, &features(1.0, 8.0), 2.0, 10.0, &cfg);
        assert!(delay < calm_delay);
        assert!(block < calm_block);
        let a = &details.adjustments;
        assert!(a.amount.is_some() && a.account_age.is_some());
        assert!(a.risk_buffer.is_some() && a.night.is_some() && a.velocity.is_some());
    }

    #[test]
    fn test_clamps_hold_under_extreme_context() {
        let cfg = ThresholdConfig::default();
        let (delay, block, _) =
            compute_dynamic_thresholds(10_000_000.0, &features(1.0, 100.0), 10.0, 0.0, &cfg);
        assert!(delay >= cfg.min_delay - cfg.min_gap);
        assert!(block >= cfg.min_block);
        assert!(delay < block);
    }

    #[test]
    fn test_delay_always_below_block() {
        let cfg = ThresholdConfig::default();
        for amount in [0.0, 100.0, 10_000.0, 1_000_000.0] {
            for buffer in [0.0, 1.0, 5.0] {
                let (delay, block, _) =
                    compute_dynamic_thresholds(amount, &features(1.0, 20.0), buffer, 5.0, &cfg);
                assert!(delay < block, "delay {delay} !< block {block}");
            }
        }
    }
}
