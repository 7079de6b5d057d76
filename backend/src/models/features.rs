//! Feature vector
//!
//! The fixed, named, ordered feature set the models were trained on. The
//! field order of [`FeatureVector`] and the order of [`FEATURE_NAMES`] must
//! stay in lockstep with the training pipeline: predictors receive the
//! array form positionally.

use serde::{Deserialize, Serialize};

/// Feature names in model-input order
pub const FEATURE_NAMES: [&str; 27] = [
    // Basic
    "amount",
    "log_amount",
    "is_round_amount",
    // Temporal
    "hour_of_day",
    "month_of_year",
    "day_of_week",
    "is_weekend",
    "is_night",
    "is_business_hours",
    // Velocity
    "tx_count_1h",
    "tx_count_6h",
    "tx_count_24h",
    "tx_count_1min",
    "tx_count_5min",
    // Behavioural
    "is_new_recipient",
    "recipient_tx_count",
    "is_new_device",
    "device_count",
    "is_p2m",
    "is_p2p",
    // Statistical
    "amount_mean",
    "amount_std",
    "amount_max",
    "amount_deviation",
    // Risk
    "merchant_risk_score",
    "is_qr_channel",
    "is_web_channel",
];

/// Number of features in the model input vector
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// The extracted features of one transaction. All values are f64; flags are
/// 0.0/1.0 and amounts are rupees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // Basic
    pub amount: f64,
    pub log_amount: f64,
    pub is_round_amount: f64,
    // Temporal (regional time)
    pub hour_of_day: f64,
    pub month_of_year: f64,
    pub day_of_week: f64,
    pub is_weekend: f64,
    pub is_night: f64,
    pub is_business_hours: f64,
    // Velocity (rolling windows over the sender's prior timestamps)
    pub tx_count_1h: f64,
    pub tx_count_6h: f64,
    pub tx_count_24h: f64,
    pub tx_count_1min: f64,
    pub tx_count_5min: f64,
    // Behavioural
    pub is_new_recipient: f64,
    pub recipient_tx_count: f64,
    /// Device novelty is disabled by policy; kept neutral so the hook point
    /// survives re-enabling.
    pub is_new_device: f64,
    pub device_count: f64,
    pub is_p2m: f64,
    pub is_p2p: f64,
    // Statistical (sender's last 7 days of amounts)
    pub amount_mean: f64,
    pub amount_std: f64,
    pub amount_max: f64,
    pub amount_deviation: f64,
    // Risk
    pub merchant_risk_score: f64,
    pub is_qr_channel: f64,
    pub is_web_channel: f64,
}

impl FeatureVector {
    /// Model input in training order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.amount,
            self.log_amount,
            self.is_round_amount,
            self.hour_of_day,
            self.month_of_year,
            self.day_of_week,
            self.is_weekend,
            self.is_night,
            self.is_business_hours,
            self.tx_count_1h,
            self.tx_count_6h,
            self.tx_count_24h,
            self.tx_count_1min,
            self.tx_count_5min,
            self.is_new_recipient,
            self.recipient_tx_count,
            self.is_new_device,
            self.device_count,
            self.is_p2m,
            self.is_p2p,
            self.amount_mean,
            self.amount_std,
            self.amount_max,
            self.amount_deviation,
            self.merchant_risk_score,
            self.is_qr_channel,
            self.is_web_channel,
        ]
    }

    /// (name, value) pairs in training order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_array_stay_in_lockstep() {
        let mut features = sample();
        features.merchant_risk_score = 0.77;
        let by_name: std::collections::HashMap<_, _> = features.named().collect();
        assert_eq!(by_name["merchant_risk_score"], 0.77);
        assert_eq!(by_name.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_serde_uses_training_names() {
        let json = serde_json::to_value(sample()).unwrap();
        for name in FEATURE_NAMES {
            assert!(json.get(name).is_some(), "missing feature {name}");
        }
    }

    fn sample() -> FeatureVector {
        FeatureVector {
            amount: 200.0,
            log_amount: 201.0f64.ln(),
            is_round_amount: 1.0,
            hour_of_day: 11.0,
            month_of_year: 2.0,
            day_of_week: 4.0,
            is_weekend: 0.0,
            is_night: 0.0,
            is_business_hours: 1.0,
            tx_count_1h: 1.0,
            tx_count_6h: 1.0,
            tx_count_24h: 1.0,
            tx_count_1min: 1.0,
            tx_count_5min: 1.0,
            is_new_recipient: 0.0,
            recipient_tx_count: 3.0,
            is_new_device: 0.0,
            device_count: 1.0,
            is_p2m: 0.0,
            is_p2p: 1.0,
            amount_mean: 200.0,
            amount_std: 0.0,
            amount_max: 200.0,
            amount_deviation: 0.0,
            merchant_risk_score: 0.0,
            is_qr_channel: 0.0,
            is_web_channel: 0.0,
        }
    }
}
