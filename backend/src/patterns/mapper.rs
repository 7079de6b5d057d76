//! Fraud pattern detection
//!
//! Maps features and model scores to six pattern categories:
//! - Amount Anomaly: absolute bands and statistical deviation
//! - Behavioural Anomaly: temporal, channel, merchant and recipient signals
//! - Device Anomaly: permanently not-detected (device novelty disabled)
//! - Velocity Anomaly: burst detection per rolling window
//! - Model Consensus: the predictors agree on high risk
//! - Model Disagreement: the predictors conflict
//!
//! Thresholds are deliberately lenient; each detection carries a confidence
//! and the feature names that triggered it.

use serde::{Deserialize, Serialize};

use crate::models::features::FeatureVector;
use crate::scoring::ModelScores;

// Amount thresholds (rupees)
const AMOUNT_HIGH: f64 = 25_000.0;
const AMOUNT_VERY_HIGH: f64 = 50_000.0;
const AMOUNT_CRITICAL: f64 = 100_000.0;
const AMOUNT_DEVIATION_MODERATE: f64 = 5.0;
const AMOUNT_DEVIATION_HIGH: f64 = 8.0;
const AMOUNT_VS_MEAN_FACTOR: f64 = 2.5;

// Velocity thresholds (counts per window)
const VELOCITY_1MIN_WARN: f64 = 2.0;
const VELOCITY_1MIN_CRITICAL: f64 = 3.0;
const VELOCITY_5MIN_WARN: f64 = 5.0;
const VELOCITY_5MIN_CRITICAL: f64 = 10.0;
const VELOCITY_1H_WARN: f64 = 15.0;
const VELOCITY_1H_CRITICAL: f64 = 30.0;
const VELOCITY_6H_WARN: f64 = 50.0;

// Model score thresholds
const MODEL_HIGH_RISK: f64 = 0.6;
const MODEL_CONSENSUS_MIN: f64 = 0.6;
const MODEL_CONSENSUS_AVG: f64 = 0.7;
const MODEL_SPREAD_DISAGREEMENT: f64 = 0.3;
const MODEL_SPREAD_CONSENSUS: f64 = 0.2;

// Merchant risk bands
const MERCHANT_RISK_MODERATE: f64 = 0.4;
const MERCHANT_RISK_HIGH: f64 = 0.7;

/// Result of one pattern detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub pattern: String,
    pub detected: bool,
    pub confidence: f64,
    pub trigger_features: Vec<String>,
    pub explanation: String,
}

impl PatternResult {
    fn not_detected(pattern: &str, explanation: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            detected: false,
            confidence: 0.0,
            trigger_features: Vec::new(),
            explanation: explanation.to_string(),
        }
    }
}

/// A detected pattern in the persisted summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub name: String,
    pub confidence: f64,
    pub triggers: Vec<String>,
    pub explanation: String,
}

/// Pattern analysis summary persisted with each transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub pattern_counts: std::collections::BTreeMap<String, u8>,
    pub detected_patterns: Vec<DetectedPattern>,
    pub total_detected: usize,
}

/// Collects the triggers/confidence/explanations of one detector run.
#[derive(Default)]
struct Detection {
    triggers: Vec<&'static str>,
    confidence: f64,
    explanation: Vec<String>,
}

impl Detection {
    fn hit(&mut self, trigger: &'static str, confidence: f64, explanation: String) {
        self.triggers.push(trigger);
        self.confidence = self.confidence.max(confidence);
        self.explanation.push(explanation);
    }

    fn into_result(self, pattern: &str, none_text: &str) -> PatternResult {
        let detected = !self.triggers.is_empty();
        PatternResult {
            pattern: pattern.to_string(),
            detected,
            confidence: self.confidence,
            trigger_features: self.triggers.iter().map(|t| t.to_string()).collect(),
            explanation: if detected {
                self.explanation.join("; ")
            } else {
                none_text.to_string()
            },
        }
    }
}

/// Maps features and model scores to fraud pattern categories.
pub struct PatternMapper;

impl PatternMapper {
    /// Amount-based anomalies: absolute bands, deviation from the user's
    /// own history, and distance from their mean.
    pub fn detect_amount_anomaly(features: &FeatureVector) -> PatternResult {
        let mut d = Detection::default();
        let amount = features.amount;
        let deviation = features.amount_deviation;

        if amount >= AMOUNT_CRITICAL {
            d.hit("amount_critical", 0.95, format!("Critical amount: ₹{amount:.0}"));
        } else if amount >= AMOUNT_VERY_HIGH {
            d.hit("amount_very_high", 0.8, format!("Very high amount: ₹{amount:.0}"));
        } else if amount >= AMOUNT_HIGH {
            d.hit("amount_high", 0.6, format!("High amount: ₹{amount:.0}"));
        }

        if deviation >= AMOUNT_DEVIATION_HIGH {
            d.hit(
                "amount_deviation_high",
                0.85,
                format!("Amount {deviation:.1}x above user's normal"),
            );
        } else if deviation >= AMOUNT_DEVIATION_MODERATE {
            d.hit(
                "amount_deviation_moderate",
                0.65,
                format!("Amount {deviation:.1}x above user's average"),
            );
        }

        if features.amount_mean > 0.0 && amount >= AMOUNT_VS_MEAN_FACTOR * features.amount_mean {
            d.hit(
                "amount_vs_mean",
                0.7,
                format!(
                    "Amount {AMOUNT_VS_MEAN_FACTOR}x above user's average (₹{:.0})",
                    features.amount_mean
                ),
            );
        }

        d.into_result("Amount Anomaly", "No amount anomaly")
    }

    /// Behavioural anomalies: temporal, channel, merchant, recipient and
    /// unsupervised-model signals, including the anomaly-only case where
    /// the isolation forest fires while the supervised models stay quiet.
    pub fn detect_behavioural_anomaly(
        features: &FeatureVector,
        scores: &ModelScores,
    ) -> PatternResult {
        let mut d = Detection::default();

        if features.is_night > 0.0 {
            d.hit(
                "night_activity",
                0.5,
                format!("Late night transaction ({}:00)", features.hour_of_day as i64),
            );
        }
        if features.is_weekend > 0.0 {
            d.hit("weekend_activity", 0.4, "Weekend transaction".to_string());
        }
        if features.is_round_amount > 0.0 {
            d.hit("round_amount", 0.3, "Round amount (possible testing)".to_string());
        }

        let merchant_risk = features.merchant_risk_score;
        if merchant_risk >= MERCHANT_RISK_HIGH {
            d.hit("merchant_risk_high", 0.75, "High-risk merchant profile".to_string());
        } else if merchant_risk >= MERCHANT_RISK_MODERATE {
            d.hit("merchant_risk_moderate", 0.55, "Moderate merchant risk".to_string());
        }

        if features.is_qr_channel > 0.0 || features.is_web_channel > 0.0 {
            let channel = if features.is_qr_channel > 0.0 { "QR" } else { "Web" };
            d.hit("risky_channel", 0.4, format!("{channel} channel (higher risk)"));
        }

        if features.is_new_recipient > 0.0 {
            d.hit("new_recipient", 0.6, "New/unknown recipient".to_string());
        }

        let iforest = scores.iforest.unwrap_or(0.0);
        if iforest >= MODEL_HIGH_RISK {
            d.hit(
                "iforest_anomaly",
                0.7,
                format!("Isolation Forest anomaly (score: {iforest:.2})"),
            );
        }

        // Anomaly-only: unsupervised fires while every supervised model is quiet
        let supervised: Vec<f64> = [scores.random_forest, scores.xgboost]
            .into_iter()
            .flatten()
            .collect();
        let supervised_high = supervised.iter().filter(|s| **s >= MODEL_HIGH_RISK).count();
        if iforest >= MODEL_HIGH_RISK && !supervised.is_empty() && supervised_high == 0 {
            d.hit(
                "anomaly_only_signal",
                0.68,
                "Anomaly-only signal: Isolation Forest high while supervised models are quiet"
                    .to_string(),
            );
        }

        d.into_result("Behavioural Anomaly", "No behavioural anomaly")
    }

    /// Device anomaly detection is disabled by policy; permanently
    /// not-detected so the hook point survives.
    pub fn detect_device_anomaly(_features: &FeatureVector) -> PatternResult {
        PatternResult::not_detected("Device Anomaly", "Device checking disabled")
    }

    /// Velocity anomalies per rolling window.
    pub fn detect_velocity_anomaly(features: &FeatureVector) -> PatternResult {
        let mut d = Detection::default();
        let (c1min, c5min, c1h, c6h) = (
            features.tx_count_1min,
            features.tx_count_5min,
            features.tx_count_1h,
            features.tx_count_6h,
        );

        if c1min > VELOCITY_1MIN_CRITICAL {
            d.hit(
                "velocity_1min_critical",
                0.95,
                format!("{} transactions in 1 minute (card testing)", c1min as i64),
            );
        } else if c1min > VELOCITY_1MIN_WARN {
            d.hit(
                "velocity_1min_warn",
                0.8,
                format!("{} transactions in 1 minute", c1min as i64),
            );
        }

        if c5min > VELOCITY_5MIN_CRITICAL {
            d.hit(
                "velocity_5min_critical",
                0.9,
                format!("{} transactions in 5 minutes", c5min as i64),
            );
        } else if c5min > VELOCITY_5MIN_WARN {
            d.hit(
                "velocity_5min_warn",
                0.75,
                format!("{} transactions in 5 minutes", c5min as i64),
            );
        }

        if c1h > VELOCITY_1H_CRITICAL {
            d.hit(
                "velocity_1h_critical",
                0.85,
                format!("{} transactions in 1 hour", c1h as i64),
            );
        } else if c1h > VELOCITY_1H_WARN {
            d.hit(
                "velocity_1h_warn",
                0.65,
                format!("{} transactions in 1 hour", c1h as i64),
            );
        }

        if c6h > VELOCITY_6H_WARN {
            d.hit(
                "velocity_6h_warn",
                0.6,
                format!("{} transactions in 6 hours", c6h as i64),
            );
        }

        d.into_result("Velocity Anomaly", "No velocity anomaly")
    }

    /// Consensus: all present models high, a high average with low spread,
    /// or both supervised models high while the anomaly model stays low
    /// (a known-fraud signature).
    pub fn detect_model_consensus(scores: &ModelScores) -> PatternResult {
        let mut d = Detection::default();
        let values = scores.present();

        let supervised: Vec<f64> = [scores.random_forest, scores.xgboost]
            .into_iter()
            .flatten()
            .collect();

        if values.len() >= 2 {
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let avg = values.iter().sum::<f64>() / values.len() as f64;
            let spread = max - min;

            if min >= MODEL_CONSENSUS_MIN {
                d.hit(
                    "all_models_high",
                    0.9,
                    format!("Strong fraud signal: all models agree (min={min:.2})"),
                );
            } else if avg >= MODEL_CONSENSUS_AVG && spread < MODEL_SPREAD_CONSENSUS {
                d.hit(
                    "avg_high_low_spread",
                    0.75,
                    format!("Models consensus: avg={avg:.2}, spread={spread:.2}"),
                );
            } else if !supervised.is_empty()
                && supervised.iter().all(|s| *s >= MODEL_HIGH_RISK)
                && scores.iforest.map_or(true, |s| s < MODEL_HIGH_RISK)
            {
                d.hit(
                    "supervised_only_high",
                    0.8,
                    "Known fraud pattern: tree-based models high while anomaly model is low"
                        .to_string(),
                );
            }
        }

        d.into_result("Model Consensus", "No model consensus")
    }

    /// Disagreement: a large spread, plus the two directional sub-cases
    /// (anomaly-vs-supervised and supervised-vs-anomaly).
    pub fn detect_model_disagreement(scores: &ModelScores) -> PatternResult {
        let mut d = Detection::default();
        let values = scores.present();

        if values.len() >= 2 {
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let spread = max - min;

            if spread >= MODEL_SPREAD_DISAGREEMENT {
                d.hit(
                    "high_spread",
                    0.7,
                    format!(
                        "Models disagree significantly: lowest score={:.0}%, highest score={:.0}% (difference: {:.0}%)",
                        min * 100.0,
                        max * 100.0,
                        spread * 100.0
                    ),
                );
            }

            let supervised: Vec<f64> = [scores.random_forest, scores.xgboost]
                .into_iter()
                .flatten()
                .collect();
            if let Some(iforest) = scores.iforest {
                if !supervised.is_empty() {
                    let high = supervised.iter().filter(|s| **s >= MODEL_HIGH_RISK).count();

                    if iforest >= MODEL_HIGH_RISK && high == 0 {
                        d.hit(
                            "anomaly_vs_supervised",
                            0.72,
                            "Unusual behavioral pattern detected, but no match with known fraud signatures"
                                .to_string(),
                        );
                    }

                    if high == supervised.len() && iforest < MODEL_HIGH_RISK {
                        d.hit(
                            "supervised_vs_anomaly",
                            0.72,
                            "Matches known fraud patterns, but transaction behavior appears statistically typical"
                                .to_string(),
                        );
                    }
                }
            }
        }

        d.into_result(
            "Model Disagreement",
            "All models show consistent risk assessment",
        )
    }

    /// Run every detector.
    pub fn analyze_all(features: &FeatureVector, scores: &ModelScores) -> Vec<PatternResult> {
        vec![
            Self::detect_amount_anomaly(features),
            Self::detect_behavioural_anomaly(features, scores),
            Self::detect_device_anomaly(features),
            Self::detect_velocity_anomaly(features),
            Self::detect_model_consensus(scores),
            Self::detect_model_disagreement(scores),
        ]
    }

    /// Summary shape persisted in the explainability payload.
    pub fn summary(features: &FeatureVector, scores: &ModelScores) -> PatternSummary {
        let results = Self::analyze_all(features, scores);

        let pattern_counts = results
            .iter()
            .map(|r| {
                let key = r.pattern.to_lowercase().replace(' ', "_");
                (key, u8::from(r.detected))
            })
            .collect();

        let detected_patterns: Vec<DetectedPattern> = results
            .iter()
            .filter(|r| r.detected)
            .map(|r| DetectedPattern {
                name: r.pattern.clone(),
                confidence: r.confidence,
                triggers: r.trigger_features.clone(),
                explanation: r.explanation.clone(),
            })
            .collect();

        PatternSummary {
            total_detected: detected_patterns.len(),
            detected_patterns,
            pattern_counts,
        }
    }
}
