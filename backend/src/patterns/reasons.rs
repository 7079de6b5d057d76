//! Human-readable reason generation
//!
//! Converts features, model outputs and engine details into the reason
//! lines persisted with every decision. No scoring happens here; this
//! module only explains inputs it is given.
//!
//! The merged list keeps first-seen order and drops duplicates, so the
//! persisted explanation is stable for a given state snapshot.

use crate::models::features::FeatureVector;
use crate::scoring::ModelScores;
use crate::signals::{BufferDetails, BufferState, GraphDetails, ThresholdDetails, TrustDetails};

// Qualitative thresholds for scorer-level explanations
const AMOUNT_HIGH: f64 = 10_000.0;
const AMOUNT_MEDIUM: f64 = 5_000.0;
const TXN_PER_HOUR_HIGH: f64 = 8.0;
const TXN_PER_HOUR_MEDIUM: f64 = 4.0;
const NIGHT_HOUR_START: f64 = 0.0;
const NIGHT_HOUR_END: f64 = 5.0;
const IFOREST_ANOMALY: f64 = 0.7;
const PROB_HIGH: f64 = 0.7;
const PROB_MEDIUM: f64 = 0.4;

fn add(reason: String, reasons: &mut Vec<String>) {
    if !reason.is_empty() && !reasons.contains(&reason) {
        reasons.push(reason);
    }
}

/// Reasons derived from the feature vector and per-model outputs.
pub fn scorer_reasons(features: &FeatureVector, scores: &ModelScores) -> Vec<String> {
    let mut reasons = Vec::new();

    let amount = features.amount;
    if amount >= AMOUNT_HIGH {
        add(format!("Very high amount {amount:.0} detected"), &mut reasons);
    } else if amount >= AMOUNT_MEDIUM {
        add(format!("High amount {amount:.0} detected"), &mut reasons);
    }

    if features.tx_count_1h >= TXN_PER_HOUR_HIGH {
        add("Transaction burst detected in the last hour".to_string(), &mut reasons);
    } else if features.tx_count_1h >= TXN_PER_HOUR_MEDIUM {
        add(
            "Elevated transaction velocity in the last hour".to_string(),
            &mut reasons,
        );
    }

    if (NIGHT_HOUR_START..=NIGHT_HOUR_END).contains(&features.hour_of_day) {
        add("Night-time transaction".to_string(), &mut reasons);
    }

    if features.is_new_recipient > 0.0 {
        add("Payment to new recipient".to_string(), &mut reasons);
    }

    if let Some(iforest) = scores.iforest {
        if iforest >= IFOREST_ANOMALY {
            add("Isolation Forest flags this as anomalous".to_string(), &mut reasons);
        }
    }
    if let Some(rf) = scores.random_forest {
        if rf >= PROB_HIGH {
            add(
                "Random Forest predicts high fraud likelihood".to_string(),
                &mut reasons,
            );
        } else if rf >= PROB_MEDIUM {
            add(
                "Random Forest predicts moderate fraud likelihood".to_string(),
                &mut reasons,
            );
        }
    }
    if let Some(xgb) = scores.xgboost {
        if xgb >= PROB_HIGH {
            add("XGBoost predicts high fraud likelihood".to_string(), &mut reasons);
        } else if xgb >= PROB_MEDIUM {
            add(
                "XGBoost predicts moderate fraud likelihood".to_string(),
                &mut reasons,
            );
        }
    }

    reasons
}

/// Reasons derived from the trust, graph, buffer and threshold engines.
pub fn signal_reasons(
    trust: &TrustDetails,
    graph: &GraphDetails,
    buffer: &BufferDetails,
    thresholds: &ThresholdDetails,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if trust.fraud_flags > 0 {
        add(
            format!(
                "Recipient has {} prior fraud flag(s) in trust history",
                trust.fraud_flags
            ),
            &mut reasons,
        );
    }
    if trust.trust_score >= 0.7 {
        add(
            format!(
                "High trust: {} past transactions over {:.0} days",
                trust.tx_count, trust.days_known
            ),
            &mut reasons,
        );
    } else if trust.trust_score >= 0.3 {
        add(
            format!("Moderate trust: {} past transactions", trust.tx_count),
            &mut reasons,
        );
    } else if trust.trust_score == 0.0 && trust.tx_count == 0 {
        add("First-ever transaction to this recipient".to_string(), &mut reasons);
    }

    if graph.available {
        if graph.recipient_fraud_ratio > 0.3 {
            add(
                format!(
                    "Recipient has high fraud ratio: {}/{} senders flagged",
                    graph.recipient_fraud_senders, graph.recipient_total_senders
                ),
                &mut reasons,
            );
        } else if graph.recipient_fraud_ratio > 0.1 {
            add(
                format!(
                    "Recipient has moderate fraud ratio: {}/{} senders flagged",
                    graph.recipient_fraud_senders, graph.recipient_total_senders
                ),
                &mut reasons,
            );
        }

        if graph.degree_centrality > 50 {
            add(
                format!(
                    "Recipient receives from unusually many senders ({})",
                    graph.degree_centrality
                ),
                &mut reasons,
            );
        }

        if graph.shared_device_fraud_ratio > 0.0 {
            add(
                "Device shared with fraud-associated accounts".to_string(),
                &mut reasons,
            );
        }

        if graph.user_fraud_count > 0 {
            add(
                format!(
                    "User has {} historical fraud flag(s)",
                    graph.user_fraud_count
                ),
                &mut reasons,
            );
        }
    }

    match buffer.status {
        BufferState::Critical => add(
            format!(
                "Cumulative risk is critical ({:.2}); pattern of suspicious activity",
                buffer.buffer
            ),
            &mut reasons,
        ),
        BufferState::Elevated => add(
            format!(
                "Cumulative risk is elevated ({:.2}); recent suspicious activity pattern",
                buffer.buffer
            ),
            &mut reasons,
        ),
        _ => {}
    }

    let adj = &thresholds.adjustments;
    if adj.amount.is_some() {
        add(
            "Thresholds tightened due to high transaction amount".to_string(),
            &mut reasons,
        );
    }
    if adj.account_age.is_some() {
        add("Thresholds tightened for newer account".to_string(), &mut reasons);
    }
    if adj.risk_buffer.is_some() {
        add(
            "Thresholds tightened due to accumulated risk history".to_string(),
            &mut reasons,
        );
    }

    reasons
}

/// Merge reason stages in order, dropping duplicates. Empty output gets the
/// all-clear line so every explanation has at least one reason.
pub fn merge_reasons(stages: Vec<Vec<String>>) -> Vec<String> {
    let mut merged = Vec::new();
    for stage in stages {
        for reason in stage {
            add(reason, &mut merged);
        }
    }
    if merged.is_empty() {
        merged.push("No elevated risk indicators detected; transaction appears typical".to_string());
    }
    merged
}
