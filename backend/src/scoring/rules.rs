//! Rule-based fallback scoring
//!
//! Deterministic additive heuristics used when no predictor is available
//! (or when the whole scoring stage fails). Deliberately lenient: the rules
//! exist to keep the pipeline deciding, not to replace the models.

use crate::core::math::clamp01;
use crate::models::features::FeatureVector;

/// Score a feature vector with additive heuristics, clamped to [0, 1].
pub fn rule_based_score(features: &FeatureVector) -> f64 {
    let mut score = 0.0;

    // Amount bands (rupees)
    if features.amount > 50_000.0 {
        score += 0.3;
    } else if features.amount > 25_000.0 {
        score += 0.15;
    } else if features.amount > 10_000.0 {
        score += 0.08;
    }

    if features.is_night > 0.0 {
        score += 0.1;
    }

    if features.is_new_recipient > 0.0 {
        score += 0.03;
    }

    score += features.merchant_risk_score * 0.1;

    if features.tx_count_1h > 10.0 {
        score += 0.2;
    } else if features.tx_count_1h > 5.0 {
        score += 0.1;
    }

    if features.is_qr_channel > 0.0 || features.is_web_channel > 0.0 {
        score += 0.05;
    }

    clamp01(score)
}
