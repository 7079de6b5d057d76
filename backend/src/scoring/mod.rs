//! Ensemble model scoring
//!
//! Runs the available predictors over a feature vector and combines them
//! into a weighted ensemble score with a disagreement-derived confidence
//! level. Predictors are opaque: a fixed vector in, a score out. When none
//! are available the deterministic rule-based fallback takes over.

mod ensemble;
mod rules;

pub use ensemble::{EnsembleScorer, ModelKind, ModelScores, Predictor, PredictorError};
pub use rules::rule_based_score;

use serde::{Deserialize, Serialize};

/// Agreement level across the present predictors, derived from the spread
/// between their scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Band the max-min spread of the present predictor scores:
    /// < 0.2 HIGH, <= 0.4 MEDIUM, else LOW.
    pub fn from_disagreement(disagreement: f64) -> Self {
        if disagreement < 0.2 {
            ConfidenceLevel::High
        } else if disagreement <= 0.4 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}
