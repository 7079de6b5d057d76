//! Ensemble scorer over opaque predictors

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::ScorerConfig;
use crate::core::math::{clamp01, sigmoid};
use crate::models::features::FeatureVector;
use crate::scoring::rules::rule_based_score;
use crate::scoring::ConfidenceLevel;

/// The three model slots of the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Unsupervised anomaly detector; emits a signed decision value where
    /// lower means more anomalous. The scorer converts it to a fraud
    /// probability via sigma(-raw)
    IsolationForest,
    /// Supervised; emits a fraud class probability in [0, 1]
    RandomForest,
    /// Supervised; emits a fraud class probability in [0, 1]
    Xgboost,
}

/// Errors from an opaque predictor
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor failed: {0}")]
    Failed(String),
}

/// An opaque trained model. Implementations receive the feature vector and
/// return their raw output; interpretation (anomaly measure vs. class
/// probability) is decided by [`ModelKind`].
pub trait Predictor: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictorError>;
}

/// Scores produced for one transaction. Individual model scores are absent
/// when the model is unavailable or failed on this input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub iforest: Option<f64>,
    pub random_forest: Option<f64>,
    pub xgboost: Option<f64>,
    /// Weighted mean over present predictors
    pub ensemble: f64,
    /// Unweighted mean over present predictors
    pub final_risk_score: f64,
    /// Max - min of present predictor scores (0 with fewer than 2 present)
    pub disagreement: f64,
    pub confidence_level: ConfidenceLevel,
}

impl ModelScores {
    /// Scores of the predictors that ran, in slot order
    pub fn present(&self) -> Vec<f64> {
        [self.iforest, self.random_forest, self.xgboost]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Combines the available predictors into the ensemble output.
pub struct EnsembleScorer {
    predictors: Vec<Box<dyn Predictor>>,
    config: ScorerConfig,
}

impl std::fmt::Debug for EnsembleScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleScorer")
            .field("predictors", &self.predictors.len())
            .finish()
    }
}

impl EnsembleScorer {
    pub fn new(predictors: Vec<Box<dyn Predictor>>, config: ScorerConfig) -> Self {
        Self { predictors, config }
    }

    /// A scorer with no models; every transaction takes the rule-based path.
    pub fn without_models(config: ScorerConfig) -> Self {
        Self::new(Vec::new(), config)
    }

    /// Score a feature vector.
    ///
    /// A failing predictor is treated as absent for this transaction. With
    /// no predictor output at all, the deterministic rule-based fallback
    /// supplies the score with HIGH confidence (the rules are exact, not a
    /// model disagreement).
    pub fn score(&self, features: &FeatureVector) -> ModelScores {
        let mut iforest = None;
        let mut random_forest = None;
        let mut xgboost = None;

        for predictor in &self.predictors {
            let raw = match predictor.predict(features) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(kind = ?predictor.kind(), %err, "predictor failed; omitting from ensemble");
                    continue;
                }
            };
            match predictor.kind() {
                // Decision-value convention: negate so anomalies score high
                ModelKind::IsolationForest => iforest = Some(clamp01(sigmoid(-raw))),
                ModelKind::RandomForest => random_forest = Some(clamp01(raw)),
                ModelKind::Xgboost => xgboost = Some(clamp01(raw)),
            }
        }

        let present: Vec<(f64, f64)> = [
            (iforest, self.config.weight_iforest),
            (random_forest, self.config.weight_random_forest),
            (xgboost, self.config.weight_xgboost),
        ]
        .into_iter()
        .filter_map(|(score, weight)| score.map(|s| (s, weight)))
        .collect();

        if present.is_empty() {
            let fallback = rule_based_score(features);
            return ModelScores {
                iforest: None,
                random_forest: None,
                xgboost: None,
                ensemble: fallback,
                final_risk_score: fallback,
                disagreement: 0.0,
                confidence_level: ConfidenceLevel::High,
            };
        }

        let weighted_sum: f64 = present.iter().map(|(s, w)| s * w).sum();
        let total_weight: f64 = present.iter().map(|(_, w)| w).sum();
        let ensemble = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };

        let values: Vec<f64> = present.iter().map(|(s, _)| *s).collect();
        let final_risk_score = values.iter().sum::<f64>() / values.len() as f64;
        let disagreement = if values.len() >= 2 {
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            max - min
        } else {
            0.0
        };

        ModelScores {
            iforest,
            random_forest,
            xgboost,
            ensemble,
            final_risk_score,
            disagreement,
            confidence_level: ConfidenceLevel::from_disagreement(disagreement),
        }
    }
}
