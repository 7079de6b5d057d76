//! Decision engine
//!
//! Composes the pipeline for one transaction:
//! extract features -> ensemble score -> trust discount -> graph blend ->
//! buffer update -> dynamic thresholds -> drift recording -> action ->
//! patterns and reasons -> explainability.
//!
//! The engine is the explicit dependency bundle of the pipeline: built once
//! at startup from the store, clock and predictors, then shared. No global
//! state.
//!
//! Per-sender ordering: velocity ticks and buffer updates go through the
//! rolling store's per-key atomic operations, so two calls for the same
//! sender serialize their writes; the later call observes the earlier
//! call's velocity tick and buffer value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::core::time::Clock;
use crate::features::{ExtractedFeatures, FeatureExtractor};
use crate::models::features::FeatureVector;
use crate::models::transaction::{Action, TransactionRequest};
use crate::patterns::{merge_reasons, scorer_reasons, signal_reasons, PatternMapper, PatternSummary};
use crate::scoring::{rule_based_score, ConfidenceLevel, EnsembleScorer, ModelScores, Predictor};
use crate::signals::{
    compute_dynamic_thresholds, BufferDetails, BufferOverride, DriftMonitor, GraphDetails,
    GraphEngine, RiskBufferEngine, ThresholdDetails, TrustDetails, TrustEngine,
};
use crate::store::RollingStore;

/// The structured explanation persisted with every transaction.
///
/// A pure function of the inputs and engine states at scoring time; never
/// updated after the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explainability {
    pub reasons: Vec<String>,
    pub patterns: PatternSummary,
    pub model_scores: ModelScores,
    pub features: FeatureVector,
    pub trust: TrustDetails,
    pub graph: GraphDetails,
    pub risk_buffer: BufferDetails,
    pub thresholds: ThresholdDetails,
    pub final_risk_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub disagreement: f64,
}

/// Outcome of one `decide` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub risk_score: f64,
    pub action: Action,
    pub buffer_override: BufferOverride,
    pub delay_threshold: f64,
    pub block_threshold: f64,
    pub explainability: Explainability,
}

/// The composed scoring pipeline.
pub struct DecisionEngine {
    store: Arc<dyn RollingStore>,
    extractor: FeatureExtractor,
    scorer: EnsembleScorer,
    trust: TrustEngine,
    graph: GraphEngine,
    buffer: RiskBufferEngine,
    drift: DriftMonitor,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine").finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Build the pipeline from its shared dependencies.
    pub fn new(
        store: Arc<dyn RollingStore>,
        clock: Arc<dyn Clock>,
        predictors: Vec<Box<dyn Predictor>>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            extractor: FeatureExtractor::new(store.clone(), config.clone()),
            scorer: EnsembleScorer::new(predictors, config.scorer.clone()),
            trust: TrustEngine::new(store.clone(), clock.clone(), config.clone()),
            graph: GraphEngine::new(store.clone(), config.clone()),
            buffer: RiskBufferEngine::new(store.clone(), clock.clone(), config.clone()),
            drift: DriftMonitor::new(store.clone(), clock, config.clone()),
            store,
            config,
        }
    }

    /// Score a transaction and derive its action.
    ///
    /// # Arguments
    /// * `tx` - The raw transaction (its `ts` is the reference instant)
    /// * `account_age_days` - Age of the sender's account
    pub fn decide(&self, tx: &TransactionRequest, account_age_days: f64) -> Decision {
        // 1. Features (side effect: velocity tick + amount history)
        let ExtractedFeatures {
            vector: features,
            degraded,
        } = self.extractor.extract(tx);

        // 2. Ensemble score
        let scores = self.scorer.score(&features);
        let mut risk = scores.ensemble;

        // 3. Trust discount
        let (trust_score, trust_details) = self.trust.compute(&tx.sender_id, &tx.recipient_vpa);
        risk = self.trust.apply_discount(risk, trust_score);

        // 4. Graph blend
        let (graph_risk, graph_details) =
            self.graph
                .compute(&tx.sender_id, &tx.recipient_vpa, &tx.device_id);
        risk = self.graph.blend(risk, graph_risk);

        // 5. Cumulative buffer
        let buffer_update = self.buffer.update(&tx.sender_id, risk);

        // 6. Dynamic thresholds
        let (delay_threshold, block_threshold, threshold_details) = compute_dynamic_thresholds(
            tx.amount_rupees(),
            &features,
            buffer_update.value,
            account_age_days,
            &self.config.thresholds,
        );

        // 7. Drift recording (observational)
        self.drift.record_live(&features);

        // 8. Action: buffer override first, then thresholds
        let action = match buffer_update.action_modifier {
            BufferOverride::Block => Action::Block,
            _ if risk >= block_threshold => Action::Block,
            BufferOverride::Escalate => Action::Delay,
            _ if risk >= delay_threshold => Action::Delay,
            _ => Action::Allow,
        };

        // 9. Patterns
        let patterns = PatternMapper::summary(&features, &scores);

        // 10. Explainability
        let confidence_level = if degraded {
            ConfidenceLevel::Low
        } else {
            scores.confidence_level
        };

        let mut stages = vec![
            scorer_reasons(&features, &scores),
            signal_reasons(
                &trust_details,
                &graph_details,
                &buffer_update.details,
                &threshold_details,
            ),
            patterns
                .detected_patterns
                .iter()
                .map(|p| format!("{}: {}", p.name, p.explanation))
                .collect(),
        ];
        if degraded {
            stages.push(vec![
                "Behavioural state unavailable; scored with neutral defaults".to_string(),
            ]);
        }
        let reasons = merge_reasons(stages);

        debug!(
            sender = %tx.sender_id,
            risk,
            ?action,
            delay_threshold,
            block_threshold,
            "decision computed"
        );

        let scores_disagreement = scores.disagreement;

        Decision {
            risk_score: risk,
            action,
            buffer_override: buffer_update.action_modifier,
            delay_threshold,
            block_threshold,
            explainability: Explainability {
                reasons,
                patterns,
                model_scores: scores,
                features,
                trust: trust_details,
                graph: graph_details,
                risk_buffer: buffer_update.details,
                thresholds: threshold_details,
                final_risk_score: risk,
                confidence_level,
                disagreement: scores_disagreement,
            },
        }
    }

    /// Conservative fallback when the scoring pipeline cannot complete
    /// (internal failure or a missed decision deadline): rule-based score,
    /// DELAY at or above 0.35, no engine writes.
    pub fn fallback(&self, tx: &TransactionRequest) -> Decision {
        let features = fallback_features(tx);
        let risk = rule_based_score(&features);
        let action = if risk >= 0.35 { Action::Delay } else { Action::Allow };
        let scores = ModelScores {
            iforest: None,
            random_forest: None,
            xgboost: None,
            ensemble: risk,
            final_risk_score: risk,
            disagreement: 0.0,
            confidence_level: ConfidenceLevel::Low,
        };
        let patterns = PatternMapper::summary(&features, &scores);
        let cfg = &self.config.thresholds;

        Decision {
            risk_score: risk,
            action,
            buffer_override: BufferOverride::None,
            delay_threshold: cfg.base_delay,
            block_threshold: cfg.base_block,
            explainability: Explainability {
                reasons: vec!["Scoring fallback: pipeline unavailable, rule-based decision".into()],
                patterns,
                model_scores: scores,
                features,
                trust: TrustDetails {
                    tx_count: 0,
                    total_amount: 0.0,
                    days_known: 0.0,
                    fraud_flags: 0,
                    freq_score: 0.0,
                    vol_score: 0.0,
                    lon_score: 0.0,
                    fraud_penalty: 0.0,
                    trust_score: self.config.trust.baseline_trust,
                    baseline_trust: true,
                },
                graph: GraphDetails {
                    recipient_fraud_ratio: 0.0,
                    recipient_total_senders: 0,
                    recipient_fraud_senders: 0,
                    degree_centrality: 0,
                    degree_risk: 0.0,
                    shared_device_fraud_ratio: 0.0,
                    device_users: 0,
                    device_fraud_users: 0,
                    multi_user_device_risk: 0.0,
                    user_fraud_count: 0,
                    user_fraud_risk: 0.0,
                    graph_risk_score: 0.0,
                    available: false,
                },
                risk_buffer: BufferDetails {
                    buffer: 0.0,
                    elapsed_hours: 0.0,
                    status: crate::signals::BufferState::Unavailable,
                    escalate_threshold: self.config.buffer.escalate_threshold,
                    block_threshold: self.config.buffer.block_threshold,
                },
                thresholds: ThresholdDetails {
                    base_delay: cfg.base_delay,
                    base_block: cfg.base_block,
                    delay_threshold: cfg.base_delay,
                    block_threshold: cfg.base_block,
                    total_delay_adj: 0.0,
                    total_block_adj: 0.0,
                    adjustments: Default::default(),
                },
                final_risk_score: risk,
                confidence_level: ConfidenceLevel::Low,
                disagreement: 0.0,
            },
        }
    }

    /// Record a finally-allowed transaction into the behavioural state:
    /// trust success, graph edge, known-recipient set.
    pub fn record_allowed(&self, tx: &TransactionRequest) {
        self.trust
            .record_success(&tx.sender_id, &tx.recipient_vpa, tx.amount_rupees());
        self.graph
            .record_edge(&tx.sender_id, &tx.recipient_vpa, &tx.device_id);
        self.record_known_recipient(&tx.sender_id, &tx.recipient_vpa);
    }

    /// Record a delayed/blocked transaction's graph edge (the recipient set
    /// is deliberately NOT amended).
    pub fn record_edge(&self, tx: &TransactionRequest) {
        self.graph
            .record_edge(&tx.sender_id, &tx.recipient_vpa, &tx.device_id);
    }

    /// Record a fraud outcome: graph fraud edge plus a trust fraud flag.
    pub fn record_fraud(&self, tx: &TransactionRequest) {
        self.graph
            .record_fraud_edge(&tx.sender_id, &tx.recipient_vpa, &tx.device_id);
        self.trust.record_fraud_flag(&tx.sender_id, &tx.recipient_vpa);
    }

    fn record_known_recipient(&self, sender_id: &str, recipient_vpa: &str) {
        let key = format!("user:{sender_id}:recipients");
        if let Err(err) = self
            .store
            .set_add(&key, recipient_vpa, self.config.ttl.recipients)
        {
            tracing::warn!(sender_id, %err, "failed to record known recipient");
        }
    }

    /// Drift monitor, for baseline management and reports.
    pub fn drift(&self) -> &DriftMonitor {
        &self.drift
    }

    /// Risk buffer engine, for manual reset and history queries.
    pub fn risk_buffer(&self) -> &RiskBufferEngine {
        &self.buffer
    }

    /// Graph engine, for recipient profiles.
    pub fn graph_signals(&self) -> &GraphEngine {
        &self.graph
    }
}

/// Feature construction for the fallback path: no store access at all.
fn fallback_features(tx: &TransactionRequest) -> FeatureVector {
    use crate::core::time::{is_business_hour, is_night_hour, is_weekend, to_regional};
    use chrono::{Datelike, Timelike};

    let regional = to_regional(tx.ts);
    let hour = regional.hour();
    let amount = tx.amount_rupees();
    let flag = |b: bool| if b { 1.0 } else { 0.0 };

    FeatureVector {
        amount,
        log_amount: amount.ln_1p(),
        is_round_amount: flag(amount % 100.0 == 0.0 || amount % 500.0 == 0.0),
        hour_of_day: hour as f64,
        month_of_year: regional.month() as f64,
        day_of_week: regional.weekday().num_days_from_monday() as f64,
        is_weekend: flag(is_weekend(regional)),
        is_night: flag(is_night_hour(hour)),
        is_business_hours: flag(is_business_hour(hour)),
        tx_count_1h: 0.0,
        tx_count_6h: 0.0,
        tx_count_24h: 0.0,
        tx_count_1min: 0.0,
        tx_count_5min: 0.0,
        is_new_recipient: 0.0,
        recipient_tx_count: 5.0,
        is_new_device: 0.0,
        device_count: 1.0,
        is_p2m: flag(tx.tx_type == crate::models::transaction::TxType::P2m),
        is_p2p: flag(tx.tx_type == crate::models::transaction::TxType::P2p),
        amount_mean: amount,
        amount_std: amount * 0.3,
        amount_max: amount * 1.5,
        amount_deviation: 0.5,
        merchant_risk_score: crate::features::merchant_risk(tx.vpa_local_part()),
        is_qr_channel: flag(tx.channel == crate::models::transaction::Channel::Qr),
        is_web_channel: flag(tx.channel == crate::models::transaction::Channel::Web),
    }
}
