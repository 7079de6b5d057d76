//! Decision engine tests
//!
//! The composed pipeline: action derivation against dynamic thresholds,
//! buffer overrides, explainability shape and degraded-mode behaviour.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use fraud_detection_core_rs::core::time::ManualClock;
use fraud_detection_core_rs::Clock;
use fraud_detection_core_rs::models::transaction::{Channel, TransactionRequest, TxType};
use fraud_detection_core_rs::scoring::{ModelKind, PredictorError};
use fraud_detection_core_rs::signals::BufferOverride;
use fraud_detection_core_rs::{
    Action, ConfidenceLevel, DecisionEngine, FeatureVector, MemoryStore, OfflineStore,
    PipelineConfig, Predictor,
};

/// Fixed-output model for forcing specific risk levels.
struct Fixed(ModelKind, f64);

impl Predictor for Fixed {
    fn kind(&self) -> ModelKind {
        self.0
    }

    fn predict(&self, _: &FeatureVector) -> Result<f64, PredictorError> {
        Ok(self.1)
    }
}

fn base_time() -> DateTime<Utc> {
    // 11:00 IST on Friday 13 Feb 2026
    Utc.with_ymd_and_hms(2026, 2, 13, 5, 30, 0).unwrap()
}

fn engine_with(predictors: Vec<Box<dyn Predictor>>) -> (DecisionEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(base_time()));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let config = Arc::new(PipelineConfig::default());
    (
        DecisionEngine::new(store, clock.clone(), predictors, config),
        clock,
    )
}

fn request(amount_paise: i64) -> TransactionRequest {
    TransactionRequest {
        sender_id: "u1".into(),
        device_id: "d1".into(),
        ts: base_time(),
        amount: amount_paise,
        recipient_vpa: "alice@upi".into(),
        tx_type: TxType::P2p,
        channel: Channel::App,
    }
}

#[test]
fn test_low_risk_allows() {
    let (engine, _) = engine_with(vec![
        Box::new(Fixed(ModelKind::RandomForest, 0.05)),
        Box::new(Fixed(ModelKind::Xgboost, 0.05)),
    ]);
    let decision = engine.decide(&request(20_000), 365.0);
    assert_eq!(decision.action, Action::Allow);
    assert!(decision.risk_score < decision.delay_threshold);
}

#[test]
fn test_high_risk_blocks() {
    let (engine, _) = engine_with(vec![
        Box::new(Fixed(ModelKind::RandomForest, 0.97)),
        Box::new(Fixed(ModelKind::Xgboost, 0.95)),
    ]);
    let decision = engine.decide(&request(20_000), 365.0);
    assert_eq!(decision.action, Action::Block);
    assert!(decision.risk_score >= decision.block_threshold);
}

#[test]
fn test_mid_risk_delays() {
    let (engine, _) = engine_with(vec![
        Box::new(Fixed(ModelKind::RandomForest, 0.6)),
        Box::new(Fixed(ModelKind::Xgboost, 0.6)),
    ]);
    let decision = engine.decide(&request(20_000), 365.0);
    assert_eq!(decision.action, Action::Delay);
    assert!(decision.risk_score >= decision.delay_threshold);
    assert!(decision.risk_score < decision.block_threshold);
}

#[test]
fn test_thresholds_always_ordered() {
    let (engine, _) = engine_with(Vec::new());
    for amount in [100, 20_000, 5_000_000, 20_000_000] {
        let decision = engine.decide(&request(amount), 3.0);
        assert!(decision.delay_threshold < decision.block_threshold);
    }
}

#[test]
fn test_buffer_escalation_forces_delay_below_threshold() {
    let (engine, _) = engine_with(vec![
        Box::new(Fixed(ModelKind::RandomForest, 0.1)),
        Box::new(Fixed(ModelKind::Xgboost, 0.1)),
    ]);
    // Pile accumulated risk so the next update lands in the escalate band
    engine.risk_buffer().update("u1", 3.2);

    let decision = engine.decide(&request(20_000), 365.0);
    assert!(decision.risk_score < decision.delay_threshold);
    assert_eq!(decision.buffer_override, BufferOverride::Escalate);
    assert_eq!(decision.action, Action::Delay);
}

#[test]
fn test_buffer_block_overrides_everything() {
    let (engine, _) = engine_with(vec![
        Box::new(Fixed(ModelKind::RandomForest, 0.1)),
        Box::new(Fixed(ModelKind::Xgboost, 0.1)),
    ]);
    engine.risk_buffer().update("u1", 5.0);

    let decision = engine.decide(&request(20_000), 365.0);
    assert_eq!(decision.buffer_override, BufferOverride::Block);
    assert_eq!(decision.action, Action::Block);
}

#[test]
fn test_trust_discount_lowers_risk() {
    let build = || {
        engine_with(vec![
            Box::new(Fixed(ModelKind::RandomForest, 0.5)) as Box<dyn Predictor>,
            Box::new(Fixed(ModelKind::Xgboost, 0.5)),
        ])
    };

    let (fresh_engine, _) = build();
    let fresh = fresh_engine.decide(&request(20_000), 365.0);

    let (trusted_engine, clock) = build();
    for _ in 0..20 {
        trusted_engine.record_allowed(&request(200_000));
    }
    clock.advance(chrono::Duration::days(90));
    let mut req = request(20_000);
    req.ts = clock.now();
    let trusted = trusted_engine.decide(&req, 365.0);

    assert!(trusted.risk_score < fresh.risk_score);
}

#[test]
fn test_explainability_wire_shape() {
    let (engine, _) = engine_with(vec![
        Box::new(Fixed(ModelKind::IsolationForest, -1.0)),
        Box::new(Fixed(ModelKind::RandomForest, 0.6)),
        Box::new(Fixed(ModelKind::Xgboost, 0.55)),
    ]);
    let decision = engine.decide(&request(750_000), 365.0);
    let json = serde_json::to_value(&decision.explainability).unwrap();

    for field in [
        "reasons",
        "patterns",
        "model_scores",
        "features",
        "trust",
        "graph",
        "risk_buffer",
        "thresholds",
        "final_risk_score",
        "confidence_level",
        "disagreement",
    ] {
        assert!(json.get(field).is_some(), "missing field {field}");
    }

    assert!(json["reasons"].as_array().unwrap().len() > 0);
    assert_eq!(json["final_risk_score"], decision.risk_score);
    assert!(json["model_scores"]["random_forest"].is_number());
    assert!(json["features"]["amount"].is_number());
}

#[test]
fn test_degraded_store_lowers_confidence_but_succeeds() {
    let clock = Arc::new(ManualClock::new(base_time()));
    let config = Arc::new(PipelineConfig::default());
    let engine = DecisionEngine::new(
        Arc::new(OfflineStore),
        clock,
        vec![
            Box::new(Fixed(ModelKind::RandomForest, 0.1)),
            Box::new(Fixed(ModelKind::Xgboost, 0.1)),
        ],
        config,
    );

    let decision = engine.decide(&request(20_000), 365.0);
    assert_eq!(
        decision.explainability.confidence_level,
        ConfidenceLevel::Low
    );
    assert!(decision
        .explainability
        .reasons
        .iter()
        .any(|r| r.contains("neutral defaults")));
}

#[test]
fn test_fallback_is_conservative() {
    let (engine, _) = engine_with(Vec::new());

    // Calm transaction: below the 0.35 bar, allowed
    let calm = engine.fallback(&request(20_000));
    assert_eq!(calm.action, Action::Allow);
    assert_eq!(
        calm.explainability.confidence_level,
        ConfidenceLevel::Low
    );

    // Risky night-time transfer: delayed, never blocked by the fallback
    let mut risky = request(8_000_000);
    risky.ts = Utc.with_ymd_and_hms(2026, 2, 13, 21, 0, 0).unwrap(); // 02:30 IST
    let decision = engine.fallback(&risky);
    assert!(decision.risk_score >= 0.35);
    assert_eq!(decision.action, Action::Delay);
}

#[test]
fn test_decisions_are_deterministic_given_state() {
    let make = || {
        let (engine, _) = engine_with(vec![
            Box::new(Fixed(ModelKind::RandomForest, 0.4)) as Box<dyn Predictor>,
            Box::new(Fixed(ModelKind::Xgboost, 0.5)),
        ]);
        let d = engine.decide(&request(30_000), 100.0);
        serde_json::to_string(&d.explainability).unwrap()
    };
    assert_eq!(make(), make());
}
