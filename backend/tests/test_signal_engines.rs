//! Signal engine tests
//!
//! Trust, graph, buffer, dynamic thresholds and the drift monitor against
//! a shared in-memory store with a manual clock.

use std::sync::Arc;

use chrono::{Duration, TimeZone};
use fraud_detection_core_rs::core::time::ManualClock;
use fraud_detection_core_rs::signals::{
    compute_dynamic_thresholds, BufferOverride, DriftMonitor, DriftStatus, GraphEngine,
    RiskBufferEngine, TrustEngine,
};
use fraud_detection_core_rs::{FeatureVector, MemoryStore, PipelineConfig};

struct Harness {
    clock: Arc<ManualClock>,
    trust: TrustEngine,
    graph: GraphEngine,
    buffer: RiskBufferEngine,
    drift: DriftMonitor,
    config: Arc<PipelineConfig>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 2, 13, 5, 30, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let config = Arc::new(PipelineConfig::default());
    Harness {
        trust: TrustEngine::new(store.clone(), clock.clone(), config.clone()),
        graph: GraphEngine::new(store.clone(), config.clone()),
        buffer: RiskBufferEngine::new(store.clone(), clock.clone(), config.clone()),
        drift: DriftMonitor::new(store, clock.clone(), config.clone()),
        clock,
        config,
    }
}

fn features(is_night: f64, tx_count_1h: f64) -> FeatureVector {
    FeatureVector {
        amount: 1_000.0,
        log_amount: 1_001.0f64.ln(),
        is_round_amount: 1.0,
        hour_of_day: if is_night > 0.0 { 2.0 } else { 11.0 },
        month_of_year: 2.0,
        day_of_week: 4.0,
        is_weekend: 0.0,
        is_night,
        is_business_hours: 1.0 - is_night,
        tx_count_1h,
        tx_count_6h: tx_count_1h,
        tx_count_24h: tx_count_1h,
        tx_count_1min: 1.0,
        tx_count_5min: 1.0,
        is_new_recipient: 0.0,
        recipient_tx_count: 3.0,
        is_new_device: 0.0,
        device_count: 1.0,
        is_p2m: 0.0,
        is_p2p: 1.0,
        amount_mean: 1_000.0,
        amount_std: 50.0,
        amount_max: 1_200.0,
        amount_deviation: 0.0,
        merchant_risk_score: 0.0,
        is_qr_channel: 0.0,
        is_web_channel: 0.0,
    }
}

// ---- trust ----

#[test]
fn test_trust_longevity_component_saturates_at_ninety_days() {
    let h = harness();
    h.trust.record_success("u1", "friend@upi", 500.0);
    h.clock.advance(Duration::days(200));
    let (_, details) = h.trust.compute("u1", "friend@upi");
    assert_eq!(details.lon_score, 1.0);
}

#[test]
fn test_trust_first_ts_is_write_once() {
    let h = harness();
    h.trust.record_success("u1", "friend@upi", 500.0);
    h.clock.advance(Duration::days(10));
    h.trust.record_success("u1", "friend@upi", 500.0);
    let (_, details) = h.trust.compute("u1", "friend@upi");
    // days_known counts from the FIRST transaction
    assert!((details.days_known - 10.0).abs() < 0.2);
}

#[test]
fn test_trust_discount_shrinks_risk() {
    let h = harness();
    for _ in 0..20 {
        h.trust.record_success("u1", "friend@upi", 2_000.0);
    }
    h.clock.advance(Duration::days(90));
    let (trust, _) = h.trust.compute("u1", "friend@upi");
    let discounted = h.trust.apply_discount(0.6, trust);
    assert!(discounted < 0.6);
    assert!(discounted >= 0.6 * 0.7); // discount caps at 30%
}

// ---- graph ----

#[test]
fn test_graph_signals_combine_weighted() {
    let h = harness();
    for sender in ["a", "b", "c", "d", "e"] {
        h.graph.record_edge(sender, "mule@upi", "d1");
    }
    h.graph.record_fraud_edge("a", "mule@upi", "d1");
    h.graph.record_fraud_edge("u1", "other@upi", "d2");

    let (risk, details) = h.graph.compute("u1", "mule@upi", "d1");
    // fraud ratio 1/5, no degree risk, one own flag
    let expected = 0.45 * 0.2 + 0.40 * 0.3;
    assert!((risk - expected).abs() < 1e-9);
    assert_eq!(details.user_fraud_count, 1);
}

#[test]
fn test_graph_device_components_stay_inert() {
    let h = harness();
    h.graph.record_edge("u1", "x@upi", "shared-device");
    h.graph.record_fraud_edge("u2", "x@upi", "shared-device");
    let (_, details) = h.graph.compute("u1", "x@upi", "shared-device");
    assert_eq!(details.device_users, 0);
    assert_eq!(details.multi_user_device_risk, 0.0);
    assert_eq!(details.shared_device_fraud_ratio, 0.0);
}

// ---- buffer ----

#[test]
fn test_buffer_contracts_between_bursts() {
    let h = harness();
    for _ in 0..3 {
        h.buffer.update("u1", 0.9);
    }
    let (before, _) = h.buffer.current("u1");
    h.clock.advance(Duration::hours(24));
    let (after, _) = h.buffer.current("u1");
    assert!(after < before);
    // 24h = four 6-hour decay steps
    assert!((after - before * 0.85f64.powf(4.0)).abs() < 1e-9);
}

#[test]
fn test_buffer_override_progression() {
    let h = harness();
    let mut overrides = Vec::new();
    for _ in 0..12 {
        overrides.push(h.buffer.update("u1", 0.8).action_modifier);
    }
    assert_eq!(overrides.first(), Some(&BufferOverride::None));
    assert!(overrides.contains(&BufferOverride::Escalate));
    assert_eq!(overrides.last(), Some(&BufferOverride::Block));
}

// ---- thresholds ----

#[test]
fn test_threshold_gap_is_forced_when_clamps_collide() {
    let h = harness();
    let mut cfg = h.config.thresholds.clone();
    // Narrow bands that collapse under heavy tightening
    cfg.min_delay = 0.48;
    cfg.max_delay = 0.55;
    cfg.min_block = 0.50;
    cfg.max_block = 0.85;
    let (delay, block, _) =
        compute_dynamic_thresholds(1_000_000.0, &features(1.0, 20.0), 5.0, 1.0, &cfg);
    assert!(delay < block);
    assert!((block - delay - cfg.min_gap).abs() < 1e-9);
}

#[test]
fn test_velocity_adjustment_caps() {
    let h = harness();
    let (_, _, details) =
        compute_dynamic_thresholds(100.0, &features(0.0, 50.0), 0.0, 365.0, &h.config.thresholds);
    assert_eq!(details.adjustments.velocity, Some(-0.05));
}

// ---- drift ----

#[test]
fn test_drift_detects_shifted_feature() {
    let h = harness();
    let baseline: Vec<f64> = (0..500).map(|i| 100.0 + (i % 100) as f64).collect();
    h.drift.store_baseline("amount", &baseline);

    for i in 0..200 {
        let mut f = features(0.0, 1.0);
        f.amount = 1_500.0 + (i % 50) as f64;
        h.drift.record_live(&f);
    }

    let report = h.drift.compute_report(Some(&["amount"]));
    assert_eq!(report.overall_status, DriftStatus::MajorDrift);
    assert!(report.drifted_features.contains(&"amount".to_string()));
    assert!(report.max_psi > 0.25);
}

#[test]
fn test_drift_stable_when_live_matches_baseline() {
    let h = harness();
    let baseline: Vec<f64> = (0..500).map(|i| 100.0 + (i % 100) as f64).collect();
    h.drift.store_baseline("amount", &baseline);

    for i in 0..200 {
        let mut f = features(0.0, 1.0);
        f.amount = 100.0 + (i % 100) as f64;
        h.drift.record_live(&f);
    }

    let report = h.drift.compute_report(Some(&["amount"]));
    assert_eq!(report.per_feature["amount"].status, DriftStatus::Stable);
}
