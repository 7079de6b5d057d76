//! Event fan-out integration tests
//!
//! Lifecycle events as seen by subscribed sessions: kinds, wire shape,
//! per-session ordering and receiver-side notifications.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fraud_detection_core_rs::core::time::ManualClock;
use fraud_detection_core_rs::models::event::TxEvent;
use fraud_detection_core_rs::models::transaction::{Channel, TxType};
use fraud_detection_core_rs::{
    Database, DecisionEngine, EventBus, MemoryStore, PipelineConfig, SubmitRequest,
    TransactionLifecycle,
};

fn build() -> Arc<TransactionLifecycle> {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 2, 13, 5, 30, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let config = Arc::new(PipelineConfig::default());
    let decision = DecisionEngine::new(store, clock.clone(), Vec::new(), config.clone());
    let lifecycle = Arc::new(TransactionLifecycle::new(
        Database::new(),
        decision,
        clock,
        Arc::new(EventBus::new()),
        config,
    ));
    lifecycle.create_user("u1", "9876543210").unwrap();
    lifecycle.create_user("u2", "9123456780").unwrap();
    lifecycle
}

fn request(amount: i64) -> SubmitRequest {
    SubmitRequest {
        sender_id: "u1".into(),
        device_id: "d1".into(),
        amount,
        recipient_vpa: "9123456780@upi".into(),
        tx_type: TxType::P2p,
        channel: Channel::App,
        ts: None,
    }
}

#[test]
fn test_sender_sees_created_then_balance() {
    let lifecycle = build();
    let mut session = lifecycle.event_bus().subscribe("u1");

    let record = lifecycle.submit(request(20_000)).unwrap();

    let first = session.try_recv().unwrap();
    match &first {
        TxEvent::TransactionCreated {
            tx_id,
            amount,
            risk_score,
            ..
        } => {
            assert_eq!(tx_id, &record.tx_id);
            assert_eq!(*amount, 200.0);
            assert!(*risk_score < 1.0);
        }
        other => panic!("expected created event, got {other:?}"),
    }

    let second = session.try_recv().unwrap();
    assert_eq!(second.kind(), "balance_updated");
}

#[test]
fn test_receiver_is_notified_of_incoming_money() {
    let lifecycle = build();
    let mut receiver = lifecycle.event_bus().subscribe("u2");

    lifecycle.submit(request(20_000)).unwrap();

    let mut kinds = Vec::new();
    while let Some(event) = receiver.try_recv() {
        kinds.push(event.kind());
    }
    assert!(kinds.contains(&"balance_updated"));
    assert!(kinds.contains(&"transaction_received"));
}

#[test]
fn test_events_serialize_with_stable_type_tags() {
    let lifecycle = build();
    let mut session = lifecycle.event_bus().subscribe("u1");
    lifecycle.submit(request(20_000)).unwrap();

    while let Some(event) = session.try_recv() {
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert!(json["tx_id"].is_string());
        assert!(json["amount"].is_number());
    }
}

#[test]
fn test_every_sender_session_gets_the_events() {
    let lifecycle = build();
    let mut first = lifecycle.event_bus().subscribe("u1");
    let mut second = lifecycle.event_bus().subscribe("u1");

    lifecycle.submit(request(20_000)).unwrap();

    assert_eq!(first.try_recv().unwrap().kind(), "transaction_created");
    assert_eq!(second.try_recv().unwrap().kind(), "transaction_created");
}

#[test]
fn test_dropped_session_does_not_break_publishing() {
    let lifecycle = build();
    let session = lifecycle.event_bus().subscribe("u1");
    drop(session);

    // Publishing with a dead subscriber neither errors nor panics
    lifecycle.submit(request(20_000)).unwrap();
    assert_eq!(lifecycle.event_bus().session_count(), 0);
}

#[tokio::test]
async fn test_async_consumption_preserves_order() {
    let lifecycle = build();
    let mut session = lifecycle.event_bus().subscribe("u1");

    let record = lifecycle.submit(request(20_000)).unwrap();

    let first = session.recv().await.unwrap();
    assert_eq!(first.kind(), "transaction_created");
    assert_eq!(first.tx_id(), record.tx_id);

    let second = session.recv().await.unwrap();
    assert_eq!(second.kind(), "balance_updated");
}
