//! Risk profile smoothing, history bounds, cache freshness and fraud reports.

mod common;

use chrono::Duration;
use common::{bid, call, t0, CountingProfileStore, FixedClassifier, Harness, CALLER};
use risk_core::{
    clock::ManualClock,
    entity::FraudReport,
    orchestrator::FraudOrchestrator,
    risk_profile::MAX_HISTORY,
    rules::{FraudRules, LiveRules},
    store::MemoryStore,
    types::EntityKind,
};
use std::sync::Arc;

#[test]
fn profile_smooths_toward_new_scores() {
    let first = Harness::scoring(0.2);
    first.orch.check_call(&call("c1")).unwrap();
    let p = first.store.profile(CALLER, EntityKind::Call).expect("profile created");
    assert!((p.current_risk_score - 0.2).abs() < 1e-12);

    // Same store, a classifier that now says 1.0.
    let store = first.store.clone();
    let orch = FraudOrchestrator::with_store(Arc::new(LiveRules::new(FraudRules::default())), store.clone())
        .classifier(Arc::new(FixedClassifier::new(1.0)))
        .clock(Arc::new(ManualClock::new(t0())))
        .build();
    orch.check_call(&call("c2")).unwrap();

    let p = store.profile(CALLER, EntityKind::Call).unwrap();
    assert!((p.current_risk_score - 0.44).abs() < 1e-9, "got {}", p.current_risk_score);
    assert_eq!(p.history.len(), 2);
    assert_eq!(p.history.back().map(|e| e.score), Some(1.0));
}

#[test]
fn history_keeps_most_recent_hundred() {
    let h = Harness::scoring(0.1);
    for i in 0..=MAX_HISTORY {
        h.clock.advance(Duration::seconds(1));
        h.orch.check_call(&call(&format!("c{i}"))).unwrap();
    }
    let p = h.store.profile(CALLER, EntityKind::Call).unwrap();
    assert_eq!(p.history.len(), MAX_HISTORY);
    // The first entry (at t0+1s) was evicted.
    assert_eq!(p.history.front().map(|e| e.recorded_at), Some(t0() + Duration::seconds(2)));
    assert_eq!(p.last_check, t0() + Duration::seconds(MAX_HISTORY as i64 + 1));
}

#[test]
fn bid_profiles_key_on_buyer() {
    let h = Harness::scoring(0.3);
    h.orch.check_bid(&bid("b1", 42.0), None).unwrap();
    assert!(h.store.profile("buyer-001", EntityKind::Bid).is_some());
    assert!(h.store.profile("b1", EntityKind::Bid).is_none());
}

#[test]
fn risk_score_served_from_cache_within_ttl() {
    let clock = Arc::new(ManualClock::new(t0()));
    let profiles = Arc::new(CountingProfileStore::default());
    let orch = FraudOrchestrator::builder(
        Arc::new(LiveRules::new(FraudRules::default())),
        Arc::new(MemoryStore::new()),
        profiles.clone(),
    )
    .classifier(Arc::new(FixedClassifier::new(0.5)))
    .clock(clock.clone())
    .build();

    orch.check_call(&call("c1")).unwrap();
    assert_eq!(profiles.loads(), 1);

    assert!((orch.get_risk_score(CALLER, EntityKind::Call).unwrap() - 0.5).abs() < 1e-12);
    clock.advance(Duration::minutes(4));
    orch.get_risk_score(CALLER, EntityKind::Call).unwrap();
    assert_eq!(profiles.loads(), 1, "fresh entries must not hit the store");

    clock.advance(Duration::minutes(2));
    orch.get_risk_score(CALLER, EntityKind::Call).unwrap();
    assert_eq!(profiles.loads(), 2);
}

#[test]
fn unknown_entity_scores_zero() {
    let h = Harness::clean();
    assert_eq!(h.orch.get_risk_score("+19998887777", EntityKind::Call).unwrap(), 0.0);
    assert!(h.orch.get_risk_score(" ", EntityKind::Call).unwrap_err().is_validation());
}

#[test]
fn fraud_report_raises_score_and_counts() {
    let h = Harness::scoring(0.1);
    h.orch.check_call(&call("c1")).unwrap();
    let before = h.orch.get_risk_score(CALLER, EntityKind::Call).unwrap();

    let report = FraudReport {
        entity_id:   CALLER.into(),
        entity_kind: EntityKind::Call,
        fraud_type:  "robocall".into(),
        description: "confirmed by carrier".into(),
        reported_by: Some("trust-team".into()),
    };
    let p = h.orch.report_fraud(&report).unwrap();
    assert_eq!(p.fraud_count, 1);
    assert!(p.current_risk_score > before);
    assert_eq!(p.attributes["last_fraud_type"], "robocall");

    let after = h.orch.get_risk_score(CALLER, EntityKind::Call).unwrap();
    assert!((after - p.current_risk_score).abs() < 1e-12, "cache refreshed by the report");

    let p = h.orch.report_fraud(&report).unwrap();
    assert_eq!(p.fraud_count, 2);
}

#[test]
fn fraud_report_on_unknown_entity_creates_profile() {
    let h = Harness::clean();
    let p = h
        .orch
        .report_fraud(&FraudReport {
            entity_id:   "buyer-777".into(),
            entity_kind: EntityKind::Bid,
            fraud_type:  "bid_shilling".into(),
            description: String::new(),
            reported_by: None,
        })
        .unwrap();
    assert_eq!(p.fraud_count, 1);
    assert_eq!(p.current_risk_score, 1.0);
    assert!(h.store.profile("buyer-777", EntityKind::Bid).is_some());
}
