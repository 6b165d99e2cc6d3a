//! Aggregation and threshold policy.

mod common;

use common::{call, FixedClassifier, FixedRules, Harness, RecordingVelocity};
use risk_core::{
    rules::FraudRules,
    types::{FlagType, Severity},
};
use std::sync::Arc;

/// A call with every collaborator reporting clean is approved at zero risk.
#[test]
fn clean_call_is_approved_with_no_flags() {
    let h = Harness::clean();
    let r = h.orch.check_call(&call("call-clean")).unwrap();

    assert!(r.approved);
    assert_eq!(r.risk_score, 0.0);
    assert!(r.flags.is_empty(), "unexpected flags: {:?}", r.flags);
    assert!(!r.requires_mfa);
    assert!(!r.requires_review);
    assert_eq!(h.store.result_count(), 1);
}

/// Threshold bands at require_mfa=0.7, auto_block=0.9.
#[test]
fn threshold_bands() {
    // (score, mfa, approved, review)
    let cases = [
        (0.20, false, true,  false),
        (0.65, false, true,  true),
        (0.75, true,  true,  true),
        (0.95, true,  false, false),
    ];

    for (score, mfa, approved, review) in cases {
        let h = Harness::scoring(score);
        let r = h.orch.check_call(&call("call-band")).unwrap();
        assert!((r.risk_score - score).abs() < 1e-12, "score {score}: got {}", r.risk_score);
        assert_eq!(r.requires_mfa, mfa, "mfa at {score}");
        assert_eq!(r.approved, approved, "approved at {score}");
        assert_eq!(r.requires_review, review, "review at {score}");
    }
}

/// Blocked results carry a rejection reason; approved ones do not.
#[test]
fn rejection_reason_only_when_blocked() {
    let blocked = Harness::scoring(0.95).orch.check_call(&call("c1")).unwrap();
    assert!(blocked.reasons.iter().any(|r| r.contains("auto-block")));

    let approved = Harness::scoring(0.5).orch.check_call(&call("c2")).unwrap();
    assert!(!approved.reasons.iter().any(|r| r.contains("auto-block")));
}

/// Two signals at 0.3 and 0.6 aggregate to 0.6, not 0.9 or 0.45.
#[test]
fn aggregate_is_max_not_sum() {
    let h = Harness::build(|b| {
        b.classifier(Arc::new(FixedClassifier::new(0.3)))
            .rule_engine(Arc::new(FixedRules::matching(&["night_burst"], 0.6)))
    });
    let r = h.orch.check_call(&call("call-max")).unwrap();
    assert!((r.risk_score - 0.6).abs() < 1e-12, "got {}", r.risk_score);
    assert_eq!(r.flags.len(), 1);
    assert_eq!(r.flags[0].flag_type, FlagType::Pattern);
}

/// Velocity breach scores 0.8 and dominates a weaker classifier score.
#[test]
fn velocity_breach_sets_floor() {
    let h = Harness::build_with(RecordingVelocity::over_limit(), FraudRules::default(), |b| {
        b.classifier(Arc::new(FixedClassifier::new(0.3)))
    });
    let r = h.orch.check_call(&call("call-burst")).unwrap();

    assert!((r.risk_score - 0.8).abs() < 1e-12);
    let v = r.flags.iter().find(|f| f.flag_type == FlagType::Velocity).expect("velocity flag");
    assert_eq!(v.severity, Severity::High);
    assert!(r.requires_review);
    assert!(r.requires_mfa);
    assert!(r.approved);
    // Recorded even though it failed.
    assert_eq!(h.velocity.recorded(), vec![(common::CALLER.to_string(), "call".to_string())]);
}

/// Scores from misbehaving collaborators stay inside [0, 1].
#[test]
fn score_is_bounded() {
    let h = Harness::build(|b| {
        b.classifier(Arc::new(FixedClassifier::new(1.7)))
            .rule_engine(Arc::new(FixedRules::matching(&["a", "b", "c"], 3.0)))
    });
    let r = h.orch.check_call(&call("call-wild")).unwrap();
    assert!((0.0..=1.0).contains(&r.risk_score), "out of range: {}", r.risk_score);
    assert!(r.flags.iter().all(|f| (0.0..=1.0).contains(&f.score)));

    let h = Harness::build(|b| b.classifier(Arc::new(FixedClassifier::new(-0.4))));
    let r = h.orch.check_call(&call("call-neg")).unwrap();
    assert_eq!(r.risk_score, 0.0);
}

/// The classifier only flags above its anomaly threshold, with evidence.
#[test]
fn ml_anomaly_flag_above_threshold() {
    let quiet = Harness::scoring(0.7).orch.check_call(&call("c-quiet")).unwrap();
    assert!(!quiet.has_flag(FlagType::MlAnomaly));
    assert!((quiet.confidence - 0.9).abs() < 1e-12);

    let loud = Harness::scoring(0.72).orch.check_call(&call("c-loud")).unwrap();
    let flag = loud.flags.iter().find(|f| f.flag_type == FlagType::MlAnomaly).expect("ml flag");
    let evidence = flag.evidence.as_ref().expect("evidence");
    assert_eq!(evidence["explanations"][0], "is_short_call raised risk (+1.00)");
}

/// Disabled signals are not consulted.
#[test]
fn disabled_signals_are_skipped() {
    let rules = FraudRules {
        ml_enabled: false,
        rule_engine_enabled: false,
        ..FraudRules::default()
    };
    let h = Harness::build_with(RecordingVelocity::default(), rules, |b| {
        b.classifier(Arc::new(FixedClassifier::new(0.99)))
            .rule_engine(Arc::new(FixedRules::matching(&["x"], 0.99)))
    });
    let r = h.orch.check_call(&call("call-off")).unwrap();
    assert_eq!(r.risk_score, 0.0);
    assert_eq!(r.confidence, 0.0);
    assert!(r.approved);
}

/// A call with no destination is scored on what it has.
#[test]
fn missing_destination_degrades_to_defaults() {
    let h = Harness::build(|b| b.denylist(Arc::new(common::FailingDenylist)));
    let mut c = call("call-nodest");
    c.to_number = String::new();

    let r = h.orch.check_call(&c).unwrap();
    assert!(r.approved);
    assert_eq!(r.risk_score, 0.0);
    // Only the caller number is looked up.
    assert_eq!(r.metadata["abstained"], serde_json::json!(["denylist"]));
    assert_eq!(h.store.result_count(), 1);
}

/// Malformed input never reaches a collaborator.
#[test]
fn validation_errors_touch_nothing() {
    let h = Harness::clean();
    let mut bad = call("");
    bad.id = "  ".into();
    let err = h.orch.check_call(&bad).unwrap_err();
    assert!(err.is_validation(), "{err}");

    let err = h.orch.check_bid(&common::bid("b", f64::NAN), None).unwrap_err();
    assert!(err.is_validation(), "{err}");

    assert_eq!(h.velocity.checks.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(h.store.result_count(), 0);
}
