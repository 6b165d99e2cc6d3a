//! Shared test doubles and fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use risk_core::{
    check_result::FraudCheckResult,
    clock::ManualClock,
    denylist::InMemoryDenylist,
    entity::{Account, Bid, Call},
    error::{RiskError, RiskResult},
    features::FeatureBag,
    orchestrator::{FraudOrchestrator, FraudOrchestratorBuilder},
    risk_profile::RiskProfile,
    rules::{FraudRules, LiveRules},
    signal::{
        ClassifierEngine, DenylistChecker, DenylistMatch, Prediction, RuleEngine, RuleEvaluation,
        VelocityChecker, VelocityStatus,
    },
    store::{CheckResultStore, MemoryStore, RiskProfileStore},
    types::EntityKind,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 6, 14, 0, 0).unwrap()
}

// ── Fixtures ────────────────────────────────────────────────────────────────

pub const CALLER: &str = "+14155550123";

pub fn call(id: &str) -> Call {
    Call {
        id:            id.into(),
        from_number:   CALLER.into(),
        to_number:     "+12125550188".into(),
        buyer_id:      Some("buyer-001".into()),
        seller_id:     Some("seller-001".into()),
        started_at:    t0(),
        duration_secs: 120,
        carrier:       Some("verizon".into()),
    }
}

pub fn bid(id: &str, amount: f64) -> Bid {
    Bid {
        id:        id.into(),
        call_id:   "call-001".into(),
        buyer_id:  "buyer-001".into(),
        amount,
        placed_at: t0(),
    }
}

pub fn account(id: &str) -> Account {
    Account {
        id:            id.into(),
        email:         "ops@acme-leads.com".into(),
        phone:         Some("+13125550100".into()),
        company_name:  Some("Acme Leads".into()),
        created_at:    t0() - Duration::days(400),
        quality_score: Some(85.0),
    }
}

pub fn past_result(entity_id: &str, kind: EntityKind, score: f64) -> FraudCheckResult {
    let mut r = FraudCheckResult::new(entity_id, kind, t0() - Duration::days(1));
    r.raise_score(score);
    r
}

// ── Signal doubles ──────────────────────────────────────────────────────────

pub struct FailingDenylist;

impl DenylistChecker for FailingDenylist {
    fn is_denylisted(&self, _value: &str, _kind: &str) -> RiskResult<DenylistMatch> {
        Err(RiskError::collaborator("denylist", "connection refused"))
    }
}

/// Velocity double that counts checks and records every recorded action.
#[derive(Default)]
pub struct RecordingVelocity {
    pub over_limit: bool,
    pub checks:     AtomicUsize,
    pub records:    Mutex<Vec<(String, String)>>,
}

impl RecordingVelocity {
    pub fn over_limit() -> Self {
        Self { over_limit: true, ..Self::default() }
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.records.lock().unwrap().clone()
    }
}

impl VelocityChecker for RecordingVelocity {
    fn check(&self, _entity_id: &str, _action: &str) -> RiskResult<VelocityStatus> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(VelocityStatus {
            allowed: !self.over_limit,
            count:   if self.over_limit { 11 } else { 1 },
            limit:   10,
            window:  std::time::Duration::from_secs(60),
        })
    }

    fn record(&self, entity_id: &str, action: &str) -> RiskResult<()> {
        self.records
            .lock()
            .unwrap()
            .push((entity_id.to_string(), action.to_string()));
        Ok(())
    }
}

pub struct FixedClassifier {
    pub probability: f64,
    pub confidence:  f64,
}

impl FixedClassifier {
    pub fn new(probability: f64) -> Self {
        Self { probability, confidence: 0.9 }
    }
}

impl ClassifierEngine for FixedClassifier {
    fn predict(&self, _features: &FeatureBag) -> RiskResult<Prediction> {
        Ok(Prediction {
            fraud_probability: self.probability,
            confidence:        self.confidence,
            feature_weights:   [("is_short_call".to_string(), 1.0)].into(),
            explanations:      vec!["is_short_call raised risk (+1.00)".into()],
        })
    }
}

pub struct FailingClassifier;

impl ClassifierEngine for FailingClassifier {
    fn predict(&self, _features: &FeatureBag) -> RiskResult<Prediction> {
        Err(RiskError::collaborator("classifier", "model server timed out"))
    }
}

/// Blocks inside predict until the test releases it.
pub struct GatedClassifier {
    pub probability: f64,
    pub entered:     Mutex<mpsc::Sender<()>>,
    pub release:     Mutex<mpsc::Receiver<()>>,
}

impl ClassifierEngine for GatedClassifier {
    fn predict(&self, _features: &FeatureBag) -> RiskResult<Prediction> {
        self.entered.lock().unwrap().send(()).ok();
        self.release
            .lock()
            .unwrap()
            .recv_timeout(std::time::Duration::from_secs(10))
            .map_err(|e| RiskError::collaborator("classifier", e.to_string()))?;
        Ok(Prediction {
            fraud_probability: self.probability,
            confidence:        0.8,
            ..Prediction::default()
        })
    }
}

pub struct FixedRules {
    pub matched: Vec<String>,
    pub total:   f64,
}

impl FixedRules {
    pub fn none() -> Self {
        Self { matched: Vec::new(), total: 0.0 }
    }

    pub fn matching(names: &[&str], total: f64) -> Self {
        Self {
            matched: names.iter().map(|s| s.to_string()).collect(),
            total,
        }
    }
}

impl RuleEngine for FixedRules {
    fn evaluate(&self, _features: &FeatureBag) -> RiskResult<RuleEvaluation> {
        Ok(RuleEvaluation {
            matched:       !self.matched.is_empty(),
            matched_rules: self.matched.clone(),
            total_score:   self.total,
        })
    }
}

// ── Store doubles ───────────────────────────────────────────────────────────

/// Profile store that counts loads.
#[derive(Default)]
pub struct CountingProfileStore {
    pub inner: MemoryStore,
    pub loads: AtomicUsize,
}

impl CountingProfileStore {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl RiskProfileStore for CountingProfileStore {
    fn load_profile(&self, entity_id: &str, kind: EntityKind) -> RiskResult<Option<RiskProfile>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_profile(entity_id, kind)
    }

    fn save_profile(&self, profile: &RiskProfile) -> RiskResult<()> {
        self.inner.save_profile(profile)
    }
}

/// Audit store whose writes always fail.
pub struct FailingResultStore;

impl CheckResultStore for FailingResultStore {
    fn save_check_result(&self, _result: &FraudCheckResult) -> RiskResult<()> {
        Err(RiskError::Other(anyhow::anyhow!("disk full")))
    }

    fn check_history(
        &self,
        _entity_id: &str,
        _kind: EntityKind,
        _limit: usize,
    ) -> RiskResult<Vec<FraudCheckResult>> {
        Ok(Vec::new())
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

pub struct Harness {
    pub orch:     Arc<FraudOrchestrator>,
    pub store:    Arc<MemoryStore>,
    pub denylist: Arc<InMemoryDenylist>,
    pub velocity: Arc<RecordingVelocity>,
    pub clock:    Arc<ManualClock>,
}

impl Harness {
    /// Every signal wired and clean; `customize` may override any of them.
    pub fn build(customize: impl FnOnce(FraudOrchestratorBuilder) -> FraudOrchestratorBuilder) -> Self {
        Self::build_with(RecordingVelocity::default(), FraudRules::default(), customize)
    }

    pub fn build_with(
        velocity: RecordingVelocity,
        rules: FraudRules,
        customize: impl FnOnce(FraudOrchestratorBuilder) -> FraudOrchestratorBuilder,
    ) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = Arc::new(MemoryStore::new());
        let denylist = Arc::new(InMemoryDenylist::new());
        let velocity = Arc::new(velocity);
        let clock = Arc::new(ManualClock::new(t0()));

        let builder = FraudOrchestrator::with_store(Arc::new(LiveRules::new(rules)), store.clone())
            .denylist(denylist.clone())
            .velocity(velocity.clone())
            .classifier(Arc::new(FixedClassifier::new(0.0)))
            .rule_engine(Arc::new(FixedRules::none()))
            .clock(clock.clone());

        Self {
            orch: Arc::new(customize(builder).build()),
            store,
            denylist,
            velocity,
            clock,
        }
    }

    pub fn clean() -> Self {
        Self::build(|b| b)
    }

    pub fn scoring(probability: f64) -> Self {
        Self::build(|b| b.classifier(Arc::new(FixedClassifier::new(probability))))
    }
}
