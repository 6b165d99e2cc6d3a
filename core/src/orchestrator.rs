//! Fraud decision orchestrator, the hot-path entry point.
//!
//! EVALUATION ORDER (identical for calls, bids and accounts):
//!   1. Denylist gate      (a match ends the evaluation: score 1.0, blocked)
//!   2. Velocity check     (action is recorded whether or not it passes)
//!   3. Classifier         (only when ml_enabled)
//!   4. Rule engine        (only when rule_engine_enabled)
//!   5. Entity-specific checks (bid quality/amount, account email/phone/history)
//!   6. Threshold policy   (once, after every signal is in)
//!   7. Persist the check result
//!   8. Update the risk profile (calls and bids only)
//!
//! RULES:
//!   - The aggregate score is the max of the signal scores, never a sum.
//!   - A collaborator error or an unset collaborator means that signal
//!     abstains. Only malformed input fails a check.
//!   - Each evaluation reads the live rules once and keeps that snapshot.

use crate::{
    check_result::{FraudCheckResult, FraudFlag},
    clock::{Clock, SystemClock},
    entity::{Account, Bid, Call, FraudReport},
    error::{RiskError, RiskResult},
    features::{self, FeatureBag},
    risk_profile::{RiskProfile, RiskProfileManager},
    rules::{AuditPolicy, FraudRules, LiveRules, ACTION_ACCOUNT_CHECK, ACTION_BID, ACTION_CALL},
    signal::{ClassifierEngine, DenylistChecker, RuleEngine, VelocityChecker},
    store::{CheckResultStore, RiskProfileStore},
    types::{EntityKind, FlagType, Severity},
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

// ── Constants ────────────────────────────────────────────────────────────────

const VELOCITY_FLAG_SCORE: f64 = 0.8;
const ML_ANOMALY_THRESHOLD: f64 = 0.7;
const REVIEW_SCORE: f64 = 0.6;

const BID_MIN_BUYER_QUALITY: f64 = 50.0;
const BID_LOW_QUALITY_SCORE: f64 = 0.5;
const BID_TEST_AMOUNT_SCORE: f64 = 0.3;

const ACCOUNT_FREE_MAIL_SCORE: f64 = 0.5;
const ACCOUNT_BAD_PHONE_SCORE: f64 = 0.4;
const ACCOUNT_HISTORY_WINDOW: usize = 10;
const ACCOUNT_HISTORY_HIGH_SCORE: f64 = 0.8;
const ACCOUNT_HISTORY_MAX_HIGH: usize = 2;
const ACCOUNT_HISTORY_FLAG_SCORE: f64 = 0.8;

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct FraudOrchestratorBuilder {
    rules:       Arc<LiveRules>,
    results:     Arc<dyn CheckResultStore>,
    profiles:    Arc<dyn RiskProfileStore>,
    denylist:    Option<Arc<dyn DenylistChecker>>,
    velocity:    Option<Arc<dyn VelocityChecker>>,
    classifier:  Option<Arc<dyn ClassifierEngine>>,
    rule_engine: Option<Arc<dyn RuleEngine>>,
    clock:       Arc<dyn Clock>,
}

impl FraudOrchestratorBuilder {
    pub fn denylist(mut self, d: Arc<dyn DenylistChecker>) -> Self {
        self.denylist = Some(d);
        self
    }

    pub fn velocity(mut self, v: Arc<dyn VelocityChecker>) -> Self {
        self.velocity = Some(v);
        self
    }

    pub fn classifier(mut self, c: Arc<dyn ClassifierEngine>) -> Self {
        self.classifier = Some(c);
        self
    }

    pub fn rule_engine(mut self, r: Arc<dyn RuleEngine>) -> Self {
        self.rule_engine = Some(r);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> FraudOrchestrator {
        FraudOrchestrator {
            profiles:       RiskProfileManager::new(self.profiles, Arc::clone(&self.clock)),
            rules:          self.rules,
            results:        self.results,
            denylist:       self.denylist,
            velocity:       self.velocity,
            classifier:     self.classifier,
            rule_engine:    self.rule_engine,
            clock:          self.clock,
            audit_failures: AtomicU64::new(0),
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

pub struct FraudOrchestrator {
    rules:          Arc<LiveRules>,
    results:        Arc<dyn CheckResultStore>,
    profiles:       RiskProfileManager,
    denylist:       Option<Arc<dyn DenylistChecker>>,
    velocity:       Option<Arc<dyn VelocityChecker>>,
    classifier:     Option<Arc<dyn ClassifierEngine>>,
    rule_engine:    Option<Arc<dyn RuleEngine>>,
    clock:          Arc<dyn Clock>,
    audit_failures: AtomicU64,
}

impl FraudOrchestrator {
    /// Start wiring an orchestrator. Signal providers are optional; any left
    /// unset simply abstain.
    pub fn builder(
        rules: Arc<LiveRules>,
        results: Arc<dyn CheckResultStore>,
        profiles: Arc<dyn RiskProfileStore>,
    ) -> FraudOrchestratorBuilder {
        FraudOrchestratorBuilder {
            rules,
            results,
            profiles,
            denylist: None,
            velocity: None,
            classifier: None,
            rule_engine: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder over one store that keeps both check results and profiles.
    pub fn with_store<S>(rules: Arc<LiveRules>, store: Arc<S>) -> FraudOrchestratorBuilder
    where
        S: CheckResultStore + RiskProfileStore + 'static,
    {
        Self::builder(rules, store.clone(), store)
    }

    // ── Entry points ─────────────────────────────────────────────

    pub fn check_call(&self, call: &Call) -> RiskResult<FraudCheckResult> {
        call.validate()?;
        let rules = self.rules.snapshot();
        let mut result = FraudCheckResult::new(&call.id, EntityKind::Call, self.clock.now());

        let ids = [(call.from_number.as_str(), "phone"), (call.to_number.as_str(), "phone")];
        if self.denylist_gate(&mut result, &ids) {
            return self.finish_blocked(result, &rules);
        }

        let bag = features::extract_call(call);
        self.velocity_signal(&mut result, &call.from_number, ACTION_CALL);
        self.collect_model_signals(&mut result, &rules, &bag);

        self.apply_thresholds(&mut result, &rules);
        self.persist(&mut result, &rules)?;
        self.update_profile(&call.from_number, EntityKind::Call, &result);
        self.log_decision(&result);
        Ok(result)
    }

    /// `account` is the buyer's account when the caller has it loaded;
    /// without it the buyer-quality check abstains.
    pub fn check_bid(&self, bid: &Bid, account: Option<&Account>) -> RiskResult<FraudCheckResult> {
        bid.validate()?;
        let rules = self.rules.snapshot();
        let now = self.clock.now();
        let mut result = FraudCheckResult::new(&bid.id, EntityKind::Bid, now);

        if self.denylist_gate(&mut result, &[(bid.buyer_id.as_str(), "buyer")]) {
            return self.finish_blocked(result, &rules);
        }

        let bag = features::extract_bid(bid, account, now);
        self.velocity_signal(&mut result, &bid.buyer_id, ACTION_BID);
        self.collect_model_signals(&mut result, &rules, &bag);
        self.bid_checks(&mut result, bid, account);

        self.apply_thresholds(&mut result, &rules);
        self.persist(&mut result, &rules)?;
        self.update_profile(&bid.buyer_id, EntityKind::Bid, &result);
        self.log_decision(&result);
        Ok(result)
    }

    pub fn check_account(&self, account: &Account) -> RiskResult<FraudCheckResult> {
        account.validate()?;
        let rules = self.rules.snapshot();
        let now = self.clock.now();
        let mut result = FraudCheckResult::new(&account.id, EntityKind::Account, now);

        let mut ids = vec![(account.email.as_str(), "email")];
        if let Some(phone) = account.phone.as_deref() {
            ids.push((phone, "phone"));
        }
        if self.denylist_gate(&mut result, &ids) {
            return self.finish_blocked(result, &rules);
        }

        let bag = features::extract_account(account, now);
        self.velocity_signal(&mut result, &account.id, ACTION_ACCOUNT_CHECK);
        self.collect_model_signals(&mut result, &rules, &bag);
        self.account_checks(&mut result, account);

        self.apply_thresholds(&mut result, &rules);
        self.persist(&mut result, &rules)?;
        self.log_decision(&result);
        Ok(result)
    }

    /// Smoothed score for an entity, served from cache within the TTL.
    pub fn get_risk_score(&self, entity_id: &str, kind: EntityKind) -> RiskResult<f64> {
        if entity_id.trim().is_empty() {
            return Err(RiskError::validation("missing_field", "entity_id must not be empty"));
        }
        self.profiles.get(entity_id, kind)
    }

    /// Ingest a confirmed-fraud report and push the entity's score toward 1.0.
    pub fn report_fraud(&self, report: &FraudReport) -> RiskResult<RiskProfile> {
        report.validate()?;
        let profile = self.profiles.record_confirmed_fraud(
            &report.entity_id,
            report.entity_kind,
            &report.fraud_type,
        )?;
        log::info!(
            "fraud report: entity={} kind={} type={} fraud_count={} score={:.3}",
            report.entity_id,
            report.entity_kind,
            report.fraud_type,
            profile.fraud_count,
            profile.current_risk_score,
        );
        Ok(profile)
    }

    /// Swap in a whole new rule set. Evaluations already running keep the
    /// rules they started with.
    pub fn update_rules(&self, rules: FraudRules) -> RiskResult<u64> {
        let version = self.rules.replace(rules)?;
        log::info!("fraud rules replaced: version={version}");
        Ok(version)
    }

    pub fn rules(&self) -> Arc<FraudRules> {
        self.rules.snapshot()
    }

    pub fn rules_version(&self) -> u64 {
        self.rules.version()
    }

    /// Check results whose audit write failed since startup.
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    // ── Signals ──────────────────────────────────────────────────

    /// True when any identifier is denylisted. On a match the result already
    /// carries the single critical flag and score 1.0.
    fn denylist_gate(&self, result: &mut FraudCheckResult, ids: &[(&str, &str)]) -> bool {
        let Some(denylist) = &self.denylist else {
            return false;
        };

        for (value, kind) in ids {
            if value.trim().is_empty() {
                continue;
            }
            match denylist.is_denylisted(value, kind) {
                Ok(m) if m.matched => {
                    result.add_flag(
                        FraudFlag::new(
                            FlagType::Blacklist,
                            Severity::Critical,
                            format!("{kind} {value} is denylisted: {}", m.reason),
                            1.0,
                        )
                        .with_evidence(json!({ "identifier": value, "kind": kind, "reason": m.reason })),
                    );
                    return true;
                }
                Ok(_) => {}
                Err(e) => abstain(result, "denylist", &e),
            }
        }
        false
    }

    fn velocity_signal(&self, result: &mut FraudCheckResult, entity_id: &str, action: &str) {
        let Some(velocity) = &self.velocity else {
            return;
        };

        match velocity.check(entity_id, action) {
            Ok(status) if !status.allowed => {
                result.add_flag(
                    FraudFlag::new(
                        FlagType::Velocity,
                        Severity::High,
                        format!(
                            "{action} velocity exceeded: {} in {}s (limit {})",
                            status.count,
                            status.window.as_secs(),
                            status.limit
                        ),
                        VELOCITY_FLAG_SCORE,
                    )
                    .with_evidence(json!({
                        "count": status.count,
                        "limit": status.limit,
                        "window_secs": status.window.as_secs(),
                    })),
                );
            }
            Ok(_) => {}
            Err(e) => abstain(result, "velocity", &e),
        }

        if let Err(e) = velocity.record(entity_id, action) {
            log::warn!("check={} velocity record failed for {entity_id}/{action}: {e}", result.id);
        }
    }

    fn collect_model_signals(&self, result: &mut FraudCheckResult, rules: &FraudRules, bag: &FeatureBag) {
        if rules.ml_enabled {
            self.classifier_signal(result, bag);
        }
        if rules.rule_engine_enabled {
            self.rule_engine_signal(result, bag);
        }
    }

    fn classifier_signal(&self, result: &mut FraudCheckResult, bag: &FeatureBag) {
        let Some(classifier) = &self.classifier else {
            return;
        };

        let prediction = match classifier.predict(bag) {
            Ok(p) => p,
            Err(e) => return abstain(result, "classifier", &e),
        };

        let p = prediction.fraud_probability.clamp(0.0, 1.0);
        result.raise_score(p);
        result.confidence = prediction.confidence.clamp(0.0, 1.0);
        result.metadata.insert("ml_probability".into(), json!(p));

        if p > ML_ANOMALY_THRESHOLD {
            result.add_flag(
                FraudFlag::new(
                    FlagType::MlAnomaly,
                    severity_for(p),
                    format!("classifier flagged anomaly (p={p:.2})"),
                    p,
                )
                .with_evidence(json!({
                    "explanations": prediction.explanations,
                    "feature_weights": prediction.feature_weights,
                })),
            );
        }
    }

    fn rule_engine_signal(&self, result: &mut FraudCheckResult, bag: &FeatureBag) {
        let Some(engine) = &self.rule_engine else {
            return;
        };

        let eval = match engine.evaluate(bag) {
            Ok(e) => e,
            Err(e) => return abstain(result, "rule_engine", &e),
        };

        let total = eval.total_score.clamp(0.0, 1.0);
        for rule in &eval.matched_rules {
            result.add_flag(FraudFlag::new(
                FlagType::Pattern,
                severity_for(total),
                format!("matched rule: {rule}"),
                total,
            ));
        }
        result.raise_score(total);
    }

    fn bid_checks(&self, result: &mut FraudCheckResult, bid: &Bid, account: Option<&Account>) {
        if let Some(quality) = account.and_then(|a| a.quality_score) {
            if quality < BID_MIN_BUYER_QUALITY {
                result.add_flag(
                    FraudFlag::new(
                        FlagType::Pattern,
                        Severity::Medium,
                        format!("buyer quality score {quality:.0} below {BID_MIN_BUYER_QUALITY:.0}"),
                        BID_LOW_QUALITY_SCORE,
                    )
                    .with_evidence(json!({ "quality_score": quality })),
                );
            }
        }

        if features::is_suspicious_test_amount(bid.amount) {
            result.add_flag(
                FraudFlag::new(
                    FlagType::Pattern,
                    Severity::Low,
                    format!("bid amount {:.2} matches a known test amount", bid.amount),
                    BID_TEST_AMOUNT_SCORE,
                )
                .with_evidence(json!({ "amount": bid.amount })),
            );
        }
    }

    fn account_checks(&self, result: &mut FraudCheckResult, account: &Account) {
        if features::is_suspicious_email(&account.email) {
            result.add_flag(FraudFlag::new(
                FlagType::Pattern,
                Severity::Medium,
                format!("email {} uses a throwaway mail provider", account.email),
                ACCOUNT_FREE_MAIL_SCORE,
            ));
        }

        if let Some(phone) = account.phone.as_deref() {
            if !features::is_valid_phone(phone) {
                result.add_flag(FraudFlag::new(
                    FlagType::Pattern,
                    Severity::Medium,
                    format!("phone {phone} is not a valid number"),
                    ACCOUNT_BAD_PHONE_SCORE,
                ));
            }
        }

        match self.results.check_history(&account.id, EntityKind::Account, ACCOUNT_HISTORY_WINDOW) {
            Ok(history) => {
                let high = history
                    .iter()
                    .filter(|r| r.risk_score > ACCOUNT_HISTORY_HIGH_SCORE)
                    .count();
                if high > ACCOUNT_HISTORY_MAX_HIGH {
                    result.add_flag(
                        FraudFlag::new(
                            FlagType::Pattern,
                            Severity::High,
                            format!("{high} of the last {} checks scored high risk", history.len()),
                            ACCOUNT_HISTORY_FLAG_SCORE,
                        )
                        .with_evidence(json!({ "high_risk_checks": high, "window": history.len() })),
                    );
                }
            }
            Err(e) => abstain(result, "check_history", &e),
        }
    }

    // ── Decision and bookkeeping ─────────────────────────────────

    fn apply_thresholds(&self, result: &mut FraudCheckResult, rules: &FraudRules) {
        let score = result.risk_score;
        result.requires_mfa = score >= rules.require_mfa_score;
        result.approved = score < rules.auto_block_score;
        result.requires_review = score >= REVIEW_SCORE && score < rules.auto_block_score;

        if !result.approved {
            result.reasons.push(format!(
                "risk score {score:.2} at or above auto-block threshold {:.2}",
                rules.auto_block_score
            ));
        }
        if let Some(tier) = rules.tier_for(score) {
            result.metadata.insert("risk_tier".into(), json!(tier));
        }
    }

    fn finish_blocked(&self, mut result: FraudCheckResult, rules: &FraudRules) -> RiskResult<FraudCheckResult> {
        result.risk_score = 1.0;
        result.approved = false;
        result.requires_mfa = false;
        result.requires_review = false;
        self.persist(&mut result, rules)?;
        log::warn!(
            "check={} entity={} kind={} blocked by denylist",
            result.id, result.entity_id, result.entity_kind
        );
        Ok(result)
    }

    fn persist(&self, result: &mut FraudCheckResult, rules: &FraudRules) -> RiskResult<()> {
        let Err(e) = self.results.save_check_result(result) else {
            return Ok(());
        };

        self.audit_failures.fetch_add(1, Ordering::Relaxed);
        log::error!(
            "check={} entity={} audit write failed ({:?}): {e}",
            result.id, result.entity_id, rules.audit_policy
        );
        match rules.audit_policy {
            AuditPolicy::BestEffort => {
                result.metadata.insert("audit_persisted".into(), json!(false));
                Ok(())
            }
            AuditPolicy::Strict => Err(RiskError::AuditWriteFailed {
                check_id: result.id.clone(),
                reason:   e.to_string(),
            }),
        }
    }

    fn update_profile(&self, subject: &str, kind: EntityKind, result: &FraudCheckResult) {
        let reason = result
            .reasons
            .first()
            .cloned()
            .unwrap_or_else(|| format!("check {}", result.id));
        if let Err(e) = self.profiles.update(subject, kind, result.risk_score, Some(reason)) {
            log::warn!("check={} profile update failed for {kind} {subject}: {e}", result.id);
        }
    }

    fn log_decision(&self, result: &FraudCheckResult) {
        log::debug!(
            "check={} entity={} kind={} score={:.3} approved={} mfa={} review={} flags={}",
            result.id,
            result.entity_id,
            result.entity_kind,
            result.risk_score,
            result.approved,
            result.requires_mfa,
            result.requires_review,
            result.flags.len(),
        );
    }
}

/// Note an abstaining signal on the result and move on.
fn abstain(result: &mut FraudCheckResult, source: &'static str, err: &RiskError) {
    log::warn!("check={} {source} abstained: {err}", result.id);
    let entry = result
        .metadata
        .entry("abstained".into())
        .or_insert_with(|| json!([]));
    if let Some(list) = entry.as_array_mut() {
        list.push(json!(source));
    }
}

fn severity_for(score: f64) -> Severity {
    match score {
        s if s >= 0.9 => Severity::Critical,
        s if s >= 0.7 => Severity::High,
        s if s >= 0.4 => Severity::Medium,
        _             => Severity::Low,
    }
}
