//! Signal provider contracts.
//!
//! RULE: The orchestrator only ever talks to signal sources through these
//! traits. An Err from any of them means "this source abstains for this
//! evaluation", never "fail the check".

use crate::{error::RiskResult, features::FeatureBag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DenylistMatch {
    pub matched: bool,
    pub reason:  String,
}

impl DenylistMatch {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn hit(reason: impl Into<String>) -> Self {
        Self { matched: true, reason: reason.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VelocityStatus {
    pub allowed: bool,
    pub count:   u32,
    pub limit:   u32,
    pub window:  Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub fraud_probability: f64,
    pub confidence:        f64,
    pub feature_weights:   BTreeMap<String, f64>,
    pub explanations:      Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleEvaluation {
    pub matched:       bool,
    pub matched_rules: Vec<String>,
    pub total_score:   f64,
}

/// Membership query against the platform denylist.
/// `kind` names the identifier space: "phone", "email", "buyer".
pub trait DenylistChecker: Send + Sync {
    fn is_denylisted(&self, value: &str, kind: &str) -> RiskResult<DenylistMatch>;
}

pub trait VelocityChecker: Send + Sync {
    fn check(&self, entity_id: &str, action: &str) -> RiskResult<VelocityStatus>;
    fn record(&self, entity_id: &str, action: &str) -> RiskResult<()>;
}

pub trait ClassifierEngine: Send + Sync {
    fn predict(&self, features: &FeatureBag) -> RiskResult<Prediction>;
}

pub trait RuleEngine: Send + Sync {
    fn evaluate(&self, features: &FeatureBag) -> RiskResult<RuleEvaluation>;
}
