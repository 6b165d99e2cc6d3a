//! The decision record produced by every evaluation.

use crate::types::{EntityId, EntityKind, FlagType, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One triggered signal. Owned by its parent check result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudFlag {
    pub flag_type:   FlagType,
    pub severity:    Severity,
    pub description: String,
    pub score:       f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence:    Option<serde_json::Value>,
}

impl FraudFlag {
    pub fn new(
        flag_type: FlagType,
        severity: Severity,
        description: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            flag_type,
            severity,
            description: description.into(),
            score,
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// Outcome of one fraud check.
///
/// `risk_score` only ever moves up through `raise_score`, so it always
/// equals the worst single signal seen during the evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudCheckResult {
    pub id:              String,
    pub entity_id:       EntityId,
    pub entity_kind:     EntityKind,
    pub checked_at:      DateTime<Utc>,
    pub approved:        bool,
    pub risk_score:      f64,
    pub confidence:      f64,
    pub reasons:         Vec<String>,
    pub flags:           Vec<FraudFlag>,
    pub requires_mfa:    bool,
    pub requires_review: bool,
    #[serde(default)]
    pub metadata:        BTreeMap<String, serde_json::Value>,
}

impl FraudCheckResult {
    /// A fresh, approved, zero-risk result. Evaluation mutates it from here.
    pub fn new(entity_id: impl Into<EntityId>, entity_kind: EntityKind, checked_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity_id: entity_id.into(),
            entity_kind,
            checked_at,
            approved: true,
            risk_score: 0.0,
            confidence: 0.0,
            reasons: Vec::new(),
            flags: Vec::new(),
            requires_mfa: false,
            requires_review: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Max-combine a signal score into the aggregate. Never sums.
    /// NaN is treated as no signal.
    pub fn raise_score(&mut self, score: f64) {
        if score.is_nan() {
            return;
        }
        self.risk_score = self.risk_score.max(score.clamp(0.0, 1.0));
    }

    /// Record a flag and let its score count toward the aggregate.
    pub fn add_flag(&mut self, flag: FraudFlag) {
        self.raise_score(flag.score);
        self.reasons.push(flag.description.clone());
        self.flags.push(flag);
    }

    pub fn has_flag(&self, flag_type: FlagType) -> bool {
        self.flags.iter().any(|f| f.flag_type == flag_type)
    }
}
