//! Live fraud rules. Process-wide, replaced wholesale, never patched.
//!
//! Readers take the read lock just long enough to clone the Arc; an
//! evaluation keeps that snapshot to the end even if a swap lands mid-way.
//! The lock here is separate from the score-cache lock.

use crate::error::{RiskError, RiskResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

pub const ACTION_CALL: &str = "call";
pub const ACTION_BID: &str = "bid";
pub const ACTION_ACCOUNT_CHECK: &str = "account_check";

/// Longest velocity window a rule set may configure (30 days).
pub const MAX_VELOCITY_WINDOW_SECS: u64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VelocityLimit {
    pub max_count:   u32,
    pub window_secs: u64,
}

/// What to do when the check-result audit write fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditPolicy {
    /// Return the decision anyway; mark it and count the failure.
    #[default]
    BestEffort,
    /// Fail the check with AuditWriteFailed.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudRules {
    pub velocity_limits:     BTreeMap<String, VelocityLimit>,
    /// Informational tier labels (low/medium/high/critical → lower bound).
    #[serde(default)]
    pub risk_tiers:          BTreeMap<String, f64>,
    pub ml_enabled:          bool,
    pub rule_engine_enabled: bool,
    pub require_mfa_score:   f64,
    pub auto_block_score:    f64,
    #[serde(default)]
    pub audit_policy:        AuditPolicy,
}

impl Default for FraudRules {
    fn default() -> Self {
        Self {
            velocity_limits: [
                (ACTION_CALL.to_string(),          VelocityLimit { max_count: 10, window_secs: 60 }),
                (ACTION_BID.to_string(),           VelocityLimit { max_count: 50, window_secs: 60 }),
                (ACTION_ACCOUNT_CHECK.to_string(), VelocityLimit { max_count: 5,  window_secs: 3600 }),
            ]
            .into(),
            risk_tiers: [
                ("low".to_string(),      0.0),
                ("medium".to_string(),   0.4),
                ("high".to_string(),     0.7),
                ("critical".to_string(), 0.9),
            ]
            .into(),
            ml_enabled:          true,
            rule_engine_enabled: true,
            require_mfa_score:   0.7,
            auto_block_score:    0.9,
            audit_policy:        AuditPolicy::BestEffort,
        }
    }
}

impl FraudRules {
    pub fn validate(&self) -> RiskResult<()> {
        for (name, v) in [
            ("require_mfa_score", self.require_mfa_score),
            ("auto_block_score", self.auto_block_score),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(RiskError::validation(
                    "invalid_rules",
                    format!("{name} must be within [0, 1], got {v}"),
                ));
            }
        }
        if self.require_mfa_score > self.auto_block_score {
            return Err(RiskError::validation(
                "invalid_rules",
                format!(
                    "require_mfa_score ({}) must not exceed auto_block_score ({})",
                    self.require_mfa_score, self.auto_block_score
                ),
            ));
        }
        if let Some((action, l)) = self
            .velocity_limits
            .iter()
            .find(|(_, l)| l.window_secs == 0 || l.window_secs > MAX_VELOCITY_WINDOW_SECS)
        {
            return Err(RiskError::validation(
                "invalid_rules",
                format!(
                    "velocity window for '{action}' must be within 1..={MAX_VELOCITY_WINDOW_SECS}s, got {}",
                    l.window_secs
                ),
            ));
        }
        Ok(())
    }

    /// Label for a score, taken from the highest tier bound it reaches.
    pub fn tier_for(&self, score: f64) -> Option<&str> {
        self.risk_tiers
            .iter()
            .filter(|(_, bound)| score >= **bound)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(label, _)| label.as_str())
    }
}

/// The swappable holder for the current FraudRules.
#[derive(Debug)]
pub struct LiveRules {
    current: RwLock<Arc<FraudRules>>,
    version: AtomicU64,
}

impl LiveRules {
    pub fn new(rules: FraudRules) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
            version: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<FraudRules> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Validate and swap. Returns the new version number.
    pub fn replace(&self, rules: FraudRules) -> RiskResult<u64> {
        rules.validate()?;
        let next = Arc::new(rules);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        Ok(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
