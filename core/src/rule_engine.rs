//! Threshold rules over named features, loaded from config.
//!
//! Rule authoring is someone else's job; this engine only evaluates a flat
//! list of `feature <op> value` predicates.

use crate::{
    error::RiskResult,
    features::FeatureBag,
    signal::{RuleEngine, RuleEvaluation},
    types::EntityKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Comparison {
    fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt  => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Lt  => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::Eq  => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternRule {
    pub name:      String,
    /// Restrict to one entity kind. None applies to every bag that has the feature.
    #[serde(default)]
    pub applies_to: Option<EntityKind>,
    pub feature:   String,
    pub op:        Comparison,
    pub value:     f64,
    pub score:     f64,
}

#[derive(Debug, Clone, Default)]
pub struct StaticRuleEngine {
    rules: Vec<PatternRule>,
}

impl StaticRuleEngine {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }
}

impl RuleEngine for StaticRuleEngine {
    /// Matched rule scores add up, capped at 1.0.
    fn evaluate(&self, features: &FeatureBag) -> RiskResult<RuleEvaluation> {
        let kind = features.kind();
        let values = features.numeric();
        let mut out = RuleEvaluation::default();

        for rule in &self.rules {
            if rule.applies_to.is_some_and(|k| k != kind) {
                continue;
            }
            let Some(v) = values.get(rule.feature.as_str()) else { continue };
            if rule.op.holds(*v, rule.value) {
                out.matched_rules.push(rule.name.clone());
                out.total_score += rule.score;
            }
        }

        out.matched = !out.matched_rules.is_empty();
        out.total_score = out.total_score.clamp(0.0, 1.0);
        Ok(out)
    }
}
