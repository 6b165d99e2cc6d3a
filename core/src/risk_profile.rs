//! Per-entity smoothed risk history and the manager that keeps it current.
//!
//! The store is the authority; the score cache is a short-lived read-through
//! copy. Load-modify-store is not serialised per entity: two concurrent
//! updates for the same entity race and the later save wins. Blocking
//! decisions never read the profile, so the race only costs one smoothing
//! step.

use crate::{
    clock::Clock,
    error::RiskResult,
    score_cache::RiskScoreCache,
    store::RiskProfileStore,
    types::{EntityId, EntityKind},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

pub const MAX_HISTORY: usize = 100;
pub const SMOOTHING_ALPHA: f64 = 0.3;
pub const SCORE_CACHE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskScoreEntry {
    pub score:       f64,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason:      Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskProfile {
    pub entity_id:          EntityId,
    pub entity_kind:        EntityKind,
    pub current_risk_score: f64,
    pub history:            VecDeque<RiskScoreEntry>,
    pub fraud_count:        u32,
    pub last_check:         DateTime<Utc>,
    #[serde(default)]
    pub attributes:         BTreeMap<String, serde_json::Value>,
}

impl RiskProfile {
    /// A profile that has never been scored, seeded so the first smoothing
    /// step lands exactly on the first observed score.
    pub fn seeded(entity_id: impl Into<EntityId>, entity_kind: EntityKind, first_score: f64, at: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_kind,
            current_risk_score: first_score.clamp(0.0, 1.0),
            history: VecDeque::with_capacity(MAX_HISTORY),
            fraud_count: 0,
            last_check: at,
            attributes: BTreeMap::new(),
        }
    }

    /// current = α·score + (1−α)·current, then append and evict.
    pub fn apply(&mut self, score: f64, at: DateTime<Utc>, reason: Option<String>) {
        let score = score.clamp(0.0, 1.0);
        self.current_risk_score = (SMOOTHING_ALPHA * score
            + (1.0 - SMOOTHING_ALPHA) * self.current_risk_score)
            .clamp(0.0, 1.0);
        self.history.push_back(RiskScoreEntry { score, recorded_at: at, reason });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        self.last_check = at;
    }
}

pub struct RiskProfileManager {
    store: Arc<dyn RiskProfileStore>,
    cache: RiskScoreCache,
    clock: Arc<dyn Clock>,
}

impl RiskProfileManager {
    pub fn new(store: Arc<dyn RiskProfileStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache: RiskScoreCache::new(chrono::Duration::seconds(SCORE_CACHE_TTL_SECS)),
            clock,
        }
    }

    /// Smoothed score for an entity. Entities never seen score 0.0.
    pub fn get(&self, entity_id: &str, kind: EntityKind) -> RiskResult<f64> {
        let now = self.clock.now();
        if let Some(score) = self.cache.get_fresh(entity_id, kind, now) {
            return Ok(score);
        }

        let score = self
            .store
            .load_profile(entity_id, kind)?
            .map_or(0.0, |p| p.current_risk_score);
        self.cache.put(entity_id, kind, score, now);
        Ok(score)
    }

    pub fn update(
        &self,
        entity_id: &str,
        kind: EntityKind,
        score: f64,
        reason: Option<String>,
    ) -> RiskResult<RiskProfile> {
        self.modify(entity_id, kind, score, |profile, now| {
            profile.apply(score, now, reason);
        })
    }

    /// Confirmed fraud: bump the count and push the score hard toward 1.0.
    pub fn record_confirmed_fraud(
        &self,
        entity_id: &str,
        kind: EntityKind,
        fraud_type: &str,
    ) -> RiskResult<RiskProfile> {
        self.modify(entity_id, kind, 1.0, |profile, now| {
            profile.fraud_count += 1;
            profile.apply(1.0, now, Some(format!("confirmed fraud: {fraud_type}")));
            profile.attributes.insert(
                "last_fraud_type".into(),
                serde_json::Value::String(fraud_type.to_string()),
            );
        })
    }

    fn modify(
        &self,
        entity_id: &str,
        kind: EntityKind,
        seed_score: f64,
        f: impl FnOnce(&mut RiskProfile, DateTime<Utc>),
    ) -> RiskResult<RiskProfile> {
        let now = self.clock.now();
        let mut profile = match self.store.load_profile(entity_id, kind)? {
            Some(p) => p,
            None    => RiskProfile::seeded(entity_id, kind, seed_score, now),
        };

        f(&mut profile, now);

        self.store.save_profile(&profile)?;
        self.cache.put(entity_id, kind, profile.current_risk_score, now);
        Ok(profile)
    }

    pub fn invalidate(&self, entity_id: &str, kind: EntityKind) {
        self.cache.invalidate(entity_id, kind);
    }
}
