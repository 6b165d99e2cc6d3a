//! Short-TTL cache of smoothed risk scores, keyed by (entity, kind).
//! Has its own lock; it never shares one with the live rules.

use crate::types::EntityKind;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Copy)]
struct CachedScore {
    score:     f64,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Entries {
    scores:     HashMap<(String, EntityKind), CachedScore>,
    last_sweep: Option<DateTime<Utc>>,
}

/// Expired entries are swept on `put`, at most once per TTL, so the map
/// holds no more than two TTLs' worth of distinct entities.
#[derive(Debug)]
pub struct RiskScoreCache {
    ttl:     Duration,
    entries: RwLock<Entries>,
}

impl RiskScoreCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// The cached score if it is younger than the TTL at `now`.
    pub fn get_fresh(&self, entity_id: &str, kind: EntityKind, now: DateTime<Utc>) -> Option<f64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .scores
            .get(&(entity_id.to_string(), kind))
            .filter(|c| now - c.cached_at < self.ttl)
            .map(|c| c.score)
    }

    pub fn put(&self, entity_id: &str, kind: EntityKind, score: f64, now: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.last_sweep.map_or(true, |t| now - t >= self.ttl) {
            let ttl = self.ttl;
            entries.scores.retain(|_, c| now - c.cached_at < ttl);
            entries.last_sweep = Some(now);
        }
        entries
            .scores
            .insert((entity_id.to_string(), kind), CachedScore { score, cached_at: now });
    }

    pub fn invalidate(&self, entity_id: &str, kind: EntityKind) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .scores
            .remove(&(entity_id.to_string(), kind));
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
