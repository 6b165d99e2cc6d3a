//! Process-local store. Used in tests and for deployments that ship
//! decisions elsewhere and only need profiles to survive the process.

use super::{CheckResultStore, RiskProfileStore};
use crate::{
    check_result::FraudCheckResult,
    error::RiskResult,
    risk_profile::RiskProfile,
    types::EntityKind,
};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    results:  Mutex<Vec<FraudCheckResult>>,
    profiles: Mutex<HashMap<(String, EntityKind), RiskProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every saved result, in save order.
    pub fn all_results(&self) -> Vec<FraudCheckResult> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn result_count(&self) -> usize {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn profile(&self, entity_id: &str, kind: EntityKind) -> Option<RiskProfile> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(entity_id.to_string(), kind))
            .cloned()
    }
}

impl CheckResultStore for MemoryStore {
    fn save_check_result(&self, result: &FraudCheckResult) -> RiskResult<()> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
        Ok(())
    }

    fn check_history(
        &self,
        entity_id: &str,
        kind: EntityKind,
        limit: usize,
    ) -> RiskResult<Vec<FraudCheckResult>> {
        let results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(results
            .iter()
            .rev()
            .filter(|r| r.entity_id == entity_id && r.entity_kind == kind)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl RiskProfileStore for MemoryStore {
    fn load_profile(&self, entity_id: &str, kind: EntityKind) -> RiskResult<Option<RiskProfile>> {
        Ok(self.profile(entity_id, kind))
    }

    fn save_profile(&self, profile: &RiskProfile) -> RiskResult<()> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((profile.entity_id.clone(), profile.entity_kind), profile.clone());
        Ok(())
    }
}
