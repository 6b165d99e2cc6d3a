//! In-process denylist. The authoritative list lives elsewhere; this is the
//! local mirror the exchange loads at startup and patches as entries arrive.

use crate::{
    error::RiskResult,
    signal::{DenylistChecker, DenylistMatch},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenylistEntry {
    pub kind:   String,
    pub value:  String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct InMemoryDenylist {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl InMemoryDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[DenylistEntry]) -> Self {
        let list = Self::new();
        for e in entries {
            list.add(&e.kind, &e.value, &e.reason);
        }
        list
    }

    pub fn add(&self, kind: &str, value: &str, reason: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(kind, value), reason.to_string());
    }

    pub fn remove(&self, kind: &str, value: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key(kind, value))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(kind: &str, value: &str) -> (String, String) {
    (kind.trim().to_ascii_lowercase(), value.trim().to_ascii_lowercase())
}

impl DenylistChecker for InMemoryDenylist {
    fn is_denylisted(&self, value: &str, kind: &str) -> RiskResult<DenylistMatch> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(match entries.get(&key(kind, value)) {
            Some(reason) => DenylistMatch::hit(reason.clone()),
            None         => DenylistMatch::clear(),
        })
    }
}
