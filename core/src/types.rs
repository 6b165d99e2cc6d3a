//! Shared primitive types used across the risk core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable identifier for any checked entity (call id, buyer id, number...).
pub type EntityId = String;

/// What kind of entity a check or profile is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Call,
    Bid,
    Account,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call    => "call",
            Self::Bid     => "bid",
            Self::Account => "account",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "call"    => Some(Self::Call),
            "bid"     => Some(Self::Bid),
            "account" => Some(Self::Account),
            _         => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal produced a flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    Blacklist,
    Velocity,
    MlAnomaly,
    Pattern,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}
