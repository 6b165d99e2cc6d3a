//! Domain entities handed to the orchestrator by the routing and bidding
//! services. These are inputs only; the core never persists them.

use crate::{
    error::{RiskError, RiskResult},
    types::{EntityId, EntityKind},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound call offered to the exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub id:            EntityId,
    pub from_number:   String,
    #[serde(default)]
    pub to_number:     String,
    #[serde(default)]
    pub buyer_id:      Option<EntityId>,
    #[serde(default)]
    pub seller_id:     Option<EntityId>,
    pub started_at:    DateTime<Utc>,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub carrier:       Option<String>,
}

/// A buyer's bid on a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id:        EntityId,
    pub call_id:   EntityId,
    pub buyer_id:  EntityId,
    pub amount:    f64,
    pub placed_at: DateTime<Utc>,
}

/// A buyer or seller account on the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id:            EntityId,
    pub email:         String,
    #[serde(default)]
    pub phone:         Option<String>,
    #[serde(default)]
    pub company_name:  Option<String>,
    pub created_at:    DateTime<Utc>,
    /// Platform quality score on a 0–100 scale. None for unrated accounts.
    #[serde(default)]
    pub quality_score: Option<f64>,
}

/// A confirmed-fraud report from an analyst or downstream system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudReport {
    pub entity_id:   EntityId,
    pub entity_kind: EntityKind,
    pub fraud_type:  String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reported_by: Option<String>,
}

fn require_id(field: &str, value: &str) -> RiskResult<()> {
    if value.trim().is_empty() {
        return Err(RiskError::validation("missing_field", format!("{field} must not be empty")));
    }
    Ok(())
}

impl Call {
    /// A missing destination is allowed; its features fall back to defaults.
    pub fn validate(&self) -> RiskResult<()> {
        require_id("call.id", &self.id)?;
        require_id("call.from_number", &self.from_number)
    }
}

impl Bid {
    pub fn validate(&self) -> RiskResult<()> {
        require_id("bid.id", &self.id)?;
        require_id("bid.buyer_id", &self.buyer_id)?;
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(RiskError::validation(
                "invalid_amount",
                format!("bid.amount must be a finite non-negative number, got {}", self.amount),
            ));
        }
        Ok(())
    }
}

impl Account {
    pub fn validate(&self) -> RiskResult<()> {
        require_id("account.id", &self.id)?;
        require_id("account.email", &self.email)
    }
}

impl FraudReport {
    pub fn validate(&self) -> RiskResult<()> {
        require_id("report.entity_id", &self.entity_id)?;
        require_id("report.fraud_type", &self.fraud_type)
    }
}
