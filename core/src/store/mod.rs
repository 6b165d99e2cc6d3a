//! Persistence for check results and risk profiles.
//!
//! RULE: Only the store module talks to the database.
//! The orchestrator and profile manager go through the two traits below,
//! so SQLite, the in-memory store and test doubles are interchangeable.

use crate::{
    check_result::FraudCheckResult,
    error::{RiskError, RiskResult},
    risk_profile::RiskProfile,
    types::EntityKind,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, PoisonError};

mod check_result;
mod memory;
mod risk_profile;

pub use memory::MemoryStore;

/// Durable audit log of every decision.
pub trait CheckResultStore: Send + Sync {
    fn save_check_result(&self, result: &FraudCheckResult) -> RiskResult<()>;

    /// Most recent results for an entity of the given kind, newest first.
    /// Ids are only unique within a kind.
    fn check_history(
        &self,
        entity_id: &str,
        kind: EntityKind,
        limit: usize,
    ) -> RiskResult<Vec<FraudCheckResult>>;
}

/// Durable per-entity risk history.
pub trait RiskProfileStore: Send + Sync {
    /// Ok(None) when the entity has never been profiled.
    fn load_profile(&self, entity_id: &str, kind: EntityKind) -> RiskResult<Option<RiskProfile>>;
    fn save_profile(&self, profile: &RiskProfile) -> RiskResult<()>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteStore {
    pub fn open(path: &str) -> RiskResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RiskResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn), path: None })
    }

    /// Reopen a new connection to the same database.
    /// In-memory databases come back empty.
    pub fn reopen(&self) -> RiskResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None    => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RiskResult<()> {
        self.conn()
            .execute_batch(include_str!("../../../migrations/001_risk_core.sql"))?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Column helpers ───────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_sql(raw: &str) -> RiskResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RiskError::Other(anyhow::anyhow!("bad timestamp '{raw}': {e}")))
}

fn kind_from_sql(raw: &str) -> RiskResult<EntityKind> {
    EntityKind::parse(raw)
        .ok_or_else(|| RiskError::Other(anyhow::anyhow!("unknown entity kind '{raw}'")))
}
