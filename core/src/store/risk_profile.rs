//! Store methods for smoothed risk profiles.

use super::{kind_from_sql, ts_from_sql, ts_to_sql, RiskProfileStore, SqliteStore};
use crate::{error::RiskResult, risk_profile::RiskProfile, types::EntityKind};
use rusqlite::{params, OptionalExtension};

impl SqliteStore {
    /// Insert or overwrite. Last writer wins.
    pub fn upsert_risk_profile(&self, p: &RiskProfile) -> RiskResult<()> {
        let history = serde_json::to_string(&p.history)?;
        let attributes = serde_json::to_string(&p.attributes)?;
        self.conn().execute(
            "INSERT INTO risk_profile (
                entity_id, entity_kind, current_risk_score, fraud_count,
                last_check, history_json, attributes_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (entity_id, entity_kind) DO UPDATE SET
                current_risk_score = excluded.current_risk_score,
                fraud_count        = excluded.fraud_count,
                last_check         = excluded.last_check,
                history_json       = excluded.history_json,
                attributes_json    = excluded.attributes_json",
            params![
                p.entity_id,
                p.entity_kind.as_str(),
                p.current_risk_score,
                p.fraud_count,
                ts_to_sql(&p.last_check),
                history,
                attributes,
            ],
        )?;
        Ok(())
    }

    pub fn get_risk_profile(&self, entity_id: &str, kind: EntityKind) -> RiskResult<Option<RiskProfile>> {
        let raw = self
            .conn()
            .query_row(
                "SELECT entity_id, entity_kind, current_risk_score, fraud_count,
                        last_check, history_json, attributes_json
                 FROM risk_profile
                 WHERE entity_id = ?1 AND entity_kind = ?2",
                params![entity_id, kind.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((entity_id, kind, score, fraud_count, last_check, history, attributes)) = raw else {
            return Ok(None);
        };

        Ok(Some(RiskProfile {
            entity_id,
            entity_kind:        kind_from_sql(&kind)?,
            current_risk_score: score,
            history:            serde_json::from_str(&history)?,
            fraud_count,
            last_check:         ts_from_sql(&last_check)?,
            attributes:         serde_json::from_str(&attributes)?,
        }))
    }

    /// Number of profiled entities (for tests and the runner summary).
    pub fn risk_profile_count(&self) -> RiskResult<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM risk_profile",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl RiskProfileStore for SqliteStore {
    fn load_profile(&self, entity_id: &str, kind: EntityKind) -> RiskResult<Option<RiskProfile>> {
        self.get_risk_profile(entity_id, kind)
    }

    fn save_profile(&self, profile: &RiskProfile) -> RiskResult<()> {
        self.upsert_risk_profile(profile)
    }
}
