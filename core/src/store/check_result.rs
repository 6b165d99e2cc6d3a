//! Store methods for the fraud check audit trail.

use super::{kind_from_sql, ts_from_sql, ts_to_sql, CheckResultStore, SqliteStore};
use crate::{check_result::FraudCheckResult, error::RiskResult, types::EntityKind};
use rusqlite::params;

/// A fraud_check_result row as it comes off the wire, before JSON decoding.
struct CheckResultRow {
    check_id:        String,
    entity_id:       String,
    entity_kind:     String,
    checked_at:      String,
    approved:        bool,
    risk_score:      f64,
    confidence:      f64,
    requires_mfa:    bool,
    requires_review: bool,
    reasons_json:    String,
    flags_json:      String,
    metadata_json:   String,
}

impl CheckResultRow {
    fn decode(self) -> RiskResult<FraudCheckResult> {
        Ok(FraudCheckResult {
            id:              self.check_id,
            entity_id:       self.entity_id,
            entity_kind:     kind_from_sql(&self.entity_kind)?,
            checked_at:      ts_from_sql(&self.checked_at)?,
            approved:        self.approved,
            risk_score:      self.risk_score,
            confidence:      self.confidence,
            reasons:         serde_json::from_str(&self.reasons_json)?,
            flags:           serde_json::from_str(&self.flags_json)?,
            requires_mfa:    self.requires_mfa,
            requires_review: self.requires_review,
            metadata:        serde_json::from_str(&self.metadata_json)?,
        })
    }
}

impl SqliteStore {
    pub fn insert_check_result(&self, r: &FraudCheckResult) -> RiskResult<()> {
        let reasons = serde_json::to_string(&r.reasons)?;
        let flags = serde_json::to_string(&r.flags)?;
        let metadata = serde_json::to_string(&r.metadata)?;
        self.conn().execute(
            "INSERT INTO fraud_check_result (
                check_id, entity_id, entity_kind, checked_at, approved, risk_score,
                confidence, requires_mfa, requires_review, reasons_json, flags_json, metadata_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                r.id,
                r.entity_id,
                r.entity_kind.as_str(),
                ts_to_sql(&r.checked_at),
                r.approved,
                r.risk_score,
                r.confidence,
                r.requires_mfa,
                r.requires_review,
                reasons,
                flags,
                metadata,
            ],
        )?;
        Ok(())
    }

    pub fn recent_check_results(
        &self,
        entity_id: &str,
        kind: EntityKind,
        limit: usize,
    ) -> RiskResult<Vec<FraudCheckResult>> {
        let rows = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "SELECT check_id, entity_id, entity_kind, checked_at, approved, risk_score,
                        confidence, requires_mfa, requires_review, reasons_json, flags_json, metadata_json
                 FROM fraud_check_result
                 WHERE entity_id = ?1 AND entity_kind = ?2
                 ORDER BY checked_at DESC, seq DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![entity_id, kind.as_str(), limit as i64], |row| {
                    Ok(CheckResultRow {
                        check_id:        row.get(0)?,
                        entity_id:       row.get(1)?,
                        entity_kind:     row.get(2)?,
                        checked_at:      row.get(3)?,
                        approved:        row.get(4)?,
                        risk_score:      row.get(5)?,
                        confidence:      row.get(6)?,
                        requires_mfa:    row.get(7)?,
                        requires_review: row.get(8)?,
                        reasons_json:    row.get(9)?,
                        flags_json:      row.get(10)?,
                        metadata_json:   row.get(11)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(CheckResultRow::decode).collect()
    }

    /// Number of persisted check results (for tests and the runner summary).
    pub fn check_result_count(&self) -> RiskResult<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM fraud_check_result",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl CheckResultStore for SqliteStore {
    fn save_check_result(&self, result: &FraudCheckResult) -> RiskResult<()> {
        self.insert_check_result(result)
    }

    fn check_history(
        &self,
        entity_id: &str,
        kind: EntityKind,
        limit: usize,
    ) -> RiskResult<Vec<FraudCheckResult>> {
        self.recent_check_results(entity_id, kind, limit)
    }
}
