//! Analysis results persisted in SQLite across runs.

use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::analysis::AnalysisResult;
use crate::db::{Database, StoreError};
use crate::fingerprint::Fingerprint;

/// The `analysis_cache` table.
///
/// Rows are keyed by path and only served when the stored hash, size and
/// language match the request.
#[derive(Debug, Clone)]
pub struct PersistedAnalyses {
    db: Database,
}

impl PersistedAnalyses {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stored result for this exact content analyzed as `language`, if any.
    ///
    /// A row whose payload no longer deserializes is reported as
    /// [`StoreError::Corrupt`].
    pub fn load(
        &self,
        fingerprint: &Fingerprint,
        language: &str,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        let conn = self.db.connect()?;
        let path = fingerprint.path.to_string_lossy().to_string();

        let row: Option<(String, i64, String, String)> = conn
            .query_row(
                "SELECT hash, size, language, data FROM analysis_cache WHERE path = ?1",
                rusqlite::params![&path],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;

        let Some((hash, size, stored_language, data)) = row else {
            return Ok(None);
        };
        if !fingerprint.matches(&hash, size as u64) || stored_language != language {
            return Ok(None);
        }

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                table: "analysis_cache",
                id: path,
                reason: e.to_string(),
            })
    }

    /// Insert or replace the row for the fingerprint's path.
    pub fn store(&self, fingerprint: &Fingerprint, result: &AnalysisResult) -> Result<(), StoreError> {
        let data = serde_json::to_string(result).map_err(|e| StoreError::Corrupt {
            table: "analysis_cache",
            id: fingerprint.path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO analysis_cache (path, hash, size, language, data, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path)
             DO UPDATE SET hash = excluded.hash,
                           size = excluded.size,
                           language = excluded.language,
                           data = excluded.data,
                           created = excluded.created",
            rusqlite::params![
                fingerprint.path.to_string_lossy(),
                &fingerprint.hash,
                fingerprint.size as i64,
                &result.language,
                data,
                Utc::now(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Number of stored rows.
    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.db.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM analysis_cache", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    /// Delete every row. Returns the number removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let conn = self.db.connect()?;
        Ok(conn.execute("DELETE FROM analysis_cache", [])?)
    }
}
