//! Database access shared by the conversation ledger and the persisted
//! analysis cache.
//!
//! Every operation opens its own connection. WAL mode lets readers proceed
//! while a writer holds the lock; `busy_timeout` makes writers queue instead
//! of failing immediately.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

/// How long a connection waits on a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the SQLite-backed stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cannot create database directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid session name {0:?}")]
    InvalidSession(String),

    #[error("could not assign a sequence number in session {session:?} after {attempts} attempts")]
    SequenceConflict { session: String, attempts: u32 },

    #[error("corrupt row {id} in {table}: {reason}")]
    Corrupt {
        table: &'static str,
        id: String,
        reason: String,
    },
}

/// Handle to the on-disk database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let db = Self { path };
        let mut conn = db.connect()?;
        crate::schema::migrate(&mut conn)?;
        debug!(path = %db.path.display(), "database ready");
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh connection with WAL pragmas applied.
    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Size of the database file in bytes (0 if missing).
    pub fn file_size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/sarek.db");
        let db = Database::open(&path).unwrap();

        assert!(path.exists());
        let conn = db.connect().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(crate::schema::current_version(&conn).unwrap(), 1);
        assert!(db.file_size() > 0);
    }
}
