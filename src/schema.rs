//! SQLite schema and forward-only migrations.

/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every open, before checking the version.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the v1 schema.
///
/// - `sessions`: one row per named conversation session.
/// - `turns`: the append-only conversation ledger. `(session_id, seq)` is
///   unique so two writers can never claim the same sequence number.
/// - `analysis_cache`: persisted analysis results keyed by path, validated
///   by content hash and size.
///
/// Timestamps are stored as UTC text, which sorts chronologically.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id          TEXT    PRIMARY KEY,
        created     TEXT    NOT NULL,
        last_active TEXT    NOT NULL,
        description TEXT
    ) STRICT;

    CREATE TABLE IF NOT EXISTS turns (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id  TEXT    NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        seq         INTEGER NOT NULL,
        timestamp   TEXT    NOT NULL,
        role        TEXT    NOT NULL CHECK(role IN ('user', 'assistant')),
        text        TEXT    NOT NULL,
        source_ref  TEXT,
        model       TEXT,
        UNIQUE (session_id, seq)
    ) STRICT;

    CREATE INDEX IF NOT EXISTS idx_turns_timestamp ON turns(timestamp);

    CREATE TABLE IF NOT EXISTS analysis_cache (
        path     TEXT    PRIMARY KEY,
        hash     TEXT    NOT NULL,
        size     INTEGER NOT NULL,
        language TEXT    NOT NULL,
        data     TEXT    NOT NULL,
        created  TEXT    NOT NULL
    ) STRICT;
";

/// Latest schema version.
pub const CURRENT_VERSION: i64 = 1;

/// Migrate the database to the latest version. Idempotent.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version = current_version(db)?;

    if version < 1 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V1_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    Ok(())
}

/// Version recorded in `schema_version`, `0` for a fresh database.
pub fn current_version(db: &rusqlite::Connection) -> rusqlite::Result<i64> {
    db.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let mut db = rusqlite::Connection::open_in_memory().unwrap();
        migrate(&mut db).unwrap();
        migrate(&mut db).unwrap();

        assert_eq!(current_version(&db).unwrap(), CURRENT_VERSION);
        let rows: i64 = db
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_turn_sequence_is_unique_per_session() {
        let mut db = rusqlite::Connection::open_in_memory().unwrap();
        migrate(&mut db).unwrap();
        db.execute(
            "INSERT INTO sessions (id, created, last_active) VALUES ('s', 'now', 'now')",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO turns (session_id, seq, timestamp, role, text)
                      VALUES ('s', 1, 'now', 'user', 'hi')";
        db.execute(insert, []).unwrap();
        assert!(db.execute(insert, []).is_err());
    }

    #[test]
    fn test_role_is_checked() {
        let mut db = rusqlite::Connection::open_in_memory().unwrap();
        migrate(&mut db).unwrap();
        db.execute(
            "INSERT INTO sessions (id, created, last_active) VALUES ('s', 'now', 'now')",
            [],
        )
        .unwrap();
        let result = db.execute(
            "INSERT INTO turns (session_id, seq, timestamp, role, text)
             VALUES ('s', 1, 'now', 'system', 'hi')",
            [],
        );
        assert!(result.is_err());
    }
}
