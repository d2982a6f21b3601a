//! The append-only conversation ledger.

use std::collections::HashMap;
use std::ops::{Bound, RangeBounds};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::{Database, StoreError};

/// Attempts at claiming a sequence number before giving up.
const MAX_SEQUENCE_ATTEMPTS: u32 = 5;

/// Result limit for [`ConversationStore::search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Who wrote a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A turn before it has been assigned a sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: Role,
    pub text: String,
    pub source_ref: Option<String>,
    pub model: Option<String>,
}

impl NewTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            source_ref: None,
            model: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(text)
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_source(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }
}

/// Position of a stored turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TurnId {
    pub session_id: String,
    pub seq: u64,
}

/// A stored turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub text: String,
    pub source_ref: Option<String>,
    pub model: Option<String>,
}

impl ConversationTurn {
    pub fn id(&self) -> TurnId {
        TurnId {
            session_id: self.session_id.clone(),
            seq: self.seq,
        }
    }
}

/// A session row with its turn count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub created: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub turn_count: u64,
    pub description: Option<String>,
}

/// Ledger totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub turns: u64,
    pub sessions: u64,
    pub analyses: u64,
    pub database_bytes: u64,
}

/// Reject names that cannot identify a session.
pub(crate) fn validate_session(session_id: &str) -> Result<(), StoreError> {
    if session_id.trim().is_empty() {
        return Err(StoreError::InvalidSession(session_id.to_string()));
    }
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Escape LIKE wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Inclusive `[lo, hi]` for a sequence range; `None` when empty.
fn seq_bounds(range: &impl RangeBounds<u64>) -> Option<(i64, i64)> {
    let lo = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.checked_add(1)?,
        Bound::Unbounded => 0,
    };
    let hi = match range.end_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.checked_sub(1)?,
        Bound::Unbounded => i64::MAX as u64,
    };
    let lo = i64::try_from(lo).ok()?;
    let hi = i64::try_from(hi).unwrap_or(i64::MAX);
    (lo <= hi).then_some((lo, hi))
}

const TURN_COLUMNS: &str = "session_id, seq, timestamp, role, text, source_ref, model";

fn turn_from_row(r: &Row<'_>) -> rusqlite::Result<ConversationTurn> {
    let role: String = r.get(3)?;
    let role = Role::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown role {:?}", role).into(),
        )
    })?;
    Ok(ConversationTurn {
        session_id: r.get(0)?,
        seq: r.get::<_, i64>(1)? as u64,
        timestamp: r.get(2)?,
        role,
        text: r.get(4)?,
        source_ref: r.get(5)?,
        model: r.get(6)?,
    })
}

fn session_from_row(r: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: r.get(0)?,
        created: r.get(1)?,
        last_active: r.get(2)?,
        description: r.get(3)?,
        turn_count: r.get::<_, i64>(4)? as u64,
    })
}

/// SQLite-backed ledger of conversation turns, partitioned by session.
///
/// Sequence numbers are assigned under a per-session in-process lock inside
/// an IMMEDIATE transaction; the `(session_id, seq)` unique key catches any
/// writer outside this process, and such a conflict is retried.
///
/// The lock map holds weak handles: a session's lock lives only while an
/// append or purge holds it, and dead handles are pruned on the next
/// lookup.
pub struct ConversationStore {
    db: Database,
    sequence_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            sequence_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn sequence_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .sequence_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(session_id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.sequence_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Append one turn; returns its assigned position.
    pub fn append(&self, session_id: &str, turn: NewTurn) -> Result<TurnId, StoreError> {
        let mut ids = self.append_all(session_id, std::slice::from_ref(&turn))?;
        ids.pop().ok_or_else(|| StoreError::SequenceConflict {
            session: session_id.to_string(),
            attempts: 0,
        })
    }

    /// Append a user turn and the assistant's reply in one transaction.
    pub fn append_exchange(
        &self,
        session_id: &str,
        user: NewTurn,
        assistant: NewTurn,
    ) -> Result<(TurnId, TurnId), StoreError> {
        let ids = self.append_all(session_id, &[user, assistant])?;
        match <[TurnId; 2]>::try_from(ids) {
            Ok([u, a]) => Ok((u, a)),
            Err(_) => Err(StoreError::SequenceConflict {
                session: session_id.to_string(),
                attempts: 0,
            }),
        }
    }

    fn append_all(&self, session_id: &str, turns: &[NewTurn]) -> Result<Vec<TurnId>, StoreError> {
        validate_session(session_id)?;

        let lock = self.sequence_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        for attempt in 1..=MAX_SEQUENCE_ATTEMPTS {
            match self.try_append(session_id, turns) {
                Ok(ids) => return Ok(ids),
                Err(StoreError::Database(err)) if is_unique_violation(&err) => {
                    warn!(session = session_id, attempt, "sequence conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        Err(StoreError::SequenceConflict {
            session: session_id.to_string(),
            attempts: MAX_SEQUENCE_ATTEMPTS,
        })
    }

    fn try_append(&self, session_id: &str, turns: &[NewTurn]) -> Result<Vec<TurnId>, StoreError> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        tx.execute(
            "INSERT OR IGNORE INTO sessions (id, created, last_active) VALUES (?1, ?2, ?2)",
            rusqlite::params![session_id, now],
        )?;
        let last: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM turns WHERE session_id = ?1",
            rusqlite::params![session_id],
            |r| r.get(0),
        )?;

        let mut ids = Vec::with_capacity(turns.len());
        for (offset, turn) in turns.iter().enumerate() {
            let seq = last + 1 + offset as i64;
            tx.execute(
                "INSERT INTO turns (session_id, seq, timestamp, role, text, source_ref, model)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    session_id,
                    seq,
                    now,
                    turn.role.as_str(),
                    &turn.text,
                    &turn.source_ref,
                    &turn.model,
                ],
            )?;
            ids.push(TurnId {
                session_id: session_id.to_string(),
                seq: seq as u64,
            });
        }
        tx.commit()?;

        debug!(session = session_id, first = last + 1, count = turns.len(), "appended turns");
        Ok(ids)
    }

    /// Turns whose sequence number falls in `range`, in sequence order.
    pub fn get_turns(
        &self,
        session_id: &str,
        range: impl RangeBounds<u64>,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let Some((lo, hi)) = seq_bounds(&range) else {
            return Ok(Vec::new());
        };
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM turns
             WHERE session_id = ?1 AND seq BETWEEN ?2 AND ?3
             ORDER BY seq",
            TURN_COLUMNS
        ))?;
        let turns = stmt
            .query_map(rusqlite::params![session_id, lo, hi], turn_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(turns)
    }

    /// The last `limit` turns of a session, newest first.
    pub fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM turns WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2",
            TURN_COLUMNS
        ))?;
        let turns = stmt
            .query_map(
                rusqlite::params![session_id, limit as i64],
                turn_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(turns)
    }

    /// Case-insensitive substring search across every session, most recent
    /// first, at most [`DEFAULT_SEARCH_LIMIT`] results.
    pub fn search(&self, query: &str) -> Result<Vec<ConversationTurn>, StoreError> {
        self.search_in(query, None, DEFAULT_SEARCH_LIMIT)
    }

    /// Search, optionally restricted to one session.
    ///
    /// Matching uses SQLite `LIKE`, which folds ASCII case only.
    pub fn search_in(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM turns
             WHERE text LIKE ?1 ESCAPE '\\'
               AND (?2 IS NULL OR session_id = ?2)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
            TURN_COLUMNS
        ))?;
        let turns = stmt
            .query_map(
                rusqlite::params![like_pattern(query), session_id, limit as i64],
                turn_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(turns)
    }

    /// Delete a session and all of its turns. Returns the number of turns
    /// removed.
    pub fn purge_session(&self, session_id: &str) -> Result<usize, StoreError> {
        let lock = self.sequence_lock(session_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            "DELETE FROM turns WHERE session_id = ?1",
            rusqlite::params![session_id],
        )?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", rusqlite::params![session_id])?;
        tx.commit()?;

        debug!(session = session_id, removed, "purged session");
        Ok(removed)
    }

    /// Create the session row if it does not exist.
    pub fn ensure_session(&self, session_id: &str) -> Result<(), StoreError> {
        validate_session(session_id)?;
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO sessions (id, created, last_active) VALUES (?1, ?2, ?2)",
            rusqlite::params![session_id, Utc::now()],
        )?;
        Ok(())
    }

    /// Set `last_active` to now, creating the session if needed.
    pub fn touch_session(&self, session_id: &str) -> Result<(), StoreError> {
        validate_session(session_id)?;
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO sessions (id, created, last_active) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET last_active = excluded.last_active",
            rusqlite::params![session_id, Utc::now()],
        )?;
        Ok(())
    }

    pub fn session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.db.connect()?;
        let session = conn
            .query_row(
                "SELECT s.id, s.created, s.last_active, s.description,
                        (SELECT COUNT(*) FROM turns t WHERE t.session_id = s.id)
                 FROM sessions s WHERE s.id = ?1",
                rusqlite::params![session_id],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Every session with its turn count, most recently active first.
    pub fn sessions(&self) -> Result<Vec<Session>, StoreError> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.created, s.last_active, s.description, COUNT(t.id)
             FROM sessions s
             LEFT JOIN turns t ON t.session_id = s.id
             GROUP BY s.id
             ORDER BY s.last_active DESC, s.id",
        )?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn stats(&self) -> Result<MemoryStats, StoreError> {
        let conn = self.db.connect()?;
        let count = |table: &str| -> rusqlite::Result<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get::<_, i64>(0)
            })
            .map(|n| n as u64)
        };
        Ok(MemoryStats {
            turns: count("turns")?,
            sessions: count("sessions")?,
            analyses: count("analysis_cache")?,
            database_bytes: self.db.file_size(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ConversationStore) {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("memory.db")).unwrap();
        (temp, ConversationStore::new(db))
    }

    #[test]
    fn test_sequence_starts_at_one_per_session() {
        let (_temp, store) = store();
        let a1 = store.append("alpha", NewTurn::user("hi")).unwrap();
        let a2 = store.append("alpha", NewTurn::assistant("hello")).unwrap();
        let b1 = store.append("beta", NewTurn::user("hey")).unwrap();

        assert_eq!(a1.seq, 1);
        assert_eq!(a2.seq, 2);
        assert_eq!(b1.seq, 1);
    }

    #[test]
    fn test_append_exchange_is_consecutive() {
        let (_temp, store) = store();
        store.append("s", NewTurn::user("first")).unwrap();
        let (u, a) = store
            .append_exchange(
                "s",
                NewTurn::user("q"),
                NewTurn::assistant("a").with_model("mistral"),
            )
            .unwrap();
        assert_eq!((u.seq, a.seq), (2, 3));

        let turns = store.get_turns("s", 2..).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].model.as_deref(), Some("mistral"));
    }

    #[test]
    fn test_get_turns_ranges() {
        let (_temp, store) = store();
        for i in 0..5 {
            store.append("s", NewTurn::user(format!("t{}", i))).unwrap();
        }
        let seqs = |turns: Vec<ConversationTurn>| turns.iter().map(|t| t.seq).collect::<Vec<_>>();

        assert_eq!(seqs(store.get_turns("s", ..).unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(seqs(store.get_turns("s", 2..4).unwrap()), vec![2, 3]);
        assert_eq!(seqs(store.get_turns("s", 4..=9).unwrap()), vec![4, 5]);
        assert!(store.get_turns("s", 3..3).unwrap().is_empty());
        assert!(store.get_turns("s", ..0).unwrap().is_empty());
        assert!(store.get_turns("missing", ..).unwrap().is_empty());
    }

    #[test]
    fn test_recent_turns_newest_first() {
        let (_temp, store) = store();
        for i in 0..4 {
            store.append("s", NewTurn::user(format!("t{}", i))).unwrap();
        }
        let recent = store.recent_turns("s", 2).unwrap();
        assert_eq!(recent.iter().map(|t| t.seq).collect::<Vec<_>>(), vec![4, 3]);
        assert!(store.recent_turns("s", 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_is_literal_and_case_insensitive() {
        let (_temp, store) = store();
        store.append("s", NewTurn::user("Rust is 100% fun")).unwrap();
        store.append("s", NewTurn::user("rust_lang rules")).unwrap();
        store.append("s", NewTurn::user("python")).unwrap();

        assert_eq!(store.search("RUST").unwrap().len(), 2);
        assert_eq!(store.search("100%").unwrap().len(), 1);
        assert_eq!(store.search("t_l").unwrap().len(), 1);
        assert!(store.search("0% f").unwrap().len() == 1);
        assert!(store.search("%").unwrap().len() == 1);

        let newest = store.search("rust").unwrap();
        assert_eq!(newest[0].text, "rust_lang rules");
    }

    #[test]
    fn test_search_limit_and_session_filter() {
        let (_temp, store) = store();
        for i in 0..25 {
            store.append("a", NewTurn::user(format!("note {}", i))).unwrap();
        }
        store.append("b", NewTurn::user("note from b")).unwrap();

        assert_eq!(store.search("note").unwrap().len(), DEFAULT_SEARCH_LIMIT);
        let only_b = store.search_in("note", Some("b"), 50).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].session_id, "b");
    }

    #[test]
    fn test_purge_removes_whole_session() {
        let (_temp, store) = store();
        store.append("keep", NewTurn::user("x")).unwrap();
        store.append("drop", NewTurn::user("y")).unwrap();
        store.append("drop", NewTurn::user("z")).unwrap();

        assert_eq!(store.purge_session("drop").unwrap(), 2);
        assert!(store.get_turns("drop", ..).unwrap().is_empty());
        assert!(store.session("drop").unwrap().is_none());
        assert_eq!(store.get_turns("keep", ..).unwrap().len(), 1);

        // A purged session starts over.
        assert_eq!(store.append("drop", NewTurn::user("again")).unwrap().seq, 1);
    }

    #[test]
    fn test_sequence_locks_do_not_accumulate() {
        let (_temp, store) = store();
        for i in 0..50 {
            let session = format!("s{}", i);
            store.append(&session, NewTurn::user("x")).unwrap();
            store.purge_session(&session).unwrap();
        }
        assert!(store.tracked_locks() <= 1);

        // A lock held by one caller is shared with the next.
        let held = store.sequence_lock("busy");
        assert!(Arc::ptr_eq(&held, &store.sequence_lock("busy")));
    }

    #[test]
    fn test_empty_session_rejected() {
        let (_temp, store) = store();
        assert!(matches!(
            store.append("  ", NewTurn::user("x")),
            Err(StoreError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_sessions_and_stats() {
        let (_temp, store) = store();
        store.append("one", NewTurn::user("a")).unwrap();
        store.append("two", NewTurn::user("b")).unwrap();
        store.append("two", NewTurn::user("c")).unwrap();
        store.touch_session("one").unwrap();

        let sessions = store.sessions().unwrap();
        assert_eq!(sessions[0].id, "one");
        assert_eq!(sessions[1].turn_count, 2);

        let stats = store.stats().unwrap();
        assert_eq!(stats.turns, 3);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.analyses, 0);
        assert!(stats.database_bytes > 0);
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("a%b_c\\"), "%a\\%b\\_c\\\\%");
    }
}
