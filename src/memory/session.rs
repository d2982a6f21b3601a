//! Named sessions and the active-session pointer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::store::{validate_session, ConversationStore, Session};
use crate::db::StoreError;

/// Session used when none is named.
pub const DEFAULT_SESSION: &str = "default";

/// Session names are exact-match and case-sensitive.
pub type SessionId = String;

struct SessionState {
    active: SessionId,
    known: HashSet<SessionId>,
}

/// Resolves session names and tracks which one is active.
///
/// In-memory state is a convenience only; turns live in the store and
/// survive [`forget`](Self::forget).
pub struct SessionManager {
    store: Arc<ConversationStore>,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self {
            store,
            state: Mutex::new(SessionState {
                active: DEFAULT_SESSION.to_string(),
                known: HashSet::new(),
            }),
        }
    }

    /// Existing or newly created session; `None` means the default one.
    pub fn resolve(&self, name: Option<&str>) -> Result<SessionId, StoreError> {
        let name = name.unwrap_or(DEFAULT_SESSION);
        validate_session(name)?;

        let known = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .known
            .contains(name);
        if !known {
            self.store.ensure_session(name)?;
            debug!(session = name, "session resolved");
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .known
                .insert(name.to_string());
        }
        Ok(name.to_string())
    }

    /// Mark the session as used now.
    pub fn touch(&self, session_id: &str) -> Result<(), StoreError> {
        self.store.touch_session(session_id)
    }

    pub fn active(&self) -> SessionId {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .clone()
    }

    /// Resolve `name` and make it the active session.
    pub fn activate(&self, name: &str) -> Result<SessionId, StoreError> {
        let id = self.resolve(Some(name))?;
        self.state.lock().unwrap_or_else(PoisonError::into_inner).active = id.clone();
        Ok(id)
    }

    /// Stored sessions, most recently active first.
    pub fn list(&self) -> Result<Vec<Session>, StoreError> {
        self.store.sessions()
    }

    /// Drop in-memory state for a session. Its turns stay stored. Returns
    /// whether anything was known about it.
    pub fn forget(&self, session_id: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let was_active = state.active == session_id;
        if was_active {
            state.active = DEFAULT_SESSION.to_string();
        }
        state.known.remove(session_id) || was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::memory::NewTurn;
    use tempfile::TempDir;

    fn manager() -> (TempDir, Arc<ConversationStore>, SessionManager) {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("memory.db")).unwrap();
        let store = Arc::new(ConversationStore::new(db));
        let manager = SessionManager::new(Arc::clone(&store));
        (temp, store, manager)
    }

    #[test]
    fn test_resolve_default_and_named() {
        let (_temp, store, manager) = manager();
        assert_eq!(manager.resolve(None).unwrap(), DEFAULT_SESSION);
        assert_eq!(manager.resolve(Some("Work")).unwrap(), "Work");
        assert!(store.session("Work").unwrap().is_some());
        assert!(store.session("work").unwrap().is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let (_temp, _store, manager) = manager();
        assert!(matches!(
            manager.resolve(Some("")),
            Err(StoreError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_activate_and_forget() {
        let (_temp, store, manager) = manager();
        assert_eq!(manager.active(), DEFAULT_SESSION);

        manager.activate("research").unwrap();
        assert_eq!(manager.active(), "research");
        store.append("research", NewTurn::user("kept")).unwrap();

        assert!(manager.forget("research"));
        assert_eq!(manager.active(), DEFAULT_SESSION);
        assert_eq!(store.get_turns("research", ..).unwrap().len(), 1);
        assert!(!manager.forget("research"));
    }

    #[test]
    fn test_list_orders_by_activity() {
        let (_temp, _store, manager) = manager();
        manager.resolve(Some("old")).unwrap();
        manager.resolve(Some("new")).unwrap();
        manager.touch("old").unwrap();

        let names: Vec<_> = manager.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(names, vec!["old", "new"]);
    }
}
