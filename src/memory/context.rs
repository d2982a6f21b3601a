//! Choosing which past turns accompany a new query.

use std::sync::Arc;

use super::store::{ConversationStore, ConversationTurn};
use crate::db::StoreError;

/// Selects context turns by recency.
///
/// `new_query` is accepted for future relevance ranking but does not
/// influence the selection.
pub struct ContextSelector {
    store: Arc<ConversationStore>,
}

impl ContextSelector {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self { store }
    }

    /// The most recent `budget` turns of the session, oldest first. A zero
    /// budget returns nothing without reading the store.
    pub fn select_context(
        &self,
        session_id: &str,
        _new_query: &str,
        budget: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        if budget == 0 {
            return Ok(Vec::new());
        }
        let mut turns = self.store.recent_turns(session_id, budget)?;
        turns.reverse();
        Ok(turns)
    }
}
