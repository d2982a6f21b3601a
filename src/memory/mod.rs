//! Conversation memory.
//!
//! A durable, append-only ledger of turns partitioned by session
//! ([`ConversationStore`]), named sessions with an active pointer
//! ([`SessionManager`]) and recency-based context selection
//! ([`ContextSelector`]).

mod context;
mod session;
mod store;

pub use context::ContextSelector;
pub use session::{SessionId, SessionManager, DEFAULT_SESSION};
pub use store::{
    ConversationStore, ConversationTurn, MemoryStats, NewTurn, Role, Session, TurnId,
    DEFAULT_SEARCH_LIMIT,
};

pub use crate::db::StoreError;
