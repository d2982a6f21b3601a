//! One question-and-answer round against the oracle with session memory.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::memory::{
    ContextSelector, ConversationStore, NewTurn, SessionId, SessionManager, StoreError, TurnId,
};
use crate::oracle::{Oracle, OracleError};
use crate::prompt;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub session_id: SessionId,
    pub model: String,
    pub text: String,
    pub context_turns: usize,
    pub user_turn: TurnId,
    pub assistant_turn: TurnId,
}

/// Wires sessions, context selection, routing and the oracle together.
pub struct Assistant<O: Oracle> {
    oracle: O,
    store: Arc<ConversationStore>,
    sessions: SessionManager,
    selector: ContextSelector,
    config: Config,
}

impl<O: Oracle> Assistant<O> {
    pub fn new(oracle: O, store: Arc<ConversationStore>, config: Config) -> Self {
        Self {
            oracle,
            sessions: SessionManager::new(Arc::clone(&store)),
            selector: ContextSelector::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Ask `query` in `session` (default session when `None`).
    ///
    /// `model` overrides keyword routing. Nothing is written to the ledger
    /// unless the oracle answers; its errors are returned as they are.
    pub fn ask(
        &self,
        session: Option<&str>,
        query: &str,
        model: Option<&str>,
    ) -> Result<Answer, AssistantError> {
        let session_id = self.sessions.resolve(session)?;
        let context =
            self.selector
                .select_context(&session_id, query, self.config.context_limit)?;
        let model = model
            .map(str::to_string)
            .unwrap_or_else(|| prompt::route_model(query, &self.config.routing).to_string());
        debug!(session = %session_id, model = %model, context = context.len(), "asking");

        let full_prompt = prompt::assemble(&model, &context, query);
        let text = self.oracle.generate(&full_prompt, &context, &model)?;

        let (user_turn, assistant_turn) = self.store.append_exchange(
            &session_id,
            NewTurn::user(query),
            NewTurn::assistant(text.clone()).with_model(model.clone()),
        )?;
        self.sessions.touch(&session_id)?;
        info!(session = %session_id, seq = assistant_turn.seq, "exchange recorded");

        Ok(Answer {
            session_id,
            model,
            text,
            context_turns: context.len(),
            user_turn,
            assistant_turn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::memory::ConversationTurn;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records prompts and replies with a canned answer.
    struct Scripted {
        prompts: Mutex<Vec<(String, String, usize)>>,
    }

    impl Oracle for Scripted {
        fn generate(
            &self,
            prompt: &str,
            context: &[ConversationTurn],
            model: &str,
        ) -> Result<String, OracleError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), model.to_string(), context.len()));
            Ok(format!("answer {}", self.prompts.lock().unwrap().len()))
        }
    }

    fn store(temp: &TempDir) -> Arc<ConversationStore> {
        Arc::new(ConversationStore::new(
            Database::open(temp.path().join("a.db")).unwrap(),
        ))
    }

    #[test]
    fn test_ask_records_exchange_and_uses_context() {
        let temp = TempDir::new().unwrap();
        let oracle = Scripted {
            prompts: Mutex::new(Vec::new()),
        };
        let assistant = Assistant::new(oracle, store(&temp), Config::default());

        let first = assistant.ask(None, "hello there", None).unwrap();
        assert_eq!(first.session_id, "default");
        assert_eq!(first.model, "mistral");
        assert_eq!(first.context_turns, 0);
        assert_eq!((first.user_turn.seq, first.assistant_turn.seq), (1, 2));

        let second = assistant.ask(None, "debug this", None).unwrap();
        assert_eq!(second.model, "codellama");
        assert_eq!(second.context_turns, 2);
        assert_eq!(second.assistant_turn.seq, 4);

        let turns = assistant.store().get_turns("default", ..).unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[3].text, "answer 2");
        assert_eq!(turns[3].model.as_deref(), Some("codellama"));
    }

    #[test]
    fn test_default_context_starts_on_a_question() {
        let temp = TempDir::new().unwrap();
        let oracle = Scripted {
            prompts: Mutex::new(Vec::new()),
        };
        let store = store(&temp);
        let assistant = Assistant::new(oracle, Arc::clone(&store), Config::default());

        for i in 0..5 {
            assistant.ask(None, &format!("question {}", i), None).unwrap();
        }
        let answer = assistant.ask(None, "one more", None).unwrap();
        assert_eq!(answer.context_turns, 6);

        let context = ContextSelector::new(store)
            .select_context("default", "next", Config::default().context_limit)
            .unwrap();
        assert_eq!(context[0].role, crate::memory::Role::User);
        assert_eq!(context[0].text, "question 3");

        let prompts = assistant.oracle.prompts.lock().unwrap();
        let (last_prompt, _, _) = prompts.last().unwrap();
        let history = last_prompt
            .split("Previous conversation context:\n")
            .nth(1)
            .unwrap();
        assert!(history.starts_with("User: question 2"));
    }

    #[test]
    fn test_model_override() {
        let temp = TempDir::new().unwrap();
        let oracle = Scripted {
            prompts: Mutex::new(Vec::new()),
        };
        let assistant = Assistant::new(oracle, store(&temp), Config::default());
        let answer = assistant.ask(Some("x"), "debug", Some("phi3")).unwrap();
        assert_eq!(answer.model, "phi3");
    }
}
