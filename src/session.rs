//! Per-browser session state: chat history and the current database handle.
//!
//! A session lives until the page deletes it (it does so when the tab is
//! closed or reloaded) or the process exits. Dropping a session drops its
//! history and its connection pool.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chain::{Chain, ChainInput};
use crate::database::Database;
use crate::error::AppError;
use crate::llm::LanguageModel;
use crate::message::{ChatHistory, ChatMessage};
use crate::text_to_sql_chain::TextToSqlChain;

pub struct ChatSession {
    history: ChatHistory,
    db: Option<Arc<dyn Database>>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        ChatSession {
            history: ChatHistory::seeded(),
            db: None,
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn is_connected(&self) -> bool {
        self.db.is_some()
    }

    /// Swap in a new handle. The previous one is dropped as-is.
    pub fn connect(&mut self, db: Arc<dyn Database>) {
        self.db = Some(db);
    }

    /// Run one chat turn.
    ///
    /// Blank input is ignored and returns `Ok(None)`. Otherwise the question is
    /// appended, the chain sees the whole history including it, and the answer
    /// is appended and returned. A failed chain leaves the question in place.
    pub async fn ask(
        &mut self,
        input: &str,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Option<ChatMessage>, AppError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        let db = self.db.clone().ok_or(AppError::NotConnected)?;

        self.history.push(ChatMessage::human(input));

        let chain = TextToSqlChain::new(llm, db);
        let answer = chain
            .run(ChainInput {
                question: input.to_owned(),
                chat_history: self.history.clone(),
            })
            .await?;

        let message = ChatMessage::ai(answer);
        self.history.push(message.clone());

        Ok(Some(message))
    }
}

/// In-memory sessions keyed by id. Everything is lost on restart.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ChatSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> (Uuid, Arc<Mutex<ChatSession>>) {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(ChatSession::new()));
        self.sessions.write().await.insert(id, Arc::clone(&session));
        info!(session_id = %id, "session created");
        (id, session)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Mutex<ChatSession>>, AppError> {
        let not_found = || AppError::SessionNotFound(id.to_owned());
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;

        match self.sessions.read().await.get(&uuid) {
            Some(session) => Ok(Arc::clone(session)),
            None => {
                warn!(session_id = %id, "unknown session");
                Err(not_found())
            }
        }
    }

    /// Forget a session. Returns `false` if the id was unknown.
    pub async fn remove(&self, id: &str) -> bool {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return false;
        };
        let removed = self.sessions.write().await.remove(&uuid).is_some();
        if removed {
            info!(session_id = %id, "session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
