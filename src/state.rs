//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::llm::LanguageModel;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Model client shared by every session and both chain stages.
    pub llm: Arc<dyn LanguageModel>,
    pub sessions: Arc<SessionStore>,
}
