use async_trait::async_trait;

use crate::error::ChainError;
use crate::message::ChatHistory;

/// What one user turn feeds into a chain.
#[derive(Debug, Clone)]
pub struct ChainInput {
    pub question: String,
    pub chat_history: ChatHistory,
}

#[async_trait]
pub trait Chain: Send + Sync {
    async fn run(&self, input: ChainInput) -> Result<String, ChainError>;
}
