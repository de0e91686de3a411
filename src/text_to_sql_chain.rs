use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::chain::{Chain, ChainInput};
use crate::database::Database;
use crate::error::ChainError;
use crate::llm::LanguageModel;
use crate::prompts::{answer_prompt, sql_query_prompt};

/// Question -> SQL -> result -> answer, over one model and one database.
pub struct TextToSqlChain {
    client: Arc<dyn LanguageModel>,
    db: Arc<dyn Database>,
}

#[async_trait]
impl Chain for TextToSqlChain {
    async fn run(&self, input: ChainInput) -> Result<String, ChainError> {
        let schema = self.db.table_info().await?;
        let history = input.chat_history.transcript();

        let sql_query = self
            .generate_query(&schema, &history, &input.question)
            .await?;

        info!(sql = %sql_query, "sql generated");

        let data = self.db.run(&sql_query).await?;
        debug!(rows = %data, "query executed");

        let prompt = answer_prompt(&schema, &history, &sql_query, &input.question, &data);
        let answer = self.client.complete(&prompt).await?;

        Ok(answer)
    }
}

impl TextToSqlChain {
    pub fn new(client: Arc<dyn LanguageModel>, db: Arc<dyn Database>) -> Self {
        TextToSqlChain { client, db }
    }

    /// The completion is used as the query exactly as returned.
    async fn generate_query(
        &self,
        schema: &str,
        history: &str,
        question: &str,
    ) -> Result<String, ChainError> {
        let prompt = sql_query_prompt(schema, history, question);

        Ok(self.client.complete(&prompt).await?)
    }
}
