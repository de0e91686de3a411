//! Hosted language-model clients.
//!
//! Both chain stages talk to a [`LanguageModel`]: one prompt in, one
//! completion out, awaited to the end. Sampling is fixed at temperature 0.

use std::sync::Arc;

use async_trait::async_trait;
use ollama_rs::error::OllamaError;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, LlmProvider};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("ollama error: {0}")]
    Ollama(#[from] OllamaError),

    #[error("model returned no completion")]
    EmptyCompletion,

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the model client selected by `LLM_PROVIDER`.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn LanguageModel>, LlmError> {
    match cfg.llm_provider {
        LlmProvider::Groq => {
            let api_key = cfg
                .groq_api_key
                .clone()
                .ok_or(LlmError::MissingConfig("GROQ_API_KEY"))?;
            Ok(Arc::new(GroqModel::new(
                &cfg.groq_base_url,
                api_key,
                &cfg.llm_model,
            )))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaModel::new(
            &cfg.ollama_host,
            cfg.ollama_port,
            &cfg.llm_model,
        )?)),
    }
}

// ── Groq (OpenAI-compatible chat completions) ────────────────────────────────

pub struct GroqModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl GroqModel {
    pub fn new(base_url: &str, api_key: String, model: &str) -> Self {
        GroqModel {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: model.to_owned(),
        }
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[async_trait]
impl LanguageModel for GroqModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        first_content(completion)
    }
}

fn first_content(completion: CompletionResponse) -> Result<String, LlmError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(LlmError::EmptyCompletion)
}

// ── Ollama ───────────────────────────────────────────────────────────────────

pub struct OllamaModel {
    client: Ollama,
    model: String,
}

impl OllamaModel {
    /// `host` must carry an `http://` or `https://` scheme.
    pub fn new(host: &str, port: u16, model: &str) -> Result<Self, LlmError> {
        let url = ollama_url(host, port)?;
        let client = Ollama::try_new(url.as_str())
            .map_err(|e| LlmError::InvalidConfig(format!("OLLAMA_HOST '{host}': {e}")))?;

        Ok(OllamaModel {
            client,
            model: model.to_owned(),
        })
    }
}

fn ollama_url(host: &str, port: u16) -> Result<reqwest::Url, LlmError> {
    let invalid = |reason: &str| LlmError::InvalidConfig(format!("OLLAMA_HOST '{host}': {reason}"));

    let mut url = reqwest::Url::parse(host.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid("expected http://<host> or https://<host>"));
    }
    url.set_port(Some(port))
        .map_err(|_| invalid("cannot carry a port"))?;

    Ok(url)
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_owned())
            .options(ModelOptions::default().temperature(0.0));

        let response = self.client.generate(request).await?;

        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_zero_temperature_and_single_user_message() {
        let model = GroqModel::new("https://api.groq.com/openai/v1/", "k".into(), "m");
        let body = serde_json::to_value(model.request_body("hi")).unwrap();

        assert_eq!(body["model"], "m");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(model.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn first_choice_content_is_returned_verbatim() {
        let completion: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"```sql\nSELECT 1;\n```"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(completion).unwrap(), "```sql\nSELECT 1;\n```");
    }

    fn ollama_config(host: &str) -> Config {
        let mut cfg = Config::from_env();
        cfg.llm_provider = LlmProvider::Ollama;
        cfg.ollama_host = host.to_owned();
        cfg.ollama_port = 11434;
        cfg
    }

    #[test]
    fn ollama_host_without_scheme_is_a_config_error() {
        for host in ["localhost", "localhost:11434", "ftp://localhost", ""] {
            let result = from_config(&ollama_config(host));
            assert!(
                matches!(result, Err(LlmError::InvalidConfig(_))),
                "host {host:?} should be rejected"
            );
        }
    }

    #[test]
    fn ollama_host_with_scheme_builds_a_client() {
        assert!(from_config(&ollama_config("http://localhost")).is_ok());
        assert_eq!(
            ollama_url("https://models.internal", 8443).unwrap().as_str(),
            "https://models.internal:8443/"
        );
    }

    #[test]
    fn missing_choices_is_an_error() {
        let completion: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            first_content(completion),
            Err(LlmError::EmptyCompletion)
        ));
    }
}
