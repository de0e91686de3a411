//! Server configuration, loaded from environment variables at startup.
//!
//! `.env` is read by `main` before [`Config::from_env`] runs, so values placed
//! there behave exactly like real environment variables.

use crate::database::ConnectionSettings;

/// Which hosted model backend answers the prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown LLM provider '{other}'")),
        }
    }
}

/// Runtime configuration for the chat server.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:8501"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    pub llm_provider: LlmProvider,

    /// Model identifier shared by both chain stages.
    pub llm_model: String,

    /// Required when `llm_provider` is [`LlmProvider::Groq`].
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,

    pub ollama_host: String,
    pub ollama_port: u16,

    /// Values pre-filled in the connection sidebar.
    pub default_connection: ConnectionSettings,

    /// Problems found while reading the environment. Logged once tracing is up.
    pub warnings: Vec<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut warnings = Vec::new();
        let llm_provider = match provider_from(std::env::var("LLM_PROVIDER").ok()) {
            Ok(provider) => provider,
            Err(e) => {
                warnings.push(format!("LLM_PROVIDER: {e}; falling back to 'groq'"));
                LlmProvider::Groq
            }
        };

        let default_model = match llm_provider {
            LlmProvider::Groq => "llama-3.2-90b-text-preview",
            LlmProvider::Ollama => "llama3.2:latest",
        };

        Self {
            bind_address: env_or("CHAT_MYSQL_BIND", "127.0.0.1:8501"),
            log_level: env_or("CHAT_MYSQL_LOG", "info"),
            log_json: std::env::var("CHAT_MYSQL_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            llm_provider,
            llm_model: env_or("LLM_MODEL", default_model),
            groq_api_key: std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()),
            groq_base_url: env_or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            ollama_host: env_or("OLLAMA_HOST", "http://localhost"),
            ollama_port: parse_env("OLLAMA_PORT", 11434),
            default_connection: ConnectionSettings {
                host: env_or("MYSQL_HOST", "localhost"),
                port: env_or("MYSQL_PORT", "3306"),
                user: env_or("MYSQL_USER", "root"),
                password: env_or("MYSQL_PASSWORD", "root"),
                database: env_or("MYSQL_DATABASE", "classicmodels"),
            },
            warnings,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

/// Unset or blank means the default provider; anything else must parse.
fn provider_from(raw: Option<String>) -> Result<LlmProvider, String> {
    match raw {
        Some(v) if !v.trim().is_empty() => v.parse(),
        _ => Ok(LlmProvider::Groq),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
