//! Runtime configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key (OPENAI_API_KEY)
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API (OPENAI_BASE_URL)
    pub base_url: String,

    /// Chat model used for SQL generation (TEXTQL_CHAT_MODEL)
    pub chat_model: String,

    /// Embedding model used for the corpus index (TEXTQL_EMBEDDING_MODEL)
    pub embedding_model: String,

    /// Directory holding the persistent corpus store (TEXTQL_STORE_DIR)
    pub store_dir: PathBuf,

    /// Schema artifacts retrieved per question (TEXTQL_SCHEMA_K)
    pub k_schema: usize,

    /// Example artifacts retrieved per question (TEXTQL_EXAMPLES_K)
    pub k_examples: usize,

    /// Re-generation attempts after a failed SQL extraction
    /// (TEXTQL_EXTRACTION_RETRIES)
    pub extraction_retries: usize,

    /// Timeout for generation/embedding calls (TEXTQL_REQUEST_TIMEOUT_SECS)
    pub request_timeout: Duration,

    /// Timeout for SQL execution (TEXTQL_EXECUTE_TIMEOUT_SECS)
    pub execute_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .unwrap_or_else(|_| "dummy-api-key".to_string()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            chat_model: std::env::var("TEXTQL_CHAT_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            embedding_model: std::env::var("TEXTQL_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            store_dir: env_or("TEXTQL_STORE_DIR", ".textql").into(),
            k_schema: env_parsed("TEXTQL_SCHEMA_K", 4),
            k_examples: env_parsed("TEXTQL_EXAMPLES_K", 4),
            extraction_retries: env_parsed("TEXTQL_EXTRACTION_RETRIES", 1),
            request_timeout: Duration::from_secs(env_parsed("TEXTQL_REQUEST_TIMEOUT_SECS", 60)),
            execute_timeout: Duration::from_secs(env_parsed("TEXTQL_EXECUTE_TIMEOUT_SECS", 30)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
