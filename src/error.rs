use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextqlError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generation backend returned no content")]
    EmptyResponse,

    #[error("No SQL statement found: {0}")]
    NoStatement(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for TextqlError {
    fn from(err: polars::error::PolarsError) -> Self {
        TextqlError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TextqlError>;
