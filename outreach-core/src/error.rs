use thiserror::Error;

use crate::genai::GenerationError;

#[derive(Error, Debug)]
pub enum OutreachError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Daily generation limit reached ({used}/{limit})")]
    QuotaExceeded { limit: i64, used: i64 },

    #[error("Candidate profile has no highlight text")]
    MissingProfile,

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Other error: {0}")]
    Other(String),
}
