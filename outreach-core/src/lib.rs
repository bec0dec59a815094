pub mod config;
pub mod db;
pub mod error;
pub mod genai;
pub mod models;

pub use config::OutreachConfig;
pub use error::OutreachError;
pub use genai::{
    create_client, GeminiGenerationClient, GenerationBackend, GenerationClientConfig,
    GenerationError,
};
