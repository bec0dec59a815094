//! Outreach generation pipeline
//!
//! The request engine behind the streaming generate/regenerate endpoints:
//! quota gate, input resolution, cache split, sequential batch generation,
//! persistence, and the typed event stream delivered to the transport.

pub mod batch;
pub mod cache;
pub mod diversity;
pub mod events;
pub mod persist;
pub mod prompt;
pub mod quota;
pub mod resolver;
pub mod run;
pub mod usage;

pub use events::PipelineEvent;
pub use run::{Pipeline, PipelineSettings, PreparedRun, RunMode, RunReport};
