pub mod config;
pub mod defects;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod insights;
pub mod manifest;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod sandbox;
pub mod store;

// Re-export common items
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use orchestrator::Orchestrator;
pub use store::{MemoryStore, RunStore};
