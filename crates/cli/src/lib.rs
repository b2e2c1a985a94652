//! CLI and IO Layer
//!
//! Command-line interface, sled-backed stub cache and project scanning.

pub mod cli;
pub mod commands;
pub mod config;
pub mod project;
pub mod storage;

// Re-exports
pub use cli::Cli;
pub use config::IndexerConfig;
pub use project::{CacheStats, ProjectIndexResult, ProjectIndexer, ScannedUnit};
pub use storage::{CacheMetadata, StubCache};
