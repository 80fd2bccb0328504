//! mcp-scout - multi-strategy search across MCP server and AI tool catalogs
//!
//! This library provides the core search engine:
//! - Per-source extraction strategies (JSON APIs, HTML search pages,
//!   repository code search, curated markdown catalogs)
//! - Heuristic HTML/markdown parsing with structural-noise filtering
//! - Fingerprinted, TTL-bound result caching
//! - Category-level orchestration with bounded parallelism and one retry pass
//!
//! Presentation, configuration persistence and export are external
//! collaborators; the engine consumes [`config::SourceConfig`] records and
//! exposes plain serializable [`record::ResultRecord`] data.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod logging;
pub mod orchestrator;
pub mod record;
pub mod validator;

// Re-export main types for convenience
pub use crate::cache::CacheStore;
pub use crate::client::SourceClient;
pub use crate::config::{EngineConfig, RetrievalMode, SourceConfig, SourceRegistry};
pub use crate::error::{SearchError, SearchResult};
pub use crate::orchestrator::SearchOrchestrator;
pub use crate::record::ResultRecord;
pub use crate::validator::{SourceValidator, ValidationReport, ValidationStatus};
