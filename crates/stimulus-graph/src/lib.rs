//! stimulus-graph: static analysis of Stimulus controllers.
//!
//! This crate parses a project's JavaScript/TypeScript sources with
//! tree-sitter, links imports across files and installed packages, resolves
//! controller inheritance, and publishes merged controller definitions,
//! registrations, and detected packages as an immutable snapshot.  Editor
//! features and query tools read that snapshot; nothing here renders
//! diagnostics or speaks a wire protocol.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod project;
pub mod query;

pub use config::AnalyzerConfig;
pub use errors::{GraphError, GraphResult};
pub use project::{Project, RefreshOutcome};
pub use query::Snapshot;
