//! Error types for the stimulus-graph library.
//!
//! Only boundary failures live here.  Anything that goes wrong while
//! analyzing a single file or class is recorded as data on the model.

use std::path::PathBuf;

/// Top-level error enum for the stimulus-graph library.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Project root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Grammar error: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

impl GraphError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        GraphError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type GraphResult<T> = Result<T, GraphError>;
