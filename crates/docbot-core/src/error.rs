//! Error types for the docbot core

use std::path::PathBuf;
use thiserror::Error;

use crate::llm::LlmError;

/// Core error types
#[derive(Error, Debug)]
pub enum BotError {
    /// A file read or write failed.
    #[error("IO error during {op} on {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted state file exists but could not be parsed.
    #[error("Corrupted state file {}: {source}", path.display())]
    Corruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The model collaborator failed; no state was changed.
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] LlmError),

    /// Input rejected before any state mutation.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl BotError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this is a validation failure that should be shown verbatim.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, BotError>;
