//! Persisted bot state.
//!
//! The conversation, corpus and system prompt are written together as one
//! JSON object. There are no partial updates: every save rewrites the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::write_atomic;
use crate::conversation::Turn;
use crate::error::{BotError, Result};

/// The unit of durability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(alias = "conversation_context")]
    pub conversation: Vec<Turn>,
    #[serde(alias = "knowledge_base")]
    pub corpus: String,
    #[serde(alias = "custom_prompt", alias = "system_prompt")]
    pub system_prompt: String,
}

impl PersistedState {
    /// Empty conversation and corpus with the given prompt
    pub fn empty(system_prompt: impl Into<String>) -> Self {
        Self {
            conversation: Vec::new(),
            corpus: String::new(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// How [`StateFile::load_or_default`] obtained its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    /// Parsed from an existing file
    Restored,
    /// No file existed; a default was written
    Created,
    /// The file was unreadable or corrupt; a default replaced it
    Recovered,
}

/// Reads and writes the state blob at a fixed path
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize and overwrite the whole file.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| BotError::io("serialize", &self.path, std::io::Error::other(e)))?;
        write_atomic(&self.path, &bytes)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Saved state");
        Ok(())
    }

    /// Parse the file. `Ok(None)` means the file does not exist.
    pub fn load(&self) -> Result<Option<PersistedState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BotError::io("read", &self.path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BotError::Corruption {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Load the state, falling back to an empty one.
    ///
    /// A missing file is created with the default; an unreadable or corrupt
    /// file is logged and overwritten with the default so the next start is
    /// clean. Failing to write the default is logged, never fatal.
    pub fn load_or_default(&self, default_prompt: &str) -> (PersistedState, StateSource) {
        let (state, source) = match self.load() {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    turns = state.conversation.len(),
                    corpus_len = state.corpus.len(),
                    "Restored state"
                );
                return (state, StateSource::Restored);
            }
            Ok(None) => {
                info!(path = %self.path.display(), "State file not found, creating a new one");
                (PersistedState::empty(default_prompt), StateSource::Created)
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Discarding unusable state file");
                (PersistedState::empty(default_prompt), StateSource::Recovered)
            }
        };

        if let Err(e) = self.save(&state) {
            error!(path = %self.path.display(), error = %e, "Failed to write default state");
        }
        (state, source)
    }
}
