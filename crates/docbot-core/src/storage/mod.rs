//! File-backed storage
//!
//! Two files back the bot: a JSON state blob rewritten after every mutation
//! and an append-only transcript that rotates when it grows too large.

pub mod history;
pub mod state_file;

pub use history::HistoryLog;
pub use state_file::{PersistedState, StateFile, StateSource};

use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::{BotError, Result};

/// Replace `path` with `bytes` via a sibling temporary file and a rename, so
/// readers never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| BotError::io("create directory", parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&temp_path, bytes).map_err(|e| BotError::io("write", &temp_path, e))?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(BotError::io("rename", path, e));
    }
    Ok(())
}
