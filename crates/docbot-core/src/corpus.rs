//! Document corpus loading.
//!
//! Every reload rebuilds the corpus from scratch: each recognized text file in
//! the document directory is trimmed and appended under a header naming it.
//! Files are visited in name order, so an unchanged directory always yields a
//! byte-identical corpus.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, has_extension};
use crate::error::{BotError, Result};

const HEADER_PREFIX: &str = "===== [Document: ";
const HEADER_SUFFIX: &str = "] =====";

/// Result of one load pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Concatenated document text
    pub text: String,
    /// Documents that contributed non-empty content
    pub document_count: usize,
}

/// A document read during a load pass
#[derive(Debug)]
struct Document {
    name: String,
    content: String,
}

/// Scans the document directory and builds the corpus
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    docs_dir: PathBuf,
    max_document_size: u64,
    extensions: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl CorpusLoader {
    /// Create a loader with default limits for `docs_dir`
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        let defaults = crate::config::BotSettings::default();
        Self {
            docs_dir: docs_dir.into(),
            max_document_size: defaults.max_document_size,
            extensions: defaults.document_extensions,
            excluded: Vec::new(),
        }
    }

    /// Build a loader from the bot configuration. The history transcript is
    /// excluded so it never feeds back into the corpus.
    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(&config.paths.docs_dir)
            .with_max_document_size(config.bot.max_document_size)
            .with_extensions(config.bot.document_extensions.clone())
            .excluding(&config.paths.history_file)
    }

    /// Set the per-file size ceiling in bytes
    pub fn with_max_document_size(mut self, bytes: u64) -> Self {
        self.max_document_size = bytes;
        self
    }

    /// Set the recognized extensions (without the dot)
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Never load `path`, even if it has a recognized extension
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Create the document directory if it does not exist
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.docs_dir)
            .map_err(|e| BotError::io("create directory", &self.docs_dir, e))
    }

    /// Rebuild the corpus from the current directory contents.
    ///
    /// Only a missing or unreadable directory fails the pass; problems with
    /// individual files are logged and the file is skipped.
    pub fn load(&self) -> Result<Corpus> {
        self.ensure_dir()?;

        info!(
            docs_dir = %self.docs_dir.display(),
            max_document_size = self.max_document_size,
            "Loading documents"
        );

        let mut corpus = Corpus::default();
        for path in self.candidate_paths()? {
            let Some(document) = self.read_document(&path) else {
                continue;
            };
            corpus.text.push_str(&document_header(&document.name));
            corpus.text.push_str(&document.content);
            corpus.document_count += 1;
            info!(document = %document.name, "Loaded document");
        }

        Ok(corpus)
    }

    /// Regular files with a recognized extension, sorted by file name
    fn candidate_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.docs_dir)
            .map_err(|e| BotError::io("read directory", &self.docs_dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(docs_dir = %self.docs_dir.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.has_document_extension(&name) {
                debug!(file = %name, "Skipping non-document file");
                continue;
            }
            if self.is_excluded(&path) {
                debug!(file = %name, "Skipping excluded file");
                continue;
            }
            paths.push(path);
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }

    fn read_document(&self, path: &Path) -> Option<Document> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(file = %name, error = %e, "Failed to stat document");
                return None;
            }
        };
        if !metadata.is_file() {
            return None;
        }
        if metadata.len() > self.max_document_size {
            warn!(
                file = %name,
                size = metadata.len(),
                limit = self.max_document_size,
                "Skipping oversized document"
            );
            return None;
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(file = %name, error = %e, "Failed to read document");
                return None;
            }
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                error!(file = %name, error = %e, "Document is not valid UTF-8");
                return None;
            }
        };

        let content = text.trim();
        if content.is_empty() {
            debug!(file = %name, "Skipping empty document");
            return None;
        }

        Some(Document {
            name,
            content: content.to_string(),
        })
    }

    fn has_document_extension(&self, file_name: &str) -> bool {
        has_extension(file_name, &self.extensions)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|excluded| {
            if excluded == path {
                return true;
            }
            match (fs::canonicalize(excluded), fs::canonicalize(path)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        })
    }
}

/// Header placed before each document's content
pub fn document_header(name: &str) -> String {
    format!("\n\n{HEADER_PREFIX}{name}{HEADER_SUFFIX}\n")
}

/// Names of the documents contained in a corpus string, in order
pub fn document_names(corpus: &str) -> Vec<String> {
    corpus
        .lines()
        .filter_map(|line| {
            line.strip_prefix(HEADER_PREFIX)
                .and_then(|rest| rest.strip_suffix(HEADER_SUFFIX))
        })
        .map(str::to_string)
        .collect()
}
