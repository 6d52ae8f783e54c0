use std::path::PathBuf;
use thiserror::Error;

use crate::output::ArtifactKey;
use crate::provider::FailureKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(
        "OpenRouter API key is required. Set it via --api-key, the OPENROUTER_API_KEY env var, \
         or service.api_key in the config file"
    )]
    MissingApiKey,

    #[error("Invalid config value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OutlineError {
    #[error("No slides found in outline (expected '## ' headings outside the style section)")]
    EmptyOutline,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid selection '{token}': {reason}")]
    InvalidSelection { token: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to build glob pattern '{pattern}': {source}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    #[error("No files found matching pattern: {0}")]
    NoMatches(String),

    #[error("Article file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported article format for {path}; supported: {supported}")]
    UnsupportedFormat { path: PathBuf, supported: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One failed generation attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct GenerationError {
    pub kind: FailureKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to acquire semaphore: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No artifacts produced: all {failed} job(s) failed")]
    NoArtifactsProduced { failed: usize },

    #[error("Failed to persist {} artifact(s): {}", .failures.len(), format_persist_failures(.failures))]
    Persist {
        failures: Vec<(ArtifactKey, String)>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to build combined document: {0}")]
    Document(String),
}

fn format_persist_failures(failures: &[(ArtifactKey, String)]) -> String {
    failures
        .iter()
        .map(|(key, err)| format!("{key}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that stop a deck run before any result can be assembled
#[derive(Error, Debug)]
pub enum DeckError {
    #[error(transparent)]
    Outline(#[from] OutlineError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to write summary: {0}")]
    WriteSummary(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
