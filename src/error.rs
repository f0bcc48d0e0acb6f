//! Error types for the deposition indexer.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, DepoIndexError>;

/// Run-level errors. Any of these aborts the current run.
#[derive(Error, Debug)]
pub enum DepoIndexError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The transcript path does not exist.
    #[error("Transcript not found at '{0}'")]
    TranscriptNotFound(PathBuf),

    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus path '{0}' does not exist or is not a directory")]
    InvalidCorpusPath(PathBuf),

    /// No transcripts found in the corpus.
    #[error("No transcripts found in corpus at '{0}'")]
    EmptyCorpus(PathBuf),

    /// The outline file does not exist.
    #[error("Outline file not found at '{0}'")]
    OutlineNotFound(PathBuf),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DepoIndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for DepoIndexError {
    fn from(err: reqwest::Error) -> Self {
        DepoIndexError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for DepoIndexError {
    fn from(err: serde_json::Error) -> Self {
        DepoIndexError::LlmParse(err.to_string())
    }
}

/// Unit-level labeling failure. Never escalates past the unit that caused it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabelError {
    /// The labeler did not answer within the configured timeout.
    #[error("labeler timed out after {0:?}")]
    Timeout(Duration),

    /// The labeler backend returned an error.
    #[error("labeler failed: {0}")]
    Backend(String),

    /// The labeler answered with nothing usable.
    #[error("labeler returned an empty label")]
    Empty,
}

impl From<DepoIndexError> for LabelError {
    fn from(err: DepoIndexError) -> Self {
        LabelError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_path() {
        let err = DepoIndexError::io(
            "/tmp/outline.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/outline.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_label_error_from_run_error() {
        let err: LabelError = DepoIndexError::LlmApi("quota".to_string()).into();
        assert!(matches!(err, LabelError::Backend(ref m) if m.contains("quota")));
    }
}
