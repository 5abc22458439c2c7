//! Error types for the watch core

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the watch core
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("poll interval must be positive, got {0}ms")]
    InvalidInterval(i64),

    #[error("invalid filter pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("path not found: {path}: {source}")]
    NotFound { path: PathBuf, source: io::Error },

    #[error("path is not watched: {0}")]
    NotWatched(PathBuf),

    #[error("watcher has not been started")]
    NotStarted,

    #[error("watcher is already running")]
    AlreadyRunning,

    #[error("watched root became unavailable: {path}: {source}")]
    RootUnavailable { path: PathBuf, source: io::Error },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Coarse classification used by callers to decide between replying and exiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad start payload, pattern or interval
    Config,
    /// Path missing or not watched; the caller can retry
    Path,
    /// Root-level enumeration failure
    Enumeration,
    /// Engine lifecycle or task failure
    Runtime,
}

impl WatchError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::Config(_)
            | WatchError::InvalidInterval(_)
            | WatchError::InvalidPattern { .. } => ErrorKind::Config,
            WatchError::NotFound { .. } | WatchError::NotWatched(_) | WatchError::NotStarted => {
                ErrorKind::Path
            }
            WatchError::RootUnavailable { .. } => ErrorKind::Enumeration,
            WatchError::AlreadyRunning | WatchError::Task(_) => ErrorKind::Runtime,
        }
    }

    /// Whether the process should terminate after reporting this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Config | ErrorKind::Enumeration
        ) || matches!(self, WatchError::Task(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_errors_are_recoverable() {
        let err = WatchError::NotWatched(PathBuf::from("/tmp/nope"));
        assert_eq!(err.kind(), ErrorKind::Path);
        assert!(!err.is_fatal());
        assert!(!WatchError::AlreadyRunning.is_fatal());
    }

    #[test]
    fn test_config_and_root_errors_are_fatal() {
        assert!(WatchError::InvalidInterval(0).is_fatal());

        let err = WatchError::RootUnavailable {
            path: PathBuf::from("/tmp/gone"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.kind(), ErrorKind::Enumeration);
        assert!(err.is_fatal());
    }
}
