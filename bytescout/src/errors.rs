//! Error types for bytescout.
//!
//! Two families live here. `ScoutError` covers fatal problems detected before
//! any worker starts (bad pattern, zero capacity, unreadable configuration).
//! The per-item errors (`ClassifyError`, `SpawnError`, `ScanError`) never
//! abort a run: they are captured, logged and surfaced next to the entry
//! they belong to.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pattern::MAX_PATTERN_LEN;

/// Result type for fallible setup operations
pub type ScoutResult<T> = Result<T, ScoutError>;

/// Errors that prevent a scan from starting
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid capacity: {0} (must be greater than zero)")]
    InvalidCapacity(usize),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl ScoutError {
    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub(crate) fn pattern_too_long(len: usize) -> Self {
        Self::InvalidPattern(format!(
            "pattern is {} bytes, at most {} are allowed",
            len, MAX_PATTERN_LEN
        ))
    }
}

/// Metadata lookup for a directory entry failed
#[derive(Error, Debug)]
#[error("Cannot read metadata of {path}: {source}")]
pub struct ClassifyError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// The OS refused to start another execution unit
#[derive(Error, Debug)]
#[error("Cannot start worker for {path}: {source}")]
pub struct SpawnError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failure while scanning a single file
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Worker for {path} terminated before reporting a count")]
    Aborted { path: PathBuf },
}

impl ScanError {
    pub fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub fn aborted(path: impl Into<PathBuf>) -> Self {
        Self::Aborted { path: path.into() }
    }

    /// Short machine-readable tag used in output records
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Unreadable { .. } => "unreadable",
            ScanError::Aborted { .. } => "aborted",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ScanError::Unreadable { path, .. } | ScanError::Aborted { path } => path,
        }
    }
}
