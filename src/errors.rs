// src/errors.rs

//! Crate-wide error type, error kinds and `Result` alias.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Classification of an [`EdgeWatchError`].
///
/// Only the first five kinds ever travel on a watcher's error channel; the
/// remaining ones come from configuration loading and the binary glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WatcherSetup,
    WatcherRuntime,
    Planner,
    Resolver,
    Filesystem,
    Config,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::WatcherSetup => "watcher_setup",
            ErrorKind::WatcherRuntime => "watcher_runtime",
            ErrorKind::Planner => "planner",
            ErrorKind::Resolver => "resolver",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum EdgeWatchError {
    /// Acquiring the OS notification handle failed.
    #[error("failed to set up file watcher: {0}")]
    WatcherSetup(String),

    /// The notification library reported an error after startup.
    #[error("file watcher error: {0}")]
    WatcherRuntime(String),

    #[error("{0}")]
    Planner(String),

    /// An import map or source file could not be read or parsed.
    #[error("failed to resolve imports of {}: {message}", path.display())]
    Resolver { path: PathBuf, message: String },

    /// A per-path add/remove failed during a target swap.
    #[error("failed to update watch on {}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EdgeWatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EdgeWatchError::WatcherSetup(_) => ErrorKind::WatcherSetup,
            EdgeWatchError::WatcherRuntime(_) => ErrorKind::WatcherRuntime,
            EdgeWatchError::Planner(_) => ErrorKind::Planner,
            EdgeWatchError::Resolver { .. } => ErrorKind::Resolver,
            EdgeWatchError::Filesystem { .. } => ErrorKind::Filesystem,
            EdgeWatchError::ConfigError(_) | EdgeWatchError::TomlError(_) => ErrorKind::Config,
            EdgeWatchError::IoError(_) => ErrorKind::Filesystem,
            EdgeWatchError::Other(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn resolver(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        EdgeWatchError::Resolver {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        EdgeWatchError::Filesystem {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<notify::Error> for EdgeWatchError {
    fn from(err: notify::Error) -> Self {
        EdgeWatchError::WatcherRuntime(err.to_string())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EdgeWatchError>;
