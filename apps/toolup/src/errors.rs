//! Error types for the toolup CLI.
//!
//! `ToolupError` covers every failure a single tool install can hit. Command
//! handlers work with `anyhow::Result` and wrap these where more context is
//! useful; the install pipeline keeps them typed so callers can tell which
//! step failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::template::TemplateError;

/// Consolidated error type for toolup operations.
#[derive(Debug, Error)]
pub enum ToolupError {
    /// The download URL template could not be rendered.
    #[error(transparent)]
    TemplateError(#[from] TemplateError),

    /// Network error or non-success HTTP status while downloading.
    #[error("download error: {message}")]
    FetchError {
        /// The URL being fetched.
        url: String,
        /// Description of the download error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Opening, listing or reading the downloaded archive failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Writing the installed executable failed.
    #[error("failed to write {}", path.display())]
    WriteError {
        /// Destination that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The tools configuration could not be read or parsed.
    #[error("config error in {}: {message}", path.display())]
    ConfigError {
        /// Path of the configuration file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Local filesystem error outside the destination (temp dirs, bin dir setup).
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ToolupError {
    /// Creates a new `FetchError`.
    #[must_use]
    pub fn fetch_error(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchError {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `FetchError` with a source error.
    #[must_use]
    pub fn fetch_error_with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::FetchError {
            url: url.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `WriteError`.
    #[must_use]
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new `ConfigError`.
    #[must_use]
    pub fn config_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `IoError` from an I/O error with context.
    #[must_use]
    pub fn io_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            message: message.into(),
            source,
        }
    }
}
