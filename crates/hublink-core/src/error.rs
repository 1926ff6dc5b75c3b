//! Error types for hublink.
//!
//! A single error enum covers every stage of the pipeline. "No match" during
//! resolution and non-200 metrics fetches are not errors; they are ordinary
//! values (see [`crate::resolve::Resolution`] and [`crate::FetchStatus`]).

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the hublink library.
#[derive(Debug, Error)]
pub enum HublinkError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout: {0}")]
    Timeout(String),

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Missing input {path}: {hint}")]
    MissingArtifact { path: PathBuf, hint: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("CSV error: {message}")]
    Csv {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    // Lookup errors
    #[error("Repository not found: {repo_id}")]
    RepoNotFound { repo_id: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for hublink operations.
pub type Result<T> = std::result::Result<T, HublinkError>;

impl From<std::io::Error> for HublinkError {
    fn from(err: std::io::Error) -> Self {
        HublinkError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for HublinkError {
    fn from(err: serde_json::Error) -> Self {
        HublinkError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for HublinkError {
    fn from(err: rusqlite::Error) -> Self {
        HublinkError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<csv::Error> for HublinkError {
    fn from(err: csv::Error) -> Self {
        HublinkError::Csv {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for HublinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HublinkError::Timeout(err.to_string())
        } else {
            HublinkError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl HublinkError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        HublinkError::Io {
            message: format!("{} ({})", err, path.display()),
            path: Some(path),
            source: Some(err),
        }
    }

    /// Create a missing-input error pointing at the stage that produces it.
    pub fn missing_artifact(path: impl Into<PathBuf>, producer: &str) -> Self {
        HublinkError::MissingArtifact {
            path: path.into(),
            hint: format!("run `hublink {}` first", producer),
        }
    }

    /// Map to an HTTP status code for the query service.
    ///
    /// - 400: validation errors
    /// - 404: unknown repository
    /// - 503: database missing (pipeline has not been stored yet)
    /// - 500: everything else
    pub fn http_status(&self) -> u16 {
        match self {
            HublinkError::Validation { .. } => 400,
            HublinkError::RepoNotFound { .. } => 404,
            HublinkError::MissingArtifact { .. } => 503,
            _ => 500,
        }
    }

    /// Whether this error came from the network layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, HublinkError::Network { .. } | HublinkError::Timeout(_))
    }
}
