//! Error types for LeadConsole.
//!
//! Library crates use [`LeadConsoleError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LeadConsole operations.
///
/// A run that is stopped by the user is not an error; it ends with
/// [`RunStatus::StoppedByUser`](crate::types::RunStatus::StoppedByUser).
#[derive(Debug, thiserror::Error)]
pub enum LeadConsoleError {
    /// Empty or whitespace-only entity, or an otherwise unusable argument.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// No record in the data source matches the requested entity.
    #[error("entity not found: {entity:?} does not match any record")]
    EntityNotFound { entity: String },

    /// A launch was attempted while another run of the session is still active.
    #[error("a {pipeline} run is already in progress for this session")]
    RunInProgress { pipeline: String },

    /// Export requested without a completed run for the selected entity.
    #[error("export unavailable: {message}")]
    ExportUnavailable { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Persisted payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed dataset, unknown pipeline name, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadConsoleError>;

impl LeadConsoleError {
    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create an entity-not-found error for the given entity string.
    pub fn entity_not_found(entity: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
        }
    }

    /// Create an export-unavailable error from any displayable message.
    pub fn export_unavailable(msg: impl Into<String>) -> Self {
        Self::ExportUnavailable {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::EntityNotFound { .. }
                | Self::RunInProgress { .. }
                | Self::ExportUnavailable { .. }
        )
    }
}

impl From<serde_json::Error> for LeadConsoleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
