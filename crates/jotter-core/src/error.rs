//! Error types for jotter-core

use thiserror::Error;

/// Result type alias using jotter-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jotter-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note or note version not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Identifier does not match the note id pattern
    #[error("Invalid note id: {0:?}")]
    InvalidId(String),

    /// Identifier collides with a reserved route name
    #[error("Note id is reserved: {0:?}")]
    ReservedId(String),

    /// Content exceeds the per-note size limit
    #[error("Content too large: {size} bytes exceeds the {limit} byte limit")]
    ContentTooLarge { size: usize, limit: usize },

    /// Every candidate id collided with an existing note
    #[error("Could not select a free note id after {attempts} attempts")]
    IdSelectionExhausted { attempts: u32 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Render worker error
    #[error("Render error: {0}")]
    Render(String),

    /// Background task failed to complete
    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether the error was caused by caller-supplied input rather than the
    /// system itself.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidId(_)
                | Self::ReservedId(_)
                | Self::ContentTooLarge { .. }
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Task(error.to_string())
    }
}
