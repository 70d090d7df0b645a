//! Error types for the notekeeper store
//!
//! All errors use thiserror for structured error handling.
//! Every variant is locally recoverable; none of them should take the process down.

use crate::database::{FolderId, NoteId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A folder with the same title already exists
    #[error("A folder named \"{0}\" already exists")]
    DuplicateName(String),

    /// Caller-supplied input violates a precondition
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("Folder not found: {0}")]
    FolderNotFound(FolderId),

    /// A durable write to the key-value store failed
    #[error("Persistence write failed: {0}")]
    PersistenceWrite(String),

    /// The reminder scheduler refused or failed a request
    #[error("Scheduling failed: {0}")]
    Scheduling(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Short message suitable for transient user feedback (toasts, snackbars).
    pub fn user_message(&self) -> String {
        match self {
            Self::DuplicateName(_) => "A folder with this name already exists".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::FolderNotFound(_) => "Folder no longer exists".to_string(),
            Self::Scheduling(_) => "Could not set reminder".to_string(),
            Self::PersistenceWrite(_) | Self::Database(_) | Self::Io(_) => {
                "Could not save changes".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
