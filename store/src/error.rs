//! Error types for the table metadata store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Errors that can occur in the table metadata store.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The record or request violates an invariant. Raised before any I/O.
    #[error("invalid metadata for table '{table}': {reason}")]
    Validation { table: String, reason: String },

    /// No record is stored for the table.
    #[error("no metadata stored for table '{0}'")]
    NotFound(String),

    /// The stored record could not be parsed into a valid record.
    #[error("corrupt metadata for table '{table}': {reason}")]
    CorruptData { table: String, reason: String },

    /// Reading or writing a table's backing file failed.
    #[error("storage error for table '{table}': {source}")]
    Persistence {
        table: String,
        #[source]
        source: StorageError,
    },

    /// Storage failure not tied to a single table.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An import document could not be parsed.
    #[error("invalid metadata document {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MetadataError {
    pub(crate) fn validation(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(table: impl Into<String>, source: StorageError) -> Self {
        Self::Persistence {
            table: table.into(),
            source,
        }
    }

    /// Whether this error means the table simply has no stored record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The table this error refers to, if it is table-scoped.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Validation { table, .. }
            | Self::CorruptData { table, .. }
            | Self::Persistence { table, .. } => Some(table),
            Self::NotFound(table) => Some(table),
            Self::Storage(_)
            | Self::InvalidDocument { .. }
            | Self::Serialization(_)
            | Self::Config(_) => None,
        }
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to enumerate the storage directory.
    #[error("failed to list directory {}: {source}", path.display())]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a metadata file.
    #[error("failed to read file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a metadata file.
    #[error("failed to write file {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a metadata file.
    #[error("failed to delete file {}: {source}", path.display())]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
