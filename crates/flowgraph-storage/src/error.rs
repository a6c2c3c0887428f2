//! Storage error types for flowgraph-storage.
//!
//! [`StorageError`] covers the failure modes of the storage layer:
//! serialization, SQLite access, schema migration and missing sheets.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// No sheet with this id exists (in the given playground, when scoped).
    #[error("sheet not found: {sheet}")]
    SheetNotFound { sheet: String },
}

impl StorageError {
    /// Returns `true` for the not-found variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::SheetNotFound { .. })
    }
}
