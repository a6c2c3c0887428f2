//! Core error types for flowgraph-core.

use thiserror::Error;

/// Errors produced by the flowgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sheet declared a language the runner cannot launch.
    #[error("unsupported language: '{language}'")]
    UnsupportedLanguage { language: String },
}
