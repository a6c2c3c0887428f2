//! Storage for flowgraph sheets, their extracted graphs and their runs.
//!
//! Provides the [`SheetStore`] trait that all backends implement, plus the
//! [`InMemoryStore`] and [`SqliteStore`] backends.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: SheetId, Sheet, RunRecord and friends
//! - [`traits`]: SheetStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::SheetStore;
pub use types::{PlaygroundId, RunId, RunRecord, Sheet, SheetId, SheetSummary, StoredRun};
