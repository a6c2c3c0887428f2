//! Application state shared by every handler and session.
//!
//! The store sits behind `Arc<tokio::sync::Mutex<>>`: handlers and sessions
//! await the lock without blocking the runtime, and `rusqlite::Connection`
//! is `!Sync`, which rules out an `RwLock`. Each store call is short and
//! never spans an await point.

use std::sync::Arc;

use flowgraph_storage::{InMemoryStore, SheetStore, SqliteStore, StorageError};

use crate::config::ServerConfig;
use crate::worker::{LocalWorker, Worker};

/// The sheet store shared across tasks.
pub type SharedStore = Arc<tokio::sync::Mutex<Box<dyn SheetStore + Send>>>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub worker: Arc<dyn Worker>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Opens the SQLite store at `config.db_path` and runs sessions as local
    /// processes under `config.work_root`.
    pub fn new(config: ServerConfig) -> Result<Self, StorageError> {
        let store = SqliteStore::new(&config.db_path)?;
        let worker = LocalWorker::new(config.work_root.clone());
        Ok(Self::with_parts(store, worker, config))
    }

    /// In-memory store with default configuration (for testing).
    pub fn in_memory() -> Self {
        let config = ServerConfig::default();
        let worker = LocalWorker::new(config.work_root.clone());
        Self::with_parts(InMemoryStore::new(), worker, config)
    }

    pub fn with_parts(
        store: impl SheetStore + Send + 'static,
        worker: impl Worker + 'static,
        config: ServerConfig,
    ) -> Self {
        let store: Box<dyn SheetStore + Send> = Box::new(store);
        AppState {
            store: Arc::new(tokio::sync::Mutex::new(store)),
            worker: Arc::new(worker),
            config: Arc::new(config),
        }
    }
}
