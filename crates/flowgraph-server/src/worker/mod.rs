//! The worker seam: where a session's files are stored and its process runs.
//!
//! A [`Worker`] hands out one [`WorkerConnection`] per session. The
//! connection owns the session's workspace; dropping it kills any process it
//! started and removes the workspace.

pub mod local;

use std::fmt;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

use flowgraph_core::EnvVars;

use crate::error::WorkerError;

pub use local::LocalWorker;

/// Command line of a process to start, relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A started process: its three standard streams and its exit status.
pub struct RunningProcess {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    /// Resolves to the exit code once the process ends (`None` when it was
    /// killed by a signal).
    pub exit: BoxFuture<'static, Result<Option<i32>, WorkerError>>,
}

#[async_trait]
pub trait Worker: Send + Sync {
    /// Opens a fresh, empty workspace.
    async fn connect(&self) -> Result<Box<dyn WorkerConnection>, WorkerError>;
}

#[async_trait]
pub trait WorkerConnection: Send {
    /// Writes `contents` to `path` inside the workspace, creating parent
    /// directories as needed.
    async fn upload(&mut self, path: &str, contents: &[u8]) -> Result<(), WorkerError>;

    /// Starts `launch` in the workspace root with `env` added to the
    /// inherited environment.
    async fn execute(
        &mut self,
        launch: &Launch,
        env: &EnvVars,
    ) -> Result<RunningProcess, WorkerError>;
}
