//! Runs sessions as local child processes in throwaway directories.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use flowgraph_core::EnvVars;

use super::{Launch, RunningProcess, Worker, WorkerConnection};
use crate::error::WorkerError;

/// A [`Worker`] that creates one temporary directory per session under
/// `root` and runs processes there.
#[derive(Debug, Clone)]
pub struct LocalWorker {
    root: PathBuf,
}

impl LocalWorker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalWorker { root: root.into() }
    }
}

#[async_trait]
impl Worker for LocalWorker {
    async fn connect(&self) -> Result<Box<dyn WorkerConnection>, WorkerError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| WorkerError::Connect(format!("{}: {}", self.root.display(), e)))?;
        let dir = tempfile::Builder::new()
            .prefix("flowgraph-")
            .tempdir_in(&self.root)
            .map_err(|e| WorkerError::Connect(format!("{}: {}", self.root.display(), e)))?;
        tracing::debug!(workspace = %dir.path().display(), "workspace created");
        Ok(Box::new(LocalConnection { dir }))
    }
}

/// Owns the session workspace; removed on drop.
pub struct LocalConnection {
    dir: TempDir,
}

/// Resolves an upload path inside the workspace, rejecting absolute paths
/// and any `..` component.
fn workspace_path(root: &Path, path: &str) -> Result<PathBuf, WorkerError> {
    let relative = Path::new(path);
    let mut has_name = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            _ => {
                return Err(WorkerError::InvalidPath {
                    path: path.to_string(),
                })
            }
        }
    }
    if !has_name {
        return Err(WorkerError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(root.join(relative))
}

#[async_trait]
impl WorkerConnection for LocalConnection {
    async fn upload(&mut self, path: &str, contents: &[u8]) -> Result<(), WorkerError> {
        let target = workspace_path(self.dir.path(), path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| WorkerError::Io {
                context: format!("creating directory for {}", path),
                source: e,
            })?;
        }
        tokio::fs::write(&target, contents)
            .await
            .map_err(|e| WorkerError::Io {
                context: format!("writing {}", path),
                source: e,
            })
    }

    async fn execute(
        &mut self,
        launch: &Launch,
        env: &EnvVars,
    ) -> Result<RunningProcess, WorkerError> {
        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .current_dir(self.dir.path())
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Launch {
                program: launch.program.clone(),
                source: e,
            })?;

        let stdin = child.stdin.take().ok_or(WorkerError::MissingStream("stdin"))?;
        let stdout = child.stdout.take().ok_or(WorkerError::MissingStream("stdout"))?;
        let stderr = child.stderr.take().ok_or(WorkerError::MissingStream("stderr"))?;

        let exit = Box::pin(async move {
            let status = child.wait().await.map_err(|e| WorkerError::Io {
                context: "waiting for process".to_string(),
                source: e,
            })?;
            Ok::<_, WorkerError>(status.code())
        });

        Ok(RunningProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
        })
    }
}
