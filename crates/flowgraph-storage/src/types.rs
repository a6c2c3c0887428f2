//! Storage-layer types: sheet identity, stored sheets and run records.
//!
//! [`SheetId`] is defined here (not in flowgraph-core) because sheet identity
//! is a storage concern: sheets only gain an id when persisted.

use std::fmt;

use flowgraph_core::{PipelineGraph, SourceFile};
use serde::{Deserialize, Serialize};

/// Unique identifier of a stored sheet (a v4 UUID in text form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(pub String);

impl SheetId {
    /// Allocates a fresh random id.
    pub fn generate() -> Self {
        SheetId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SheetId {
    fn from(s: &str) -> Self {
        SheetId(s.to_string())
    }
}

/// Identifier of the playground a sheet belongs to. Playgrounds are not
/// stored themselves; the id only scopes sheets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaygroundId(pub String);

impl fmt::Display for PlaygroundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaygroundId {
    fn from(s: &str) -> Self {
        PlaygroundId(s.to_string())
    }
}

/// A stored sheet with its files in declared order and its latest graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub id: SheetId,
    pub playground_id: PlaygroundId,
    pub title: String,
    pub files: Vec<SourceFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<PipelineGraph>,
}

/// Summary of a stored sheet (for listing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub id: SheetId,
    pub title: String,
    pub file_count: usize,
}

/// Identifier of a stored run; increases with insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

/// The outcome of one execution, recorded once at process exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub sheet_id: SheetId,
    /// Captured stdout with every frame removed, trimmed.
    pub output: String,
    #[serde(default)]
    pub timings: Option<serde_json::Value>,
    /// `None` when the process was killed by a signal.
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// A [`RunRecord`] as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: RunId,
    #[serde(flatten)]
    pub run: RunRecord,
    /// UTC insertion time, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "createdAt")]
    pub created_at: String,
}
