//! Sheet management request/response types.

use serde::{Deserialize, Serialize};

use flowgraph_core::SourceFile;
use flowgraph_storage::{SheetId, SheetSummary, StoredRun};

/// Request to create a sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSheetRequest {
    pub title: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSheetResponse {
    pub id: SheetId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetListResponse {
    pub sheets: Vec<SheetSummary>,
}

/// Replaces the whole file list of a sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceFilesRequest {
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunListResponse {
    pub runs: Vec<StoredRun>,
}
