//! Sheet handlers: list, create, fetch, replace files, list runs.

use axum::extract::{Path, State};
use axum::Json;

use flowgraph_storage::{PlaygroundId, Sheet, SheetId};

use crate::error::ApiError;
use crate::schema::sheets::{
    CreateSheetRequest, CreateSheetResponse, ReplaceFilesRequest, RunListResponse,
    SheetListResponse,
};
use crate::state::AppState;

/// Lists the sheets of a playground.
///
/// `GET /playgrounds/{playground_id}/sheets`
pub async fn list_sheets(
    State(state): State<AppState>,
    Path(playground_id): Path<String>,
) -> Result<Json<SheetListResponse>, ApiError> {
    let store = state.store.lock().await;
    let sheets = store.list_sheets(&PlaygroundId(playground_id))?;
    Ok(Json(SheetListResponse { sheets }))
}

/// Creates a sheet.
///
/// `POST /playgrounds/{playground_id}/sheets`
pub async fn create_sheet(
    State(state): State<AppState>,
    Path(playground_id): Path<String>,
    Json(req): Json<CreateSheetRequest>,
) -> Result<Json<CreateSheetResponse>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let mut store = state.store.lock().await;
    let id = store.create_sheet(&PlaygroundId(playground_id), &req.title, &req.files)?;
    tracing::info!(sheet = %id, files = req.files.len(), "sheet created");
    Ok(Json(CreateSheetResponse {
        id,
        title: req.title,
    }))
}

/// Fetches a sheet with its files and latest graph.
///
/// `GET /playgrounds/{playground_id}/sheets/{sheet_id}`
pub async fn get_sheet(
    State(state): State<AppState>,
    Path((playground_id, sheet_id)): Path<(String, String)>,
) -> Result<Json<Sheet>, ApiError> {
    let store = state.store.lock().await;
    let sheet = store.get_sheet(&SheetId(sheet_id), &PlaygroundId(playground_id))?;
    Ok(Json(sheet))
}

/// Replaces a sheet's files.
///
/// `PUT /playgrounds/{playground_id}/sheets/{sheet_id}/files`
pub async fn replace_files(
    State(state): State<AppState>,
    Path((playground_id, sheet_id)): Path<(String, String)>,
    Json(req): Json<ReplaceFilesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.files.iter().any(|f| f.filename.trim().is_empty()) {
        return Err(ApiError::BadRequest("every file needs a filename".to_string()));
    }
    let mut store = state.store.lock().await;
    store.replace_files(&SheetId(sheet_id), &PlaygroundId(playground_id), &req.files)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "files": req.files.len()
    })))
}

/// Lists a sheet's runs, newest first.
///
/// `GET /playgrounds/{playground_id}/sheets/{sheet_id}/runs`
pub async fn list_runs(
    State(state): State<AppState>,
    Path((playground_id, sheet_id)): Path<(String, String)>,
) -> Result<Json<RunListResponse>, ApiError> {
    let sheet_id = SheetId(sheet_id);
    let store = state.store.lock().await;
    store.get_sheet(&sheet_id, &PlaygroundId(playground_id))?;
    let runs = store.list_runs(&sheet_id)?;
    Ok(Json(RunListResponse { runs }))
}
