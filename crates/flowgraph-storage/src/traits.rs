//! The [`SheetStore`] trait defining the storage contract for sheets, their
//! extracted graphs and their run history.
//!
//! Every write is atomic: a backend either applies all of it or none.

use flowgraph_core::{PipelineGraph, SourceFile};

use crate::error::StorageError;
use crate::types::{PlaygroundId, RunId, RunRecord, Sheet, SheetId, SheetSummary, StoredRun};

/// The storage contract for sheets.
///
/// The trait is synchronous; async callers hold the store behind a mutex and
/// keep each call short.
pub trait SheetStore {
    /// Creates a sheet in `playground` with the given files.
    fn create_sheet(
        &mut self,
        playground: &PlaygroundId,
        title: &str,
        files: &[SourceFile],
    ) -> Result<SheetId, StorageError>;

    /// Loads a sheet, scoped to the playground it belongs to.
    fn get_sheet(&self, sheet: &SheetId, playground: &PlaygroundId) -> Result<Sheet, StorageError>;

    /// Lists the sheets of a playground in creation order.
    fn list_sheets(&self, playground: &PlaygroundId) -> Result<Vec<SheetSummary>, StorageError>;

    /// Replaces the whole file list of a sheet.
    fn replace_files(
        &mut self,
        sheet: &SheetId,
        playground: &PlaygroundId,
        files: &[SourceFile],
    ) -> Result<(), StorageError>;

    /// Stores `graph` as the sheet's current graph, replacing any previous one.
    fn save_graph(&mut self, sheet: &SheetId, graph: &PipelineGraph) -> Result<(), StorageError>;

    /// Appends a run record for an existing sheet.
    fn insert_run(&mut self, run: &RunRecord) -> Result<RunId, StorageError>;

    /// Lists a sheet's runs, newest first.
    fn list_runs(&self, sheet: &SheetId) -> Result<Vec<StoredRun>, StorageError>;
}
