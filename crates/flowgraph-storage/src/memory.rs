//! In-memory implementation of [`SheetStore`].
//!
//! [`InMemoryStore`] backs tests and ephemeral servers. It has the same
//! semantics as the SQLite backend, including playground scoping and
//! insertion-ordered sheet listings and newest-first run listings.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use flowgraph_core::{PipelineGraph, SourceFile};

use crate::error::StorageError;
use crate::traits::SheetStore;
use crate::types::{PlaygroundId, RunId, RunRecord, Sheet, SheetId, SheetSummary, StoredRun};

/// HashMap-backed implementation of [`SheetStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sheets: HashMap<SheetId, Sheet>,
    /// Creation order, for listing.
    order: Vec<SheetId>,
    runs: Vec<StoredRun>,
    next_run_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn scoped(&self, sheet: &SheetId, playground: &PlaygroundId) -> Result<&Sheet, StorageError> {
        self.sheets
            .get(sheet)
            .filter(|s| &s.playground_id == playground)
            .ok_or_else(|| StorageError::SheetNotFound {
                sheet: sheet.0.clone(),
            })
    }

    fn sheet_mut(&mut self, sheet: &SheetId) -> Result<&mut Sheet, StorageError> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| StorageError::SheetNotFound {
                sheet: sheet.0.clone(),
            })
    }
}

impl SheetStore for InMemoryStore {
    fn create_sheet(
        &mut self,
        playground: &PlaygroundId,
        title: &str,
        files: &[SourceFile],
    ) -> Result<SheetId, StorageError> {
        let id = SheetId::generate();
        self.sheets.insert(
            id.clone(),
            Sheet {
                id: id.clone(),
                playground_id: playground.clone(),
                title: title.to_string(),
                files: files.to_vec(),
                graph: None,
            },
        );
        self.order.push(id.clone());
        Ok(id)
    }

    fn get_sheet(&self, sheet: &SheetId, playground: &PlaygroundId) -> Result<Sheet, StorageError> {
        self.scoped(sheet, playground).cloned()
    }

    fn list_sheets(&self, playground: &PlaygroundId) -> Result<Vec<SheetSummary>, StorageError> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.sheets.get(id))
            .filter(|s| &s.playground_id == playground)
            .map(|s| SheetSummary {
                id: s.id.clone(),
                title: s.title.clone(),
                file_count: s.files.len(),
            })
            .collect())
    }

    fn replace_files(
        &mut self,
        sheet: &SheetId,
        playground: &PlaygroundId,
        files: &[SourceFile],
    ) -> Result<(), StorageError> {
        self.scoped(sheet, playground)?;
        self.sheet_mut(sheet)?.files = files.to_vec();
        Ok(())
    }

    fn save_graph(&mut self, sheet: &SheetId, graph: &PipelineGraph) -> Result<(), StorageError> {
        self.sheet_mut(sheet)?.graph = Some(graph.clone());
        Ok(())
    }

    fn insert_run(&mut self, run: &RunRecord) -> Result<RunId, StorageError> {
        if !self.sheets.contains_key(&run.sheet_id) {
            return Err(StorageError::SheetNotFound {
                sheet: run.sheet_id.0.clone(),
            });
        }
        self.next_run_id += 1;
        let id = RunId(self.next_run_id);
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);
        self.runs.push(StoredRun {
            id,
            run: run.clone(),
            created_at: format_utc(secs),
        });
        Ok(id)
    }

    fn list_runs(&self, sheet: &SheetId) -> Result<Vec<StoredRun>, StorageError> {
        if !self.sheets.contains_key(sheet) {
            return Err(StorageError::SheetNotFound {
                sheet: sheet.0.clone(),
            });
        }
        Ok(self
            .runs
            .iter()
            .rev()
            .filter(|r| &r.run.sheet_id == sheet)
            .cloned()
            .collect())
    }
}

/// Formats Unix seconds the way SQLite's `CURRENT_TIMESTAMP` does.
fn format_utc(secs: i64) -> String {
    let (days, rem) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    // Civil-from-days over 400-year eras starting at 0000-03-01.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year,
        month,
        day,
        rem / 3_600,
        rem % 3_600 / 60,
        rem % 60
    )
}
