//! SQLite implementation of [`SheetStore`].
//!
//! [`SqliteStore`] keeps sheets, their files and their runs in a SQLite
//! database with WAL mode, a transaction around every write, and automatic
//! schema migrations. Graphs and timings are stored as JSON TEXT columns via
//! serde_json.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use flowgraph_core::{PipelineGraph, SourceFile};

use crate::error::StorageError;
use crate::traits::SheetStore;
use crate::types::{PlaygroundId, RunId, RunRecord, Sheet, SheetId, SheetSummary, StoredRun};

/// SQLite-backed implementation of [`SheetStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    fn assert_sheet_exists(
        conn: &Connection,
        sheet: &SheetId,
        playground: Option<&PlaygroundId>,
    ) -> Result<(), StorageError> {
        let exists: bool = match playground {
            Some(pg) => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sheets WHERE id = ?1 AND playground_id = ?2)",
                params![sheet.0, pg.0],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sheets WHERE id = ?1)",
                params![sheet.0],
                |row| row.get(0),
            )?,
        };
        if !exists {
            return Err(StorageError::SheetNotFound {
                sheet: sheet.0.clone(),
            });
        }
        Ok(())
    }

    fn write_files(
        tx: &Transaction<'_>,
        sheet: &SheetId,
        files: &[SourceFile],
    ) -> Result<(), StorageError> {
        tx.execute("DELETE FROM sheet_files WHERE sheet_id = ?1", params![sheet.0])?;
        let mut stmt = tx.prepare_cached(
            "INSERT INTO sheet_files (sheet_id, position, filename, code, language)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, file) in files.iter().enumerate() {
            stmt.execute(params![
                sheet.0,
                position as i64,
                file.filename,
                file.code,
                file.language
            ])?;
        }
        Ok(())
    }

    fn load_files(&self, sheet: &SheetId) -> Result<Vec<SourceFile>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT filename, code, language FROM sheet_files
             WHERE sheet_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![sheet.0], |row| {
            Ok(SourceFile {
                filename: row.get(0)?,
                code: row.get(1)?,
                language: row.get(2)?,
            })
        })?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }
}

impl SheetStore for SqliteStore {
    fn create_sheet(
        &mut self,
        playground: &PlaygroundId,
        title: &str,
        files: &[SourceFile],
    ) -> Result<SheetId, StorageError> {
        let id = SheetId::generate();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sheets (id, playground_id, title) VALUES (?1, ?2, ?3)",
            params![id.0, playground.0, title],
        )?;
        Self::write_files(&tx, &id, files)?;
        tx.commit()?;
        Ok(id)
    }

    fn get_sheet(&self, sheet: &SheetId, playground: &PlaygroundId) -> Result<Sheet, StorageError> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT title, graph FROM sheets WHERE id = ?1 AND playground_id = ?2",
                params![sheet.0, playground.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((title, graph)) = row else {
            return Err(StorageError::SheetNotFound {
                sheet: sheet.0.clone(),
            });
        };
        let graph = graph
            .map(|json| serde_json::from_str::<PipelineGraph>(&json))
            .transpose()?;

        Ok(Sheet {
            id: sheet.clone(),
            playground_id: playground.clone(),
            title,
            files: self.load_files(sheet)?,
            graph,
        })
    }

    fn list_sheets(&self, playground: &PlaygroundId) -> Result<Vec<SheetSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT s.id, s.title,
                    (SELECT COUNT(*) FROM sheet_files f WHERE f.sheet_id = s.id)
             FROM sheets s WHERE s.playground_id = ?1 ORDER BY s.rowid",
        )?;
        let rows = stmt.query_map(params![playground.0], |row| {
            let id: String = row.get(0)?;
            let count: i64 = row.get(2)?;
            Ok(SheetSummary {
                id: SheetId(id),
                title: row.get(1)?,
                file_count: count as usize,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn replace_files(
        &mut self,
        sheet: &SheetId,
        playground: &PlaygroundId,
        files: &[SourceFile],
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_sheet_exists(&tx, sheet, Some(playground))?;
        Self::write_files(&tx, sheet, files)?;
        tx.commit()?;
        Ok(())
    }

    fn save_graph(&mut self, sheet: &SheetId, graph: &PipelineGraph) -> Result<(), StorageError> {
        let json = serde_json::to_string(graph)?;
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE sheets SET graph = ?1 WHERE id = ?2",
            params![json, sheet.0],
        )?;
        if changed == 0 {
            return Err(StorageError::SheetNotFound {
                sheet: sheet.0.clone(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_run(&mut self, run: &RunRecord) -> Result<RunId, StorageError> {
        let timings = run.timings.as_ref().map(serde_json::to_string).transpose()?;
        let tx = self.conn.transaction()?;
        Self::assert_sheet_exists(&tx, &run.sheet_id, None)?;
        tx.execute(
            "INSERT INTO runs (sheet_id, output, timings, exit_code) VALUES (?1, ?2, ?3, ?4)",
            params![run.sheet_id.0, run.output, timings, run.exit_code],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(RunId(id))
    }

    fn list_runs(&self, sheet: &SheetId) -> Result<Vec<StoredRun>, StorageError> {
        Self::assert_sheet_exists(&self.conn, sheet, None)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, output, timings, exit_code, created_at FROM runs
             WHERE sheet_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![sheet.0], |row| {
            let id: i64 = row.get(0)?;
            let output: String = row.get(1)?;
            let timings: Option<String> = row.get(2)?;
            let exit_code: Option<i32> = row.get(3)?;
            let created_at: String = row.get(4)?;
            Ok((id, output, timings, exit_code, created_at))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, output, timings, exit_code, created_at) = row?;
            let timings = timings
                .map(|json| serde_json::from_str::<serde_json::Value>(&json))
                .transpose()?;
            result.push(StoredRun {
                id: RunId(id),
                run: RunRecord {
                    sheet_id: sheet.clone(),
                    output,
                    timings,
                    exit_code,
                },
                created_at,
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::GraphNode;

    fn files() -> Vec<SourceFile> {
        vec![
            SourceFile::new("main.py", "print('hi')\n", "python"),
            SourceFile::new("local.env", "KEY=1\n", "text"),
        ]
    }

    #[test]
    fn create_and_get_sheet() {
        let mut store = SqliteStore::in_memory().unwrap();
        let pg = PlaygroundId::from("pg-1");
        let id = store.create_sheet(&pg, "Trip planner", &files()).unwrap();

        let sheet = store.get_sheet(&id, &pg).unwrap();
        assert_eq!(sheet.title, "Trip planner");
        assert_eq!(sheet.files, files());
        assert!(sheet.graph.is_none());
    }

    #[test]
    fn sheet_is_scoped_to_playground() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.create_sheet(&"pg-1".into(), "t", &[]).unwrap();
        let err = store.get_sheet(&id, &"pg-2".into()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn replace_files_keeps_declared_order() {
        let mut store = SqliteStore::in_memory().unwrap();
        let pg = PlaygroundId::from("pg");
        let id = store.create_sheet(&pg, "t", &files()).unwrap();
        let replaced = vec![
            SourceFile::new("b.py", "b", "python"),
            SourceFile::new("a.py", "a", "python"),
        ];
        store.replace_files(&id, &pg, &replaced).unwrap();
        assert_eq!(store.get_sheet(&id, &pg).unwrap().files, replaced);
        assert_eq!(store.list_sheets(&pg).unwrap()[0].file_count, 2);
    }

    #[test]
    fn save_graph_overwrites() {
        let mut store = SqliteStore::in_memory().unwrap();
        let pg = PlaygroundId::from("pg");
        let id = store.create_sheet(&pg, "t", &[]).unwrap();

        let mut graph = PipelineGraph::new();
        graph.push_node(GraphNode {
            id: "start".into(),
            label: "start".into(),
            ..Default::default()
        });
        store.save_graph(&id, &PipelineGraph::failed("boom")).unwrap();
        store.save_graph(&id, &graph).unwrap();
        assert_eq!(store.get_sheet(&id, &pg).unwrap().graph, Some(graph));

        let missing = store.save_graph(&SheetId::from("nope"), &PipelineGraph::new());
        assert!(missing.unwrap_err().is_not_found());
    }

    #[test]
    fn runs_listed_newest_first() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.create_sheet(&"pg".into(), "t", &[]).unwrap();
        let first = RunRecord {
            sheet_id: id.clone(),
            output: "one".into(),
            timings: Some(serde_json::json!({ "total": 1.25 })),
            exit_code: Some(0),
        };
        let second = RunRecord {
            sheet_id: id.clone(),
            output: "two".into(),
            timings: None,
            exit_code: None,
        };
        let a = store.insert_run(&first).unwrap();
        let b = store.insert_run(&second).unwrap();
        assert!(a.0 < b.0);

        let runs = store.list_runs(&id).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run, second);
        assert_eq!(runs[1].run, first);
        assert_eq!(runs[0].created_at.len(), "2024-01-01 00:00:00".len());
        assert!(runs[0].created_at >= runs[1].created_at);
    }

    #[test]
    fn run_for_unknown_sheet_is_rejected() {
        let mut store = SqliteStore::in_memory().unwrap();
        let run = RunRecord {
            sheet_id: SheetId::from("ghost"),
            output: String::new(),
            timings: None,
            exit_code: Some(1),
        };
        assert!(store.insert_run(&run).unwrap_err().is_not_found());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheets.db");
        let pg = PlaygroundId::from("pg");
        let id = {
            let mut store = SqliteStore::new(&path).unwrap();
            store.create_sheet(&pg, "persisted", &files()).unwrap()
        };
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get_sheet(&id, &pg).unwrap().title, "persisted");
    }
}
