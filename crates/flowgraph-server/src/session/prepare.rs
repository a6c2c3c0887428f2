//! Turns a stored sheet into a launch plan: which files to upload, what to
//! run and with which environment.

use flowgraph_core::{
    is_env_file, merge_env, parse_env_file, select_entry, EnvVars, Language, PipelineGraph,
    SourceFile,
};
use flowgraph_source::{extract_graph, instrument};
use flowgraph_storage::Sheet;

use crate::config::{GraphMode, ServerConfig};
use crate::error::SessionError;
use crate::worker::Launch;

/// Everything a session needs after the Preparing phase.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub language: Language,
    /// Files to upload in declared order, the entry possibly instrumented.
    pub uploads: Vec<SourceFile>,
    pub entry: String,
    pub launch: Launch,
    pub env: EnvVars,
    /// Graph extracted host-side in static mode.
    pub static_graph: Option<PipelineGraph>,
}

/// Builds the launch plan for `sheet`. Fails before anything is uploaded
/// when the sheet has no files or its language cannot be run.
pub fn prepare(sheet: &Sheet, config: &ServerConfig) -> Result<PreparedRun, SessionError> {
    let first = sheet.files.first().ok_or(SessionError::NoFiles)?;
    let language: Language = first.language.parse()?;
    let entry = select_entry(&sheet.files, language)
        .ok_or(SessionError::NoFiles)?
        .filename
        .clone();

    let mut uploads = sheet.files.clone();
    let mut static_graph = None;
    if language.extracts_graph() {
        if let Some(file) = uploads.iter_mut().find(|f| f.filename == entry) {
            match config.graph_mode {
                GraphMode::Runtime => file.code = instrument(&file.code),
                GraphMode::Static => static_graph = Some(extract_graph(&file.code)),
            }
        }
    }

    Ok(PreparedRun {
        language,
        launch: Launch {
            program: config.interpreter(language).to_string(),
            args: vec![entry.clone()],
        },
        env: collect_env(&sheet.files),
        entry,
        uploads,
        static_graph,
    })
}

/// Merges every `.env` file in declared order; later files win.
pub fn collect_env(files: &[SourceFile]) -> EnvVars {
    let mut env = EnvVars::new();
    for file in files.iter().filter(|f| is_env_file(&f.filename)) {
        merge_env(&mut env, parse_env_file(&file.code));
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_source::routine::{HOOK_MARKER, ROUTINE_SIGNATURE};
    use flowgraph_storage::{PlaygroundId, SheetId};

    const PIPELINE: &str = "\
def create_agent():
    g.add_node('start', start)
    g.add_edge('start', END)

if __name__ == '__main__':
    create_agent()
";

    fn sheet(files: Vec<SourceFile>) -> Sheet {
        Sheet {
            id: SheetId::from("s"),
            playground_id: PlaygroundId::from("p"),
            title: "t".into(),
            files,
            graph: None,
        }
    }

    #[test]
    fn python_entry_is_instrumented_in_runtime_mode() {
        let s = sheet(vec![
            SourceFile::new("helpers.py", "X = 1\n", "Python"),
            SourceFile::new("main.py", PIPELINE, "python"),
        ]);
        let run = prepare(&s, &ServerConfig::default()).unwrap();
        assert_eq!(run.entry, "main.py");
        assert_eq!(run.launch.to_string(), "python3 main.py");
        assert_eq!(run.uploads[0].code, "X = 1\n");
        assert!(run.uploads[1].code.contains(ROUTINE_SIGNATURE));
        assert!(run.uploads[1].code.contains(HOOK_MARKER));
        assert!(run.static_graph.is_none());
    }

    #[test]
    fn static_mode_extracts_and_uploads_verbatim() {
        let config = ServerConfig {
            graph_mode: GraphMode::Static,
            ..Default::default()
        };
        let s = sheet(vec![SourceFile::new("app.py", PIPELINE, "python")]);
        let run = prepare(&s, &config).unwrap();
        assert_eq!(run.uploads[0].code, PIPELINE);
        let graph = run.static_graph.unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges[0].target, "output");
    }

    #[test]
    fn javascript_runs_untouched_with_node() {
        let s = sheet(vec![
            SourceFile::new("util.js", "module.exports = 1;", "javascript"),
            SourceFile::new("index.js", "console.log(1);", "javascript"),
        ]);
        let run = prepare(&s, &ServerConfig::default()).unwrap();
        assert_eq!(run.launch.to_string(), "node index.js");
        assert_eq!(run.uploads[1].code, "console.log(1);");
    }

    #[test]
    fn unsupported_language_and_empty_sheet_fail() {
        let s = sheet(vec![SourceFile::new("a.rb", "", "ruby")]);
        let err = prepare(&s, &ServerConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedLanguage { .. }));
        let err = prepare(&sheet(vec![]), &ServerConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::NoFiles));
    }

    #[test]
    fn later_env_file_wins() {
        let files = vec![
            SourceFile::new("main.py", "", "python"),
            SourceFile::new("base.env", "KEY=base\nA=1\n", "text"),
            SourceFile::new("notes.txt", "KEY=ignored\n", "text"),
            SourceFile::new("local.env", "# override\nKEY=local\n", "text"),
        ];
        let env = collect_env(&files);
        assert_eq!(env["KEY"], "local");
        assert_eq!(env["A"], "1");
        assert_eq!(env.len(), 2);
    }
}
