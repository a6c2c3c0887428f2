//! The introspection routine injected into Python sources.
//!
//! The routine is ordinary Python kept in `routine.py` and embedded verbatim.
//! When the instrumented program runs, it re-reads its own file, parses it
//! with the `ast` module and rebuilds the same graph that
//! [`crate::extract::extract_graph`] recovers host-side.

use flowgraph_core::FrameKind;

/// Full text of the routine, a top-level `def` at column zero.
pub const ROUTINE: &str = include_str!("routine.py");

/// Defining signature; its presence means the routine is already injected.
pub const ROUTINE_SIGNATURE: &str = "def extract_graph(";

/// Declarations the routine and the hook depend on.
pub const REQUIRED_IMPORTS: [&str; 2] = ["import ast", "import json"];

/// First line of the entry-point hook; its presence means the hook is
/// already injected.
pub const HOOK_MARKER: &str = "# ---GRAPH_STRUCTURE_HOOK---";

/// Lines of the entry-point hook, each prefixed with `indent`.
pub fn hook_lines(indent: &str) -> Vec<String> {
    let graph = FrameKind::Graph;
    [
        HOOK_MARKER.to_string(),
        "graph_json = extract_graph()".to_string(),
        format!("print(\"\\n{}\")", graph.begin()),
        "print(json.dumps(graph_json, indent=2))".to_string(),
        format!("print(\"{}\", flush=True)", graph.end()),
    ]
    .into_iter()
    .map(|line| format!("{}{}", indent, line))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routine_defines_signature_once() {
        assert!(ROUTINE.starts_with(ROUTINE_SIGNATURE));
        assert_eq!(ROUTINE.matches(ROUTINE_SIGNATURE).count(), 1);
    }

    #[test]
    fn routine_has_no_main_guard() {
        assert!(!ROUTINE.contains("__main__"));
    }

    #[test]
    fn hook_prints_graph_sentinels() {
        let lines = hook_lines("    ");
        assert_eq!(lines[0], "    # ---GRAPH_STRUCTURE_HOOK---");
        assert_eq!(lines[2], "    print(\"\\n---GRAPH_STRUCTURE_BEGIN---\")");
        assert_eq!(lines[4], "    print(\"---GRAPH_STRUCTURE_END---\", flush=True)");
    }
}
