//! Host-side graph extraction.
//!
//! Recovers the [`PipelineGraph`] of a Python agent pipeline from its source
//! text without running it. The pipeline is assumed to be assembled inside a
//! top-level builder function ([`BUILDER_FUNCTION`]) through
//! `<graph>.add_node(id, handler)` and `<graph>.add_edge(source, target)`
//! calls; each registration is visited in pre-order and becomes a node or an
//! edge in discovery order.
//!
//! This produces the same graph as the routine injected by
//! [`crate::instrument`], which recovers it at run time from inside the
//! program.

pub mod ast;
pub mod handler;
pub mod literal;

use std::collections::HashMap;

use flowgraph_core::{GraphNode, PipelineGraph, Position, OUTPUT_NODE_ID};

use crate::error::ExtractError;
use ast::{Call, FunctionDef, SourceTree};

/// Name of the function that assembles the pipeline.
pub const BUILDER_FUNCTION: &str = "create_agent";

/// Edge targets that mean "the pipeline ends here".
pub const TERMINAL_TARGETS: [&str; 2] = ["END", "__end__"];

const NODE_SPACING_X: f64 = 250.0;
const NODE_SPACING_Y: f64 = 100.0;

/// Diagonal layout position of the `k`-th node.
pub fn layout_position(k: usize) -> Position {
    Position {
        x: NODE_SPACING_X * k as f64,
        y: NODE_SPACING_Y * k as f64,
    }
}

/// Extracts the pipeline graph from `source`.
///
/// Never fails: any problem is reported through [`PipelineGraph::error`] on
/// an otherwise empty graph.
pub fn extract_graph(source: &str) -> PipelineGraph {
    try_extract_graph(source).unwrap_or_else(|e| PipelineGraph::failed(e.to_string()))
}

/// Like [`extract_graph`], but surfaces the failure as an error.
pub fn try_extract_graph(source: &str) -> Result<PipelineGraph, ExtractError> {
    let tree = SourceTree::parse(source)?;

    // Handlers: later definitions shadow earlier ones. Builder: the first wins.
    let mut catalog: HashMap<String, FunctionDef<'_>> = HashMap::new();
    let mut builder = None;
    for def in tree.functions() {
        if builder.is_none() && def.name == BUILDER_FUNCTION {
            builder = Some(def.node);
        }
        catalog.insert(def.name.clone(), def);
    }
    let bindings = handler::model_bindings(&tree);

    let mut graph = PipelineGraph::new();
    let Some(builder) = builder else {
        return Ok(graph);
    };

    for call in tree.calls_in(builder) {
        match call.method() {
            Some("add_node") => {
                require_args(&call, "add_node")?;
                let id = call.args[0].identifier();
                let mut node = GraphNode {
                    label: id.clone(),
                    id,
                    position: layout_position(graph.nodes.len()),
                    ..Default::default()
                };
                // Only a bare name refers to a handler; `"fn"` or `mod.fn` do not.
                let handler = call.args[1].name().and_then(|name| catalog.get(name));
                if let Some(def) = handler {
                    node.docstring = def.docstring.clone().unwrap_or_default();
                    node.function_arguments = def.params.clone();
                    node.prompt = handler::prompt_of(&tree, def.node);
                    node.model = handler::model_of(&tree, def.node, &bindings);
                }
                graph.push_node(node);
            }
            Some("add_edge") => {
                require_args(&call, "add_edge")?;
                let source = call.args[0].identifier();
                let target = call.args[1].identifier();
                let target = if TERMINAL_TARGETS.contains(&target.as_str()) {
                    OUTPUT_NODE_ID.to_string()
                } else {
                    target
                };
                graph.push_edge(source, target);
            }
            _ => {}
        }
    }

    let k = graph.nodes.len();
    graph.close_with_output_node(layout_position(k));
    Ok(graph)
}

fn require_args(call: &Call, method: &str) -> Result<(), ExtractError> {
    if call.args.len() < 2 {
        return Err(ExtractError::MissingArgument {
            method: method.to_string(),
            line: call.line,
            expected: 2,
            got: call.args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::OUTPUT_NODE_DOCSTRING;

    const PIPELINE: &str = r#"from langgraph.graph import StateGraph, END
from langchain_openai import ChatOpenAI
from langchain_core.messages import HumanMessage

llm = ChatOpenAI(model="gpt-4o")

def start(state, config=None):
    """Kick things off."""
    reply = llm.invoke([HumanMessage(content=f"Plan a trip to {state['city']}")])
    return {"plan": reply.content}

def finish(state):
    return state

def create_agent():
    graph = StateGraph(dict)
    graph.add_node("start", start)
    graph.add_node("finish", finish)
    graph.add_edge("start", "finish")
    graph.add_edge("finish", END)
    return graph.compile()

if __name__ == "__main__":
    create_agent().invoke({})
"#;

    #[test]
    fn extracts_nodes_edges_and_output() {
        let g = extract_graph(PIPELINE);
        assert!(g.error.is_none(), "{:?}", g.error);

        let ids: Vec<&str> = g.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["start", "finish", "output"]);

        let start = &g.nodes[0];
        assert_eq!(start.label, "start");
        assert_eq!(start.docstring, "Kick things off.");
        assert_eq!(start.function_arguments, vec!["state", "config"]);
        assert_eq!(start.prompt, "Plan a trip to {state['city']}");
        assert_eq!(start.model, "gpt-4o");
        assert_eq!(start.position, Position { x: 0.0, y: 0.0 });

        let finish = &g.nodes[1];
        assert_eq!(finish.prompt, "");
        assert_eq!(finish.model, "");
        assert_eq!(finish.position, Position { x: 250.0, y: 100.0 });

        let output = &g.nodes[2];
        assert_eq!(output.docstring, OUTPUT_NODE_DOCSTRING);
        assert_eq!(output.position, Position { x: 500.0, y: 200.0 });

        let edges: Vec<(&str, &str, &str)> = g
            .edges
            .iter()
            .map(|e| (e.id.as_str(), e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![("edge-0", "start", "finish"), ("edge-1", "finish", "output")]
        );
    }

    #[test]
    fn no_builder_means_empty_graph() {
        let g = extract_graph("def main():\n    pass\n");
        assert!(g.nodes.is_empty() && g.edges.is_empty());
        assert!(g.error.is_none());
    }

    #[test]
    fn no_terminal_edge_means_no_output_node() {
        let src = "def create_agent():\n    g.add_node('a', a)\n    g.add_edge('a', 'a')\n";
        let g = extract_graph(src);
        assert_eq!(g.nodes.len(), 1);
        assert!(g.node(OUTPUT_NODE_ID).is_none());
    }

    #[test]
    fn string_end_marker_is_terminal() {
        let src = "def create_agent():\n    g.add_edge('a', '__end__')\n";
        let g = extract_graph(src);
        assert_eq!(g.edges[0].target, OUTPUT_NODE_ID);
        assert_eq!(g.nodes.len(), 1);
        assert_eq!(g.nodes[0].position, Position { x: 0.0, y: 0.0 });
    }

    #[test]
    fn unknown_handler_leaves_fields_empty() {
        let src = "def create_agent():\n    g.add_node('x', tools.run)\n";
        let g = extract_graph(src);
        assert_eq!(g.nodes[0].id, "x");
        assert!(g.nodes[0].function_arguments.is_empty());
        assert_eq!(g.nodes[0].docstring, "");
    }

    #[test]
    fn quoted_handler_name_is_not_resolved() {
        let src = "def a(state):\n    \"Doc.\"\n\ndef create_agent():\n    g.add_node('x', 'a')\n";
        let g = extract_graph(src);
        assert_eq!(g.nodes[0].id, "x");
        assert_eq!(g.nodes[0].docstring, "");
        assert!(g.nodes[0].function_arguments.is_empty());
    }

    #[test]
    fn duplicate_node_ids_are_kept() {
        let src = "def create_agent():\n    g.add_node('a', f)\n    g.add_node('a', f)\n";
        assert_eq!(extract_graph(src).nodes.len(), 2);
    }

    #[test]
    fn later_definition_shadows_earlier() {
        let src = "\
def h(a):
    pass

def h(b, c):
    pass

def create_agent():
    g.add_node('n', h)
";
        assert_eq!(extract_graph(src).nodes[0].function_arguments, vec!["b", "c"]);
    }

    #[test]
    fn first_builder_is_walked() {
        let src = "\
def create_agent():
    g.add_node('first', f)

def create_agent():
    g.add_node('second', f)
";
        assert_eq!(extract_graph(src).nodes[0].id, "first");
    }

    #[test]
    fn missing_argument_becomes_error_graph() {
        let src = "def create_agent():\n    g.add_node('a', f)\n    g.add_edge('a')\n";
        let err = try_extract_graph(src).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingArgument {
                method: "add_edge".into(),
                line: 3,
                expected: 2,
                got: 1,
            }
        );
        let g = extract_graph(src);
        assert!(g.nodes.is_empty() && g.edges.is_empty());
        assert_eq!(
            g.error.as_deref(),
            Some("add_edge() at line 3 needs 2 positional arguments, got 1")
        );
    }

    #[test]
    fn syntax_error_becomes_error_graph() {
        let g = extract_graph("def create_agent(:\n");
        assert!(g.error.unwrap().starts_with("invalid syntax"));
    }
}
