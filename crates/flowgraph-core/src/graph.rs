//! PipelineGraph: the recovered description of an agent pipeline.
//!
//! A [`PipelineGraph`] is an ordered list of [`GraphNode`]s (processing steps)
//! and [`GraphEdge`]s (control flow between them). It is produced by graph
//! extraction, carried inside a graph frame as pretty-printed JSON, decoded on
//! the host, and persisted against the sheet it was extracted from.
//!
//! Ordering is discovery order, never sorted. Node ids are *expected* to be
//! unique but this is not enforced: a pipeline that registers the same id
//! twice yields two nodes with that id.

use serde::{Deserialize, Serialize};

/// Reserved node id standing in for pipeline termination.
pub const OUTPUT_NODE_ID: &str = "output";

/// Docstring attached to the synthetic terminal node.
pub const OUTPUT_NODE_DOCSTRING: &str = "Aggregated output of every edge that ends the pipeline.";

/// Rendering hint for a node. Not semantically load-bearing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A processing step in the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Node identifier as registered by the pipeline builder.
    pub id: String,
    /// Display label (same as `id` for discovered nodes).
    pub label: String,
    /// Cleaned docstring of the handler function, or empty.
    #[serde(default)]
    pub docstring: String,
    /// Declared positional parameter names of the handler.
    #[serde(default)]
    pub function_arguments: Vec<String>,
    /// Prompt text recovered from the handler's model invocation.
    #[serde(default)]
    pub prompt: String,
    /// Model identifier backing the handler's client instance, or empty.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub position: Position,
}

/// A control-flow edge between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// `edge-<k>` where `k` is the insertion index.
    pub id: String,
    pub source: String,
    pub target: String,
    /// Reserved for future use; always empty today.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The recovered pipeline graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Set when extraction failed; `nodes` and `edges` are then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the empty graph reported when extraction fails.
    pub fn failed(message: impl Into<String>) -> Self {
        PipelineGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Appends a node. Duplicate ids are kept.
    pub fn push_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Appends an edge with the next sequential `edge-<k>` id.
    pub fn push_edge(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let id = format!("edge-{}", self.edges.len());
        self.edges.push(GraphEdge {
            id,
            source: source.into(),
            target: target.into(),
            metadata: serde_json::Map::new(),
        });
    }

    /// Returns `true` if any edge ends the pipeline.
    pub fn has_terminal_edge(&self) -> bool {
        self.edges.iter().any(|e| e.target == OUTPUT_NODE_ID)
    }

    /// Appends the synthetic `output` node at `position` when some edge
    /// targets it. Returns whether a node was added.
    pub fn close_with_output_node(&mut self, position: Position) -> bool {
        if !self.has_terminal_edge() {
            return false;
        }
        self.nodes.push(GraphNode {
            id: OUTPUT_NODE_ID.to_string(),
            label: OUTPUT_NODE_ID.to_string(),
            docstring: OUTPUT_NODE_DOCSTRING.to_string(),
            function_arguments: Vec::new(),
            prompt: String::new(),
            model: String::new(),
            position,
        });
        true
    }

    /// Looks up the first node registered under `id`.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns `true` if extraction reported an error.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
