//! Shared data model for flowgraph: pipeline graphs, marker frames, source
//! files and `.env` handling.

pub mod env;
pub mod error;
pub mod frame;
pub mod graph;
pub mod sheet;

// Re-export commonly used types
pub use env::{is_env_file, merge_env, parse_env_file, EnvVars};
pub use error::CoreError;
pub use frame::{extract_frame, strip_frames, wrap_frame, FrameKind, FrameScanner};
pub use graph::{
    GraphEdge, GraphNode, PipelineGraph, Position, OUTPUT_NODE_DOCSTRING, OUTPUT_NODE_ID,
};
pub use sheet::{select_entry, Language, SourceFile};
