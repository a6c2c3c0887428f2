//! Python source handling for flowgraph.
//!
//! Two ways to recover the graph of an agent pipeline:
//!
//! - [`instrument`] rewrites a program so that, when run, it prints its own
//!   graph inside a graph frame on standard output;
//! - [`extract_graph`] recovers the same graph host-side from a tree-sitter
//!   parse, without running anything.

pub mod error;
pub mod extract;
pub mod instrument;
pub mod routine;

pub use error::ExtractError;
pub use extract::{extract_graph, try_extract_graph, BUILDER_FUNCTION};
pub use instrument::instrument;
