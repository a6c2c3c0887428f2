//! Extraction error types.
//!
//! Every variant is contained by [`crate::extract::extract_graph`], which turns
//! it into the `error` field of an otherwise empty graph.

/// Failures while recovering a pipeline graph from source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The grammar could not be loaded into the parser.
    #[error("parser setup failed: {message}")]
    ParserSetup { message: String },

    /// The source does not parse.
    #[error("invalid syntax (line {line}, column {column})")]
    Syntax { line: usize, column: usize },

    /// A registration call was made with too few positional arguments.
    #[error("{method}() at line {line} needs {expected} positional arguments, got {got}")]
    MissingArgument {
        method: String,
        line: usize,
        expected: usize,
        got: usize,
    },
}
