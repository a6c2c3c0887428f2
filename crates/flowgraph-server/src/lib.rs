//! HTTP and WebSocket server for flowgraph.
//!
//! Stores sheets (multi-file agent pipelines), runs them on a worker while
//! streaming their output to a terminal client, and recovers each
//! pipeline's graph from the run.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod session;
pub mod state;
pub mod worker;
