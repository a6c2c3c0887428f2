//! API schema types for request/response definitions.

pub mod events;
pub mod sheets;
