//! Flowpad core library
//!
//! Client-side node-graph state and data-synchronization model for the
//! Flowpad editor: tagged value union, path-addressed store, execution
//! session, and document persistence.

pub mod api;
pub mod catalog;
pub mod constants;
pub mod data;
pub mod document;
pub mod error;
pub mod graph;
pub mod session;
pub mod store;
pub mod ui;

// Re-export commonly used types
pub use data::{DataClass, Metadata, Payload, Value};
pub use error::FlowError;
pub use graph::{Edge, FlowGraph, FlowNode, NodeId};
pub use store::FlowStore;
