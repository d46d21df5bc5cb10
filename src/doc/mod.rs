#![forbid(unsafe_code)]

//! Document model: dotted paths and resolution over JSON trees.
//!
//! Backends hand documents to the core as generic nested-object/array trees
//! (`serde_json::Value`); this module supplies the addressing layer shared
//! by the evaluator, the interceptors, and the mediator.

pub mod path;
pub mod tree;

pub use path::{Path, PathSeg};
pub use tree::{node_at, nodes_at, set_at};
