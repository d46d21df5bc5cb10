#![forbid(unsafe_code)]

//! Document query evaluation.
//!
//! Used both for final predicate application on assembled documents and for
//! in-memory filtering of fetched sub-documents, independent of planning.

pub mod context;
pub mod predicate;

pub use context::{ElementCursor, EvalContext};
pub use predicate::{evaluate, CompareOp, ContainsMode, Evaluation, Predicate};
