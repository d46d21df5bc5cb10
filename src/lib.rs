//! Trama: data-access middleware core.
//!
//! Executes structured queries and CRUD operations against entities whose
//! data may be split across multiple heterogeneous backends, joined through
//! declared associations. Three pillars:
//!
//! - [`assoc`]: the association query planner: a graph of entity
//!   occurrences whose edge orientations are enumerated so an external cost
//!   model can pick the cheapest fetch order.
//! - [`eval`]: the document query evaluation engine, with path-aware contexts
//!   over nested-object/array trees with array-element match correlation.
//! - [`crud`] and [`hooks`]: the extensible CRUD pipeline, with ordered
//!   interceptors at fixed execution points, plus before/after document
//!   snapshots for post-operation hooks.
//!
//! Metadata loading, concrete storage backends, transport, and cost models
//! are collaborators behind traits ([`metadata::MetadataProvider`],
//! [`crud::CrudController`], [`assoc::PlanScorer`],
//! [`hooks::HookResolver`]).

#![warn(missing_docs)]

pub mod assoc;
pub mod crud;
pub mod doc;
pub mod error;
pub mod eval;
pub mod hooks;
pub mod metadata;

pub use error::{Result, TramaError};
