#![forbid(unsafe_code)]

//! Association query planning.
//!
//! A query against an entity with declared associations is planned as a
//! graph: one node per entity occurrence, one edge per association. The
//! plan layer assigns each edge a direction (which endpoint is fetched
//! first), iterators enumerate candidate direction assignments, and an
//! external cost model picks the cheapest.

pub mod choose;
pub mod graph;
pub mod iter;
pub mod plan;

pub use choose::{choose_plan, ChosenPlan, PlanScorer};
pub use graph::{AssociationGraph, EdgeIx, GraphEdge, GraphNode, NodeIx};
pub use iter::{BruteForce, First, QueryPlanIterator};
pub use plan::{Orientation, QueryPlan};
