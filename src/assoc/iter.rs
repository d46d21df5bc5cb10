//! Enumeration of distinct edge orientations over a fixed plan.
//!
//! [`BruteForce`] walks all `2^E` orientation assignments of a plan as a
//! binary counter over a stable edge ordering; [`First`] trusts the plan's
//! initial orientation and performs no search.

use std::sync::Arc;

use tracing::trace;

use crate::assoc::graph::{AssociationGraph, EdgeIx, NodeIx};
use crate::assoc::plan::QueryPlan;
use crate::error::{Result, TramaError};

/// Stateful enumerator of edge-orientation assignments.
///
/// `reset` binds the iterator to a plan; every successful `next` leaves the
/// plan configured as a distinct, not-yet-seen tree. At most one iterator
/// may drive a plan at a time; advancing an unbound iterator, or one bound
/// to a different plan, is a fail-fast error.
pub trait QueryPlanIterator {
    /// Binds the iterator to `plan`, capturing whatever per-plan state the
    /// strategy needs. Rebinding is allowed at any time.
    fn reset(&mut self, plan: &QueryPlan);

    /// Advances `plan` to the next orientation.
    ///
    /// Returns `true` if a new orientation is installed, `false` when the
    /// enumeration is exhausted; on `false` the plan is back in the
    /// orientation it had at `reset` time.
    fn next(&mut self, plan: &mut QueryPlan) -> Result<bool>;
}

/// Exhaustive orientation search.
///
/// At `reset`, edges are captured in a deterministic DFS preorder from the
/// plan's sources, giving each edge a fixed bit index. `next` treats the
/// edge list as a binary counter with the least-significant bit at the
/// highest index: it flips edges from the end toward index 0 until a flip
/// turns a bit on (carry propagation). When the scan runs past index 0 the
/// counter has overflowed, every edge is back in its reset-time direction,
/// and the enumeration is over, after exactly `2^E - 1` successful calls.
#[derive(Default)]
pub struct BruteForce {
    graph: Option<Arc<AssociationGraph>>,
    order: Vec<EdgeIx>,
    bits: Vec<bool>,
}

impl BruteForce {
    /// Creates an unbound iterator.
    pub fn new() -> Self {
        Self::default()
    }

    fn find_edges(plan: &QueryPlan, from: NodeIx, order: &mut Vec<EdgeIx>) {
        for &e in &plan.graph().node(from).edges {
            let (src, tgt) = plan.edge_endpoints(e);
            if src == from {
                order.push(e);
                Self::find_edges(plan, tgt, order);
            }
        }
    }

    fn bound_graph(&self, plan: &QueryPlan) -> Result<()> {
        let graph = self.graph.as_ref().ok_or(TramaError::UnboundIterator)?;
        if !Arc::ptr_eq(graph, plan.graph()) {
            return Err(TramaError::ForeignPlan);
        }
        Ok(())
    }
}

impl QueryPlanIterator for BruteForce {
    fn reset(&mut self, plan: &QueryPlan) {
        self.graph = Some(Arc::clone(plan.graph()));
        self.order.clear();
        for source in plan.sources() {
            Self::find_edges(plan, source, &mut self.order);
        }
        self.bits = vec![false; self.order.len()];
    }

    fn next(&mut self, plan: &mut QueryPlan) -> Result<bool> {
        self.bound_graph(plan)?;
        for i in (0..self.order.len()).rev() {
            self.bits[i] = !self.bits[i];
            plan.flip_edge(self.order[i]);
            if self.bits[i] {
                trace!(orientation = %plan.orientation(), "next orientation");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Degenerate single-plan strategy: evaluates only the initial orientation.
///
/// Used when exhaustive search is too costly and the caller trusts the
/// default plan.
#[derive(Default)]
pub struct First {
    graph: Option<Arc<AssociationGraph>>,
}

impl First {
    /// Creates an unbound iterator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryPlanIterator for First {
    fn reset(&mut self, plan: &QueryPlan) {
        self.graph = Some(Arc::clone(plan.graph()));
    }

    fn next(&mut self, plan: &mut QueryPlan) -> Result<bool> {
        let graph = self.graph.as_ref().ok_or(TramaError::UnboundIterator)?;
        if !Arc::ptr_eq(graph, plan.graph()) {
            return Err(TramaError::ForeignPlan);
        }
        Ok(false)
    }
}
