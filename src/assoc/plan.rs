//! A mutable rooted-forest view over an association graph.
//!
//! The edge set is fixed at construction; only edge direction changes.
//! During plan determination many orientations are evaluated, so `flip` is
//! O(1) and the directed view (`sources`, `destinations_of`) is derived from
//! an orientation-bit array plus incrementally maintained in-degrees.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::assoc::graph::{AssociationGraph, EdgeIx, NodeIx};
use crate::error::{Result, TramaError};

/// Snapshot of a plan's edge directions, indexed by edge id.
///
/// Displayed as a bit string (`0` = metadata direction, `1` = reversed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Orientation(Vec<bool>);

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &bit in &self.0 {
            f.write_char(if bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

/// One candidate rooted-forest interpretation of an association graph.
pub struct QueryPlan {
    graph: Arc<AssociationGraph>,
    reversed: Vec<bool>,
    in_degree: Vec<u32>,
}

impl QueryPlan {
    /// Wraps a graph in its initial orientation: every edge points the way
    /// the metadata declared it (parent to child).
    pub fn new(graph: Arc<AssociationGraph>) -> Self {
        let mut in_degree = vec![0u32; graph.node_count()];
        for e in graph.edge_indexes() {
            in_degree[graph.edge(e).b.0 as usize] += 1;
        }
        Self {
            reversed: vec![false; graph.edge_count()],
            graph,
            in_degree,
        }
    }

    /// The underlying (immutable) graph.
    pub fn graph(&self) -> &Arc<AssociationGraph> {
        &self.graph
    }

    /// The oriented `(source, target)` endpoints of an edge.
    pub fn edge_endpoints(&self, e: EdgeIx) -> (NodeIx, NodeIx) {
        let edge = self.graph.edge(e);
        if self.reversed[e.0 as usize] {
            (edge.b, edge.a)
        } else {
            (edge.a, edge.b)
        }
    }

    /// True if the edge currently points child-to-parent.
    pub fn is_reversed(&self, e: EdgeIx) -> bool {
        self.reversed[e.0 as usize]
    }

    /// Nodes with no incoming edge under the current orientation.
    ///
    /// Never empty: worst case, the root entity itself.
    pub fn sources(&self) -> Vec<NodeIx> {
        self.graph
            .node_indexes()
            .filter(|n| self.in_degree[n.0 as usize] == 0)
            .collect()
    }

    /// Nodes reachable from `n` via one outgoing edge.
    pub fn destinations_of(&self, n: NodeIx) -> Vec<NodeIx> {
        self.graph
            .node(n)
            .edges
            .iter()
            .filter_map(|&e| {
                let (src, tgt) = self.edge_endpoints(e);
                (src == n).then_some(tgt)
            })
            .collect()
    }

    /// The edge between two nodes, if one exists.
    pub fn edge_between(&self, n1: NodeIx, n2: NodeIx) -> Option<EdgeIx> {
        self.graph.node(n1).edges.iter().copied().find(|&e| {
            let edge = self.graph.edge(e);
            (edge.a == n1 && edge.b == n2) || (edge.a == n2 && edge.b == n1)
        })
    }

    /// Toggles the direction of the edge between `n1` and `n2`.
    ///
    /// Never fails for adjacent nodes; non-adjacent nodes are an error.
    pub fn flip(&mut self, n1: NodeIx, n2: NodeIx) -> Result<()> {
        let e = self.edge_between(n1, n2).ok_or_else(|| {
            TramaError::InvalidArgument(format!("no edge between nodes {n1} and {n2}"))
        })?;
        self.flip_edge(e);
        Ok(())
    }

    /// Toggles one edge's direction. O(1).
    pub fn flip_edge(&mut self, e: EdgeIx) {
        let (src, tgt) = self.edge_endpoints(e);
        self.reversed[e.0 as usize] = !self.reversed[e.0 as usize];
        self.in_degree[tgt.0 as usize] -= 1;
        self.in_degree[src.0 as usize] += 1;
    }

    /// Snapshot of the current orientation.
    pub fn orientation(&self) -> Orientation {
        Orientation(self.reversed.clone())
    }

    /// Re-installs a previously captured orientation.
    pub fn restore(&mut self, orientation: &Orientation) -> Result<()> {
        if orientation.0.len() != self.reversed.len() {
            return Err(TramaError::InvalidArgument(
                "orientation does not match plan edge count".into(),
            ));
        }
        for e in self.graph.edge_indexes() {
            if self.reversed[e.0 as usize] != orientation.0[e.0 as usize] {
                self.flip_edge(e);
            }
        }
        Ok(())
    }

    /// Node indexes in a topological order of the current orientation.
    ///
    /// Any orientation of the (acyclic) base structure is a DAG, so this
    /// always succeeds. Ties resolve in arena order, making the result
    /// deterministic.
    pub fn topological_order(&self) -> Vec<NodeIx> {
        let mut degree = self.in_degree.clone();
        let mut ready: Vec<NodeIx> = self.sources();
        let mut order = Vec::with_capacity(degree.len());
        while let Some(n) = ready.pop() {
            order.push(n);
            for tgt in self.destinations_of(n) {
                degree[tgt.0 as usize] -= 1;
                if degree[tgt.0 as usize] == 0 {
                    ready.push(tgt);
                }
            }
        }
        order
    }

    /// Renders the oriented forest as `alias -> alias` lines.
    pub fn tree_string(&self) -> String {
        let mut out = String::new();
        if self.graph.node_count() == 1 {
            out.push_str(&self.graph.node(self.graph.root()).alias);
            return out;
        }
        for source in self.sources() {
            self.tree_string_from(source, &mut out);
        }
        out
    }

    fn tree_string_from(&self, start: NodeIx, out: &mut String) {
        for dest in self.destinations_of(start) {
            let _ = writeln!(
                out,
                "{} -> {}",
                self.graph.node(start).alias,
                self.graph.node(dest).alias
            );
            self.tree_string_from(dest, out);
        }
    }
}
