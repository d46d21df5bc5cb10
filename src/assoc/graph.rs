//! Arena model of the association topology.
//!
//! The graph is built once from metadata and never changes shape afterwards;
//! only the orientation layer in [`crate::assoc::plan::QueryPlan`] is
//! mutable. Nodes and edges live in arenas addressed by index newtypes, so
//! the structure has no pointer cycles to manage.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, TramaError};
use crate::metadata::{AssociationDef, EntityMetadata, MetadataProvider};

/// Index of a node in an [`AssociationGraph`] arena.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeIx(pub u32);

/// Index of an edge in an [`AssociationGraph`] arena.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeIx(pub u32);

impl fmt::Display for NodeIx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeIx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entity occurrence participating in a plan.
///
/// The same entity reached along two different association chains yields two
/// nodes; `alias` disambiguates them (`name_index`).
#[derive(Debug)]
pub struct GraphNode {
    /// Metadata of the entity this node fetches.
    pub entity: Arc<EntityMetadata>,
    /// Stable display identity, `{entity}_{index}`.
    pub alias: String,
    /// Edges incident to this node, in construction order.
    pub edges: Vec<EdgeIx>,
}

/// One association between two nodes.
///
/// Endpoints never change after construction. `a` is the parent in the
/// metadata tree; the *oriented* direction is owned by the plan layer.
#[derive(Debug)]
pub struct GraphEdge {
    /// Metadata-parent endpoint.
    pub a: NodeIx,
    /// Metadata-child endpoint.
    pub b: NodeIx,
    /// The association that produced this edge.
    pub assoc: AssociationDef,
}

/// Immutable association topology rooted at one entity.
#[derive(Debug)]
pub struct AssociationGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl AssociationGraph {
    /// Builds the graph by descending through declared associations from
    /// `root`, creating a node for every entity occurrence.
    ///
    /// Fails before any planning begins if an association names an unknown
    /// entity, or if the metadata loops back onto an entity already on the
    /// current descent path (cycles must be excluded upstream).
    pub fn build(root: &str, provider: &dyn MetadataProvider) -> Result<Self> {
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        let mut on_path = Vec::new();
        graph.descend(root, provider, &mut on_path)?;
        debug!(
            root,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "association graph built"
        );
        Ok(graph)
    }

    fn descend(
        &mut self,
        entity: &str,
        provider: &dyn MetadataProvider,
        on_path: &mut Vec<String>,
    ) -> Result<NodeIx> {
        if on_path.iter().any(|e| e == entity) {
            return Err(TramaError::AssociationCycle(entity.to_string()));
        }
        let md = provider.entity(entity)?;
        let ix = NodeIx(self.nodes.len() as u32);
        self.nodes.push(GraphNode {
            alias: format!("{}_{}", md.name, ix),
            entity: md.clone(),
            edges: Vec::new(),
        });
        debug!(entity, alias = %self.nodes[ix.0 as usize].alias, "traverse");
        on_path.push(entity.to_string());
        for assoc in &md.associations {
            let child = self.descend(&assoc.entity, provider, on_path)?;
            let eix = EdgeIx(self.edges.len() as u32);
            self.edges.push(GraphEdge {
                a: ix,
                b: child,
                assoc: assoc.clone(),
            });
            self.nodes[ix.0 as usize].edges.push(eix);
            self.nodes[child.0 as usize].edges.push(eix);
        }
        on_path.pop();
        Ok(ix)
    }

    /// The root node (always present, always index 0).
    pub fn root(&self) -> NodeIx {
        NodeIx(0)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Looks up a node by index.
    pub fn node(&self, ix: NodeIx) -> &GraphNode {
        &self.nodes[ix.0 as usize]
    }

    /// Looks up an edge by index.
    pub fn edge(&self, ix: EdgeIx) -> &GraphEdge {
        &self.edges[ix.0 as usize]
    }

    /// Iterates node indexes in arena order.
    pub fn node_indexes(&self) -> impl Iterator<Item = NodeIx> {
        (0..self.nodes.len() as u32).map(NodeIx)
    }

    /// Iterates edge indexes in arena order.
    pub fn edge_indexes(&self) -> impl Iterator<Item = EdgeIx> {
        (0..self.edges.len() as u32).map(EdgeIx)
    }
}
