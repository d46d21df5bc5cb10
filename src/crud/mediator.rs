//! CRUD execution engine.
//!
//! The mediator drives every operation through the full intercept-point
//! sequence, delegates storage to the entity's controller, and dispatches
//! hooks once the operation completes. Finds over entities with declared
//! associations run through the association planner: one fetch per plan
//! node, in the chosen orientation's topological order, with key bindings
//! flowing from already-fetched neighbors.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::assoc::{choose_plan, AssociationGraph, BruteForce, EdgeIx, NodeIx, QueryPlan};
use crate::crud::context::{CrudOperation, DocCtx, OperationContext};
use crate::crud::controller::UpdateSpec;
use crate::crud::factory::Factory;
use crate::crud::intercept::InterceptPoint;
use crate::doc::{node_at, set_at};
use crate::error::{Result, TramaError};
use crate::eval::{evaluate, Predicate};
use crate::hooks::{HookError, HookManager};
use crate::metadata::{EntityMetadata, MetadataProvider};

/// Outcome of one mediator operation.
///
/// Hook failures ride alongside the results: hooks are best-effort and the
/// operation's mutations stand regardless (documented limitation).
#[derive(Debug, Default)]
pub struct Response {
    /// Result documents (stored images, assembled finds, or deleted
    /// pre-images, depending on the operation).
    pub docs: Vec<Value>,
    /// Per-document errors recorded during execution.
    pub errors: Vec<TramaError>,
    /// Failures reported by post-operation hooks.
    pub hook_errors: Vec<HookError>,
}

/// Front door for CRUD execution against one metadata universe.
pub struct Mediator {
    factory: Arc<Factory>,
    metadata: Arc<dyn MetadataProvider>,
}

impl Mediator {
    /// Creates a mediator over the given assembly and metadata.
    pub fn new(factory: Arc<Factory>, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { factory, metadata }
    }

    /// Inserts documents into `entity`.
    pub fn insert(
        &self,
        entity: &str,
        docs: Vec<Value>,
        actor: Option<String>,
    ) -> Result<Response> {
        let md = self.metadata.entity(entity)?;
        let controller = self.factory.controller(&md.backend)?;
        let icpt = self.factory.interceptors();
        let slots = docs.into_iter().map(DocCtx::new).collect();
        let mut ctx =
            OperationContext::new(md.clone(), CrudOperation::Insert, slots).with_actor(actor);

        icpt.invoke_mediator(InterceptPoint::PreMediatorInsert, &mut ctx)?;
        icpt.invoke_controller(InterceptPoint::PreCrudInsert, &mut ctx)?;
        for doc in &mut ctx.docs {
            icpt.invoke_doc(InterceptPoint::PreCrudInsertDoc, &md, CrudOperation::Insert, doc)?;
        }

        let inputs: Vec<Value> = ctx.docs.iter().map(|d| d.doc.clone()).collect();
        let stored = controller.insert(&md, &inputs)?;
        for (slot, image) in ctx.docs.iter_mut().zip(stored) {
            slot.doc = image;
            slot.set_performed(CrudOperation::Insert);
        }

        for doc in &mut ctx.docs {
            icpt.invoke_doc(InterceptPoint::PostCrudInsertDoc, &md, CrudOperation::Insert, doc)?;
        }
        icpt.invoke_controller(InterceptPoint::PostCrudInsert, &mut ctx)?;
        icpt.invoke_mediator(InterceptPoint::PostMediatorInsert, &mut ctx)?;
        self.finish(ctx)
    }

    /// Applies `spec` to every document of `entity` matching `predicate`.
    ///
    /// Pre-images are captured before mutation; assignments and document
    /// interceptors run in-core, and the results are persisted through the
    /// controller's `save`.
    pub fn update(
        &self,
        entity: &str,
        predicate: Option<&Predicate>,
        spec: &UpdateSpec,
        actor: Option<String>,
    ) -> Result<Response> {
        let md = self.metadata.entity(entity)?;
        let controller = self.factory.controller(&md.backend)?;
        let icpt = self.factory.interceptors();
        let mut ctx =
            OperationContext::new(md.clone(), CrudOperation::Update, Vec::new()).with_actor(actor);

        icpt.invoke_mediator(InterceptPoint::PreMediatorUpdate, &mut ctx)?;
        icpt.invoke_controller(InterceptPoint::PreCrudUpdate, &mut ctx)?;

        let candidates = controller.find(&md, predicate)?;
        ctx.docs = candidates
            .into_iter()
            .map(|pre| DocCtx::with_pre(pre.clone(), pre))
            .collect();
        for doc in &mut ctx.docs {
            if let Err(e) = spec.apply(&mut doc.doc) {
                doc.errors.push(e);
                continue;
            }
            icpt.invoke_doc(InterceptPoint::PreCrudUpdateDoc, &md, CrudOperation::Update, doc)?;
        }

        let updates: Vec<Value> = ctx
            .docs
            .iter()
            .filter(|d| !d.has_errors())
            .map(|d| d.doc.clone())
            .collect();
        let saved = controller.save(&md, &updates)?;
        let mut saved = saved.into_iter();
        for doc in ctx.docs.iter_mut().filter(|d| !d.has_errors()) {
            if let Some(image) = saved.next() {
                doc.doc = image;
                doc.set_performed(CrudOperation::Update);
            }
        }

        for doc in &mut ctx.docs {
            if doc.performed().is_some() {
                icpt.invoke_doc(
                    InterceptPoint::PostCrudUpdateDoc,
                    &md,
                    CrudOperation::Update,
                    doc,
                )?;
            }
        }
        icpt.invoke_controller(InterceptPoint::PostCrudUpdate, &mut ctx)?;
        icpt.invoke_mediator(InterceptPoint::PostMediatorUpdate, &mut ctx)?;
        self.finish(ctx)
    }

    /// Removes documents of `entity` matching `predicate`.
    pub fn delete(
        &self,
        entity: &str,
        predicate: Option<&Predicate>,
        actor: Option<String>,
    ) -> Result<Response> {
        let md = self.metadata.entity(entity)?;
        let controller = self.factory.controller(&md.backend)?;
        let icpt = self.factory.interceptors();
        let mut ctx =
            OperationContext::new(md.clone(), CrudOperation::Delete, Vec::new()).with_actor(actor);

        icpt.invoke_mediator(InterceptPoint::PreMediatorDelete, &mut ctx)?;
        icpt.invoke_controller(InterceptPoint::PreCrudDelete, &mut ctx)?;

        let candidates = controller.find(&md, predicate)?;
        ctx.docs = candidates
            .into_iter()
            .map(|pre| DocCtx::with_pre(pre.clone(), pre))
            .collect();
        for doc in &mut ctx.docs {
            icpt.invoke_doc(InterceptPoint::PreCrudDeleteDoc, &md, CrudOperation::Delete, doc)?;
        }

        let removed = controller.delete(&md, predicate)?;
        for doc in &mut ctx.docs {
            if doc.pre().map_or(false, |p| removed.contains(p)) {
                doc.set_performed(CrudOperation::Delete);
            }
        }

        for doc in &mut ctx.docs {
            if doc.performed().is_some() {
                icpt.invoke_doc(
                    InterceptPoint::PostCrudDeleteDoc,
                    &md,
                    CrudOperation::Delete,
                    doc,
                )?;
            }
        }
        icpt.invoke_controller(InterceptPoint::PostCrudDelete, &mut ctx)?;
        icpt.invoke_mediator(InterceptPoint::PostMediatorDelete, &mut ctx)?;
        self.finish(ctx)
    }

    /// Retrieves documents of `entity` matching `predicate`.
    ///
    /// Entities with declared associations are assembled through the
    /// association planner; plain entities are a single controller fetch.
    /// Either way the request predicate is re-applied in memory to the
    /// final documents.
    pub fn find(
        &self,
        entity: &str,
        predicate: Option<&Predicate>,
        actor: Option<String>,
    ) -> Result<Response> {
        let md = self.metadata.entity(entity)?;
        let icpt = self.factory.interceptors();
        let mut ctx =
            OperationContext::new(md.clone(), CrudOperation::Find, Vec::new()).with_actor(actor);

        icpt.invoke_mediator(InterceptPoint::PreMediatorFind, &mut ctx)?;
        icpt.invoke_controller(InterceptPoint::PreCrudFind, &mut ctx)?;

        let mut found = if md.associations.is_empty() {
            self.factory.controller(&md.backend)?.find(&md, predicate)?
        } else {
            self.composite_find(&md, predicate)?
        };
        if let Some(p) = predicate {
            found.retain(|d| evaluate(p, d).matched);
        }
        ctx.docs = found
            .into_iter()
            .map(|d| {
                let mut slot = DocCtx::new(d);
                slot.set_performed(CrudOperation::Find);
                slot
            })
            .collect();

        for doc in &mut ctx.docs {
            icpt.invoke_doc(InterceptPoint::PostCrudFindDoc, &md, CrudOperation::Find, doc)?;
        }
        icpt.invoke_controller(InterceptPoint::PostCrudFind, &mut ctx)?;
        icpt.invoke_mediator(InterceptPoint::PostMediatorFind, &mut ctx)?;
        self.finish(ctx)
    }

    fn composite_find(
        &self,
        md: &Arc<EntityMetadata>,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Value>> {
        let graph = Arc::new(AssociationGraph::build(&md.name, self.metadata.as_ref())?);
        let mut plan = QueryPlan::new(Arc::clone(&graph));
        if graph.edge_count() > 0 {
            if let Some(scorer) = self.factory.scorer() {
                let mut iterator = BruteForce::new();
                let chosen = choose_plan(
                    &mut plan,
                    &mut iterator,
                    scorer.as_ref(),
                    self.factory.max_plan_candidates(),
                )?;
                debug!(cost = chosen.cost, explored = chosen.explored, "plan search done");
            }
        }
        debug!(plan = %plan.tree_string(), "executing composite plan");

        let mut fetched: Vec<Option<Vec<Value>>> = vec![None; graph.node_count()];
        for n in plan.topological_order() {
            let node = graph.node(n);
            let controller = self.factory.controller(&node.entity.backend)?;
            let mut clauses: Vec<Predicate> = Vec::new();
            if n == graph.root() {
                // Push the request predicate into the root fetch only when
                // it stays on root-entity fields; clauses touching the
                // (not-yet-assembled) association fields are applied by the
                // final in-memory pass instead.
                if let Some(p) = predicate {
                    if !references_associations(p, &md.associations) {
                        clauses.push(p.clone());
                    }
                }
            }
            for &e in &node.edges {
                let (src, tgt) = plan.edge_endpoints(e);
                if tgt != n {
                    continue;
                }
                let Some(neighbor_docs) = fetched[src.0 as usize].as_ref() else {
                    continue;
                };
                let edge = graph.edge(e);
                // The neighbor was fetched first; bind this fetch to the key
                // values seen on its side of the association.
                let (self_key, neighbor_key) = if edge.a == src {
                    (&edge.assoc.remote_key, &edge.assoc.local_key)
                } else {
                    (&edge.assoc.local_key, &edge.assoc.remote_key)
                };
                let mut values: Vec<Value> = Vec::new();
                for d in neighbor_docs {
                    if let Some(v) = node_at(d, neighbor_key) {
                        if !values.contains(v) {
                            values.push(v.clone());
                        }
                    }
                }
                clauses.push(Predicate::any_of(self_key.clone(), values));
            }
            debug!(node = %node.alias, clauses = clauses.len(), "fetching plan node");
            let bound = combine(clauses);
            fetched[n.0 as usize] = Some(controller.find(&node.entity, bound.as_ref())?);
        }

        assemble(&graph, &mut fetched, graph.root())
    }

    fn finish(&self, ctx: OperationContext) -> Result<Response> {
        let mut hooks = HookManager::new(Arc::clone(self.factory.hook_resolver()));
        hooks.queue(&ctx)?;
        let hook_errors = hooks.call_queued();

        let mut response = Response {
            hook_errors,
            ..Response::default()
        };
        for mut doc in ctx.into_docs() {
            response.errors.append(&mut doc.errors);
            if doc.performed().is_some() {
                response.docs.push(doc.doc);
            }
        }
        Ok(response)
    }
}

fn combine(mut clauses: Vec<Predicate>) -> Option<Predicate> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Predicate::And(clauses)),
    }
}

fn references_associations(
    pred: &Predicate,
    assocs: &[crate::metadata::AssociationDef],
) -> bool {
    let hits = |path: &crate::doc::Path| assocs.iter().any(|a| path.starts_with(&a.field));
    match pred {
        Predicate::Compare { field, .. } | Predicate::In { field, .. } => hits(field),
        Predicate::CompareFields { field, rfield, .. } => hits(field) || hits(rfield),
        Predicate::ArrayContains { array, .. } | Predicate::ArrayMatch { array, .. } => hits(array),
        Predicate::Not(inner) => references_associations(inner, assocs),
        Predicate::And(parts) | Predicate::Or(parts) => {
            parts.iter().any(|p| references_associations(p, assocs))
        }
    }
}

/// Merges fetched child documents under their metadata parent's association
/// field, recursively from `n` down the metadata tree.
fn assemble(
    graph: &AssociationGraph,
    fetched: &mut [Option<Vec<Value>>],
    n: NodeIx,
) -> Result<Vec<Value>> {
    let mut docs = fetched[n.0 as usize].take().unwrap_or_default();
    let child_edges: Vec<EdgeIx> = graph
        .node(n)
        .edges
        .iter()
        .copied()
        .filter(|&e| graph.edge(e).a == n)
        .collect();
    for e in child_edges {
        let edge = graph.edge(e);
        let children = assemble(graph, fetched, edge.b)?;
        for parent in &mut docs {
            let matching: Vec<Value> = match node_at(parent, &edge.assoc.local_key) {
                None => Vec::new(),
                Some(key) => children
                    .iter()
                    .filter(|c| node_at(c, &edge.assoc.remote_key) == Some(key))
                    .cloned()
                    .collect(),
            };
            set_at(parent, &edge.assoc.field, Value::Array(matching))?;
        }
    }
    Ok(docs)
}
