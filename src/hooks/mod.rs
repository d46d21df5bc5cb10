#![forbid(unsafe_code)]

//! Post-operation hook dispatch.
//!
//! After a CRUD operation completes, one [`HookDoc`] snapshot is produced
//! per affected document and handed, read-only, to every hook bound to the
//! event. Dispatch is best-effort: a failing hook is reported but already
//! applied mutations are not rolled back.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::crud::context::{CrudOperation, DocCtx, OperationContext};
use crate::error::{Result, TramaError};
use crate::metadata::{EntityMetadata, HookBinding};

/// Immutable before/after snapshot of one document, one per affected
/// document per operation.
///
/// The pre-image is absent for insert and find; the post-image is absent
/// for delete. Hooks observe the in-memory result of the operation, not
/// necessarily durable state, and must treat the images as read-only.
#[derive(Clone, Debug)]
pub struct HookDoc {
    entity: Arc<EntityMetadata>,
    pre: Option<Value>,
    post: Option<Value>,
    operation: CrudOperation,
    when: OffsetDateTime,
    actor: Option<String>,
}

impl HookDoc {
    /// Builds the snapshot for one document slot, once the performed
    /// operation is known. Returns `None` when nothing was performed.
    pub fn for_doc(
        entity: Arc<EntityMetadata>,
        doc: &DocCtx,
        actor: Option<String>,
    ) -> Option<Self> {
        let operation = doc.performed()?;
        let pre = match operation {
            CrudOperation::Insert | CrudOperation::Find => None,
            CrudOperation::Update | CrudOperation::Delete => doc.pre().cloned(),
        };
        let post = match operation {
            CrudOperation::Delete => None,
            _ => Some(doc.doc.clone()),
        };
        Some(Self {
            entity,
            pre,
            post,
            operation,
            when: OffsetDateTime::now_utc(),
            actor,
        })
    }

    /// Metadata of the entity the document belongs to.
    pub fn entity(&self) -> &Arc<EntityMetadata> {
        &self.entity
    }

    /// The document before modification. Absent for insert and find.
    pub fn pre(&self) -> Option<&Value> {
        self.pre.as_ref()
    }

    /// The document after modification. Absent for delete.
    pub fn post(&self) -> Option<&Value> {
        self.post.as_ref()
    }

    /// The operation performed on the document.
    pub fn operation(&self) -> CrudOperation {
        self.operation
    }

    /// When this snapshot was created.
    pub fn when(&self) -> OffsetDateTime {
        self.when
    }

    /// The actor the operation is attributed to, if known.
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

/// A post-operation hook implementation.
pub trait CrudHook: Send + Sync {
    /// Processes the documents affected by one operation.
    fn process(&self, md: &EntityMetadata, docs: &[Arc<HookDoc>]) -> Result<()>;
}

/// Resolves hook names declared in metadata to implementations.
pub trait HookResolver: Send + Sync {
    /// The hook registered under `name`, if any.
    fn hook(&self, name: &str) -> Option<Arc<dyn CrudHook>>;
}

/// Hook resolver backed by a map, for tests and simple assemblies.
#[derive(Default)]
pub struct InMemoryHookResolver {
    hooks: FxHashMap<String, Arc<dyn CrudHook>>,
}

impl InMemoryHookResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook under `name`.
    pub fn with_hook(mut self, name: impl Into<String>, hook: Arc<dyn CrudHook>) -> Self {
        self.hooks.insert(name.into(), hook);
        self
    }
}

impl HookResolver for InMemoryHookResolver {
    fn hook(&self, name: &str) -> Option<Arc<dyn CrudHook>> {
        self.hooks.get(name).cloned()
    }
}

/// One hook failure, reported alongside the operation's results.
#[derive(Debug)]
pub struct HookError {
    /// Name of the failing hook.
    pub hook: String,
    /// The failure itself.
    pub error: TramaError,
}

fn binding_applies(binding: &HookBinding, op: CrudOperation) -> bool {
    match op {
        CrudOperation::Insert => binding.on_insert,
        CrudOperation::Update => binding.on_update,
        CrudOperation::Delete => binding.on_delete,
        CrudOperation::Find => binding.on_find,
    }
}

struct QueuedHook {
    name: String,
    hook: Arc<dyn CrudHook>,
    entity: Arc<EntityMetadata>,
    docs: Vec<Arc<HookDoc>>,
}

/// Queues hook invocations as operations complete, then dispatches them.
///
/// Snapshots are created once per affected document and shared by every
/// hook queued for that event.
pub struct HookManager {
    resolver: Arc<dyn HookResolver>,
    queued: Vec<QueuedHook>,
}

impl HookManager {
    /// Creates a manager dispatching through `resolver`.
    pub fn new(resolver: Arc<dyn HookResolver>) -> Self {
        Self {
            resolver,
            queued: Vec::new(),
        }
    }

    /// Drops all queued hooks.
    pub fn clear(&mut self) {
        self.queued.clear();
    }

    /// Queues the hooks bound to the operation's entity for every errorless
    /// document the operation actually touched.
    ///
    /// A binding naming an unknown hook is a structural error and queues
    /// nothing.
    pub fn queue(&mut self, ctx: &OperationContext) -> Result<()> {
        let md = ctx.entity();
        let mut bindings = Vec::new();
        for binding in &md.hooks {
            let hook = self
                .resolver
                .hook(&binding.name)
                .ok_or_else(|| TramaError::UnknownHook(binding.name.clone()))?;
            bindings.push((binding, hook));
        }
        if bindings.is_empty() {
            return Ok(());
        }
        // One snapshot per document, shared across every hook of the event.
        let mut per_binding: Vec<Vec<Arc<HookDoc>>> = vec![Vec::new(); bindings.len()];
        for doc in ctx.docs_without_errors() {
            let Some(op) = doc.performed() else { continue };
            let applicable: Vec<usize> = bindings
                .iter()
                .enumerate()
                .filter(|(_, (b, _))| binding_applies(b, op))
                .map(|(i, _)| i)
                .collect();
            if applicable.is_empty() {
                continue;
            }
            let snapshot = HookDoc::for_doc(md.clone(), doc, ctx.actor().map(String::from));
            if let Some(snapshot) = snapshot.map(Arc::new) {
                for i in applicable {
                    per_binding[i].push(Arc::clone(&snapshot));
                }
            }
        }
        for ((binding, hook), docs) in bindings.into_iter().zip(per_binding) {
            if docs.is_empty() {
                continue;
            }
            debug!(hook = %binding.name, docs = docs.len(), "queueing hook");
            self.queued.push(QueuedHook {
                name: binding.name.clone(),
                hook,
                entity: md.clone(),
                docs,
            });
        }
        Ok(())
    }

    /// Dispatches all queued hooks synchronously, in queue order, then
    /// clears the queue. Failures are collected, not propagated: the
    /// operation's mutations stand regardless.
    pub fn call_queued(&mut self) -> Vec<HookError> {
        let mut errors = Vec::new();
        for queued in self.queued.drain(..) {
            if let Err(error) = queued.hook.process(&queued.entity, &queued.docs) {
                warn!(hook = %queued.name, %error, "hook failed");
                errors.push(HookError {
                    hook: queued.name,
                    error,
                });
            }
        }
        errors
    }
}
