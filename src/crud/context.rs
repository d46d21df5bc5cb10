//! Per-operation mutable state flowing through the pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TramaError;
use crate::metadata::EntityMetadata;

/// The CRUD operation being executed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudOperation {
    /// Create new documents.
    Insert,
    /// Modify existing documents.
    Update,
    /// Remove documents.
    Delete,
    /// Retrieve documents.
    Find,
}

/// One document's slot within an operation.
///
/// Carries the working document, the pre-mutation image captured before any
/// change was applied, the operation actually performed on this document
/// (set once the backend reports success), and per-document errors.
#[derive(Debug)]
pub struct DocCtx {
    /// The working document; interceptors may mutate it.
    pub doc: Value,
    pre: Option<Value>,
    performed: Option<CrudOperation>,
    /// Errors recorded against this document.
    pub errors: Vec<TramaError>,
}

impl DocCtx {
    /// A fresh slot with no pre-image (insert, find).
    pub fn new(doc: Value) -> Self {
        Self {
            doc,
            pre: None,
            performed: None,
            errors: Vec::new(),
        }
    }

    /// A slot whose pre-mutation image was captured (update, delete).
    pub fn with_pre(pre: Value, doc: Value) -> Self {
        Self {
            doc,
            pre: Some(pre),
            performed: None,
            errors: Vec::new(),
        }
    }

    /// The image captured before mutation, if any.
    pub fn pre(&self) -> Option<&Value> {
        self.pre.as_ref()
    }

    /// The operation performed on this document, once known.
    pub fn performed(&self) -> Option<CrudOperation> {
        self.performed
    }

    /// Marks the operation as performed on this document.
    pub fn set_performed(&mut self, op: CrudOperation) {
        self.performed = Some(op);
    }

    /// True if any error was recorded against this document.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Shared context for one CRUD operation against one entity.
#[derive(Debug)]
pub struct OperationContext {
    entity: Arc<EntityMetadata>,
    operation: CrudOperation,
    /// Document slots affected by this operation.
    pub docs: Vec<DocCtx>,
    actor: Option<String>,
}

impl OperationContext {
    /// Creates a context for `operation` on `entity`.
    pub fn new(entity: Arc<EntityMetadata>, operation: CrudOperation, docs: Vec<DocCtx>) -> Self {
        Self {
            entity,
            operation,
            docs,
            actor: None,
        }
    }

    /// Attributes the operation to an actor (for auditing hooks).
    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    /// The entity being operated on.
    pub fn entity(&self) -> &Arc<EntityMetadata> {
        &self.entity
    }

    /// The operation being executed.
    pub fn operation(&self) -> CrudOperation {
        self.operation
    }

    /// The actor this operation is attributed to.
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Documents without recorded errors.
    pub fn docs_without_errors(&self) -> impl Iterator<Item = &DocCtx> {
        self.docs.iter().filter(|d| !d.has_errors())
    }

    /// Consumes the context, keeping the document slots.
    pub fn into_docs(self) -> Vec<DocCtx> {
        self.docs
    }
}
