//! Backend executor seam.
//!
//! One controller per data store. The core hands a controller a
//! single-entity slice of work and gets documents back as generic
//! nested-object/array trees; everything else about the backend (protocol,
//! transactions, durability) is the controller's business.

use std::sync::Mutex;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::doc::{node_at, set_at, Path};
use crate::error::{acquire_lock, Result};
use crate::eval::{evaluate, Predicate};
use crate::metadata::EntityMetadata;

/// Field assignments applied by an update.
///
/// The update-expression language is out of scope; the core applies plain
/// `set` assignments and replaces whole documents through [`CrudController::save`].
#[derive(Clone, Debug, Default)]
pub struct UpdateSpec {
    /// `(path, value)` assignments, applied in order.
    pub set: Vec<(Path, Value)>,
}

impl UpdateSpec {
    /// Creates an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one assignment.
    pub fn set(mut self, path: Path, value: Value) -> Self {
        self.set.push((path, value));
        self
    }

    /// Applies every assignment to `doc`.
    pub fn apply(&self, doc: &mut Value) -> Result<()> {
        for (path, value) in &self.set {
            set_at(doc, path, value.clone())?;
        }
        Ok(())
    }
}

/// CRUD executor for one backend.
pub trait CrudController: Send + Sync {
    /// Stores new documents, returning the stored images in input order.
    fn insert(&self, md: &EntityMetadata, docs: &[Value]) -> Result<Vec<Value>>;

    /// Replaces existing documents (matched by identity fields), returning
    /// the persisted images in input order.
    fn save(&self, md: &EntityMetadata, docs: &[Value]) -> Result<Vec<Value>>;

    /// Fetches documents matching `predicate` (all documents when `None`).
    fn find(&self, md: &EntityMetadata, predicate: Option<&Predicate>) -> Result<Vec<Value>>;

    /// Removes documents matching `predicate`, returning the removed images.
    fn delete(&self, md: &EntityMetadata, predicate: Option<&Predicate>) -> Result<Vec<Value>>;
}

/// Volatile document store used for tests or prototyping.
///
/// Documents live in per-entity vectors; identity matching for `save` uses
/// the entity's declared identity fields.
#[derive(Default)]
pub struct InMemoryController {
    collections: Mutex<FxHashMap<String, Vec<Value>>>,
}

impl InMemoryController {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored for `entity`.
    pub fn len(&self, entity: &str) -> usize {
        self.collections
            .lock()
            .map(|c| c.get(entity).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn same_identity(md: &EntityMetadata, a: &Value, b: &Value) -> bool {
        !md.identity_fields.is_empty()
            && md
                .identity_fields
                .iter()
                .all(|f| node_at(a, f).is_some() && node_at(a, f) == node_at(b, f))
    }
}

impl CrudController for InMemoryController {
    fn insert(&self, md: &EntityMetadata, docs: &[Value]) -> Result<Vec<Value>> {
        let mut collections = acquire_lock(&self.collections)?;
        let stored = collections.entry(md.name.clone()).or_default();
        stored.extend(docs.iter().cloned());
        Ok(docs.to_vec())
    }

    fn save(&self, md: &EntityMetadata, docs: &[Value]) -> Result<Vec<Value>> {
        let mut collections = acquire_lock(&self.collections)?;
        let stored = collections.entry(md.name.clone()).or_default();
        for doc in docs {
            match stored
                .iter_mut()
                .find(|existing| Self::same_identity(md, existing, doc))
            {
                Some(existing) => *existing = doc.clone(),
                None => stored.push(doc.clone()),
            }
        }
        Ok(docs.to_vec())
    }

    fn find(&self, md: &EntityMetadata, predicate: Option<&Predicate>) -> Result<Vec<Value>> {
        let collections = acquire_lock(&self.collections)?;
        let stored = collections.get(&md.name).cloned().unwrap_or_default();
        Ok(match predicate {
            None => stored,
            Some(p) => stored
                .into_iter()
                .filter(|d| evaluate(p, d).matched)
                .collect(),
        })
    }

    fn delete(&self, md: &EntityMetadata, predicate: Option<&Predicate>) -> Result<Vec<Value>> {
        let mut collections = acquire_lock(&self.collections)?;
        let stored = collections.entry(md.name.clone()).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = stored
            .drain(..)
            .partition(|d| predicate.map_or(true, |p| evaluate(p, d).matched));
        *stored = kept;
        Ok(removed)
    }
}
