//! Entity metadata consumed read-only by the planner and the CRUD pipeline.
//!
//! Metadata loading and the schema language live outside this crate; an
//! external loader deserializes these types and hands the core a
//! [`MetadataProvider`]. [`InMemoryMetadata`] is the provider used by tests
//! and prototyping.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::doc::Path;
use crate::error::{Result, TramaError};

/// A declared association: a field on the parent entity holding documents of
/// a child entity, joined on key equality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationDef {
    /// Field on the parent document under which child documents are merged.
    pub field: Path,
    /// Name of the child entity.
    pub entity: String,
    /// Key field on the parent document.
    pub local_key: Path,
    /// Key field on the child document matching the parent's `local_key`.
    pub remote_key: Path,
}

/// Binds a named hook to the operations it observes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HookBinding {
    /// Hook name, resolved through the hook resolver at dispatch time.
    pub name: String,
    /// Fire on insert.
    #[serde(default)]
    pub on_insert: bool,
    /// Fire on update.
    #[serde(default)]
    pub on_update: bool,
    /// Fire on delete.
    #[serde(default)]
    pub on_delete: bool,
    /// Fire on find.
    #[serde(default)]
    pub on_find: bool,
}

/// Everything the core needs to know about one entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name.
    pub name: String,
    /// Name of the backend whose controller serves this entity.
    pub backend: String,
    /// Identity fields, filled by the generated-id interceptor when absent.
    #[serde(default)]
    pub identity_fields: Vec<Path>,
    /// Declared associations to child entities.
    #[serde(default)]
    pub associations: Vec<AssociationDef>,
    /// Hook bindings for this entity.
    #[serde(default)]
    pub hooks: Vec<HookBinding>,
}

/// Read-only source of entity metadata.
pub trait MetadataProvider: Send + Sync {
    /// Resolves an entity by name.
    fn entity(&self, name: &str) -> Result<Arc<EntityMetadata>>;
}

/// Simple in-memory metadata provider used for tests or prototyping.
#[derive(Default)]
pub struct InMemoryMetadata {
    entities: FxHashMap<String, Arc<EntityMetadata>>,
}

impl InMemoryMetadata {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity.
    pub fn with_entity(mut self, md: EntityMetadata) -> Self {
        self.entities.insert(md.name.clone(), Arc::new(md));
        self
    }
}

impl MetadataProvider for InMemoryMetadata {
    fn entity(&self, name: &str) -> Result<Arc<EntityMetadata>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| TramaError::UnknownEntity(name.to_string()))
    }
}
