//! Built-in identity-field generation.

use tracing::debug;
use uuid::Uuid;

use crate::crud::context::{CrudOperation, DocCtx};
use crate::crud::intercept::DocInterceptor;
use crate::doc::{node_at, set_at};
use crate::error::Result;
use crate::metadata::EntityMetadata;

/// Sequence number the generated-id interceptor registers at, ahead of
/// user document interceptors.
pub const GENERATED_ID_SEQUENCE: u32 = 0;

/// Fills declared identity fields with generated values when absent.
///
/// Runs once per document on insert and update. A field that is present and
/// non-null is left alone; anything else receives a fresh uuid string,
/// creating intermediate objects as needed.
pub struct GeneratedIdInterceptor;

impl DocInterceptor for GeneratedIdInterceptor {
    fn run(&self, md: &EntityMetadata, _op: CrudOperation, doc: &mut DocCtx) -> Result<()> {
        for field in &md.identity_fields {
            let absent = match node_at(&doc.doc, field) {
                None | Some(serde_json::Value::Null) => true,
                Some(_) => false,
            };
            if absent {
                let id = Uuid::new_v4().to_string();
                debug!(entity = %md.name, field = %field, "generated identity value");
                set_at(&mut doc.doc, field, serde_json::Value::String(id))?;
            }
        }
        Ok(())
    }
}
