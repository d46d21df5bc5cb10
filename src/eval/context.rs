//! Cursor state threaded through predicate evaluation.
//!
//! An [`EvalContext`] identifies one location in a document: the current
//! subtree plus the absolute path that reached it, and a single boolean
//! result slot written by whichever evaluator last ran here. Entering a
//! subdocument clones the path prefix into an independent child context;
//! scanning the elements of one array reuses a single [`ElementCursor`]
//! instead, so the path state is not reallocated per candidate.

use serde_json::Value;

use crate::doc::path::Path;
use crate::doc::tree;

/// Evaluation cursor over one in-memory document.
#[derive(Clone, Debug)]
pub struct EvalContext<'d> {
    node: Option<&'d Value>,
    path: Path,
    result: bool,
}

impl<'d> EvalContext<'d> {
    /// Root context: the whole document, empty path.
    pub fn root(doc: &'d Value) -> Self {
        Self {
            node: Some(doc),
            path: Path::empty(),
            result: false,
        }
    }

    /// The current node. `None` when the context was entered through a path
    /// that did not resolve. A valid state, not a fault.
    pub fn node(&self) -> Option<&'d Value> {
        self.node
    }

    /// Absolute path of the current node from the document root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves a path relative to the current node. Absence is `None`.
    pub fn node_at(&self, rel: &Path) -> Option<&'d Value> {
        tree::node_at(self.node?, rel)
    }

    /// Child context for the value at `rel`, with path `self.path + rel`.
    pub fn nested(&self, rel: &Path) -> EvalContext<'d> {
        self.nested_at(self.node_at(rel), rel)
    }

    /// Child context for an already-resolved node at `rel`.
    pub fn nested_at(&self, node: Option<&'d Value>, rel: &Path) -> EvalContext<'d> {
        EvalContext {
            node,
            path: self.path.appended(rel),
            result: false,
        }
    }

    /// Cursor positioned on element 0 of the array at `array_field`,
    /// the starting candidate for an element-match scan.
    pub fn first_element(&self, array_field: &Path) -> ElementCursor<'d> {
        let node = self
            .node_at(array_field)
            .and_then(Value::as_array)
            .and_then(|a| a.first());
        ElementCursor {
            ctx: EvalContext {
                node,
                path: self.path.appended(array_field).appended_index(0),
                result: false,
            },
        }
    }

    /// Absolute form of a path relative to this context.
    pub fn absolute_path(&self, rel: &Path) -> Path {
        self.path.appended(rel)
    }

    /// The evaluation outcome recorded at this context.
    pub fn result(&self) -> bool {
        self.result
    }

    /// Records the evaluation outcome for the predicate anchored here.
    pub fn set_result(&mut self, result: bool) {
        self.result = result;
    }
}

/// Mutable cursor for scanning candidate elements of one array.
///
/// Unlike [`EvalContext::nested`], repointing the cursor mutates it in
/// place: the node is swapped and only the trailing path segment changes.
/// After a match, the cursor's path is the absolute path of the winning
/// element, which is how element-match callers recover the matching index.
#[derive(Debug)]
pub struct ElementCursor<'d> {
    ctx: EvalContext<'d>,
}

impl<'d> ElementCursor<'d> {
    /// Repoints the cursor at another candidate element.
    pub fn move_to(&mut self, node: Option<&'d Value>, index: usize) {
        self.ctx.node = node;
        self.ctx.path.set_last_index(index);
    }

    /// The cursor's context, usable wherever an [`EvalContext`] is.
    pub fn context(&self) -> &EvalContext<'d> {
        &self.ctx
    }

    /// Mutable access for evaluators that record results on the cursor.
    pub fn context_mut(&mut self) -> &mut EvalContext<'d> {
        &mut self.ctx
    }

    /// Consumes the cursor, keeping the final context.
    pub fn into_context(self) -> EvalContext<'d> {
        self.ctx
    }
}
