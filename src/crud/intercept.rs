//! Intercept points and the ordered interceptor registry.
//!
//! Cross-cutting behaviors attach to fixed points of CRUD execution without
//! the engine knowing what is registered. Each point requires exactly one
//! interceptor capability, checked when an interceptor is registered:
//! a registration-time (startup) failure, never a request-time one.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::crud::context::{CrudOperation, DocCtx, OperationContext};
use crate::error::{Result, TramaError};
use crate::metadata::EntityMetadata;

/// What an interceptor is allowed to observe and mutate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Runs around a whole mediator operation.
    Mediator,
    /// Runs around one controller (backend) call.
    Controller,
    /// Runs once per document.
    Document,
}

impl Capability {
    /// Capability name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Mediator => "mediator",
            Capability::Controller => "controller",
            Capability::Document => "document",
        }
    }
}

/// A named stage in CRUD execution where interceptors may run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum InterceptPoint {
    PreMediatorInsert,
    PostMediatorInsert,
    PreCrudInsert,
    PreCrudInsertDoc,
    PostCrudInsertDoc,
    PostCrudInsert,
    PreMediatorUpdate,
    PostMediatorUpdate,
    PreCrudUpdate,
    PreCrudUpdateDoc,
    PostCrudUpdateDoc,
    PostCrudUpdate,
    PreMediatorDelete,
    PostMediatorDelete,
    PreCrudDelete,
    PreCrudDeleteDoc,
    PostCrudDeleteDoc,
    PostCrudDelete,
    PreMediatorFind,
    PostMediatorFind,
    PreCrudFind,
    PostCrudFindDoc,
    PostCrudFind,
}

impl InterceptPoint {
    /// The capability an interceptor must have to register here.
    pub fn capability(self) -> Capability {
        use InterceptPoint::*;
        match self {
            PreMediatorInsert | PostMediatorInsert | PreMediatorUpdate | PostMediatorUpdate
            | PreMediatorDelete | PostMediatorDelete | PreMediatorFind | PostMediatorFind => {
                Capability::Mediator
            }
            PreCrudInsert | PostCrudInsert | PreCrudUpdate | PostCrudUpdate | PreCrudDelete
            | PostCrudDelete | PreCrudFind | PostCrudFind => Capability::Controller,
            PreCrudInsertDoc | PostCrudInsertDoc | PreCrudUpdateDoc | PostCrudUpdateDoc
            | PreCrudDeleteDoc | PostCrudDeleteDoc | PostCrudFindDoc => Capability::Document,
        }
    }
}

/// Interceptor running around a whole mediator operation.
pub trait MediatorInterceptor: Send + Sync {
    /// Runs at the registered point. Errors abort the operation.
    fn run(&self, ctx: &mut OperationContext) -> Result<()>;
}

/// Interceptor running around one controller call.
pub trait ControllerInterceptor: Send + Sync {
    /// Runs at the registered point. Errors abort the operation.
    fn run(&self, ctx: &mut OperationContext) -> Result<()>;
}

/// Interceptor running once per document.
pub trait DocInterceptor: Send + Sync {
    /// Runs at the registered point for one document slot.
    fn run(&self, md: &EntityMetadata, op: CrudOperation, doc: &mut DocCtx) -> Result<()>;
}

/// A registered interceptor, tagged with its capability.
#[derive(Clone)]
pub enum Interceptor {
    /// Mediator-level interceptor.
    Mediator(Arc<dyn MediatorInterceptor>),
    /// Controller-level interceptor.
    Controller(Arc<dyn ControllerInterceptor>),
    /// Document-level interceptor.
    Document(Arc<dyn DocInterceptor>),
}

impl Interceptor {
    /// The capability this interceptor provides.
    pub fn capability(&self) -> Capability {
        match self {
            Interceptor::Mediator(_) => Capability::Mediator,
            Interceptor::Controller(_) => Capability::Controller,
            Interceptor::Document(_) => Capability::Document,
        }
    }
}

/// Registry of ordered interceptors keyed by intercept point.
///
/// Within one point, interceptors run in ascending sequence order.
/// Registering a second interceptor at a sequence number already used for
/// that point replaces the former occupant for that point only: last
/// registration wins. Built once at startup; read-only afterwards.
#[derive(Default)]
pub struct InterceptorManager {
    points: FxHashMap<InterceptPoint, BTreeMap<u32, Interceptor>>,
}

impl InterceptorManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `interceptor` at `sequence` for each of `points`.
    ///
    /// Every point must require the interceptor's capability; otherwise the
    /// whole registration fails and nothing is stored.
    pub fn register(
        &mut self,
        sequence: u32,
        interceptor: Interceptor,
        points: &[InterceptPoint],
    ) -> Result<()> {
        for point in points {
            if point.capability() != interceptor.capability() {
                return Err(TramaError::IncompatibleInterceptor {
                    point: format!("{point:?}"),
                    required: point.capability().as_str(),
                });
            }
        }
        for point in points {
            self.points
                .entry(*point)
                .or_default()
                .insert(sequence, interceptor.clone());
        }
        Ok(())
    }

    /// Number of interceptors registered at `point`.
    pub fn registered_at(&self, point: InterceptPoint) -> usize {
        self.points.get(&point).map_or(0, BTreeMap::len)
    }

    /// Runs every mediator interceptor at `point`, ascending by sequence.
    pub fn invoke_mediator(&self, point: InterceptPoint, ctx: &mut OperationContext) -> Result<()> {
        for (seq, entry) in self.entries(point) {
            trace!(?point, seq, "mediator interceptor");
            match entry {
                Interceptor::Mediator(i) => i.run(ctx)?,
                _ => return Err(incompatible(point)),
            }
        }
        Ok(())
    }

    /// Runs every controller interceptor at `point`, ascending by sequence.
    pub fn invoke_controller(
        &self,
        point: InterceptPoint,
        ctx: &mut OperationContext,
    ) -> Result<()> {
        for (seq, entry) in self.entries(point) {
            trace!(?point, seq, "controller interceptor");
            match entry {
                Interceptor::Controller(i) => i.run(ctx)?,
                _ => return Err(incompatible(point)),
            }
        }
        Ok(())
    }

    /// Runs every document interceptor at `point` for one document slot,
    /// ascending by sequence.
    pub fn invoke_doc(
        &self,
        point: InterceptPoint,
        md: &EntityMetadata,
        op: CrudOperation,
        doc: &mut DocCtx,
    ) -> Result<()> {
        for (seq, entry) in self.entries(point) {
            trace!(?point, seq, "document interceptor");
            match entry {
                Interceptor::Document(i) => i.run(md, op, doc)?,
                _ => return Err(incompatible(point)),
            }
        }
        Ok(())
    }

    fn entries(&self, point: InterceptPoint) -> impl Iterator<Item = (u32, &Interceptor)> + '_ {
        self.points
            .get(&point)
            .into_iter()
            .flat_map(|m| m.iter().map(|(seq, i)| (*seq, i)))
    }
}

fn incompatible(point: InterceptPoint) -> TramaError {
    TramaError::IncompatibleInterceptor {
        point: format!("{point:?}"),
        required: point.capability().as_str(),
    }
}
