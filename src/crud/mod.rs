#![forbid(unsafe_code)]

//! Extensible CRUD pipeline.
//!
//! Operations run stage by stage through fixed intercept points, storage is
//! delegated to per-backend controllers, and completed operations feed
//! post-operation hooks. The registry side (factory) is assembled once at
//! startup and read-only under traffic.

pub mod context;
pub mod controller;
pub mod factory;
pub mod generators;
pub mod intercept;
pub mod mediator;

pub use context::{CrudOperation, DocCtx, OperationContext};
pub use controller::{CrudController, InMemoryController, UpdateSpec};
pub use factory::{Factory, FactoryBuilder};
pub use generators::{GeneratedIdInterceptor, GENERATED_ID_SEQUENCE};
pub use intercept::{
    Capability, ControllerInterceptor, DocInterceptor, InterceptPoint, Interceptor,
    InterceptorManager, MediatorInterceptor,
};
pub use mediator::{Mediator, Response};
