//! Process-scoped assembly of controllers, interceptors, and hooks.
//!
//! A [`Factory`] is configured once at startup with everything the CRUD
//! engine needs, then shared read-only by all request threads. There is no
//! ambient global state: the mediator receives its factory at construction.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::assoc::PlanScorer;
use crate::crud::controller::CrudController;
use crate::crud::generators::{GeneratedIdInterceptor, GENERATED_ID_SEQUENCE};
use crate::crud::intercept::{InterceptPoint, Interceptor, InterceptorManager};
use crate::error::{Result, TramaError};
use crate::hooks::{HookResolver, InMemoryHookResolver};

/// Immutable assembly handed to the mediator.
pub struct Factory {
    controllers: FxHashMap<String, Arc<dyn CrudController>>,
    interceptors: InterceptorManager,
    hook_resolver: Arc<dyn HookResolver>,
    scorer: Option<Arc<dyn PlanScorer>>,
    max_plan_candidates: Option<usize>,
}

impl Factory {
    /// Starts a builder with the built-in interceptors pre-registered.
    pub fn builder() -> Result<FactoryBuilder> {
        FactoryBuilder::new()
    }

    /// The controller serving `backend`.
    pub fn controller(&self, backend: &str) -> Result<&Arc<dyn CrudController>> {
        self.controllers
            .get(backend)
            .ok_or_else(|| TramaError::UnknownBackend(backend.to_string()))
    }

    /// The interceptor registry.
    pub fn interceptors(&self) -> &InterceptorManager {
        &self.interceptors
    }

    /// The hook resolver.
    pub fn hook_resolver(&self) -> &Arc<dyn HookResolver> {
        &self.hook_resolver
    }

    /// The plan scorer, when exhaustive plan search is enabled.
    pub fn scorer(&self) -> Option<&Arc<dyn PlanScorer>> {
        self.scorer.as_ref()
    }

    /// Cap on orientations scored per composite find.
    pub fn max_plan_candidates(&self) -> Option<usize> {
        self.max_plan_candidates
    }
}

/// Builder for [`Factory`]. Registration must complete before any CRUD
/// traffic is served.
pub struct FactoryBuilder {
    controllers: FxHashMap<String, Arc<dyn CrudController>>,
    interceptors: InterceptorManager,
    hook_resolver: Arc<dyn HookResolver>,
    scorer: Option<Arc<dyn PlanScorer>>,
    max_plan_candidates: Option<usize>,
}

impl FactoryBuilder {
    fn new() -> Result<Self> {
        let mut interceptors = InterceptorManager::new();
        interceptors.register(
            GENERATED_ID_SEQUENCE,
            Interceptor::Document(Arc::new(GeneratedIdInterceptor)),
            &[
                InterceptPoint::PreCrudInsertDoc,
                InterceptPoint::PreCrudUpdateDoc,
            ],
        )?;
        Ok(Self {
            controllers: FxHashMap::default(),
            interceptors,
            hook_resolver: Arc::new(InMemoryHookResolver::new()),
            scorer: None,
            max_plan_candidates: None,
        })
    }

    /// Registers a controller for `backend`.
    pub fn with_controller(
        mut self,
        backend: impl Into<String>,
        controller: Arc<dyn CrudController>,
    ) -> Self {
        self.controllers.insert(backend.into(), controller);
        self
    }

    /// Registers an interceptor at `sequence` for `points`.
    pub fn register_interceptor(
        mut self,
        sequence: u32,
        interceptor: Interceptor,
        points: &[InterceptPoint],
    ) -> Result<Self> {
        self.interceptors.register(sequence, interceptor, points)?;
        Ok(self)
    }

    /// Installs the hook resolver.
    pub fn with_hook_resolver(mut self, resolver: Arc<dyn HookResolver>) -> Self {
        self.hook_resolver = resolver;
        self
    }

    /// Enables exhaustive plan search scored by `scorer`.
    pub fn with_scorer(mut self, scorer: Arc<dyn PlanScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Bounds how many orientations a composite find may score.
    pub fn with_max_plan_candidates(mut self, cap: usize) -> Self {
        self.max_plan_candidates = Some(cap);
        self
    }

    /// Finalizes the assembly.
    pub fn build(self) -> Factory {
        Factory {
            controllers: self.controllers,
            interceptors: self.interceptors,
            hook_resolver: self.hook_resolver,
            scorer: self.scorer,
            max_plan_candidates: self.max_plan_candidates,
        }
    }
}
