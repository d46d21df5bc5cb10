#![allow(clippy::all)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use trama::crud::{
    ControllerInterceptor, CrudController, CrudOperation, DocCtx, DocInterceptor, Factory,
    InMemoryController, InterceptPoint, Interceptor, Mediator, MediatorInterceptor,
    OperationContext, UpdateSpec,
};
use trama::doc::Path;
use trama::eval::Predicate;
use trama::hooks::{CrudHook, HookDoc, InMemoryHookResolver};
use trama::metadata::{EntityMetadata, HookBinding, InMemoryMetadata, MetadataProvider};
use trama::Result;

fn p(s: &str) -> Path {
    Path::parse(s).expect("path")
}

/// Opt-in log output: `RUST_LOG=trama=debug cargo test`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn user_entity(hooks: Vec<HookBinding>) -> EntityMetadata {
    EntityMetadata {
        name: "user".into(),
        backend: "mem".into(),
        identity_fields: vec![p("_id")],
        associations: vec![],
        hooks,
    }
}

fn provider(hooks: Vec<HookBinding>) -> Arc<dyn MetadataProvider> {
    Arc::new(InMemoryMetadata::new().with_entity(user_entity(hooks)))
}

type Log = Arc<Mutex<Vec<String>>>;

struct Tap {
    label: &'static str,
    log: Log,
}

impl MediatorInterceptor for Tap {
    fn run(&self, _ctx: &mut OperationContext) -> Result<()> {
        self.log.lock().expect("lock").push(self.label.to_string());
        Ok(())
    }
}

impl ControllerInterceptor for Tap {
    fn run(&self, _ctx: &mut OperationContext) -> Result<()> {
        self.log.lock().expect("lock").push(self.label.to_string());
        Ok(())
    }
}

impl DocInterceptor for Tap {
    fn run(&self, _md: &EntityMetadata, _op: CrudOperation, _doc: &mut DocCtx) -> Result<()> {
        self.log.lock().expect("lock").push(self.label.to_string());
        Ok(())
    }
}

fn tap_mediator(label: &'static str, log: &Log) -> Interceptor {
    Interceptor::Mediator(Arc::new(Tap {
        label,
        log: Arc::clone(log),
    }))
}

fn tap_controller(label: &'static str, log: &Log) -> Interceptor {
    Interceptor::Controller(Arc::new(Tap {
        label,
        log: Arc::clone(log),
    }))
}

fn tap_doc(label: &'static str, log: &Log) -> Interceptor {
    Interceptor::Document(Arc::new(Tap {
        label,
        log: Arc::clone(log),
    }))
}

#[test]
fn insert_runs_every_point_in_declared_order() -> Result<()> {
    init_logging();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(InMemoryController::new());
    let factory = Factory::builder()?
        .with_controller("mem", store.clone() as Arc<dyn CrudController>)
        .register_interceptor(
            10,
            tap_mediator("pre-mediator", &log),
            &[InterceptPoint::PreMediatorInsert],
        )?
        .register_interceptor(
            10,
            tap_controller("pre-crud", &log),
            &[InterceptPoint::PreCrudInsert],
        )?
        // two doc interceptors out of registration order; sequence decides
        .register_interceptor(
            20,
            tap_doc("doc-late", &log),
            &[InterceptPoint::PreCrudInsertDoc],
        )?
        .register_interceptor(
            10,
            tap_doc("doc-early", &log),
            &[InterceptPoint::PreCrudInsertDoc],
        )?
        .register_interceptor(
            10,
            tap_doc("post-doc", &log),
            &[InterceptPoint::PostCrudInsertDoc],
        )?
        .register_interceptor(
            10,
            tap_controller("post-crud", &log),
            &[InterceptPoint::PostCrudInsert],
        )?
        .register_interceptor(
            10,
            tap_mediator("post-mediator", &log),
            &[InterceptPoint::PostMediatorInsert],
        )?
        .build();

    let mediator = Mediator::new(Arc::new(factory), provider(vec![]));
    let response = mediator.insert("user", vec![json!({"name": "ada"})], None)?;

    assert!(response.errors.is_empty());
    assert_eq!(
        *log.lock().expect("lock"),
        [
            "pre-mediator",
            "pre-crud",
            "doc-early",
            "doc-late",
            "post-doc",
            "post-crud",
            "post-mediator"
        ]
    );
    // the built-in generator filled the identity field before storage
    assert!(response.docs[0]["_id"].is_string());
    assert_eq!(store.len("user"), 1);
    Ok(())
}

#[derive(Default)]
struct AuditHook {
    events: Mutex<Vec<(CrudOperation, Option<Value>, Option<Value>, Option<String>)>>,
}

impl CrudHook for AuditHook {
    fn process(&self, _md: &EntityMetadata, docs: &[Arc<HookDoc>]) -> Result<()> {
        let mut events = self.events.lock().expect("lock");
        for d in docs {
            events.push((
                d.operation(),
                d.pre().cloned(),
                d.post().cloned(),
                d.actor().map(String::from),
            ));
        }
        Ok(())
    }
}

#[test]
fn lifecycle_feeds_audit_hooks_with_correct_images() -> Result<()> {
    init_logging();
    let audit = Arc::new(AuditHook::default());
    let resolver = InMemoryHookResolver::new().with_hook("audit", audit.clone() as Arc<dyn CrudHook>);
    let store = Arc::new(InMemoryController::new());
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("mem", store.clone() as Arc<dyn CrudController>)
            .with_hook_resolver(Arc::new(resolver))
            .build(),
    );
    let bindings = vec![HookBinding {
        name: "audit".into(),
        on_insert: true,
        on_update: true,
        on_delete: true,
        on_find: false,
    }];
    let mediator = Mediator::new(factory, provider(bindings));

    mediator.insert(
        "user",
        vec![json!({"_id": "u1", "name": "ada", "role": "admin"})],
        Some("alice".into()),
    )?;
    mediator.update(
        "user",
        Some(&Predicate::eq(p("_id"), json!("u1"))),
        &UpdateSpec::new().set(p("role"), json!("owner")),
        Some("bob".into()),
    )?;
    mediator.delete("user", Some(&Predicate::eq(p("_id"), json!("u1"))), None)?;

    let events = audit.events.lock().expect("lock");
    assert_eq!(events.len(), 3);

    let (op, pre, post, actor) = &events[0];
    assert_eq!(*op, CrudOperation::Insert);
    assert!(pre.is_none());
    assert_eq!(post.as_ref().map(|d| d["role"].clone()), Some(json!("admin")));
    assert_eq!(actor.as_deref(), Some("alice"));

    let (op, pre, post, _) = &events[1];
    assert_eq!(*op, CrudOperation::Update);
    assert_eq!(pre.as_ref().map(|d| d["role"].clone()), Some(json!("admin")));
    assert_eq!(post.as_ref().map(|d| d["role"].clone()), Some(json!("owner")));

    let (op, pre, post, _) = &events[2];
    assert_eq!(*op, CrudOperation::Delete);
    assert_eq!(pre.as_ref().map(|d| d["role"].clone()), Some(json!("owner")));
    assert!(post.is_none());

    assert_eq!(store.len("user"), 0);
    Ok(())
}

#[test]
fn failing_hook_reports_but_keeps_the_mutation() -> Result<()> {
    struct Failing;
    impl CrudHook for Failing {
        fn process(&self, _: &EntityMetadata, _: &[Arc<HookDoc>]) -> Result<()> {
            Err(trama::TramaError::Hook("sink unavailable".into()))
        }
    }
    let resolver =
        InMemoryHookResolver::new().with_hook("notify", Arc::new(Failing) as Arc<dyn CrudHook>);
    let store = Arc::new(InMemoryController::new());
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("mem", store.clone() as Arc<dyn CrudController>)
            .with_hook_resolver(Arc::new(resolver))
            .build(),
    );
    let bindings = vec![HookBinding {
        name: "notify".into(),
        on_insert: true,
        on_update: false,
        on_delete: false,
        on_find: false,
    }];
    let mediator = Mediator::new(factory, provider(bindings));

    let response = mediator.insert("user", vec![json!({"name": "ada"})], None)?;
    assert_eq!(response.hook_errors.len(), 1);
    assert_eq!(response.hook_errors[0].hook, "notify");
    // best-effort: the inserted document is still there
    assert_eq!(store.len("user"), 1);
    Ok(())
}

#[test]
fn update_applies_assignments_through_the_pipeline() -> Result<()> {
    let store = Arc::new(InMemoryController::new());
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("mem", store.clone() as Arc<dyn CrudController>)
            .build(),
    );
    let mediator = Mediator::new(factory, provider(vec![]));

    mediator.insert(
        "user",
        vec![
            json!({"_id": "u1", "score": 1}),
            json!({"_id": "u2", "score": 2}),
        ],
        None,
    )?;
    let response = mediator.update(
        "user",
        Some(&Predicate::eq(p("_id"), json!("u2"))),
        &UpdateSpec::new().set(p("score"), json!(20)),
        None,
    )?;
    assert_eq!(response.docs.len(), 1);
    assert_eq!(response.docs[0]["score"], json!(20));

    let after = store.find(&user_entity(vec![]), None)?;
    let u2 = after.iter().find(|d| d["_id"] == json!("u2")).expect("u2");
    assert_eq!(u2["score"], json!(20));
    Ok(())
}

#[test]
fn find_without_associations_filters_in_memory() -> Result<()> {
    let store = Arc::new(InMemoryController::new());
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("mem", store.clone() as Arc<dyn CrudController>)
            .build(),
    );
    let mediator = Mediator::new(factory, provider(vec![]));

    mediator.insert(
        "user",
        vec![
            json!({"_id": "u1", "name": "ada"}),
            json!({"_id": "u2", "name": "mia"}),
        ],
        None,
    )?;
    let response = mediator.find("user", Some(&Predicate::eq(p("name"), json!("mia"))), None)?;
    assert_eq!(response.docs.len(), 1);
    assert_eq!(response.docs[0]["_id"], json!("u2"));
    Ok(())
}

#[test]
fn interceptor_failure_aborts_the_operation() -> Result<()> {
    struct Reject;
    impl DocInterceptor for Reject {
        fn run(&self, _: &EntityMetadata, _: CrudOperation, doc: &mut DocCtx) -> Result<()> {
            if doc.doc.get("name").is_none() {
                return Err(trama::TramaError::Interceptor("name is required".into()));
            }
            Ok(())
        }
    }
    let store = Arc::new(InMemoryController::new());
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("mem", store.clone() as Arc<dyn CrudController>)
            .register_interceptor(
                50,
                Interceptor::Document(Arc::new(Reject)),
                &[InterceptPoint::PreCrudInsertDoc],
            )?
            .build(),
    );
    let mediator = Mediator::new(factory, provider(vec![]));

    let err = mediator.insert("user", vec![json!({"nameless": true})], None);
    assert!(matches!(err, Err(trama::TramaError::Interceptor(_))));
    // the pipeline failed before the controller ran
    assert_eq!(store.len("user"), 0);
    Ok(())
}
