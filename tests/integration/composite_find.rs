#![allow(clippy::all)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use trama::assoc::{NodeIx, PlanScorer, QueryPlan};
use trama::crud::{CrudController, Factory, InMemoryController, Mediator};
use trama::doc::Path;
use trama::eval::{CompareOp, Predicate};
use trama::metadata::{AssociationDef, EntityMetadata, InMemoryMetadata, MetadataProvider};
use trama::Result;

fn p(s: &str) -> Path {
    Path::parse(s).expect("path")
}

fn user_entity() -> EntityMetadata {
    EntityMetadata {
        name: "user".into(),
        backend: "docstore".into(),
        identity_fields: vec![p("_id")],
        associations: vec![AssociationDef {
            field: p("orders"),
            entity: "order".into(),
            local_key: p("_id"),
            remote_key: p("user_id"),
        }],
        hooks: vec![],
    }
}

fn order_entity() -> EntityMetadata {
    EntityMetadata {
        name: "order".into(),
        backend: "sqlstore".into(),
        identity_fields: vec![p("_id")],
        associations: vec![],
        hooks: vec![],
    }
}

fn metadata() -> Arc<dyn MetadataProvider> {
    Arc::new(
        InMemoryMetadata::new()
            .with_entity(user_entity())
            .with_entity(order_entity()),
    )
}

fn seed(users: &Arc<InMemoryController>, orders: &Arc<InMemoryController>) -> Result<()> {
    users.insert(
        &user_entity(),
        &[
            json!({"_id": "u1", "name": "ada"}),
            json!({"_id": "u2", "name": "mia"}),
        ],
    )?;
    orders.insert(
        &order_entity(),
        &[
            json!({"_id": "o1", "user_id": "u1", "total": 50}),
            json!({"_id": "o2", "user_id": "u1", "total": 10}),
            json!({"_id": "o3", "user_id": "u2", "total": 99}),
        ],
    )?;
    Ok(())
}

#[test]
fn find_assembles_children_under_the_association_field() -> Result<()> {
    let users = Arc::new(InMemoryController::new());
    let orders = Arc::new(InMemoryController::new());
    seed(&users, &orders)?;

    let factory = Arc::new(
        Factory::builder()?
            .with_controller("docstore", users.clone() as Arc<dyn CrudController>)
            .with_controller("sqlstore", orders.clone() as Arc<dyn CrudController>)
            .build(),
    );
    let mediator = Mediator::new(factory, metadata());

    let response = mediator.find(
        "user",
        Some(&Predicate::eq(p("name"), json!("ada"))),
        None,
    )?;
    assert!(response.errors.is_empty());
    assert_eq!(response.docs.len(), 1);
    let doc = &response.docs[0];
    assert_eq!(doc["_id"], json!("u1"));
    let embedded = doc["orders"].as_array().expect("orders array");
    assert_eq!(embedded.len(), 2);
    assert!(embedded.iter().all(|o| o["user_id"] == json!("u1")));
    Ok(())
}

#[test]
fn association_predicates_filter_assembled_documents() -> Result<()> {
    let users = Arc::new(InMemoryController::new());
    let orders = Arc::new(InMemoryController::new());
    seed(&users, &orders)?;

    let factory = Arc::new(
        Factory::builder()?
            .with_controller("docstore", users.clone() as Arc<dyn CrudController>)
            .with_controller("sqlstore", orders.clone() as Arc<dyn CrudController>)
            .build(),
    );
    let mediator = Mediator::new(factory, metadata());

    // element match over the embedded association: only u2 has such an order
    let pred = Predicate::elem_match(
        p("orders"),
        Predicate::compare(p("total"), CompareOp::Gt, json!(60)),
    );
    let response = mediator.find("user", Some(&pred), None)?;
    assert_eq!(response.docs.len(), 1);
    assert_eq!(response.docs[0]["_id"], json!("u2"));
    Ok(())
}

/// Scores child-first orientations cheaper and counts invocations.
struct OrdersFirst {
    calls: AtomicUsize,
}

impl PlanScorer for OrdersFirst {
    fn score(&self, plan: &QueryPlan) -> f64 {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if plan.sources().contains(&NodeIx(1)) {
            1.0
        } else {
            5.0
        }
    }
}

#[test]
fn scored_search_explores_orientations_and_answers_identically() -> Result<()> {
    let users = Arc::new(InMemoryController::new());
    let orders = Arc::new(InMemoryController::new());
    seed(&users, &orders)?;

    let scorer = Arc::new(OrdersFirst {
        calls: AtomicUsize::new(0),
    });
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("docstore", users.clone() as Arc<dyn CrudController>)
            .with_controller("sqlstore", orders.clone() as Arc<dyn CrudController>)
            .with_scorer(scorer.clone() as Arc<dyn PlanScorer>)
            .build(),
    );
    let mediator = Mediator::new(factory, metadata());

    let response = mediator.find(
        "user",
        Some(&Predicate::eq(p("name"), json!("ada"))),
        None,
    )?;
    // one edge: both orientations scored
    assert_eq!(scorer.calls.load(Ordering::Relaxed), 2);
    assert_eq!(response.docs.len(), 1);
    assert_eq!(response.docs[0]["_id"], json!("u1"));
    assert_eq!(
        response.docs[0]["orders"].as_array().map(Vec::len),
        Some(2)
    );
    Ok(())
}

#[test]
fn unknown_association_target_fails_before_any_fetch() -> Result<()> {
    let users = Arc::new(InMemoryController::new());
    let mut md = user_entity();
    md.associations[0].entity = "ghost".into();
    let provider = Arc::new(InMemoryMetadata::new().with_entity(md));
    let factory = Arc::new(
        Factory::builder()?
            .with_controller("docstore", users as Arc<dyn CrudController>)
            .build(),
    );
    let mediator = Mediator::new(factory, provider);
    assert!(matches!(
        mediator.find("user", None, None),
        Err(trama::TramaError::UnknownEntity(name)) if name == "ghost"
    ));
    Ok(())
}
