#![allow(clippy::all)]

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use trama::assoc::{AssociationGraph, BruteForce, First, NodeIx, QueryPlan, QueryPlanIterator};
use trama::doc::Path;
use trama::metadata::{AssociationDef, EntityMetadata, InMemoryMetadata};
use trama::Result;

fn entity(name: &str, children: &[&str]) -> EntityMetadata {
    EntityMetadata {
        name: name.to_string(),
        backend: "mem".to_string(),
        identity_fields: vec![],
        associations: children
            .iter()
            .map(|c| AssociationDef {
                field: Path::parse(&format!("{c}_items")).expect("path"),
                entity: c.to_string(),
                local_key: Path::parse("_id").expect("path"),
                remote_key: Path::parse("parent_id").expect("path"),
            })
            .collect(),
        hooks: vec![],
    }
}

fn plan_of(entities: &[(&str, &[&str])], root: &str) -> QueryPlan {
    let mut provider = InMemoryMetadata::new();
    for (name, children) in entities {
        provider = provider.with_entity(entity(name, children));
    }
    let graph = AssociationGraph::build(root, &provider).expect("graph");
    QueryPlan::new(Arc::new(graph))
}

/// Structural signature of an orientation: sources plus every node's
/// destination set.
fn signature(plan: &QueryPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("S{:?}", plan.sources()));
    for n in plan.graph().node_indexes() {
        out.push_str(&format!(";{n}->{:?}", plan.destinations_of(n)));
    }
    out
}

#[test]
fn three_entity_chain_enumerates_exactly_three_new_orientations() -> Result<()> {
    // A - B, B - C: two edges
    let mut plan = plan_of(&[("A", &["B"]), ("B", &["C"]), ("C", &[])], "A");
    let initial = plan.orientation();
    let initial_signature = signature(&plan);

    let mut it = BruteForce::new();
    it.reset(&plan);

    let mut orientations = Vec::new();
    let mut signatures = HashSet::new();
    signatures.insert(initial_signature);
    while it.next(&mut plan)? {
        orientations.push(plan.orientation().to_string());
        assert!(
            signatures.insert(signature(&plan)),
            "structurally repeated orientation"
        );
    }

    assert_eq!(orientations, ["01", "10", "11"]);
    assert_eq!(plan.orientation(), initial, "plan restored on exhaustion");

    // the enumeration wraps: a further call starts over
    assert!(it.next(&mut plan)?);
    assert_eq!(plan.orientation().to_string(), "01");
    Ok(())
}

#[test]
fn single_node_plan_is_exhausted_immediately() -> Result<()> {
    let mut plan = plan_of(&[("solo", &[])], "solo");
    let mut it = BruteForce::new();
    it.reset(&plan);
    assert!(!it.next(&mut plan)?);
    Ok(())
}

#[test]
fn first_leaves_the_plan_untouched() -> Result<()> {
    let mut plan = plan_of(&[("A", &["B"]), ("B", &["C"]), ("C", &[])], "A");
    let initial = plan.orientation();
    let mut it = First::new();
    it.reset(&plan);
    assert!(!it.next(&mut plan)?);
    assert_eq!(plan.orientation(), initial);
    assert_eq!(plan.sources(), vec![NodeIx(0)]);
    Ok(())
}

/// Builds a random tree over `parents` (node i+1 attaches below
/// `parents[i]`), then checks the brute-force contract: `2^E - 1`
/// successful `next` calls, all orientations distinct, and the plan
/// restored afterwards.
fn check_enumeration(parents: Vec<usize>) -> Result<()> {
    let n = parents.len() + 1;
    let mut children: Vec<Vec<String>> = vec![Vec::new(); n];
    for (i, &p) in parents.iter().enumerate() {
        children[p].push(format!("n{}", i + 1));
    }
    let mut provider = InMemoryMetadata::new();
    for i in 0..n {
        let child_refs: Vec<&str> = children[i].iter().map(String::as_str).collect();
        provider = provider.with_entity(entity(&format!("n{i}"), &child_refs));
    }
    let graph = AssociationGraph::build("n0", &provider)?;
    let edges = graph.edge_count();
    let mut plan = QueryPlan::new(Arc::new(graph));
    let initial = plan.orientation();

    let mut it = BruteForce::new();
    it.reset(&plan);
    let mut seen = HashSet::new();
    seen.insert(plan.orientation().to_string());
    let mut successes = 0usize;
    while it.next(&mut plan)? {
        successes += 1;
        assert!(seen.insert(plan.orientation().to_string()));
        assert!(successes <= 1 << edges, "ran past the state space");
    }
    assert_eq!(successes, (1usize << edges) - 1);
    assert_eq!(seen.len(), 1 << edges);
    assert_eq!(plan.orientation(), initial);
    Ok(())
}

proptest! {
    #[test]
    fn brute_force_contract_holds_on_random_trees(
        raw in prop::collection::vec(any::<prop::sample::Index>(), 1..6)
    ) {
        // node i+1 hangs below a uniformly chosen earlier node
        let parents: Vec<usize> = raw
            .iter()
            .enumerate()
            .map(|(i, ix)| ix.index(i + 1))
            .collect();
        check_enumeration(parents).expect("enumeration contract");
    }
}
