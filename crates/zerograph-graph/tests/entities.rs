//! Entity lifecycle and identity against a scripted transport.

mod common;

use serde_json::json;

use common::{doc, error, node, path, rel, setup};
use zerograph_graph::{Bindable, GraphError, Node, Path, PropertyHolder, Relationship, Segment};

#[tokio::test]
async fn pull_on_unbound_node_sends_nothing() {
    let (transport, _graph) = setup();
    let node = Node::new().with_label("Person");
    let err = node.pull().await.unwrap_err();
    assert!(matches!(err, GraphError::NotBound(_)));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn same_id_hydrates_to_same_object() {
    let (transport, graph) = setup();
    transport.push_payload(doc(&[&node(3, "\"Person\"", r#"{"name": "Alice"}"#)]));
    transport.push_payload(doc(&[&node(3, "\"Person\"", r#"{"name": "Alicia"}"#)]));

    let first = graph.node(3).await.unwrap();
    let second = graph.node(3).await.unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(first.get("name"), Some(json!("Alicia")));
}

#[tokio::test]
async fn push_then_pull_round_trips_state() {
    let (transport, graph) = setup();
    let alice = Node::new().with_label("Person").with_property("name", "Alice");
    alice.bind(&graph, 3);
    alice.set("age", 33);
    alice.set("name", serde_json::Value::Null);

    transport.push_payload(doc(&[&node_json(&alice)]));
    alice.push().await.unwrap();
    assert_eq!(
        transport.sent_lines(),
        vec![r#"SET Node {"id":3,"labels":["Person"],"properties":{"age":33}}"#]
    );

    // A fresh proxy on another handle sees exactly what was pushed.
    let (other_transport, other) = setup();
    other_transport.push_payload(doc(&[&node(3, "\"Person\"", r#"{"age": 33}"#)]));
    let pulled = Node::new();
    pulled.bind(&other, 3);
    pulled.pull().await.unwrap();
    assert_eq!(pulled, alice);
}

fn node_json(node: &Node) -> String {
    let labels: Vec<String> = node.labels().iter().map(|l| format!("\"{l}\"")).collect();
    common::node(
        node.bound_id().unwrap(),
        &labels.join(", "),
        &node.properties().to_json().to_string(),
    )
}

#[tokio::test]
async fn exists_is_false_for_missing_node() {
    let (transport, graph) = setup();
    transport.push_payload(error(404, "Node 8 not found"));
    transport.push_payload(error(500, "Database unavailable"));
    let node = Node::new();
    node.bind(&graph, 8);

    assert!(!node.exists().await.unwrap());
    assert!(matches!(node.exists().await, Err(GraphError::Remote(_))));
}

#[tokio::test]
async fn delete_unbinds_and_evicts() {
    let (transport, graph) = setup();
    transport.push_payload(doc(&[]));
    let node = Node::new();
    node.bind(&graph, 4);
    assert!(graph.cached_node(4).unwrap().ptr_eq(&node));

    node.delete().await.unwrap();
    assert!(!node.is_bound());
    assert!(graph.cached_node(4).is_none());
    assert_eq!(transport.sent_lines(), vec![r#"DELETE Node {"id":4}"#]);
}

#[tokio::test]
async fn relationship_push_leaves_type_alone() {
    let (transport, graph) = setup();
    transport.push_payload(doc(&[&path(&[
        node(1, "", "{}"),
        rel(9, "KNOWS", r#"{"since": 1999}"#),
        node(2, "", "{}"),
    ])]));
    let knows = Relationship::new("KNOWS").with_property("since", 1999);
    knows.bind(&graph, 9);
    knows.push().await.unwrap();
    assert_eq!(
        transport.sent_lines(),
        vec![r#"SET Rel {"id":9,"properties":{"since":1999}}"#]
    );
}

#[tokio::test]
async fn segment_lookup_binds_every_part() {
    let (transport, graph) = setup();
    transport.push_payload(doc(&[&path(&[
        node(1, "\"Person\"", r#"{"name": "Alice"}"#),
        rel(9, "KNOWS", "{}"),
        node(2, "\"Person\"", r#"{"name": "Bob"}"#),
    ])]));
    let segment = graph.segment(9).await.unwrap();
    assert_eq!(segment.rel_type(), "KNOWS");
    assert_eq!(segment.bound_id(), Some(9));
    assert_eq!(segment.start_node().bound_id(), Some(1));
    assert_eq!(segment.end_node().get("name"), Some(json!("Bob")));
    assert_eq!(
        segment.to_string(),
        "(_1:Person {name:\"Alice\"})-[_9:KNOWS]->(_2:Person {name:\"Bob\"})"
    );
}

#[test]
fn invalid_paths_fail_before_any_exchange() {
    let (transport, graph) = setup();
    let err = Path::new(vec![Node::new()], vec![Relationship::new("A")]).unwrap_err();
    assert!(matches!(err, GraphError::InvalidValue(_)));

    let (_, other) = setup();
    let here = Node::new();
    here.bind(&graph, 1);
    let there = Node::new();
    there.bind(&other, 2);
    let err = Segment::new(here, Relationship::new("A"), there).unwrap_err();
    assert!(matches!(err, GraphError::CrossGraph(_)));

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn path_pull_refreshes_constituents_once() {
    let (transport, graph) = setup();
    let alice = Node::new();
    alice.bind(&graph, 1);
    let knows = Relationship::new("KNOWS");
    knows.bind(&graph, 9);
    let segment = Segment::new(alice.clone(), knows, alice.clone()).unwrap();

    transport.push_payload(
        [
            doc(&[&node(1, "\"Person\"", r#"{"name": "Alice"}"#)]),
            doc(&[&path(&[
                node(1, "\"Person\"", r#"{"name": "Alice"}"#),
                rel(9, "KNOWS", r#"{"since": 1999}"#),
                node(1, "\"Person\"", r#"{"name": "Alice"}"#),
            ])]),
        ]
        .concat(),
    );
    segment.pull().await.unwrap();
    assert_eq!(
        transport.sent_lines(),
        vec![r#"GET Node {"id":1}"#, r#"GET Rel {"id":9}"#]
    );
    assert!(alice.has_label("Person"));
    assert_eq!(segment.property("since"), Some(json!(1999)));
}
