//! Cypher statements that create or match paths of up to one relationship.
//!
//! Node variables are `a` (start) and `b` (end), the relationship is `r`.
//! Ids and property maps are always passed as parameters; labels and the
//! relationship type are written into the query, quoted unless they are
//! plain identifiers.

use serde_json::{Map, Value as JsonValue};

use zerograph_core::properties::quote_identifier;
use zerograph_core::{GraphError, Method, Request, Resource, Result};

use crate::entity::{Bindable, Node, Path, PropertyHolder, Relationship};

/// A parameterised query.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub query: String,
    pub params: Map<String, JsonValue>,
}

impl Statement {
    pub fn into_request(self) -> Request {
        let params = (!self.params.is_empty()).then_some(self.params);
        Request::new(Method::Execute, Resource::Cypher)
            .arg("query", self.query)
            .arg("params", params)
    }
}

/// Which of the three positions of a one-hop path already exist remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentShape {
    /// The relationship itself is bound; match the whole triple.
    Existing,
    /// Both endpoints are bound; only the edge is new.
    BothEndpoints,
    /// Only the start node is bound.
    StartOnly,
    /// Only the end node is bound.
    EndOnly,
    /// Nothing is bound; the whole triple is new.
    New,
}

impl SegmentShape {
    pub fn of(start: &Node, rel: &Relationship, end: &Node) -> Self {
        if rel.is_bound() {
            return Self::Existing;
        }
        match (start.is_bound(), end.is_bound()) {
            (true, true) => Self::BothEndpoints,
            (true, false) => Self::StartOnly,
            (false, true) => Self::EndOnly,
            (false, false) => Self::New,
        }
    }
}

#[derive(Default)]
struct Builder {
    matches: Vec<String>,
    conditions: Vec<String>,
    create: Option<String>,
    sets: Vec<String>,
    params: Map<String, JsonValue>,
}

impl Builder {
    fn match_node_by_id(&mut self, var: &str, node: &Node) -> Result<()> {
        let (_, id) = node.assert_bound()?;
        self.matches.push(format!("({var})"));
        self.conditions.push(format!("id({var}) = ${var}_id"));
        self.params.insert(format!("{var}_id"), JsonValue::from(id));
        Ok(())
    }

    /// Label and property clauses for a node that carries any.
    fn decorate_node(&mut self, var: &str, node: &Node) {
        let labels = node.labels();
        if !labels.is_empty() {
            let labels: String = labels.iter().map(|l| format!(":{}", quote_identifier(l))).collect();
            self.sets.push(format!("{var}{labels}"));
        }
        self.decorate_properties(var, node.properties());
    }

    fn decorate_properties(&mut self, var: &str, properties: zerograph_core::PropertySet) {
        if !properties.is_empty() {
            self.sets.push(format!("{var} = ${var}_props"));
            self.params.insert(format!("{var}_props"), properties.to_json());
        }
    }

    fn build(self, returns: &str) -> Statement {
        let mut clauses = Vec::new();
        if !self.matches.is_empty() {
            clauses.push(format!("MATCH {}", self.matches.join(", ")));
            clauses.push(format!("WHERE {}", self.conditions.join(" AND ")));
        }
        if let Some(create) = self.create {
            clauses.push(format!("CREATE {create}"));
        }
        if !self.sets.is_empty() {
            clauses.push(format!("SET {}", self.sets.join(", ")));
        }
        clauses.push(format!("RETURN {returns}"));
        Statement {
            query: clauses.join(" "),
            params: self.params,
        }
    }
}

fn edge(rel: &Relationship, reverse: bool, typed: bool) -> String {
    let inner = if typed {
        format!("r:{}", quote_identifier(&rel.rel_type()))
    } else {
        "r".to_string()
    };
    if reverse {
        format!("<-[{inner}]-")
    } else {
        format!("-[{inner}]->")
    }
}

/// Statement creating (or matching) a path of at most one relationship,
/// returning its nodes and relationship in order.
pub fn create_path_statement(path: &Path) -> Result<Statement> {
    match path.size() {
        0 => Ok(node_statement(path.start_node())),
        1 => segment_statement(path),
        n => Err(GraphError::UnsupportedShape(format!(
            "Cannot create a path of {n} relationships; split it into single-relationship segments"
        ))),
    }
}

fn node_statement(node: &Node) -> Statement {
    let mut builder = Builder::default();
    match node.bound_id() {
        Some(id) => {
            builder.matches.push("(a)".into());
            builder.conditions.push("id(a) = $a_id".into());
            builder.params.insert("a_id".into(), JsonValue::from(id));
        }
        None => builder.create = Some("(a)".into()),
    }
    builder.decorate_node("a", node);
    builder.build("a")
}

fn segment_statement(path: &Path) -> Result<Statement> {
    let start = path.start_node();
    let end = path.end_node();
    let rel = &path.rels()[0];
    let reverse = path.is_reversed(0);
    // One object at both ends is a loop on a single node.
    let looped = start.ptr_eq(end)
        || matches!((start.bound_id(), end.bound_id()), (Some(a), Some(b)) if a == b);
    let b = if looped { "a" } else { "b" };

    let mut builder = Builder::default();
    match SegmentShape::of(start, rel, end) {
        SegmentShape::Existing => {
            let (_, id) = rel.assert_bound()?;
            builder.matches.push(format!("(a){}({b})", edge(rel, reverse, false)));
            builder.conditions.push("id(r) = $r_id".into());
            builder.params.insert("r_id".into(), JsonValue::from(id));
        }
        SegmentShape::BothEndpoints => {
            builder.match_node_by_id("a", start)?;
            if !looped {
                builder.match_node_by_id("b", end)?;
            }
            builder.create = Some(format!("(a){}({b})", edge(rel, reverse, true)));
        }
        SegmentShape::StartOnly => {
            builder.match_node_by_id("a", start)?;
            builder.create = Some(format!("(a){}(b)", edge(rel, reverse, true)));
        }
        SegmentShape::EndOnly => {
            builder.match_node_by_id("b", end)?;
            builder.create = Some(format!("(a){}(b)", edge(rel, reverse, true)));
        }
        SegmentShape::New => {
            builder.create = Some(format!("(a){}({b})", edge(rel, reverse, true)));
        }
    }

    builder.decorate_node("a", start);
    if !looped {
        builder.decorate_node("b", end);
    }
    builder.decorate_properties("r", rel.properties());
    Ok(builder.build(&format!("a, r, {b}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use zerograph_core::ClientConfig;

    use super::*;
    use crate::client::Graph;
    use crate::entity::Segment;
    use crate::transport::MemoryTransport;

    fn graph() -> Graph {
        Graph::with_transport(ClientConfig::default(), MemoryTransport::new())
    }

    fn bound_node(graph: &Graph, id: i64) -> Node {
        let node = Node::new();
        node.bind(graph, id);
        node
    }

    #[test]
    fn new_node() {
        let node = Node::new().with_label("Person").with_property("name", "Alice");
        let stmt = create_path_statement(&Path::from_node(node)).unwrap();
        assert_eq!(stmt.query, "CREATE (a) SET a:Person, a = $a_props RETURN a");
        assert_eq!(stmt.params["a_props"], json!({"name": "Alice"}));
    }

    #[test]
    fn existing_node_without_data() {
        let graph = graph();
        let node = bound_node(&graph, 7);
        let stmt = create_path_statement(&Path::from_node(node)).unwrap();
        assert_eq!(stmt.query, "MATCH (a) WHERE id(a) = $a_id RETURN a");
        assert_eq!(stmt.params["a_id"], json!(7));
    }

    #[test]
    fn both_endpoints_bound_creates_only_the_edge() {
        let graph = graph();
        let a = bound_node(&graph, 1);
        let b = bound_node(&graph, 2);
        let segment = Segment::new(a, Relationship::new("KNOWS"), b).unwrap();
        assert_eq!(
            SegmentShape::of(segment.start_node(), segment.relationship(), segment.end_node()),
            SegmentShape::BothEndpoints
        );
        let stmt = create_path_statement(&segment).unwrap();
        assert_eq!(
            stmt.query,
            "MATCH (a), (b) WHERE id(a) = $a_id AND id(b) = $b_id CREATE (a)-[r:KNOWS]->(b) RETURN a, r, b"
        );
        assert_eq!(stmt.params["a_id"], json!(1));
        assert_eq!(stmt.params["b_id"], json!(2));
    }

    #[test]
    fn one_endpoint_bound() {
        let graph = graph();
        let a = bound_node(&graph, 1);
        let b = Node::new().with_property("name", "Bob");
        let segment = Segment::new(a, Relationship::new("KNOWS"), b).unwrap();
        let stmt = create_path_statement(&segment).unwrap();
        assert_eq!(
            stmt.query,
            "MATCH (a) WHERE id(a) = $a_id CREATE (a)-[r:KNOWS]->(b) SET b = $b_props RETURN a, r, b"
        );

        let a = Node::new();
        let b = bound_node(&graph, 2);
        let segment = Segment::new(a, Relationship::reversed("LIKES"), b).unwrap();
        let stmt = create_path_statement(&segment).unwrap();
        assert_eq!(
            stmt.query,
            "MATCH (b) WHERE id(b) = $b_id CREATE (a)<-[r:LIKES]-(b) RETURN a, r, b"
        );
    }

    #[test]
    fn nothing_bound_creates_triple() {
        let rel = Relationship::new("WORKS FOR").with_property("since", 2001);
        let segment = Segment::new(Node::new().with_label("Person"), rel, Node::new()).unwrap();
        let stmt = create_path_statement(&segment).unwrap();
        assert_eq!(
            stmt.query,
            "CREATE (a)-[r:`WORKS FOR`]->(b) SET a:Person, r = $r_props RETURN a, r, b"
        );
        assert_eq!(stmt.params["r_props"], json!({"since": 2001}));
    }

    #[test]
    fn existing_relationship_matches_triple() {
        let graph = graph();
        let rel = Relationship::new("KNOWS");
        rel.bind(&graph, 9);
        let segment = Segment::new(bound_node(&graph, 1), rel, bound_node(&graph, 2)).unwrap();
        let stmt = create_path_statement(&segment).unwrap();
        assert_eq!(
            stmt.query,
            "MATCH (a)-[r]->(b) WHERE id(r) = $r_id RETURN a, r, b"
        );
    }

    #[test]
    fn existing_relationship_keeps_the_direction_it_was_walked() {
        let graph = graph();
        let rel = Relationship::new("KNOWS");
        rel.bind(&graph, 9);
        let one = bound_node(&graph, 1);
        let two = bound_node(&graph, 2);
        let backward = Path::oriented(vec![two, one], vec![rel.clone()], vec![true]).unwrap();
        let stmt = create_path_statement(&backward).unwrap();
        assert_eq!(
            stmt.query,
            "MATCH (a)<-[r]-(b) WHERE id(r) = $r_id RETURN a, r, b"
        );
        assert!(!rel.is_reverse());
    }

    #[test]
    fn same_object_at_both_ends_is_a_loop() {
        let node = Node::new();
        let segment = Segment::new(node.clone(), Relationship::new("SELF"), node).unwrap();
        let stmt = create_path_statement(&segment).unwrap();
        assert_eq!(stmt.query, "CREATE (a)-[r:SELF]->(a) RETURN a, r, a");
    }

    #[test]
    fn property_values_never_reach_query_text() {
        let node = Node::new().with_property("name", "x'}) DETACH DELETE n //");
        let stmt = create_path_statement(&Path::from_node(node)).unwrap();
        assert!(!stmt.query.contains("DELETE"));
    }

    #[test]
    fn long_paths_are_unsupported() {
        let path = Path::new(
            vec![Node::new(), Node::new(), Node::new()],
            vec![Relationship::new("A"), Relationship::new("B")],
        )
        .unwrap();
        assert!(matches!(
            create_path_statement(&path),
            Err(GraphError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn request_omits_empty_params() {
        let stmt = create_path_statement(&Path::from_node(Node::new())).unwrap();
        assert_eq!(
            stmt.into_request().encode(),
            r#"EXECUTE Cypher {"query":"CREATE (a) RETURN a"}"#
        );
    }
}
