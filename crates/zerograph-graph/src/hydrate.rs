//! Turning raw reply values into live values bound to a graph.
//!
//! Tagged entities carry a remote id but not the graph they came from, so
//! hydration takes the owning [`Graph`] as context and resolves every id
//! through that graph's identity cache.

use std::collections::{BTreeMap, BTreeSet};

use serde_yaml::{Mapping, Value as YamlValue};

use zerograph_core::{GraphError, Pointer, PropertySet, Result};

use crate::client::Graph;
use crate::entity::{Bindable, Node, Path, PathElement, Relationship};
use crate::value::{GraphAddress, Value};

/// Hydrate one raw value in the context of `graph`.
pub fn hydrate(graph: &Graph, raw: YamlValue) -> Result<Value> {
    match raw {
        YamlValue::Null => Ok(Value::Null),
        YamlValue::Bool(b) => Ok(Value::Bool(b)),
        YamlValue::Number(n) => Ok(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        YamlValue::String(s) => Ok(Value::String(s)),
        YamlValue::Sequence(items) => items
            .into_iter()
            .map(|item| hydrate(graph, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        YamlValue::Mapping(mapping) => {
            let mut map = BTreeMap::new();
            for (key, value) in mapping {
                map.insert(key_string(&key)?, hydrate(graph, value)?);
            }
            Ok(Value::Map(map))
        }
        YamlValue::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            match tag.trim_start_matches('!') {
                "Node" => hydrate_node(graph, tagged.value).map(Value::Node),
                "Rel" => hydrate_relationship(graph, tagged.value, false).map(Value::Relationship),
                "Rev" => hydrate_relationship(graph, tagged.value, true).map(Value::Relationship),
                "Path" => hydrate_path(graph, tagged.value).map(Value::Path),
                "Graph" => hydrate_graph_address(tagged.value).map(Value::Graph),
                "Pointer" => hydrate_pointer(tagged.value).map(Value::Pointer),
                other => {
                    tracing::trace!(tag = other, "Ignoring unknown reply tag");
                    hydrate(graph, tagged.value)
                }
            }
        }
    }
}

fn key_string(key: &YamlValue) -> Result<String> {
    match key {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        other => Err(GraphError::Protocol(format!(
            "Unsupported mapping key in reply: {other:?}"
        ))),
    }
}

fn expect_mapping(kind: &str, value: YamlValue) -> Result<Mapping> {
    match value {
        YamlValue::Mapping(m) => Ok(m),
        YamlValue::Null => Ok(Mapping::new()),
        other => Err(GraphError::Protocol(format!(
            "Expected a mapping for !{kind}, got {other:?}"
        ))),
    }
}

fn entity_id(kind: &str, mapping: &Mapping) -> Result<Option<i64>> {
    match mapping.get("id") {
        None | Some(YamlValue::Null) => Ok(None),
        Some(YamlValue::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| GraphError::Protocol(format!("Invalid !{kind} id: {n}"))),
        Some(other) => Err(GraphError::Protocol(format!(
            "Invalid !{kind} id: {other:?}"
        ))),
    }
}

fn properties(kind: &str, mapping: &mut Mapping) -> Result<PropertySet> {
    match mapping.remove("properties") {
        None | Some(YamlValue::Null) => Ok(PropertySet::new()),
        Some(raw) => serde_yaml::from_value(raw)
            .map_err(|e| GraphError::Protocol(format!("Invalid !{kind} properties: {e}"))),
    }
}

fn hydrate_node(graph: &Graph, value: YamlValue) -> Result<Node> {
    let mut mapping = expect_mapping("Node", value)?;
    let id = entity_id("Node", &mapping)?;
    let labels: BTreeSet<String> = match mapping.remove("labels") {
        None | Some(YamlValue::Null) => BTreeSet::new(),
        Some(raw) => serde_yaml::from_value(raw)
            .map_err(|e| GraphError::Protocol(format!("Invalid !Node labels: {e}")))?,
    };
    let properties = properties("Node", &mut mapping)?;
    Ok(match id {
        Some(id) => graph.hydrate_node(id, labels, properties),
        None => Node::from_parts(labels, properties),
    })
}

/// A bare `!Rev` only sets the default direction of a new unbound
/// relationship; a bound proxy is shared and keeps its own.
fn hydrate_relationship(graph: &Graph, value: YamlValue, reverse: bool) -> Result<Relationship> {
    let rel = relationship(graph, value)?;
    if !rel.is_bound() {
        rel.set_reverse(reverse);
    }
    Ok(rel)
}

fn relationship(graph: &Graph, value: YamlValue) -> Result<Relationship> {
    let mut mapping = expect_mapping("Rel", value)?;
    let id = entity_id("Rel", &mapping)?;
    let rel_type = match mapping.remove("type") {
        Some(YamlValue::String(s)) => s,
        other => {
            return Err(GraphError::Protocol(format!(
                "Invalid !Rel type: {other:?}"
            )))
        }
    };
    let properties = properties("Rel", &mut mapping)?;
    Ok(match id {
        Some(id) => graph.hydrate_relationship(id, rel_type, properties),
        None => Relationship::from_parts(rel_type, properties),
    })
}

fn hydrate_path(graph: &Graph, value: YamlValue) -> Result<Path> {
    let items = match value {
        YamlValue::Sequence(items) => items,
        other => {
            return Err(GraphError::Protocol(format!(
                "Expected a sequence for !Path, got {other:?}"
            )))
        }
    };
    let mut elements = Vec::with_capacity(items.len());
    for item in items {
        let element = match item {
            YamlValue::Tagged(tagged) => match tagged.tag.to_string().trim_start_matches('!') {
                "Rel" => PathElement::Rel(relationship(graph, tagged.value)?),
                "Rev" => PathElement::Rev(relationship(graph, tagged.value)?),
                _ => path_node(graph, YamlValue::Tagged(tagged))?,
            },
            other => path_node(graph, other)?,
        };
        elements.push(element);
    }
    Path::from_elements(elements).map_err(|e| GraphError::Protocol(format!("Malformed !Path: {e}")))
}

fn path_node(graph: &Graph, raw: YamlValue) -> Result<PathElement> {
    match hydrate(graph, raw)? {
        Value::Node(node) => Ok(PathElement::Node(node)),
        other => Err(GraphError::Protocol(format!(
            "Unexpected !Path element: {other}"
        ))),
    }
}

fn hydrate_graph_address(value: YamlValue) -> Result<GraphAddress> {
    let mapping = expect_mapping("Graph", value)?;
    let host = mapping
        .get("host")
        .and_then(YamlValue::as_str)
        .ok_or_else(|| GraphError::Protocol("!Graph without host".into()))?
        .to_string();
    let port = mapping
        .get("port")
        .and_then(YamlValue::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| GraphError::Protocol("!Graph without a valid port".into()))?;
    Ok(GraphAddress { host, port })
}

fn hydrate_pointer(value: YamlValue) -> Result<Pointer> {
    value
        .as_u64()
        .and_then(|a| usize::try_from(a).ok())
        .map(Pointer::new)
        .ok_or_else(|| GraphError::Protocol(format!("Invalid !Pointer: {value:?}")))
}

#[cfg(test)]
mod tests {
    use zerograph_core::ClientConfig;

    use super::*;
    use crate::entity::{Bindable, PropertyHolder};
    use crate::transport::MemoryTransport;

    fn graph() -> Graph {
        Graph::with_transport(ClientConfig::default(), MemoryTransport::new())
    }

    fn raw(text: &str) -> YamlValue {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn node_binds_through_cache() {
        let graph = graph();
        let first = hydrate(&graph, raw("!Node {\"id\":3,\"labels\":[\"Person\"],\"properties\":{\"name\":\"Alice\"}}")).unwrap();
        let second = hydrate(&graph, raw("!Node {\"id\":3,\"labels\":[\"Person\"],\"properties\":{\"name\":\"Alicia\"}}")).unwrap();

        let (Value::Node(a), Value::Node(b)) = (first, second) else {
            panic!("expected nodes");
        };
        assert!(a.ptr_eq(&b));
        assert_eq!(a.get("name"), Some(serde_json::Value::from("Alicia")));
        assert_eq!(a.bound_id(), Some(3));
        assert_eq!(a.bound_graph(), Some(graph));
    }

    #[test]
    fn node_without_id_is_unbound() {
        let value = hydrate(&graph(), raw("!Node {\"labels\":[\"X\"]}")).unwrap();
        let node = value.as_node().unwrap();
        assert!(!node.is_bound());
        assert!(node.has_label("X"));
    }

    #[test]
    fn path_with_reverse_relationship() {
        let graph = graph();
        let value = hydrate(
            &graph,
            raw("!Path [!Node {\"id\":1}, !Rev {\"id\":9,\"type\":\"LIKES\",\"properties\":{\"w\":2}}, !Node {\"id\":2}]"),
        )
        .unwrap();
        let path = value.as_path().unwrap();
        assert_eq!(path.size(), 1);
        assert!(path.is_reversed(0));
        let rel = path.rel().unwrap();
        assert!(!rel.is_reverse());
        assert_eq!(rel.rel_type(), "LIKES");
        assert_eq!(rel.properties().get("w"), Some(&serde_json::Value::from(2)));
        assert!(graph.cached_relationship(9).unwrap().ptr_eq(&rel));
        assert!(graph.cached_node(2).unwrap().ptr_eq(path.end_node()));
    }

    #[test]
    fn one_relationship_walked_both_ways() {
        let graph = graph();
        let forward = hydrate(
            &graph,
            raw("!Path [!Node {\"id\":1}, !Rel {\"id\":9,\"type\":\"KNOWS\"}, !Node {\"id\":2}]"),
        )
        .unwrap();
        let backward = hydrate(
            &graph,
            raw("!Path [!Node {\"id\":2}, !Rev {\"id\":9,\"type\":\"KNOWS\"}, !Node {\"id\":1}]"),
        )
        .unwrap();
        let (forward, backward) = (forward.as_path().unwrap(), backward.as_path().unwrap());

        assert!(forward.rel().unwrap().ptr_eq(&backward.rel().unwrap()));
        assert!(!forward.is_reversed(0));
        assert!(backward.is_reversed(0));
        assert_eq!(forward.to_string(), "(_1)-[_9:KNOWS]->(_2)");
        assert_eq!(backward.to_string(), "(_2)<-[_9:KNOWS]-(_1)");
    }

    #[test]
    fn graph_and_pointer_tags() {
        let graph = graph();
        assert_eq!(
            hydrate(&graph, raw("!Graph {\"host\":\"db\",\"port\":47471}")).unwrap(),
            Value::Graph(GraphAddress {
                host: "db".into(),
                port: 47471
            })
        );
        assert_eq!(
            hydrate(&graph, raw("!Pointer 4")).unwrap(),
            Value::Pointer(Pointer::new(4))
        );
    }

    #[test]
    fn malformed_path_is_protocol_error() {
        let err = hydrate(&graph(), raw("!Path [!Node {\"id\":1}, !Node {\"id\":2}]")).unwrap_err();
        assert!(matches!(err, GraphError::Protocol(_)));
    }

    #[test]
    fn plain_values_pass_through() {
        let value = hydrate(&graph(), raw("[1, 2.5, \"x\", {\"k\": null}]")).unwrap();
        assert_eq!(value.to_string(), "[1, 2.5, x, {k: null}]");
    }
}
