//! Paths: alternating node/relationship sequences.

use std::fmt;
use std::ops::Deref;

use serde_json::Value as JsonValue;

use zerograph_core::{GraphError, PropertySet, Result};

use super::binding::{Bindable, Binding, PropertyHolder};
use super::{Node, Relationship};
use crate::client::Graph;

/// One element of a path given in walk order.
///
/// `Rel` points from the preceding node to the following one, `Rev` points
/// back from the following node to the preceding one.
#[derive(Debug, Clone)]
pub enum PathElement {
    Node(Node),
    Rel(Relationship),
    Rev(Relationship),
}

impl From<Node> for PathElement {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

/// Oriented by [`Relationship::is_reverse`].
impl From<Relationship> for PathElement {
    fn from(rel: Relationship) -> Self {
        if rel.is_reverse() {
            Self::Rev(rel)
        } else {
            Self::Rel(rel)
        }
    }
}

/// `node₀, rel₀, node₁, …, nodeₙ`.
///
/// Paths hold shared entity handles, so the same node object may appear in
/// several paths. Every bound constituent belongs to the same graph.
///
/// The direction of each relationship is part of the path, not of the
/// relationship: one remote relationship can be walked either way.
#[derive(Clone)]
pub struct Path {
    nodes: Vec<Node>,
    rels: Vec<Relationship>,
    reversed: Vec<bool>,
}

impl Path {
    /// Build a path from its nodes and the relationships between them, each
    /// relationship oriented by [`Relationship::is_reverse`].
    pub fn new(nodes: Vec<Node>, rels: Vec<Relationship>) -> Result<Self> {
        let reversed = rels.iter().map(Relationship::is_reverse).collect();
        Self::oriented(nodes, rels, reversed)
    }

    /// Build a path with an explicit direction per relationship; `true`
    /// means the relationship points from `nodes[i + 1]` to `nodes[i]`.
    pub fn oriented(nodes: Vec<Node>, rels: Vec<Relationship>, reversed: Vec<bool>) -> Result<Self> {
        if reversed.len() != rels.len() {
            return Err(GraphError::InvalidValue(format!(
                "Got {} directions for {} relationships",
                reversed.len(),
                rels.len()
            )));
        }
        if nodes.len() != rels.len() + 1 {
            return Err(GraphError::InvalidValue(format!(
                "A path needs exactly one more node than relationships (got {} nodes, {} relationships)",
                nodes.len(),
                rels.len()
            )));
        }
        let path = Self {
            nodes,
            rels,
            reversed,
        };
        path.check_single_graph()?;
        Ok(path)
    }

    /// A path of a single node and no relationships.
    pub fn from_node(node: Node) -> Self {
        Self {
            nodes: vec![node],
            rels: Vec::new(),
            reversed: Vec::new(),
        }
    }

    /// Build a path from elements in walk order, which must start and end
    /// with a node and alternate in between.
    pub fn from_elements(elements: impl IntoIterator<Item = PathElement>) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut rels = Vec::new();
        let mut reversed = Vec::new();
        for (i, element) in elements.into_iter().enumerate() {
            match (i % 2, element) {
                (0, PathElement::Node(node)) => nodes.push(node),
                (1, PathElement::Rel(rel)) => {
                    rels.push(rel);
                    reversed.push(false);
                }
                (1, PathElement::Rev(rel)) => {
                    rels.push(rel);
                    reversed.push(true);
                }
                (_, other) => {
                    return Err(GraphError::InvalidValue(format!(
                        "Path element {i} breaks node/relationship alternation: {other:?}"
                    )))
                }
            }
        }
        if nodes.is_empty() {
            return Err(GraphError::InvalidValue("A path needs at least one node".into()));
        }
        Self::oriented(nodes, rels, reversed)
    }

    fn check_single_graph(&self) -> Result<()> {
        let mut graph: Option<Graph> = None;
        let bindings = self
            .nodes
            .iter()
            .map(Bindable::binding)
            .chain(self.rels.iter().map(Bindable::binding));
        for binding in bindings {
            if let Binding::Bound { graph: g, .. } = binding {
                match &graph {
                    Some(seen) if *seen != g => {
                        return Err(GraphError::CrossGraph(
                            "Bound path entities cannot span multiple graphs".into(),
                        ))
                    }
                    Some(_) => {}
                    None => graph = Some(g),
                }
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn rels(&self) -> &[Relationship] {
        &self.rels
    }

    /// Whether relationship `index` points back along the path.
    pub fn is_reversed(&self, index: usize) -> bool {
        self.reversed.get(index).copied().unwrap_or(false)
    }

    /// Number of nodes.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Number of relationships.
    pub fn size(&self) -> usize {
        self.rels.len()
    }

    pub fn start_node(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn end_node(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// The first relationship, if any.
    pub fn rel(&self) -> Option<Relationship> {
        self.rels.first().cloned()
    }

    pub fn last_rel(&self) -> Option<Relationship> {
        self.rels.last().cloned()
    }

    /// Segment `index`: `nodes[index], rels[index], nodes[index + 1]`.
    pub fn segment(&self, index: usize) -> Option<Segment> {
        let rel = self.rels.get(index)?;
        Some(Segment(Path {
            nodes: vec![self.nodes[index].clone(), self.nodes[index + 1].clone()],
            rels: vec![rel.clone()],
            reversed: vec![self.is_reversed(index)],
        }))
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.size()).filter_map(|i| self.segment(i))
    }

    /// The graph of the bound constituents, if any is bound.
    pub fn bound_graph(&self) -> Option<Graph> {
        self.nodes
            .iter()
            .filter_map(Bindable::bound_graph)
            .chain(self.rels.iter().filter_map(Bindable::bound_graph))
            .next()
    }

    /// Whether every node and relationship is bound.
    pub fn is_bound(&self) -> bool {
        self.nodes.iter().all(Bindable::is_bound) && self.rels.iter().all(Bindable::is_bound)
    }

    fn require_graph(&self) -> Result<Graph> {
        self.bound_graph()
            .ok_or_else(|| GraphError::NotBound(format!("Path {self}")))
    }

    /// Geoff notation of the whole walk.
    pub fn to_geoff(&self) -> String {
        let mut out = self.nodes[0].to_geoff();
        for (i, (rel, node)) in self.rels.iter().zip(&self.nodes[1..]).enumerate() {
            out.push_str(&rel.geoff_arrow(self.is_reversed(i)));
            out.push_str(&node.to_geoff());
        }
        out
    }

    /// Refresh every constituent from the remote graph.
    pub async fn pull(&self) -> Result<()> {
        self.require_graph()?.pull([self.clone()]).await
    }

    /// Push every constituent to the remote graph.
    pub async fn push(&self) -> Result<()> {
        self.require_graph()?.push([self.clone()]).await
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.rels == other.rels && self.reversed == other.reversed
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nodes[0])?;
        for (i, (rel, node)) in self.rels.iter().zip(&self.nodes[1..]).enumerate() {
            write!(f, "{}{node}", rel.arrow(self.is_reversed(i)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("nodes", &self.nodes)
            .field("rels", &self.rels)
            .field("reversed", &self.reversed)
            .finish()
    }
}

// ── Segment ──────────────────────────────────────────────────────

/// A path of exactly one relationship.
///
/// Behaves as its relationship for type, properties and binding, and as a
/// path (via `Deref`) for node and relationship access.
#[derive(Clone, PartialEq)]
pub struct Segment(Path);

impl Segment {
    pub fn new(start: Node, rel: Relationship, end: Node) -> Result<Self> {
        Path::new(vec![start, end], vec![rel]).map(Self)
    }

    pub fn relationship(&self) -> &Relationship {
        &self.0.rels[0]
    }

    pub fn rel_type(&self) -> String {
        self.relationship().rel_type()
    }

    /// Whether the relationship points from the end node to the start node.
    pub fn is_reversed(&self) -> bool {
        self.0.is_reversed(0)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> Path {
        self.0
    }
}

impl Deref for Segment {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<Path> for Segment {
    type Error = GraphError;

    fn try_from(path: Path) -> Result<Self> {
        if path.size() == 1 {
            Ok(Self(path))
        } else {
            Err(GraphError::InvalidValue(format!(
                "Expected a single-relationship path, got {} relationships",
                path.size()
            )))
        }
    }
}

impl From<Segment> for Path {
    fn from(segment: Segment) -> Self {
        segment.0
    }
}

impl Bindable for Segment {
    fn binding(&self) -> Binding {
        self.relationship().binding()
    }

    fn describe(&self) -> String {
        format!("Segment {self}")
    }
}

impl PropertyHolder for Segment {
    fn properties(&self) -> PropertySet {
        self.relationship().properties()
    }

    fn property(&self, key: &str) -> Option<JsonValue> {
        self.relationship().get(key)
    }

    fn set_property(&self, key: &str, value: JsonValue) {
        self.relationship().set(key, value);
    }

    fn replace_properties(&self, properties: PropertySet) {
        self.relationship().replace_properties(properties);
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Segment").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Node {
        Node::new().with_label("Person").with_property("name", "Alice")
    }

    fn bob() -> Node {
        Node::new().with_label("Person").with_property("name", "Bob")
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            Path::new(vec![alice(), bob()], vec![]),
            Err(GraphError::InvalidValue(_))
        ));
        assert!(matches!(
            Path::new(vec![], vec![]),
            Err(GraphError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_broken_alternation() {
        let elements = vec![
            PathElement::Node(alice()),
            PathElement::Node(bob()),
            PathElement::Rel(Relationship::new("KNOWS")),
        ];
        assert!(matches!(
            Path::from_elements(elements),
            Err(GraphError::InvalidValue(_))
        ));

        let dangling = vec![
            PathElement::Node(alice()),
            PathElement::Rel(Relationship::new("KNOWS")),
        ];
        assert!(Path::from_elements(dangling).is_err());
    }

    #[test]
    fn segments_and_accessors() {
        let carol = Node::new().with_property("name", "Carol");
        let elements: Vec<PathElement> = vec![
            alice().into(),
            Relationship::new("KNOWS").into(),
            bob().into(),
            Relationship::reversed("LIKES").into(),
            carol.clone().into(),
        ];
        let path = Path::from_elements(elements).unwrap();
        assert_eq!(path.order(), 3);
        assert_eq!(path.size(), 2);
        assert!(path.end_node().ptr_eq(&carol));
        assert_eq!(path.last_rel().unwrap().rel_type(), "LIKES");

        let segments: Vec<Segment> = path.segments().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].rel_type(), "LIKES");
        assert!(segments[1].end_node().ptr_eq(&carol));
        assert!(path.segment(2).is_none());
    }

    #[test]
    fn renders_as_cypher() {
        let segment = Segment::new(alice(), Relationship::new("KNOWS"), bob()).unwrap();
        assert_eq!(
            segment.to_string(),
            "(:Person {name:\"Alice\"})-[:KNOWS]->(:Person {name:\"Bob\"})"
        );
    }

    #[test]
    fn renders_as_geoff() {
        let path = Path::from_elements([
            PathElement::Node(alice()),
            PathElement::Rev(Relationship::new("LIKES").with_property("w", 2)),
            PathElement::Node(Node::new()),
        ])
        .unwrap();
        assert_eq!(
            path.to_geoff(),
            r#"(:Person {"name":"Alice"})<-[:LIKES {"w":2}]-()"#
        );
    }

    #[test]
    fn segment_proxies_relationship() {
        let segment = Segment::new(alice(), Relationship::new("KNOWS"), bob()).unwrap();
        segment.set_property("since", JsonValue::from(1999));
        assert_eq!(segment.relationship().get("since"), Some(JsonValue::from(1999)));
        assert_eq!(segment.properties().len(), 1);
        assert!(!Bindable::is_bound(&segment));
    }

    #[test]
    fn direction_belongs_to_the_path() {
        let likes = Relationship::new("LIKES");
        let forward = Path::from_elements([
            PathElement::Node(alice()),
            PathElement::Rel(likes.clone()),
            PathElement::Node(bob()),
        ])
        .unwrap();
        let backward = Path::from_elements([
            PathElement::Node(bob()),
            PathElement::Rev(likes.clone()),
            PathElement::Node(alice()),
        ])
        .unwrap();

        assert!(!forward.is_reversed(0));
        assert!(backward.is_reversed(0));
        assert!(!likes.is_reverse());
        assert!(backward.segment(0).unwrap().is_reversed());
        assert_eq!(
            backward.to_string(),
            "(:Person {name:\"Bob\"})<-[:LIKES]-(:Person {name:\"Alice\"})"
        );
        assert_ne!(forward, backward);
        assert!(Path::oriented(vec![alice(), bob()], vec![likes], vec![]).is_err());
    }

    #[test]
    fn segment_requires_one_relationship() {
        let path = Path::from_node(alice());
        assert!(Segment::try_from(path).is_err());
    }
}
