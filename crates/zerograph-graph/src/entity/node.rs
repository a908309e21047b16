//! Local node proxies.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use zerograph_core::properties::quote_identifier;
use zerograph_core::{Method, PropertySet, Request, Resource, Result};

use super::binding::{Bindable, Binding, PropertyHolder};
use crate::client::Graph;

pub(crate) struct NodeState {
    labels: BTreeSet<String>,
    properties: PropertySet,
    binding: Binding,
}

/// A node that may be bound to a node in a remote graph.
///
/// `Node` is a shared handle: clones observe and mutate the same state, and
/// hydrating a reply that carries the id of a bound node updates that node in
/// place. Reading or writing labels and properties never touches the network;
/// use [`Node::pull`] and [`Node::push`] for that.
#[derive(Clone)]
pub struct Node(Arc<RwLock<NodeState>>);

impl Node {
    pub fn new() -> Self {
        Self::from_parts(BTreeSet::new(), PropertySet::new())
    }

    pub fn from_parts(labels: BTreeSet<String>, properties: PropertySet) -> Self {
        Self(Arc::new(RwLock::new(NodeState {
            labels,
            properties,
            binding: Binding::Unbound,
        })))
    }

    pub(crate) fn bound(
        labels: BTreeSet<String>,
        properties: PropertySet,
        graph: Graph,
        id: i64,
    ) -> Self {
        Self(Arc::new(RwLock::new(NodeState {
            labels,
            properties,
            binding: Binding::Bound { graph, id },
        })))
    }

    pub(crate) fn from_state(state: Arc<RwLock<NodeState>>) -> Self {
        Self(state)
    }

    pub(crate) fn state(&self) -> &Arc<RwLock<NodeState>> {
        &self.0
    }

    /// Identity of the shared state, for grouping handles by object.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.add_label(label);
        self
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.write().properties.set(key, value);
        self
    }

    /// Whether both handles refer to the same local object.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // ── Local State ──────────────────────────────────────────────

    pub fn labels(&self) -> BTreeSet<String> {
        self.0.read().labels.clone()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.0.read().labels.contains(label)
    }

    pub fn add_label(&self, label: impl Into<String>) {
        self.0.write().labels.insert(label.into());
    }

    pub fn remove_label(&self, label: &str) -> bool {
        self.0.write().labels.remove(label)
    }

    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.0.read().properties.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.write().properties.set(key, value);
    }

    /// Replace labels and properties with those given.
    pub fn replace(&self, labels: BTreeSet<String>, properties: PropertySet) {
        self.overwrite(labels, properties);
    }

    pub(crate) fn overwrite(&self, labels: BTreeSet<String>, properties: PropertySet) {
        let mut state = self.0.write();
        state.labels = labels;
        state.properties = properties;
    }

    /// Copy labels and properties from another node.
    pub(crate) fn overwrite_from(&self, other: &Node) {
        if self.ptr_eq(other) {
            return;
        }
        let (labels, properties) = {
            let source = other.0.read();
            (source.labels.clone(), source.properties.clone())
        };
        self.overwrite(labels, properties);
    }

    // ── Binding ──────────────────────────────────────────────────

    /// Bind to node `id` of `graph` and make this object the canonical proxy
    /// for that id.
    pub fn bind(&self, graph: &Graph, id: i64) {
        let previous = std::mem::replace(
            &mut self.0.write().binding,
            Binding::Bound {
                graph: graph.clone(),
                id,
            },
        );
        if let Binding::Bound { graph: old, id: old_id } = previous {
            old.forget_node(old_id, self);
        }
        graph.adopt_node(id, self);
    }

    /// Detach from the remote node. Local labels and properties are kept.
    pub fn unbind(&self) {
        let previous = std::mem::take(&mut self.0.write().binding);
        if let Binding::Bound { graph, id } = previous {
            graph.forget_node(id, self);
        }
    }

    // ── Synchronization ──────────────────────────────────────────

    /// Replace local labels and properties with the remote ones.
    pub async fn pull(&self) -> Result<()> {
        let (graph, id) = self.assert_bound()?;
        let remote = graph.request(get_request(id)).await?.into_node()?;
        self.overwrite_from(&remote);
        Ok(())
    }

    /// Replace remote labels and properties with the local ones.
    pub async fn push(&self) -> Result<()> {
        let (graph, id) = self.assert_bound()?;
        graph.request(set_request(id, self)).await?;
        Ok(())
    }

    /// Whether the bound remote node still exists.
    pub async fn exists(&self) -> Result<bool> {
        let (graph, id) = self.assert_bound()?;
        match graph.request(get_request(id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the remote node and unbind.
    pub async fn delete(&self) -> Result<()> {
        let (graph, id) = self.assert_bound()?;
        graph
            .request(Request::new(Method::Delete, Resource::Node).arg("id", id))
            .await?;
        self.unbind();
        Ok(())
    }
}

pub(crate) fn get_request(id: i64) -> Request {
    Request::new(Method::Get, Resource::Node).arg("id", id)
}

pub(crate) fn set_request(id: i64, node: &Node) -> Request {
    let state = node.0.read();
    Request::new(Method::Set, Resource::Node)
        .arg("id", id)
        .arg("labels", state.labels.clone())
        .arg("properties", &state.properties)
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Bindable for Node {
    fn binding(&self) -> Binding {
        self.0.read().binding.clone()
    }

    fn describe(&self) -> String {
        format!("Node {self}")
    }
}

impl PropertyHolder for Node {
    fn properties(&self) -> PropertySet {
        self.0.read().properties.clone()
    }

    fn property(&self, key: &str) -> Option<JsonValue> {
        self.get(key)
    }

    fn set_property(&self, key: &str, value: JsonValue) {
        self.set(key, value);
    }

    fn replace_properties(&self, properties: PropertySet) {
        self.0.write().properties = properties;
    }
}

/// Labels and properties only; the binding is identity, not value.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.0.read(), other.0.read());
        a.labels == b.labels && a.properties == b.properties
    }
}

/// Cypher notation, e.g. `(_12:Person {name:"Alice"})`.
impl Node {
    /// Geoff notation: bare id and JSON properties, e.g.
    /// `(3:Person {"name":"Alice"})`.
    pub fn to_geoff(&self) -> String {
        let state = self.0.read();
        let mut inner = String::new();
        if let Some(id) = state.binding.id() {
            inner.push_str(&id.to_string());
        }
        for label in &state.labels {
            inner.push(':');
            inner.push_str(label);
        }
        if !state.properties.is_empty() {
            if !inner.is_empty() {
                inner.push(' ');
            }
            inner.push_str(&state.properties.to_json().to_string());
        }
        format!("({inner})")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.read();
        let mut inner = String::new();
        if let Some(id) = state.binding.id() {
            inner.push_str(&format!("_{id}"));
        }
        for label in &state.labels {
            inner.push(':');
            inner.push_str(&quote_identifier(label));
        }
        if !state.properties.is_empty() {
            if !inner.is_empty() {
                inner.push(' ');
            }
            inner.push_str(&state.properties.to_cypher());
        }
        write!(f, "({inner})")
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.read();
        f.debug_struct("Node")
            .field("labels", &state.labels)
            .field("properties", &state.properties)
            .field("binding", &state.binding)
            .finish()
    }
}
