//! Local relationship proxies.
//!
//! A relationship carries its type and properties but never its endpoints;
//! those belong to the [`Path`](super::Path) or [`Segment`](super::Segment)
//! it sits in.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use zerograph_core::properties::quote_identifier;
use zerograph_core::{GraphError, Method, PropertySet, Request, Resource, Result};

use super::binding::{Bindable, Binding, PropertyHolder};
use crate::client::Graph;

pub(crate) struct RelState {
    rel_type: String,
    properties: PropertySet,
    binding: Binding,
    /// Default direction when placed in a path without an explicit one.
    reverse: bool,
}

/// A relationship that may be bound to a relationship in a remote graph.
///
/// Shared handle with the same semantics as [`Node`](super::Node).
#[derive(Clone)]
pub struct Relationship(Arc<RwLock<RelState>>);

impl Relationship {
    pub fn new(rel_type: impl Into<String>) -> Self {
        Self::from_parts(rel_type, PropertySet::new())
    }

    /// A relationship that points from the later node of its path back to
    /// the earlier one.
    pub fn reversed(rel_type: impl Into<String>) -> Self {
        let rel = Self::new(rel_type);
        rel.set_reverse(true);
        rel
    }

    pub fn from_parts(rel_type: impl Into<String>, properties: PropertySet) -> Self {
        Self(Arc::new(RwLock::new(RelState {
            rel_type: rel_type.into(),
            properties,
            binding: Binding::Unbound,
            reverse: false,
        })))
    }

    pub(crate) fn bound(rel_type: String, properties: PropertySet, graph: Graph, id: i64) -> Self {
        Self(Arc::new(RwLock::new(RelState {
            rel_type,
            properties,
            binding: Binding::Bound { graph, id },
            reverse: false,
        })))
    }

    pub(crate) fn from_state(state: Arc<RwLock<RelState>>) -> Self {
        Self(state)
    }

    pub(crate) fn state(&self) -> &Arc<RwLock<RelState>> {
        &self.0
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.write().properties.set(key, value);
        self
    }

    pub fn ptr_eq(&self, other: &Relationship) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // ── Local State ──────────────────────────────────────────────

    pub fn rel_type(&self) -> String {
        self.0.read().rel_type.clone()
    }

    pub fn set_rel_type(&self, rel_type: impl Into<String>) {
        self.0.write().rel_type = rel_type.into();
    }

    /// The direction used by [`Path::new`](super::Path::new) and
    /// [`Segment::new`](super::Segment::new). Paths read from a graph carry
    /// their own directions and ignore it.
    pub fn is_reverse(&self) -> bool {
        self.0.read().reverse
    }

    pub fn set_reverse(&self, reverse: bool) {
        self.0.write().reverse = reverse;
    }

    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.0.read().properties.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.write().properties.set(key, value);
    }

    /// Replace type and properties with those given.
    pub fn replace(&self, rel_type: impl Into<String>, properties: PropertySet) {
        self.overwrite(rel_type.into(), properties);
    }

    pub(crate) fn overwrite(&self, rel_type: String, properties: PropertySet) {
        let mut state = self.0.write();
        state.rel_type = rel_type;
        state.properties = properties;
    }

    pub(crate) fn overwrite_from(&self, other: &Relationship) {
        if self.ptr_eq(other) {
            return;
        }
        let (rel_type, properties) = {
            let source = other.0.read();
            (source.rel_type.clone(), source.properties.clone())
        };
        self.overwrite(rel_type, properties);
    }

    // ── Binding ──────────────────────────────────────────────────

    /// Bind to relationship `id` of `graph` and make this object the
    /// canonical proxy for that id.
    pub fn bind(&self, graph: &Graph, id: i64) {
        let previous = std::mem::replace(
            &mut self.0.write().binding,
            Binding::Bound {
                graph: graph.clone(),
                id,
            },
        );
        if let Binding::Bound { graph: old, id: old_id } = previous {
            old.forget_relationship(old_id, self);
        }
        graph.adopt_relationship(id, self);
    }

    pub fn unbind(&self) {
        let previous = std::mem::take(&mut self.0.write().binding);
        if let Binding::Bound { graph, id } = previous {
            graph.forget_relationship(id, self);
        }
    }

    // ── Synchronization ──────────────────────────────────────────

    /// Replace local type and properties with the remote ones.
    pub async fn pull(&self) -> Result<()> {
        let (graph, id) = self.assert_bound()?;
        let remote = graph.request(get_request(id)).await?.into_path()?;
        let rel = remote.rel().ok_or_else(|| {
            GraphError::Protocol(format!("Relationship {id} came back without a relationship"))
        })?;
        self.overwrite_from(&rel);
        Ok(())
    }

    /// Replace remote properties with the local ones. The type of a remote
    /// relationship is immutable and is not sent.
    pub async fn push(&self) -> Result<()> {
        let (graph, id) = self.assert_bound()?;
        graph.request(set_request(id, self)).await?;
        Ok(())
    }

    pub async fn exists(&self) -> Result<bool> {
        let (graph, id) = self.assert_bound()?;
        match graph.request(get_request(id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the remote relationship and unbind.
    pub async fn delete(&self) -> Result<()> {
        let (graph, id) = self.assert_bound()?;
        graph
            .request(Request::new(Method::Delete, Resource::Rel).arg("id", id))
            .await?;
        self.unbind();
        Ok(())
    }
}

pub(crate) fn get_request(id: i64) -> Request {
    Request::new(Method::Get, Resource::Rel).arg("id", id)
}

pub(crate) fn set_request(id: i64, rel: &Relationship) -> Request {
    Request::new(Method::Set, Resource::Rel)
        .arg("id", id)
        .arg("properties", &rel.0.read().properties)
}

impl Bindable for Relationship {
    fn binding(&self) -> Binding {
        self.0.read().binding.clone()
    }

    fn describe(&self) -> String {
        format!("Relationship {self}")
    }
}

impl PropertyHolder for Relationship {
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

/// Type and properties only.
impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.0.read(), other.0.read());
        a.rel_type == b.rel_type && a.properties == b.properties
    }
}

impl Relationship {
    /// Cypher arrow pointing forward, or back when `reverse`.
    pub(crate) fn arrow(&self, reverse: bool) -> String {
        let state = self.0.read();
        let mut inner = String::new();
        if let Some(id) = state.binding.id() {
            inner.push_str(&format!("_{id}"));
        }
        inner.push(':');
        inner.push_str(&quote_identifier(&state.rel_type));
        if !state.properties.is_empty() {
            inner.push(' ');
            inner.push_str(&state.properties.to_cypher());
        }
        if reverse {
            format!("<-[{inner}]-")
        } else {
            format!("-[{inner}]->")
        }
    }
}

impl Relationship {
    /// Geoff notation in its default direction, e.g. `-[5:KNOWS {"since":1999}]->`.
    pub fn to_geoff(&self) -> String {
        self.geoff_arrow(self.is_reverse())
    }

    pub(crate) fn geoff_arrow(&self, reverse: bool) -> String {
        let state = self.0.read();
        let mut inner = String::new();
        if let Some(id) = state.binding.id() {
            inner.push_str(&id.to_string());
        }
        inner.push(':');
        inner.push_str(&state.rel_type);
        if !state.properties.is_empty() {
            inner.push(' ');
            inner.push_str(&state.properties.to_json().to_string());
        }
        if reverse {
            format!("<-[{inner}]-")
        } else {
            format!("-[{inner}]->")
        }
    }
}

/// Cypher notation, e.g. `-[_5:KNOWS {since:1999}]->` or `<-[:LIKES]-`.
impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arrow(self.is_reverse()))
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.read();
        f.debug_struct("Relationship")
            .field("type", &state.rel_type)
            .field("properties", &state.properties)
            .field("binding", &state.binding)
            .field("reverse", &state.reverse)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cypher_notation() {
        let rel = Relationship::new("KNOWS").with_property("since", 1999);
        assert_eq!(rel.to_string(), "-[:KNOWS {since:1999}]->");
        assert_eq!(Relationship::reversed("LIKES").to_string(), "<-[:LIKES]-");
    }

    #[test]
    fn geoff_notation() {
        let rel = Relationship::new("KNOWS").with_property("since", 1999);
        assert_eq!(rel.to_geoff(), r#"-[:KNOWS {"since":1999}]->"#);
        assert_eq!(Relationship::reversed("LIKES").to_geoff(), "<-[:LIKES]-");
    }

    #[test]
    fn equality_is_type_and_properties() {
        let a = Relationship::new("KNOWS");
        let b = Relationship::reversed("KNOWS");
        assert_eq!(a, b);
        b.set("since", 1999);
        assert_ne!(a, b);
    }
}
