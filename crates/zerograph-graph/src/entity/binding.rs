//! Bound/unbound lifecycle shared by nodes and relationships.

use std::fmt;

use serde_json::Value as JsonValue;

use zerograph_core::{GraphError, PropertySet, Result};

use crate::client::Graph;

/// Association of a local entity with a remote record.
#[derive(Clone, Default, PartialEq)]
pub enum Binding {
    #[default]
    Unbound,
    Bound { graph: Graph, id: i64 },
}

impl Binding {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Bound { id, .. } => Some(*id),
            Self::Unbound => None,
        }
    }

    pub fn graph(&self) -> Option<&Graph> {
        match self {
            Self::Bound { graph, .. } => Some(graph),
            Self::Unbound => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => f.write_str("Unbound"),
            Self::Bound { graph, id } => write!(f, "Bound({}:{}/{id})", graph.host(), graph.port()),
        }
    }
}

/// Entities that may be bound to a remote record.
pub trait Bindable {
    fn binding(&self) -> Binding;

    fn bound_id(&self) -> Option<i64> {
        self.binding().id()
    }

    fn bound_graph(&self) -> Option<Graph> {
        self.binding().graph().cloned()
    }

    fn is_bound(&self) -> bool {
        self.binding().is_bound()
    }

    /// The graph and id this entity is bound to, or `NotBound`.
    fn assert_bound(&self) -> Result<(Graph, i64)> {
        match self.binding() {
            Binding::Bound { graph, id } => Ok((graph, id)),
            Binding::Unbound => Err(GraphError::NotBound(self.describe())),
        }
    }

    /// Short description used in error messages.
    fn describe(&self) -> String;
}

/// Entities carrying a property set.
pub trait PropertyHolder {
    /// A snapshot of the current properties.
    fn properties(&self) -> PropertySet;

    fn property(&self, key: &str) -> Option<JsonValue> {
        self.properties().get(key).cloned()
    }

    /// Set one property locally; `null` removes it.
    fn set_property(&self, key: &str, value: JsonValue);

    /// Replace every property locally.
    fn replace_properties(&self, properties: PropertySet);
}

/// Check that `binding`, if bound, belongs to `graph`.
pub(crate) fn check_graph(binding: &Binding, graph: &Graph, what: &dyn fmt::Display) -> Result<()> {
    match binding.graph() {
        Some(bound) if bound != graph => Err(GraphError::CrossGraph(format!(
            "{what} is bound to a different graph"
        ))),
        _ => Ok(()),
    }
}
