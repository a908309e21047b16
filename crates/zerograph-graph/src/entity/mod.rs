//! Local proxies for remote graph entities.

pub mod binding;
pub mod node;
pub mod path;
pub mod relationship;

use std::fmt;

pub use binding::{Bindable, Binding, PropertyHolder};
pub use node::Node;
pub use path::{Path, PathElement, Segment};
pub use relationship::Relationship;

/// Any entity accepted by the batch orchestrators.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(Node),
    Relationship(Relationship),
    Path(Path),
}

impl Entity {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Self::Relationship(rel) => Some(rel),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<&Node> for Entity {
    fn from(node: &Node) -> Self {
        Self::Node(node.clone())
    }
}

impl From<Relationship> for Entity {
    fn from(rel: Relationship) -> Self {
        Self::Relationship(rel)
    }
}

impl From<&Relationship> for Entity {
    fn from(rel: &Relationship) -> Self {
        Self::Relationship(rel.clone())
    }
}

impl From<Path> for Entity {
    fn from(path: Path) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Entity {
    fn from(path: &Path) -> Self {
        Self::Path(path.clone())
    }
}

impl From<Segment> for Entity {
    fn from(segment: Segment) -> Self {
        Self::Path(segment.into_path())
    }
}

impl From<&Segment> for Entity {
    fn from(segment: &Segment) -> Self {
        Self::Path(segment.path().clone())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => node.fmt(f),
            Self::Relationship(rel) => rel.fmt(f),
            Self::Path(path) => path.fmt(f),
        }
    }
}
