//! Request lines: `METHOD Resource {"key":value,"ref*":0}`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::pointer::Pointer;
use crate::properties::PropertySet;

/// Suffix that marks an argument as a forward reference.
pub const POINTER_MARKER: char = '*';

// ── Vocabulary ───────────────────────────────────────────────────

/// Operation applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Set,
    Patch,
    Create,
    Delete,
    Execute,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Set => "SET",
            Self::Patch => "PATCH",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "SET" => Ok(Self::Set),
            "PATCH" => Ok(Self::Patch),
            "CREATE" => Ok(Self::Create),
            "DELETE" => Ok(Self::Delete),
            "EXECUTE" => Ok(Self::Execute),
            _ => Err(GraphError::InvalidValue(format!("Unsupported method: {s}"))),
        }
    }
}

/// Resource names understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cypher,
    Graph,
    Node,
    NodeSet,
    Rel,
    RelSet,
    Zerograph,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cypher => "Cypher",
            Self::Graph => "Graph",
            Self::Node => "Node",
            Self::NodeSet => "NodeSet",
            Self::Rel => "Rel",
            Self::RelSet => "RelSet",
            Self::Zerograph => "Zerograph",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Cypher" => Ok(Self::Cypher),
            "Graph" => Ok(Self::Graph),
            "Node" => Ok(Self::Node),
            "NodeSet" => Ok(Self::NodeSet),
            "Rel" => Ok(Self::Rel),
            "RelSet" => Ok(Self::RelSet),
            "Zerograph" => Ok(Self::Zerograph),
            _ => Err(GraphError::InvalidValue(format!("Unknown resource: {s}"))),
        }
    }
}

// ── Arguments ────────────────────────────────────────────────────

/// One keyword argument: either plain data or a forward reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    Pointer(Pointer),
}

impl Argument {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    pub fn as_pointer(&self) -> Option<Pointer> {
        match self {
            Self::Pointer(p) => Some(*p),
            Self::Value(_) => None,
        }
    }
}

impl From<Pointer> for Argument {
    fn from(p: Pointer) -> Self {
        Self::Pointer(p)
    }
}

impl From<Value> for Argument {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<PropertySet> for Argument {
    fn from(p: PropertySet) -> Self {
        Self::Value(p.to_json())
    }
}

impl From<&PropertySet> for Argument {
    fn from(p: &PropertySet) -> Self {
        Self::Value(p.to_json())
    }
}

impl From<BTreeSet<String>> for Argument {
    fn from(labels: BTreeSet<String>) -> Self {
        Self::Value(Value::Array(labels.into_iter().map(Value::String).collect()))
    }
}

impl From<Map<String, Value>> for Argument {
    fn from(m: Map<String, Value>) -> Self {
        Self::Value(Value::Object(m))
    }
}

macro_rules! value_argument {
    ($($t:ty),*) => {
        $(impl From<$t> for Argument {
            fn from(v: $t) -> Self {
                Self::Value(Value::from(v))
            }
        })*
    };
}

value_argument!(bool, i32, i64, u16, u32, u64, f64, String, &str, Vec<String>);

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Value(Value::Null))
    }
}

// ── Request ──────────────────────────────────────────────────────

/// A single operation as sent on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    resource: Resource,
    arguments: BTreeMap<String, Argument>,
}

impl Request {
    pub fn new(method: Method, resource: Resource) -> Self {
        Self {
            method,
            resource,
            arguments: BTreeMap::new(),
        }
    }

    /// Add a keyword argument, replacing any previous value under that key.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Argument>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn argument(&self, key: &str) -> Option<&Argument> {
        self.arguments.get(key)
    }

    pub fn arguments(&self) -> impl Iterator<Item = (&String, &Argument)> {
        self.arguments.iter()
    }

    pub fn pointers(&self) -> impl Iterator<Item = Pointer> + '_ {
        self.arguments.values().filter_map(Argument::as_pointer)
    }

    /// The argument object as sent: pointer keys suffixed, nulls dropped.
    pub fn wire_arguments(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, argument) in &self.arguments {
            match argument {
                Argument::Pointer(p) => {
                    map.insert(format!("{key}{POINTER_MARKER}"), Value::from(p.address()));
                }
                Argument::Value(Value::Null) => {}
                Argument::Value(v) => {
                    map.insert(key.clone(), v.clone());
                }
            }
        }
        map
    }

    /// Encode as one request line.
    pub fn encode(&self) -> String {
        format!(
            "{} {} {}",
            self.method,
            self.resource,
            Value::Object(self.wire_arguments())
        )
    }

    /// Parse a request line, turning `key*` integer arguments back into pointers.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.trim().splitn(3, ' ');
        let method = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GraphError::InvalidValue(format!("Malformed request: {line:?}")))?
            .parse::<Method>()?;
        let resource = parts
            .next()
            .ok_or_else(|| GraphError::InvalidValue(format!("Malformed request: {line:?}")))?
            .parse::<Resource>()?;
        let mut request = Self::new(method, resource);

        let Some(body) = parts.next().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(request);
        };
        let data: Map<String, Value> = serde_json::from_str(body)
            .map_err(|e| GraphError::InvalidValue(format!("Malformed request arguments: {e}")))?;
        for (key, value) in data {
            match key.strip_suffix(POINTER_MARKER) {
                Some(name) => {
                    let address = value.as_u64().ok_or_else(|| {
                        GraphError::InvalidValue(format!("Pointer {key} must be an integer"))
                    })?;
                    request = request.arg(name, Pointer::new(address as usize));
                }
                None => request = request.arg(key, value),
            }
        }
        Ok(request)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
