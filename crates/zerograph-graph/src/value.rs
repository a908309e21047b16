//! Hydrated reply values and tabular results.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value as JsonValue};

use zerograph_core::{Pointer, PropertySet};

use crate::entity::{Bindable, Node, Path, PropertyHolder, Relationship};

/// Address of a graph service, as returned by Graph resource requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for GraphAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// One value from a reply body, with tagged entities turned into proxies.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
    Graph(GraphAddress),
    Pointer(Pointer),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    /// The relationship this value denotes: a bare relationship, or the
    /// single relationship of a one-hop path.
    pub fn as_relationship(&self) -> Option<Relationship> {
        match self {
            Self::Relationship(rel) => Some(rel.clone()),
            Self::Path(path) if path.size() == 1 => path.rel(),
            _ => None,
        }
    }

    /// Plain JSON rendering; entities become objects with their id, if bound.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::from(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(x) => JsonValue::from(*x),
            Self::String(s) => JsonValue::from(s.as_str()),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Node(node) => node_json(node),
            Self::Relationship(rel) => rel_json(rel, rel.is_reverse()),
            Self::Path(path) => json!({
                "nodes": path.nodes().iter().map(node_json).collect::<Vec<_>>(),
                "rels": path
                    .rels()
                    .iter()
                    .enumerate()
                    .map(|(i, rel)| rel_json(rel, path.is_reversed(i)))
                    .collect::<Vec<_>>(),
            }),
            Self::Graph(address) => json!({"host": address.host, "port": address.port}),
            Self::Pointer(p) => json!({"pointer": p.address()}),
        }
    }
}

fn node_json(node: &Node) -> JsonValue {
    json!({
        "id": node.bound_id(),
        "labels": node.labels(),
        "properties": node.properties(),
    })
}

fn rel_json(rel: &Relationship, reverse: bool) -> JsonValue {
    json!({
        "id": rel.bound_id(),
        "type": rel.rel_type(),
        "properties": rel.properties(),
        "reverse": reverse,
    })
}

impl From<PropertySet> for Value {
    fn from(properties: PropertySet) -> Self {
        Self::Map(
            properties
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        )
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Scalars print bare; entities print in Cypher notation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Node(node) => node.fmt(f),
            Self::Relationship(rel) => rel.fmt(f),
            Self::Path(path) => path.fmt(f),
            Self::Graph(address) => address.fmt(f),
            Self::Pointer(p) => p.fmt(f),
        }
    }
}

// ── Table ────────────────────────────────────────────────────────

/// Columns and rows of a Cypher result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The value in `row` under column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let column = self.column_index(name)?;
        self.rows.get(row)?.get(column)
    }
}

/// Aligned text table followed by a row count.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
                .collect();
            format!(" {} ", padded.join(" | "))
        };

        writeln!(f, "{}", line(&self.columns))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "-{}-", rule.join("-+-"))?;
        for row in &rendered {
            writeln!(f, "{}", line(row))?;
        }
        match self.rows.len() {
            1 => writeln!(f, "(1 row)"),
            n => writeln!(f, "({n} rows)"),
        }
    }
}
