//! Shared fixtures: a graph over a scripted transport and reply builders.

#![allow(dead_code)]

use zerograph_graph::{ClientConfig, Graph, MemoryTransport};

pub fn setup() -> (MemoryTransport, Graph) {
    let transport = MemoryTransport::new();
    let config = ClientConfig {
        receive_timeout_ms: 1_000,
        ..ClientConfig::default()
    };
    let graph = Graph::with_transport(config, transport.clone());
    (transport, graph)
}

/// A reply document whose body holds the given items.
pub fn doc(items: &[&str]) -> String {
    let mut out = String::from("---\nbody:\n");
    for item in items {
        out.push_str("  - ");
        out.push_str(item);
        out.push('\n');
    }
    out
}

/// A tabular reply document.
pub fn table(columns: &[&str], rows: &[Vec<String>]) -> String {
    let columns: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let mut out = format!("---\nhead: {{\"columns\": [{}]}}\nbody:\n", columns.join(", "));
    for row in rows {
        out.push_str(&format!("  - [{}]\n", row.join(", ")));
    }
    out
}

pub fn error(code: u16, message: &str) -> String {
    format!("---\nerror: {{\"code\": {code}, \"message\": \"{message}\"}}\n")
}

/// `labels` is written as JSON array contents, e.g. `"\"Person\""`.
pub fn node(id: i64, labels: &str, properties: &str) -> String {
    format!(r#"!Node {{"id": {id}, "labels": [{labels}], "properties": {properties}}}"#)
}

pub fn rel(id: i64, rel_type: &str, properties: &str) -> String {
    format!(r#"!Rel {{"id": {id}, "type": "{rel_type}", "properties": {properties}}}"#)
}

/// A relationship walked against its direction inside a path.
pub fn rev(id: i64, rel_type: &str, properties: &str) -> String {
    format!(r#"!Rev {{"id": {id}, "type": "{rel_type}", "properties": {properties}}}"#)
}

pub fn path(elements: &[String]) -> String {
    format!("!Path [{}]", elements.join(", "))
}
