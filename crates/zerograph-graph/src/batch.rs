//! Pipelined batches of requests.
//!
//! Each appended request becomes one frame of a single multi-part message
//! and yields a [`Pointer`] to its eventual result. Later requests in the
//! same pipeline may pass that pointer wherever an entity id is expected;
//! the server substitutes the entity produced at that position.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value as JsonValue};

use zerograph_core::reply::{self, Document};
use zerograph_core::{
    Argument, GraphError, Method, PipelineId, Pointer, PropertySet, Request, Resource, Result,
};

use crate::client::Graph;
use crate::entity::binding::check_graph;
use crate::entity::{Bindable, Binding, Node, Path, Relationship, Segment};
use crate::hydrate::hydrate;
use crate::value::{Table, Value};

static NEXT_PIPELINE: AtomicU64 = AtomicU64::new(1);

fn next_pipeline() -> PipelineId {
    NEXT_PIPELINE.fetch_add(1, Ordering::Relaxed)
}

// ── Targets ──────────────────────────────────────────────────────

/// Something that identifies a remote node or relationship in a request.
#[derive(Debug, Clone)]
pub enum Target {
    Id(i64),
    Pointer(Pointer),
    Entity { binding: Binding, description: String },
}

impl Target {
    fn resolve(self, graph: &Graph) -> Result<Argument> {
        match self {
            Self::Id(id) => Ok(Argument::from(id)),
            Self::Pointer(p) => Ok(Argument::from(p)),
            Self::Entity {
                binding,
                description,
            } => {
                check_graph(&binding, graph, &description)?;
                binding
                    .id()
                    .map(Argument::from)
                    .ok_or(GraphError::NotBound(description))
            }
        }
    }
}

impl From<i64> for Target {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<Pointer> for Target {
    fn from(p: Pointer) -> Self {
        Self::Pointer(p)
    }
}

impl From<&Node> for Target {
    fn from(node: &Node) -> Self {
        Self::Entity {
            binding: node.binding(),
            description: node.describe(),
        }
    }
}

impl From<&Relationship> for Target {
    fn from(rel: &Relationship) -> Self {
        Self::Entity {
            binding: rel.binding(),
            description: rel.describe(),
        }
    }
}

impl From<&Segment> for Target {
    fn from(segment: &Segment) -> Self {
        Self::from(segment.relationship())
    }
}

fn labels_argument<I, S>(labels: I) -> Argument
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Argument::from(labels.into_iter().map(Into::into).collect::<BTreeSet<String>>())
}

// ── Batch ────────────────────────────────────────────────────────

/// An ordered set of requests sent to one graph as a single exchange.
///
/// A batch is reusable: `submit` consumes the pending requests and starts a
/// new pipeline, after which pointers issued earlier are no longer valid.
#[derive(Debug)]
pub struct Batch {
    graph: Graph,
    pipeline: PipelineId,
    lines: Vec<String>,
}

impl Batch {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            pipeline: next_pipeline(),
            lines: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Number of requests appended to the current pipeline.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append a request and return a pointer to its result.
    ///
    /// Every pointer argument must address an earlier request of this
    /// pipeline.
    pub fn append(&mut self, request: Request) -> Result<Pointer> {
        for pointer in request.pointers() {
            if pointer.pipeline().is_some_and(|p| p != self.pipeline) {
                return Err(GraphError::InvalidValue(format!(
                    "{pointer} was issued by another pipeline"
                )));
            }
            if pointer.address() >= self.lines.len() {
                return Err(GraphError::InvalidValue(format!(
                    "{pointer} does not address an earlier request (pipeline has {})",
                    self.lines.len()
                )));
            }
        }
        let pointer = Pointer::issued(self.lines.len(), self.pipeline);
        self.lines.push(request.encode());
        Ok(pointer)
    }

    /// Send the pipeline and collect one result per appended request.
    ///
    /// The whole reply is received before this returns; values are hydrated
    /// one at a time as the returned [`Results`] is consumed.
    pub async fn submit(&mut self) -> Result<Results> {
        let lines = std::mem::take(&mut self.lines);
        self.pipeline = next_pipeline();
        if lines.is_empty() {
            return Ok(Results::new(self.graph.clone(), 0, Vec::new()));
        }
        let payload = self.graph.exchange(&lines).await?;
        let documents = reply::decode_stream(&payload)?;
        Ok(Results::new(self.graph.clone(), lines.len(), documents))
    }

    /// Submit and return the reply to the first request.
    pub(crate) async fn submit_one(mut self) -> Result<Reply> {
        let mut results = self.submit().await?;
        results.next().unwrap_or(Ok(Reply::Absent))
    }

    // ── Cypher ───────────────────────────────────────────────────

    pub fn execute(&mut self, query: &str, params: Option<Map<String, JsonValue>>) -> Result<Pointer> {
        self.append(
            Request::new(Method::Execute, Resource::Cypher)
                .arg("query", query)
                .arg("params", params),
        )
    }

    /// Run `query` once per parameter set.
    pub fn execute_many<I>(&mut self, query: &str, param_sets: I) -> Result<Vec<Pointer>>
    where
        I: IntoIterator<Item = Map<String, JsonValue>>,
    {
        param_sets
            .into_iter()
            .map(|params| self.execute(query, Some(params)))
            .collect()
    }

    // ── Graph ────────────────────────────────────────────────────

    fn graph_request(&mut self, method: Method, host: &str, port: u16) -> Result<Pointer> {
        self.append(
            Request::new(method, Resource::Graph)
                .arg("host", host)
                .arg("port", port),
        )
    }

    pub fn get_graph(&mut self, host: &str, port: u16) -> Result<Pointer> {
        self.graph_request(Method::Get, host, port)
    }

    pub fn patch_graph(&mut self, host: &str, port: u16) -> Result<Pointer> {
        self.graph_request(Method::Patch, host, port)
    }

    pub fn delete_graph(&mut self, host: &str, port: u16) -> Result<Pointer> {
        self.graph_request(Method::Delete, host, port)
    }

    // ── Node ─────────────────────────────────────────────────────

    pub fn get_node(&mut self, node: impl Into<Target>) -> Result<Pointer> {
        let id = node.into().resolve(&self.graph)?;
        self.append(Request::new(Method::Get, Resource::Node).arg("id", id))
    }

    /// Replace the labels and properties of a node.
    pub fn set_node<I, S>(
        &mut self,
        node: impl Into<Target>,
        labels: I,
        properties: &PropertySet,
    ) -> Result<Pointer>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = node.into().resolve(&self.graph)?;
        self.append(
            Request::new(Method::Set, Resource::Node)
                .arg("id", id)
                .arg("labels", labels_argument(labels))
                .arg("properties", properties),
        )
    }

    /// Add labels and properties to a node, keeping existing ones.
    pub fn patch_node<I, S>(
        &mut self,
        node: impl Into<Target>,
        labels: I,
        properties: &PropertySet,
    ) -> Result<Pointer>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = node.into().resolve(&self.graph)?;
        self.append(
            Request::new(Method::Patch, Resource::Node)
                .arg("id", id)
                .arg("labels", labels_argument(labels))
                .arg("properties", properties),
        )
    }

    pub fn create_node<I, S>(&mut self, labels: I, properties: &PropertySet) -> Result<Pointer>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(
            Request::new(Method::Create, Resource::Node)
                .arg("labels", labels_argument(labels))
                .arg("properties", properties),
        )
    }

    pub fn delete_node(&mut self, node: impl Into<Target>) -> Result<Pointer> {
        let id = node.into().resolve(&self.graph)?;
        self.append(Request::new(Method::Delete, Resource::Node).arg("id", id))
    }

    // ── NodeSet ──────────────────────────────────────────────────

    /// Nodes with `label`, optionally restricted to `key = value`.
    pub fn get_node_set(
        &mut self,
        label: &str,
        key: Option<&str>,
        value: Option<JsonValue>,
    ) -> Result<Pointer> {
        self.append(node_set_request(Method::Get, label, key, value))
    }

    /// Merge a node with `label` and `key = value`.
    pub fn patch_node_set(&mut self, label: &str, key: &str, value: JsonValue) -> Result<Pointer> {
        self.append(node_set_request(Method::Patch, label, Some(key), Some(value)))
    }

    pub fn delete_node_set(
        &mut self,
        label: &str,
        key: Option<&str>,
        value: Option<JsonValue>,
    ) -> Result<Pointer> {
        self.append(node_set_request(Method::Delete, label, key, value))
    }

    // ── Rel ──────────────────────────────────────────────────────

    pub fn get_rel(&mut self, rel: impl Into<Target>) -> Result<Pointer> {
        let id = rel.into().resolve(&self.graph)?;
        self.append(Request::new(Method::Get, Resource::Rel).arg("id", id))
    }

    pub fn set_rel(&mut self, rel: impl Into<Target>, properties: &PropertySet) -> Result<Pointer> {
        let id = rel.into().resolve(&self.graph)?;
        self.append(
            Request::new(Method::Set, Resource::Rel)
                .arg("id", id)
                .arg("properties", properties),
        )
    }

    pub fn patch_rel(&mut self, rel: impl Into<Target>, properties: &PropertySet) -> Result<Pointer> {
        let id = rel.into().resolve(&self.graph)?;
        self.append(
            Request::new(Method::Patch, Resource::Rel)
                .arg("id", id)
                .arg("properties", properties),
        )
    }

    pub fn create_rel(
        &mut self,
        start: impl Into<Target>,
        end: impl Into<Target>,
        rel_type: &str,
        properties: &PropertySet,
    ) -> Result<Pointer> {
        let start = start.into().resolve(&self.graph)?;
        let end = end.into().resolve(&self.graph)?;
        self.append(
            Request::new(Method::Create, Resource::Rel)
                .arg("start", start)
                .arg("end", end)
                .arg("type", rel_type)
                .arg("properties", properties),
        )
    }

    pub fn delete_rel(&mut self, rel: impl Into<Target>) -> Result<Pointer> {
        let id = rel.into().resolve(&self.graph)?;
        self.append(Request::new(Method::Delete, Resource::Rel).arg("id", id))
    }

    // ── RelSet ───────────────────────────────────────────────────

    fn rel_set_request(
        &self,
        method: Method,
        start: Option<Target>,
        end: Option<Target>,
        rel_type: Option<&str>,
    ) -> Result<Request> {
        if start.is_none() && end.is_none() {
            return Err(GraphError::InvalidValue(
                "Either start or end node must be specified".into(),
            ));
        }
        let start = start.map(|t| t.resolve(&self.graph)).transpose()?;
        let end = end.map(|t| t.resolve(&self.graph)).transpose()?;
        Ok(Request::new(method, Resource::RelSet)
            .arg("start", start)
            .arg("end", end)
            .arg("type", rel_type))
    }

    /// Relationships touching `start` and/or `end`, optionally of one type.
    pub fn get_rel_set(
        &mut self,
        start: Option<Target>,
        end: Option<Target>,
        rel_type: Option<&str>,
    ) -> Result<Pointer> {
        let request = self.rel_set_request(Method::Get, start, end, rel_type)?;
        self.append(request)
    }

    /// Merge a relationship of `rel_type` between `start` and `end`.
    pub fn patch_rel_set(
        &mut self,
        start: impl Into<Target>,
        end: impl Into<Target>,
        rel_type: &str,
    ) -> Result<Pointer> {
        let request = self.rel_set_request(
            Method::Patch,
            Some(start.into()),
            Some(end.into()),
            Some(rel_type),
        )?;
        self.append(request)
    }

    pub fn delete_rel_set(
        &mut self,
        start: Option<Target>,
        end: Option<Target>,
        rel_type: Option<&str>,
    ) -> Result<Pointer> {
        let request = self.rel_set_request(Method::Delete, start, end, rel_type)?;
        self.append(request)
    }

    // ── Zerograph ────────────────────────────────────────────────

    pub fn get_zerograph(&mut self) -> Result<Pointer> {
        self.append(Request::new(Method::Get, Resource::Zerograph))
    }
}

fn node_set_request(
    method: Method,
    label: &str,
    key: Option<&str>,
    value: Option<JsonValue>,
) -> Request {
    let request = Request::new(method, Resource::NodeSet).arg("label", label);
    match key {
        Some(key) => request.arg("key", key).arg("value", value),
        None => request,
    }
}

// ── Results ──────────────────────────────────────────────────────

/// The result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The server sent no document for this request.
    Absent,
    Response(Response),
}

/// A hydrated reply document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub head: Option<Value>,
    pub body: Vec<Value>,
    pub foot: Option<Value>,
}

impl Response {
    /// Column names from the head, if this is a tabular result.
    pub fn columns(&self) -> Option<Vec<String>> {
        let Some(Value::Map(head)) = &self.head else {
            return None;
        };
        match head.get("columns") {
            Some(Value::List(columns)) => Some(columns.iter().map(ToString::to_string).collect()),
            _ => None,
        }
    }

    /// The body as a single value: the only item, `Null` when empty, or a
    /// list when there are several.
    pub fn into_value(self) -> Value {
        let mut body = self.body;
        match body.len() {
            0 => Value::Null,
            1 => body.remove(0),
            _ => Value::List(body),
        }
    }

    /// The body as rows under the head's columns.
    pub fn into_table(self) -> Table {
        let columns = self.columns().unwrap_or_default();
        let rows = self
            .body
            .into_iter()
            .map(|item| match item {
                Value::List(row) => row,
                other => vec![other],
            })
            .collect();
        Table::new(columns, rows)
    }
}

impl Reply {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_response(self) -> Result<Response> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Absent => Err(GraphError::Protocol("No reply document was received".into())),
        }
    }

    pub fn into_value(self) -> Result<Value> {
        self.into_response().map(Response::into_value)
    }

    pub fn into_table(self) -> Result<Table> {
        self.into_response().map(Response::into_table)
    }

    pub fn into_node(self) -> Result<Node> {
        match self.into_value()? {
            Value::Node(node) => Ok(node),
            other => Err(GraphError::Protocol(format!("Expected a node, got {other}"))),
        }
    }

    pub fn into_path(self) -> Result<Path> {
        match self.into_value()? {
            Value::Path(path) => Ok(path),
            other => Err(GraphError::Protocol(format!("Expected a path, got {other}"))),
        }
    }

    /// Every body item that is a node.
    pub fn into_nodes(self) -> Result<Vec<Node>> {
        self.into_response()?
            .body
            .into_iter()
            .map(|item| match item {
                Value::Node(node) => Ok(node),
                other => Err(GraphError::Protocol(format!("Expected a node, got {other}"))),
            })
            .collect()
    }
}

/// One result per submitted request, in submission order.
///
/// Missing trailing documents yield [`Reply::Absent`]; a document carrying an
/// error yields that error for its own slot only. Each value is hydrated when
/// its slot is consumed.
pub struct Results {
    graph: Graph,
    documents: VecDeque<Result<Document>>,
    remaining: usize,
}

impl Results {
    fn new(graph: Graph, expected: usize, documents: Vec<Result<Document>>) -> Self {
        let mut documents: VecDeque<_> = documents.into();
        if documents.len() > expected {
            tracing::warn!(
                expected,
                received = documents.len(),
                "Discarding surplus reply documents"
            );
            documents.truncate(expected);
        } else if documents.len() < expected {
            tracing::debug!(
                expected,
                received = documents.len(),
                "Padding missing reply documents"
            );
        }
        Self {
            graph,
            documents,
            remaining: expected,
        }
    }

    fn hydrate_document(&self, document: Document) -> Result<Reply> {
        let items = document.body_items();
        let head = document
            .head
            .map(|raw| hydrate(&self.graph, raw))
            .transpose()?;
        let foot = document
            .foot
            .map(|raw| hydrate(&self.graph, raw))
            .transpose()?;
        let body = items
            .into_iter()
            .map(|raw| hydrate(&self.graph, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Reply::Response(Response { head, body, foot }))
    }
}

impl Iterator for Results {
    type Item = Result<Reply>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(match self.documents.pop_front() {
            None => Ok(Reply::Absent),
            Some(Err(e)) => Err(e),
            Some(Ok(document)) => self.hydrate_document(document),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Results {}
