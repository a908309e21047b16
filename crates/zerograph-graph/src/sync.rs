//! Batch orchestrators: pull, push, create and delete many entities in one
//! exchange.
//!
//! Every orchestrator validates entities as they are added, so shape and
//! binding errors surface before anything is sent. After submission each
//! result is applied independently; when some results fail, the others are
//! still applied and the first failure is returned.

use std::collections::{BTreeMap, HashSet};

use zerograph_core::{GraphError, Result};

use crate::batch::{Batch, Reply, Results};
use crate::client::Graph;
use crate::cypher::create_path_statement;
use crate::entity::binding::check_graph;
use crate::entity::{node, relationship};
use crate::entity::{Bindable, Entity, Node, Path, PropertyHolder, Relationship};
use crate::value::Value;

fn bound_to(graph: &Graph, entity: &dyn Bindable) -> Result<i64> {
    let binding = entity.binding();
    check_graph(&binding, graph, &entity.describe())?;
    binding
        .id()
        .ok_or_else(|| GraphError::NotBound(entity.describe()))
}

fn keep_first(first: &mut Option<GraphError>, result: Result<()>) {
    if let Err(e) = result {
        first.get_or_insert(e);
    }
}

fn next_reply(results: &mut Results) -> Result<Reply> {
    results.next().unwrap_or(Ok(Reply::Absent))
}

fn into_relationship(reply: Reply) -> Result<Relationship> {
    let value = reply.into_value()?;
    value
        .as_relationship()
        .ok_or_else(|| GraphError::Protocol(format!("Expected a relationship, got {value}")))
}

// ── Pull ─────────────────────────────────────────────────────────

/// Refresh many local entities from the remote graph.
///
/// Entities are grouped by remote id, so each id is fetched once and the
/// fetched state is copied to every local object that refers to it.
pub struct PullBatch {
    graph: Graph,
    nodes: BTreeMap<i64, Vec<Node>>,
    rels: BTreeMap<i64, Vec<Relationship>>,
}

impl PullBatch {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            nodes: BTreeMap::new(),
            rels: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, entity: impl Into<Entity>) -> Result<()> {
        match entity.into() {
            Entity::Node(node) => self.add_node(node),
            Entity::Relationship(rel) => self.add_relationship(rel),
            Entity::Path(path) => {
                // Validate the whole path before recording any of it.
                for node in path.nodes() {
                    bound_to(&self.graph, node)?;
                }
                for rel in path.rels() {
                    bound_to(&self.graph, rel)?;
                }
                for node in path.nodes() {
                    self.add_node(node.clone())?;
                }
                for rel in path.rels() {
                    self.add_relationship(rel.clone())?;
                }
                Ok(())
            }
        }
    }

    fn add_node(&mut self, node: Node) -> Result<()> {
        let id = bound_to(&self.graph, &node)?;
        let group = self.nodes.entry(id).or_default();
        if !group.iter().any(|n| n.ptr_eq(&node)) {
            group.push(node);
        }
        Ok(())
    }

    fn add_relationship(&mut self, rel: Relationship) -> Result<()> {
        let id = bound_to(&self.graph, &rel)?;
        let group = self.rels.entry(id).or_default();
        if !group.iter().any(|r| r.ptr_eq(&rel)) {
            group.push(rel);
        }
        Ok(())
    }

    pub async fn submit(self) -> Result<()> {
        let mut batch = Batch::new(self.graph.clone());
        for id in self.nodes.keys() {
            batch.append(node::get_request(*id))?;
        }
        for id in self.rels.keys() {
            batch.append(relationship::get_request(*id))?;
        }
        let mut results = batch.submit().await?;

        let mut first_error = None;
        for locals in self.nodes.values() {
            let applied = next_reply(&mut results).and_then(Reply::into_node).map(|remote| {
                for local in locals {
                    local.overwrite_from(&remote);
                }
            });
            keep_first(&mut first_error, applied);
        }
        for locals in self.rels.values() {
            let applied = next_reply(&mut results)
                .and_then(into_relationship)
                .map(|remote| {
                    for local in locals {
                        local.overwrite_from(&remote);
                    }
                });
            keep_first(&mut first_error, applied);
        }
        first_error.map_or(Ok(()), Err)
    }
}

// ── Push ─────────────────────────────────────────────────────────

/// Overwrite many remote entities with local state.
///
/// One SET is sent per remote id. When two different local objects target
/// the same id, the one added last wins.
pub struct PushBatch {
    graph: Graph,
    nodes: BTreeMap<i64, Node>,
    rels: BTreeMap<i64, Relationship>,
}

impl PushBatch {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            nodes: BTreeMap::new(),
            rels: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, entity: impl Into<Entity>) -> Result<()> {
        match entity.into() {
            Entity::Node(node) => self.add_node(node),
            Entity::Relationship(rel) => self.add_relationship(rel),
            Entity::Path(path) => {
                for node in path.nodes() {
                    bound_to(&self.graph, node)?;
                }
                for rel in path.rels() {
                    bound_to(&self.graph, rel)?;
                }
                for node in path.nodes() {
                    self.add_node(node.clone())?;
                }
                for rel in path.rels() {
                    self.add_relationship(rel.clone())?;
                }
                Ok(())
            }
        }
    }

    fn add_node(&mut self, node: Node) -> Result<()> {
        let id = bound_to(&self.graph, &node)?;
        if let Some(previous) = self.nodes.insert(id, node.clone()) {
            if !previous.ptr_eq(&node) {
                tracing::warn!(id, "Two local nodes push to the same remote node; last one wins");
            }
        }
        Ok(())
    }

    fn add_relationship(&mut self, rel: Relationship) -> Result<()> {
        let id = bound_to(&self.graph, &rel)?;
        if let Some(previous) = self.rels.insert(id, rel.clone()) {
            if !previous.ptr_eq(&rel) {
                tracing::warn!(
                    id,
                    "Two local relationships push to the same remote relationship; last one wins"
                );
            }
        }
        Ok(())
    }

    pub async fn submit(self) -> Result<()> {
        let mut batch = Batch::new(self.graph.clone());
        for (id, node) in &self.nodes {
            batch.append(node::set_request(*id, node))?;
        }
        for (id, rel) in &self.rels {
            batch.append(relationship::set_request(*id, rel))?;
        }
        let results = batch.submit().await?;

        let mut first_error = None;
        for result in results {
            keep_first(&mut first_error, result.map(|_| ()));
        }
        first_error.map_or(Ok(()), Err)
    }
}

// ── Create ───────────────────────────────────────────────────────

/// Create many entities, or update those that already exist.
///
/// Unbound nodes are created and bound nodes are overwritten. Paths of up
/// to one relationship are created with a single Cypher statement that
/// matches whichever parts already exist. After submission every added
/// object is bound, carries the remote state, and is the canonical proxy
/// for its id.
pub struct CreateBatch {
    graph: Graph,
    entries: Vec<Entity>,
    // Unbound nodes already claimed by an entry.
    claimed: HashSet<usize>,
}

impl CreateBatch {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            entries: Vec::new(),
            claimed: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, entity: impl Into<Entity>) -> Result<()> {
        let entity = entity.into();
        let nodes: Vec<Node> = match &entity {
            Entity::Node(node) => {
                check_graph(&node.binding(), &self.graph, node)?;
                vec![node.clone()]
            }
            Entity::Relationship(rel) => {
                let id = bound_to(&self.graph, rel).map_err(|e| match e {
                    GraphError::NotBound(what) => GraphError::UnsupportedShape(format!(
                        "{what} has no endpoints; create it as part of a segment"
                    )),
                    other => other,
                })?;
                tracing::trace!(id, "Relationship will be updated in place");
                Vec::new()
            }
            Entity::Path(path) => {
                if path.size() > 1 {
                    return Err(GraphError::UnsupportedShape(format!(
                        "Cannot create a path of {} relationships",
                        path.size()
                    )));
                }
                if let Some(graph) = path.bound_graph() {
                    if graph != self.graph {
                        return Err(GraphError::CrossGraph(format!(
                            "Path {path} is bound to a different graph"
                        )));
                    }
                }
                path.nodes().to_vec()
            }
        };

        let mut keys = HashSet::new();
        for node in nodes.iter().filter(|n| !n.is_bound()) {
            let key = node.key();
            if self.claimed.contains(&key) {
                return Err(GraphError::UnsupportedShape(format!(
                    "Unbound {} appears in more than one entry of this batch",
                    node.describe()
                )));
            }
            keys.insert(key);
        }
        self.claimed.extend(keys);
        self.entries.push(entity);
        Ok(())
    }

    pub async fn submit(self) -> Result<Vec<Entity>> {
        let mut batch = Batch::new(self.graph.clone());
        for entry in &self.entries {
            match entry {
                Entity::Node(node) => match node.bound_id() {
                    Some(id) => batch.append(node::set_request(id, node))?,
                    None => batch.create_node(node.labels(), &node.properties())?,
                },
                Entity::Relationship(rel) => {
                    let (_, id) = rel.assert_bound()?;
                    batch.append(relationship::set_request(id, rel))?
                }
                Entity::Path(path) => batch.append(create_path_statement(path)?.into_request())?,
            };
        }
        let mut results = batch.submit().await?;

        let mut first_error = None;
        for entry in &self.entries {
            let reply = next_reply(&mut results);
            let applied = reply.and_then(|reply| self.apply(entry, reply));
            keep_first(&mut first_error, applied);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(self.entries),
        }
    }

    fn apply(&self, entry: &Entity, reply: Reply) -> Result<()> {
        match entry {
            Entity::Node(local) => {
                let remote = reply.into_node()?;
                self.adopt_node(local, &remote)
            }
            Entity::Relationship(local) => {
                let remote = into_relationship(reply)?;
                self.adopt_relationship(local, &remote)
            }
            Entity::Path(path) => {
                let table = reply.into_table()?;
                let row = table.rows().first().ok_or_else(|| {
                    GraphError::Protocol(format!("Creating {path} returned no rows"))
                })?;
                self.adopt_path(path, row)
            }
        }
    }

    fn adopt_path(&self, path: &Path, row: &[Value]) -> Result<()> {
        let expected = if path.size() == 0 { 1 } else { 3 };
        if row.len() < expected {
            return Err(GraphError::Protocol(format!(
                "Creating {path} returned {} columns, expected {expected}",
                row.len()
            )));
        }
        let start = row[0]
            .as_node()
            .ok_or_else(|| GraphError::Protocol(format!("Expected a node, got {}", row[0])))?;
        self.adopt_node(path.start_node(), start)?;
        if path.size() == 1 {
            let rel = row[1].as_relationship().ok_or_else(|| {
                GraphError::Protocol(format!("Expected a relationship, got {}", row[1]))
            })?;
            self.adopt_relationship(&path.rels()[0], &rel)?;
            let end = row[2]
                .as_node()
                .ok_or_else(|| GraphError::Protocol(format!("Expected a node, got {}", row[2])))?;
            self.adopt_node(path.end_node(), end)?;
        }
        Ok(())
    }

    /// Copy the remote state into `local` and make it the canonical proxy
    /// for the remote id.
    fn adopt_node(&self, local: &Node, remote: &Node) -> Result<()> {
        let id = remote
            .bound_id()
            .ok_or_else(|| GraphError::Protocol("Created node came back without an id".into()))?;
        if let Some(local_id) = local.bound_id().filter(|&local_id| local_id != id) {
            return Err(GraphError::Protocol(format!(
                "Node {local_id} came back as node {id}"
            )));
        }
        local.overwrite_from(remote);
        local.bind(&self.graph, id);
        Ok(())
    }

    fn adopt_relationship(&self, local: &Relationship, remote: &Relationship) -> Result<()> {
        let id = remote.bound_id().ok_or_else(|| {
            GraphError::Protocol("Created relationship came back without an id".into())
        })?;
        local.overwrite_from(remote);
        local.bind(&self.graph, id);
        Ok(())
    }
}

// ── Delete ───────────────────────────────────────────────────────

/// Delete many remote entities; relationships go first so that nodes are
/// free of edges by the time they are deleted.
pub struct DeleteBatch {
    graph: Graph,
    nodes: BTreeMap<i64, Vec<Node>>,
    rels: BTreeMap<i64, Vec<Relationship>>,
}

impl DeleteBatch {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            nodes: BTreeMap::new(),
            rels: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, entity: impl Into<Entity>) -> Result<()> {
        let (nodes, rels) = match entity.into() {
            Entity::Node(node) => (vec![node], Vec::new()),
            Entity::Relationship(rel) => (Vec::new(), vec![rel]),
            Entity::Path(path) => (path.nodes().to_vec(), path.rels().to_vec()),
        };
        let node_ids = nodes
            .iter()
            .map(|n| bound_to(&self.graph, n))
            .collect::<Result<Vec<_>>>()?;
        let rel_ids = rels
            .iter()
            .map(|r| bound_to(&self.graph, r))
            .collect::<Result<Vec<_>>>()?;
        for (id, node) in node_ids.into_iter().zip(nodes) {
            self.nodes.entry(id).or_default().push(node);
        }
        for (id, rel) in rel_ids.into_iter().zip(rels) {
            self.rels.entry(id).or_default().push(rel);
        }
        Ok(())
    }

    pub async fn submit(self) -> Result<()> {
        let mut batch = Batch::new(self.graph.clone());
        for id in self.rels.keys() {
            batch.delete_rel(*id)?;
        }
        for id in self.nodes.keys() {
            batch.delete_node(*id)?;
        }
        let mut results = batch.submit().await?;

        let mut first_error = None;
        for locals in self.rels.values() {
            let deleted = next_reply(&mut results).map(|_| locals.iter().for_each(Relationship::unbind));
            keep_first(&mut first_error, deleted);
        }
        for locals in self.nodes.values() {
            let deleted = next_reply(&mut results).map(|_| locals.iter().for_each(Node::unbind));
            keep_first(&mut first_error, deleted);
        }
        first_error.map_or(Ok(()), Err)
    }
}

// ── Graph Conveniences ───────────────────────────────────────────

impl Graph {
    /// Refresh the given entities from the remote graph in one exchange.
    pub async fn pull<I, E>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entity>,
    {
        let mut batch = PullBatch::new(self.clone());
        for entity in entities {
            batch.add(entity)?;
        }
        batch.submit().await
    }

    /// Overwrite the remote state of the given entities in one exchange.
    pub async fn push<I, E>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entity>,
    {
        let mut batch = PushBatch::new(self.clone());
        for entity in entities {
            batch.add(entity)?;
        }
        batch.submit().await
    }

    /// Create (or update) the given entities in one exchange and return them,
    /// now bound.
    pub async fn create<I, E>(&self, entities: I) -> Result<Vec<Entity>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entity>,
    {
        let mut batch = CreateBatch::new(self.clone());
        for entity in entities {
            batch.add(entity)?;
        }
        batch.submit().await
    }

    /// Delete the given entities in one exchange and unbind them.
    pub async fn delete<I, E>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entity>,
    {
        let mut batch = DeleteBatch::new(self.clone());
        for entity in entities {
            batch.add(entity)?;
        }
        batch.submit().await
    }
}
