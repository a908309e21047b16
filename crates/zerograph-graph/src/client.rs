//! Graph handle: one connection to a Zerograph service plus its identity caches.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use zerograph_core::config::DEFAULT_PORT;
use zerograph_core::{ClientConfig, GraphError, Method, Request, Resource, Result};

use crate::batch::{Batch, Reply};
use crate::cache::IdentityCache;
use crate::entity::node::NodeState;
use crate::entity::relationship::RelState;
use crate::entity::{Node, Relationship};
use crate::transport::{Transport, ZmqTransport};
use crate::value::Value;

/// Handle on a remote graph service.
///
/// Clone is cheap and shares the connection and the identity caches. Two
/// handles are equal only when they are clones of one another.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

struct GraphInner {
    config: ClientConfig,
    transport: tokio::sync::Mutex<Box<dyn Transport>>,
    // Set after a timeout or transport failure; cleared by `reopen`.
    unusable: AtomicBool,
    nodes: Mutex<IdentityCache<NodeState>>,
    rels: Mutex<IdentityCache<RelState>>,
}

impl Graph {
    /// Connect to the service described by `config` over ZeroMQ.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = ZmqTransport::connect(config).await?;
        tracing::info!(endpoint = %config.endpoint(), "Connected to Zerograph");
        Ok(Self::with_transport(config.clone(), transport))
    }

    /// Build a handle over an already established transport.
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                config,
                transport: tokio::sync::Mutex::new(Box::new(transport)),
                unusable: AtomicBool::new(false),
                nodes: Mutex::new(IdentityCache::default()),
                rels: Mutex::new(IdentityCache::default()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Whether a previous timeout or transport failure left the connection unusable.
    pub fn is_unusable(&self) -> bool {
        self.inner.unusable.load(Ordering::Acquire)
    }

    /// Start a new batch against this graph.
    pub fn batch(&self) -> Batch {
        Batch::new(self.clone())
    }

    /// Send a single request and wait for its reply.
    pub async fn request(&self, request: Request) -> Result<Reply> {
        let mut batch = self.batch();
        batch.append(request)?;
        batch.submit_one().await
    }

    /// Drop the current connection and establish a fresh one.
    pub async fn reopen(&self) -> Result<()> {
        let mut transport = self.inner.transport.lock().await;
        transport.reconnect().await?;
        self.inner.unusable.store(false, Ordering::Release);
        tracing::info!(endpoint = %transport.endpoint(), "Reopened Zerograph connection");
        Ok(())
    }

    // ── Service Management ───────────────────────────────────────

    /// Start (creating if needed) the graph database served on `port` by this
    /// Zerograph service and connect to it.
    ///
    /// The root service port is never started through the service; opening
    /// it returns this handle or connects to it directly.
    pub async fn open(&self, port: u16) -> Result<Graph> {
        if port == self.port() {
            return Ok(self.clone());
        }
        if port == DEFAULT_PORT {
            let mut config = self.inner.config.clone();
            config.port = port;
            return Graph::connect(&config).await;
        }
        let request = Request::new(Method::Patch, Resource::Graph)
            .arg("host", self.host())
            .arg("port", port);
        match self.request(request).await?.into_value()? {
            Value::Graph(address) => {
                let mut config = self.inner.config.clone();
                config.host = address.host;
                config.port = address.port;
                Graph::connect(&config).await
            }
            other => Err(GraphError::Protocol(format!(
                "Expected a graph address, got {other}"
            ))),
        }
    }

    /// Stop the graph database served on `port` and destroy its store.
    pub async fn drop_graph(&self, port: u16) -> Result<()> {
        if port == self.port() {
            return Err(GraphError::InvalidValue(
                "Cannot drop the graph this handle is connected to".into(),
            ));
        }
        if port == DEFAULT_PORT {
            return Err(GraphError::InvalidValue(
                "Cannot drop the root Zerograph service".into(),
            ));
        }
        let request = Request::new(Method::Delete, Resource::Graph)
            .arg("host", self.host())
            .arg("port", port);
        self.request(request).await?;
        tracing::info!(host = %self.host(), port, "Dropped graph");
        Ok(())
    }

    // ── Exchange ─────────────────────────────────────────────────

    /// Send one pipelined message and return the reassembled reply payload.
    ///
    /// The connection stays locked from the first frame sent until the last
    /// frame received, so exchanges never interleave.
    pub(crate) async fn exchange(&self, lines: &[String]) -> Result<String> {
        if self.is_unusable() {
            return Err(GraphError::Connection(
                "Connection is unusable after an earlier failure; reopen it first".into(),
            ));
        }

        let mut transport = self.inner.transport.lock().await;
        let result = self.round_trip(transport.as_mut(), lines).await;
        if let Err(e) = &result {
            if e.is_fatal() {
                self.inner.unusable.store(true, Ordering::Release);
                tracing::warn!(error = %e, "Exchange failed; connection marked unusable");
            }
        }
        result
    }

    async fn round_trip(&self, transport: &mut dyn Transport, lines: &[String]) -> Result<String> {
        for line in lines {
            tracing::debug!(">>> {line}");
            transport.send(Bytes::from(line.clone()), true).await?;
        }
        transport.send(Bytes::new(), false).await?;

        let timeout = self.inner.config.receive_timeout();
        let endpoint = transport.endpoint();
        let mut payload = Vec::new();
        loop {
            let frame = tokio::time::timeout(timeout, transport.recv())
                .await
                .map_err(|_| {
                    GraphError::Timeout(format!(
                        "No reply from {endpoint} within {} ms",
                        timeout.as_millis()
                    ))
                })??;
            tracing::debug!("<<< {}", String::from_utf8_lossy(&frame.data));
            payload.extend_from_slice(&frame.data);
            if !frame.more {
                break;
            }
        }

        String::from_utf8(payload)
            .map_err(|e| GraphError::Protocol(format!("Reply is not valid UTF-8: {e}")))
    }

    // ── Identity Cache ───────────────────────────────────────────

    /// The canonical proxy for node `id`, created or refreshed from the given
    /// remote state.
    pub(crate) fn hydrate_node(
        &self,
        id: i64,
        labels: std::collections::BTreeSet<String>,
        properties: zerograph_core::PropertySet,
    ) -> Node {
        let mut cache = self.inner.nodes.lock();
        if let Some(state) = cache.get(id) {
            let node = Node::from_state(state);
            node.overwrite(labels, properties);
            return node;
        }
        let node = Node::bound(labels, properties, self.clone(), id);
        cache.insert(id, node.state());
        node
    }

    pub(crate) fn hydrate_relationship(
        &self,
        id: i64,
        rel_type: String,
        properties: zerograph_core::PropertySet,
    ) -> Relationship {
        let mut cache = self.inner.rels.lock();
        if let Some(state) = cache.get(id) {
            let rel = Relationship::from_state(state);
            rel.overwrite(rel_type, properties);
            return rel;
        }
        let rel = Relationship::bound(rel_type, properties, self.clone(), id);
        cache.insert(id, rel.state());
        rel
    }

    pub(crate) fn adopt_node(&self, id: i64, node: &Node) {
        self.inner.nodes.lock().insert(id, node.state());
    }

    pub(crate) fn forget_node(&self, id: i64, node: &Node) {
        self.inner.nodes.lock().release_if_same(id, node.state());
    }

    pub(crate) fn adopt_relationship(&self, id: i64, rel: &Relationship) {
        self.inner.rels.lock().insert(id, rel.state());
    }

    pub(crate) fn forget_relationship(&self, id: i64, rel: &Relationship) {
        self.inner.rels.lock().release_if_same(id, rel.state());
    }

    /// The canonical proxy currently cached for node `id`, if any.
    pub fn cached_node(&self, id: i64) -> Option<Node> {
        self.inner.nodes.lock().get(id).map(Node::from_state)
    }

    /// The canonical proxy currently cached for relationship `id`, if any.
    pub fn cached_relationship(&self, id: i64) -> Option<Relationship> {
        self.inner.rels.lock().get(id).map(Relationship::from_state)
    }

    /// Evict node `id` from the identity cache. The proxy itself stays bound.
    pub fn release_node(&self, id: i64) -> bool {
        self.inner.nodes.lock().release(id)
    }

    /// Evict relationship `id` from the identity cache.
    pub fn release_relationship(&self, id: i64) -> bool {
        self.inner.rels.lock().release(id)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Graph {}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("host", &self.host())
            .field("port", &self.port())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::MemoryTransport;

    fn graph_with(transport: &MemoryTransport, receive_timeout_ms: u64) -> Graph {
        let config = ClientConfig {
            receive_timeout_ms,
            ..ClientConfig::default()
        };
        Graph::with_transport(config, transport.clone())
    }

    #[tokio::test]
    async fn exchange_frames_and_reassembly() {
        let transport = MemoryTransport::new();
        transport.push_reply(["---\nbody:\n", "  - 1\n"]);
        let graph = graph_with(&transport, 1_000);

        let payload = graph
            .exchange(&["GET Node {\"id\":1}".to_string()])
            .await
            .unwrap();
        assert_eq!(payload, "---\nbody:\n  - 1\n");

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1);
        assert!(sent[1].0.is_empty());
        assert!(!sent[1].1);
    }

    #[tokio::test]
    async fn timeout_marks_connection_unusable() {
        let transport = MemoryTransport::new();
        let graph = graph_with(&transport, 20);

        let err = graph.exchange(&["GET Zerograph {}".to_string()]).await.unwrap_err();
        assert!(matches!(err, GraphError::Timeout(_)));
        assert!(graph.is_unusable());

        transport.clear_sent();
        let err = graph.exchange(&["GET Zerograph {}".to_string()]).await.unwrap_err();
        assert!(matches!(err, GraphError::Connection(_)));
        assert!(transport.sent().is_empty());

        graph.reopen().await.unwrap();
        assert!(!graph.is_unusable());
        assert_eq!(transport.reconnects(), 1);
        transport.push_payload("---\nbody:\n  - 1\n");
        tokio::time::timeout(Duration::from_secs(1), graph.exchange(&[]))
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn handles_compare_by_identity() {
        let transport = MemoryTransport::new();
        let a = graph_with(&transport, 1_000);
        let b = graph_with(&transport, 1_000);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn cannot_drop_own_graph() {
        let transport = MemoryTransport::new();
        let graph = graph_with(&transport, 1_000);
        let err = graph.drop_graph(graph.port()).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidValue(_)));

        let config = ClientConfig {
            port: 47471,
            ..ClientConfig::default()
        };
        let child = Graph::with_transport(config, transport.clone());
        let err = child.drop_graph(DEFAULT_PORT).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidValue(_)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn opening_own_port_returns_same_handle() {
        let transport = MemoryTransport::new();
        let graph = graph_with(&transport, 1_000);
        assert_eq!(graph.port(), DEFAULT_PORT);

        let opened = graph.open(DEFAULT_PORT).await.unwrap();
        assert_eq!(opened, graph);
        assert!(transport.sent().is_empty());
    }
}
