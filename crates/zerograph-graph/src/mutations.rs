//! Write operations that go straight to the remote graph.
//!
//! Each call is one exchange and returns canonical proxies for whatever the
//! server created or matched. For many writes at once use a [`Batch`] or the
//! orchestrators in [`crate::sync`].
//!
//! [`Batch`]: crate::batch::Batch

use serde_json::Value as JsonValue;

use zerograph_core::{GraphError, PropertySet, Result};

use crate::batch::{Reply, Target};
use crate::client::Graph;
use crate::entity::{Node, Segment};

impl Graph {
    // ── Nodes ────────────────────────────────────────────────────

    /// Create a node and return its bound proxy.
    pub async fn create_node<I, S>(&self, labels: I, properties: &PropertySet) -> Result<Node>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = self.batch();
        batch.create_node(labels, properties)?;
        batch.submit_one().await?.into_node()
    }

    /// The node with `label` and `key = value`, created if none exists.
    pub async fn merge_node(
        &self,
        label: &str,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Result<Node> {
        let mut batch = self.batch();
        batch.patch_node_set(label, key, value.into())?;
        batch.submit_one().await?.into_node()
    }

    /// Delete every node with `label`, optionally only those where
    /// `key = value`, along with their relationships.
    pub async fn purge(&self, label: &str, key: Option<&str>, value: Option<JsonValue>) -> Result<()> {
        let mut batch = self.batch();
        batch.delete_node_set(label, key, value)?;
        batch.submit_one().await?;
        tracing::debug!(label, "Purged node set");
        Ok(())
    }

    // ── Relationships ────────────────────────────────────────────

    /// Create a relationship between two existing nodes.
    pub async fn create_rel(
        &self,
        start: impl Into<Target>,
        end: impl Into<Target>,
        rel_type: &str,
        properties: &PropertySet,
    ) -> Result<Segment> {
        let mut batch = self.batch();
        batch.create_rel(start, end, rel_type, properties)?;
        into_segment(batch.submit_one().await?)
    }

    /// The relationship of `rel_type` from `start` to `end`, created if none
    /// exists.
    pub async fn merge_rel(
        &self,
        start: impl Into<Target>,
        end: impl Into<Target>,
        rel_type: &str,
    ) -> Result<Segment> {
        let mut batch = self.batch();
        batch.patch_rel_set(start, end, rel_type)?;
        into_segment(batch.submit_one().await?)
    }
}

fn into_segment(reply: Reply) -> Result<Segment> {
    let path = reply.into_path()?;
    Segment::try_from(path).map_err(|e| GraphError::Protocol(format!("Expected a segment: {e}")))
}
