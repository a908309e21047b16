//! Read operations: single entities, node sets and Cypher queries.

use serde_json::{Map, Value as JsonValue};

use zerograph_core::{GraphError, Result};

use crate::batch::Reply;
use crate::client::Graph;
use crate::entity::{Node, Segment};
use crate::value::{Table, Value};

impl Graph {
    // ── Single Entity Lookups ────────────────────────────────────

    /// Fetch node `id`. The returned proxy is the canonical one for that id,
    /// refreshed with the fetched state.
    pub async fn node(&self, id: i64) -> Result<Node> {
        let mut batch = self.batch();
        batch.get_node(id)?;
        batch.submit_one().await?.into_node()
    }

    /// Fetch relationship `id` together with its endpoints.
    pub async fn segment(&self, rel_id: i64) -> Result<Segment> {
        let mut batch = self.batch();
        batch.get_rel(rel_id)?;
        let path = batch.submit_one().await?.into_path()?;
        Segment::try_from(path)
            .map_err(|e| GraphError::Protocol(format!("Relationship {rel_id}: {e}")))
    }

    /// Server name and version information.
    pub async fn info(&self) -> Result<Value> {
        let mut batch = self.batch();
        batch.get_zerograph()?;
        batch.submit_one().await?.into_value()
    }

    // ── Node Sets ────────────────────────────────────────────────

    /// Nodes carrying `label`, optionally only those where `key = value`.
    pub async fn find(
        &self,
        label: &str,
        key: Option<&str>,
        value: Option<JsonValue>,
    ) -> Result<Vec<Node>> {
        let mut batch = self.batch();
        batch.get_node_set(label, key, value)?;
        batch.submit_one().await?.into_nodes()
    }

    // ── Cypher ───────────────────────────────────────────────────

    /// Run one Cypher query.
    pub async fn execute(
        &self,
        query: &str,
        params: Option<Map<String, JsonValue>>,
    ) -> Result<Table> {
        let mut batch = self.batch();
        batch.execute(query, params)?;
        batch.submit_one().await?.into_table()
    }

    /// Run `query` once per parameter set, all in one exchange.
    ///
    /// Every result is returned; a failing parameter set does not affect the
    /// others.
    pub async fn execute_many<I>(&self, query: &str, param_sets: I) -> Result<Vec<Result<Table>>>
    where
        I: IntoIterator<Item = Map<String, JsonValue>>,
    {
        let mut batch = self.batch();
        batch.execute_many(query, param_sets)?;
        let results = batch.submit().await?;
        Ok(results
            .map(|result| result.and_then(Reply::into_table))
            .collect())
    }
}
