//! Transfer records and the directed transfer graph built from them.

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single observed token transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Token identifier
    pub token_id: String,
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Gas price paid
    pub gas_price: f64,
    /// Gas consumed
    pub gas_used: f64,
    /// Block the transfer was mined in
    pub block_number: u64,
    /// Token contract
    #[serde(default)]
    pub contract_address: String,
    /// Token metadata URI
    #[serde(default)]
    pub token_uri: String,
    /// Transaction hash
    #[serde(default)]
    pub transaction_hash: String,
}

impl TransferRecord {
    /// Create a record with zeroed attributes, mostly useful for tests.
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            token_id: String::new(),
            from: from.to_string(),
            to: to.to_string(),
            gas_price: 0.0,
            gas_used: 0.0,
            block_number: 0,
            contract_address: String::new(),
            token_uri: String::new(),
            transaction_hash: String::new(),
        }
    }

    /// Set gas attributes.
    pub fn with_gas(mut self, gas_price: f64, gas_used: f64) -> Self {
        self.gas_price = gas_price;
        self.gas_used = gas_used;
        self
    }

    /// Set block number.
    pub fn with_block(mut self, block_number: u64) -> Self {
        self.block_number = block_number;
        self
    }

    /// Set contract address.
    pub fn with_contract(mut self, contract_address: &str) -> Self {
        self.contract_address = contract_address.to_string();
        self
    }

    /// Set token id and URI.
    pub fn with_token(mut self, token_id: &str, token_uri: &str) -> Self {
        self.token_id = token_id.to_string();
        self.token_uri = token_uri.to_string();
        self
    }
}

/// Directed transfer graph.
///
/// Keeps the raw edge table (a multigraph: one row per transfer) next to
/// the collapsed simple directed graph used for centrality and features.
/// Node order is the order in which addresses were first added.
#[derive(Clone, Debug, Default)]
pub struct TransferGraph {
    records: Vec<TransferRecord>,
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl TransferGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an edge table.
    pub fn from_records(records: Vec<TransferRecord>) -> Self {
        let mut graph = Self::new();
        for record in &records {
            graph.add_edge(&record.from, &record.to);
        }
        graph.records = records;
        graph
    }

    /// Build a connectivity-only graph: all `nodes` first, then `edges`.
    pub fn from_edges<S: AsRef<str>>(nodes: &[S], edges: &[(String, String)]) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node.as_ref());
        }
        for (from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    /// Add a node if absent and return its index.
    pub fn add_node(&mut self, label: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(label) {
            return *idx;
        }
        let idx = self.graph.add_node(label.to_string());
        self.index.insert(label.to_string(), idx);
        idx
    }

    /// Add a directed edge; parallel edges collapse into one.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let a = self.add_node(from);
        let b = self.add_node(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Number of distinct addresses.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct ordered (from, to) pairs.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Node labels in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_indices().map(move |i| self.graph[i].as_str())
    }

    /// Whether the address is part of the graph.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// The raw edge table.
    pub fn records(&self) -> &[TransferRecord] {
        &self.records
    }

    /// The collapsed simple directed graph.
    pub fn digraph(&self) -> &DiGraph<String, ()> {
        &self.graph
    }

    /// Most recent transfer sent by `address`, or received when it never sent.
    ///
    /// Ties on block number keep the earliest row.
    pub fn latest_transfer(&self, address: &str) -> Option<&TransferRecord> {
        self.latest_matching(|r| r.from == address)
            .or_else(|| self.latest_matching(|r| r.to == address))
    }

    fn latest_matching(&self, pick: impl Fn(&TransferRecord) -> bool) -> Option<&TransferRecord> {
        let mut best: Option<&TransferRecord> = None;
        for record in &self.records {
            if !pick(record) {
                continue;
            }
            match best {
                Some(b) if b.block_number >= record.block_number => {}
                _ => best = Some(record),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<TransferRecord> {
        vec![
            TransferRecord::new("A", "B").with_block(10),
            TransferRecord::new("B", "C").with_block(12),
            TransferRecord::new("A", "B").with_block(15),
            TransferRecord::new("C", "A").with_block(11),
        ]
    }

    #[test]
    fn test_parallel_edges_collapse() {
        let graph = TransferGraph::from_records(sample_records());
        assert_eq!(graph.records().len(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_node_order_is_insertion_order() {
        let graph = TransferGraph::from_records(vec![
            TransferRecord::new("X", "Y"),
            TransferRecord::new("Z", "X"),
        ]);
        let nodes: Vec<&str> = graph.nodes().collect();
        assert_eq!(nodes, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_from_edges_keeps_isolated_nodes() {
        let nodes = vec!["A", "B", "C"];
        let graph = TransferGraph::from_edges(&nodes, &[("A".to_string(), "B".to_string())]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains("C"));
        assert!(graph.records().is_empty());
    }

    #[test]
    fn test_latest_transfer_prefers_sent() {
        let graph = TransferGraph::from_records(sample_records());
        let sent = graph.latest_transfer("A").unwrap();
        assert_eq!(sent.block_number, 15);
        assert_eq!(sent.to, "B");

        let graph = TransferGraph::from_records(vec![
            TransferRecord::new("A", "D").with_block(3),
            TransferRecord::new("B", "D").with_block(9),
        ]);
        let received = graph.latest_transfer("D").unwrap();
        assert_eq!(received.from, "B");
        assert!(graph.latest_transfer("nobody").is_none());
    }

    #[test]
    fn test_record_json_field_names() {
        let json = r#"{"tokenId":"7","from":"0x1","to":"0x2","gasPrice":1.5,"gasUsed":21000,"blockNumber":42}"#;
        let record: TransferRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.token_id, "7");
        assert_eq!(record.block_number, 42);
        assert!(record.contract_address.is_empty());
    }
}
