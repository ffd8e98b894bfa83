//! Node feature table.
//!
//! Joins centrality with per-address transfer aggregates.

use crate::core::{Error, Result};
use crate::graph::centrality;
use crate::graph::transfer::TransferGraph;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Columns present even when the table is empty.
pub const CENTRALITY_COLUMNS: [&str; 3] = ["degree", "betweenness", "pagerank"];

/// Full column set of a non-empty table.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "degree",
    "betweenness",
    "pagerank",
    "gas_price",
    "gas_used",
    "block_number",
];

/// Numeric features per address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    nodes: Vec<String>,
    values: Array2<f64>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FeatureTable {
    /// Table with no rows and the centrality columns.
    pub fn empty() -> Self {
        Self {
            columns: CENTRALITY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            nodes: Vec::new(),
            values: Array2::zeros((0, CENTRALITY_COLUMNS.len())),
            index: HashMap::new(),
        }
    }

    /// Build a table from explicit rows.
    pub fn from_rows(columns: Vec<String>, nodes: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != nodes.len() || values.ncols() != columns.len() {
            return Err(Error::InvalidInput(format!(
                "feature shape {:?} does not match {} nodes x {} columns",
                values.dim(),
                nodes.len(),
                columns.len()
            )));
        }

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.clone(), i).is_some() {
                return Err(Error::InvalidInput(format!("duplicate feature row {}", node)));
            }
        }

        Ok(Self {
            columns,
            nodes,
            values,
            index,
        })
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row labels in row order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Raw values, one row per node.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Features of one address.
    pub fn row(&self, label: &str) -> Option<ArrayView1<'_, f64>> {
        let i = self.position(label)?;
        Some(self.values.row(i))
    }

    /// Row position of an address.
    pub fn position(&self, label: &str) -> Option<usize> {
        if self.index.len() == self.nodes.len() {
            self.index.get(label).copied()
        } else {
            // index is not serialized
            self.nodes.iter().position(|n| n == label)
        }
    }

    /// Standardize every column to zero mean and unit population variance.
    ///
    /// A zero-variance column becomes all zeros. Row order is unchanged.
    pub fn standardize(&mut self) {
        if self.values.nrows() == 0 {
            return;
        }

        for mut column in self.values.axis_iter_mut(Axis(1)) {
            let first = column[0];
            if column.iter().all(|v| *v == first) {
                column.fill(0.0);
                continue;
            }

            let n = column.len() as f64;
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let mut std = variance.sqrt();
            if std == 0.0 || !std.is_finite() {
                std = 1.0;
            }
            column.mapv_inplace(|v| (v - mean) / std);
        }
    }

    /// Consuming variant of [`standardize`](Self::standardize).
    pub fn standardized(mut self) -> Self {
        self.standardize();
        self
    }
}

/// Build the feature table of a transfer graph.
///
/// Gas price and gas used are summed over transfers sent plus transfers
/// received. The block column is the first block seen as sender plus the
/// first block seen as recipient; a missing side counts as 0.
pub fn build_features(graph: &TransferGraph) -> FeatureTable {
    if graph.is_empty() {
        return FeatureTable::empty();
    }

    let centrality = centrality::calculate(graph);

    let mut gas_sent: HashMap<&str, (f64, f64)> = HashMap::new();
    let mut gas_received: HashMap<&str, (f64, f64)> = HashMap::new();
    let mut first_sent: HashMap<&str, u64> = HashMap::new();
    let mut first_received: HashMap<&str, u64> = HashMap::new();

    for record in graph.records() {
        let sent = gas_sent.entry(record.from.as_str()).or_insert((0.0, 0.0));
        sent.0 += record.gas_price;
        sent.1 += record.gas_used;

        let received = gas_received.entry(record.to.as_str()).or_insert((0.0, 0.0));
        received.0 += record.gas_price;
        received.1 += record.gas_used;

        first_sent.entry(record.from.as_str()).or_insert(record.block_number);
        first_received.entry(record.to.as_str()).or_insert(record.block_number);
    }

    let nodes: Vec<String> = graph.nodes().map(str::to_string).collect();
    let mut values = Array2::zeros((nodes.len(), FEATURE_COLUMNS.len()));

    for (i, node) in nodes.iter().enumerate() {
        let key = node.as_str();
        let (sent_price, sent_used) = gas_sent.get(key).copied().unwrap_or((0.0, 0.0));
        let (recv_price, recv_used) = gas_received.get(key).copied().unwrap_or((0.0, 0.0));
        let block = first_sent.get(key).copied().unwrap_or(0) + first_received.get(key).copied().unwrap_or(0);

        let mut row = values.row_mut(i);
        row[0] = centrality.degree.get(key).copied().unwrap_or(0.0);
        row[1] = centrality.betweenness.get(key).copied().unwrap_or(0.0);
        row[2] = centrality.pagerank.get(key).copied().unwrap_or(0.0);
        row[3] = sent_price + recv_price;
        row[4] = sent_used + recv_used;
        row[5] = block as f64;
    }

    let index = nodes.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
    FeatureTable {
        columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        nodes,
        values,
        index,
    }
}
