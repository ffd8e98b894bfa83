//! Graph tensors: feature matrix and edge index in registry index space.

use crate::core::{Error, Result};
use crate::features::builder::FeatureTable;
use crate::features::registry::NodeRegistry;
use crate::graph::transfer::{TransferGraph, TransferRecord};
use ndarray::Array2;

/// Model input for one transfer graph.
#[derive(Clone, Debug)]
pub struct GraphTensor {
    registry: NodeRegistry,
    features: Array2<f64>,
    edges: Vec<(usize, usize)>,
}

impl GraphTensor {
    /// Build tensors from an edge table and its feature table.
    ///
    /// One edge per record in row order (parallel transfers are kept);
    /// feature rows are selected in registry order.
    pub fn build(records: &[TransferRecord], table: &FeatureTable) -> Result<Self> {
        let registry = NodeRegistry::from_records(records);

        let edges = records
            .iter()
            .map(|r| -> Result<(usize, usize)> {
                let from = registry.index_of(&r.from).ok_or_else(|| Error::MissingFeatureRow(r.from.clone()))?;
                let to = registry.index_of(&r.to).ok_or_else(|| Error::MissingFeatureRow(r.to.clone()))?;
                Ok((from, to))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut features = Array2::zeros((registry.len(), table.width()));
        for (i, label) in registry.labels().iter().enumerate() {
            let row = table
                .row(label)
                .ok_or_else(|| Error::MissingFeatureRow(label.clone()))?;
            features.row_mut(i).assign(&row);
        }

        Ok(Self {
            registry,
            features,
            edges,
        })
    }

    /// Assemble tensors from parts, validating indices and shapes.
    pub fn from_parts(registry: NodeRegistry, features: Array2<f64>, edges: Vec<(usize, usize)>) -> Result<Self> {
        if features.nrows() != registry.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows for {} registered nodes",
                features.nrows(),
                registry.len()
            )));
        }
        if let Some((s, t)) = edges.iter().find(|(s, t)| *s >= registry.len() || *t >= registry.len()) {
            return Err(Error::InvalidInput(format!(
                "edge ({}, {}) out of range for {} nodes",
                s,
                t,
                registry.len()
            )));
        }

        Ok(Self {
            registry,
            features,
            edges,
        })
    }

    /// The node registry.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// N x F feature matrix.
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Edges as (source, target) index pairs.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// 2 x E edge index matrix.
    pub fn edge_index(&self) -> Array2<usize> {
        let mut index = Array2::zeros((2, self.edges.len()));
        for (k, &(s, t)) in self.edges.iter().enumerate() {
            index[[0, k]] = s;
            index[[1, k]] = t;
        }
        index
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.registry.len()
    }

    /// Number of edges, parallel edges included.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Feature width.
    pub fn feature_width(&self) -> usize {
        self.features.ncols()
    }

    /// The simple directed graph these tensors encode, with the given
    /// extra nodes added first.
    pub fn to_graph<S: AsRef<str>>(&self, nodes: &[S]) -> TransferGraph {
        let mut graph = TransferGraph::new();
        for node in nodes {
            graph.add_node(node.as_ref());
        }
        for label in self.registry.labels() {
            graph.add_node(label);
        }
        for &(s, t) in &self.edges {
            graph.add_edge(&self.registry.labels()[s], &self.registry.labels()[t]);
        }
        graph
    }
}
