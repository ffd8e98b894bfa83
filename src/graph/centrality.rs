//! Centrality measures for directed transfer graphs.
//!
//! In-degree centrality, betweenness (Brandes) and PageRank over the
//! collapsed simple graph. Results are keyed by address.

use crate::graph::transfer::TransferGraph;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::{Incoming, Outgoing};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// PageRank damping factor.
pub const PAGERANK_DAMPING: f64 = 0.85;
/// PageRank iteration cap.
pub const PAGERANK_MAX_ITER: usize = 500;
/// PageRank per-node convergence tolerance.
pub const PAGERANK_TOLERANCE: f64 = 1.0e-6;

/// Means of the three measures over all nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityAverage {
    pub degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
}

/// The three measures for one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeCentrality {
    pub degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
}

/// Centrality of every node in a graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CentralityResult {
    /// In-degree centrality
    pub degree: HashMap<String, f64>,
    /// Normalized betweenness centrality
    pub betweenness: HashMap<String, f64>,
    /// PageRank, sums to 1 over all nodes
    pub pagerank: HashMap<String, f64>,
    /// Means of the three measures (0 for an empty graph)
    pub average: CentralityAverage,
}

impl CentralityResult {
    /// Number of scored nodes.
    pub fn len(&self) -> usize {
        self.pagerank.len()
    }

    /// Whether no node was scored.
    pub fn is_empty(&self) -> bool {
        self.pagerank.is_empty()
    }

    /// All three measures for one address.
    pub fn node(&self, label: &str) -> Option<NodeCentrality> {
        Some(NodeCentrality {
            degree: *self.degree.get(label)?,
            betweenness: *self.betweenness.get(label)?,
            pagerank: *self.pagerank.get(label)?,
        })
    }
}

/// Compute all centrality measures of a transfer graph.
pub fn calculate(graph: &TransferGraph) -> CentralityResult {
    let g = graph.digraph();
    if g.node_count() == 0 {
        return CentralityResult::default();
    }

    let degree = in_degree_centrality(g);
    let betweenness = betweenness_centrality(g);
    let pagerank = pagerank(g);

    let label = |values: Vec<f64>| -> HashMap<String, f64> {
        g.node_indices()
            .zip(values)
            .map(|(i, v)| (g[i].clone(), v))
            .collect()
    };

    let average = CentralityAverage {
        degree: mean(&degree),
        betweenness: mean(&betweenness),
        pagerank: mean(&pagerank),
    };

    CentralityResult {
        degree: label(degree),
        betweenness: label(betweenness),
        pagerank: label(pagerank),
        average,
    }
}

/// In-degree centrality, indexed like `g.node_indices()`.
///
/// in-degree / (n - 1); self transfers do not count.
pub fn in_degree_centrality(g: &DiGraph<String, ()>) -> Vec<f64> {
    let n = g.node_count();
    if n <= 1 {
        return vec![0.0; n];
    }

    let scale = 1.0 / (n - 1) as f64;
    g.node_indices()
        .map(|i| {
            let in_degree = g.neighbors_directed(i, Incoming).filter(|&j| j != i).count();
            in_degree as f64 * scale
        })
        .collect()
}

/// Betweenness centrality (Brandes), normalized by 1/((n-1)(n-2)).
pub fn betweenness_centrality(g: &DiGraph<String, ()>) -> Vec<f64> {
    let n = g.node_count();
    let mut centrality = vec![0.0; n];

    for s in g.node_indices() {
        let mut stack: Vec<NodeIndex> = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut distance = vec![usize::MAX; n];

        sigma[s.index()] = 1.0;
        distance[s.index()] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = distance[v.index()];
            for w in g.neighbors_directed(v, Outgoing) {
                if distance[w.index()] == usize::MAX {
                    distance[w.index()] = dv + 1;
                    queue.push_back(w);
                }
                if distance[w.index()] == dv + 1 {
                    sigma[w.index()] += sigma[v.index()];
                    predecessors[w.index()].push(v);
                }
            }
        }

        // Accumulate dependencies in order of non-increasing distance
        let mut delta = vec![0.0_f64; n];
        while let Some(w) = stack.pop() {
            let wi = w.index();
            for v in &predecessors[wi] {
                let vi = v.index();
                delta[vi] += sigma[vi] / sigma[wi] * (1.0 + delta[wi]);
            }
            if w != s {
                centrality[wi] += delta[wi];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for value in &mut centrality {
            *value *= scale;
        }
    }

    centrality
}

/// PageRank by power iteration.
///
/// Dangling nodes spread their mass uniformly. If the iteration cap is
/// reached the last iterate is returned.
pub fn pagerank(g: &DiGraph<String, ()>) -> Vec<f64> {
    let n = g.node_count();
    if n == 0 {
        return Vec::new();
    }

    let uniform = 1.0 / n as f64;
    let out_degree: Vec<usize> = g
        .node_indices()
        .map(|i| g.neighbors_directed(i, Outgoing).count())
        .collect();

    let mut x = vec![uniform; n];
    for iteration in 1..=PAGERANK_MAX_ITER {
        let last = x.clone();
        let dangling_sum: f64 = PAGERANK_DAMPING
            * g.node_indices()
                .filter(|i| out_degree[i.index()] == 0)
                .map(|i| last[i.index()])
                .sum::<f64>();

        x.iter_mut()
            .for_each(|v| *v = dangling_sum * uniform + (1.0 - PAGERANK_DAMPING) * uniform);

        for i in g.node_indices() {
            let degree = out_degree[i.index()];
            if degree == 0 {
                continue;
            }
            let share = PAGERANK_DAMPING * last[i.index()] / degree as f64;
            for j in g.neighbors_directed(i, Outgoing) {
                x[j.index()] += share;
            }
        }

        let err: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < n as f64 * PAGERANK_TOLERANCE {
            return x;
        }
        if iteration == PAGERANK_MAX_ITER {
            warn!(nodes = n, err, "PageRank did not converge, using last iterate");
        }
    }

    let total: f64 = x.iter().sum();
    if total > 0.0 {
        x.iter_mut().for_each(|v| *v /= total);
    }
    x
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::transfer::TransferRecord;

    fn graph(edges: &[(&str, &str)]) -> TransferGraph {
        TransferGraph::from_records(
            edges
                .iter()
                .map(|(a, b)| TransferRecord::new(a, b))
                .collect(),
        )
    }

    fn assert_valid(result: &CentralityResult) {
        for map in [&result.degree, &result.betweenness, &result.pagerank] {
            assert!(map.values().all(|v| (0.0..=1.0).contains(v)), "{:?}", map);
        }
        let total: f64 = result.pagerank.values().sum();
        assert!((total - 1.0).abs() < 1e-9, "pagerank sums to {}", total);
    }

    #[test]
    fn test_empty_graph() {
        let result = calculate(&TransferGraph::new());
        assert!(result.degree.is_empty());
        assert!(result.betweenness.is_empty());
        assert!(result.pagerank.is_empty());
        assert_eq!(result.average, CentralityAverage::default());
    }

    #[test]
    fn test_triangle_values() {
        let result = calculate(&graph(&[("A", "B"), ("B", "C"), ("A", "C")]));
        assert_valid(&result);

        assert_eq!(result.degree["A"], 0.0);
        assert_eq!(result.degree["B"], 0.5);
        assert_eq!(result.degree["C"], 1.0);

        // A->C is direct, so no node lies strictly between any pair
        assert!(result.betweenness.values().all(|v| *v == 0.0));

        assert!(result.pagerank["C"] > result.pagerank["B"]);
        assert!(result.pagerank["B"] > result.pagerank["A"]);
    }

    #[test]
    fn test_path_betweenness() {
        let result = calculate(&graph(&[("A", "B"), ("B", "C")]));
        // B is on the only A->C path: 1 / ((3-1)(3-2))
        assert!((result.betweenness["B"] - 0.5).abs() < 1e-12);
        assert_eq!(result.betweenness["A"], 0.0);
        assert_valid(&result);
    }

    #[test]
    fn test_cycle_pagerank_uniform() {
        let result = calculate(&graph(&[("A", "B"), ("B", "C"), ("C", "A")]));
        for v in result.pagerank.values() {
            assert!((v - 1.0 / 3.0).abs() < 1e-6);
        }
        assert!((result.average.pagerank - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_star_and_self_loop_stay_in_range() {
        let result = calculate(&graph(&[
            ("hub", "a"),
            ("hub", "b"),
            ("a", "hub"),
            ("b", "hub"),
            ("c", "hub"),
            ("hub", "hub"),
        ]));
        assert_valid(&result);
        assert_eq!(result.degree["hub"], 1.0);
    }

    #[test]
    fn test_single_node() {
        let mut g = TransferGraph::new();
        g.add_node("solo");
        let result = calculate(&g);
        assert_eq!(result.degree["solo"], 0.0);
        assert_eq!(result.betweenness["solo"], 0.0);
        assert!((result.pagerank["solo"] - 1.0).abs() < 1e-12);
        assert!(result.node("solo").is_some());
        assert!(result.node("other").is_none());
    }
}
