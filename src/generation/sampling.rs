//! Edge selection from the decoded probability matrix.

use ndarray::Array2;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How candidate edges above the threshold are reduced to the target count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSelection {
    /// Uniformly at random, without replacement
    #[default]
    Uniform,
    /// Highest probability first
    TopProbability,
}

impl std::fmt::Display for EdgeSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeSelection::Uniform => write!(f, "uniform"),
            EdgeSelection::TopProbability => write!(f, "top_probability"),
        }
    }
}

/// A candidate edge and its decoded probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub source: usize,
    pub target: usize,
    pub probability: f64,
}

/// Every (i, j) with probability strictly above `threshold`, row-major.
pub fn candidates(probabilities: &Array2<f64>, threshold: f64, allow_self_loops: bool) -> Vec<Candidate> {
    probabilities
        .indexed_iter()
        .filter(|((i, j), p)| (allow_self_loops || i != j) && **p > threshold)
        .map(|((source, target), &probability)| Candidate {
            source,
            target,
            probability,
        })
        .collect()
}

/// Reduce candidates to at most `limit` edges.
pub fn select_edges<R: Rng + ?Sized>(
    mut candidates: Vec<Candidate>,
    limit: usize,
    selection: EdgeSelection,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let amount = limit.min(candidates.len());
    match selection {
        EdgeSelection::Uniform => index::sample(rng, candidates.len(), amount)
            .into_iter()
            .map(|i| (candidates[i].source, candidates[i].target))
            .collect(),
        EdgeSelection::TopProbability => {
            candidates.sort_by(|a, b| b.probability.total_cmp(&a.probability));
            candidates
                .into_iter()
                .take(amount)
                .map(|c| (c.source, c.target))
                .collect()
        }
    }
}
