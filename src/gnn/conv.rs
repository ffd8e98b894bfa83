//! Graph convolution layer.
//!
//! H' = Â (H W) + b with Â = D^(-1/2) (A + I) D^(-1/2). Messages flow
//! from edge source to edge target; degrees are counted on the target side.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sparse normalized adjacency for one edge list.
#[derive(Clone, Debug)]
pub struct Propagation {
    num_nodes: usize,
    /// (target, source, coefficient)
    entries: Vec<(usize, usize, f64)>,
}

impl Propagation {
    /// Build the propagation rule for `num_nodes` nodes.
    ///
    /// Parallel edges count once each. Nodes without a self loop get one.
    pub fn new(num_nodes: usize, edges: &[(usize, usize)]) -> Self {
        let mut has_loop = vec![false; num_nodes];
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(edges.len() + num_nodes);
        for &(s, t) in edges {
            if s == t {
                has_loop[s] = true;
            }
            pairs.push((s, t));
        }
        for (i, looped) in has_loop.iter().enumerate() {
            if !looped {
                pairs.push((i, i));
            }
        }

        let mut degree = vec![0.0_f64; num_nodes];
        for &(_, t) in &pairs {
            degree[t] += 1.0;
        }
        let inv_sqrt: Vec<f64> = degree
            .iter()
            .map(|d| if *d > 0.0 { 1.0 / d.sqrt() } else { 0.0 })
            .collect();

        let entries = pairs
            .into_iter()
            .map(|(s, t)| (t, s, inv_sqrt[s] * inv_sqrt[t]))
            .collect();

        Self { num_nodes, entries }
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Â x
    pub fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.num_nodes, x.ncols()));
        for &(t, s, c) in &self.entries {
            let src = x.row(s);
            out.row_mut(t).scaled_add(c, &src);
        }
        out
    }

    /// Âᵗ g
    pub fn apply_transpose(&self, g: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((self.num_nodes, g.ncols()));
        for &(t, s, c) in &self.entries {
            let grad = g.row(t);
            out.row_mut(s).scaled_add(c, &grad);
        }
        out
    }
}

/// Gradients of one convolution.
#[derive(Clone, Debug)]
pub struct ConvGradient {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
    pub input: Array2<f64>,
}

/// A graph convolution with learned weight and bias.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphConv {
    /// in_dim x out_dim
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl GraphConv {
    /// Glorot-uniform weights, zero bias.
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (in_dim + out_dim).max(1) as f64).sqrt();
        let weight = Array2::from_shape_fn((in_dim, out_dim), |_| rng.gen_range(-limit..limit));

        Self {
            weight,
            bias: Array1::zeros(out_dim),
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Forward pass.
    pub fn forward(&self, x: &Array2<f64>, propagation: &Propagation) -> Array2<f64> {
        propagation.apply(&x.dot(&self.weight)) + &self.bias
    }

    /// Backward pass given dL/dOutput.
    pub fn backward(&self, x: &Array2<f64>, grad_out: &Array2<f64>, propagation: &Propagation) -> ConvGradient {
        let grad_xw = propagation.apply_transpose(grad_out);
        ConvGradient {
            weight: x.t().dot(&grad_xw),
            bias: grad_out.sum_axis(Axis(0)),
            input: grad_xw.dot(&self.weight.t()),
        }
    }
}
