//! Variational graph encoder.
//!
//! conv1 (F -> 2D) with ReLU and dropout, then two parallel convolutions
//! (2D -> D) producing the latent mean and log-variance per node.

use crate::core::{Error, Result};
use crate::gnn::conv::{GraphConv, Propagation};
use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound applied to the log-variance before exponentiation.
pub const MAX_LOGVAR: f64 = 20.0;

/// Input and latent widths of an encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelShape {
    /// Feature width F
    pub in_channels: usize,
    /// Latent width D
    pub latent_dim: usize,
}

impl ModelShape {
    /// Create a shape.
    pub fn new(in_channels: usize, latent_dim: usize) -> Self {
        Self {
            in_channels,
            latent_dim,
        }
    }

    /// Hidden width of the first convolution.
    pub fn hidden_dim(&self) -> usize {
        2 * self.latent_dim
    }

    /// Reject degenerate shapes.
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 || self.latent_dim == 0 {
            return Err(Error::InvalidInput(format!(
                "model shape must be non-zero, got {} -> {}",
                self.in_channels, self.latent_dim
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ModelShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} -> {}", self.in_channels, self.hidden_dim(), self.latent_dim)
    }
}

/// Per-node latent distribution parameters.
#[derive(Clone, Debug)]
pub struct LatentParams {
    /// N x D
    pub mean: Array2<f64>,
    /// N x D, clamped to MAX_LOGVAR
    pub logvar: Array2<f64>,
}

/// Activations kept from a training forward pass.
#[derive(Clone, Debug)]
pub struct ForwardCache {
    hidden_pre: Array2<f64>,
    dropout_mask: Option<Array2<f64>>,
    hidden: Array2<f64>,
    logvar_raw: Array2<f64>,
}

/// Gradients for every encoder parameter.
#[derive(Clone, Debug)]
pub struct EncoderGradients {
    pub conv1: (Array2<f64>, Array1<f64>),
    pub conv_mu: (Array2<f64>, Array1<f64>),
    pub conv_logvar: (Array2<f64>, Array1<f64>),
}

impl EncoderGradients {
    /// Views in [`GraphEncoder::parameters_mut`] order.
    pub fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![
            self.conv1.0.view().into_dyn(),
            self.conv1.1.view().into_dyn(),
            self.conv_mu.0.view().into_dyn(),
            self.conv_mu.1.view().into_dyn(),
            self.conv_logvar.0.view().into_dyn(),
            self.conv_logvar.1.view().into_dyn(),
        ]
    }
}

/// The encoder network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphEncoder {
    shape: ModelShape,
    dropout: f64,
    conv1: GraphConv,
    conv_mu: GraphConv,
    conv_logvar: GraphConv,
}

impl GraphEncoder {
    /// Create a randomly initialised encoder.
    pub fn new<R: Rng + ?Sized>(shape: ModelShape, dropout: f64, rng: &mut R) -> Result<Self> {
        shape.validate()?;
        if !(0.0..1.0).contains(&dropout) {
            return Err(Error::InvalidInput(format!("dropout must be in [0, 1), got {}", dropout)));
        }

        let hidden = shape.hidden_dim();
        Ok(Self {
            shape,
            dropout,
            conv1: GraphConv::new(shape.in_channels, hidden, rng),
            conv_mu: GraphConv::new(hidden, shape.latent_dim, rng),
            conv_logvar: GraphConv::new(hidden, shape.latent_dim, rng),
        })
    }

    /// Input and latent widths.
    pub fn shape(&self) -> ModelShape {
        self.shape
    }

    /// Dropout rate used in training.
    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    /// Whether the stored weights agree with the recorded shape.
    pub fn is_consistent(&self) -> bool {
        let hidden = self.shape.hidden_dim();
        let conv_ok = |c: &GraphConv, i: usize, o: usize| c.in_dim() == i && c.out_dim() == o && c.bias.len() == o;
        conv_ok(&self.conv1, self.shape.in_channels, hidden)
            && conv_ok(&self.conv_mu, hidden, self.shape.latent_dim)
            && conv_ok(&self.conv_logvar, hidden, self.shape.latent_dim)
    }

    /// Inference pass, dropout disabled.
    pub fn encode(&self, x: &Array2<f64>, propagation: &Propagation) -> LatentParams {
        let hidden = self.conv1.forward(x, propagation).mapv(|v| v.max(0.0));
        LatentParams {
            mean: self.conv_mu.forward(&hidden, propagation),
            logvar: self
                .conv_logvar
                .forward(&hidden, propagation)
                .mapv(|v| v.min(MAX_LOGVAR)),
        }
    }

    /// Training pass with dropout; keeps what the backward pass needs.
    pub fn forward_train<R: Rng + ?Sized>(
        &self,
        x: &Array2<f64>,
        propagation: &Propagation,
        rng: &mut R,
    ) -> (LatentParams, ForwardCache) {
        let hidden_pre = self.conv1.forward(x, propagation);
        let mut hidden = hidden_pre.mapv(|v| v.max(0.0));

        let dropout_mask = if self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mask = Array2::from_shape_fn(hidden.dim(), |_| {
                if rng.gen::<f64>() < keep {
                    1.0 / keep
                } else {
                    0.0
                }
            });
            hidden = &hidden * &mask;
            Some(mask)
        } else {
            None
        };

        let mean = self.conv_mu.forward(&hidden, propagation);
        let logvar_raw = self.conv_logvar.forward(&hidden, propagation);
        let logvar = logvar_raw.mapv(|v| v.min(MAX_LOGVAR));

        (
            LatentParams { mean, logvar },
            ForwardCache {
                hidden_pre,
                dropout_mask,
                hidden,
                logvar_raw,
            },
        )
    }

    /// Backpropagate dL/dmean and dL/dlogvar to every parameter.
    pub fn backward(
        &self,
        x: &Array2<f64>,
        propagation: &Propagation,
        cache: &ForwardCache,
        grad_mean: &Array2<f64>,
        grad_logvar: &Array2<f64>,
    ) -> EncoderGradients {
        let grad_logvar_raw = ndarray::Zip::from(grad_logvar)
            .and(&cache.logvar_raw)
            .map_collect(|g, raw| if *raw > MAX_LOGVAR { 0.0 } else { *g });

        let mu = self.conv_mu.backward(&cache.hidden, grad_mean, propagation);
        let lv = self.conv_logvar.backward(&cache.hidden, &grad_logvar_raw, propagation);

        let mut grad_hidden = mu.input + lv.input;
        if let Some(mask) = &cache.dropout_mask {
            grad_hidden = grad_hidden * mask;
        }
        // ReLU
        ndarray::Zip::from(&mut grad_hidden)
            .and(&cache.hidden_pre)
            .for_each(|g, pre| {
                if *pre <= 0.0 {
                    *g = 0.0;
                }
            });

        let c1 = self.conv1.backward(x, &grad_hidden, propagation);

        EncoderGradients {
            conv1: (c1.weight, c1.bias),
            conv_mu: (mu.weight, mu.bias),
            conv_logvar: (lv.weight, lv.bias),
        }
    }

    /// Mutable views of every parameter, in a fixed order.
    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        vec![
            self.conv1.weight.view_mut().into_dyn(),
            self.conv1.bias.view_mut().into_dyn(),
            self.conv_mu.weight.view_mut().into_dyn(),
            self.conv_mu.bias.view_mut().into_dyn(),
            self.conv_logvar.weight.view_mut().into_dyn(),
            self.conv_logvar.bias.view_mut().into_dyn(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (GraphEncoder, Array2<f64>, Propagation) {
        let mut rng = StdRng::seed_from_u64(3);
        let encoder = GraphEncoder::new(ModelShape::new(2, 2), 0.0, &mut rng).unwrap();
        let x = arr2(&[[0.5, -0.2], [0.1, 0.9], [-0.7, 0.3]]);
        let prop = Propagation::new(3, &[(0, 1), (1, 2), (0, 2)]);
        (encoder, x, prop)
    }

    #[test]
    fn test_shapes() {
        let (encoder, x, prop) = setup();
        assert!(encoder.is_consistent());
        assert_eq!(encoder.shape().hidden_dim(), 4);

        let latent = encoder.encode(&x, &prop);
        assert_eq!(latent.mean.dim(), (3, 2));
        assert_eq!(latent.logvar.dim(), (3, 2));
    }

    #[test]
    fn test_invalid_construction() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(GraphEncoder::new(ModelShape::new(0, 3), 0.2, &mut rng).is_err());
        assert!(GraphEncoder::new(ModelShape::new(6, 3), 1.0, &mut rng).is_err());
    }

    #[test]
    fn test_train_pass_without_dropout_matches_inference() {
        let (encoder, x, prop) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        let (train, _) = encoder.forward_train(&x, &prop, &mut rng);
        let eval = encoder.encode(&x, &prop);
        assert_eq!(train.mean, eval.mean);
        assert_eq!(train.logvar, eval.logvar);
    }

    #[test]
    fn test_dropout_zeroes_or_scales() {
        let mut rng = StdRng::seed_from_u64(5);
        let encoder = GraphEncoder::new(ModelShape::new(2, 3), 0.5, &mut rng).unwrap();
        let x = Array2::ones((4, 2));
        let prop = Propagation::new(4, &[(0, 1)]);
        let (_, cache) = encoder.forward_train(&x, &prop, &mut rng);
        let mask = cache.dropout_mask.unwrap();
        assert!(mask.iter().all(|m| *m == 0.0 || (*m - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let (encoder, x, prop) = setup();
        let a = arr2(&[[1.0, -0.5], [0.3, 0.8], [-1.2, 0.4]]);
        let b = arr2(&[[0.2, 0.1], [-0.6, 0.5], [0.9, -0.3]]);
        let loss = |e: &GraphEncoder| {
            let p = e.encode(&x, &prop);
            (&p.mean * &p.mean * &a).sum() + (&p.logvar * &b).sum()
        };

        let mut rng = StdRng::seed_from_u64(2);
        let (params, cache) = encoder.forward_train(&x, &prop, &mut rng);
        let grad_mean = &params.mean * &a * 2.0;
        let grads = encoder.backward(&x, &prop, &cache, &grad_mean, &b);

        let h = 1e-6;
        for (row, col) in [(0, 0), (1, 3), (0, 2)] {
            let mut bumped = encoder.clone();
            bumped.conv1.weight[[row, col]] += h;
            let numeric = (loss(&bumped) - loss(&encoder)) / h;
            let analytic = grads.conv1.0[[row, col]];
            assert!(
                (numeric - analytic).abs() < 1e-4,
                "conv1[{},{}]: {} vs {}",
                row,
                col,
                numeric,
                analytic
            );
        }

        let mut bumped = encoder.clone();
        bumped.conv_mu.bias[1] += h;
        let numeric = (loss(&bumped) - loss(&encoder)) / h;
        assert!((numeric - grads.conv_mu.1[1]).abs() < 1e-4);
    }

    #[test]
    fn test_parameter_and_gradient_order_agree() {
        let (mut encoder, x, prop) = setup();
        let mut rng = StdRng::seed_from_u64(4);
        let (params, cache) = encoder.forward_train(&x, &prop, &mut rng);
        let grads = encoder.backward(&x, &prop, &cache, &params.mean, &params.logvar);
        let grad_shapes: Vec<Vec<usize>> = grads.tensors().iter().map(|t| t.shape().to_vec()).collect();
        let param_shapes: Vec<Vec<usize>> = encoder.parameters_mut().iter().map(|t| t.shape().to_vec()).collect();
        assert_eq!(grad_shapes, param_shapes);
    }
}
