//! Graph Neural Network (GNN) Module
//!
//! Variational graph autoencoder over transfer graphs:
//! - Graph convolution with symmetric normalization
//! - Two-layer variational encoder (mean / log-variance)
//! - Inner-product decoder, reconstruction and KL losses
//! - Adam optimizer and negative sampling

pub mod conv;
pub mod encoder;
pub mod optimizer;
pub mod sampling;
pub mod vgae;

pub use conv::{GraphConv, Propagation};
pub use encoder::{EncoderGradients, GraphEncoder, LatentParams, ModelShape};
pub use optimizer::{Adam, AdamConfig};
pub use sampling::negative_sampling;
pub use vgae::{decode, kl_divergence, probability_matrix, recon_loss, reparameterize, sigmoid};
