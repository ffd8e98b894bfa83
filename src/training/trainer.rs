//! VGAE training loop with best-loss checkpointing.

use crate::config::{ModelConfig, TrainingConfig};
use crate::core::{Error, Result};
use crate::features::GraphTensor;
use crate::gnn::vgae::reparameterize_backward;
use crate::gnn::{
    kl_divergence, negative_sampling, recon_loss, reparameterize, Adam, GraphEncoder, ModelShape, Propagation,
};
use crate::training::checkpoint::{CheckpointStore, ModelCheckpoint};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one training run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epochs completed
    pub epochs_run: usize,
    /// Epoch of the lowest loss
    pub best_epoch: usize,
    /// Lowest loss seen
    pub best_loss: f64,
    /// Number of checkpoint saves
    pub checkpoints_written: u64,
    /// Loss of the last epoch
    pub final_loss: f64,
}

/// Per-epoch loss breakdown.
#[derive(Clone, Copy, Debug)]
pub struct EpochLoss {
    pub reconstruction: f64,
    pub kl: f64,
}

impl EpochLoss {
    pub fn total(&self) -> f64 {
        self.reconstruction + self.kl
    }
}

/// Trains an encoder on one graph and keeps the best checkpoint in a store.
pub struct Trainer {
    model: ModelConfig,
    training: TrainingConfig,
    store: Arc<dyn CheckpointStore>,
}

impl Trainer {
    /// Create a trainer writing to `store`.
    pub fn new(model: ModelConfig, training: TrainingConfig, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            model,
            training,
            store,
        }
    }

    /// The checkpoint store.
    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    fn validate(&self, tensor: &GraphTensor) -> Result<()> {
        if tensor.num_nodes() == 0 || tensor.feature_width() == 0 {
            return Err(Error::InvalidInput("feature matrix is empty".into()));
        }
        if tensor.num_edges() == 0 {
            return Err(Error::InvalidInput("graph has no edges".into()));
        }
        if self.training.epochs == 0 {
            return Err(Error::Config("training.epochs must be at least 1".into()));
        }
        Ok(())
    }

    /// Run the full training loop.
    ///
    /// Each epoch draws fresh dropout masks, latent noise and negative
    /// samples from `rng`. A checkpoint is saved whenever the epoch loss is
    /// strictly below every earlier one.
    pub fn train<R: Rng + ?Sized>(&self, tensor: &GraphTensor, rng: &mut R) -> Result<TrainingSummary> {
        self.validate(tensor)?;

        let shape = ModelShape::new(tensor.feature_width(), self.model.latent_dim);
        let mut encoder = GraphEncoder::new(shape, self.model.dropout, rng)?;
        let mut optimizer = Adam::new(self.training.adam());
        let propagation = Propagation::new(tensor.num_nodes(), tensor.edges());

        info!(
            nodes = tensor.num_nodes(),
            edges = tensor.num_edges(),
            features = tensor.feature_width(),
            model = %shape,
            dropout = self.model.dropout,
            epochs = self.training.epochs,
            "Training model"
        );

        let mut best_loss = f64::INFINITY;
        let mut best_epoch = 0;
        let mut revision = 0;
        let mut final_loss = f64::NAN;

        for epoch in 1..=self.training.epochs {
            let loss = Self::step(&mut encoder, &mut optimizer, tensor, &propagation, rng)?;
            let total = loss.total();
            if !total.is_finite() {
                return Err(Error::Training(format!("loss became {} at epoch {}", total, epoch)));
            }

            debug!(
                epoch,
                loss = total,
                reconstruction = loss.reconstruction,
                kl = loss.kl,
                "Epoch complete"
            );

            if total < best_loss {
                best_loss = total;
                best_epoch = epoch;
                revision += 1;
                let checkpoint = ModelCheckpoint::new(revision, epoch, total, encoder.clone(), optimizer.clone());
                self.store.save(&checkpoint)?;
            }
            final_loss = total;
        }

        let summary = TrainingSummary {
            epochs_run: self.training.epochs,
            best_epoch,
            best_loss,
            checkpoints_written: revision,
            final_loss,
        };
        info!(
            best_epoch = summary.best_epoch,
            best_loss = summary.best_loss,
            final_loss = summary.final_loss,
            checkpoints = summary.checkpoints_written,
            "Training finished"
        );
        Ok(summary)
    }

    /// One forward/backward pass and optimizer update. Returns the loss
    /// measured before the update.
    fn step<R: Rng + ?Sized>(
        encoder: &mut GraphEncoder,
        optimizer: &mut Adam,
        tensor: &GraphTensor,
        propagation: &Propagation,
        rng: &mut R,
    ) -> Result<EpochLoss> {
        let x = tensor.features();
        let (params, cache) = encoder.forward_train(x, propagation, rng);
        let (z, noise) = reparameterize(&params, rng);

        let negatives = negative_sampling(tensor.num_nodes(), tensor.edges(), tensor.num_edges(), rng);
        let (reconstruction, grad_z) = recon_loss(&z, tensor.edges(), &negatives);
        let (kl, kl_grad_mean, kl_grad_logvar) = kl_divergence(&params);

        let (grad_mean, grad_logvar) = reparameterize_backward(&params, &noise, &grad_z);
        let grad_mean = grad_mean + kl_grad_mean;
        let grad_logvar = grad_logvar + kl_grad_logvar;

        let grads = encoder.backward(x, propagation, &cache, &grad_mean, &grad_logvar);
        optimizer.step(encoder.parameters_mut(), grads.tensors())?;

        Ok(EpochLoss { reconstruction, kl })
    }
}
