//! Engine configuration.
//!
//! Every field has a default; a TOML file only needs the keys it changes.

use crate::core::{Error, Result};
use crate::generation::EdgeSelection;
use crate::gnn::AdamConfig;
use crate::monitoring::LoggerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration for a [`crate::engine::TrustEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where the best checkpoint is kept
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Seed for every stochastic step; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Encoder dimensions and regularization
    #[serde(default)]
    pub model: ModelConfig,
    /// Training loop settings
    #[serde(default)]
    pub training: TrainingConfig,
    /// Feature preprocessing
    #[serde(default)]
    pub features: FeatureConfig,
    /// Synthetic graph generation
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent width D; the hidden layer is 2D wide
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,
    /// Dropout after the first convolution, training only
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of epochs
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Adam learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Standardize feature columns before training and generation
    #[serde(default = "default_true")]
    pub standardize: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// How candidate edges are reduced to the original edge count
    #[serde(default)]
    pub selection: EdgeSelection,
    /// Keep (i, i) pairs of the probability matrix as candidates
    #[serde(default = "default_true")]
    pub allow_self_loops: bool,
    /// Write generated edges to this CSV file
    #[serde(default)]
    pub export_edges: Option<PathBuf>,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("data/best_model.ckpt")
}
fn default_latent_dim() -> usize {
    3
}
fn default_dropout() -> f64 {
    0.2
}
fn default_epochs() -> usize {
    300
}
fn default_learning_rate() -> f64 {
    0.01
}
fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
            seed: None,
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            features: FeatureConfig::default(),
            generation: GenerationConfig::default(),
            logging: LoggerConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            latent_dim: default_latent_dim(),
            dropout: default_dropout(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
        }
    }
}

impl TrainingConfig {
    /// Optimizer settings for this run.
    pub fn adam(&self) -> AdamConfig {
        AdamConfig {
            learning_rate: self.learning_rate,
            ..AdamConfig::default()
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            selection: EdgeSelection::default(),
            allow_self_loops: default_true(),
            export_edges: None,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { standardize: true }
    }
}

impl EngineConfig {
    /// Parse TOML, filling unspecified fields with defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the checkpoint path.
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of training epochs.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.training.epochs = epochs;
        self
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.model.latent_dim == 0 {
            return Err(Error::Config("model.latent_dim must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(Error::Config(format!(
                "model.dropout must be in [0, 1), got {}",
                self.model.dropout
            )));
        }
        if self.training.epochs == 0 {
            return Err(Error::Config("training.epochs must be at least 1".into()));
        }
        if !(self.training.learning_rate > 0.0 && self.training.learning_rate.is_finite()) {
            return Err(Error::Config(format!(
                "training.learning_rate must be positive, got {}",
                self.training.learning_rate
            )));
        }
        Ok(())
    }
}
