//! Synthetic graph generation from a trained encoder.

use crate::config::GenerationConfig;
use crate::core::{Error, Result};
use crate::features::{FeatureTable, GraphTensor};
use crate::generation::roc::{CalibrationReport, RocCurve};
use crate::generation::sampling::{candidates, select_edges};
use crate::gnn::{
    decode, negative_sampling, probability_matrix, reparameterize, sigmoid, GraphEncoder, ModelShape, Propagation,
};
use crate::graph::{calculate_centrality, CentralityResult, TransferGraph};
use crate::training::CheckpointStore;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Threshold used when the ROC curve is undefined.
pub const FALLBACK_THRESHOLD: f64 = 0.5;

/// Centrality of the observed and generated graphs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Centrality of the graph the tensors encode
    pub original_centrality: CentralityResult,
    /// Centrality of the generated graph
    pub predicted_centrality: CentralityResult,
    /// Generated (source, target) address pairs
    pub generated_edges: Vec<(String, String)>,
    /// Threshold calibration on observed edges vs sampled non-edges
    pub calibration: CalibrationReport,
}

/// Loads the best checkpoint and samples graphs from it.
pub struct Generator {
    latent_dim: usize,
    config: GenerationConfig,
    store: Arc<dyn CheckpointStore>,
}

impl Generator {
    /// Create a generator reading from `store`.
    pub fn new(latent_dim: usize, config: GenerationConfig, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            latent_dim,
            config,
            store,
        }
    }

    /// Load the encoder and check it fits `feature_width` inputs.
    pub fn load_model(&self, feature_width: usize) -> Result<GraphEncoder> {
        let checkpoint = self.store.load()?;
        let expected = ModelShape::new(feature_width, self.latent_dim);
        if checkpoint.shape() != expected {
            return Err(Error::ModelLoad(format!(
                "checkpoint shape {} does not match expected {}",
                checkpoint.shape(),
                expected
            )));
        }

        info!(
            in_channels = expected.in_channels,
            latent_dim = expected.latent_dim,
            revision = checkpoint.revision,
            epoch = checkpoint.epoch,
            loss = checkpoint.loss,
            "Loaded model"
        );
        Ok(checkpoint.encoder)
    }

    /// Generate a synthetic graph with as many edges as the observed one
    /// and compute centrality on both.
    ///
    /// Nothing is written unless `export_edges` is configured. An empty
    /// tensor still requires a stored checkpoint and yields an empty report.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        features: &FeatureTable,
        tensor: &GraphTensor,
        rng: &mut R,
    ) -> Result<GenerationReport> {
        if tensor.num_nodes() == 0 {
            self.store.load()?;
            info!("Empty graph, nothing to generate");
            return Ok(GenerationReport {
                original_centrality: calculate_centrality(&tensor.to_graph(features.nodes())),
                predicted_centrality: calculate_centrality(&TransferGraph::from_edges(features.nodes(), &[])),
                generated_edges: Vec::new(),
                calibration: CalibrationReport::evaluate(&[], &[], FALLBACK_THRESHOLD, f64::NAN),
            });
        }
        let encoder = self.load_model(tensor.feature_width())?;

        info!(nodes = tensor.num_nodes(), edges = tensor.num_edges(), "Network generation started");
        let propagation = Propagation::new(tensor.num_nodes(), tensor.edges());
        let latent = encoder.encode(tensor.features(), &propagation);
        let (z, _) = reparameterize(&latent, rng);

        let calibration = self.calibrate(&z, tensor, rng);

        let probabilities = probability_matrix(&z);
        let pool = candidates(&probabilities, calibration.threshold, self.config.allow_self_loops);
        let pool_size = pool.len();
        let selected = select_edges(pool, tensor.num_edges(), self.config.selection, rng);

        let registry = tensor.registry();
        let generated_edges = selected
            .into_iter()
            .map(|(s, t)| -> Result<(String, String)> {
                let label = |i: usize| {
                    registry
                        .label(i)
                        .map(str::to_string)
                        .ok_or_else(|| Error::Internal(format!("node index {} outside registry", i)))
                };
                Ok((label(s)?, label(t)?))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            candidates = pool_size,
            generated = generated_edges.len(),
            selection = %self.config.selection,
            "Network generation finished"
        );

        if let Some(path) = &self.config.export_edges {
            export_edges(path, &generated_edges)?;
        }

        let original = tensor.to_graph(features.nodes());
        let predicted = TransferGraph::from_edges(features.nodes(), &generated_edges);

        Ok(GenerationReport {
            original_centrality: calculate_centrality(&original),
            predicted_centrality: calculate_centrality(&predicted),
            generated_edges,
            calibration,
        })
    }

    /// Score observed edges against an equal number of sampled non-edges
    /// and pick the Youden threshold.
    fn calibrate<R: Rng + ?Sized>(
        &self,
        z: &Array2<f64>,
        tensor: &GraphTensor,
        rng: &mut R,
    ) -> CalibrationReport {
        let negatives = negative_sampling(tensor.num_nodes(), tensor.edges(), tensor.num_edges(), rng);

        let mut scores: Vec<f64> = decode(z, tensor.edges()).into_iter().map(sigmoid).collect();
        scores.extend(decode(z, &negatives).into_iter().map(sigmoid));
        let mut labels = vec![true; tensor.num_edges()];
        labels.resize(scores.len(), false);

        let report = match RocCurve::new(&labels, &scores) {
            Some(roc) => {
                let (_, threshold) = roc.youden();
                CalibrationReport::evaluate(&labels, &scores, threshold, roc.auc())
            }
            None => {
                warn!(
                    positives = tensor.num_edges(),
                    negatives = negatives.len(),
                    threshold = FALLBACK_THRESHOLD,
                    "ROC curve undefined, using fallback threshold"
                );
                CalibrationReport::evaluate(&labels, &scores, FALLBACK_THRESHOLD, f64::NAN)
            }
        };

        info!(
            threshold = report.threshold,
            auc = report.auc,
            accuracy = report.accuracy,
            precision = report.precision,
            recall = report.recall,
            "Calibration"
        );
        report
    }
}

/// Write edges as CSV with a `source,target` header.
pub fn export_edges(path: &Path, edges: &[(String, String)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["source", "target"])?;
    for (source, target) in edges {
        writer.write_record([source, target])?;
    }
    writer.flush()?;
    Ok(())
}
