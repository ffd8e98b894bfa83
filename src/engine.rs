//! Trust engine facade.
//!
//! Wires a transaction source, the feature and tensor builders, the
//! trainer and the generator together.

use crate::config::EngineConfig;
use crate::core::{Error, Result};
use crate::features::{build_features, FeatureTable, GraphTensor};
use crate::generation::{GenerationReport, Generator};
use crate::graph::{ContractFilter, TransactionSource, TransferGraph, TransferRecord};
use crate::training::{CheckpointStore, FileCheckpointStore, Trainer, TrainingSummary};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One transfer graph with everything the model needs.
#[derive(Clone, Debug)]
pub struct PreparedGraph {
    pub graph: TransferGraph,
    pub features: FeatureTable,
    pub tensor: GraphTensor,
}

/// Trust engine.
///
/// At most one training run is active per engine; generation runs
/// concurrently with it and only reads the checkpoint store.
pub struct TrustEngine {
    config: EngineConfig,
    store: Arc<dyn CheckpointStore>,
    rng: Mutex<StdRng>,
    training: Mutex<()>,
}

impl TrustEngine {
    /// Create an engine keeping its checkpoint at `config.checkpoint_path`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(FileCheckpointStore::new(config.checkpoint_path.clone()));
        Self::with_store(config, store)
    }

    /// Create an engine with a custom checkpoint store.
    pub fn with_store(config: EngineConfig, store: Arc<dyn CheckpointStore>) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            store,
            rng: Mutex::new(rng),
            training: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Independent generator for one operation, derived from the engine RNG.
    fn fork_rng(&self) -> Result<StdRng> {
        let mut master = self
            .rng
            .lock()
            .map_err(|_| Error::Internal("engine rng lock poisoned".into()))?;
        Ok(StdRng::seed_from_u64(master.gen()))
    }

    /// Build the graph, feature table and tensors for a set of transfers.
    pub fn prepare(&self, records: Vec<TransferRecord>) -> Result<PreparedGraph> {
        let graph = TransferGraph::from_records(records);
        let mut features = build_features(&graph);
        if self.config.features.standardize {
            features.standardize();
        }
        let tensor = GraphTensor::build(graph.records(), &features)?;

        info!(
            transfers = graph.records().len(),
            nodes = tensor.num_nodes(),
            edges = tensor.num_edges(),
            features = tensor.feature_width(),
            "Prepared graph"
        );
        Ok(PreparedGraph {
            graph,
            features,
            tensor,
        })
    }

    /// Train on a prepared graph, blocking until done.
    pub fn train(&self, prepared: &PreparedGraph) -> Result<TrainingSummary> {
        let _guard = self
            .training
            .lock()
            .map_err(|_| Error::Internal("training lock poisoned".into()))?;
        let mut rng = self.fork_rng()?;
        Trainer::new(
            self.config.model.clone(),
            self.config.training.clone(),
            self.store.clone(),
        )
        .train(&prepared.tensor, &mut rng)
    }

    /// Train on tokio's blocking pool. Dropping the handle detaches the run.
    pub fn spawn_training(self: &Arc<Self>, prepared: PreparedGraph) -> JoinHandle<Result<TrainingSummary>> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = engine.train(&prepared);
            if let Err(e) = &result {
                warn!(error = %e, "Background training failed");
            }
            result
        })
    }

    /// Generate a synthetic graph and compare its centrality with the
    /// observed one.
    pub fn generate(&self, features: &FeatureTable, tensor: &GraphTensor) -> Result<GenerationReport> {
        let mut rng = self.fork_rng()?;
        Generator::new(
            self.config.model.latent_dim,
            self.config.generation.clone(),
            self.store.clone(),
        )
        .generate(features, tensor, &mut rng)
    }

    /// Fetch a contract's transfers and score them with the stored model.
    ///
    /// Feature building and generation run on tokio's blocking pool.
    pub async fn score_contract(
        self: &Arc<Self>,
        source: &dyn TransactionSource,
        filter: &ContractFilter,
    ) -> Result<GenerationReport> {
        let records = source.fetch_transfers(filter).await?;
        info!(filter = %filter, transfers = records.len(), "Scoring contract");
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let prepared = engine.prepare(records)?;
            engine.generate(&prepared.features, &prepared.tensor)
        })
        .await
        .map_err(|e| Error::Internal(format!("scoring task failed: {}", e)))?
    }

    /// Fetch a contract's transfers and start training on them.
    pub async fn train_contract(
        self: &Arc<Self>,
        source: &dyn TransactionSource,
        filter: &ContractFilter,
    ) -> Result<JoinHandle<Result<TrainingSummary>>> {
        let records = source.fetch_transfers(filter).await?;
        info!(filter = %filter, transfers = records.len(), "Training contract");
        let prepared = self.prepare(records)?;
        Ok(self.spawn_training(prepared))
    }

    /// Most recent transfer sent by `address`, else the most recent one it
    /// received.
    pub async fn latest_transfer(
        &self,
        source: &dyn TransactionSource,
        filter: &ContractFilter,
        address: &str,
    ) -> Result<Option<TransferRecord>> {
        let records = source.fetch_transfers(filter).await?;
        let graph = TransferGraph::from_records(records);
        Ok(graph.latest_transfer(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryTransactionSource;
    use crate::training::MemoryCheckpointStore;

    fn engine(epochs: usize) -> Arc<TrustEngine> {
        let config = EngineConfig::default().with_seed(11).with_epochs(epochs);
        Arc::new(TrustEngine::with_store(config, Arc::new(MemoryCheckpointStore::new())).unwrap())
    }

    fn source() -> MemoryTransactionSource {
        let mut source = MemoryTransactionSource::default();
        for (i, (from, to)) in [("A", "B"), ("B", "C"), ("A", "C"), ("C", "D")].iter().enumerate() {
            source.push(
                TransferRecord::new(from, to)
                    .with_gas(1.0 + i as f64, 21000.0)
                    .with_block(100 + i as u64)
                    .with_contract("0xabc"),
            );
        }
        source.push(TransferRecord::new("X", "Y").with_block(1).with_contract("0xother"));
        source
    }

    #[test]
    fn test_prepare_standardizes() {
        let engine = engine(1);
        let prepared = engine
            .prepare(vec![
                TransferRecord::new("A", "B").with_gas(1.0, 10.0),
                TransferRecord::new("B", "C").with_gas(3.0, 30.0),
            ])
            .unwrap();
        assert_eq!(prepared.tensor.num_nodes(), 3);
        let gas = prepared.features.values().column(3);
        assert!(gas.mean().unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default().with_epochs(0);
        assert!(TrustEngine::with_store(config, Arc::new(MemoryCheckpointStore::new())).is_err());
    }

    #[tokio::test]
    async fn test_train_then_score_contract() {
        let engine = engine(30);
        let source = source();
        let filter = ContractFilter::Contract("0xabc".into());

        let summary = engine.train_contract(&source, &filter).await.unwrap().await.unwrap().unwrap();
        assert!(summary.checkpoints_written >= 1);

        let report = engine.score_contract(&source, &filter).await.unwrap();
        assert!(report.generated_edges.len() <= 4);
        assert_eq!(report.original_centrality.len(), 4);
        assert!(report.original_centrality.node("X").is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_scoring_off_runtime_thread() {
        let engine = engine(20);
        let source = source();
        let filter = ContractFilter::Contract("0xabc".into());
        engine.train_contract(&source, &filter).await.unwrap().await.unwrap().unwrap();

        let (a, b) = tokio::join!(
            engine.score_contract(&source, &filter),
            engine.score_contract(&source, &filter)
        );
        assert_eq!(a.unwrap().original_centrality.len(), 4);
        assert_eq!(b.unwrap().original_centrality.len(), 4);
    }

    #[tokio::test]
    async fn test_score_without_model() {
        let engine = engine(1);
        let err = engine.score_contract(&source(), &ContractFilter::All).await.unwrap_err();
        assert!(err.is_model_load());
    }

    #[tokio::test]
    async fn test_background_training_failure_surfaces() {
        let engine = engine(5);
        let prepared = engine.prepare(Vec::new()).unwrap();
        let result = engine.spawn_training(prepared).await.unwrap();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_latest_transfer() {
        let engine = engine(1);
        let source = source();
        let filter = ContractFilter::All;

        let sent = engine.latest_transfer(&source, &filter, "A").await.unwrap().unwrap();
        assert_eq!(sent.to, "C");

        let received = engine.latest_transfer(&source, &filter, "D").await.unwrap().unwrap();
        assert_eq!(received.from, "C");

        assert!(engine.latest_transfer(&source, &filter, "Q").await.unwrap().is_none());
    }
}
