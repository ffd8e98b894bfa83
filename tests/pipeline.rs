//! End-to-end scenarios: transfers in, trained checkpoint, generated graph out.

use std::sync::Arc;
use trustgraph::config::EngineConfig;
use trustgraph::engine::TrustEngine;
use trustgraph::features::CENTRALITY_COLUMNS;
use trustgraph::graph::{ContractFilter, MemoryTransactionSource, TransferRecord};
use trustgraph::training::CheckpointStore;

fn triangle() -> Vec<TransferRecord> {
    vec![
        TransferRecord::new("A", "B").with_gas(20.0, 21000.0).with_block(1),
        TransferRecord::new("B", "C").with_gas(25.0, 52000.0).with_block(2),
        TransferRecord::new("A", "C").with_gas(30.0, 34000.0).with_block(3),
    ]
}

fn engine_in(dir: &std::path::Path, epochs: usize) -> Arc<TrustEngine> {
    let config = EngineConfig::default()
        .with_checkpoint_path(dir.join("models").join("best_model.ckpt"))
        .with_seed(2024)
        .with_epochs(epochs);
    Arc::new(TrustEngine::new(config).unwrap())
}

#[tokio::test]
async fn test_triangle_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), 100);

    let prepared = engine.prepare(triangle()).unwrap();
    assert_eq!(prepared.tensor.registry().labels(), &["A", "B", "C"]);
    assert_eq!(prepared.tensor.num_edges(), 3);
    assert_eq!(prepared.features.nodes(), &["A", "B", "C"]);

    let summary = engine.spawn_training(prepared.clone()).await.unwrap().unwrap();
    assert_eq!(summary.epochs_run, 100);
    assert!(engine.store().exists());

    let report = engine.generate(&prepared.features, &prepared.tensor).unwrap();
    assert!(report.generated_edges.len() <= 3);
    for (source, target) in &report.generated_edges {
        assert!(["A", "B", "C"].contains(&source.as_str()), "unexpected source {}", source);
        assert!(["A", "B", "C"].contains(&target.as_str()), "unexpected target {}", target);
    }

    let original = &report.original_centrality;
    assert_eq!(original.degree["A"], 0.0);
    assert_eq!(original.degree["B"], 0.5);
    assert_eq!(original.degree["C"], 1.0);
    assert!((original.betweenness["B"] - 0.0).abs() < 1e-12);
    let rank_sum: f64 = original.pagerank.values().sum();
    assert!((rank_sum - 1.0).abs() < 1e-6);

    let predicted = &report.predicted_centrality;
    assert_eq!(predicted.len(), 3);
    for value in predicted.degree.values().chain(predicted.betweenness.values()) {
        assert!((0.0..=1.0).contains(value));
    }
    let threshold = report.calibration.threshold;
    assert!((0.0..=1.0).contains(&threshold));
}

#[tokio::test]
async fn test_missing_checkpoint_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), 10);

    let prepared = engine.prepare(triangle()).unwrap();
    let err = engine.generate(&prepared.features, &prepared.tensor).unwrap_err();
    assert!(err.is_model_load());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_empty_graph() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), 10);

    let prepared = engine.prepare(Vec::new()).unwrap();
    assert!(prepared.features.is_empty());
    assert_eq!(prepared.features.columns(), CENTRALITY_COLUMNS);
    assert_eq!(prepared.tensor.num_nodes(), 0);

    assert!(engine.train(&prepared).is_err());
    assert!(!engine.store().exists());
}

#[tokio::test]
async fn test_contract_scoring_through_source() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_in(dir.path(), 50);

    let mut records: Vec<TransferRecord> = triangle().into_iter().map(|r| r.with_contract("0xnft")).collect();
    records.push(TransferRecord::new("C", "D").with_contract("0xnft").with_block(4));
    records.push(TransferRecord::new("Y", "Z").with_contract("0xother").with_block(9));
    let source = MemoryTransactionSource::new(records);
    let filter = ContractFilter::parse("0xnft");

    engine.train_contract(&source, &filter).await.unwrap().await.unwrap().unwrap();
    let report = engine.score_contract(&source, &filter).await.unwrap();
    assert_eq!(report.original_centrality.len(), 4);
    assert!(report.generated_edges.len() <= 4);
    assert!(report
        .generated_edges
        .iter()
        .all(|(s, t)| s != "Y" && s != "Z" && t != "Y" && t != "Z"));

    let latest = engine.latest_transfer(&source, &filter, "C").await.unwrap().unwrap();
    assert_eq!((latest.from.as_str(), latest.to.as_str()), ("C", "D"));
}
