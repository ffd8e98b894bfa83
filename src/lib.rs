//! # trustgraph - Graph trust engine for token-transfer networks
//!
//! Computes per-address trust signals from two sources:
//! - **Centrality**: in-degree, betweenness and PageRank of the transfer graph
//! - **VGAE**: a variational graph autoencoder trained on the graph, used to
//!   generate a plausible future graph whose centrality is a predictive signal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trustgraph::config::EngineConfig;
//! use trustgraph::engine::TrustEngine;
//! use trustgraph::graph::TransferRecord;
//!
//! #[tokio::main]
//! async fn main() -> trustgraph::Result<()> {
//!     let engine = Arc::new(TrustEngine::new(EngineConfig::default())?);
//!     let prepared = engine.prepare(vec![
//!         TransferRecord::new("0xa", "0xb"),
//!         TransferRecord::new("0xb", "0xc"),
//!         TransferRecord::new("0xa", "0xc"),
//!     ])?;
//!
//!     engine.spawn_training(prepared.clone()).await.expect("training task")?;
//!     let report = engine.generate(&prepared.features, &prepared.tensor)?;
//!     println!("{:?}", report.predicted_centrality.average);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod features;
pub mod generation;
pub mod gnn;
pub mod graph;
pub mod monitoring;
pub mod training;

pub use core::error::{Error, Result};
