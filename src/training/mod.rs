//! Training Module
//!
//! Offline VGAE training and persistence of the best model:
//! - Trainer running the reconstruction + KL objective with Adam
//! - Checkpoint envelope (digest-verified, lz4-compressed bincode)
//! - File and in-memory checkpoint stores

pub mod checkpoint;
pub mod trainer;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, ModelCheckpoint};
pub use trainer::{EpochLoss, Trainer, TrainingSummary};
