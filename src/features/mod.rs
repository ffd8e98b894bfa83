//! Feature Module
//!
//! Turns a transfer graph into model input:
//! - Feature table (centrality + gas/block aggregates, standardization)
//! - Node registry (address <-> index)
//! - Graph tensors (feature matrix + edge index)

pub mod builder;
pub mod registry;
pub mod tensor;

pub use builder::{build_features, FeatureTable, CENTRALITY_COLUMNS, FEATURE_COLUMNS};
pub use registry::NodeRegistry;
pub use tensor::GraphTensor;
