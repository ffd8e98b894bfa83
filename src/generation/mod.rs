//! Generation Module
//!
//! Online use of a trained model: threshold calibration, synthetic graph
//! sampling and centrality of the result.

pub mod generator;
pub mod roc;
pub mod sampling;

pub use generator::{export_edges, GenerationReport, Generator};
pub use roc::{CalibrationReport, RocCurve};
pub use sampling::{candidates, select_edges, Candidate, EdgeSelection};
