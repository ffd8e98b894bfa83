//! Monitoring Module
//!
//! Observability for trustgraph: structured logging through `tracing`.

pub mod logging;

pub use logging::{init as init_logging, LogFormat, LogLevel, LoggerConfig};
