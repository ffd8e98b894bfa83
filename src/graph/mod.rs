//! Transfer Graph Module
//!
//! Provides the directed token-transfer network:
//! - Transfer records and the collapsed simple graph
//! - Centrality measures (in-degree, betweenness, PageRank)
//! - The transaction store interface

pub mod centrality;
pub mod source;
pub mod transfer;

pub use centrality::{calculate as calculate_centrality, CentralityAverage, CentralityResult, NodeCentrality};
pub use source::{ContractFilter, MemoryTransactionSource, TransactionSource};
pub use transfer::{TransferGraph, TransferRecord};
