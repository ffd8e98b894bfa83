//! TransactionSource trait definition.
//!
//! The transaction store is an external collaborator; the engine only
//! needs to fetch the transfer edge table for one contract or for all.

use crate::core::{Error, Result};
use crate::graph::transfer::TransferRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which transfers to fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractFilter {
    /// Every transfer in the store
    #[default]
    All,
    /// Transfers of a single token contract
    Contract(String),
}

impl ContractFilter {
    /// Parse a CLI/query argument; `"all"` selects every contract.
    pub fn parse(arg: &str) -> Self {
        if arg.eq_ignore_ascii_case("all") {
            ContractFilter::All
        } else {
            ContractFilter::Contract(arg.to_string())
        }
    }

    /// Whether a record passes the filter.
    pub fn matches(&self, record: &TransferRecord) -> bool {
        match self {
            ContractFilter::All => true,
            ContractFilter::Contract(address) => record.contract_address == *address,
        }
    }
}

impl std::fmt::Display for ContractFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractFilter::All => write!(f, "all"),
            ContractFilter::Contract(address) => write!(f, "{}", address),
        }
    }
}

/// Source of transfer edge tables.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch every transfer matching the filter, in store order.
    async fn fetch_transfers(&self, filter: &ContractFilter) -> Result<Vec<TransferRecord>>;
}

/// In-memory transaction source.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransactionSource {
    records: Vec<TransferRecord>,
}

impl MemoryTransactionSource {
    /// Create a source over the given records.
    pub fn new(records: Vec<TransferRecord>) -> Self {
        Self { records }
    }

    /// Load a JSON array of transfer records.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<TransferRecord> = serde_json::from_str(&raw)
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(records))
    }

    /// Append a record.
    pub fn push(&mut self, record: TransferRecord) {
        self.records.push(record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TransactionSource for MemoryTransactionSource {
    async fn fetch_transfers(&self, filter: &ContractFilter) -> Result<Vec<TransferRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}
