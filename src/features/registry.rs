//! Node registry: the address <-> matrix row mapping.

use crate::graph::transfer::TransferRecord;
use std::collections::HashMap;

/// Bidirectional mapping between addresses and contiguous 0-based indices.
///
/// Built once per edge table and carried alongside the tensors so the
/// generator can translate sampled index pairs back to addresses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeRegistry {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign indices by first appearance in the `from` column, then the `to` column.
    pub fn from_records(records: &[TransferRecord]) -> Self {
        let mut registry = Self::new();
        for record in records {
            registry.insert(&record.from);
        }
        for record in records {
            registry.insert(&record.to);
        }
        registry
    }

    /// Assign indices in iteration order, skipping duplicates.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for label in labels {
            registry.insert(label.as_ref());
        }
        registry
    }

    /// Insert a label if absent and return its index.
    pub fn insert(&mut self, label: &str) -> usize {
        if let Some(&i) = self.index.get(label) {
            return i;
        }
        let i = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), i);
        i
    }

    /// Index of an address.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Address at an index.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Addresses in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of registered addresses.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no address is registered.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_from_then_to() {
        let records = vec![
            TransferRecord::new("B", "A"),
            TransferRecord::new("C", "B"),
            TransferRecord::new("B", "D"),
        ];
        let registry = NodeRegistry::from_records(&records);
        assert_eq!(registry.labels(), &["B", "C", "A", "D"]);
        assert_eq!(registry.index_of("A"), Some(2));
        assert_eq!(registry.label(3), Some("D"));
        assert_eq!(registry.label(4), None);
    }

    #[test]
    fn test_round_trip() {
        let registry = NodeRegistry::from_labels(["x", "y", "x", "z"]);
        assert_eq!(registry.len(), 3);
        for (i, label) in registry.labels().iter().enumerate() {
            assert_eq!(registry.index_of(label), Some(i));
        }
    }
}
