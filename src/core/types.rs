//! Common types used across trustgraph modules.

use sha3::{Digest, Sha3_256};

/// SHA3-256 digest guarding checkpoint payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash arbitrary bytes with SHA3-256.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&hasher.finalize());
        Self(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = Hash256::digest(b"checkpoint");
        let b = Hash256::digest(b"checkpoint");
        let c = Hash256::digest(b"checkpoinT");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Hash256::new(*a.as_bytes()), a);
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        // SHA3-256 of the empty string
        let display = Hash256::digest(b"").to_string();
        assert_eq!(
            display,
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }
}
