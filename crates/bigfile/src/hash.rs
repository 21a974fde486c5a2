//! 160-bit content hashes stored in the hash database

use std::fmt;

use sha1::{Digest, Sha1};

/// Size of a content hash in bytes
pub const CONTENT_HASH_SIZE: usize = 20;

/// SHA-1 digest of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentHash(pub [u8; CONTENT_HASH_SIZE]);

impl ContentHash {
    /// Hash that was never set
    pub const EMPTY: Self = Self([0u8; CONTENT_HASH_SIZE]);

    /// Hash a complete buffer
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finish()
    }

    /// Check whether the hash is unset
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Raw digest bytes
    pub const fn as_bytes(&self) -> &[u8; CONTENT_HASH_SIZE] {
        &self.0
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental hasher fed while a payload streams through the writer
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha1,
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHasher").finish_non_exhaustive()
    }
}

impl ContentHasher {
    /// Start a new digest
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    /// Feed more payload bytes
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish the digest
    pub fn finish(self) -> ContentHash {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; CONTENT_HASH_SIZE];
        bytes.copy_from_slice(&digest);
        ContentHash(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // SHA-1("abc")
        assert_eq!(
            ContentHash::compute(b"abc").to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finish(), ContentHash::compute(b"hello world"));
    }

    #[test]
    fn test_empty() {
        assert!(ContentHash::EMPTY.is_empty());
        assert!(ContentHash::default().is_empty());
        assert!(!ContentHash::compute(b"").is_empty());
    }
}
