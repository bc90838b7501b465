//! Content hashing for memoization
//!
//! `ModuleHasher` is an incremental SHA-256 accumulator exposed through
//! `std::hash::Hasher`, so any `Hash` value can be fed into it. Values,
//! fields and modules feed a caller-supplied hasher rather than owning one.
//!
//! Digests are deterministic within a process. They follow the `Hash`
//! implementations of the fed types, so they are not a persistence format.

use sha2::{Digest, Sha256};
use std::hash::Hasher;

/// SHA-256 accumulator producing hex digests
#[derive(Clone, Default)]
pub struct ModuleHasher {
    inner: Sha256,
}

impl std::fmt::Debug for ModuleHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHasher").finish_non_exhaustive()
    }
}

impl ModuleHasher {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Finish and render the digest as lowercase hex
    pub fn finalize(self) -> String {
        to_hex(&self.inner.finalize())
    }
}

impl Hasher for ModuleHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// First 8 bytes of the current digest, little-endian
    fn finish(&self) -> u64 {
        let digest = self.inner.clone().finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
