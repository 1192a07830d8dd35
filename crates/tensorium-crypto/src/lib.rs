//! # Tensorium Cryptography
//!
//! Hashing primitives for the Tensorium consensus core.
//!
//! Everything here is deterministic: the same input bytes produce the same
//! output on every platform. Key management and signature verification live
//! in the execution layer, not in this crate.

use sha3::{Digest, Keccak256};

pub mod merkle;

pub use merkle::MerkleTree;

pub type Hash = [u8; 32];

/// Keccak256 hash function
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Keccak256 over the concatenation of two byte slices, without an
/// intermediate allocation for small inputs.
pub fn keccak256_concat(a: &[u8], b: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(a);
    hasher.update(b);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256() {
        let hash = keccak256(b"hello world");
        assert_eq!(hash.len(), 32);
        // Known vector for keccak256("")
        let empty = keccak256(b"");
        assert_eq!(
            hex::encode(empty),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_concat_matches_joined_input() {
        let joined = keccak256(b"abcdef");
        let concat = keccak256_concat(b"abc", b"def");
        assert_eq!(joined, concat);
    }
}
