//! Content hashing for blocks, DAGs and partitions.
//!
//! Hashes cover the canonical JSON form of a value, so two structurally equal
//! partitions hash equal regardless of how they were produced.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 content hash of any serializable value.
pub fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hasher.finalize().into())
}

/// Format a content hash as a hex string.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::{Block, Opcode};
    use crate::types::VarKind;

    fn block(op: Opcode) -> Block {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let out = b.var("out", VarKind::Output, 4);
        b.emit(out, op, &[a]);
        b
    }

    #[test]
    fn equal_blocks_hash_equal() {
        let h1 = content_hash(&block(Opcode::Abs)).unwrap();
        let h2 = content_hash(&block(Opcode::Abs)).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_blocks_hash_differently() {
        let h1 = content_hash(&block(Opcode::Abs)).unwrap();
        let h2 = content_hash(&block(Opcode::Frac)).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn hex_is_64_chars() {
        let h = content_hash(&42u32).unwrap();
        assert_eq!(hash_hex(&h).len(), 64);
    }
}
