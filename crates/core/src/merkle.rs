//! Single-leaf Merkle commitment
//!
//! A market resolution commits to exactly one `(id, payoutNumerator)` leaf.
//! The tree degenerates to its leaf: the published root is the keccak-256
//! hash of the ABI-encoded leaf, and the accompanying proof is empty.
//!
//! The leaf encoding is compatibility-critical: two 32-byte big-endian
//! words, exactly as the contract's `abi.encode(uint256, uint256)`. Any
//! change to field order or width produces roots that will not match
//! previously resolved markets.

use sha3::{Digest, Keccak256};

use crate::{CellId, Hash256};

/// Encode a `u128` amount as a 32-byte big-endian uint256 word.
pub fn amount_word(amount: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&amount.to_be_bytes());
    word
}

/// Encode the resolution leaf: `abi.encode(uint256 id, uint256 numerator)`.
pub fn encode_leaf(id: &CellId, payout_numerator: u128) -> [u8; 64] {
    let mut leaf = [0u8; 64];
    leaf[..32].copy_from_slice(id);
    leaf[32..].copy_from_slice(&amount_word(payout_numerator));
    leaf
}

/// Hash the resolution leaf. For the single-leaf tree this IS the root.
pub fn leaf_hash(id: &CellId, payout_numerator: u128) -> Hash256 {
    keccak256(&encode_leaf(id, payout_numerator))
}

/// keccak-256 over arbitrary bytes.
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
