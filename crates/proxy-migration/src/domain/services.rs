//! # Domain Services
//!
//! Pure functions used by the orchestrator and the in-memory environment.
//! Deterministic, no side effects, no I/O.

use crate::domain::value_objects::{Address, Hash};
use sha3::{Digest, Keccak256};

// =============================================================================
// KECCAK256 UTILITY
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

// =============================================================================
// CONTRACT ADDRESS COMPUTATION
// =============================================================================

/// Computes the address of a contract created by `sender` at `nonce`.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12:\]
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut content = Vec::with_capacity(30);

    // 20-byte string: 0x80 + 20 = 0x94
    content.push(0x94);
    content.extend_from_slice(sender.as_bytes());

    if nonce == 0 {
        content.push(0x80);
    } else if nonce < 0x80 {
        content.push(nonce as u8);
    } else {
        let bytes = nonce.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
        let trimmed = &bytes[start..];
        content.push(0x80 + trimmed.len() as u8);
        content.extend_from_slice(trimmed);
    }

    // Content never exceeds 30 bytes, so the short list header always applies.
    let mut rlp = Vec::with_capacity(content.len() + 1);
    rlp.push(0xc0 + content.len() as u8);
    rlp.extend_from_slice(&content);

    let hash = Keccak256::digest(&rlp);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

/// Derives a transaction hash for a simulated submission.
///
/// Not a real signed-transaction hash; unique per (sender, nonce, target).
#[must_use]
pub fn simulated_tx_hash(sender: Address, nonce: u64, to: Option<Address>) -> Hash {
    let mut data = Vec::with_capacity(48);
    data.extend_from_slice(sender.as_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    if let Some(to) = to {
        data.extend_from_slice(to.as_bytes());
    }
    keccak256(&data)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(hex: &str) -> Address {
        hex.parse().unwrap()
    }

    #[test]
    fn test_keccak256() {
        // keccak256("") = c5d24601...
        let hash = keccak256(&[]);
        assert_eq!(hash.as_bytes()[0..4], [0xc5, 0xd2, 0x46, 0x01]);
    }

    #[test]
    fn test_compute_contract_address_known_vectors() {
        let sender = addr("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0");
        assert_eq!(
            compute_contract_address(sender, 0),
            addr("0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d")
        );
        assert_eq!(
            compute_contract_address(sender, 1),
            addr("0x343c43a37d37dff08ae8c4a11544c718abb4fcf8")
        );
    }

    #[test]
    fn test_compute_contract_address_large_nonce() {
        let sender = Address::repeat_byte(7);
        let a = compute_contract_address(sender, 0x80);
        let b = compute_contract_address(sender, 0x0100_0000);
        assert_ne!(a, b);
        assert_eq!(a, compute_contract_address(sender, 0x80));
    }

    #[test]
    fn test_simulated_tx_hash_unique_per_nonce() {
        let sender = Address::repeat_byte(1);
        let to = Some(Address::repeat_byte(2));
        assert_ne!(
            simulated_tx_hash(sender, 0, to),
            simulated_tx_hash(sender, 1, to)
        );
        assert_ne!(
            simulated_tx_hash(sender, 0, to),
            simulated_tx_hash(sender, 0, None)
        );
    }
}
