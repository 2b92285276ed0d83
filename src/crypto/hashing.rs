//! Hash functions for the commitment machine

use alloy_primitives::B256;
use sha3::{Digest, Keccak256};

/// Keccak-256 hash (Ethereum compatible)
pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out: [u8; 32] = hasher.finalize().into();
    B256::from(out)
}

/// Keccak-256 over the concatenation of multiple slices
pub fn keccak256_concat(items: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for item in items {
        hasher.update(item);
    }
    let out: [u8; 32] = hasher.finalize().into();
    B256::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_vector() {
        // keccak256("") from the Ethereum yellow paper
        let hash = keccak256(b"");
        let expected =
            hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_keccak256_hello() {
        let hash = keccak256(b"hello");
        let expected =
            hex::decode("1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_concat_matches_single_pass() {
        let joined = [b"lock".as_slice(), b"approval".as_slice()].concat();
        assert_eq!(
            keccak256_concat(&[b"lock", b"approval"]),
            keccak256(&joined)
        );
    }
}
