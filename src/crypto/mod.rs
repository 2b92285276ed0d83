//! Cryptographic primitives for the commitment machine
//!
//! Provides the enclave's signing machinery:
//! - Keccak-256 hashing
//! - Deterministic ABI encoding for fixed-width values
//! - secp256k1 ECDSA with Ethereum recovery semantics
//! - EIP-712 domain and struct hashing
//!
//! The enclave secret key lives only inside [`EnclaveKeyPair`], is zeroized
//! on drop, and never appears in `Debug` output.

use alloy_primitives::{Address, B256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CcmError, CcmResult};

pub mod abi;
pub mod eip712;
pub mod hashing;
pub mod signing;

pub use hashing::{keccak256, keccak256_concat};

/// Constant-time comparison of equal-length byte slices
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

/// The enclave's ephemeral secp256k1 key pair
///
/// Holds the only copy of the enclave secret. The secret is zeroized when the
/// pair is dropped; the sole values that ever leave are the derived address
/// and the uncompressed public key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EnclaveKeyPair {
    /// Secret key bytes (zeroized on drop)
    secret_key: [u8; 32],
    /// Derived Ethereum address
    #[zeroize(skip)]
    address: Address,
}

impl EnclaveKeyPair {
    /// Build a key pair from fresh secret bytes, validating the scalar
    pub fn from_secret(secret_key: [u8; 32]) -> CcmResult<Self> {
        let address = signing::address_from_secret(&secret_key)
            .map_err(|_| CcmError::Internal("generated key is not a valid scalar".into()))?;
        Ok(Self { secret_key, address })
    }

    /// The derived Ethereum address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Uncompressed SEC1 public key (65 bytes)
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        // from_secret validated the scalar, so this cannot fail
        signing::public_key_from_secret(&self.secret_key)
            .expect("key validated at construction")
    }

    /// Sign a 32-byte digest with the enclave key
    pub fn sign_digest(&self, digest: &B256) -> CcmResult<[u8; signing::SIGNATURE_LEN]> {
        signing::sign_recoverable(&self.secret_key, digest)
    }
}

impl core::fmt::Debug for EnclaveKeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnclaveKeyPair")
            .field("address", &self.address)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_compare() {
        assert!(secure_compare(b"hello world", b"hello world"));
        assert!(!secure_compare(b"hello world", b"hello worle"));
        assert!(!secure_compare(b"short", b"longer input"));
    }

    #[test]
    fn test_keypair_signs_and_matches_address() {
        let pair = EnclaveKeyPair::from_secret([0x42u8; 32]).unwrap();
        let digest = keccak256(b"boot attestation");

        let sig = pair.sign_digest(&digest).unwrap();
        let recovered = signing::recover_address(&digest, &sig).unwrap();
        assert_eq!(recovered, pair.address());
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(EnclaveKeyPair::from_secret([0u8; 32]).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = EnclaveKeyPair::from_secret([0x42u8; 32]).unwrap();
        let dbg = format!("{:?}", pair);
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("42424242"));
    }
}
