//! secp256k1 ECDSA with the Ethereum recovery convention
//!
//! Signatures are 65 bytes `r ‖ s ‖ v` with `v ∈ {27, 28}` and canonical
//! low-s. Recovery hashes the uncompressed public key body with keccak-256
//! and takes the low 20 bytes as the address.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::crypto::hashing::keccak256;
use crate::error::{CcmError, CcmResult};

/// Length of an Ethereum-style recoverable signature
pub const SIGNATURE_LEN: usize = 65;

/// Sign a 32-byte digest, returning `r ‖ s ‖ v` with `v = 27 + recovery_id`
pub fn sign_recoverable(secret_key: &[u8], digest: &B256) -> CcmResult<[u8; SIGNATURE_LEN]> {
    let signing_key = SigningKey::from_slice(secret_key)
        .map_err(|_| CcmError::Internal("invalid enclave signing key".into()))?;

    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| CcmError::Internal(format!("signing failed: {}", e)))?;

    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = 27 + recovery_id.to_byte();
    Ok(out)
}

/// Recover the signer address from a digest and a 65-byte signature
pub fn recover_address(digest: &B256, signature: &[u8]) -> CcmResult<Address> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CcmError::InvalidParams(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    let v = signature[64];
    if v != 27 && v != 28 {
        return Err(CcmError::InvalidSignature);
    }
    let recovery_id =
        RecoveryId::from_byte(v - 27).ok_or(CcmError::InvalidSignature)?;

    let sig = Signature::from_slice(&signature[..64]).map_err(|_| CcmError::InvalidSignature)?;

    let verifying_key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|_| CcmError::InvalidSignature)?;

    Ok(address_of_key(&verifying_key))
}

/// Check whether `signature` over `digest` recovers to `expected`
pub fn verify_address(digest: &B256, signature: &[u8], expected: &Address) -> bool {
    matches!(recover_address(digest, signature), Ok(addr) if addr == *expected)
}

/// Derive the Ethereum address for a secret key
pub fn address_from_secret(secret_key: &[u8]) -> CcmResult<Address> {
    let signing_key = SigningKey::from_slice(secret_key)
        .map_err(|_| CcmError::Internal("invalid enclave signing key".into()))?;
    Ok(address_of_key(signing_key.verifying_key()))
}

/// Uncompressed SEC1 public key (65 bytes, `0x04 ‖ x ‖ y`) for a secret key
pub fn public_key_from_secret(secret_key: &[u8]) -> CcmResult<Vec<u8>> {
    let signing_key = SigningKey::from_slice(secret_key)
        .map_err(|_| CcmError::Internal("invalid enclave signing key".into()))?;
    Ok(signing_key
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec())
}

/// Ethereum address of a verifying key: keccak of the 64-byte point body,
/// low 20 bytes
fn address_of_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash.as_slice()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: [u8; 32] = [0x42u8; 32];

    #[test]
    fn test_sign_recover_round_trip() {
        let digest = keccak256(b"commitment payload");
        let expected = address_from_secret(&TEST_KEY).unwrap();

        let sig = sign_recoverable(&TEST_KEY, &digest).unwrap();
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert!(sig[64] == 27 || sig[64] == 28);

        let recovered = recover_address(&digest, &sig).unwrap();
        assert_eq!(recovered, expected);
        assert!(verify_address(&digest, &sig, &expected));
    }

    #[test]
    fn test_recover_wrong_digest_yields_other_address() {
        let digest = keccak256(b"original");
        let sig = sign_recoverable(&TEST_KEY, &digest).unwrap();
        let expected = address_from_secret(&TEST_KEY).unwrap();

        let other = keccak256(b"tampered");
        // Recovery over the wrong digest either fails or yields a different key
        match recover_address(&other, &sig) {
            Ok(addr) => assert_ne!(addr, expected),
            Err(e) => assert_eq!(e, CcmError::InvalidSignature),
        }
    }

    #[test]
    fn test_rejects_bad_length() {
        let digest = keccak256(b"x");
        let err = recover_address(&digest, &[0u8; 64]).unwrap_err();
        assert!(matches!(err, CcmError::InvalidParams(_)));
    }

    #[test]
    fn test_rejects_bad_v() {
        let digest = keccak256(b"x");
        let mut sig = sign_recoverable(&TEST_KEY, &digest).unwrap();
        sig[64] = 5;
        assert_eq!(recover_address(&digest, &sig).unwrap_err(), CcmError::InvalidSignature);
    }

    #[test]
    fn test_public_key_shape() {
        let pk = public_key_from_secret(&TEST_KEY).unwrap();
        assert_eq!(pk.len(), 65);
        assert_eq!(pk[0], 0x04);
    }

    #[test]
    fn test_distinct_keys_distinct_addresses() {
        let a = address_from_secret(&[0x01u8; 32]).unwrap();
        let b = address_from_secret(&[0x02u8; 32]).unwrap();
        assert_ne!(a, b);
    }
}
