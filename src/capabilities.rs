//! Injected environment capabilities
//!
//! The core consumes four abstract capabilities: secure time, secure
//! randomness, attestation document issuance, and fulfillment-proof
//! verification. Production deployments wire these to the TEE host; the
//! defaults here fall back to the host clock, the OS CSPRNG, a deterministic
//! mock attestation marked non-real, and format-only proof checks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha384};

use crate::crypto::hashing::keccak256;
use crate::error::{CcmError, CcmResult};
use crate::types::{AttestationDocument, FulfillmentProof, ResourceLock};

/// Source of trusted time, in Unix seconds
pub trait SecureTime: Send + Sync {
    /// Current Unix time in seconds
    fn now(&self) -> u64;
}

/// Source of cryptographically secure randomness
pub trait SecureRandom: Send + Sync {
    /// Fill a fresh buffer of `n` random bytes
    fn bytes(&self, n: usize) -> CcmResult<Vec<u8>>;
}

/// Issuer of TEE attestation documents
///
/// Implementations must bound their own latency (10 s is a reasonable
/// ceiling); the engine calls this while holding no state lock.
pub trait Attestor: Send + Sync {
    /// Request an attestation document binding `public_key` and `user_data`
    /// under a caller-chosen `nonce`
    fn attestation_document(
        &self,
        public_key: &[u8],
        user_data: &[u8],
        nonce: &[u8],
    ) -> CcmResult<AttestationDocument>;
}

/// Verifier of destination-chain fulfillment proofs
///
/// Called inside the engine's critical section; implementations must bound
/// their own latency (10 s is a reasonable ceiling) and fail rather than
/// block indefinitely.
pub trait FulfillmentVerifier: Send + Sync {
    /// Accept or reject a proof for the given lock
    fn verify(&self, lock: &ResourceLock, proof: &FulfillmentProof) -> CcmResult<()>;
}

/// Default time source: the host wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SecureTime for SystemClock {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Controllable clock for deterministic tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given Unix second
    pub fn starting_at(now: u64) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    /// Set the current time
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward
    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl SecureTime for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Default randomness source: the OS CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn bytes(&self, n: usize) -> CcmResult<Vec<u8>> {
        let mut out = vec![0u8; n];
        getrandom::getrandom(&mut out)
            .map_err(|e| CcmError::Internal(format!("rng failure: {}", e)))?;
        Ok(out)
    }
}

/// Deterministic mock attestor used when no TEE device is available
///
/// Mirrors the shape a real Nitro-style attestor returns: a document blob
/// plus PCR values, but with fixed measurements and `is_real = false` so
/// downstream verifiers can tell it apart from hardware attestation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAttestor;

impl MockAttestor {
    fn mock_pcrs() -> BTreeMap<u32, String> {
        (0u32..3)
            .map(|i| {
                let digest = Sha384::digest(format!("mock-pcr{}", i).as_bytes());
                (i, hex::encode(digest))
            })
            .collect()
    }
}

impl Attestor for MockAttestor {
    fn attestation_document(
        &self,
        public_key: &[u8],
        user_data: &[u8],
        nonce: &[u8],
    ) -> CcmResult<AttestationDocument> {
        let pcrs = Self::mock_pcrs();
        let code_hash = keccak256(pcrs[&0].as_bytes());

        let document = serde_json::json!({
            "module_id": "mock-module",
            "public_key": hex::encode(public_key),
            "user_data": hex::encode(user_data),
            "nonce": hex::encode(nonce),
            "pcrs": &pcrs,
        });
        let document = serde_json::to_vec(&document)
            .map_err(|e| CcmError::AttestorUnavailable(e.to_string()))?;

        Ok(AttestationDocument {
            document,
            pcrs,
            code_hash,
            is_real: false,
        })
    }
}

/// Default fulfillment verifier: format checks only
///
/// Accepts any proof whose transaction and block hashes are exactly 32 bytes
/// and whose block number is non-negative. Chain-aware verification is a
/// deployment concern injected in its place.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatVerifier;

impl FulfillmentVerifier for FormatVerifier {
    fn verify(&self, _lock: &ResourceLock, proof: &FulfillmentProof) -> CcmResult<()> {
        if proof.transaction_hash.len() != 32 {
            return Err(CcmError::VerifierFailed(format!(
                "transaction hash must be 32 bytes, got {}",
                proof.transaction_hash.len()
            )));
        }
        if proof.block_hash.len() != 32 {
            return Err(CcmError::VerifierFailed(format!(
                "block hash must be 32 bytes, got {}",
                proof.block_hash.len()
            )));
        }
        if proof.block_number < 0 {
            return Err(CcmError::VerifierFailed("block number must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use crate::types::{AssetIdentifier, FulfillmentCondition, LockStatus};

    fn dummy_lock() -> ResourceLock {
        ResourceLock {
            id: keccak256(b"lock"),
            owner: Address::repeat_byte(0x11),
            asset: AssetIdentifier::native(1),
            amount: U256::from(1u64),
            locked_at: 0,
            expires_at: 300,
            nonce: U256::from(1u64),
            fulfillment: FulfillmentCondition {
                target_chain_id: 42161,
                target_asset: AssetIdentifier::native(42161),
                target_amount: U256::from(1u64),
                recipient: Address::repeat_byte(0x11),
                execution_data: None,
            },
            status: LockStatus::Active,
            user_signature: None,
            ccm_signature: None,
        }
    }

    #[test]
    fn test_os_random_produces_distinct_buffers() {
        let rng = OsRandom;
        let a = rng.bytes(32).unwrap();
        let b = rng.bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::starting_at(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(31);
        assert_eq!(clock.now(), 1_031);
        clock.set(5_000);
        assert_eq!(clock.now(), 5_000);
    }

    #[test]
    fn test_mock_attestor_is_deterministic_and_not_real() {
        let attestor = MockAttestor;
        let a = attestor.attestation_document(b"pk", b"data", b"nonce").unwrap();
        let b = attestor.attestation_document(b"pk", b"data", b"nonce").unwrap();

        assert_eq!(a, b);
        assert!(!a.is_real);
        assert_eq!(a.pcrs.len(), 3);
        assert!(!a.document.is_empty());
    }

    #[test]
    fn test_format_verifier_accepts_well_formed_proof() {
        let proof = FulfillmentProof {
            transaction_hash: vec![0xAA; 32],
            block_hash: vec![0xBB; 32],
            block_number: 19_000_000,
        };
        assert!(FormatVerifier.verify(&dummy_lock(), &proof).is_ok());
    }

    #[test]
    fn test_format_verifier_rejects_bad_widths() {
        let lock = dummy_lock();

        let bad_tx = FulfillmentProof {
            transaction_hash: vec![0xAA; 31],
            block_hash: vec![0xBB; 32],
            block_number: 1,
        };
        assert!(matches!(
            FormatVerifier.verify(&lock, &bad_tx),
            Err(CcmError::VerifierFailed(_))
        ));

        let bad_height = FulfillmentProof {
            transaction_hash: vec![0xAA; 32],
            block_hash: vec![0xBB; 32],
            block_number: -1,
        };
        assert!(FormatVerifier.verify(&lock, &bad_height).is_err());
    }
}
