//! Enclave identity and boot attestation
//!
//! At initialization the enclave draws a fresh 256-bit secp256k1 key and a
//! random 32-byte enclave ID from the secure randomness capability, records
//! its boot time, and can thereafter prove its identity by producing a
//! [`BootAttestation`]: the attestor's document binding the public key to a
//! measured code identity, countersigned with the enclave key. A restart
//! produces a wholly new identity; nothing persists.

use alloy_primitives::{Address, B256};

use crate::capabilities::{Attestor, SecureRandom, SecureTime};
use crate::crypto::abi::AbiEncoder;
use crate::crypto::EnclaveKeyPair;
use crate::error::{CcmError, CcmResult};
use crate::types::{BootAttestation, LockSignature};

/// The enclave's ephemeral identity: key pair, ID, and boot time
#[derive(Debug)]
pub struct EnclaveIdentity {
    keypair: EnclaveKeyPair,
    enclave_id: B256,
    boot_time: u64,
}

impl EnclaveIdentity {
    /// Generate a fresh identity from the injected capabilities
    pub fn generate(random: &dyn SecureRandom, time: &dyn SecureTime) -> CcmResult<Self> {
        let secret: [u8; 32] = random
            .bytes(32)?
            .try_into()
            .map_err(|_| CcmError::Internal("rng returned wrong length".into()))?;
        let keypair = EnclaveKeyPair::from_secret(secret)?;

        let id_bytes: [u8; 32] = random
            .bytes(32)?
            .try_into()
            .map_err(|_| CcmError::Internal("rng returned wrong length".into()))?;
        let enclave_id = B256::from(id_bytes);
        let boot_time = time.now();

        tracing::info!(
            enclave_id = %enclave_id,
            address = %keypair.address(),
            boot_time,
            "enclave identity generated"
        );

        Ok(Self { keypair, enclave_id, boot_time })
    }

    /// Random 32-byte identifier assigned at boot
    pub fn enclave_id(&self) -> B256 {
        self.enclave_id
    }

    /// Unix second the enclave booted
    pub fn boot_time(&self) -> u64 {
        self.boot_time
    }

    /// Address derived from the enclave key
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Uncompressed SEC1 public key (65 bytes)
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.keypair.public_key_uncompressed()
    }

    /// Sign a 32-byte digest with the enclave key
    pub fn sign_digest(&self, digest: &B256) -> CcmResult<LockSignature> {
        Ok(LockSignature(self.keypair.sign_digest(digest)?))
    }

    /// The digest bound into a boot attestation:
    /// `keccak(abi.encode(enclaveId, enclaveAddress, bootTime))`
    pub fn boot_digest(&self) -> B256 {
        let mut enc = AbiEncoder::new();
        enc.bytes32(&self.enclave_id);
        enc.address(&self.keypair.address());
        enc.uint64(self.boot_time);
        enc.hash()
    }

    /// Produce a boot attestation via the attestor capability
    ///
    /// The attestor nonce is drawn fresh so a relying party can distinguish
    /// replays of older documents.
    pub fn boot_attestation(
        &self,
        attestor: &dyn Attestor,
        random: &dyn SecureRandom,
    ) -> CcmResult<BootAttestation> {
        let public_key = self.public_key_uncompressed();
        let nonce = random.bytes(32)?;

        let doc = attestor
            .attestation_document(&public_key, self.enclave_id.as_slice(), &nonce)
            .map_err(|e| match e {
                CcmError::AttestorUnavailable(_) => e,
                other => CcmError::AttestorUnavailable(other.to_string()),
            })?;

        let signature = self.sign_digest(&self.boot_digest())?;

        Ok(BootAttestation {
            enclave_id: self.enclave_id,
            public_key: format!("0x{}", hex::encode(&public_key)),
            enclave_address: self.keypair.address(),
            boot_time: self.boot_time,
            code_hash: doc.code_hash,
            attestation_document: doc.document,
            pcrs: doc.pcrs,
            is_real_attestation: doc.is_real,
            signature,
        })
    }
}
