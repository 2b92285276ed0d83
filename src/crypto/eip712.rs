//! EIP-712 typed data hashing
//!
//! The machine signs and verifies exactly one struct type, `LockApproval`,
//! under a fixed domain: name `CredibleCommitmentMachine`, version `1.0.0`,
//! zero verifying contract, and the chain ID of the locked asset.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::abi::AbiEncoder;
use crate::crypto::hashing::{keccak256, keccak256_concat};

/// Type string hashed into the domain separator
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Type string for the lock approval struct
pub const LOCK_APPROVAL_TYPE: &str = "LockApproval(bytes32 lockId,address owner,bytes32 asset,uint256 amount,uint256 nonce,uint256 expiresAt,bytes32 fulfillmentHash)";

/// Domain name for every commitment machine signature
pub const DOMAIN_NAME: &str = "CredibleCommitmentMachine";

/// Domain version for every commitment machine signature
pub const DOMAIN_VERSION: &str = "1.0.0";

/// An EIP-712 signing domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    /// Human-readable domain name
    pub name: String,
    /// Domain version string
    pub version: String,
    /// Chain the signature is bound to
    pub chain_id: u64,
    /// Verifying contract address
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// The fixed commitment machine domain, parameterized by chain ID
    pub fn commitment_machine(chain_id: u64) -> Self {
        Self {
            name: DOMAIN_NAME.into(),
            version: DOMAIN_VERSION.into(),
            chain_id,
            verifying_contract: Address::ZERO,
        }
    }

    /// Compute the domain separator
    pub fn separator(&self) -> B256 {
        let mut enc = AbiEncoder::new();
        enc.bytes32(&keccak256(EIP712_DOMAIN_TYPE.as_bytes()));
        enc.bytes32(&keccak256(self.name.as_bytes()));
        enc.bytes32(&keccak256(self.version.as_bytes()));
        enc.uint64(self.chain_id);
        enc.address(&self.verifying_contract);
        enc.hash()
    }
}

/// The `LockApproval` struct a user signs to activate a lock
///
/// Field values are always taken from the stored lock, never from
/// client-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockApprovalMessage {
    /// Lock being approved
    pub lock_id: B256,
    /// Smart-account address of the lock owner
    pub owner: Address,
    /// Canonical hash of the locked asset
    pub asset: B256,
    /// Reserved amount
    #[serde(with = "crate::types::dec_string")]
    pub amount: U256,
    /// Per-owner sequential nonce
    #[serde(with = "crate::types::dec_string")]
    pub nonce: U256,
    /// Unix expiry of the lock
    pub expires_at: u64,
    /// Canonical hash of the fulfillment condition
    pub fulfillment_hash: B256,
}

impl LockApprovalMessage {
    /// EIP-712 struct hash
    pub fn struct_hash(&self) -> B256 {
        let mut enc = AbiEncoder::new();
        enc.bytes32(&keccak256(LOCK_APPROVAL_TYPE.as_bytes()));
        enc.bytes32(&self.lock_id);
        enc.address(&self.owner);
        enc.bytes32(&self.asset);
        enc.uint256(&self.amount);
        enc.uint256(&self.nonce);
        enc.uint64(self.expires_at);
        enc.bytes32(&self.fulfillment_hash);
        enc.hash()
    }

    /// Full signing digest under the given domain
    pub fn signing_digest(&self, domain: &Eip712Domain) -> B256 {
        hash_typed_data(&domain.separator(), &self.struct_hash())
    }
}

/// `keccak(0x1901 ‖ domainSeparator ‖ structHash)`
pub fn hash_typed_data(domain_separator: &B256, struct_hash: &B256) -> B256 {
    keccak256_concat(&[
        &[0x19, 0x01],
        domain_separator.as_slice(),
        struct_hash.as_slice(),
    ])
}
