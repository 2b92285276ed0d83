//! Core types for the commitment machine
//!
//! Defines the lock data model, the attestation records the enclave emits,
//! and the request/response shapes crossing the engine boundary. The
//! canonical hashing methods here are consumed by on-chain contracts, so
//! their byte layouts are normative and stable across runs.

use alloy_primitives::{Address, B256, U256};
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::crypto::abi::AbiEncoder;
use crate::crypto::eip712::{Eip712Domain, LockApprovalMessage};
use crate::crypto::hashing::keccak256;
use crate::error::{CcmError, CcmResult};

/// Protocol version stamped into every commitment
pub const PROTOCOL_VERSION: u32 = 1;

/// Kind of on-chain asset a lock reserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssetKind {
    /// The chain's native currency
    Native = 0,
    /// ERC-20 fungible token
    Erc20 = 1,
    /// ERC-721 non-fungible token
    Erc721 = 2,
    /// ERC-1155 multi-token
    Erc1155 = 3,
}

impl AssetKind {
    /// Numeric identifier used in canonical encodings
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Create from the numeric identifier
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Native),
            1 => Some(Self::Erc20),
            2 => Some(Self::Erc721),
            3 => Some(Self::Erc1155),
            _ => None,
        }
    }
}

/// Identifies an asset on a specific chain
///
/// Invariant: `kind == Native` iff `contract.is_none()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIdentifier {
    /// Chain the asset lives on
    pub chain_id: u64,
    /// Asset kind
    pub kind: AssetKind,
    /// Token contract; absent exactly for native assets
    #[serde(default)]
    pub contract: Option<Address>,
    /// Token ID for non-fungible kinds
    #[serde(default, with = "dec_string_opt")]
    pub token_id: Option<U256>,
}

impl AssetIdentifier {
    /// Native currency of a chain
    pub fn native(chain_id: u64) -> Self {
        Self {
            chain_id,
            kind: AssetKind::Native,
            contract: None,
            token_id: None,
        }
    }

    /// ERC-20 token on a chain
    pub fn erc20(chain_id: u64, contract: Address) -> Self {
        Self {
            chain_id,
            kind: AssetKind::Erc20,
            contract: Some(contract),
            token_id: None,
        }
    }

    /// Check the kind/contract coherence invariant
    pub fn check_well_formed(&self) -> CcmResult<()> {
        match (self.kind, &self.contract) {
            (AssetKind::Native, Some(_)) => Err(CcmError::InvalidAsset(
                "native asset must not carry a contract address".into(),
            )),
            (AssetKind::Native, None) => Ok(()),
            (_, None) => Err(CcmError::InvalidAsset(
                "non-native asset requires a contract address".into(),
            )),
            (_, Some(_)) => Ok(()),
        }
    }

    /// Canonical hash: `keccak(abi.encode(chainId, kind, contract | zero,
    /// tokenId | 0))`
    pub fn canonical_hash(&self) -> B256 {
        let mut enc = AbiEncoder::new();
        enc.uint64(self.chain_id);
        enc.uint8(self.kind.as_u8());
        enc.address(&self.contract.unwrap_or(Address::ZERO));
        enc.uint256(&self.token_id.unwrap_or(U256::ZERO));
        enc.hash()
    }
}

/// What a solver must deliver on the destination chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentCondition {
    /// Destination chain
    pub target_chain_id: u64,
    /// Asset to deliver
    pub target_asset: AssetIdentifier,
    /// Amount to deliver
    #[serde(with = "dec_string")]
    pub target_amount: U256,
    /// Recipient on the destination chain
    pub recipient: Address,
    /// Optional calldata the solver must execute on delivery
    #[serde(default)]
    pub execution_data: Option<Vec<u8>>,
}

impl FulfillmentCondition {
    /// Canonical hash over the condition; absent execution data contributes
    /// 32 zero bytes, present data contributes its keccak
    pub fn canonical_hash(&self) -> B256 {
        let exec_hash = match &self.execution_data {
            Some(data) => keccak256(data),
            None => B256::ZERO,
        };

        let mut enc = AbiEncoder::new();
        enc.uint64(self.target_chain_id);
        enc.bytes32(&self.target_asset.canonical_hash());
        enc.uint256(&self.target_amount);
        enc.address(&self.recipient);
        enc.bytes32(&exec_hash);
        enc.hash()
    }
}

/// Lifecycle state of a resource lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LockStatus {
    /// Created, awaiting the owner's approval signature
    Pending = 0,
    /// Co-signed; assets are reserved and the commitment is live
    Active = 1,
    /// Fulfillment verified; settlement operation issued
    Fulfilled = 2,
    /// Settlement landed on-chain (recorded externally, never set here)
    Settled = 3,
    /// Expired without fulfillment
    Expired = 4,
    /// Cancelled by the owner
    Cancelled = 5,
}

impl LockStatus {
    /// Numeric identifier used in canonical encodings
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Create from the numeric identifier
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Active),
            2 => Some(Self::Fulfilled),
            3 => Some(Self::Settled),
            4 => Some(Self::Expired),
            5 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Settled | Self::Expired | Self::Cancelled)
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Fulfilled => "Fulfilled",
            Self::Settled => "Settled",
            Self::Expired => "Expired",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

/// A 65-byte `r ‖ s ‖ v` signature
///
/// `Debug` deliberately omits the bytes; signatures are never logged.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LockSignature(pub [u8; 65]);

impl LockSignature {
    /// Parse from raw bytes, enforcing the exact length
    pub fn from_slice(bytes: &[u8]) -> CcmResult<Self> {
        if bytes.len() != 65 {
            return Err(CcmError::InvalidParams(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 65];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Parse from a `0x`-prefixed hex string of exactly 130 hex chars
    pub fn from_hex(s: &str) -> CcmResult<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 130 {
            return Err(CcmError::InvalidParams(format!(
                "signature must be 130 hex chars, got {}",
                stripped.len()
            )));
        }
        let bytes = hex::decode(stripped)
            .map_err(|e| CcmError::InvalidParams(format!("invalid signature hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for LockSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockSignature(65 bytes)")
    }
}

impl Serialize for LockSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LockSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Derive a lock ID from its identity tuple
///
/// `keccak(abi.encode(owner, assetHash, amount, nonce, lockedAt))`. The
/// per-owner sequential nonce makes collisions structurally impossible.
pub fn lock_id(
    owner: &Address,
    asset_hash: &B256,
    amount: &U256,
    nonce: &U256,
    locked_at: u64,
) -> B256 {
    let mut enc = AbiEncoder::new();
    enc.address(owner);
    enc.bytes32(asset_hash);
    enc.uint256(amount);
    enc.uint256(nonce);
    enc.uint64(locked_at);
    enc.hash()
}

/// The central entity: one reservation of on-chain assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Deterministic lock identifier
    pub id: B256,
    /// Smart-account address owning the reserved assets
    pub owner: Address,
    /// What is reserved
    pub asset: AssetIdentifier,
    /// How much is reserved
    #[serde(with = "dec_string")]
    pub amount: U256,
    /// Unix second the lock was created
    pub locked_at: u64,
    /// Unix second the reservation lapses
    pub expires_at: u64,
    /// Per-owner sequential nonce, starting at 1
    #[serde(with = "dec_string")]
    pub nonce: U256,
    /// Condition under which the reservation settles
    pub fulfillment: FulfillmentCondition,
    /// Lifecycle state
    pub status: LockStatus,
    /// Owner's EIP-712 approval, present once Active
    #[serde(default)]
    pub user_signature: Option<LockSignature>,
    /// Enclave co-signature, present once Active
    #[serde(default)]
    pub ccm_signature: Option<LockSignature>,
}

impl ResourceLock {
    /// The EIP-712 message the owner signs, built only from stored fields
    pub fn approval_message(&self) -> LockApprovalMessage {
        LockApprovalMessage {
            lock_id: self.id,
            owner: self.owner,
            asset: self.asset.canonical_hash(),
            amount: self.amount,
            nonce: self.nonce,
            expires_at: self.expires_at,
            fulfillment_hash: self.fulfillment.canonical_hash(),
        }
    }

    /// `keccak(abi.encode(lockId, owner, assetHash, amount, nonce,
    /// expiresAt, fulfillmentHash))`
    pub fn lock_data_hash(&self) -> B256 {
        let mut enc = AbiEncoder::new();
        enc.bytes32(&self.id);
        enc.address(&self.owner);
        enc.bytes32(&self.asset.canonical_hash());
        enc.uint256(&self.amount);
        enc.uint256(&self.nonce);
        enc.uint64(self.expires_at);
        enc.bytes32(&self.fulfillment.canonical_hash());
        enc.hash()
    }

    /// The digest the owner must sign to cancel this lock:
    /// `keccak(abi.encode(lockId, "CANCEL"))`
    pub fn cancellation_digest(&self) -> B256 {
        let mut enc = AbiEncoder::new();
        enc.bytes32(&self.id);
        enc.trailing_bytes(b"CANCEL");
        enc.hash()
    }
}

/// Enclave attestation bound to one commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcmAttestation {
    /// Identifier of the attesting enclave
    pub enclave_id: B256,
    /// Unix second of issuance
    pub timestamp: u64,
    /// `keccak(abi.encode(enclaveId, timestamp, lockDataHash))`
    pub commitment_hash: B256,
    /// Enclave ECDSA signature over `commitment_hash`
    pub signature: LockSignature,
}

/// Enclave attestation over a non-commitment operation (e.g. cancellation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAttestation {
    /// Identifier of the attesting enclave
    pub enclave_id: B256,
    /// Operation name, e.g. `CANCEL`
    pub operation: String,
    /// Unix second of issuance
    pub timestamp: u64,
    /// Hash binding the operation to its subject
    pub data_hash: B256,
    /// Enclave ECDSA signature over the operation message
    pub signature: LockSignature,
}

/// Attestation document returned by the [`Attestor`] capability
///
/// [`Attestor`]: crate::capabilities::Attestor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationDocument {
    /// Raw attestation document bytes (CBOR/COSE from real hardware,
    /// deterministic JSON from the mock)
    pub document: Vec<u8>,
    /// Platform configuration registers, index to hex digest
    pub pcrs: std::collections::BTreeMap<u32, String>,
    /// Measured code identity
    pub code_hash: B256,
    /// False when the document came from the mock fallback
    pub is_real: bool,
}

/// Proof that the enclave is running known code under a fresh key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootAttestation {
    /// Random identifier assigned at boot
    pub enclave_id: B256,
    /// Uncompressed secp256k1 public key, hex encoded
    pub public_key: String,
    /// Address derived from the enclave key
    pub enclave_address: Address,
    /// Unix second the enclave booted
    pub boot_time: u64,
    /// Measured code identity from the attestor
    pub code_hash: B256,
    /// Raw attestation document
    pub attestation_document: Vec<u8>,
    /// Platform configuration registers
    pub pcrs: std::collections::BTreeMap<u32, String>,
    /// False when the document came from the mock fallback
    pub is_real_attestation: bool,
    /// Enclave signature over `keccak(abi.encode(enclaveId, enclaveAddress,
    /// bootTime))`
    pub signature: LockSignature,
}

/// The externally visible, co-signed reservation statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Lock this commitment attests to
    pub lock_id: B256,
    /// Protocol version
    pub version: u32,
    /// Source chain of the reserved asset
    pub chain_id: u64,
    /// The owner's smart account
    pub smart_account: Address,
    /// Reserved asset
    pub locked_asset: AssetIdentifier,
    /// Reserved amount
    #[serde(with = "dec_string")]
    pub locked_amount: U256,
    /// Lock creation time
    pub created_at: u64,
    /// Reservation expiry
    pub expires_at: u64,
    /// `expires_at + settlement_buffer`
    pub settlement_deadline: u64,
    /// Condition the solver must meet
    pub fulfillment_condition: FulfillmentCondition,
    /// Per-owner lock nonce
    #[serde(with = "dec_string")]
    pub nonce: U256,
    /// Merkle root over active lock IDs at issuance
    pub state_root: B256,
    /// `keccak(userSignature)`
    pub user_signature_hash: B256,
    /// Enclave attestation over this commitment
    pub ccm_attestation: CcmAttestation,
}

/// Solver-supplied evidence of destination-chain fulfillment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentProof {
    /// Destination-chain transaction hash
    pub transaction_hash: Vec<u8>,
    /// Block containing the transaction
    pub block_hash: Vec<u8>,
    /// Height of that block
    pub block_number: i64,
}

/// Inputs to `create_lock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLockRequest {
    /// Smart-account address reserving assets
    pub owner: Address,
    /// Asset to reserve
    pub asset: AssetIdentifier,
    /// Amount as a decimal string
    pub amount: String,
    /// Seconds until the reservation lapses
    pub expires_in: u64,
    /// Condition under which the reservation settles
    pub fulfillment: FulfillmentCondition,
    /// Accepted for forward compatibility; signature checks bind to `owner`
    #[serde(default)]
    pub session_key: Option<Address>,
}

/// Typed-data payload the client must sign to activate a lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockApprovalPayload {
    /// Signing domain (chain ID bound to the locked asset)
    pub domain: Eip712Domain,
    /// Struct to sign
    pub message: LockApprovalMessage,
    /// Precomputed EIP-712 digest
    pub digest: B256,
}

/// Result of `create_lock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLockResponse {
    /// Identifier of the new lock
    pub lock_id: B256,
    /// Always `Pending`
    pub status: LockStatus,
    /// Assigned per-owner nonce
    #[serde(with = "dec_string")]
    pub nonce: U256,
    /// Creation time
    pub locked_at: u64,
    /// Reservation expiry
    pub expires_at: u64,
    /// What the owner must sign
    pub typed_data: LockApprovalPayload,
    /// Deadline for submitting the approval signature
    pub signing_expires_at: u64,
}

/// Result of `sign_lock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignLockResponse {
    /// The activated lock
    pub lock_id: B256,
    /// Always `Active`
    pub status: LockStatus,
    /// The live, co-signed commitment
    pub commitment: Commitment,
}

/// Result of `verify_fulfillment`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillLockResponse {
    /// The fulfilled lock
    pub lock_id: B256,
    /// Always `Fulfilled`
    pub status: LockStatus,
    /// Settlement operation, co-signed and ready for submission
    pub user_operation: crate::settlement::UserOperation,
    /// Fresh commitment snapshot over the fulfilled lock
    pub commitment: Commitment,
}

/// Serde helpers serializing `U256` as a decimal string
pub(crate) mod dec_string {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional decimal-string `U256`
pub(crate) mod dec_string_opt {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        opt.map(|s| U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn usdc_mainnet() -> AssetIdentifier {
        AssetIdentifier::erc20(
            1,
            Address::from_str("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap(),
        )
    }

    #[test]
    fn test_asset_kind_round_trip() {
        for kind in [AssetKind::Native, AssetKind::Erc20, AssetKind::Erc721, AssetKind::Erc1155] {
            assert_eq!(AssetKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(AssetKind::from_u8(9), None);
    }

    #[test]
    fn test_asset_well_formed_rules() {
        assert!(AssetIdentifier::native(1).check_well_formed().is_ok());
        assert!(usdc_mainnet().check_well_formed().is_ok());

        let native_with_contract = AssetIdentifier {
            contract: Some(Address::repeat_byte(0xAA)),
            ..AssetIdentifier::native(1)
        };
        assert!(native_with_contract.check_well_formed().is_err());

        let erc20_without_contract = AssetIdentifier {
            chain_id: 1,
            kind: AssetKind::Erc20,
            contract: None,
            token_id: None,
        };
        assert!(erc20_without_contract.check_well_formed().is_err());
    }

    #[test]
    fn test_asset_hash_stable_and_distinct() {
        assert_eq!(usdc_mainnet().canonical_hash(), usdc_mainnet().canonical_hash());
        assert_ne!(
            usdc_mainnet().canonical_hash(),
            AssetIdentifier::native(1).canonical_hash()
        );
        // the chain ID participates in the hash
        let mut on_l2 = usdc_mainnet();
        on_l2.chain_id = 42161;
        assert_ne!(usdc_mainnet().canonical_hash(), on_l2.canonical_hash());
    }

    #[test]
    fn test_fulfillment_hash_execution_data_sensitivity() {
        let base = FulfillmentCondition {
            target_chain_id: 42161,
            target_asset: AssetIdentifier::native(42161),
            target_amount: U256::from(500_000_000_000_000_000u64),
            recipient: Address::repeat_byte(0x11),
            execution_data: None,
        };
        let mut with_data = base.clone();
        with_data.execution_data = Some(vec![0xDE, 0xAD]);

        assert_ne!(base.canonical_hash(), with_data.canonical_hash());
        // empty calldata hashes differently from absent calldata
        let mut with_empty = base.clone();
        with_empty.execution_data = Some(Vec::new());
        assert_ne!(base.canonical_hash(), with_empty.canonical_hash());
    }

    #[test]
    fn test_lock_id_depends_on_every_input() {
        let owner = Address::repeat_byte(0x11);
        let asset = usdc_mainnet().canonical_hash();
        let amount = U256::from(1_000u64);
        let nonce = U256::from(1u64);

        let base = lock_id(&owner, &asset, &amount, &nonce, 100);
        assert_ne!(base, lock_id(&Address::repeat_byte(0x22), &asset, &amount, &nonce, 100));
        assert_ne!(base, lock_id(&owner, &asset, &U256::from(2_000u64), &nonce, 100));
        assert_ne!(base, lock_id(&owner, &asset, &amount, &U256::from(2u64), 100));
        assert_ne!(base, lock_id(&owner, &asset, &amount, &nonce, 101));
    }

    #[test]
    fn test_status_u8_mapping() {
        assert_eq!(LockStatus::Pending.as_u8(), 0);
        assert_eq!(LockStatus::Cancelled.as_u8(), 5);
        assert_eq!(LockStatus::from_u8(4), Some(LockStatus::Expired));
        assert_eq!(LockStatus::from_u8(6), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!LockStatus::Pending.is_terminal());
        assert!(!LockStatus::Active.is_terminal());
        assert!(LockStatus::Fulfilled.is_terminal());
        assert!(LockStatus::Expired.is_terminal());
        assert!(LockStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let sig = LockSignature([0xABu8; 65]);
        let hex = sig.to_hex();
        assert_eq!(hex.len(), 132); // 0x + 130
        assert_eq!(LockSignature::from_hex(&hex).unwrap(), sig);
    }

    #[test]
    fn test_signature_rejects_wrong_width() {
        // 128 hex chars (64 bytes) must be rejected
        let short = format!("0x{}", "ab".repeat(64));
        assert!(LockSignature::from_hex(&short).is_err());
        assert!(LockSignature::from_slice(&[0u8; 66]).is_err());
    }

    #[test]
    fn test_signature_debug_redacts() {
        let sig = LockSignature([0xCDu8; 65]);
        assert_eq!(format!("{:?}", sig), "LockSignature(65 bytes)");
    }

    #[test]
    fn test_dec_string_serde() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "dec_string")]
            v: U256,
        }

        let json = serde_json::to_string(&Wrapper { v: U256::from(1_000_000_000u64) }).unwrap();
        assert!(json.contains("\"1000000000\""));
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.v, U256::from(1_000_000_000u64));
    }
}
