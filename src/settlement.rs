//! Settlement operation construction
//!
//! Given a fulfilled lock, builds the ERC-4337-style `UserOperation` that
//! drives the owner's smart account to transfer the reserved asset to the
//! fulfillment recipient. The operation carries a 130-byte composite
//! signature: the owner's lock approval followed by the enclave's signature
//! over the user-operation hash. The account's on-chain validator checks
//! both halves before releasing funds.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::crypto::abi::AbiEncoder;
use crate::crypto::hashing::keccak256;
use crate::error::{CcmError, CcmResult};
use crate::identity::EnclaveIdentity;
use crate::types::{AssetKind, ResourceLock};

/// Canonical ERC-4337 EntryPoint address
pub const ENTRY_POINT: Address = Address::new([
    0x5f, 0xf1, 0x37, 0xd4, 0xb0, 0xfd, 0xcd, 0x49, 0xdc, 0xa3, 0x0c, 0x7c, 0xf5, 0x7e, 0x57,
    0x8a, 0x02, 0x6d, 0x27, 0x89,
]);

/// Selector of the smart account's `execute(address,uint256,bytes)`
pub const EXECUTE_SELECTOR: [u8; 4] = [0xb6, 0x1d, 0x27, 0xf6];

/// Selector of ERC-20 `transfer(address,uint256)`
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

// Development gas defaults; production bundlers re-estimate before inclusion.
const CALL_GAS_LIMIT: u64 = 100_000;
const VERIFICATION_GAS_LIMIT: u64 = 100_000;
const PRE_VERIFICATION_GAS: u64 = 21_000;
const MAX_FEE_PER_GAS: u64 = 1_000_000_000;
const MAX_PRIORITY_FEE_PER_GAS: u64 = 1_000_000_000;

/// An ERC-4337 user operation ready for bundler submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOperation {
    /// The smart account executing the settlement
    pub sender: Address,
    /// Operation nonce (the lock's nonce in this revision)
    #[serde(with = "crate::types::dec_string")]
    pub nonce: U256,
    /// Account deployment code; always empty here
    pub init_code: Vec<u8>,
    /// Calldata driving the account's `execute`
    pub call_data: Vec<u8>,
    /// Gas for the execution call
    #[serde(with = "crate::types::dec_string")]
    pub call_gas_limit: U256,
    /// Gas for signature validation
    #[serde(with = "crate::types::dec_string")]
    pub verification_gas_limit: U256,
    /// Gas paid to the bundler before verification
    #[serde(with = "crate::types::dec_string")]
    pub pre_verification_gas: U256,
    /// Fee cap in wei per gas
    #[serde(with = "crate::types::dec_string")]
    pub max_fee_per_gas: U256,
    /// Priority fee cap in wei per gas
    #[serde(with = "crate::types::dec_string")]
    pub max_priority_fee_per_gas: U256,
    /// Paymaster data; always empty here
    pub paymaster_and_data: Vec<u8>,
    /// 130 bytes: owner approval signature ‖ enclave signature
    pub signature: Vec<u8>,
}

/// Build and co-sign the settlement operation for a fulfilled lock
///
/// Fails with [`CcmError::Internal`] if the lock never received its owner
/// signature, and [`CcmError::UnsupportedAssetKind`] for asset kinds the
/// settlement path cannot express.
pub fn build_user_operation(
    lock: &ResourceLock,
    identity: &EnclaveIdentity,
) -> CcmResult<UserOperation> {
    let user_signature = lock
        .user_signature
        .ok_or_else(|| CcmError::Internal("settlement requires a signed lock".into()))?;

    let mut op = UserOperation {
        sender: lock.owner,
        nonce: lock.nonce,
        init_code: Vec::new(),
        call_data: build_call_data(lock)?,
        call_gas_limit: U256::from(CALL_GAS_LIMIT),
        verification_gas_limit: U256::from(VERIFICATION_GAS_LIMIT),
        pre_verification_gas: U256::from(PRE_VERIFICATION_GAS),
        max_fee_per_gas: U256::from(MAX_FEE_PER_GAS),
        max_priority_fee_per_gas: U256::from(MAX_PRIORITY_FEE_PER_GAS),
        paymaster_and_data: Vec::new(),
        signature: Vec::new(),
    };

    let op_hash = user_operation_hash(&op, &ENTRY_POINT, lock.asset.chain_id);
    let ccm_signature = identity.sign_digest(&op_hash)?;

    let mut signature = Vec::with_capacity(130);
    signature.extend_from_slice(user_signature.as_bytes());
    signature.extend_from_slice(ccm_signature.as_bytes());
    op.signature = signature;

    Ok(op)
}

/// Calldata for the account's `execute(address,uint256,bytes)`
fn build_call_data(lock: &ResourceLock) -> CcmResult<Vec<u8>> {
    let recipient = lock.fulfillment.recipient;

    match lock.asset.kind {
        AssetKind::Native => Ok(encode_execute(&recipient, &lock.amount, &[])),
        AssetKind::Erc20 => {
            let contract = lock
                .asset
                .contract
                .ok_or_else(|| CcmError::Internal("erc20 lock without contract".into()))?;

            let mut inner = ERC20_TRANSFER_SELECTOR.to_vec();
            let mut args = AbiEncoder::new();
            args.address(&recipient);
            args.uint256(&lock.amount);
            inner.extend_from_slice(&args.finish());

            Ok(encode_execute(&contract, &U256::ZERO, &inner))
        }
        kind => Err(CcmError::UnsupportedAssetKind(kind)),
    }
}

fn encode_execute(target: &Address, value: &U256, data: &[u8]) -> Vec<u8> {
    let mut call = EXECUTE_SELECTOR.to_vec();
    let mut args = AbiEncoder::new();
    args.address(target);
    args.uint256(value);
    args.trailing_bytes(data);
    call.extend_from_slice(&args.finish());
    call
}

/// The double hash the enclave co-signs
///
/// Inner: `keccak(abi.encode(sender, nonce, keccak(initCode),
/// keccak(callData), callGasLimit, verificationGasLimit, preVerificationGas,
/// maxFeePerGas, maxPriorityFeePerGas, keccak(paymasterAndData)))`.
/// Outer: `keccak(abi.encode(inner, entryPoint, chainId))`.
pub fn user_operation_hash(op: &UserOperation, entry_point: &Address, chain_id: u64) -> B256 {
    let mut inner = AbiEncoder::new();
    inner.address(&op.sender);
    inner.uint256(&op.nonce);
    inner.bytes32(&keccak256(&op.init_code));
    inner.bytes32(&keccak256(&op.call_data));
    inner.uint256(&op.call_gas_limit);
    inner.uint256(&op.verification_gas_limit);
    inner.uint256(&op.pre_verification_gas);
    inner.uint256(&op.max_fee_per_gas);
    inner.uint256(&op.max_priority_fee_per_gas);
    inner.bytes32(&keccak256(&op.paymaster_and_data));

    let mut outer = AbiEncoder::new();
    outer.bytes32(&inner.hash());
    outer.address(entry_point);
    outer.uint64(chain_id);
    outer.hash()
}
