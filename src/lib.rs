//! # Credible Commitment Machine
//!
//! TEE-resident signing oracle that issues cryptographically binding
//! commitments reserving a user's on-chain assets for a specific cross-chain
//! fulfillment. A solver who observes a valid commitment can front the
//! corresponding assets on the destination chain, knowing the machine will
//! later co-sign a settlement operation draining the reserved assets to the
//! solver, or that the reservation lapses back to the user if fulfillment
//! never happens.
//!
//! ## Architecture
//!
//! The crate is the in-enclave core, composed of sub-modules in strict
//! dependency order:
//!
//! 1. **crypto** - keccak-256, secp256k1 ECDSA with Ethereum recovery,
//!    deterministic ABI encoding, EIP-712 hashing
//! 2. **merkle** - binary Merkle index over active lock IDs
//! 3. **types** - the lock data model and its canonical hashes
//! 4. **identity** - ephemeral enclave key, enclave ID, boot attestation
//! 5. **engine** - the commitment state machine:
//!    `create_lock → sign_lock → (verify_fulfillment | cancel_lock | expiry)`
//! 6. **settlement** - ERC-4337 user-operation construction and co-signing
//!
//! Transport, attestation hardware, and on-chain contracts are external
//! collaborators: the engine consumes them through the capability traits in
//! [`capabilities`] and produces bytes matching their expected encodings.
//!
//! ## Security Model
//!
//! - The enclave private key is generated at initialization, zeroized on
//!   drop, and never leaves the [`engine::CommitmentEngine`]; only the
//!   derived address and public key are observable.
//! - Every mutating operation is an atomic critical section: it succeeds
//!   with all invariants intact or fails without touching state.
//! - All state is volatile. A restart means a new key, a new enclave ID, and
//!   an empty lock table; commitments do not survive the enclave that
//!   signed them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ccm_enclave::{CommitmentEngine, EnclaveConfig};
//!
//! let engine = CommitmentEngine::initialize(EnclaveConfig::default())?;
//! let boot = engine.generate_boot_attestation()?;
//! println!("enclave {} ready", boot.enclave_address);
//! # Ok::<(), ccm_enclave::CcmError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod capabilities;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod identity;
pub mod merkle;
pub mod settlement;
pub mod types;

pub use capabilities::{
    Attestor, FormatVerifier, FulfillmentVerifier, ManualClock, MockAttestor, OsRandom,
    SecureRandom, SecureTime, SystemClock,
};
pub use config::{EnclaveConfig, RiskLimits};
pub use engine::CommitmentEngine;
pub use error::{CcmError, CcmResult, RiskLimit};
pub use identity::EnclaveIdentity;
pub use merkle::MerkleIndex;
pub use settlement::{UserOperation, ENTRY_POINT};
pub use types::{
    AppAttestation, AssetIdentifier, AssetKind, AttestationDocument, BootAttestation,
    CcmAttestation, Commitment, CreateLockRequest, CreateLockResponse, FulfillLockResponse,
    FulfillmentCondition, FulfillmentProof, LockApprovalPayload, LockSignature, LockStatus,
    ResourceLock, SignLockResponse, PROTOCOL_VERSION,
};
