//! Commitment engine - the lock state machine
//!
//! The single long-lived stateful component of the machine. It owns the
//! enclave identity, enforces risk limits, assigns per-owner nonces, drives
//! every lock through `Pending → Active → (Fulfilled | Cancelled | Expired)`,
//! and keeps the Merkle index over active lock IDs in step with every
//! transition.
//!
//! Each externally invoked operation is one atomic critical section over the
//! whole state behind a single `RwLock`: it either succeeds with all
//! invariants holding, or fails without mutating anything. The one deliberate
//! exception is `verify_fulfillment`'s lazy `Expired` transition, which is
//! idempotent.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use alloy_primitives::{Address, B256, U256};

use crate::capabilities::{
    Attestor, FormatVerifier, FulfillmentVerifier, MockAttestor, OsRandom, SecureRandom,
    SecureTime, SystemClock,
};
use crate::config::EnclaveConfig;
use crate::crypto::abi::AbiEncoder;
use crate::crypto::eip712::Eip712Domain;
use crate::crypto::hashing::keccak256;
use crate::crypto::signing::recover_address;
use crate::error::{CcmError, CcmResult, RiskLimit};
use crate::identity::EnclaveIdentity;
use crate::merkle::MerkleIndex;
use crate::settlement;
use crate::types::{
    lock_id, AppAttestation, AssetIdentifier, BootAttestation, CcmAttestation, Commitment,
    CreateLockRequest, CreateLockResponse, FulfillLockResponse, FulfillmentProof,
    LockApprovalPayload, LockSignature, LockStatus, ResourceLock, SignLockResponse,
    PROTOCOL_VERSION,
};

/// Seconds a client has to return the approval signature after `create_lock`
const SIGNING_WINDOW_SECS: u64 = 30;

const SECONDS_PER_DAY: u64 = 86_400;

/// All volatile enclave state; created at init, destroyed at shutdown
struct EnclaveState {
    /// Every lock this enclave has issued, by ID
    locks: BTreeMap<B256, ResourceLock>,
    /// Last nonce assigned per owner
    nonces: BTreeMap<Address, U256>,
    /// Cumulative locked volume per day (secure time / 86400)
    daily_volume: BTreeMap<u64, U256>,
    /// Merkle index over active lock IDs
    merkle: MerkleIndex,
    /// Cached root of `merkle`
    state_root: B256,
}

/// The commitment engine
///
/// Process-singleton by convention: create one with
/// [`CommitmentEngine::initialize`] and share it behind an `Arc`. The enclave
/// private key is owned exclusively by this component and is never exported;
/// the only key material that leaves is the derived address and public key.
pub struct CommitmentEngine {
    config: EnclaveConfig,
    identity: EnclaveIdentity,
    time: Arc<dyn SecureTime>,
    random: Arc<dyn SecureRandom>,
    attestor: Arc<dyn Attestor>,
    verifier: Arc<dyn FulfillmentVerifier>,
    state: RwLock<EnclaveState>,
}

impl CommitmentEngine {
    /// Initialize with default host capabilities
    ///
    /// Generates a fresh enclave key and identity; see
    /// [`CommitmentEngine::initialize_with`] for capability injection.
    pub fn initialize(config: EnclaveConfig) -> CcmResult<Self> {
        Self::initialize_with(
            config,
            Arc::new(SystemClock),
            Arc::new(OsRandom),
            Arc::new(MockAttestor),
            Arc::new(FormatVerifier),
        )
    }

    /// Initialize with explicit capabilities
    pub fn initialize_with(
        config: EnclaveConfig,
        time: Arc<dyn SecureTime>,
        random: Arc<dyn SecureRandom>,
        attestor: Arc<dyn Attestor>,
        verifier: Arc<dyn FulfillmentVerifier>,
    ) -> CcmResult<Self> {
        config.validate().map_err(CcmError::Config)?;

        let identity = EnclaveIdentity::generate(random.as_ref(), time.as_ref())?;

        Ok(Self {
            config,
            identity,
            time,
            random,
            attestor,
            verifier,
            state: RwLock::new(EnclaveState {
                locks: BTreeMap::new(),
                nonces: BTreeMap::new(),
                daily_volume: BTreeMap::new(),
                merkle: MerkleIndex::new(),
                state_root: B256::ZERO,
            }),
        })
    }

    // =========================================================================
    // LOCK LIFECYCLE
    // =========================================================================

    /// Create a new lock in `Pending` state
    ///
    /// Validation runs in a fixed order - asset, amount, duration, risk
    /// limits, target asset - and the first failure aborts with no state
    /// mutated. On success the owner receives the typed data to sign within
    /// the signing window.
    pub fn create_lock(&self, request: &CreateLockRequest) -> CcmResult<CreateLockResponse> {
        let amount = parse_amount(&request.amount)?;

        // 1. Source asset must be coherent and on a supported chain
        self.check_asset(&request.asset)?;

        // 2. Amount bounds
        if amount.is_zero() {
            return Err(CcmError::AmountOutOfRange("amount must be greater than zero".into()));
        }
        if amount > self.config.risk_limits.max_single_lock_amount {
            return Err(CcmError::AmountOutOfRange(format!(
                "amount exceeds single-lock cap of {}",
                self.config.risk_limits.max_single_lock_amount
            )));
        }

        // 3. Duration window
        if request.expires_in < self.config.min_lock_duration
            || request.expires_in > self.config.max_lock_duration
        {
            return Err(CcmError::DurationOutOfRange {
                requested: request.expires_in,
                min: self.config.min_lock_duration,
                max: self.config.max_lock_duration,
            });
        }

        let mut state = self.write_state()?;
        let now = self.time.now();

        // 4. Risk limits over currently active exposure
        self.check_risk(&state, &request.owner, &amount, now)?;

        // 5. Target asset follows the same rules as the source asset
        self.check_asset(&request.fulfillment.target_asset)?;

        // All checks passed; mutate.
        let nonce = {
            let next = state.nonces.entry(request.owner).or_insert(U256::ZERO);
            *next += U256::from(1u64);
            *next
        };

        let locked_at = now;
        let expires_at = now + request.expires_in;
        let asset_hash = request.asset.canonical_hash();
        let id = lock_id(&request.owner, &asset_hash, &amount, &nonce, locked_at);

        let lock = ResourceLock {
            id,
            owner: request.owner,
            asset: request.asset.clone(),
            amount,
            locked_at,
            expires_at,
            nonce,
            fulfillment: request.fulfillment.clone(),
            status: LockStatus::Pending,
            user_signature: None,
            ccm_signature: None,
        };

        let domain = Eip712Domain::commitment_machine(lock.asset.chain_id);
        let message = lock.approval_message();
        let digest = message.signing_digest(&domain);

        state.locks.insert(id, lock);

        tracing::info!(lock_id = %id, owner = %request.owner, %nonce, "lock created");

        Ok(CreateLockResponse {
            lock_id: id,
            status: LockStatus::Pending,
            nonce,
            locked_at,
            expires_at,
            typed_data: LockApprovalPayload { domain, message, digest },
            signing_expires_at: now + SIGNING_WINDOW_SECS,
        })
    }

    /// Activate a pending lock with the owner's approval signature
    ///
    /// The EIP-712 digest is recomputed from the stored lock fields, never
    /// from client-supplied data. On a recovery mismatch the lock stays
    /// `Pending` and will be reaped at its expiry.
    pub fn sign_lock(
        &self,
        lock_id: B256,
        user_signature: &LockSignature,
    ) -> CcmResult<SignLockResponse> {
        let mut state = self.write_state()?;
        let now = self.time.now();

        let lock = state.locks.get(&lock_id).cloned().ok_or(CcmError::LockNotFound)?;
        if lock.status != LockStatus::Pending {
            return Err(CcmError::InvalidLockStatus { actual: lock.status });
        }

        let domain = Eip712Domain::commitment_machine(lock.asset.chain_id);
        let digest = lock.approval_message().signing_digest(&domain);
        let recovered = recover_address(&digest, user_signature.as_bytes())?;
        if recovered != lock.owner {
            tracing::warn!(lock_id = %lock_id, owner = %lock.owner, "approval signature does not recover to owner");
            return Err(CcmError::InvalidSignature);
        }

        // Exposure may have grown since creation through other activations;
        // re-check so the risk invariants hold over the active set after
        // every operation. On breach the lock stays Pending and is reaped at
        // its expiry.
        self.check_risk(&state, &lock.owner, &lock.amount, now)?;

        let attestation = self.issue_attestation(&lock, now)?;
        let amount = lock.amount;

        let lock = state
            .locks
            .get_mut(&lock_id)
            .ok_or_else(|| CcmError::Internal("lock vanished mid-operation".into()))?;
        lock.user_signature = Some(*user_signature);
        lock.ccm_signature = Some(attestation.signature);
        lock.status = LockStatus::Active;
        let snapshot = lock.clone();

        state.merkle.add_leaf(lock_id);
        state.state_root = state.merkle.root();

        let day = now / SECONDS_PER_DAY;
        let volume = state.daily_volume.entry(day).or_default();
        *volume = volume.saturating_add(amount);

        let commitment = self.build_commitment(&snapshot, state.state_root, attestation)?;

        tracing::info!(lock_id = %lock_id, state_root = %state.state_root, "lock activated");

        Ok(SignLockResponse {
            lock_id,
            status: LockStatus::Active,
            commitment,
        })
    }

    /// Verify a solver's fulfillment proof and issue the settlement operation
    ///
    /// An expired lock is lazily transitioned to `Expired` here; that is the
    /// only state change this operation makes on a failure path.
    pub fn verify_fulfillment(
        &self,
        lock_id: B256,
        proof: &FulfillmentProof,
    ) -> CcmResult<FulfillLockResponse> {
        let mut state = self.write_state()?;
        let now = self.time.now();

        let lock = state.locks.get(&lock_id).cloned().ok_or(CcmError::LockNotFound)?;
        if lock.status != LockStatus::Active {
            return Err(CcmError::InvalidLockStatus { actual: lock.status });
        }

        if now > lock.expires_at {
            let stored = state
                .locks
                .get_mut(&lock_id)
                .ok_or_else(|| CcmError::Internal("lock vanished mid-operation".into()))?;
            stored.status = LockStatus::Expired;
            state.merkle.remove_leaf(&lock_id);
            state.state_root = state.merkle.root();
            tracing::warn!(lock_id = %lock_id, expires_at = lock.expires_at, "fulfillment after expiry; lock reaped");
            return Err(CcmError::LockExpired);
        }

        self.verifier.verify(&lock, proof).map_err(|e| match e {
            CcmError::VerifierFailed(_) => e,
            other => CcmError::VerifierFailed(other.to_string()),
        })?;

        let stored = state
            .locks
            .get_mut(&lock_id)
            .ok_or_else(|| CcmError::Internal("lock vanished mid-operation".into()))?;
        stored.status = LockStatus::Fulfilled;
        let snapshot = stored.clone();

        state.merkle.remove_leaf(&lock_id);
        state.state_root = state.merkle.root();

        let user_operation = settlement::build_user_operation(&snapshot, &self.identity)?;
        let attestation = self.issue_attestation(&snapshot, now)?;
        let commitment = self.build_commitment(&snapshot, state.state_root, attestation)?;

        tracing::info!(lock_id = %lock_id, "lock fulfilled; settlement operation issued");

        Ok(FulfillLockResponse {
            lock_id,
            status: LockStatus::Fulfilled,
            user_operation,
            commitment,
        })
    }

    /// Cancel a pending or active lock on the owner's signed request
    ///
    /// The cancellation message is `keccak(abi.encode(lockId, "CANCEL"))`;
    /// the returned attestation countersigns that same message.
    pub fn cancel_lock(
        &self,
        lock_id: B256,
        user_signature: &LockSignature,
    ) -> CcmResult<AppAttestation> {
        let mut state = self.write_state()?;
        let now = self.time.now();

        let lock = state.locks.get(&lock_id).ok_or(CcmError::LockNotFound)?;
        if !matches!(lock.status, LockStatus::Pending | LockStatus::Active) {
            return Err(CcmError::InvalidLockStatus { actual: lock.status });
        }

        let digest = lock.cancellation_digest();
        let recovered = recover_address(&digest, user_signature.as_bytes())?;
        if recovered != lock.owner {
            tracing::warn!(lock_id = %lock_id, "cancellation signature does not recover to owner");
            return Err(CcmError::InvalidSignature);
        }
        let was_active = lock.status == LockStatus::Active;

        let stored = state
            .locks
            .get_mut(&lock_id)
            .ok_or_else(|| CcmError::Internal("lock vanished mid-operation".into()))?;
        stored.status = LockStatus::Cancelled;

        if was_active {
            state.merkle.remove_leaf(&lock_id);
            state.state_root = state.merkle.root();
        }

        let mut enc = AbiEncoder::new();
        enc.bytes32(&lock_id);
        enc.uint8(LockStatus::Cancelled.as_u8());
        let data_hash = enc.hash();

        let signature = self.identity.sign_digest(&digest)?;

        tracing::info!(lock_id = %lock_id, was_active, "lock cancelled");

        Ok(AppAttestation {
            enclave_id: self.identity.enclave_id(),
            operation: "CANCEL".into(),
            timestamp: now,
            data_hash,
            signature,
        })
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Reap expired locks; safe to call on any cadence
    ///
    /// Active locks past expiry transition to `Expired` and leave the Merkle
    /// index. Pending locks past expiry never activated and are dropped
    /// outright. Returns the number of locks reaped.
    pub fn cleanup_expired_locks(&self) -> CcmResult<usize> {
        let mut state = self.write_state()?;
        let now = self.time.now();

        let expired: Vec<B256> = state
            .locks
            .values()
            .filter(|l| l.status == LockStatus::Active && now > l.expires_at)
            .map(|l| l.id)
            .collect();
        for id in &expired {
            if let Some(lock) = state.locks.get_mut(id) {
                lock.status = LockStatus::Expired;
            }
            state.merkle.remove_leaf(id);
        }
        if !expired.is_empty() {
            state.state_root = state.merkle.root();
        }

        let stale: Vec<B256> = state
            .locks
            .values()
            .filter(|l| l.status == LockStatus::Pending && now > l.expires_at)
            .map(|l| l.id)
            .collect();
        for id in &stale {
            state.locks.remove(id);
        }

        let reaped = expired.len() + stale.len();
        if reaped > 0 {
            tracing::info!(expired = expired.len(), stale_pending = stale.len(), "expired locks reaped");
        }
        Ok(reaped)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Fetch a lock by ID
    pub fn lock(&self, id: &B256) -> CcmResult<ResourceLock> {
        let state = self.read_state()?;
        state.locks.get(id).cloned().ok_or(CcmError::LockNotFound)
    }

    /// All active locks for an owner
    pub fn active_locks(&self, owner: &Address) -> CcmResult<Vec<ResourceLock>> {
        let state = self.read_state()?;
        Ok(state
            .locks
            .values()
            .filter(|l| l.owner == *owner && l.status == LockStatus::Active)
            .cloned()
            .collect())
    }

    /// Sum of active lock amounts for an owner over one asset
    pub fn locked_balance(&self, owner: &Address, asset: &AssetIdentifier) -> CcmResult<U256> {
        let asset_hash = asset.canonical_hash();
        let state = self.read_state()?;
        Ok(state
            .locks
            .values()
            .filter(|l| {
                l.owner == *owner
                    && l.status == LockStatus::Active
                    && l.asset.canonical_hash() == asset_hash
            })
            .fold(U256::ZERO, |acc, l| acc.saturating_add(l.amount)))
    }

    /// Current Merkle root over active lock IDs
    pub fn state_root(&self) -> CcmResult<B256> {
        Ok(self.read_state()?.state_root)
    }

    /// Uncompressed enclave public key
    pub fn enclave_public_key(&self) -> Vec<u8> {
        self.identity.public_key_uncompressed()
    }

    /// Address derived from the enclave key
    pub fn enclave_address(&self) -> Address {
        self.identity.address()
    }

    /// This boot's random enclave identifier
    pub fn enclave_id(&self) -> B256 {
        self.identity.enclave_id()
    }

    /// Produce a boot attestation via the attestor capability
    pub fn generate_boot_attestation(&self) -> CcmResult<BootAttestation> {
        self.identity
            .boot_attestation(self.attestor.as_ref(), self.random.as_ref())
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn check_asset(&self, asset: &AssetIdentifier) -> CcmResult<()> {
        if !self.config.supports_chain(asset.chain_id) {
            return Err(CcmError::UnsupportedChain(asset.chain_id));
        }
        asset.check_well_formed()
    }

    fn check_risk(
        &self,
        state: &EnclaveState,
        owner: &Address,
        amount: &U256,
        now: u64,
    ) -> CcmResult<()> {
        let limits = &self.config.risk_limits;

        let mut active_count = 0usize;
        let mut active_total = U256::ZERO;
        for lock in state.locks.values() {
            if lock.owner == *owner && lock.status == LockStatus::Active {
                active_count += 1;
                active_total = active_total.saturating_add(lock.amount);
            }
        }

        if active_count >= limits.max_concurrent_locks {
            return Err(CcmError::RiskLimitExceeded { limit: RiskLimit::Concurrent });
        }

        let projected = active_total
            .checked_add(*amount)
            .ok_or(CcmError::RiskLimitExceeded { limit: RiskLimit::Account })?;
        if projected > limits.max_total_locked_per_account {
            return Err(CcmError::RiskLimitExceeded { limit: RiskLimit::Account });
        }

        let day = now / SECONDS_PER_DAY;
        let volume = state.daily_volume.get(&day).copied().unwrap_or(U256::ZERO);
        let projected_volume = volume
            .checked_add(*amount)
            .ok_or(CcmError::RiskLimitExceeded { limit: RiskLimit::Daily })?;
        if projected_volume > limits.max_daily_volume {
            return Err(CcmError::RiskLimitExceeded { limit: RiskLimit::Daily });
        }

        Ok(())
    }

    /// `commitmentHash = keccak(abi.encode(enclaveId, timestamp, lockDataHash))`
    fn issue_attestation(&self, lock: &ResourceLock, timestamp: u64) -> CcmResult<CcmAttestation> {
        let mut enc = AbiEncoder::new();
        enc.bytes32(&self.identity.enclave_id());
        enc.uint64(timestamp);
        enc.bytes32(&lock.lock_data_hash());
        let commitment_hash = enc.hash();

        let signature = self.identity.sign_digest(&commitment_hash)?;

        Ok(CcmAttestation {
            enclave_id: self.identity.enclave_id(),
            timestamp,
            commitment_hash,
            signature,
        })
    }

    fn build_commitment(
        &self,
        lock: &ResourceLock,
        state_root: B256,
        attestation: CcmAttestation,
    ) -> CcmResult<Commitment> {
        let user_signature = lock
            .user_signature
            .ok_or_else(|| CcmError::Internal("commitment requires a signed lock".into()))?;

        Ok(Commitment {
            lock_id: lock.id,
            version: PROTOCOL_VERSION,
            chain_id: lock.asset.chain_id,
            smart_account: lock.owner,
            locked_asset: lock.asset.clone(),
            locked_amount: lock.amount,
            created_at: lock.locked_at,
            expires_at: lock.expires_at,
            settlement_deadline: lock.expires_at + self.config.settlement_buffer,
            fulfillment_condition: lock.fulfillment.clone(),
            nonce: lock.nonce,
            state_root,
            user_signature_hash: keccak256(user_signature.as_bytes()),
            ccm_attestation: attestation,
        })
    }

    fn read_state(&self) -> CcmResult<RwLockReadGuard<'_, EnclaveState>> {
        self.state
            .read()
            .map_err(|_| CcmError::Internal("state lock poisoned".into()))
    }

    fn write_state(&self) -> CcmResult<RwLockWriteGuard<'_, EnclaveState>> {
        self.state
            .write()
            .map_err(|_| CcmError::Internal("state lock poisoned".into()))
    }
}

fn parse_amount(amount: &str) -> CcmResult<U256> {
    U256::from_str_radix(amount, 10)
        .map_err(|e| CcmError::InvalidParams(format!("invalid decimal amount {:?}: {}", amount, e)))
}
