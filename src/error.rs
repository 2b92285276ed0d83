//! Error types for the commitment machine core
//!
//! Every failure the engine surfaces is a distinct kind so callers can react
//! programmatically instead of parsing strings. Error messages never contain
//! signature bytes; lock IDs and owner addresses are fair game.

use core::fmt;

use crate::types::{AssetKind, LockStatus};

/// Result type for commitment machine operations
pub type CcmResult<T> = Result<T, CcmError>;

/// Main error type for the commitment machine core
///
/// Validation errors are surfaced before any state mutation. Capability
/// errors likewise leave state untouched, with the single exception of the
/// lazy `Expired` transition behind [`CcmError::LockExpired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CcmError {
    // === Request validation ===

    /// Malformed request field (bad hex, wrong length, unparseable amount)
    InvalidParams(String),

    /// Asset references a chain outside the configured set
    UnsupportedChain(u64),

    /// Asset kind is not handled by this operation
    UnsupportedAssetKind(AssetKind),

    /// Asset tuple is internally inconsistent
    InvalidAsset(String),

    /// Amount is zero or exceeds the single-lock cap
    AmountOutOfRange(String),

    /// Requested lock duration is outside the configured window
    DurationOutOfRange {
        /// Seconds requested by the caller
        requested: u64,
        /// Configured minimum duration
        min: u64,
        /// Configured maximum duration
        max: u64,
    },

    // === Risk limits ===

    /// Creating this lock would breach a risk limit
    RiskLimitExceeded {
        /// Which limit was hit
        limit: RiskLimit,
    },

    // === Lock lifecycle ===

    /// No lock with the given ID
    LockNotFound,

    /// Operation invoked on a lock in the wrong state
    InvalidLockStatus {
        /// The status the lock actually has
        actual: LockStatus,
    },

    /// Signature recovery did not yield the lock owner
    InvalidSignature,

    /// The lock's expiry has passed; it has been transitioned to Expired
    LockExpired,

    // === Injected capabilities ===

    /// The attestor capability failed or timed out
    AttestorUnavailable(String),

    /// The fulfillment verifier rejected the proof
    VerifierFailed(String),

    // === System ===

    /// Configuration rejected at initialization
    Config(String),

    /// Invariant violation; indicates a bug, not a caller error
    Internal(String),
}

/// Sub-reason for a [`CcmError::RiskLimitExceeded`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLimit {
    /// Too many concurrently active locks for this owner
    Concurrent,
    /// Total locked amount for this owner would exceed the account cap
    Account,
    /// Aggregate volume for the current day would exceed the daily cap
    Daily,
}

impl fmt::Display for RiskLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => write!(f, "concurrent"),
            Self::Account => write!(f, "account"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

impl fmt::Display for CcmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParams(msg) => {
                write!(f, "Invalid parameters: {}", msg)
            }
            Self::UnsupportedChain(chain_id) => {
                write!(f, "Chain {} is not supported", chain_id)
            }
            Self::UnsupportedAssetKind(kind) => {
                write!(f, "Asset kind {:?} is not supported for this operation", kind)
            }
            Self::InvalidAsset(msg) => {
                write!(f, "Invalid asset: {}", msg)
            }
            Self::AmountOutOfRange(msg) => {
                write!(f, "Amount out of range: {}", msg)
            }
            Self::DurationOutOfRange { requested, min, max } => {
                write!(
                    f,
                    "Lock duration {}s outside allowed window [{}s, {}s]",
                    requested, min, max
                )
            }
            Self::RiskLimitExceeded { limit } => {
                write!(f, "Risk limit exceeded: {}", limit)
            }
            Self::LockNotFound => {
                write!(f, "Lock not found")
            }
            Self::InvalidLockStatus { actual } => {
                write!(f, "Operation not valid for lock in status {}", actual)
            }
            Self::InvalidSignature => {
                write!(f, "Signature verification failed")
            }
            Self::LockExpired => {
                write!(f, "Lock has expired")
            }
            Self::AttestorUnavailable(msg) => {
                write!(f, "Attestor unavailable: {}", msg)
            }
            Self::VerifierFailed(msg) => {
                write!(f, "Fulfillment verification failed: {}", msg)
            }
            Self::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            Self::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CcmError {}

impl CcmError {
    /// Stable machine-readable kind string for transport layers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "INVALID_PARAMS",
            Self::UnsupportedChain(_) => "UNSUPPORTED_CHAIN",
            Self::UnsupportedAssetKind(_) => "UNSUPPORTED_ASSET_KIND",
            Self::InvalidAsset(_) => "INVALID_ASSET",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            Self::DurationOutOfRange { .. } => "DURATION_OUT_OF_RANGE",
            Self::RiskLimitExceeded { .. } => "RISK_LIMIT_EXCEEDED",
            Self::LockNotFound => "LOCK_NOT_FOUND",
            Self::InvalidLockStatus { .. } => "INVALID_LOCK_STATUS",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::LockExpired => "LOCK_EXPIRED",
            Self::AttestorUnavailable(_) => "ATTESTOR_UNAVAILABLE",
            Self::VerifierFailed(_) => "VERIFIER_FAILED",
            Self::Config(_) => "CONFIG",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if this error came from request validation (state untouched)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidParams(_)
                | Self::UnsupportedChain(_)
                | Self::UnsupportedAssetKind(_)
                | Self::InvalidAsset(_)
                | Self::AmountOutOfRange(_)
                | Self::DurationOutOfRange { .. }
                | Self::RiskLimitExceeded { .. }
        )
    }

    /// Check if this error indicates a potentially forged or replayed request
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::InvalidLockStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = CcmError::DurationOutOfRange {
            requested: 10,
            min: 30,
            max: 3600,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("30"));
        assert!(msg.contains("3600"));
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(
            CcmError::RiskLimitExceeded { limit: RiskLimit::Daily }.kind(),
            "RISK_LIMIT_EXCEEDED"
        );
        assert_eq!(CcmError::LockNotFound.kind(), "LOCK_NOT_FOUND");
    }

    #[test]
    fn test_validation_detection() {
        assert!(CcmError::UnsupportedChain(999).is_validation());
        assert!(!CcmError::InvalidSignature.is_validation());
    }

    #[test]
    fn test_suspicious_detection() {
        assert!(CcmError::InvalidSignature.is_suspicious());
        assert!(!CcmError::LockNotFound.is_suspicious());
    }
}
