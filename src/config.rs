//! Configuration for the commitment machine
//!
//! Loaded once at initialization and never mutated afterward. Defaults are
//! sized for an 18-decimal token: the account cap is one million tokens, the
//! single-lock cap one hundred thousand, the daily cap ten million.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Main enclave configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnclaveConfig {
    /// Minimum lock duration in seconds
    pub min_lock_duration: u64,
    /// Maximum lock duration in seconds
    pub max_lock_duration: u64,
    /// Chains assets may be locked on or fulfilled toward
    pub supported_chains: BTreeSet<u64>,
    /// Seconds added to a lock's expiry to compute the settlement deadline
    pub settlement_buffer: u64,
    /// Exposure limits enforced at lock creation
    pub risk_limits: RiskLimits,
}

/// Exposure limits enforced by the commitment engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Cap on the sum of active lock amounts per account
    #[serde(with = "crate::types::dec_string")]
    pub max_total_locked_per_account: U256,
    /// Cap on a single lock's amount
    #[serde(with = "crate::types::dec_string")]
    pub max_single_lock_amount: U256,
    /// Cap on concurrently active locks per account
    pub max_concurrent_locks: usize,
    /// Cap on aggregate locked volume per UTC day
    #[serde(with = "crate::types::dec_string")]
    pub max_daily_volume: U256,
}

fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            min_lock_duration: 30,
            max_lock_duration: 3600,
            supported_chains: [1, 10, 137, 8453, 42161].into_iter().collect(),
            settlement_buffer: 300,
            risk_limits: RiskLimits::default(),
        }
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_total_locked_per_account: tokens(1_000_000),
            max_single_lock_amount: tokens(100_000),
            max_concurrent_locks: 100,
            max_daily_volume: tokens(10_000_000),
        }
    }
}

impl EnclaveConfig {
    /// Validate configuration coherence
    pub fn validate(&self) -> Result<(), String> {
        if self.min_lock_duration == 0 {
            return Err("min_lock_duration must be > 0".into());
        }
        if self.max_lock_duration < self.min_lock_duration {
            return Err("max_lock_duration must be >= min_lock_duration".into());
        }
        if self.supported_chains.is_empty() {
            return Err("supported_chains must not be empty".into());
        }
        self.risk_limits.validate()
    }

    /// Whether a chain ID is inside the supported set
    pub fn supports_chain(&self, chain_id: u64) -> bool {
        self.supported_chains.contains(&chain_id)
    }
}

impl RiskLimits {
    fn validate(&self) -> Result<(), String> {
        if self.max_single_lock_amount.is_zero() {
            return Err("max_single_lock_amount must be > 0".into());
        }
        if self.max_total_locked_per_account < self.max_single_lock_amount {
            return Err("max_total_locked_per_account must be >= max_single_lock_amount".into());
        }
        if self.max_concurrent_locks == 0 {
            return Err("max_concurrent_locks must be > 0".into());
        }
        if self.max_daily_volume < self.max_single_lock_amount {
            return Err("max_daily_volume must be >= max_single_lock_amount".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EnclaveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_lock_duration, 30);
        assert_eq!(config.max_lock_duration, 3600);
        assert_eq!(config.settlement_buffer, 300);
    }

    #[test]
    fn test_default_limits() {
        let limits = RiskLimits::default();
        assert_eq!(limits.max_concurrent_locks, 100);
        assert_eq!(limits.max_single_lock_amount, tokens(100_000));
        assert_eq!(limits.max_daily_volume, tokens(10_000_000));
    }

    #[test]
    fn test_supports_chain() {
        let config = EnclaveConfig::default();
        assert!(config.supports_chain(1));
        assert!(config.supports_chain(42161));
        assert!(!config.supports_chain(999_999));
    }

    #[test]
    fn test_invalid_duration_window() {
        let mut config = EnclaveConfig::default();
        config.max_lock_duration = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_chain_set_rejected() {
        let mut config = EnclaveConfig::default();
        config.supported_chains.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_incoherent_limits_rejected() {
        let mut config = EnclaveConfig::default();
        config.risk_limits.max_total_locked_per_account = U256::from(1u64);
        assert!(config.validate().is_err());
    }
}
