//! Runtime configuration types shared between the daemon and the audit
//! subsystem.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::audit::VerifyMethod;
use crate::constants::*;
use crate::error::PinfoldError;

/// Operating mode for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Pin and claim accepted offers immediately.
    Autonomous,
    /// Queue accepted offers for operator approval.
    OperatorApproved,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Autonomous => "autonomous",
            Mode::OperatorApproved => "operator_approved",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PinfoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "autonomous" => Ok(Mode::Autonomous),
            "operator_approved" => Ok(Mode::OperatorApproved),
            other => Err(PinfoldError::UnknownMode(other.to_string())),
        }
    }
}

/// Audit subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Seconds between verification cycles.
    pub cycle_interval: u64,
    /// Per-method timeout in seconds.
    pub check_timeout: u64,
    /// Concurrency bound inside one cycle.
    pub max_concurrent: usize,
    /// Consecutive failures before a dispute is submitted.
    pub failure_threshold: u32,
    /// Seconds after a flag before the pair is considered again.
    pub cooldown_after_flag: u64,
    /// Participant cache entry lifetime in seconds.
    pub participant_cache_ttl: u64,
    /// Ordered verification method pipeline.
    pub verification_methods: Vec<VerifyMethod>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cycle_interval: DEFAULT_CYCLE_INTERVAL_SECS,
            check_timeout: DEFAULT_CHECK_TIMEOUT_SECS,
            max_concurrent: DEFAULT_MAX_CONCURRENT_CHECKS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown_after_flag: DEFAULT_COOLDOWN_AFTER_FLAG_SECS,
            participant_cache_ttl: DEFAULT_PARTICIPANT_CACHE_TTL_SECS,
            verification_methods: vec![
                VerifyMethod::ProviderAdvertisement,
                VerifyMethod::BlockExchange,
            ],
        }
    }
}

/// Runtime-tunable policy values, shared between the filter (reader) and the
/// facade (writer). The facade persists every change it applies here.
#[derive(Debug)]
pub struct PolicyParams {
    min_price: AtomicU64,
    max_content_size: AtomicU64,
}

impl PolicyParams {
    pub fn new(min_price: u64, max_content_size: u64) -> Self {
        Self {
            min_price: AtomicU64::new(min_price),
            max_content_size: AtomicU64::new(max_content_size),
        }
    }

    pub fn min_price(&self) -> u64 {
        self.min_price.load(Ordering::Relaxed)
    }

    pub fn set_min_price(&self, value: u64) {
        self.min_price.store(value, Ordering::Relaxed);
    }

    pub fn max_content_size(&self) -> u64 {
        self.max_content_size.load(Ordering::Relaxed)
    }

    pub fn set_max_content_size(&self, value: u64) {
        self.max_content_size.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        for mode in [Mode::Autonomous, Mode::OperatorApproved] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert!("auto".parse::<Mode>().is_err());
    }

    #[test]
    fn default_pipeline_ends_with_block_exchange() {
        let cfg = AuditConfig::default();
        assert_eq!(
            cfg.verification_methods.last(),
            Some(&VerifyMethod::BlockExchange)
        );
    }
}
