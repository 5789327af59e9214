//! Audit-subsystem models: tracked content, tracked pins, verification
//! results, cycle reports, and dispute records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PinfoldError;
use crate::types::{Amount, SlotId, Timestamp};

// ── Tracking state ───────────────────────────────────────────────────────────

/// Content we published and therefore audit. Created when a `PinEvent` whose
/// publisher is our own address is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedContent {
    pub cid: String,
    pub cid_digest: String,
    pub slot: SlotId,
    pub publisher: String,
    pub gateway: Option<String>,
    pub pin_qty: u32,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Tracking,
    Verified,
    Suspect,
    FlagSubmitted,
    SlotFreed,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Tracking => "tracking",
            TrackingStatus::Verified => "verified",
            TrackingStatus::Suspect => "suspect",
            TrackingStatus::FlagSubmitted => "flag_submitted",
            TrackingStatus::SlotFreed => "slot_freed",
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (CID, claimant) pair under periodic verification, keyed by both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPin {
    pub cid: String,
    pub claimant: String,
    pub claimant_node_id: String,
    pub claimant_multiaddr: String,
    pub slot: SlotId,
    pub claimed_at: Timestamp,
    pub last_verified_at: Option<Timestamp>,
    pub last_checked_at: Option<Timestamp>,
    pub consecutive_failures: u32,
    pub total_checks: u32,
    pub total_failures: u32,
    pub status: TrackingStatus,
    pub flagged_at: Option<Timestamp>,
    pub flag_tx_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TrackedPin {
    pub fn new(
        cid: String,
        claimant: String,
        claimant_node_id: String,
        claimant_multiaddr: String,
        slot: SlotId,
        claimed_at: Timestamp,
    ) -> Self {
        Self {
            cid,
            claimant,
            claimant_node_id,
            claimant_multiaddr,
            slot,
            claimed_at,
            last_verified_at: None,
            last_checked_at: None,
            consecutive_failures: 0,
            total_checks: 0,
            total_failures: 0,
            status: TrackingStatus::Tracking,
            flagged_at: None,
            flag_tx_id: None,
            created_at: claimed_at,
            updated_at: claimed_at,
        }
    }
}

// ── Verification ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMethod {
    ProviderAdvertisement,
    BlockExchange,
    PartialRetrieval,
}

impl VerifyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyMethod::ProviderAdvertisement => "provider_advertisement",
            VerifyMethod::BlockExchange => "block_exchange",
            VerifyMethod::PartialRetrieval => "partial_retrieval",
        }
    }
}

impl fmt::Display for VerifyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerifyMethod {
    type Err = PinfoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider_advertisement" => Ok(VerifyMethod::ProviderAdvertisement),
            "block_exchange" => Ok(VerifyMethod::BlockExchange),
            "partial_retrieval" => Ok(VerifyMethod::PartialRetrieval),
            other => Err(PinfoldError::UnknownVerifyMethod(other.to_string())),
        }
    }
}

/// Result from a single verification method.
///
/// `passed` is three-valued: `Some(true)` / `Some(false)` are definitive,
/// `None` is inconclusive (the method could not prove either way).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodOutcome {
    pub method: VerifyMethod,
    pub passed: Option<bool>,
    pub detail: String,
    pub duration_ms: u64,
}

/// Composite result from the full verification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub cid: String,
    pub claimant_node_id: String,
    pub passed: bool,
    /// Method that produced the terminating outcome, or "none".
    pub method_used: String,
    pub methods_attempted: Vec<MethodOutcome>,
    pub duration_ms: u64,
    pub checked_at: Timestamp,
}

/// A persisted verification check (append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLogEntry {
    pub id: u64,
    pub cid: String,
    pub claimant: String,
    pub passed: bool,
    pub method_used: String,
    pub methods_attempted: Vec<MethodOutcome>,
    pub duration_ms: u64,
    pub checked_at: Timestamp,
}

/// Results from a single verification cycle (append-only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub id: u64,
    pub started_at: Timestamp,
    pub completed_at: Timestamp,
    pub total_checked: u32,
    pub passed: u32,
    pub failed: u32,
    pub flagged: u32,
    pub skipped: u32,
    pub errors: u32,
    pub duration_ms: u64,
}

// ── Disputes ─────────────────────────────────────────────────────────────────

/// Result of a `flag_pinner` transaction submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeOutcome {
    pub success: bool,
    pub claimant: String,
    /// The claimant's flag count after ours, when the contract reports it.
    pub flag_count: Option<u32>,
    pub tx_id: Option<String>,
    pub bounty_earned: Option<Amount>,
    pub error: Option<String>,
}

/// Historical record of a dispute we submitted (append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub id: u64,
    pub claimant: String,
    pub tx_id: String,
    pub flag_count_after: Option<u32>,
    pub bounty_earned: Option<Amount>,
    pub submitted_at: Timestamp,
}

// ── Participant cache ────────────────────────────────────────────────────────

/// Cached on-chain participant data needed for verification, TTL-bounded by
/// the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedParticipant {
    pub address: String,
    pub node_id: String,
    pub multiaddr: String,
    pub active: bool,
    pub cached_at: Timestamp,
}
