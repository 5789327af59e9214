//! Persisted records and component operation results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, SlotId, Timestamp};

// ── Offer lifecycle ──────────────────────────────────────────────────────────

/// Offer state machine. Transitions are driven by the daemon loop and the
/// facade; a `FreedEvent` may override any non-terminal state with `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    AwaitingApproval,
    Approved,
    Rejected,
    Pinning,
    PinFailed,
    Claiming,
    ClaimFailed,
    Claimed,
    Filled,
    Expired,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::AwaitingApproval => "awaiting_approval",
            OfferStatus::Approved => "approved",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Pinning => "pinning",
            OfferStatus::PinFailed => "pin_failed",
            OfferStatus::Claiming => "claiming",
            OfferStatus::ClaimFailed => "claim_failed",
            OfferStatus::Claimed => "claimed",
            OfferStatus::Filled => "filled",
            OfferStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A PIN offer as persisted in the state store, keyed by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub slot: SlotId,
    pub cid: String,
    pub filename: String,
    pub gateway: String,
    pub offer_price: Amount,
    pub pin_qty: u32,
    pub pins_remaining: u32,
    pub publisher: String,
    pub ledger_sequence: u64,
    pub status: OfferStatus,
    pub reject_reason: Option<String>,
    pub net_profit: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A CID pinned on our local storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    pub cid: String,
    pub slot: Option<SlotId>,
    pub bytes_pinned: Option<u64>,
    pub pinned_at: Timestamp,
}

/// A completed payment claim (append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub slot: SlotId,
    pub cid: String,
    pub amount_earned: Amount,
    pub tx_id: String,
    pub claimed_at: Timestamp,
}

/// A single activity log entry (append-only, consumed by the facade).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: u64,
    pub event_type: String,
    pub slot: Option<SlotId>,
    pub cid: Option<String>,
    pub amount: Option<Amount>,
    pub message: String,
    pub created_at: Timestamp,
}

/// Aggregated earnings from claims, with wall-clock windowed figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub total_earned: Amount,
    pub earned_24h: Amount,
    pub earned_7d: Amount,
    pub earned_30d: Amount,
    pub claims_count: u64,
}

/// Runtime daemon config persisted so the agent resumes in the last-chosen
/// mode and policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfigRecord {
    pub mode: String,
    pub min_price: Amount,
    pub max_content_size: u64,
}

impl Default for DaemonConfigRecord {
    fn default() -> Self {
        Self {
            mode: crate::config::Mode::Autonomous.as_str().to_string(),
            min_price: crate::constants::DEFAULT_MIN_PRICE,
            max_content_size: crate::constants::DEFAULT_MAX_CONTENT_SIZE,
        }
    }
}

// ── Operation results ────────────────────────────────────────────────────────

/// Outcome of offer evaluation by the policy filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDecision {
    pub accepted: bool,
    /// Stable reason code: "accepted", "price_too_low", "insufficient_xlm",
    /// "slot_not_active", "unprofitable".
    pub reason: &'static str,
    pub slot: SlotId,
    pub offer_price: Amount,
    pub wallet_balance: Amount,
    pub estimated_tx_fee: Amount,
    pub net_profit: i64,
}

/// Result of the fetch → ingest → verify → pin pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinOutcome {
    pub success: bool,
    pub cid: String,
    pub bytes_pinned: Option<u64>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Result of a `collect_pin` transaction submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub success: bool,
    pub slot: SlotId,
    pub amount_earned: Option<Amount>,
    pub tx_id: Option<String>,
    pub error: Option<String>,
}

/// Result of a facade-initiated action, one per requested slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

// ── Ledger query views ───────────────────────────────────────────────────────

/// A slot's current on-chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: SlotId,
    pub cid_digest: String,
    pub publisher: String,
    pub offer_price: Amount,
    pub pin_qty: u32,
    pub pins_remaining: u32,
    pub escrow_balance: Amount,
    pub created_at: Timestamp,
    pub claimants: Vec<String>,
}

/// A participant's on-chain registry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub address: String,
    pub node_id: String,
    pub multiaddr: String,
    pub active: bool,
    pub flags: u32,
    pub min_price: Amount,
    pub pins_completed: u32,
    pub staked: Amount,
    pub joined_at: Timestamp,
}
