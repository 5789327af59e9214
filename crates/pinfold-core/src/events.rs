//! Typed contract events decoded from the ledger event stream.

use serde::{Deserialize, Serialize};

use crate::types::SlotId;

/// Emitted when a publisher creates a pin request (`PIN` topic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinEvent {
    pub slot: SlotId,
    pub cid: String,
    pub filename: String,
    pub gateway: String,
    pub offer_price: u64,
    pub pin_qty: u32,
    pub publisher: String,
    pub ledger_sequence: u64,
}

/// Emitted when a pinner collects payment for a slot (`PINNED` topic).
///
/// Carries only the SHA-256 digest of the CID, not the CID itself; the audit
/// subsystem resolves it back through its tracked-content records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedEvent {
    pub slot: SlotId,
    pub cid_digest: String,
    pub claimant: String,
    pub amount: u64,
    pub pins_remaining: u32,
    pub ledger_sequence: u64,
}

/// Emitted when a slot is freed: cancelled, expired, or filled (`UNPIN` topic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreedEvent {
    pub slot: SlotId,
    pub cid_digest: String,
    pub ledger_sequence: u64,
}

/// Closed union of the contract events the agent consumes. Unknown topics are
/// dropped at decode time, never surfaced as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    Pin(PinEvent),
    Claimed(ClaimedEvent),
    Freed(FreedEvent),
}

impl ContractEvent {
    pub fn slot(&self) -> SlotId {
        match self {
            ContractEvent::Pin(e) => e.slot,
            ContractEvent::Claimed(e) => e.slot,
            ContractEvent::Freed(e) => e.slot,
        }
    }

    pub fn ledger_sequence(&self) -> u64 {
        match self {
            ContractEvent::Pin(e) => e.ledger_sequence,
            ContractEvent::Claimed(e) => e.ledger_sequence,
            ContractEvent::Freed(e) => e.ledger_sequence,
        }
    }
}
