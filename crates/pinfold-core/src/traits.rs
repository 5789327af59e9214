//! Async protocols between the daemon and its collaborators.
//!
//! The daemon, audit subsystem, and facade are written against these traits
//! so the integration tests can substitute in-memory fakes for the network
//! components.

use async_trait::async_trait;

use crate::audit::{DisputeOutcome, VerificationResult};
use crate::error::PinfoldError;
use crate::events::ContractEvent;
use crate::records::{ClaimOutcome, ParticipantInfo, PinOutcome, SlotInfo};
use crate::types::{Amount, SlotId};

/// Paginated source of contract events with a resumable cursor.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch events observed since the last call, in ledger order.
    /// A transport error aborts the poll; the cursor is not advanced.
    async fn poll(&mut self) -> Result<Vec<ContractEvent>, PinfoldError>;

    /// Ledger sequence of the last observed event, for persistence.
    fn cursor_ledger(&self) -> Option<u64>;

    /// Restore the cursor from a persisted ledger sequence.
    fn restore_cursor(&mut self, ledger: u64);
}

/// Read-only contract and account lookups. Every call is a simulation; any
/// RPC error surfaces as `None` (or zero for the balance) so callers treat
/// "unknown" conservatively.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn wallet_balance(&self, address: &str) -> Amount;
    async fn slot(&self, slot: SlotId) -> Option<SlotInfo>;
    async fn is_slot_expired(&self, slot: SlotId) -> Option<bool>;
    async fn participant(&self, address: &str) -> Option<ParticipantInfo>;
    async fn join_fee(&self) -> Option<Amount>;
    async fn stake_amount(&self) -> Option<Amount>;
}

/// Fetches content from a publisher gateway into the local storage node and
/// pins it there.
#[async_trait]
pub trait PinExecutor: Send + Sync {
    async fn pin(&self, cid: &str, gateway: &str) -> PinOutcome;
    async fn verify_pinned(&self, cid: &str) -> bool;
    /// Idempotent; "not pinned" counts as success.
    async fn unpin(&self, cid: &str) -> bool;
}

/// Submits `collect_pin` transactions.
#[async_trait]
pub trait ClaimSubmitter: Send + Sync {
    async fn submit_claim(&self, slot: SlotId) -> ClaimOutcome;
}

/// Submits `flag_pinner` transactions.
#[async_trait]
pub trait DisputeSubmitter: Send + Sync {
    async fn submit_dispute(&self, claimant: &str) -> DisputeOutcome;

    /// Whether our local flag history already records a dispute against the
    /// claimant. Consulted before simulating to avoid wasted RPC round-trips.
    async fn has_already_disputed(&self, claimant: &str) -> Result<bool, PinfoldError>;
}

/// Probes whether a claimant's node is actually serving a CID.
#[async_trait]
pub trait ContentVerifier: Send + Sync {
    async fn verify(&self, cid: &str, node_id: &str, multiaddr: &str) -> VerificationResult;
}
