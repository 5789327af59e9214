//! Serialization-ready snapshots assembled by the data facade for UI clients.

use serde::Serialize;

use crate::constants::format_xlm;
use crate::records::{ActivityRecord, EarningsSummary, OfferRecord, PinRecord};
use crate::types::{Amount, SlotId, Timestamp};

#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub address: String,
    pub balance_stroops: Amount,
    pub balance_xlm: String,
    /// Enough headroom for at least one more transaction after the next one.
    pub can_cover_tx: bool,
    pub estimated_tx_fee: Amount,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EarningsSnapshot {
    pub total_earned_stroops: Amount,
    pub total_earned_xlm: String,
    pub earned_24h_stroops: Amount,
    pub earned_7d_stroops: Amount,
    pub earned_30d_stroops: Amount,
    pub claims_count: u64,
    pub average_per_claim_stroops: Amount,
}

impl From<EarningsSummary> for EarningsSnapshot {
    fn from(e: EarningsSummary) -> Self {
        let average = if e.claims_count > 0 {
            e.total_earned / e.claims_count
        } else {
            0
        };
        Self {
            total_earned_stroops: e.total_earned,
            total_earned_xlm: format_xlm(e.total_earned),
            earned_24h_stroops: e.earned_24h,
            earned_7d_stroops: e.earned_7d,
            earned_30d_stroops: e.earned_30d,
            claims_count: e.claims_count,
            average_per_claim_stroops: average,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferSnapshot {
    pub slot: SlotId,
    pub cid: String,
    pub filename: String,
    pub gateway: String,
    pub offer_price: Amount,
    pub offer_price_xlm: String,
    pub pin_qty: u32,
    pub pins_remaining: u32,
    pub publisher: String,
    pub status: String,
    pub reject_reason: Option<String>,
    pub net_profit: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&OfferRecord> for OfferSnapshot {
    fn from(o: &OfferRecord) -> Self {
        Self {
            slot: o.slot,
            cid: o.cid.clone(),
            filename: o.filename.clone(),
            gateway: o.gateway.clone(),
            offer_price: o.offer_price,
            offer_price_xlm: format_xlm(o.offer_price),
            pin_qty: o.pin_qty,
            pins_remaining: o.pins_remaining,
            publisher: o.publisher.clone(),
            status: o.status.to_string(),
            reject_reason: o.reject_reason.clone(),
            net_profit: o.net_profit.unwrap_or(0),
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PinSnapshot {
    pub cid: String,
    pub slot: Option<SlotId>,
    pub bytes_pinned: Option<u64>,
    pub pinned_at: Timestamp,
}

impl From<&PinRecord> for PinSnapshot {
    fn from(p: &PinRecord) -> Self {
        Self {
            cid: p.cid.clone(),
            slot: p.slot,
            bytes_pinned: p.bytes_pinned,
            pinned_at: p.pinned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp: Timestamp,
    pub event_type: String,
    pub slot: Option<SlotId>,
    pub cid: Option<String>,
    pub amount: Option<Amount>,
    pub message: String,
}

impl From<&ActivityRecord> for ActivityEntry {
    fn from(a: &ActivityRecord) -> Self {
        Self {
            timestamp: a.created_at,
            event_type: a.event_type.clone(),
            slot: a.slot,
            cid: a.cid.clone(),
            amount: a.amount,
            message: a.message.clone(),
        }
    }
}

/// Audit subsystem status for the dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub enabled: bool,
    pub total_tracked_pins: u64,
    pub tracking_count: u64,
    pub verified_count: u64,
    pub suspect_count: u64,
    pub flagged_count: u64,
    pub total_checks_lifetime: u64,
    pub total_flags_lifetime: u64,
    pub bounties_earned_stroops: Amount,
    pub last_cycle_at: Option<Timestamp>,
    pub next_cycle_at: Option<Timestamp>,
    pub cycle_interval_seconds: u64,
}

/// Complete agent state in one serializable object.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub mode: String,
    pub agent_address: String,
    pub uptime_seconds: u64,

    pub wallet: WalletSnapshot,

    pub offers_seen: u64,
    pub offers_rejected: u64,
    pub offers_awaiting_approval: u64,
    pub pins_active: u64,
    pub claims_completed: u64,

    pub earnings: EarningsSnapshot,

    pub approval_queue: Vec<OfferSnapshot>,
    pub recent_activity: Vec<ActivityEntry>,

    pub audit: Option<AuditSummary>,
}
