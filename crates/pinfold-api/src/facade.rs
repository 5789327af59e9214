//! Data facade: assembles serialization-ready snapshots from the store plus
//! one live balance query, and applies operator actions.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use pinfold_audit::AuditOrchestrator;
use pinfold_core::config::{Mode, PolicyParams};
use pinfold_core::constants::ESTIMATED_TX_FEE;
use pinfold_core::error::PinfoldError;
use pinfold_core::records::{ActionOutcome, OfferStatus};
use pinfold_core::snapshots::{
    ActivityEntry, DashboardSnapshot, EarningsSnapshot, OfferSnapshot, PinSnapshot, WalletSnapshot,
};
use pinfold_core::traits::LedgerReader;
use pinfold_core::types::SlotId;
use pinfold_store::StateStore;

use crate::mode::ModeController;

pub struct DataFacade {
    store: Arc<StateStore>,
    queries: Arc<dyn LedgerReader>,
    mode: Arc<ModeController>,
    policy: Arc<PolicyParams>,
    audit: Option<Arc<AuditOrchestrator>>,
    our_address: String,
    started: Instant,
}

impl DataFacade {
    pub fn new(
        store: Arc<StateStore>,
        queries: Arc<dyn LedgerReader>,
        mode: Arc<ModeController>,
        policy: Arc<PolicyParams>,
        audit: Option<Arc<AuditOrchestrator>>,
        our_address: &str,
    ) -> Self {
        Self {
            store,
            queries,
            mode,
            policy,
            audit,
            our_address: our_address.to_string(),
            started: Instant::now(),
        }
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    pub async fn dashboard(&self) -> Result<DashboardSnapshot, PinfoldError> {
        let wallet = self.wallet().await;
        let earnings = self.earnings()?;
        let all_offers = self.store.all_offers()?;
        let queue = self.store.approval_queue()?;
        let pins = self.store.all_pins()?;
        let activity = self.store.recent_activity(20)?;
        let audit = match &self.audit {
            Some(orchestrator) => Some(orchestrator.summary()?),
            None => None,
        };

        Ok(DashboardSnapshot {
            mode: self.mode.get().to_string(),
            agent_address: self.our_address.clone(),
            uptime_seconds: self.started.elapsed().as_secs(),
            offers_seen: all_offers.len() as u64,
            offers_rejected: all_offers
                .iter()
                .filter(|o| o.status == OfferStatus::Rejected)
                .count() as u64,
            offers_awaiting_approval: queue.len() as u64,
            pins_active: pins.len() as u64,
            claims_completed: earnings.claims_count,
            wallet,
            earnings,
            approval_queue: queue.iter().map(OfferSnapshot::from).collect(),
            recent_activity: activity.iter().map(ActivityEntry::from).collect(),
            audit,
        })
    }

    pub fn offers(&self, status: Option<OfferStatus>) -> Result<Vec<OfferSnapshot>, PinfoldError> {
        let offers = match status {
            Some(s) => self.store.offers_by_status(s)?,
            None => self.store.all_offers()?,
        };
        Ok(offers.iter().map(OfferSnapshot::from).collect())
    }

    pub fn approval_queue(&self) -> Result<Vec<OfferSnapshot>, PinfoldError> {
        Ok(self
            .store
            .approval_queue()?
            .iter()
            .map(OfferSnapshot::from)
            .collect())
    }

    pub fn earnings(&self) -> Result<EarningsSnapshot, PinfoldError> {
        Ok(self.store.earnings()?.into())
    }

    pub fn pins(&self) -> Result<Vec<PinSnapshot>, PinfoldError> {
        Ok(self.store.all_pins()?.iter().map(PinSnapshot::from).collect())
    }

    pub async fn wallet(&self) -> WalletSnapshot {
        let balance = self.queries.wallet_balance(&self.our_address).await;
        WalletSnapshot {
            address: self.our_address.clone(),
            balance_stroops: balance,
            balance_xlm: pinfold_core::constants::format_xlm(balance),
            can_cover_tx: balance >= ESTIMATED_TX_FEE * 2,
            estimated_tx_fee: ESTIMATED_TX_FEE,
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    /// Approve queued offers. Refuses any slot whose current status is not
    /// `awaiting_approval`, reporting that status back.
    pub fn approve_offers(&self, slots: &[SlotId]) -> Result<Vec<ActionOutcome>, PinfoldError> {
        let mut results = Vec::with_capacity(slots.len());
        for &slot in slots {
            let Some(offer) = self.store.get_offer(slot)? else {
                results.push(ActionOutcome::err(format!("slot {slot} not found")));
                continue;
            };
            if offer.status != OfferStatus::AwaitingApproval {
                results.push(ActionOutcome::err(format!(
                    "slot {slot} status is '{}', not awaiting_approval",
                    offer.status
                )));
                continue;
            }
            self.store
                .update_offer_status(slot, OfferStatus::Approved, None)?;
            self.store.log_activity(
                "offer_approved",
                &format!("Approved slot {slot}"),
                Some(slot),
                Some(&offer.cid),
                None,
            )?;
            results.push(ActionOutcome::ok(format!("slot {slot} approved")));
        }
        Ok(results)
    }

    pub fn reject_offers(&self, slots: &[SlotId]) -> Result<Vec<ActionOutcome>, PinfoldError> {
        let mut results = Vec::with_capacity(slots.len());
        for &slot in slots {
            let Some(offer) = self.store.get_offer(slot)? else {
                results.push(ActionOutcome::err(format!("slot {slot} not found")));
                continue;
            };
            self.store
                .update_offer_status(slot, OfferStatus::Rejected, Some("operator_rejected"))?;
            self.store.log_activity(
                "offer_rejected",
                &format!("Rejected slot {slot}"),
                Some(slot),
                Some(&offer.cid),
                None,
            )?;
            results.push(ActionOutcome::ok(format!("slot {slot} rejected")));
        }
        Ok(results)
    }

    /// Switch the operating mode, persist it, and log the change. Setting the
    /// mode it already has is a no-op for persistence and logging.
    pub fn set_mode(&self, mode_str: &str) -> Result<ActionOutcome, PinfoldError> {
        let mode: Mode = match mode_str.parse() {
            Ok(mode) => mode,
            Err(e) => return Ok(ActionOutcome::err(e.to_string())),
        };
        if self.mode.get() == mode {
            return Ok(ActionOutcome::ok(format!("mode already {mode}")));
        }
        self.mode.set(mode);
        self.store.set_runtime_config(Some(mode.as_str()), None, None)?;
        self.store
            .log_activity("mode_changed", &format!("Mode set to {mode}"), None, None, None)?;
        Ok(ActionOutcome::ok(format!("mode set to {mode}")))
    }

    /// Update the runtime policy values the filter reads, and persist them.
    pub fn update_policy(
        &self,
        min_price: Option<u64>,
        max_content_size: Option<u64>,
    ) -> Result<ActionOutcome, PinfoldError> {
        let mut parts = Vec::new();
        if let Some(price) = min_price {
            self.policy.set_min_price(price);
            parts.push(format!("min_price={price}"));
        }
        if let Some(size) = max_content_size {
            self.policy.set_max_content_size(size);
            parts.push(format!("max_content_size={size}"));
        }
        if parts.is_empty() {
            return Ok(ActionOutcome::err("nothing to update"));
        }
        self.store
            .set_runtime_config(None, min_price, max_content_size)?;
        let message = format!("Policy updated: {}", parts.join(", "));
        self.store
            .log_activity("policy_updated", &message, None, None, None)?;
        info!(%message, "policy updated");
        Ok(ActionOutcome::ok(message))
    }
}
