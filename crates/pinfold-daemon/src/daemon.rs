//! The main daemon loop: poll ledger events, dispatch handlers, process the
//! operator-approved queue, persist the cursor, back off on failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use pinfold_api::ModeController;
use pinfold_audit::AuditOrchestrator;
use pinfold_core::config::Mode;
use pinfold_core::error::PinfoldError;
use pinfold_core::events::{ClaimedEvent, ContractEvent, FreedEvent, PinEvent};
use pinfold_core::records::{ClaimRecord, OfferRecord, OfferStatus};
use pinfold_core::traits::{ClaimSubmitter, EventSource, PinExecutor};
use pinfold_core::types::{abbrev, now_ts};
use pinfold_store::StateStore;

use crate::policy::PolicyFilter;

/// Cooperative stop signal for a running daemon.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

pub struct Daemon {
    store: Arc<StateStore>,
    poller: Box<dyn EventSource>,
    filter: PolicyFilter,
    executor: Arc<dyn PinExecutor>,
    submitter: Arc<dyn ClaimSubmitter>,
    mode: Arc<ModeController>,
    audit: Option<Arc<AuditOrchestrator>>,
    poll_interval: Duration,
    error_backoff: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

fn offer_to_event(offer: &OfferRecord) -> PinEvent {
    PinEvent {
        slot: offer.slot,
        cid: offer.cid.clone(),
        filename: offer.filename.clone(),
        gateway: offer.gateway.clone(),
        offer_price: offer.offer_price,
        pin_qty: offer.pin_qty,
        publisher: offer.publisher.clone(),
        ledger_sequence: offer.ledger_sequence,
    }
}

impl Daemon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<StateStore>,
        poller: Box<dyn EventSource>,
        filter: PolicyFilter,
        executor: Arc<dyn PinExecutor>,
        submitter: Arc<dyn ClaimSubmitter>,
        mode: Arc<ModeController>,
        audit: Option<Arc<AuditOrchestrator>>,
        poll_interval: Duration,
        error_backoff: Duration,
    ) -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        let daemon = Self {
            store,
            poller,
            filter,
            executor,
            submitter,
            mode,
            audit,
            poll_interval,
            error_backoff,
            shutdown_rx: rx,
        };
        (daemon, ShutdownHandle { tx })
    }

    /// Restore persisted state and run the main loop until stopped.
    pub async fn run(&mut self) -> Result<(), PinfoldError> {
        if let Some(ledger) = self.store.get_cursor()? {
            self.poller.restore_cursor(ledger);
            info!(ledger, "restored cursor");
        }

        // Resume in the last-chosen mode.
        let runtime_config = self.store.get_runtime_config()?;
        match runtime_config.mode.parse::<Mode>() {
            Ok(mode) => self.mode.set(mode),
            Err(e) => warn!(error = %e, "ignoring persisted mode"),
        }

        self.store
            .log_activity("daemon_started", "Daemon started", None, None, None)?;
        if let Some(audit) = &self.audit {
            audit.start().await;
        }

        info!(mode = %self.mode.get(), "daemon running");
        while !*self.shutdown_rx.borrow() {
            match self.tick().await {
                Ok(()) => self.sleep(self.poll_interval).await,
                Err(e) => {
                    error!(error = %e, "main loop error");
                    let _ = self
                        .store
                        .log_activity("error", &e.to_string(), None, None, None);
                    self.sleep(self.error_backoff).await;
                }
            }
        }

        if let Some(audit) = &self.audit {
            audit.stop().await;
        }
        self.store
            .log_activity("daemon_stopped", "Daemon stopped", None, None, None)?;
        info!("daemon shut down cleanly");
        Ok(())
    }

    /// One loop iteration: poll, dispatch, drain the approved queue, persist
    /// the cursor.
    async fn tick(&mut self) -> Result<(), PinfoldError> {
        let events = self.poller.poll().await?;
        for event in events {
            if let Err(e) = self.dispatch(&event).await {
                error!(slot = event.slot(), error = %e, "event handler failed");
                let _ = self
                    .store
                    .log_activity("error", &e.to_string(), Some(event.slot()), None, None);
            }
        }

        self.process_approved().await?;

        if let Some(ledger) = self.poller.cursor_ledger() {
            self.store.set_cursor(ledger)?;
        }
        Ok(())
    }

    /// Sleep that wakes early on shutdown.
    async fn sleep(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown_rx.changed() => {}
        }
    }

    /// Execute offers the operator approved through the facade.
    pub async fn process_approved(&self) -> Result<(), PinfoldError> {
        for offer in self.store.offers_by_status(OfferStatus::Approved)? {
            let event = offer_to_event(&offer);
            self.execute_pin_and_claim(&event).await?;
        }
        Ok(())
    }

    pub async fn dispatch(&self, event: &ContractEvent) -> Result<(), PinfoldError> {
        match event {
            ContractEvent::Pin(e) => self.handle_pin_event(e).await,
            ContractEvent::Claimed(e) => self.handle_claimed_event(e).await,
            ContractEvent::Freed(e) => self.handle_freed_event(e),
        }
    }

    /// A new offer from a publisher: persist, filter, and route by mode.
    async fn handle_pin_event(&self, event: &PinEvent) -> Result<(), PinfoldError> {
        info!(
            slot = event.slot,
            cid = abbrev(&event.cid, 20),
            price = event.offer_price,
            publisher = abbrev(&event.publisher, 16),
            "PIN event"
        );

        self.store.save_offer(event, OfferStatus::Pending)?;
        self.store.log_activity(
            "offer_seen",
            &format!("PIN offer: slot {}, {} stroops", event.slot, event.offer_price),
            Some(event.slot),
            Some(&event.cid),
            None,
        )?;

        let decision = self.filter.evaluate(event).await;
        if !decision.accepted {
            self.store
                .update_offer_status(event.slot, OfferStatus::Rejected, Some(decision.reason))?;
            self.store.log_activity(
                "offer_rejected",
                &format!("Rejected: {}", decision.reason),
                Some(event.slot),
                None,
                None,
            )?;
            return Ok(());
        }

        if let Some(audit) = &self.audit {
            audit.on_pin_event(event)?;
        }

        if self.mode.get() == Mode::OperatorApproved {
            self.store
                .update_offer_status(event.slot, OfferStatus::AwaitingApproval, None)?;
            self.store.log_activity(
                "offer_queued",
                &format!("Queued for approval: slot {}", event.slot),
                Some(event.slot),
                Some(&event.cid),
                None,
            )?;
            return Ok(());
        }

        self.execute_pin_and_claim(event).await
    }

    /// Another pinner claimed a slot.
    async fn handle_claimed_event(&self, event: &ClaimedEvent) -> Result<(), PinfoldError> {
        info!(
            slot = event.slot,
            claimant = abbrev(&event.claimant, 16),
            remaining = event.pins_remaining,
            "PINNED event"
        );
        self.store.log_activity(
            "slot_claimed",
            &format!(
                "Slot {} claimed by {}..., {} remaining",
                event.slot,
                abbrev(&event.claimant, 16),
                event.pins_remaining
            ),
            Some(event.slot),
            None,
            Some(event.amount),
        )?;

        if let Some(audit) = &self.audit {
            audit.on_claimed_event(event).await?;
        }

        if event.pins_remaining == 0 && self.store.get_offer(event.slot)?.is_some() {
            self.store
                .update_offer_status(event.slot, OfferStatus::Filled, None)?;
        }
        Ok(())
    }

    /// A slot was freed: cancelled, expired, or filled.
    fn handle_freed_event(&self, event: &FreedEvent) -> Result<(), PinfoldError> {
        info!(slot = event.slot, "UNPIN event");

        if let Some(audit) = &self.audit {
            audit.on_freed_event(event)?;
        }

        self.store
            .update_offer_status(event.slot, OfferStatus::Expired, None)?;
        self.store.log_activity(
            "offer_expired",
            &format!("Slot {} freed", event.slot),
            Some(event.slot),
            None,
            None,
        )?;
        Ok(())
    }

    /// Pin the content locally, then submit `collect_pin` on-chain.
    pub async fn execute_pin_and_claim(&self, event: &PinEvent) -> Result<(), PinfoldError> {
        self.store
            .update_offer_status(event.slot, OfferStatus::Pinning, None)?;
        self.store.log_activity(
            "pin_started",
            &format!("Pinning CID: {}", abbrev(&event.cid, 30)),
            Some(event.slot),
            Some(&event.cid),
            None,
        )?;

        let pin = self.executor.pin(&event.cid, &event.gateway).await;
        if !pin.success {
            let reason = pin.error.as_deref().unwrap_or("pin failed");
            self.store
                .update_offer_status(event.slot, OfferStatus::PinFailed, Some(reason))?;
            self.store.log_activity(
                "pin_failed",
                &format!("Pin failed: {reason}"),
                Some(event.slot),
                Some(&event.cid),
                None,
            )?;
            return Ok(());
        }

        self.store.save_pin(&event.cid, event.slot, pin.bytes_pinned)?;
        self.store.log_activity(
            "pin_success",
            &format!(
                "Pinned {} ({} bytes)",
                abbrev(&event.cid, 20),
                pin.bytes_pinned.map_or_else(|| "?".to_string(), |b| b.to_string())
            ),
            Some(event.slot),
            Some(&event.cid),
            None,
        )?;

        self.store
            .update_offer_status(event.slot, OfferStatus::Claiming, None)?;
        let claim = self.submitter.submit_claim(event.slot).await;

        if claim.success {
            // The contract pays the slot's offer price.
            self.store.save_claim(&ClaimRecord {
                slot: event.slot,
                cid: event.cid.clone(),
                amount_earned: event.offer_price,
                tx_id: claim.tx_id.unwrap_or_default(),
                claimed_at: now_ts(),
            })?;
            self.store
                .update_offer_status(event.slot, OfferStatus::Claimed, None)?;
            self.store.log_activity(
                "claim_success",
                &format!("Claimed slot {}: +{} stroops", event.slot, event.offer_price),
                Some(event.slot),
                Some(&event.cid),
                Some(event.offer_price),
            )?;
        } else {
            let reason = claim.error.as_deref().unwrap_or("claim failed");
            self.store
                .update_offer_status(event.slot, OfferStatus::ClaimFailed, Some(reason))?;
            self.store.log_activity(
                "claim_failed",
                &format!("Claim failed: {reason}"),
                Some(event.slot),
                Some(&event.cid),
                None,
            )?;
        }
        Ok(())
    }
}
