//! Audit orchestrator: ingests ledger events relevant to auditing, owns the
//! scheduler task, and exposes manual operations to the facade.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use pinfold_core::audit::{
    CycleReport, DisputeOutcome, FlagRecord, TrackedContent, TrackedPin, TrackingStatus,
    VerificationResult,
};
use pinfold_core::config::AuditConfig;
use pinfold_core::error::PinfoldError;
use pinfold_core::events::{ClaimedEvent, FreedEvent, PinEvent};
use pinfold_core::snapshots::AuditSummary;
use pinfold_core::traits::{ContentVerifier, DisputeSubmitter, LedgerReader};
use pinfold_core::types::{abbrev, now_ts};
use pinfold_store::{StateStore, TrackedPinUpdate};

use crate::registry::ParticipantCache;
use crate::scheduler::VerificationScheduler;

pub struct AuditOrchestrator {
    store: Arc<StateStore>,
    registry: Arc<ParticipantCache>,
    verifier: Arc<dyn ContentVerifier>,
    disputes: Arc<dyn DisputeSubmitter>,
    scheduler: Arc<VerificationScheduler>,
    config: AuditConfig,
    our_address: String,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AuditOrchestrator {
    /// Wire the audit subsystem in dependency order: cache and verifier feed
    /// the scheduler, the scheduler drives disputes.
    pub fn new(
        store: Arc<StateStore>,
        queries: Arc<dyn LedgerReader>,
        verifier: Arc<dyn ContentVerifier>,
        disputes: Arc<dyn DisputeSubmitter>,
        config: AuditConfig,
        our_address: &str,
    ) -> Self {
        let registry = Arc::new(ParticipantCache::new(
            Arc::clone(&store),
            queries,
            config.participant_cache_ttl,
        ));
        let scheduler = Arc::new(VerificationScheduler::new(
            Arc::clone(&store),
            Arc::clone(&verifier),
            Arc::clone(&registry),
            Arc::clone(&disputes),
            config.cycle_interval,
            config.max_concurrent,
            config.failure_threshold,
        ));
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            registry,
            verifier,
            disputes,
            scheduler,
            config,
            our_address: our_address.to_string(),
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Spawn the periodic scheduler task. A single cycle failure is logged
    /// and does not stop auditing.
    pub async fn start(&self) {
        if !self.config.enabled {
            info!("auditing is disabled");
            return;
        }
        let scheduler = Arc::clone(&self.scheduler);
        let interval = std::time::Duration::from_secs(self.config.cycle_interval);
        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = scheduler.run_cycle().await {
                    error!(error = %e, "verification cycle error");
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        *self.task.lock().await = Some(handle);
        info!(
            cycle_interval = self.config.cycle_interval,
            failure_threshold = self.config.failure_threshold,
            "audit scheduler started"
        );
    }

    /// Cancel the scheduler task cooperatively and await it.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        info!("audit scheduler stopped");
    }

    // ── Event ingestion ──────────────────────────────────────────────────────

    /// Track content we published. Offers from other publishers are not our
    /// audit concern.
    pub fn on_pin_event(&self, event: &PinEvent) -> Result<(), PinfoldError> {
        if event.publisher != self.our_address {
            return Ok(());
        }
        self.store.save_tracked_content(&TrackedContent {
            cid: event.cid.clone(),
            cid_digest: pinfold_core::types::cid_digest(&event.cid),
            slot: event.slot,
            publisher: event.publisher.clone(),
            gateway: Some(event.gateway.clone()),
            pin_qty: event.pin_qty,
            created_at: now_ts(),
        })?;
        info!(cid = abbrev(&event.cid, 20), slot = event.slot, "tracking published content");
        Ok(())
    }

    /// Register a claimant for verification when a slot we track is claimed.
    ///
    /// CLAIMED events carry only the CID digest; the tracked content is
    /// matched by slot to sidestep digest-encoding differences.
    pub async fn on_claimed_event(&self, event: &ClaimedEvent) -> Result<(), PinfoldError> {
        let Some(participant) = self.registry.get(&event.claimant).await else {
            debug!(
                claimant = abbrev(&event.claimant, 16),
                "no participant record, not tracking claim"
            );
            return Ok(());
        };
        let Some(content) = self.store.tracked_content_by_slot(event.slot)? else {
            return Ok(());
        };

        let pin = TrackedPin::new(
            content.cid.clone(),
            event.claimant.clone(),
            participant.node_id,
            participant.multiaddr,
            event.slot,
            now_ts(),
        );
        self.store.save_tracked_pin(&pin)?;
        info!(
            claimant = abbrev(&event.claimant, 16),
            cid = abbrev(&content.cid, 20),
            slot = event.slot,
            "tracking claimant"
        );
        Ok(())
    }

    /// Stop verifying pairs whose slot was freed. Already-flagged pairs keep
    /// their terminal status.
    pub fn on_freed_event(&self, event: &FreedEvent) -> Result<(), PinfoldError> {
        for pin in self.store.tracked_pins(None)? {
            if pin.slot == event.slot && pin.status != TrackingStatus::FlagSubmitted {
                self.store.update_tracked_pin(
                    &pin.cid,
                    &pin.claimant,
                    TrackedPinUpdate {
                        status: Some(TrackingStatus::SlotFreed),
                        ..Default::default()
                    },
                )?;
            }
        }
        debug!(slot = event.slot, "stopped tracking freed slot");
        Ok(())
    }

    // ── Manual operations ────────────────────────────────────────────────────

    /// One-shot verification of tracked pairs, optionally narrowed to a CID
    /// and/or claimant.
    pub async fn verify_now(
        &self,
        cid: Option<&str>,
        claimant: Option<&str>,
    ) -> Result<Vec<VerificationResult>, PinfoldError> {
        let pins = self.store.tracked_pins(Some(&[
            TrackingStatus::Tracking,
            TrackingStatus::Verified,
            TrackingStatus::Suspect,
        ]))?;

        let mut results = Vec::new();
        for pin in pins {
            if cid.is_some_and(|c| c != pin.cid) || claimant.is_some_and(|a| a != pin.claimant) {
                continue;
            }
            let Some(participant) = self.registry.get(&pin.claimant).await else {
                continue;
            };
            let result = self
                .verifier
                .verify(&pin.cid, &participant.node_id, &participant.multiaddr)
                .await;
            self.store.record_verification(&pin.cid, &pin.claimant, &result)?;
            results.push(result);
        }
        Ok(results)
    }

    /// Manually dispute a claimant, bypassing the failure threshold.
    pub async fn dispute_now(&self, claimant: &str) -> DisputeOutcome {
        self.disputes.submit_dispute(claimant).await
    }

    // ── State queries (for the facade) ───────────────────────────────────────

    pub fn tracked_pins(&self) -> Result<Vec<TrackedPin>, PinfoldError> {
        self.store.tracked_pins(None)
    }

    pub fn suspects(&self) -> Result<Vec<TrackedPin>, PinfoldError> {
        self.store.tracked_pins(Some(&[TrackingStatus::Suspect]))
    }

    pub fn flag_history(&self) -> Result<Vec<FlagRecord>, PinfoldError> {
        self.store.flag_history()
    }

    pub fn cycle_history(&self, limit: usize) -> Result<Vec<CycleReport>, PinfoldError> {
        self.store.cycle_history(limit)
    }

    pub fn summary(&self) -> Result<AuditSummary, PinfoldError> {
        let pins = self.store.tracked_pins(None)?;
        let flags = self.store.flag_history()?;
        let last_cycle = self.store.cycle_history(1)?;

        let count = |status: TrackingStatus| {
            pins.iter().filter(|p| p.status == status).count() as u64
        };

        Ok(AuditSummary {
            enabled: self.config.enabled,
            total_tracked_pins: pins.len() as u64,
            tracking_count: count(TrackingStatus::Tracking),
            verified_count: count(TrackingStatus::Verified),
            suspect_count: count(TrackingStatus::Suspect),
            flagged_count: count(TrackingStatus::FlagSubmitted),
            total_checks_lifetime: pins.iter().map(|p| p.total_checks as u64).sum(),
            total_flags_lifetime: flags.len() as u64,
            bounties_earned_stroops: flags.iter().filter_map(|f| f.bounty_earned).sum(),
            last_cycle_at: last_cycle.first().map(|c| c.completed_at),
            next_cycle_at: self.scheduler.next_cycle_at(),
            cycle_interval_seconds: self.config.cycle_interval,
        })
    }

    /// Direct scheduler access for tests and the facade's manual cycle
    /// trigger.
    pub fn scheduler(&self) -> &Arc<VerificationScheduler> {
        &self.scheduler
    }
}
