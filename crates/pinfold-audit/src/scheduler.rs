//! Verification scheduler: periodic, bounded-concurrency sweeps across all
//! tracked pins, driving status transitions and dispute submission.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use pinfold_core::audit::{CycleReport, FlagRecord, TrackedPin, TrackingStatus};
use pinfold_core::error::PinfoldError;
use pinfold_core::traits::{ContentVerifier, DisputeSubmitter};
use pinfold_core::types::{abbrev, now_ts, Timestamp};
use pinfold_store::{StateStore, TrackedPinUpdate};

use crate::registry::ParticipantCache;

/// Statuses eligible for verification; flagged and freed pairs are left
/// alone.
const ACTIVE_STATUSES: [TrackingStatus; 3] = [
    TrackingStatus::Tracking,
    TrackingStatus::Verified,
    TrackingStatus::Suspect,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOutcome {
    Passed,
    Failed,
    Flagged,
    Skipped,
    Error,
}

/// The per-pin check logic, shared by value with every task a cycle spawns.
struct CycleWorker {
    store: Arc<StateStore>,
    verifier: Arc<dyn ContentVerifier>,
    registry: Arc<ParticipantCache>,
    disputes: Arc<dyn DisputeSubmitter>,
    failure_threshold: u32,
}

pub struct VerificationScheduler {
    worker: Arc<CycleWorker>,
    cycle_interval: u64,
    max_concurrent: usize,
    next_cycle: AtomicI64,
}

impl VerificationScheduler {
    pub fn new(
        store: Arc<StateStore>,
        verifier: Arc<dyn ContentVerifier>,
        registry: Arc<ParticipantCache>,
        disputes: Arc<dyn DisputeSubmitter>,
        cycle_interval: u64,
        max_concurrent: usize,
        failure_threshold: u32,
    ) -> Self {
        Self {
            worker: Arc::new(CycleWorker {
                store,
                verifier,
                registry,
                disputes,
                failure_threshold,
            }),
            cycle_interval,
            max_concurrent,
            next_cycle: AtomicI64::new(0),
        }
    }

    /// Informational estimate of the next cycle start.
    pub fn next_cycle_at(&self) -> Option<Timestamp> {
        match self.next_cycle.load(Ordering::Relaxed) {
            0 => None,
            ts => Some(ts),
        }
    }

    /// Run one full verification cycle. Cycles are strictly sequential; pins
    /// within a cycle are checked concurrently up to the configured bound,
    /// and no pin's outcome depends on another's.
    pub async fn run_cycle(&self) -> Result<CycleReport, PinfoldError> {
        let started_at = now_ts();
        let clock = Instant::now();

        let pins = self.worker.store.tracked_pins(Some(&ACTIVE_STATUSES))?;
        let total_checked = pins.len() as u32;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        for pin in pins {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                worker.check_pin(pin).await
            });
        }

        let mut report = CycleReport {
            started_at,
            total_checked,
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(CheckOutcome::Passed) => report.passed += 1,
                Ok(CheckOutcome::Failed) => report.failed += 1,
                Ok(CheckOutcome::Flagged) => report.flagged += 1,
                Ok(CheckOutcome::Skipped) => report.skipped += 1,
                Ok(CheckOutcome::Error) => report.errors += 1,
                Err(e) => {
                    error!(error = %e, "verification task panicked");
                    report.errors += 1;
                }
            }
        }

        report.completed_at = now_ts();
        report.duration_ms = clock.elapsed().as_millis() as u64;
        self.next_cycle
            .store(now_ts() + self.cycle_interval as i64, Ordering::Relaxed);

        let id = self.worker.store.save_cycle(report.clone())?;
        report.id = id;
        info!(
            checked = report.total_checked,
            passed = report.passed,
            failed = report.failed,
            flagged = report.flagged,
            duration_ms = report.duration_ms,
            "verification cycle complete"
        );
        Ok(report)
    }
}

impl CycleWorker {
    async fn check_pin(&self, pin: TrackedPin) -> CheckOutcome {
        let now = now_ts();

        if pin.status == TrackingStatus::FlagSubmitted {
            return CheckOutcome::Skipped;
        }

        let Some(participant) = self.registry.get(&pin.claimant).await else {
            warn!(claimant = abbrev(&pin.claimant, 16), "no participant record, skipping");
            return CheckOutcome::Skipped;
        };
        if !participant.active {
            debug!(claimant = abbrev(&pin.claimant, 16), "participant inactive, skipping");
            return CheckOutcome::Skipped;
        }

        let result = self
            .verifier
            .verify(&pin.cid, &participant.node_id, &participant.multiaddr)
            .await;

        if let Err(e) = self.store.record_verification(&pin.cid, &pin.claimant, &result) {
            error!(cid = abbrev(&pin.cid, 16), error = %e, "failed to record verification");
            return CheckOutcome::Error;
        }

        if result.passed {
            let update = TrackedPinUpdate {
                status: Some(TrackingStatus::Verified),
                consecutive_failures: Some(0),
                last_verified_at: Some(now),
                last_checked_at: Some(now),
                ..Default::default()
            };
            if let Err(e) = self.store.update_tracked_pin(&pin.cid, &pin.claimant, update) {
                error!(cid = abbrev(&pin.cid, 16), error = %e, "failed to update tracked pin");
                return CheckOutcome::Error;
            }
            return CheckOutcome::Passed;
        }

        let new_failures = pin.consecutive_failures + 1;
        let new_status = if new_failures >= self.failure_threshold {
            TrackingStatus::Suspect
        } else {
            pin.status
        };
        let update = TrackedPinUpdate {
            status: Some(new_status),
            consecutive_failures: Some(new_failures),
            last_checked_at: Some(now),
            ..Default::default()
        };
        if let Err(e) = self.store.update_tracked_pin(&pin.cid, &pin.claimant, update) {
            error!(cid = abbrev(&pin.cid, 16), error = %e, "failed to update tracked pin");
            return CheckOutcome::Error;
        }

        if new_failures >= self.failure_threshold && pin.status != TrackingStatus::FlagSubmitted {
            match self.disputes.has_already_disputed(&pin.claimant).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Some(outcome) = self.try_dispute(&pin, now).await {
                        return outcome;
                    }
                }
                Err(e) => {
                    warn!(claimant = abbrev(&pin.claimant, 16), error = %e, "flag history check failed");
                }
            }
        }
        CheckOutcome::Failed
    }

    /// Submit a dispute for a pin that crossed the failure threshold.
    /// Returns `Some(Flagged)` on success; on failure the tracked-pin status
    /// is left as-is so the next cycle retries.
    async fn try_dispute(&self, pin: &TrackedPin, now: Timestamp) -> Option<CheckOutcome> {
        let outcome = self.disputes.submit_dispute(&pin.claimant).await;
        if !outcome.success {
            warn!(
                claimant = abbrev(&pin.claimant, 16),
                error = ?outcome.error,
                "dispute submission failed"
            );
            return None;
        }

        let update = TrackedPinUpdate {
            status: Some(TrackingStatus::FlagSubmitted),
            flagged_at: Some(now),
            flag_tx_id: outcome.tx_id.clone(),
            ..Default::default()
        };
        if let Err(e) = self.store.update_tracked_pin(&pin.cid, &pin.claimant, update) {
            error!(cid = abbrev(&pin.cid, 16), error = %e, "failed to mark pin flagged");
        }
        if let Err(e) = self.store.save_flag(FlagRecord {
            id: 0,
            claimant: pin.claimant.clone(),
            tx_id: outcome.tx_id.unwrap_or_default(),
            flag_count_after: outcome.flag_count,
            bounty_earned: outcome.bounty_earned,
            submitted_at: now,
        }) {
            error!(claimant = abbrev(&pin.claimant, 16), error = %e, "failed to record flag");
        }
        info!(
            claimant = abbrev(&pin.claimant, 16),
            cid = abbrev(&pin.cid, 16),
            "claimant flagged"
        );
        Some(CheckOutcome::Flagged)
    }
}
