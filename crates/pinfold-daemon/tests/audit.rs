//! Audit subsystem scenarios: track → verify → suspect → flag lifecycle,
//! freed-slot handling, and dispute idempotence.

mod common;

use common::*;

use pinfold_core::audit::TrackingStatus;
use pinfold_core::events::ContractEvent;
use std::sync::atomic::Ordering;

fn audit_harness(failure_threshold: u32) -> Harness {
    build(HarnessOptions {
        audit: Some(audit_config(failure_threshold)),
        ..Default::default()
    })
}

/// Publish a slot as ourselves and observe another pinner claiming it,
/// leaving one tracked pin in `tracking` state.
async fn track_one_pair(h: &Harness, slot: u64) -> String {
    let event = pin_event(slot, 1_000_000, OUR_ADDRESS);
    h.daemon
        .dispatch(&ContractEvent::Pin(event.clone()))
        .await
        .unwrap();
    h.daemon
        .dispatch(&ContractEvent::Claimed(claimed_event(
            slot,
            &event.cid,
            OTHER_CLAIMANT,
            2,
        )))
        .await
        .unwrap();
    event.cid
}

// ── Tracking ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn own_published_content_is_tracked() {
    let h = audit_harness(3);
    let cid = track_one_pair(&h, 19).await;

    let tracked = h.store.tracked_pins(None).unwrap();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].cid, cid);
    assert_eq!(tracked[0].claimant, OTHER_CLAIMANT);
    assert_eq!(tracked[0].claimant_node_id, OTHER_NODE_ID);
    assert_eq!(tracked[0].status, TrackingStatus::Tracking);
}

#[tokio::test]
async fn foreign_published_content_is_not_tracked() {
    let h = audit_harness(3);
    let event = pin_event(30, 1_000_000, OTHER_PUBLISHER);
    h.daemon
        .dispatch(&ContractEvent::Pin(event.clone()))
        .await
        .unwrap();
    h.daemon
        .dispatch(&ContractEvent::Claimed(claimed_event(30, &event.cid, OTHER_CLAIMANT, 2)))
        .await
        .unwrap();

    assert!(h.store.tracked_pins(None).unwrap().is_empty());
}

// ── Verification cycles ──────────────────────────────────────────────────────

#[tokio::test]
async fn passing_verification_marks_verified() {
    let h = audit_harness(3);
    let cid = track_one_pair(&h, 20).await;

    let audit = h.audit.as_ref().unwrap();
    let report = audit.scheduler().run_cycle().await.unwrap();
    assert_eq!(report.total_checked, 1);
    assert_eq!(report.passed, 1);

    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::Verified);
    assert_eq!(pin.consecutive_failures, 0);
    assert_eq!(pin.total_checks, 1);
    assert!(pin.last_verified_at.is_some());
    assert!(pin.last_checked_at.is_some());
}

#[tokio::test]
async fn threshold_failures_submit_a_dispute() {
    let h = audit_harness(3);
    let cid = track_one_pair(&h, 19).await;
    let audit = h.audit.as_ref().unwrap();

    h.verifier.passed.store(false, Ordering::SeqCst);

    // Two failures: below the threshold, no dispute yet.
    for expected in 1..=2u32 {
        audit.scheduler().run_cycle().await.unwrap();
        let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
        assert_eq!(pin.consecutive_failures, expected);
        assert_ne!(pin.status, TrackingStatus::FlagSubmitted);
    }
    assert_eq!(h.disputes.call_count(), 0);

    // The third failing cycle crosses the threshold.
    let report = audit.scheduler().run_cycle().await.unwrap();
    assert_eq!(report.flagged, 1);

    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::FlagSubmitted);
    assert!(pin.flag_tx_id.is_some());
    assert!(pin.flagged_at.is_some());
    assert_eq!(pin.total_checks, 3);
    assert_eq!(pin.total_failures, 3);

    assert_eq!(h.disputes.call_count(), 1);
    let flags = h.store.flag_history().unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].claimant, OTHER_CLAIMANT);
    assert_eq!(flags[0].tx_id, "mock_flag_tx_123");

    // Flagged pairs are skipped in later cycles.
    let report = audit.scheduler().run_cycle().await.unwrap();
    assert_eq!(report.total_checked, 0);
    assert_eq!(h.disputes.call_count(), 1);
}

#[tokio::test]
async fn recovery_resets_the_failure_streak() {
    let h = audit_harness(3);
    let cid = track_one_pair(&h, 23).await;
    let audit = h.audit.as_ref().unwrap();

    h.verifier.passed.store(false, Ordering::SeqCst);
    audit.scheduler().run_cycle().await.unwrap();
    audit.scheduler().run_cycle().await.unwrap();

    h.verifier.passed.store(true, Ordering::SeqCst);
    audit.scheduler().run_cycle().await.unwrap();

    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::Verified);
    assert_eq!(pin.consecutive_failures, 0);
    assert_eq!(pin.total_checks, 3);
    assert_eq!(pin.total_failures, 2);
    assert!(pin.consecutive_failures <= pin.total_failures);
    assert!(pin.total_checks >= pin.total_failures);
    assert_eq!(h.disputes.call_count(), 0);
}

#[tokio::test]
async fn failed_dispute_leaves_status_for_retry() {
    let h = audit_harness(2);
    let cid = track_one_pair(&h, 24).await;
    let audit = h.audit.as_ref().unwrap();

    h.verifier.passed.store(false, Ordering::SeqCst);
    h.disputes.succeed.store(false, Ordering::SeqCst);

    audit.scheduler().run_cycle().await.unwrap();
    audit.scheduler().run_cycle().await.unwrap();

    // The dispute was attempted and failed; the pin stays suspect so the
    // next cycle retries.
    assert_eq!(h.disputes.call_count(), 1);
    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::Suspect);
    assert!(pin.flag_tx_id.is_none());
    assert!(h.store.flag_history().unwrap().is_empty());

    audit.scheduler().run_cycle().await.unwrap();
    assert_eq!(h.disputes.call_count(), 2);
}

#[tokio::test]
async fn prior_dispute_suppresses_resubmission() {
    let h = audit_harness(2);
    track_one_pair(&h, 25).await;
    let audit = h.audit.as_ref().unwrap();

    h.verifier.passed.store(false, Ordering::SeqCst);
    h.disputes.mark_disputed(OTHER_CLAIMANT);

    audit.scheduler().run_cycle().await.unwrap();
    audit.scheduler().run_cycle().await.unwrap();

    assert_eq!(h.disputes.call_count(), 0);
}

// ── Freed slots ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn freed_slot_stops_verification() {
    let h = audit_harness(3);
    let cid = track_one_pair(&h, 19).await;
    let audit = h.audit.as_ref().unwrap();

    h.daemon
        .dispatch(&ContractEvent::Freed(freed_event(19, &cid)))
        .await
        .unwrap();

    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::SlotFreed);

    // The next cycle has nothing to verify.
    h.verifier.passed.store(false, Ordering::SeqCst);
    let report = audit.scheduler().run_cycle().await.unwrap();
    assert_eq!(report.total_checked, 0);
    assert_eq!(h.verifier.call_count(), 0);
}

#[tokio::test]
async fn freed_slot_preserves_flag_submitted() {
    let h = audit_harness(1);
    let cid = track_one_pair(&h, 26).await;
    let audit = h.audit.as_ref().unwrap();

    h.verifier.passed.store(false, Ordering::SeqCst);
    audit.scheduler().run_cycle().await.unwrap();
    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::FlagSubmitted);

    h.daemon
        .dispatch(&ContractEvent::Freed(freed_event(26, &cid)))
        .await
        .unwrap();
    let pin = h.store.get_tracked_pin(&cid, OTHER_CLAIMANT).unwrap().unwrap();
    assert_eq!(pin.status, TrackingStatus::FlagSubmitted);
}

// ── Manual operations & summary ──────────────────────────────────────────────

#[tokio::test]
async fn manual_verification_and_dispute() {
    let h = audit_harness(3);
    let cid = track_one_pair(&h, 27).await;
    let audit = h.audit.as_ref().unwrap();

    let results = audit.verify_now(Some(&cid), None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].passed);
    assert_eq!(h.verifier.call_count(), 1);

    let none = audit.verify_now(Some("QmUnknown"), None).await.unwrap();
    assert!(none.is_empty());

    let outcome = audit.dispute_now(OTHER_CLAIMANT).await;
    assert!(outcome.success);
    assert_eq!(h.disputes.call_count(), 1);
}

#[tokio::test]
async fn summary_counts_by_status() {
    let h = audit_harness(1);
    let cid = track_one_pair(&h, 28).await;
    let audit = h.audit.as_ref().unwrap();

    h.verifier.passed.store(false, Ordering::SeqCst);
    audit.scheduler().run_cycle().await.unwrap();

    let summary = audit.summary().unwrap();
    assert!(summary.enabled);
    assert_eq!(summary.total_tracked_pins, 1);
    assert_eq!(summary.flagged_count, 1);
    assert_eq!(summary.total_flags_lifetime, 1);
    assert_eq!(summary.total_checks_lifetime, 1);
    assert!(summary.last_cycle_at.is_some());
    assert!(summary.next_cycle_at.is_some());

    // The flagged pair shows up in the dashboard through the facade too.
    let snapshot = h.facade.dashboard().await.unwrap();
    let audit_block = snapshot.audit.unwrap();
    assert_eq!(audit_block.flagged_count, 1);

    let _ = cid;
}
