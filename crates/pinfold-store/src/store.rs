use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use pinfold_core::audit::{
    CachedParticipant, CycleReport, FlagRecord, TrackedContent, TrackedPin, TrackingStatus,
    VerificationLogEntry, VerificationResult,
};
use pinfold_core::error::PinfoldError;
use pinfold_core::events::PinEvent;
use pinfold_core::records::{
    ActivityRecord, ClaimRecord, DaemonConfigRecord, EarningsSummary, OfferRecord, OfferStatus,
    PinRecord,
};
use pinfold_core::types::{now_ts, Amount, SlotId, Timestamp};

/// Persistent agent state backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   meta               — utf8 key bytes        → raw bytes (cursor, config, counters)
///   offers             — slot u64 be bytes     → bincode(OfferRecord)
///   claims             — claim id u64 be bytes → bincode(ClaimRecord)
///   pins               — cid bytes             → bincode(PinRecord)
///   activity           — entry id u64 be bytes → bincode(ActivityRecord)
///   tracked_content    — cid bytes             → bincode(TrackedContent)
///   tracked_pins       — cid ++ 0x00 ++ claimant → bincode(TrackedPin)
///   verification_log   — entry id u64 be bytes → bincode(VerificationLogEntry)
///   cycles             — cycle id u64 be bytes → bincode(CycleReport)
///   flags              — flag id u64 be bytes  → bincode(FlagRecord)
///   participant_cache  — address bytes         → bincode(CachedParticipant)
///
/// Every mutating method flushes before returning, so each mutation is a
/// durable commit. Writers are serialized by the callers (one daemon loop,
/// one audit scheduler); readers may run concurrently.
pub struct StateStore {
    db: sled::Db,
    meta: sled::Tree,
    offers: sled::Tree,
    claims: sled::Tree,
    pins: sled::Tree,
    activity: sled::Tree,
    tracked_content: sled::Tree,
    tracked_pins: sled::Tree,
    verification_log: sled::Tree,
    cycles: sled::Tree,
    flags: sled::Tree,
    participant_cache: sled::Tree,
}

const CURSOR_KEY: &str = "cursor_ledger";
const CONFIG_KEY: &str = "daemon_config";

fn storage_err(e: impl std::fmt::Display) -> PinfoldError {
    PinfoldError::Storage(e.to_string())
}

fn enc<T: Serialize>(value: &T) -> Result<Vec<u8>, PinfoldError> {
    bincode::serialize(value).map_err(|e| PinfoldError::Serialization(e.to_string()))
}

fn dec<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PinfoldError> {
    bincode::deserialize(bytes).map_err(|e| PinfoldError::Serialization(e.to_string()))
}

/// Composite key for the tracked_pins tree. CIDs and addresses never contain
/// a NUL byte.
fn pin_key(cid: &str, claimant: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(cid.len() + 1 + claimant.len());
    key.extend_from_slice(cid.as_bytes());
    key.push(0);
    key.extend_from_slice(claimant.as_bytes());
    key
}

/// Partial update applied to a tracked pin. Supplying `consecutive_failures`
/// also increments `total_checks` and, when the new value is non-zero,
/// `total_failures`.
#[derive(Debug, Default, Clone)]
pub struct TrackedPinUpdate {
    pub status: Option<TrackingStatus>,
    pub consecutive_failures: Option<u32>,
    pub last_verified_at: Option<Timestamp>,
    pub last_checked_at: Option<Timestamp>,
    pub flagged_at: Option<Timestamp>,
    pub flag_tx_id: Option<String>,
}

impl StateStore {
    /// Open or create the state database at `path`. Idempotent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PinfoldError> {
        let db = sled::open(path).map_err(storage_err)?;
        let meta = db.open_tree("meta").map_err(storage_err)?;
        let offers = db.open_tree("offers").map_err(storage_err)?;
        let claims = db.open_tree("claims").map_err(storage_err)?;
        let pins = db.open_tree("pins").map_err(storage_err)?;
        let activity = db.open_tree("activity").map_err(storage_err)?;
        let tracked_content = db.open_tree("tracked_content").map_err(storage_err)?;
        let tracked_pins = db.open_tree("tracked_pins").map_err(storage_err)?;
        let verification_log = db.open_tree("verification_log").map_err(storage_err)?;
        let cycles = db.open_tree("cycles").map_err(storage_err)?;
        let flags = db.open_tree("flags").map_err(storage_err)?;
        let participant_cache = db.open_tree("participant_cache").map_err(storage_err)?;
        Ok(Self {
            db,
            meta,
            offers,
            claims,
            pins,
            activity,
            tracked_content,
            tracked_pins,
            verification_log,
            cycles,
            flags,
            participant_cache,
        })
    }

    fn commit(&self) -> Result<(), PinfoldError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    /// Allocate the next value of a named monotonic counter (meta tree).
    fn next_id(&self, counter: &str) -> Result<u64, PinfoldError> {
        let current = self
            .meta
            .get(counter.as_bytes())
            .map_err(storage_err)?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b[..8]);
                u64::from_be_bytes(arr)
            })
            .unwrap_or(1);
        self.meta
            .insert(counter.as_bytes(), (current + 1).to_be_bytes().to_vec())
            .map_err(storage_err)?;
        Ok(current)
    }

    // ── Cursor ───────────────────────────────────────────────────────────────

    pub fn get_cursor(&self) -> Result<Option<u64>, PinfoldError> {
        Ok(self
            .meta
            .get(CURSOR_KEY.as_bytes())
            .map_err(storage_err)?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b[..8]);
                u64::from_be_bytes(arr)
            }))
    }

    pub fn set_cursor(&self, ledger: u64) -> Result<(), PinfoldError> {
        self.meta
            .insert(CURSOR_KEY.as_bytes(), ledger.to_be_bytes().to_vec())
            .map_err(storage_err)?;
        self.commit()
    }

    // ── Runtime config ───────────────────────────────────────────────────────

    pub fn get_runtime_config(&self) -> Result<DaemonConfigRecord, PinfoldError> {
        match self.meta.get(CONFIG_KEY.as_bytes()).map_err(storage_err)? {
            Some(b) => dec(&b),
            None => Ok(DaemonConfigRecord::default()),
        }
    }

    /// Whether a runtime-config row has ever been persisted. Used at startup
    /// to seed the row from the file configuration exactly once.
    pub fn has_runtime_config(&self) -> Result<bool, PinfoldError> {
        self.meta
            .contains_key(CONFIG_KEY.as_bytes())
            .map_err(storage_err)
    }

    /// Partial update over the single runtime-config row; unset fields keep
    /// their current value.
    pub fn set_runtime_config(
        &self,
        mode: Option<&str>,
        min_price: Option<Amount>,
        max_content_size: Option<u64>,
    ) -> Result<(), PinfoldError> {
        let mut current = self.get_runtime_config()?;
        if let Some(m) = mode {
            current.mode = m.to_string();
        }
        if let Some(p) = min_price {
            current.min_price = p;
        }
        if let Some(s) = max_content_size {
            current.max_content_size = s;
        }
        self.meta
            .insert(CONFIG_KEY.as_bytes(), enc(&current)?)
            .map_err(storage_err)?;
        self.commit()
    }

    // ── Offers ───────────────────────────────────────────────────────────────

    /// Upsert an offer from its originating event. Keyed by slot, so
    /// re-observing an event after a cursor rewind is idempotent.
    pub fn save_offer(&self, event: &PinEvent, status: OfferStatus) -> Result<(), PinfoldError> {
        let now = now_ts();
        let offer = OfferRecord {
            slot: event.slot,
            cid: event.cid.clone(),
            filename: event.filename.clone(),
            gateway: event.gateway.clone(),
            offer_price: event.offer_price,
            pin_qty: event.pin_qty,
            pins_remaining: event.pin_qty,
            publisher: event.publisher.clone(),
            ledger_sequence: event.ledger_sequence,
            status,
            reject_reason: None,
            net_profit: None,
            created_at: now,
            updated_at: now,
        };
        self.offers
            .insert(event.slot.to_be_bytes(), enc(&offer)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn get_offer(&self, slot: SlotId) -> Result<Option<OfferRecord>, PinfoldError> {
        match self.offers.get(slot.to_be_bytes()).map_err(storage_err)? {
            Some(b) => Ok(Some(dec(&b)?)),
            None => Ok(None),
        }
    }

    /// Update an offer's status (and optionally its reject reason). A missing
    /// slot is a no-op.
    pub fn update_offer_status(
        &self,
        slot: SlotId,
        status: OfferStatus,
        reject_reason: Option<&str>,
    ) -> Result<(), PinfoldError> {
        let Some(mut offer) = self.get_offer(slot)? else {
            return Ok(());
        };
        offer.status = status;
        if let Some(reason) = reject_reason {
            offer.reject_reason = Some(reason.to_string());
        }
        offer.updated_at = now_ts();
        self.offers
            .insert(slot.to_be_bytes(), enc(&offer)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn offers_by_status(&self, status: OfferStatus) -> Result<Vec<OfferRecord>, PinfoldError> {
        let mut out = Vec::new();
        for item in self.offers.iter() {
            let (_, b) = item.map_err(storage_err)?;
            let offer: OfferRecord = dec(&b)?;
            if offer.status == status {
                out.push(offer);
            }
        }
        out.sort_by_key(|o| o.created_at);
        Ok(out)
    }

    pub fn approval_queue(&self) -> Result<Vec<OfferRecord>, PinfoldError> {
        self.offers_by_status(OfferStatus::AwaitingApproval)
    }

    pub fn all_offers(&self) -> Result<Vec<OfferRecord>, PinfoldError> {
        let mut out = Vec::new();
        for item in self.offers.iter() {
            let (_, b) = item.map_err(storage_err)?;
            out.push(dec(&b)?);
        }
        out.sort_by_key(|o: &OfferRecord| o.created_at);
        Ok(out)
    }

    // ── Claims & earnings ────────────────────────────────────────────────────

    pub fn save_claim(&self, claim: &ClaimRecord) -> Result<(), PinfoldError> {
        let id = self.next_id("next_claim_id")?;
        self.claims
            .insert(id.to_be_bytes(), enc(claim)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn all_claims(&self) -> Result<Vec<ClaimRecord>, PinfoldError> {
        let mut out = Vec::new();
        for item in self.claims.iter() {
            let (_, b) = item.map_err(storage_err)?;
            out.push(dec(&b)?);
        }
        Ok(out)
    }

    /// Earnings totals with 24h/7d/30d windows measured against the current
    /// wall-clock.
    pub fn earnings(&self) -> Result<EarningsSummary, PinfoldError> {
        let now = now_ts();
        let mut summary = EarningsSummary::default();
        for claim in self.all_claims()? {
            summary.total_earned += claim.amount_earned;
            summary.claims_count += 1;
            if claim.claimed_at >= now - 86_400 {
                summary.earned_24h += claim.amount_earned;
            }
            if claim.claimed_at >= now - 7 * 86_400 {
                summary.earned_7d += claim.amount_earned;
            }
            if claim.claimed_at >= now - 30 * 86_400 {
                summary.earned_30d += claim.amount_earned;
            }
        }
        Ok(summary)
    }

    // ── Pins ─────────────────────────────────────────────────────────────────

    pub fn save_pin(
        &self,
        cid: &str,
        slot: SlotId,
        bytes_pinned: Option<u64>,
    ) -> Result<(), PinfoldError> {
        let record = PinRecord {
            cid: cid.to_string(),
            slot: Some(slot),
            bytes_pinned,
            pinned_at: now_ts(),
        };
        self.pins
            .insert(cid.as_bytes(), enc(&record)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn is_pinned(&self, cid: &str) -> Result<bool, PinfoldError> {
        self.pins.contains_key(cid.as_bytes()).map_err(storage_err)
    }

    pub fn all_pins(&self) -> Result<Vec<PinRecord>, PinfoldError> {
        let mut out = Vec::new();
        for item in self.pins.iter() {
            let (_, b) = item.map_err(storage_err)?;
            out.push(dec(&b)?);
        }
        out.sort_by_key(|p: &PinRecord| p.pinned_at);
        Ok(out)
    }

    // ── Activity log ─────────────────────────────────────────────────────────

    pub fn log_activity(
        &self,
        event_type: &str,
        message: &str,
        slot: Option<SlotId>,
        cid: Option<&str>,
        amount: Option<Amount>,
    ) -> Result<(), PinfoldError> {
        let id = self.next_id("next_activity_id")?;
        let entry = ActivityRecord {
            id,
            event_type: event_type.to_string(),
            slot,
            cid: cid.map(str::to_string),
            amount,
            message: message.to_string(),
            created_at: now_ts(),
        };
        self.activity
            .insert(id.to_be_bytes(), enc(&entry)?)
            .map_err(storage_err)?;
        self.commit()
    }

    /// Most recent activity entries, newest first.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, PinfoldError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.activity.iter().rev().take(limit) {
            let (_, b) = item.map_err(storage_err)?;
            out.push(dec(&b)?);
        }
        Ok(out)
    }

    // ── Audit: tracked content ───────────────────────────────────────────────

    pub fn save_tracked_content(&self, content: &TrackedContent) -> Result<(), PinfoldError> {
        // First write wins; re-observed events don't reset created_at.
        if self
            .tracked_content
            .contains_key(content.cid.as_bytes())
            .map_err(storage_err)?
        {
            return Ok(());
        }
        self.tracked_content
            .insert(content.cid.as_bytes(), enc(content)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn tracked_content_by_slot(
        &self,
        slot: SlotId,
    ) -> Result<Option<TrackedContent>, PinfoldError> {
        for item in self.tracked_content.iter() {
            let (_, b) = item.map_err(storage_err)?;
            let content: TrackedContent = dec(&b)?;
            if content.slot == slot {
                return Ok(Some(content));
            }
        }
        Ok(None)
    }

    // ── Audit: tracked pins ──────────────────────────────────────────────────

    pub fn save_tracked_pin(&self, pin: &TrackedPin) -> Result<(), PinfoldError> {
        self.tracked_pins
            .insert(pin_key(&pin.cid, &pin.claimant), enc(pin)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn get_tracked_pin(
        &self,
        cid: &str,
        claimant: &str,
    ) -> Result<Option<TrackedPin>, PinfoldError> {
        match self
            .tracked_pins
            .get(pin_key(cid, claimant))
            .map_err(storage_err)?
        {
            Some(b) => Ok(Some(dec(&b)?)),
            None => Ok(None),
        }
    }

    /// Tracked pins, optionally filtered by status, least-recently-checked
    /// first.
    pub fn tracked_pins(
        &self,
        statuses: Option<&[TrackingStatus]>,
    ) -> Result<Vec<TrackedPin>, PinfoldError> {
        let mut out = Vec::new();
        for item in self.tracked_pins.iter() {
            let (_, b) = item.map_err(storage_err)?;
            let pin: TrackedPin = dec(&b)?;
            if statuses.map_or(true, |s| s.contains(&pin.status)) {
                out.push(pin);
            }
        }
        out.sort_by_key(|p| p.last_checked_at.unwrap_or(0));
        Ok(out)
    }

    /// Apply a partial update to a tracked pin. A missing pair is a no-op.
    pub fn update_tracked_pin(
        &self,
        cid: &str,
        claimant: &str,
        update: TrackedPinUpdate,
    ) -> Result<(), PinfoldError> {
        let Some(mut pin) = self.get_tracked_pin(cid, claimant)? else {
            return Ok(());
        };
        if let Some(status) = update.status {
            pin.status = status;
        }
        if let Some(failures) = update.consecutive_failures {
            pin.consecutive_failures = failures;
            pin.total_checks += 1;
            if failures > 0 {
                pin.total_failures += 1;
            }
        }
        if let Some(ts) = update.last_verified_at {
            pin.last_verified_at = Some(ts);
        }
        if let Some(ts) = update.last_checked_at {
            pin.last_checked_at = Some(ts);
        }
        if let Some(ts) = update.flagged_at {
            pin.flagged_at = Some(ts);
        }
        if let Some(tx) = update.flag_tx_id {
            pin.flag_tx_id = Some(tx);
        }
        pin.updated_at = now_ts();
        self.tracked_pins
            .insert(pin_key(cid, claimant), enc(&pin)?)
            .map_err(storage_err)?;
        self.commit()
    }

    // ── Audit: verification log & cycles ─────────────────────────────────────

    pub fn record_verification(
        &self,
        cid: &str,
        claimant: &str,
        result: &VerificationResult,
    ) -> Result<(), PinfoldError> {
        let id = self.next_id("next_verification_id")?;
        let entry = VerificationLogEntry {
            id,
            cid: cid.to_string(),
            claimant: claimant.to_string(),
            passed: result.passed,
            method_used: result.method_used.clone(),
            methods_attempted: result.methods_attempted.clone(),
            duration_ms: result.duration_ms,
            checked_at: result.checked_at,
        };
        self.verification_log
            .insert(id.to_be_bytes(), enc(&entry)?)
            .map_err(storage_err)?;
        self.commit()
    }

    pub fn save_cycle(&self, mut report: CycleReport) -> Result<u64, PinfoldError> {
        let id = self.next_id("next_cycle_id")?;
        report.id = id;
        self.cycles
            .insert(id.to_be_bytes(), enc(&report)?)
            .map_err(storage_err)?;
        self.commit()?;
        Ok(id)
    }

    /// Most recent cycle reports, newest first.
    pub fn cycle_history(&self, limit: usize) -> Result<Vec<CycleReport>, PinfoldError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.cycles.iter().rev().take(limit) {
            let (_, b) = item.map_err(storage_err)?;
            out.push(dec(&b)?);
        }
        Ok(out)
    }

    // ── Audit: flags ─────────────────────────────────────────────────────────

    pub fn save_flag(&self, mut record: FlagRecord) -> Result<(), PinfoldError> {
        let id = self.next_id("next_flag_id")?;
        record.id = id;
        self.flags
            .insert(id.to_be_bytes(), enc(&record)?)
            .map_err(storage_err)?;
        self.commit()
    }

    /// Flag submissions, newest first.
    pub fn flag_history(&self) -> Result<Vec<FlagRecord>, PinfoldError> {
        let mut out = Vec::new();
        for item in self.flags.iter().rev() {
            let (_, b) = item.map_err(storage_err)?;
            out.push(dec(&b)?);
        }
        Ok(out)
    }

    // ── Participant cache ────────────────────────────────────────────────────

    pub fn get_cached_participant(
        &self,
        address: &str,
    ) -> Result<Option<CachedParticipant>, PinfoldError> {
        match self
            .participant_cache
            .get(address.as_bytes())
            .map_err(storage_err)?
        {
            Some(b) => Ok(Some(dec(&b)?)),
            None => Ok(None),
        }
    }

    pub fn cache_participant(&self, info: &CachedParticipant) -> Result<(), PinfoldError> {
        self.participant_cache
            .insert(info.address.as_bytes(), enc(info)?)
            .map_err(storage_err)?;
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinfold_core::audit::MethodOutcome;
    use pinfold_core::audit::VerifyMethod;

    fn open_store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::open(dir.path()).expect("open store");
        (dir, store)
    }

    fn sample_event(slot: SlotId) -> PinEvent {
        PinEvent {
            slot,
            cid: format!("QmSample{slot}"),
            filename: "video.mp4".into(),
            gateway: "https://gw.example".into(),
            offer_price: 1_000_000,
            pin_qty: 3,
            publisher: "PUBLISHER".into(),
            ledger_sequence: 42,
        }
    }

    #[test]
    fn offer_roundtrip_preserves_every_field() {
        let (_dir, store) = open_store();
        let event = sample_event(7);
        store.save_offer(&event, OfferStatus::Pending).unwrap();

        let offer = store.get_offer(7).unwrap().expect("offer present");
        assert_eq!(offer.slot, 7);
        assert_eq!(offer.cid, event.cid);
        assert_eq!(offer.filename, event.filename);
        assert_eq!(offer.gateway, event.gateway);
        assert_eq!(offer.offer_price, event.offer_price);
        assert_eq!(offer.pin_qty, 3);
        assert_eq!(offer.pins_remaining, 3);
        assert_eq!(offer.publisher, event.publisher);
        assert_eq!(offer.ledger_sequence, 42);
        assert_eq!(offer.status, OfferStatus::Pending);
    }

    #[test]
    fn save_offer_is_an_upsert_keyed_by_slot() {
        let (_dir, store) = open_store();
        let event = sample_event(3);
        store.save_offer(&event, OfferStatus::Pending).unwrap();
        store.save_offer(&event, OfferStatus::Pending).unwrap();
        assert_eq!(store.all_offers().unwrap().len(), 1);
    }

    #[test]
    fn update_offer_status_sets_reason() {
        let (_dir, store) = open_store();
        store.save_offer(&sample_event(1), OfferStatus::Pending).unwrap();
        store
            .update_offer_status(1, OfferStatus::Rejected, Some("price_too_low"))
            .unwrap();
        let offer = store.get_offer(1).unwrap().unwrap();
        assert_eq!(offer.status, OfferStatus::Rejected);
        assert_eq!(offer.reject_reason.as_deref(), Some("price_too_low"));

        // Missing slot is a quiet no-op.
        store
            .update_offer_status(99, OfferStatus::Expired, None)
            .unwrap();
    }

    #[test]
    fn offers_by_status_filters() {
        let (_dir, store) = open_store();
        store.save_offer(&sample_event(1), OfferStatus::Pending).unwrap();
        store.save_offer(&sample_event(2), OfferStatus::Pending).unwrap();
        store
            .update_offer_status(2, OfferStatus::AwaitingApproval, None)
            .unwrap();

        let queue = store.approval_queue().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].slot, 2);
        assert_eq!(store.offers_by_status(OfferStatus::Pending).unwrap().len(), 1);
    }

    #[test]
    fn earnings_totals_and_count() {
        let (_dir, store) = open_store();
        let now = now_ts();
        for (slot, amount) in [(1u64, 1_000_000u64), (2, 250_000)] {
            store
                .save_claim(&ClaimRecord {
                    slot,
                    cid: format!("Qm{slot}"),
                    amount_earned: amount,
                    tx_id: format!("tx{slot}"),
                    claimed_at: now,
                })
                .unwrap();
        }
        let earnings = store.earnings().unwrap();
        assert_eq!(earnings.total_earned, 1_250_000);
        assert_eq!(earnings.claims_count, 2);
        // Fresh claims fall inside every window.
        assert_eq!(earnings.earned_24h, 1_250_000);
        assert_eq!(earnings.earned_7d, 1_250_000);
        assert_eq!(earnings.earned_30d, 1_250_000);
    }

    #[test]
    fn earnings_windows_exclude_old_claims() {
        let (_dir, store) = open_store();
        store
            .save_claim(&ClaimRecord {
                slot: 1,
                cid: "Qm1".into(),
                amount_earned: 500,
                tx_id: "tx1".into(),
                claimed_at: now_ts() - 8 * 86_400,
            })
            .unwrap();
        let earnings = store.earnings().unwrap();
        assert_eq!(earnings.total_earned, 500);
        assert_eq!(earnings.earned_24h, 0);
        assert_eq!(earnings.earned_7d, 0);
        assert_eq!(earnings.earned_30d, 500);
    }

    #[test]
    fn pins_roundtrip() {
        let (_dir, store) = open_store();
        assert!(!store.is_pinned("QmA").unwrap());
        store.save_pin("QmA", 5, Some(2048)).unwrap();
        assert!(store.is_pinned("QmA").unwrap());
        let pins = store.all_pins().unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].slot, Some(5));
        assert_eq!(pins[0].bytes_pinned, Some(2048));
    }

    #[test]
    fn recent_activity_is_newest_first_and_limited() {
        let (_dir, store) = open_store();
        for i in 0..5 {
            store
                .log_activity("offer_seen", &format!("offer {i}"), Some(i), None, None)
                .unwrap();
        }
        let recent = store.recent_activity(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].slot, Some(4));
        assert_eq!(recent[2].slot, Some(2));
    }

    #[test]
    fn cursor_roundtrip() {
        let (_dir, store) = open_store();
        assert_eq!(store.get_cursor().unwrap(), None);
        store.set_cursor(100).unwrap();
        store.set_cursor(105).unwrap();
        assert_eq!(store.get_cursor().unwrap(), Some(105));
    }

    #[test]
    fn runtime_config_partial_update() {
        let (_dir, store) = open_store();
        assert!(!store.has_runtime_config().unwrap());
        let defaults = store.get_runtime_config().unwrap();
        assert_eq!(defaults.mode, "autonomous");

        store
            .set_runtime_config(Some("operator_approved"), None, None)
            .unwrap();
        store.set_runtime_config(None, Some(500), None).unwrap();

        let cfg = store.get_runtime_config().unwrap();
        assert_eq!(cfg.mode, "operator_approved");
        assert_eq!(cfg.min_price, 500);
        assert_eq!(cfg.max_content_size, defaults.max_content_size);
        assert!(store.has_runtime_config().unwrap());
    }

    fn sample_tracked_pin() -> TrackedPin {
        TrackedPin::new(
            "QmTracked".into(),
            "CLAIMANT".into(),
            "12D3KooWNode".into(),
            "/ip4/1.2.3.4/tcp/4001".into(),
            19,
            now_ts(),
        )
    }

    #[test]
    fn tracked_pin_update_increments_check_counters() {
        let (_dir, store) = open_store();
        store.save_tracked_pin(&sample_tracked_pin()).unwrap();

        // One failure.
        store
            .update_tracked_pin(
                "QmTracked",
                "CLAIMANT",
                TrackedPinUpdate {
                    consecutive_failures: Some(1),
                    last_checked_at: Some(now_ts()),
                    ..Default::default()
                },
            )
            .unwrap();
        // One pass resets the streak.
        store
            .update_tracked_pin(
                "QmTracked",
                "CLAIMANT",
                TrackedPinUpdate {
                    status: Some(TrackingStatus::Verified),
                    consecutive_failures: Some(0),
                    last_verified_at: Some(now_ts()),
                    last_checked_at: Some(now_ts()),
                    ..Default::default()
                },
            )
            .unwrap();

        let pin = store.get_tracked_pin("QmTracked", "CLAIMANT").unwrap().unwrap();
        assert_eq!(pin.total_checks, 2);
        assert_eq!(pin.total_failures, 1);
        assert_eq!(pin.consecutive_failures, 0);
        assert_eq!(pin.status, TrackingStatus::Verified);
        assert!(pin.total_checks >= pin.total_failures);
        assert!(pin.consecutive_failures <= pin.total_failures);
    }

    #[test]
    fn tracked_pins_status_filter() {
        let (_dir, store) = open_store();
        let mut a = sample_tracked_pin();
        a.cid = "QmA".into();
        let mut b = sample_tracked_pin();
        b.cid = "QmB".into();
        b.status = TrackingStatus::SlotFreed;
        store.save_tracked_pin(&a).unwrap();
        store.save_tracked_pin(&b).unwrap();

        let active = store
            .tracked_pins(Some(&[
                TrackingStatus::Tracking,
                TrackingStatus::Verified,
                TrackingStatus::Suspect,
            ]))
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].cid, "QmA");
        assert_eq!(store.tracked_pins(None).unwrap().len(), 2);
    }

    #[test]
    fn verification_log_and_cycles() {
        let (_dir, store) = open_store();
        let result = VerificationResult {
            cid: "QmV".into(),
            claimant_node_id: "12D3KooWNode".into(),
            passed: false,
            method_used: "block_exchange".into(),
            methods_attempted: vec![MethodOutcome {
                method: VerifyMethod::BlockExchange,
                passed: Some(false),
                detail: "block not available".into(),
                duration_ms: 12,
            }],
            duration_ms: 12,
            checked_at: now_ts(),
        };
        store.record_verification("QmV", "CLAIMANT", &result).unwrap();

        let id = store
            .save_cycle(CycleReport {
                total_checked: 1,
                failed: 1,
                started_at: now_ts(),
                completed_at: now_ts(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(id, 1);
        let history = store.cycle_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, 1);
        assert_eq!(history[0].failed, 1);
    }

    #[test]
    fn flag_history_is_newest_first() {
        let (_dir, store) = open_store();
        for i in 0..2 {
            store
                .save_flag(FlagRecord {
                    id: 0,
                    claimant: format!("CLAIMANT{i}"),
                    tx_id: format!("tx{i}"),
                    flag_count_after: Some(1),
                    bounty_earned: None,
                    submitted_at: now_ts(),
                })
                .unwrap();
        }
        let history = store.flag_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].claimant, "CLAIMANT1");
    }

    #[test]
    fn participant_cache_overwrites() {
        let (_dir, store) = open_store();
        let mut info = CachedParticipant {
            address: "ADDR".into(),
            node_id: "node-a".into(),
            multiaddr: "/ip4/1.1.1.1/tcp/4001".into(),
            active: true,
            cached_at: now_ts(),
        };
        store.cache_participant(&info).unwrap();
        info.node_id = "node-b".into();
        store.cache_participant(&info).unwrap();

        let cached = store.get_cached_participant("ADDR").unwrap().unwrap();
        assert_eq!(cached.node_id, "node-b");
    }
}
