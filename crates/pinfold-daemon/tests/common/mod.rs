//! Shared test support: in-memory fakes for every network-facing component
//! plus event factories and a wired-up daemon harness.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use pinfold_api::{DataFacade, ModeController};
use pinfold_audit::AuditOrchestrator;
use pinfold_core::audit::{DisputeOutcome, MethodOutcome, VerificationResult, VerifyMethod};
use pinfold_core::config::{AuditConfig, Mode, PolicyParams};
use pinfold_core::error::PinfoldError;
use pinfold_core::events::{ClaimedEvent, ContractEvent, FreedEvent, PinEvent};
use pinfold_core::records::{ClaimOutcome, ParticipantInfo, PinOutcome, SlotInfo};
use pinfold_core::traits::{
    ClaimSubmitter, ContentVerifier, DisputeSubmitter, EventSource, LedgerReader, PinExecutor,
};
use pinfold_core::types::{cid_digest, now_ts, Amount, SlotId};
use pinfold_daemon::{Daemon, PolicyFilter, ShutdownHandle};
use pinfold_store::StateStore;

pub const OUR_ADDRESS: &str = "AGENTADDRESS1111111111111111111111";
pub const OTHER_PUBLISHER: &str = "PUBLISHERADDRESS22222222222222222";
pub const OTHER_CLAIMANT: &str = "CLAIMANTADDRESS333333333333333333";
pub const OTHER_NODE_ID: &str = "12D3KooWTestNode";
pub const OTHER_MULTIADDR: &str = "/ip4/1.2.3.4/tcp/4001/p2p/12D3KooWTestNode";

// ── Factories ────────────────────────────────────────────────────────────────

pub fn pin_event(slot: SlotId, offer_price: Amount, publisher: &str) -> PinEvent {
    PinEvent {
        slot,
        cid: format!("QmTestContent{slot}"),
        filename: format!("file{slot}.bin"),
        gateway: "https://gw.example".to_string(),
        offer_price,
        pin_qty: 3,
        publisher: publisher.to_string(),
        ledger_sequence: 1000 + slot,
    }
}

pub fn claimed_event(slot: SlotId, cid: &str, claimant: &str, pins_remaining: u32) -> ClaimedEvent {
    ClaimedEvent {
        slot,
        cid_digest: cid_digest(cid),
        claimant: claimant.to_string(),
        amount: 1_000_000,
        pins_remaining,
        ledger_sequence: 2000 + slot,
    }
}

pub fn freed_event(slot: SlotId, cid: &str) -> FreedEvent {
    FreedEvent {
        slot,
        cid_digest: cid_digest(cid),
        ledger_sequence: 3000 + slot,
    }
}

// ── Mock poller ──────────────────────────────────────────────────────────────

pub struct MockPoller {
    queue: Arc<Mutex<Vec<ContractEvent>>>,
    cursor: Option<u64>,
}

impl MockPoller {
    pub fn new() -> (Self, Arc<Mutex<Vec<ContractEvent>>>) {
        let queue = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                queue: queue.clone(),
                cursor: None,
            },
            queue,
        )
    }
}

#[async_trait]
impl EventSource for MockPoller {
    async fn poll(&mut self) -> Result<Vec<ContractEvent>, PinfoldError> {
        let events: Vec<ContractEvent> = self.queue.lock().unwrap().drain(..).collect();
        if let Some(last) = events.last() {
            self.cursor = Some(last.ledger_sequence());
        }
        Ok(events)
    }

    fn cursor_ledger(&self) -> Option<u64> {
        self.cursor
    }

    fn restore_cursor(&mut self, ledger: u64) {
        self.cursor = Some(ledger);
    }
}

// ── Mock ledger queries ──────────────────────────────────────────────────────

pub struct MockQueries {
    pub wallet_balance: Amount,
    pub slot_expired: bool,
    pub pins_remaining: u32,
    pub slot_missing: bool,
    pub participant: Option<ParticipantInfo>,
}

impl Default for MockQueries {
    fn default() -> Self {
        Self {
            wallet_balance: 10_000_000,
            slot_expired: false,
            pins_remaining: 3,
            slot_missing: false,
            participant: Some(claimant_participant()),
        }
    }
}

pub fn claimant_participant() -> ParticipantInfo {
    ParticipantInfo {
        address: OTHER_CLAIMANT.to_string(),
        node_id: OTHER_NODE_ID.to_string(),
        multiaddr: OTHER_MULTIADDR.to_string(),
        active: true,
        flags: 0,
        min_price: 100,
        pins_completed: 5,
        staked: 1_000_000,
        joined_at: 0,
    }
}

#[async_trait]
impl LedgerReader for MockQueries {
    async fn wallet_balance(&self, _address: &str) -> Amount {
        self.wallet_balance
    }

    async fn slot(&self, slot: SlotId) -> Option<SlotInfo> {
        if self.slot_missing {
            return None;
        }
        Some(SlotInfo {
            slot,
            cid_digest: "ab12".to_string(),
            publisher: OTHER_PUBLISHER.to_string(),
            offer_price: 1_000_000,
            pin_qty: 3,
            pins_remaining: self.pins_remaining,
            escrow_balance: 3_000_000,
            created_at: 0,
            claimants: vec![],
        })
    }

    async fn is_slot_expired(&self, _slot: SlotId) -> Option<bool> {
        Some(self.slot_expired)
    }

    async fn participant(&self, address: &str) -> Option<ParticipantInfo> {
        self.participant
            .as_ref()
            .filter(|p| p.address == address)
            .cloned()
    }

    async fn join_fee(&self) -> Option<Amount> {
        Some(10_000_000)
    }

    async fn stake_amount(&self) -> Option<Amount> {
        Some(50_000_000)
    }
}

// ── Mock executor ────────────────────────────────────────────────────────────

pub struct MockExecutor {
    pub succeed: AtomicBool,
    pub error: Mutex<Option<String>>,
    pub pin_calls: Mutex<Vec<(String, String)>>,
    pinned: Mutex<HashSet<String>>,
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            succeed: AtomicBool::new(true),
            error: Mutex::new(None),
            pin_calls: Mutex::new(Vec::new()),
            pinned: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_with(&self, error: &str) {
        self.succeed.store(false, Ordering::SeqCst);
        *self.error.lock().unwrap() = Some(error.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.pin_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PinExecutor for MockExecutor {
    async fn pin(&self, cid: &str, gateway: &str) -> PinOutcome {
        self.pin_calls
            .lock()
            .unwrap()
            .push((cid.to_string(), gateway.to_string()));
        if self.succeed.load(Ordering::SeqCst) {
            self.pinned.lock().unwrap().insert(cid.to_string());
            PinOutcome {
                success: true,
                cid: cid.to_string(),
                bytes_pinned: Some(1024),
                error: None,
                duration_ms: 10,
            }
        } else {
            PinOutcome {
                success: false,
                cid: cid.to_string(),
                bytes_pinned: None,
                error: self.error.lock().unwrap().clone().or_else(|| Some("mock pin failure".into())),
                duration_ms: 10,
            }
        }
    }

    async fn verify_pinned(&self, cid: &str) -> bool {
        self.pinned.lock().unwrap().contains(cid)
    }

    async fn unpin(&self, cid: &str) -> bool {
        self.pinned.lock().unwrap().remove(cid);
        true
    }
}

// ── Mock claim submitter ─────────────────────────────────────────────────────

pub struct MockSubmitter {
    pub succeed: AtomicBool,
    pub error: Mutex<Option<String>>,
    pub claim_calls: Mutex<Vec<SlotId>>,
}

impl MockSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            succeed: AtomicBool::new(true),
            error: Mutex::new(None),
            claim_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_with(&self, error: &str) {
        self.succeed.store(false, Ordering::SeqCst);
        *self.error.lock().unwrap() = Some(error.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.claim_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ClaimSubmitter for MockSubmitter {
    async fn submit_claim(&self, slot: SlotId) -> ClaimOutcome {
        self.claim_calls.lock().unwrap().push(slot);
        if self.succeed.load(Ordering::SeqCst) {
            ClaimOutcome {
                success: true,
                slot,
                amount_earned: None,
                tx_id: Some("mock_tx_abc123".to_string()),
                error: None,
            }
        } else {
            ClaimOutcome {
                success: false,
                slot,
                amount_earned: None,
                tx_id: None,
                error: self.error.lock().unwrap().clone().or_else(|| Some("mock claim failure".into())),
            }
        }
    }
}

// ── Mock verifier ────────────────────────────────────────────────────────────

pub struct MockVerifier {
    pub passed: AtomicBool,
    pub verify_calls: Mutex<Vec<(String, String, String)>>,
}

impl MockVerifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            passed: AtomicBool::new(true),
            verify_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.verify_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentVerifier for MockVerifier {
    async fn verify(&self, cid: &str, node_id: &str, multiaddr: &str) -> VerificationResult {
        self.verify_calls
            .lock()
            .unwrap()
            .push((cid.to_string(), node_id.to_string(), multiaddr.to_string()));
        let passed = self.passed.load(Ordering::SeqCst);
        VerificationResult {
            cid: cid.to_string(),
            claimant_node_id: node_id.to_string(),
            passed,
            method_used: "block_exchange".to_string(),
            methods_attempted: vec![MethodOutcome {
                method: VerifyMethod::BlockExchange,
                passed: Some(passed),
                detail: "mock".to_string(),
                duration_ms: 5,
            }],
            duration_ms: 5,
            checked_at: now_ts(),
        }
    }
}

// ── Mock dispute submitter ───────────────────────────────────────────────────

pub struct MockDisputes {
    pub succeed: AtomicBool,
    pub flag_calls: Mutex<Vec<String>>,
    disputed: Mutex<HashSet<String>>,
}

impl MockDisputes {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            succeed: AtomicBool::new(true),
            flag_calls: Mutex::new(Vec::new()),
            disputed: Mutex::new(HashSet::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.flag_calls.lock().unwrap().len()
    }

    pub fn mark_disputed(&self, claimant: &str) {
        self.disputed.lock().unwrap().insert(claimant.to_string());
    }
}

#[async_trait]
impl DisputeSubmitter for MockDisputes {
    async fn submit_dispute(&self, claimant: &str) -> DisputeOutcome {
        self.flag_calls.lock().unwrap().push(claimant.to_string());
        if self.succeed.load(Ordering::SeqCst) {
            self.disputed.lock().unwrap().insert(claimant.to_string());
            DisputeOutcome {
                success: true,
                claimant: claimant.to_string(),
                flag_count: Some(1),
                tx_id: Some("mock_flag_tx_123".to_string()),
                bounty_earned: None,
                error: None,
            }
        } else {
            DisputeOutcome {
                success: false,
                claimant: claimant.to_string(),
                flag_count: None,
                tx_id: None,
                bounty_earned: None,
                error: Some("mock flag failure".to_string()),
            }
        }
    }

    async fn has_already_disputed(&self, claimant: &str) -> Result<bool, PinfoldError> {
        Ok(self.disputed.lock().unwrap().contains(claimant))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub fn audit_config(failure_threshold: u32) -> AuditConfig {
    AuditConfig {
        enabled: true,
        cycle_interval: 10,
        check_timeout: 5,
        max_concurrent: 3,
        failure_threshold,
        cooldown_after_flag: 60,
        participant_cache_ttl: 300,
        verification_methods: vec![VerifyMethod::BlockExchange],
    }
}

pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub store: Arc<StateStore>,
    pub daemon: Daemon,
    pub shutdown: ShutdownHandle,
    pub facade: DataFacade,
    pub event_queue: Arc<Mutex<Vec<ContractEvent>>>,
    pub executor: Arc<MockExecutor>,
    pub submitter: Arc<MockSubmitter>,
    pub verifier: Arc<MockVerifier>,
    pub disputes: Arc<MockDisputes>,
    pub audit: Option<Arc<AuditOrchestrator>>,
    pub mode: Arc<ModeController>,
    pub params: Arc<PolicyParams>,
}

pub struct HarnessOptions {
    pub mode: Mode,
    pub queries: MockQueries,
    pub min_price: Amount,
    pub audit: Option<AuditConfig>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Autonomous,
            queries: MockQueries::default(),
            min_price: 100,
            audit: None,
        }
    }
}

pub fn build(options: HarnessOptions) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(StateStore::open(dir.path()).expect("open store"));
    let queries: Arc<dyn LedgerReader> = Arc::new(options.queries);
    let params = Arc::new(PolicyParams::new(options.min_price, 1_073_741_824));
    let filter = PolicyFilter::new(queries.clone(), OUR_ADDRESS, params.clone());
    let executor = MockExecutor::new();
    let submitter = MockSubmitter::new();
    let verifier = MockVerifier::new();
    let disputes = MockDisputes::new();
    let mode = Arc::new(ModeController::new(options.mode));
    let (poller, event_queue) = MockPoller::new();

    // Seed the persisted mode so Daemon::run's restore keeps the test's mode.
    store
        .set_runtime_config(Some(options.mode.as_str()), None, None)
        .expect("seed runtime config");

    let audit = options.audit.map(|config| {
        Arc::new(AuditOrchestrator::new(
            store.clone(),
            queries.clone(),
            verifier.clone() as Arc<dyn ContentVerifier>,
            disputes.clone() as Arc<dyn DisputeSubmitter>,
            config,
            OUR_ADDRESS,
        ))
    });

    let (daemon, shutdown) = Daemon::new(
        store.clone(),
        Box::new(poller),
        filter,
        executor.clone() as Arc<dyn PinExecutor>,
        submitter.clone() as Arc<dyn ClaimSubmitter>,
        mode.clone(),
        audit.clone(),
        Duration::from_millis(10),
        Duration::from_millis(10),
    );

    let facade = DataFacade::new(
        store.clone(),
        queries,
        mode.clone(),
        params.clone(),
        audit.clone(),
        OUR_ADDRESS,
    );

    Harness {
        _dir: dir,
        store,
        daemon,
        shutdown,
        facade,
        event_queue,
        executor,
        submitter,
        verifier,
        disputes,
        audit,
        mode,
        params,
    }
}

pub fn activity_types(store: &StateStore) -> Vec<String> {
    let mut entries = store.recent_activity(100).expect("activity");
    entries.reverse();
    entries.into_iter().map(|a| a.event_type).collect()
}
