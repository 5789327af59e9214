//! Contract event poller with a resumable cursor.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use pinfold_core::error::PinfoldError;
use pinfold_core::events::{ClaimedEvent, ContractEvent, FreedEvent, PinEvent};
use pinfold_core::traits::EventSource;

use crate::rpc::{EventFilter, EventInfo, LedgerRpcClient};

const TOPIC_PIN: &str = "PIN";
const TOPIC_CLAIMED: &str = "PINNED";
const TOPIC_FREED: &str = "UNPIN";

const PAGE_LIMIT: u64 = 100;

// ── Event body DTOs ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PinBody {
    slot: u64,
    cid: String,
    #[serde(default)]
    filename: String,
    gateway: String,
    offer_price: u64,
    pin_qty: u32,
    publisher: String,
}

#[derive(Deserialize)]
struct ClaimedBody {
    slot: u64,
    cid_hash: String,
    pinner: String,
    amount: u64,
    pins_remaining: u32,
}

#[derive(Deserialize)]
struct FreedBody {
    slot: u64,
    cid_hash: String,
}

/// Decode one raw event. Returns `None` for unrecognized topics (forward
/// compatibility) and for malformed bodies, which are logged and skipped.
fn parse_event(info: &EventInfo) -> Option<ContractEvent> {
    let kind = info.topic.first()?.as_str();
    let result = match kind {
        TOPIC_PIN => serde_json::from_value::<PinBody>(info.value.clone())
            .map(|b| {
                ContractEvent::Pin(PinEvent {
                    slot: b.slot,
                    cid: b.cid,
                    filename: b.filename,
                    gateway: b.gateway,
                    offer_price: b.offer_price,
                    pin_qty: b.pin_qty,
                    publisher: b.publisher,
                    ledger_sequence: info.ledger,
                })
            })
            .map_err(|e| e.to_string()),
        TOPIC_CLAIMED => serde_json::from_value::<ClaimedBody>(info.value.clone())
            .map(|b| {
                ContractEvent::Claimed(ClaimedEvent {
                    slot: b.slot,
                    cid_digest: b.cid_hash,
                    claimant: b.pinner,
                    amount: b.amount,
                    pins_remaining: b.pins_remaining,
                    ledger_sequence: info.ledger,
                })
            })
            .map_err(|e| e.to_string()),
        TOPIC_FREED => serde_json::from_value::<FreedBody>(info.value.clone())
            .map(|b| {
                ContractEvent::Freed(FreedEvent {
                    slot: b.slot,
                    cid_digest: b.cid_hash,
                    ledger_sequence: info.ledger,
                })
            })
            .map_err(|e| e.to_string()),
        other => {
            debug!(kind = other, "ignoring unrecognized event kind");
            return None;
        }
    };

    match result {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(event_id = %info.id, kind, error = %e, "failed to decode event, skipping");
            None
        }
    }
}

/// Polls the ledger RPC for pin-market contract events.
///
/// Filters by contract id and the three topic symbols. Maintains an event-id
/// cursor (`{ledger}-{index}`) for pagination; on first poll without a cursor
/// it starts from the current ledger tip (or a configured start sequence).
pub struct ContractEventPoller {
    rpc: LedgerRpcClient,
    contract_id: String,
    cursor: Option<String>,
    start_ledger: Option<u64>,
}

impl ContractEventPoller {
    pub fn new(rpc: LedgerRpcClient, contract_id: &str, start_ledger: Option<u64>) -> Self {
        Self {
            rpc,
            contract_id: contract_id.to_string(),
            cursor: None,
            start_ledger,
        }
    }

    fn filters(&self) -> Vec<EventFilter> {
        vec![EventFilter {
            filter_type: "contract",
            contract_ids: vec![self.contract_id.clone()],
            topics: vec![vec![
                TOPIC_PIN.to_string(),
                TOPIC_CLAIMED.to_string(),
                TOPIC_FREED.to_string(),
            ]],
        }]
    }
}

#[async_trait]
impl EventSource for ContractEventPoller {
    async fn poll(&mut self) -> Result<Vec<ContractEvent>, PinfoldError> {
        let filters = self.filters();
        let response = if self.cursor.is_some() {
            self.rpc
                .get_events(None, self.cursor.as_deref(), &filters, PAGE_LIMIT)
                .await?
        } else {
            let start = match self.start_ledger {
                Some(s) => s,
                None => {
                    let tip = self.rpc.latest_ledger().await?;
                    info!(ledger = tip, "no cursor, starting from latest ledger");
                    tip
                }
            };
            self.rpc
                .get_events(Some(start), None, &filters, PAGE_LIMIT)
                .await?
        };

        let mut events = Vec::new();
        for info in &response.events {
            if !info.in_successful_contract_call {
                continue;
            }
            if let Some(event) = parse_event(info) {
                events.push(event);
            }
        }

        // Advance only after a successful response: last event id wins,
        // otherwise the server-provided continuation cursor.
        if let Some(last) = response.events.last() {
            self.cursor = Some(last.id.clone());
        } else if let Some(cursor) = response.cursor {
            self.cursor = Some(cursor);
        }

        if !events.is_empty() {
            info!(count = events.len(), cursor = ?self.cursor, "polled events");
        }
        Ok(events)
    }

    fn cursor_ledger(&self) -> Option<u64> {
        // Event ids are `{ledger}-{index}`; the ledger prefix is what the
        // store persists.
        self.cursor
            .as_ref()
            .and_then(|c| c.split('-').next())
            .and_then(|l| l.parse().ok())
    }

    fn restore_cursor(&mut self, ledger: u64) {
        self.cursor = Some(format!("{ledger}-0"));
    }
}
