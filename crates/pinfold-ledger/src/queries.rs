//! Read-only contract queries. Every call is a simulation, no signing; any
//! RPC failure degrades to `None` (or zero balance) and a warning.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use pinfold_core::records::{ParticipantInfo, SlotInfo};
use pinfold_core::traits::LedgerReader;
use pinfold_core::types::{abbrev, Amount, SlotId};

use crate::rpc::LedgerRpcClient;

pub struct ContractQueries {
    rpc: LedgerRpcClient,
    contract_id: String,
    source: String,
}

#[derive(Deserialize)]
struct SlotBody {
    cid_hash: String,
    publisher: String,
    offer_price: u64,
    pin_qty: u32,
    pins_remaining: u32,
    escrow_balance: u64,
    created_at: i64,
    #[serde(default)]
    claims: Vec<String>,
}

#[derive(Deserialize)]
struct PinnerBody {
    address: String,
    node_id: String,
    multiaddr: String,
    active: bool,
    flags: u32,
    min_price: u64,
    pins_completed: u32,
    staked: u64,
    joined_at: i64,
}

impl ContractQueries {
    pub fn new(rpc: LedgerRpcClient, contract_id: &str, source: &str) -> Self {
        Self {
            rpc,
            contract_id: contract_id.to_string(),
            source: source.to_string(),
        }
    }

    /// Simulate a read-only contract function and return its result value.
    async fn read(&self, function: &str, args: Vec<Value>) -> Option<Value> {
        let call = json!({
            "source": self.source,
            "contract_id": self.contract_id,
            "function": function,
            "args": args,
        });
        match self.rpc.simulate(&call).await {
            Ok(sim) => {
                if let Some(err) = sim.error {
                    warn!(function, error = %err, "read simulation failed");
                    return None;
                }
                Some(sim.result)
            }
            Err(e) => {
                warn!(function, error = %e, "read call failed");
                None
            }
        }
    }

    async fn read_amount(&self, function: &str) -> Option<Amount> {
        self.read(function, vec![]).await.and_then(|v| v.as_u64())
    }

    // ── Contract parameters (outside the LedgerReader seam) ──────────────────

    /// Fee charged by the contract per pin request.
    pub async fn pin_fee(&self) -> Option<Amount> {
        self.read_amount("pin_fee").await
    }

    pub async fn min_offer_price(&self) -> Option<Amount> {
        self.read_amount("min_offer_price").await
    }

    pub async fn min_pin_qty(&self) -> Option<u32> {
        self.read("min_pin_qty", vec![])
            .await
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }

    pub async fn pinner_count(&self) -> Option<u64> {
        self.read("get_pinner_count", vec![]).await.and_then(|v| v.as_u64())
    }
}

#[async_trait]
impl LedgerReader for ContractQueries {
    async fn wallet_balance(&self, address: &str) -> Amount {
        match self.rpc.account_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(address = abbrev(address, 16), error = %e, "balance query failed");
                0
            }
        }
    }

    async fn slot(&self, slot: SlotId) -> Option<SlotInfo> {
        let value = self.read("get_slot", vec![json!(slot)]).await?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<SlotBody>(value) {
            Ok(body) => Some(SlotInfo {
                slot,
                cid_digest: body.cid_hash,
                publisher: body.publisher,
                offer_price: body.offer_price,
                pin_qty: body.pin_qty,
                pins_remaining: body.pins_remaining,
                escrow_balance: body.escrow_balance,
                created_at: body.created_at,
                claimants: body.claims,
            }),
            Err(e) => {
                warn!(slot, error = %e, "malformed slot response");
                None
            }
        }
    }

    async fn is_slot_expired(&self, slot: SlotId) -> Option<bool> {
        self.read("is_slot_expired", vec![json!(slot)])
            .await
            .and_then(|v| v.as_bool())
    }

    async fn participant(&self, address: &str) -> Option<ParticipantInfo> {
        let value = self.read("get_pinner", vec![json!(address)]).await?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<PinnerBody>(value) {
            Ok(body) => Some(ParticipantInfo {
                address: body.address,
                node_id: body.node_id,
                multiaddr: body.multiaddr,
                active: body.active,
                flags: body.flags,
                min_price: body.min_price,
                pins_completed: body.pins_completed,
                staked: body.staked,
                joined_at: body.joined_at,
            }),
            Err(e) => {
                warn!(address = abbrev(address, 16), error = %e, "malformed pinner response");
                None
            }
        }
    }

    async fn join_fee(&self) -> Option<Amount> {
        self.read_amount("join_fee").await
    }

    async fn stake_amount(&self) -> Option<Amount> {
        self.read_amount("pinner_stake_amount").await
    }
}
