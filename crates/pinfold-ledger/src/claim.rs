//! Claim submitter — submits `collect_pin` transactions.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use pinfold_core::records::ClaimOutcome;
use pinfold_core::traits::ClaimSubmitter;
use pinfold_core::types::{abbrev, SlotId};

use crate::tx::{classify_contract_error, InvokeError, TxDriver};

pub struct ClaimTxSubmitter {
    driver: TxDriver,
}

impl ClaimTxSubmitter {
    pub fn new(driver: TxDriver) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ClaimSubmitter for ClaimTxSubmitter {
    /// Build, simulate, sign, and submit a `collect_pin` transaction.
    ///
    /// The amount earned equals the slot's offer price, which the daemon loop
    /// fills in from the offer record; only the transaction hash is known
    /// here.
    async fn submit_claim(&self, slot: SlotId) -> ClaimOutcome {
        info!(slot, "submitting collect_pin");

        let args = vec![json!(self.driver.address()), json!(slot)];
        match self.driver.invoke("collect_pin", args).await {
            Ok(sent) => {
                info!(slot, tx = abbrev(&sent.hash, 16), "collect_pin succeeded");
                ClaimOutcome {
                    success: true,
                    slot,
                    amount_earned: None,
                    tx_id: Some(sent.hash),
                    error: None,
                }
            }
            Err(InvokeError::Simulation { message, code }) => {
                let class = classify_contract_error(code);
                warn!(slot, class, error = %message, "collect_pin simulation failed");
                ClaimOutcome {
                    success: false,
                    slot,
                    amount_earned: None,
                    tx_id: None,
                    error: Some(format!("simulation_failed:{class}")),
                }
            }
            Err(InvokeError::Transaction { message, code, hash }) => {
                let class = classify_contract_error(code);
                warn!(slot, class, error = %message, "collect_pin transaction failed");
                ClaimOutcome {
                    success: false,
                    slot,
                    amount_earned: None,
                    tx_id: hash,
                    error: Some(format!("tx_failed:{class}")),
                }
            }
            Err(InvokeError::Rpc(e)) => {
                warn!(slot, error = %e, "collect_pin rpc error");
                ClaimOutcome {
                    success: false,
                    slot,
                    amount_earned: None,
                    tx_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
