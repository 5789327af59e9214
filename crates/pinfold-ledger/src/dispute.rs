//! Dispute submitter — submits `flag_pinner` transactions against claimants
//! that stopped serving content.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use pinfold_core::audit::DisputeOutcome;
use pinfold_core::error::PinfoldError;
use pinfold_core::traits::DisputeSubmitter;
use pinfold_core::types::{abbrev, Amount};
use pinfold_store::StateStore;

use crate::tx::{classify_contract_error, InvokeError, TxDriver};

pub struct FlagTxSubmitter {
    driver: TxDriver,
    store: Arc<StateStore>,
}

/// The contract returns either the bare flag count or an object carrying the
/// count plus a bounty when our flag crossed the deactivation threshold.
fn parse_flag_result(value: &Value) -> (Option<u32>, Option<Amount>) {
    if let Some(count) = value.as_u64() {
        return (Some(count as u32), None);
    }
    let count = value.get("flag_count").and_then(Value::as_u64).map(|c| c as u32);
    let bounty = value.get("bounty").and_then(Value::as_u64);
    (count, bounty)
}

impl FlagTxSubmitter {
    pub fn new(driver: TxDriver, store: Arc<StateStore>) -> Self {
        Self { driver, store }
    }
}

#[async_trait]
impl DisputeSubmitter for FlagTxSubmitter {
    async fn submit_dispute(&self, claimant: &str) -> DisputeOutcome {
        info!(claimant = abbrev(claimant, 16), "submitting flag_pinner");

        let args = vec![json!(self.driver.address()), json!(claimant)];
        match self.driver.invoke("flag_pinner", args).await {
            Ok(sent) => {
                let (flag_count, bounty_earned) = parse_flag_result(&sent.result);
                info!(
                    claimant = abbrev(claimant, 16),
                    ?flag_count,
                    tx = abbrev(&sent.hash, 16),
                    "flag_pinner succeeded"
                );
                DisputeOutcome {
                    success: true,
                    claimant: claimant.to_string(),
                    flag_count,
                    tx_id: Some(sent.hash),
                    bounty_earned,
                    error: None,
                }
            }
            Err(InvokeError::Simulation { message, code }) => {
                let class = classify_contract_error(code);
                if class == "already_flagged" {
                    info!(claimant = abbrev(claimant, 16), "already flagged");
                    return DisputeOutcome {
                        success: false,
                        claimant: claimant.to_string(),
                        flag_count: None,
                        tx_id: None,
                        bounty_earned: None,
                        error: Some("already_flagged".to_string()),
                    };
                }
                warn!(claimant = abbrev(claimant, 16), error = %message, "flag_pinner simulation failed");
                DisputeOutcome {
                    success: false,
                    claimant: claimant.to_string(),
                    flag_count: None,
                    tx_id: None,
                    bounty_earned: None,
                    error: Some(format!("simulation_failed:{class}")),
                }
            }
            Err(InvokeError::Transaction { message, code, hash }) => {
                let class = classify_contract_error(code);
                warn!(claimant = abbrev(claimant, 16), error = %message, "flag_pinner transaction failed");
                DisputeOutcome {
                    success: false,
                    claimant: claimant.to_string(),
                    flag_count: None,
                    tx_id: hash,
                    bounty_earned: None,
                    error: Some(format!("tx_failed:{class}")),
                }
            }
            Err(InvokeError::Rpc(e)) => {
                warn!(claimant = abbrev(claimant, 16), error = %e, "flag_pinner rpc error");
                DisputeOutcome {
                    success: false,
                    claimant: claimant.to_string(),
                    flag_count: None,
                    tx_id: None,
                    bounty_earned: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Checks the local flag history, not the chain; used by the scheduler to
    /// avoid wasted simulations.
    async fn has_already_disputed(&self, claimant: &str) -> Result<bool, PinfoldError> {
        let history = self.store.flag_history()?;
        Ok(history.iter().any(|f| f.claimant == claimant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_result_parses_both_shapes() {
        assert_eq!(parse_flag_result(&json!(3)), (Some(3), None));
        assert_eq!(
            parse_flag_result(&json!({ "flag_count": 5, "bounty": 1_000_000 })),
            (Some(5), Some(1_000_000))
        );
        assert_eq!(parse_flag_result(&json!(null)), (None, None));
    }
}
