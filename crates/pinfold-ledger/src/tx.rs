//! Contract invocation building, signing, and the simulate → sign → submit
//! driver shared by the claim and dispute submitters (and the registration
//! commands).

use serde::Serialize;
use serde_json::Value;

use pinfold_core::error::PinfoldError;

use crate::keys::AgentKeypair;
use crate::rpc::{LedgerRpcClient, SendResponse};

/// Known contract error codes emitted by the pin-market contract.
pub mod contract_errors {
    pub const NOT_PINNER: u32 = 1;
    pub const PINNER_INACTIVE: u32 = 2;
    pub const SLOT_NOT_ACTIVE: u32 = 3;
    pub const SLOT_EXPIRED: u32 = 4;
    pub const ALREADY_CLAIMED: u32 = 5;
    pub const ALREADY_FLAGGED: u32 = 6;
}

/// Map a contract error code to the stable classification string surfaced in
/// outcomes.
pub fn classify_contract_error(code: Option<u32>) -> &'static str {
    match code {
        Some(contract_errors::ALREADY_CLAIMED) => "already_claimed",
        Some(contract_errors::SLOT_EXPIRED) => "slot_expired",
        Some(contract_errors::SLOT_NOT_ACTIVE) => "slot_not_active",
        Some(contract_errors::NOT_PINNER) => "not_pinner",
        Some(contract_errors::PINNER_INACTIVE) => "pinner_inactive",
        Some(contract_errors::ALREADY_FLAGGED) => "already_flagged",
        _ => "unknown",
    }
}

/// A contract invocation. Field order is the canonical signing order; the
/// signature covers the serde_json bytes of this struct.
#[derive(Debug, Clone, Serialize)]
pub struct ContractCall {
    pub source: String,
    pub contract_id: String,
    pub function: String,
    pub args: Vec<Value>,
}

impl ContractCall {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, PinfoldError> {
        serde_json::to_vec(self).map_err(|e| PinfoldError::Serialization(e.to_string()))
    }
}

/// Failure modes of an invocation, split so callers can classify by phase.
#[derive(Debug)]
pub enum InvokeError {
    /// The pre-flight simulation rejected the call.
    Simulation { message: String, code: Option<u32> },
    /// The transaction was submitted but failed on-chain.
    Transaction {
        message: String,
        code: Option<u32>,
        hash: Option<String>,
    },
    /// Transport-level failure before any verdict.
    Rpc(PinfoldError),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::Simulation { message, .. } => write!(f, "simulation failed: {message}"),
            InvokeError::Transaction { message, .. } => write!(f, "transaction failed: {message}"),
            InvokeError::Rpc(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for InvokeError {}

/// Drives a full invocation: build → simulate (fail fast) → sign → submit.
/// Signatures are domain-separated by the network passphrase so a testnet
/// transaction can never replay on mainnet.
#[derive(Clone)]
pub struct TxDriver {
    rpc: LedgerRpcClient,
    contract_id: String,
    network_passphrase: String,
    address: String,
    keypair: std::sync::Arc<AgentKeypair>,
}

impl TxDriver {
    pub fn new(
        rpc: LedgerRpcClient,
        contract_id: &str,
        network_passphrase: &str,
        keypair: std::sync::Arc<AgentKeypair>,
    ) -> Self {
        Self {
            rpc,
            contract_id: contract_id.to_string(),
            network_passphrase: network_passphrase.to_string(),
            address: keypair.address().to_string(),
            keypair,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn invoke(&self, function: &str, args: Vec<Value>) -> Result<SendResponse, InvokeError> {
        let call = ContractCall {
            source: self.address.clone(),
            contract_id: self.contract_id.clone(),
            function: function.to_string(),
            args,
        };
        let call_json = serde_json::to_value(&call)
            .map_err(|e| InvokeError::Rpc(PinfoldError::Serialization(e.to_string())))?;

        let sim = self.rpc.simulate(&call_json).await.map_err(InvokeError::Rpc)?;
        if let Some(message) = sim.error {
            return Err(InvokeError::Simulation {
                message,
                code: sim.contract_error_code,
            });
        }

        let mut message = self.network_passphrase.as_bytes().to_vec();
        message.extend_from_slice(&call.canonical_bytes().map_err(InvokeError::Rpc)?);
        let signed = serde_json::json!({
            "call": call_json,
            "signature": self.keypair.sign(&message),
        });

        let sent = self.rpc.send(&signed).await.map_err(InvokeError::Rpc)?;
        if sent.status != "SUCCESS" {
            return Err(InvokeError::Transaction {
                message: sent.error.unwrap_or_else(|| sent.status.clone()),
                code: sent.contract_error_code,
                hash: Some(sent.hash),
            });
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_every_known_code() {
        assert_eq!(classify_contract_error(Some(5)), "already_claimed");
        assert_eq!(classify_contract_error(Some(4)), "slot_expired");
        assert_eq!(classify_contract_error(Some(3)), "slot_not_active");
        assert_eq!(classify_contract_error(Some(1)), "not_pinner");
        assert_eq!(classify_contract_error(Some(2)), "pinner_inactive");
        assert_eq!(classify_contract_error(Some(6)), "already_flagged");
        assert_eq!(classify_contract_error(Some(999)), "unknown");
        assert_eq!(classify_contract_error(None), "unknown");
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let call = ContractCall {
            source: "SRC".into(),
            contract_id: "C1".into(),
            function: "collect_pin".into(),
            args: vec![serde_json::json!("SRC"), serde_json::json!(7)],
        };
        assert_eq!(call.canonical_bytes().unwrap(), call.canonical_bytes().unwrap());
    }
}
