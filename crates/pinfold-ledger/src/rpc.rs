use serde::{Deserialize, Serialize};
use serde_json::Value;

use pinfold_core::error::PinfoldError;

/// JSON-RPC 2.0 client for the ledger RPC endpoint.
///
/// Uses raw HTTP POST with serde_json rather than a framework client to keep
/// the dependency surface lean; the handful of methods we call do not justify
/// more machinery.
#[derive(Clone)]
pub struct LedgerRpcClient {
    url: String,
    client: reqwest::Client,
}

// ── Wire DTOs ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LatestLedgerResponse {
    pub sequence: u64,
}

/// One raw contract event as returned by `getEvents`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    /// Event id in `{ledger}-{index}` form; doubles as the pagination cursor.
    pub id: String,
    pub ledger: u64,
    #[serde(default)]
    pub contract_id: String,
    /// Topic symbols, first entry names the event kind.
    pub topic: Vec<String>,
    /// Structured event body.
    pub value: Value,
    /// False when the emitting contract invocation failed.
    #[serde(default = "default_true")]
    pub in_successful_contract_call: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<EventInfo>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(rename = "type")]
    pub filter_type: &'static str,
    pub contract_ids: Vec<String>,
    pub topics: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub contract_error_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub hash: String,
    pub status: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub contract_error_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    #[serde(default)]
    pub balance: u64,
}

// ── Client ───────────────────────────────────────────────────────────────────

impl LedgerRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(&self, method: &str, params: Value) -> Result<Value, PinfoldError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PinfoldError::Rpc(format!("connecting to ledger at {}: {e}", self.url)))?;

        let json: Value = resp
            .json()
            .await
            .map_err(|e| PinfoldError::Rpc(format!("parsing {method} response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(PinfoldError::Rpc(format!("{method}: {err}")));
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn latest_ledger(&self) -> Result<u64, PinfoldError> {
        let result = self.call("getLatestLedger", serde_json::json!({})).await?;
        let parsed: LatestLedgerResponse = serde_json::from_value(result)
            .map_err(|e| PinfoldError::Rpc(format!("parsing latest ledger: {e}")))?;
        Ok(parsed.sequence)
    }

    /// Fetch contract events, either from `start_ledger` (first poll) or
    /// paginating forward from `cursor`.
    pub async fn get_events(
        &self,
        start_ledger: Option<u64>,
        cursor: Option<&str>,
        filters: &[EventFilter],
        limit: u64,
    ) -> Result<EventsResponse, PinfoldError> {
        let mut params = serde_json::json!({
            "filters": filters,
            "limit": limit,
        });
        if let Some(c) = cursor {
            params["cursor"] = Value::String(c.to_string());
        } else if let Some(s) = start_ledger {
            params["startLedger"] = Value::from(s);
        }
        let result = self.call("getEvents", params).await?;
        serde_json::from_value(result)
            .map_err(|e| PinfoldError::Rpc(format!("parsing events response: {e}")))
    }

    /// Native balance of an account in stroops.
    pub async fn account_balance(&self, address: &str) -> Result<u64, PinfoldError> {
        let result = self
            .call("getAccount", serde_json::json!({ "address": address }))
            .await?;
        let parsed: AccountResponse = serde_json::from_value(result)
            .map_err(|e| PinfoldError::Rpc(format!("parsing account response: {e}")))?;
        Ok(parsed.balance)
    }

    /// Simulate a contract invocation without signing or submitting.
    pub async fn simulate(&self, call: &Value) -> Result<SimulationResponse, PinfoldError> {
        let result = self
            .call("simulateTransaction", serde_json::json!({ "transaction": call }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| PinfoldError::Rpc(format!("parsing simulation response: {e}")))
    }

    /// Submit a signed transaction and wait for its result.
    pub async fn send(&self, signed: &Value) -> Result<SendResponse, PinfoldError> {
        let result = self
            .call("sendTransaction", serde_json::json!({ "transaction": signed }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| PinfoldError::Rpc(format!("parsing send response: {e}")))
    }
}
