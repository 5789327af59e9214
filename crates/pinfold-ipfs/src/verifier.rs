//! Probe verifier: multi-method check that a claimant's node is actually
//! serving a CID.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use pinfold_core::audit::{MethodOutcome, VerificationResult, VerifyMethod};
use pinfold_core::constants::{FINDPROVS_LIMIT, PARTIAL_RETRIEVAL_BYTES};
use pinfold_core::traits::ContentVerifier;
use pinfold_core::types::{abbrev, now_ts};

use crate::client::StorageNodeClient;

pub struct NodeProbeVerifier {
    node: StorageNodeClient,
    check_timeout: Duration,
    methods: Vec<VerifyMethod>,
}

/// Scan a `routing/findprovs` NDJSON body for a provider id. Malformed lines
/// are skipped.
fn findprovs_contains(body: &str, node_id: &str) -> bool {
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        let Some(responses) = entry.get("Responses").and_then(|r| r.as_array()) else {
            continue;
        };
        if responses
            .iter()
            .any(|r| r.get("ID").and_then(|id| id.as_str()) == Some(node_id))
        {
            return true;
        }
    }
    false
}

impl NodeProbeVerifier {
    pub fn new(node: StorageNodeClient, check_timeout: Duration, methods: Vec<VerifyMethod>) -> Self {
        Self {
            node,
            check_timeout,
            methods,
        }
    }

    /// Provider lookup. Absence is not proof of non-service (propagation
    /// lag), so anything short of a positive match is inconclusive.
    async fn check_provider_advertisement(&self, cid: &str, node_id: &str) -> MethodOutcome {
        let started = Instant::now();
        let lookup = tokio::time::timeout(self.check_timeout, self.node.findprovs(cid, FINDPROVS_LIMIT));
        let (passed, detail) = match lookup.await {
            Ok(Ok(body)) => {
                if findprovs_contains(&body, node_id) {
                    (Some(true), format!("node listed as provider for {}", abbrev(cid, 16)))
                } else {
                    (None, format!("not among first {FINDPROVS_LIMIT} providers"))
                }
            }
            Ok(Err(e)) => (None, format!("provider lookup error: {e}")),
            Err(_) => (None, "provider lookup timed out".to_string()),
        };
        MethodOutcome {
            method: VerifyMethod::ProviderAdvertisement,
            passed,
            detail,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Connect to the claimant and request a block. This is the definitive
    /// method: a failed connect, timeout, or empty response is a hard fail.
    async fn check_block_exchange(&self, cid: &str, multiaddr: &str) -> MethodOutcome {
        let started = Instant::now();
        let probe = async {
            if !self.node.swarm_connect(multiaddr).await.unwrap_or(false) {
                return (Some(false), "failed to connect to claimant".to_string());
            }
            match self.node.block_get(cid).await {
                Ok(block) if !block.is_empty() => {
                    (Some(true), format!("block retrieved ({} bytes)", block.len()))
                }
                Ok(_) => (Some(false), "empty block response".to_string()),
                Err(e) => (Some(false), format!("block not available: {e}")),
            }
        };
        let (passed, detail) = match tokio::time::timeout(self.check_timeout, probe).await {
            Ok(outcome) => outcome,
            Err(_) => (Some(false), "block exchange timed out".to_string()),
        };
        MethodOutcome {
            method: VerifyMethod::BlockExchange,
            passed,
            detail,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn check_partial_retrieval(&self, cid: &str) -> MethodOutcome {
        let started = Instant::now();
        let fetch = tokio::time::timeout(
            self.check_timeout,
            self.node.cat(cid, PARTIAL_RETRIEVAL_BYTES),
        );
        let (passed, detail) = match fetch.await {
            Ok(Ok(bytes)) if !bytes.is_empty() => {
                (Some(true), format!("retrieved {} bytes", bytes.len()))
            }
            Ok(Ok(_)) => (Some(false), "empty retrieval".to_string()),
            Ok(Err(e)) => (Some(false), format!("retrieval error: {e}")),
            Err(_) => (Some(false), "retrieval timed out".to_string()),
        };
        MethodOutcome {
            method: VerifyMethod::PartialRetrieval,
            passed,
            detail,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl ContentVerifier for NodeProbeVerifier {
    /// Run the configured methods in order. The pipeline stops on the first
    /// `true`, or on a definitive block-exchange `false`.
    async fn verify(&self, cid: &str, node_id: &str, multiaddr: &str) -> VerificationResult {
        let started = Instant::now();
        let mut methods_attempted = Vec::new();
        let mut passed = false;
        let mut method_used = "none".to_string();

        for method in &self.methods {
            let outcome = match method {
                VerifyMethod::ProviderAdvertisement => {
                    self.check_provider_advertisement(cid, node_id).await
                }
                VerifyMethod::BlockExchange => self.check_block_exchange(cid, multiaddr).await,
                VerifyMethod::PartialRetrieval => self.check_partial_retrieval(cid).await,
            };
            debug!(
                cid = abbrev(cid, 16),
                method = %outcome.method,
                passed = ?outcome.passed,
                "verification method finished"
            );
            let verdict = outcome.passed;
            methods_attempted.push(outcome);

            if verdict == Some(true) {
                passed = true;
                method_used = method.as_str().to_string();
                break;
            }
            if verdict == Some(false) && *method == VerifyMethod::BlockExchange {
                method_used = method.as_str().to_string();
                break;
            }
        }

        VerificationResult {
            cid: cid.to_string(),
            claimant_node_id: node_id.to_string(),
            passed,
            method_used,
            methods_attempted,
            duration_ms: started.elapsed().as_millis() as u64,
            checked_at: now_ts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findprovs_matches_provider_ids() {
        let body = concat!(
            r#"{"Responses":[{"ID":"12D3KooWAlpha"}]}"#,
            "\n",
            r#"{"Responses":[{"ID":"12D3KooWBeta"},{"ID":"12D3KooWGamma"}]}"#,
            "\n",
            "not json\n",
        );
        assert!(findprovs_contains(body, "12D3KooWGamma"));
        assert!(!findprovs_contains(body, "12D3KooWDelta"));
    }

    #[test]
    fn findprovs_handles_empty_and_null_responses() {
        assert!(!findprovs_contains("", "12D3KooWAlpha"));
        assert!(!findprovs_contains(r#"{"Responses":null}"#, "12D3KooWAlpha"));
    }
}
