//! Gateway pin executor: fetch content bytes from the publisher gateway,
//! ingest into the local storage node, verify the resulting content-address,
//! then pin.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pinfold_core::records::PinOutcome;
use pinfold_core::traits::PinExecutor;
use pinfold_core::types::abbrev;

use crate::client::StorageNodeClient;

pub struct GatewayPinExecutor {
    node: StorageNodeClient,
    gateway_client: reqwest::Client,
    pin_timeout: Duration,
    max_content_size: u64,
    fetch_retries: u32,
}

enum FetchError {
    /// Code string surfaced in the outcome; never retried.
    Fatal(String),
    /// Timeout or 5xx; retried up to the configured attempt count.
    Retryable(String),
}

fn gateway_url(gateway: &str, cid: &str) -> String {
    format!("{}/ipfs/{}", gateway.trim_end_matches('/'), cid)
}

impl GatewayPinExecutor {
    pub fn new(
        node: StorageNodeClient,
        pin_timeout: Duration,
        max_content_size: u64,
        fetch_retries: u32,
    ) -> Self {
        Self {
            node,
            gateway_client: reqwest::Client::new(),
            pin_timeout,
            max_content_size,
            fetch_retries,
        }
    }

    /// One fetch attempt: stream the body, enforcing the size cap both from
    /// the Content-Length header and during streaming.
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .gateway_client
            .get(url)
            .timeout(self.pin_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Retryable("gateway_timeout".to_string())
                } else {
                    FetchError::Fatal(format!("network_error: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let code = format!("gateway_http_{}", status.as_u16());
            return if status.is_server_error() {
                Err(FetchError::Retryable(code))
            } else {
                Err(FetchError::Fatal(code))
            };
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_content_size {
                return Err(FetchError::Fatal("content_too_large".to_string()));
            }
        }

        let mut body = Vec::new();
        let mut resp = resp;
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() as u64 > self.max_content_size {
                        return Err(FetchError::Fatal("content_too_large".to_string()));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return if e.is_timeout() {
                        Err(FetchError::Retryable("gateway_timeout".to_string()))
                    } else {
                        Err(FetchError::Fatal(format!("network_error: {e}")))
                    };
                }
            }
        }
        Ok(body)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let mut last_error = String::new();
        for attempt in 1..=self.fetch_retries {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::Fatal(code)) => return Err(code),
                Err(FetchError::Retryable(code)) => {
                    warn!(url, attempt, retries = self.fetch_retries, code, "gateway fetch failed");
                    last_error = code;
                }
            }
        }
        Err(last_error)
    }

    fn outcome_err(cid: &str, error: String, started: Instant) -> PinOutcome {
        PinOutcome {
            success: false,
            cid: cid.to_string(),
            bytes_pinned: None,
            error: Some(error),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl PinExecutor for GatewayPinExecutor {
    async fn pin(&self, cid: &str, gateway: &str) -> PinOutcome {
        let started = Instant::now();
        let url = gateway_url(gateway, cid);
        debug!(cid = abbrev(cid, 24), url, "fetching from gateway");

        // 1. Gateway fetch.
        let bytes = match self.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(code) => return Self::outcome_err(cid, code, started),
        };
        let byte_count = bytes.len() as u64;

        // 2. Local ingest.
        let added = match self.node.add(bytes).await {
            Ok(added) => added,
            Err(e) => return Self::outcome_err(cid, format!("ingest_failure: {e}"), started),
        };

        // 3. The server-assigned address must equal the expected CID; a
        // mismatch means the gateway served wrong bytes and is never retried.
        if added.hash != cid {
            warn!(
                expected = abbrev(cid, 24),
                got = abbrev(&added.hash, 24),
                "content-address mismatch"
            );
            return Self::outcome_err(
                cid,
                format!("cid_mismatch: expected {cid}, got {}", added.hash),
                started,
            );
        }

        // 4. Pin — blocks are already local.
        if let Err(e) = self.node.pin_add(cid).await {
            return Self::outcome_err(cid, format!("local_pin_failure: {e}"), started);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(cid = abbrev(cid, 24), bytes = byte_count, duration_ms, "pinned");
        PinOutcome {
            success: true,
            cid: cid.to_string(),
            bytes_pinned: Some(byte_count),
            error: None,
            duration_ms,
        }
    }

    async fn verify_pinned(&self, cid: &str) -> bool {
        match self.node.pin_ls(cid).await {
            Ok(pinned) => pinned,
            Err(e) => {
                warn!(cid = abbrev(cid, 24), error = %e, "pin check failed");
                false
            }
        }
    }

    async fn unpin(&self, cid: &str) -> bool {
        match self.node.pin_rm(cid).await {
            Ok((200, _)) => true,
            // "not pinned" from the node counts as success: the goal state
            // already holds.
            Ok((_, body)) if body.to_lowercase().contains("not pinned") => true,
            Ok((status, body)) => {
                warn!(cid = abbrev(cid, 24), status, body = abbrev(&body, 120), "unpin failed");
                false
            }
            Err(e) => {
                warn!(cid = abbrev(cid, 24), error = %e, "unpin error");
                false
            }
        }
    }
}
