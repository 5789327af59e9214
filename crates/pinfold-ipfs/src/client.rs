//! Thin client for the storage node's `/api/v0/` HTTP control interface.

use serde::Deserialize;
use tracing::warn;

use pinfold_core::error::PinfoldError;

/// All endpoints are POST, Kubo-style. Callers apply their own deadlines.
#[derive(Clone)]
pub struct StorageNodeClient {
    base_url: String,
    client: reqwest::Client,
}

/// Response from the `add` endpoint.
#[derive(Debug, Deserialize)]
pub struct AddResponse {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size")]
    pub size: String,
}

fn http_err(e: impl std::fmt::Display) -> PinfoldError {
    PinfoldError::Http(e.to_string())
}

impl StorageNodeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v0/{}", self.base_url, endpoint)
    }

    /// Ingest raw bytes. Chunker and hash parameters are pinned so the
    /// server-assigned address is deterministic for the byte content, which
    /// is what makes the executor's address-equality check meaningful.
    pub async fn add(&self, bytes: Vec<u8>) -> Result<AddResponse, PinfoldError> {
        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name("blob"));
        let resp = self
            .client
            .post(self.url("add"))
            .query(&[
                ("chunker", "size-262144"),
                ("hash", "sha2-256"),
                ("cid-version", "0"),
                ("pin", "false"),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(http_err)?;
        let resp = resp.error_for_status().map_err(http_err)?;
        resp.json().await.map_err(http_err)
    }

    /// Pin an already-local CID; constant-time once the blocks are ingested.
    pub async fn pin_add(&self, cid: &str) -> Result<(), PinfoldError> {
        let resp = self
            .client
            .post(self.url("pin/add"))
            .query(&[("arg", cid), ("progress", "false")])
            .send()
            .await
            .map_err(http_err)?;
        resp.error_for_status().map_err(http_err)?;
        Ok(())
    }

    /// Remove a pin. Returns the status code and body so the caller can treat
    /// "not pinned" as success.
    pub async fn pin_rm(&self, cid: &str) -> Result<(u16, String), PinfoldError> {
        let resp = self
            .client
            .post(self.url("pin/rm"))
            .query(&[("arg", cid)])
            .send()
            .await
            .map_err(http_err)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Whether `cid` is recursively pinned on the local node.
    pub async fn pin_ls(&self, cid: &str) -> Result<bool, PinfoldError> {
        let resp = self
            .client
            .post(self.url("pin/ls"))
            .query(&[("arg", cid), ("type", "recursive")])
            .send()
            .await
            .map_err(http_err)?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: serde_json::Value = resp.json().await.map_err(http_err)?;
        Ok(body
            .get("Keys")
            .and_then(|k| k.get(cid))
            .is_some())
    }

    /// Request a single block for `cid`, pulling it over the block-exchange
    /// protocol if a connected peer has it.
    pub async fn block_get(&self, cid: &str) -> Result<Vec<u8>, PinfoldError> {
        let resp = self
            .client
            .post(self.url("block/get"))
            .query(&[("arg", cid)])
            .send()
            .await
            .map_err(http_err)?;
        let resp = resp.error_for_status().map_err(http_err)?;
        Ok(resp.bytes().await.map_err(http_err)?.to_vec())
    }

    /// Retrieve the first `length` bytes of `cid`.
    pub async fn cat(&self, cid: &str, length: u64) -> Result<Vec<u8>, PinfoldError> {
        let resp = self
            .client
            .post(self.url("cat"))
            .query(&[("arg", cid), ("length", &length.to_string())])
            .send()
            .await
            .map_err(http_err)?;
        let resp = resp.error_for_status().map_err(http_err)?;
        Ok(resp.bytes().await.map_err(http_err)?.to_vec())
    }

    /// Issue a connect instruction to a peer multiaddress.
    pub async fn swarm_connect(&self, multiaddr: &str) -> Result<bool, PinfoldError> {
        let resp = self
            .client
            .post(self.url("swarm/connect"))
            .query(&[("arg", multiaddr)])
            .send()
            .await
            .map_err(http_err)?;
        Ok(resp.status().is_success())
    }

    /// Provider lookup for `cid`; returns the raw NDJSON body.
    pub async fn findprovs(&self, cid: &str, num_providers: u32) -> Result<String, PinfoldError> {
        let resp = self
            .client
            .post(self.url("routing/findprovs"))
            .query(&[("arg", cid), ("num-providers", &num_providers.to_string())])
            .send()
            .await
            .map_err(http_err)?;
        let resp = resp.error_for_status().map_err(http_err)?;
        resp.text().await.map_err(http_err)
    }

    /// Cumulative size of an object, when the node can report it.
    pub async fn object_stat(&self, cid: &str) -> Option<u64> {
        let resp = self
            .client
            .post(self.url("object/stat"))
            .query(&[("arg", cid)])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        body.get("CumulativeSize").and_then(|v| v.as_u64())
    }

    /// The local node's peer identity.
    pub async fn node_id(&self) -> Option<String> {
        let resp = self.client.post(self.url("id")).send().await.ok()?;
        if !resp.status().is_success() {
            warn!(status = resp.status().as_u16(), "id endpoint returned error");
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        body.get("ID").and_then(|v| v.as_str()).map(str::to_string)
    }
}
