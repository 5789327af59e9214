use sha2::{Digest, Sha256};

/// Slot identifier assigned by the pin-market contract to an offer.
pub type SlotId = u64;

/// Amount in stroops, the smallest unit of the ledger's native asset
/// (1 XLM = 10_000_000 stroops).
pub type Amount = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Current wall-clock as a unix timestamp.
pub fn now_ts() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// SHA-256 hex digest of a CID string, matching the `cid_hash` the contract
/// carries on CLAIMED/FREED events.
pub fn cid_digest(cid: &str) -> String {
    hex::encode(Sha256::digest(cid.as_bytes()))
}

/// Truncate an identifier for log output. Addresses and CIDs are long and
/// a prefix is enough to correlate lines.
pub fn abbrev(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}
