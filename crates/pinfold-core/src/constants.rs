//! Protocol and policy constants.

use crate::types::Amount;

/// Stroops per XLM.
pub const STROOPS_PER_XLM: u64 = 10_000_000;

/// Estimated fee for one `collect_pin` transaction, in stroops
/// (0.01 XLM — conservative).
pub const ESTIMATED_TX_FEE: Amount = 100_000;

/// Default minimum offer price to accept (stroops per pin).
pub const DEFAULT_MIN_PRICE: Amount = 100;

/// Default maximum content size to fetch and pin (1 GiB).
pub const DEFAULT_MAX_CONTENT_SIZE: u64 = 1_073_741_824;

/// Seconds between main-loop polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Seconds to back off after a main-loop error.
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 30;

/// Total budget for one gateway fetch + pin, in seconds.
pub const DEFAULT_PIN_TIMEOUT_SECS: u64 = 60;

/// Gateway fetch attempts before giving up.
pub const DEFAULT_FETCH_RETRIES: u32 = 3;

// ── Audit defaults ───────────────────────────────────────────────────────────

pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 5;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN_AFTER_FLAG_SECS: u64 = 86_400;
pub const DEFAULT_PARTICIPANT_CACHE_TTL_SECS: u64 = 3600;

/// Bytes requested by the partial-retrieval verification method.
pub const PARTIAL_RETRIEVAL_BYTES: u64 = 1024;

/// Providers requested from the content-routing lookup.
pub const FINDPROVS_LIMIT: u32 = 20;

/// Format a stroop amount as a human-readable XLM string.
pub fn format_xlm(stroops: Amount) -> String {
    format!("{:.7} XLM", stroops as f64 / STROOPS_PER_XLM as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xlm_formatting() {
        assert_eq!(format_xlm(10_000_000), "1.0000000 XLM");
        assert_eq!(format_xlm(100_000), "0.0100000 XLM");
        assert_eq!(format_xlm(0), "0.0000000 XLM");
    }
}
