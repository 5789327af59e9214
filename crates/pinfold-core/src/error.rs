use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinfoldError {
    // ── Storage ──────────────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // ── Ledger RPC ───────────────────────────────────────────────────────────
    #[error("ledger rpc error: {0}")]
    Rpc(String),

    #[error("event decode error: {0}")]
    Decode(String),

    #[error("transaction simulation failed: {0}")]
    Simulation(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    // ── Keys ─────────────────────────────────────────────────────────────────
    #[error("invalid signing secret: {0}")]
    InvalidSecret(String),

    // ── HTTP (gateway / storage node) ────────────────────────────────────────
    #[error("http error: {0}")]
    Http(String),

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown mode: {0} (expected 'autonomous' or 'operator_approved')")]
    UnknownMode(String),

    #[error("unknown verification method: {0}")]
    UnknownVerifyMethod(String),
}
