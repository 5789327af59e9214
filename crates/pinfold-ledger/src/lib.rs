//! pinfold-ledger — everything that talks to the ledger RPC endpoint:
//! transport, signing, event ingestion, read-only contract queries, and the
//! claim/dispute transaction submitters.

pub mod claim;
pub mod dispute;
pub mod ingest;
pub mod keys;
pub mod queries;
pub mod rpc;
pub mod tx;

pub use claim::ClaimTxSubmitter;
pub use dispute::FlagTxSubmitter;
pub use ingest::ContractEventPoller;
pub use keys::AgentKeypair;
pub use queries::ContractQueries;
pub use rpc::LedgerRpcClient;
pub use tx::TxDriver;
