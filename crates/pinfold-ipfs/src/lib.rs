//! pinfold-ipfs — clients for the local storage node's HTTP control API, the
//! gateway fetch → ingest → pin executor, and the audit probe verifier.

pub mod client;
pub mod executor;
pub mod verifier;

pub use client::StorageNodeClient;
pub use executor::GatewayPinExecutor;
pub use verifier::NodeProbeVerifier;
