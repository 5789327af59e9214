//! Configuration loading: TOML file merged under environment-variable
//! overrides (highest priority), with defaults for everything else.

use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;

use pinfold_core::config::AuditConfig;
use pinfold_core::constants::*;
use pinfold_core::error::PinfoldError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub mode: String,
    pub poll_interval: u64,
    pub error_backoff: u64,
    pub log_level: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            mode: "autonomous".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL_SECS,
            error_backoff: DEFAULT_ERROR_BACKOFF_SECS,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    pub rpc_url: String,
    pub network_passphrase: String,
    pub contract_id: String,
    /// Hex-encoded signing secret; usually supplied via `PINFOLD_SECRET`.
    pub secret: String,
    /// Optional explicit start sequence for the first poll.
    pub start_ledger: Option<u64>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc.testnet.pinfold.example".to_string(),
            network_passphrase: "Pinfold Test Network ; 2025".to_string(),
            contract_id: String::new(),
            secret: String::new(),
            start_ledger: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpfsSection {
    pub node_rpc_url: String,
    pub gateway_fetch_timeout: u64,
    pub max_content_size: u64,
    pub fetch_retries: u32,
}

impl Default for IpfsSection {
    fn default() -> Self {
        Self {
            node_rpc_url: "http://127.0.0.1:5001".to_string(),
            gateway_fetch_timeout: DEFAULT_PIN_TIMEOUT_SECS,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            fetch_retries: DEFAULT_FETCH_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub min_price: u64,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            min_price: DEFAULT_MIN_PRICE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub database_path: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database_path: "~/.pinfold/state".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub daemon: DaemonSection,
    pub ledger: LedgerSection,
    pub ipfs: IpfsSection,
    pub policy: PolicySection,
    pub store: StoreSection,
    pub audit: AuditConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daemon: DaemonSection::default(),
            ledger: LedgerSection::default(),
            ipfs: IpfsSection::default(),
            policy: PolicySection::default(),
            store: StoreSection::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, then apply environment
    /// overrides (highest priority).
    pub fn load(config_path: Option<&Path>) -> Result<Self, PinfoldError> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            let path = expand_tilde(path);
            builder = builder.add_source(File::from(path));
        }
        let mut settings: Settings = builder
            .build()
            .map_err(|e| PinfoldError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PinfoldError::Config(e.to_string()))?;

        settings.apply_env_overrides();
        settings.store.database_path = expand_tilde(Path::new(&settings.store.database_path))
            .to_string_lossy()
            .into_owned();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("PINFOLD_SECRET") {
            self.ledger.secret = secret;
        }
        if let Ok(rpc) = std::env::var("PINFOLD_RPC_URL") {
            self.ledger.rpc_url = rpc;
        }
        if let Ok(contract) = std::env::var("PINFOLD_CONTRACT_ID") {
            self.ledger.contract_id = contract;
        }
        if let Ok(mode) = std::env::var("PINFOLD_MODE") {
            self.daemon.mode = mode;
        }
    }

    /// Startup validation for commands that sign transactions. Failures here
    /// are fatal before any network call.
    pub fn require_secret(&self) -> Result<(), PinfoldError> {
        if self.ledger.secret.is_empty() {
            return Err(PinfoldError::Config(
                "no signing secret configured; set PINFOLD_SECRET or [ledger] secret".to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_contract(&self) -> Result<(), PinfoldError> {
        if self.ledger.contract_id.is_empty() {
            return Err(PinfoldError::Config(
                "no contract id configured; set PINFOLD_CONTRACT_ID or [ledger] contract_id"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
