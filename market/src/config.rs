//! Marketplace configuration
//!
//! ```toml
//! program_id = "4WpWUh3unfvEHRfmiRMDgRxcvMAaZ5hCn16KaVMDoy8x"
//!
//! [rpc]
//! cluster = "devnet"
//! commitment = "confirmed"
//!
//! [pinata]
//! api_key = "..."
//! secret_key = "..."
//! ```
//!
//! Every field has a default. Credentials are expected from the
//! environment rather than checked-in files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vidmarket_ledger::{Pubkey, RpcConfig};

use crate::program::DEFAULT_PROGRAM_ID;
use crate::storage::PinataConfig;

pub const ENV_RPC_URL: &str = "VIDMARKET_RPC_URL";
pub const ENV_PROGRAM_ID: &str = "VIDMARKET_PROGRAM_ID";
pub const ENV_PINATA_API_KEY: &str = "VIDMARKET_PINATA_API_KEY";
pub const ENV_PINATA_SECRET_KEY: &str = "VIDMARKET_PINATA_SECRET_KEY";

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid program id {value}: {reason}")]
    ProgramId { value: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Marketplace program address (base58)
    #[serde(default = "default_program_id")]
    pub program_id: String,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub pinata: PinataConfig,
}

fn default_program_id() -> String { DEFAULT_PROGRAM_ID.to_string() }

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
            rpc: RpcConfig::default(),
            pinata: PinataConfig::default(),
        }
    }
}

impl MarketConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `VIDMARKET_*` environment overrides.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc.url = Some(url);
        }
        if let Some(id) = lookup(ENV_PROGRAM_ID) {
            self.program_id = id;
        }
        if let Some(key) = lookup(ENV_PINATA_API_KEY) {
            self.pinata.api_key = Some(key);
        }
        if let Some(secret) = lookup(ENV_PINATA_SECRET_KEY) {
            self.pinata.secret_key = Some(secret);
        }
        self
    }

    pub fn program_address(&self) -> Result<Pubkey, ConfigError> {
        self.program_id
            .parse::<Pubkey>()
            .map_err(|e| ConfigError::ProgramId {
                value: self.program_id.clone(),
                reason: e.to_string(),
            })
    }
}
