//! Configuration for the wallet.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tracing::warn;

use crate::{
    address::ChainId,
    chain_viewer::{DEFAULT_HEIGHT_TTL_SECS, DEFAULT_REQUIRED_CONFIRMATIONS},
    error::{Result, WalletError},
    rpc::RpcSettings,
    tx_builder::DEFAULT_TX_FEE,
};

/// Upper bound on `height_cache_ttl_secs` (one day).
const MAX_HEIGHT_CACHE_TTL_SECS: u64 = 86_400;

/// Wallet configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the chain node
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,

    /// Basic-auth user for the RPC endpoint
    #[serde(default)]
    pub rpc_username: Option<String>,

    /// Basic-auth password for the RPC endpoint
    #[serde(default)]
    pub rpc_password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,

    /// Chain the wallet's accounts live on
    #[serde(default)]
    pub chain_id: ChainId,

    /// Confirmations a block needs before it may join a ring
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u64,

    /// How long a fetched chain height is trusted
    #[serde(default = "default_height_cache_ttl")]
    pub height_cache_ttl_secs: u64,

    /// Transaction fee
    #[serde(default = "default_tx_fee")]
    pub tx_fee: u64,

    /// Wallet store file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_rpc_endpoint() -> String {
    "https://127.0.0.1:18665".to_string()
}

fn default_rpc_timeout() -> u64 {
    30
}

fn default_required_confirmations() -> u64 {
    DEFAULT_REQUIRED_CONFIRMATIONS
}

fn default_height_cache_ttl() -> u64 {
    DEFAULT_HEIGHT_TTL_SECS as u64
}

fn default_tx_fee() -> u64 {
    DEFAULT_TX_FEE
}

fn default_store_path() -> PathBuf {
    PathBuf::from("abel-wallet.json")
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: default_rpc_endpoint(),
            rpc_username: None,
            rpc_password: None,
            rpc_timeout_secs: default_rpc_timeout(),
            chain_id: 0,
            required_confirmations: default_required_confirmations(),
            height_cache_ttl_secs: default_height_cache_ttl(),
            tx_fee: default_tx_fee(),
            store_path: default_store_path(),
        }
    }
}

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("{}: {}", path.display(), e)))?;
        let config: WalletConfig =
            toml::from_str(&content).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_endpoint.trim().is_empty() {
            return Err(WalletError::Config("rpc_endpoint must not be empty".into()));
        }
        if self.required_confirmations == 0 {
            return Err(WalletError::Config(
                "required_confirmations must be at least 1".into(),
            ));
        }
        if self.height_cache_ttl_secs == 0 {
            return Err(WalletError::Config(
                "height_cache_ttl_secs must be at least 1".into(),
            ));
        }
        if self.height_cache_ttl_secs > MAX_HEIGHT_CACHE_TTL_SECS {
            return Err(WalletError::Config(format!(
                "height_cache_ttl_secs must be at most {}",
                MAX_HEIGHT_CACHE_TTL_SECS
            )));
        }
        if self.rpc_password.is_some() && self.rpc_username.is_none() {
            warn!("rpc_password is set without rpc_username and will be ignored");
        }
        Ok(())
    }

    pub fn rpc_settings(&self) -> RpcSettings {
        RpcSettings {
            endpoint: self.rpc_endpoint.clone(),
            username: self.rpc_username.clone(),
            password: self.rpc_password.clone(),
            timeout: Duration::from_secs(self.rpc_timeout_secs),
        }
    }

    pub fn height_cache_ttl(&self) -> chrono::Duration {
        let secs = self.height_cache_ttl_secs.min(MAX_HEIGHT_CACHE_TTL_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}
