//! CLI Commands

pub mod block;
pub mod coins;
pub mod config;
pub mod info;
pub mod pending;
pub mod ring;

use abel_wallet::{rpc::JsonRpcClient, ChainViewer, WalletConfig, WalletStore};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file used when `--config` is not given.
fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".abel-wallet").join("config.toml"))
}

/// Load the config at `path`, or the default config file if present, or the
/// built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<WalletConfig> {
    if let Some(path) = path {
        return WalletConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => WalletConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => {
            debug!("No config file found, using defaults");
            Ok(WalletConfig::default())
        }
    }
}

/// A chain viewer for height queries. No accounts are registered, so it
/// carries no crypto engine.
pub fn chain_viewer(config: &WalletConfig) -> Result<ChainViewer<JsonRpcClient, ()>> {
    let client = JsonRpcClient::new(config.rpc_settings())?;
    let mut viewer = ChainViewer::new(client, ()).with_height_ttl(config.height_cache_ttl());
    viewer.set_required_confirmations(config.required_confirmations);
    Ok(viewer)
}

pub fn open_store(config: &WalletConfig) -> Result<WalletStore> {
    WalletStore::open(&config.store_path)
        .with_context(|| format!("Failed to open wallet store {}", config.store_path.display()))
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}
