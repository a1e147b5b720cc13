//! Print the effective configuration.

use abel_wallet::WalletConfig;
use anyhow::Result;

use super::print_success;

pub fn run(config: &WalletConfig) -> Result<()> {
    config.validate()?;

    let mut shown = config.clone();
    if shown.rpc_password.is_some() {
        shown.rpc_password = Some("********".to_string());
    }
    println!("{}", toml::to_string_pretty(&shown)?);
    print_success("Configuration is valid");

    Ok(())
}
