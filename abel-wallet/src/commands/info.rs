//! Chain height overview.

use abel_wallet::WalletConfig;
use anyhow::Result;

use super::{chain_viewer, print_warning};

pub fn run(config: &WalletConfig) -> Result<()> {
    let mut viewer = chain_viewer(config)?;

    let latest = viewer.get_latest_height()?;
    println!();
    println!("Node:                   {}", viewer.rpc().endpoint());
    println!("Latest height:          {}", latest);
    println!("Required confirmations: {}", viewer.required_confirmations());
    println!("Transaction fee:        {}", config.tx_fee);

    match viewer.get_latest_safe_height()? {
        Some(safe) => println!("Latest safe height:     {}", safe),
        None => print_warning("The chain is too short to hold a complete safe ring"),
    }
    println!();

    Ok(())
}
