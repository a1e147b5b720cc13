//! Show a block once it is safe to use.

use abel_wallet::WalletConfig;
use anyhow::Result;

use super::{chain_viewer, print_error};

pub fn run(config: &WalletConfig, height: u64) -> Result<()> {
    let mut viewer = chain_viewer(config)?;

    let Some(block) = viewer.get_safe_block_info(height)? else {
        print_error(&format!(
            "Block {} is beyond the latest safe height or unknown to the node",
            height
        ));
        return Ok(());
    };

    println!();
    println!("Height:       {}", block.height);
    println!("Hash:         {}", block.hash);
    println!("Transactions: {}", block.tx_hashes.len());
    for txid in &block.tx_hashes {
        println!("  {}", txid);
    }
    println!();

    Ok(())
}
