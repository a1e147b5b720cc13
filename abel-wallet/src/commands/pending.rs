//! List or drop pending transactions held in the wallet store.

use abel_wallet::WalletConfig;
use anyhow::Result;

use super::{open_store, print_error, print_success};

pub fn run(config: &WalletConfig, remove: Option<&str>) -> Result<()> {
    let mut store = open_store(config)?;

    if let Some(key) = remove {
        match store.remove_pending_tx(key)? {
            Some(_) => print_success(&format!("Removed pending transaction {}", key)),
            None => print_error(&format!("No pending transaction {}", key)),
        }
        return Ok(());
    }

    let pending: Vec<_> = store.pending_txs().collect();
    if pending.is_empty() {
        println!("No pending transactions");
        return Ok(());
    }

    println!();
    for (key, tx) in pending {
        let status = match &tx.signed {
            Some(signed) => format!("signed as {}", signed.txid),
            None => "unsigned".to_string(),
        };
        println!("{}  signers={}  {}", key, tx.unsigned.signers.len(), status);
    }
    println!();

    Ok(())
}
