//! List coins held in the wallet store.

use abel_wallet::WalletConfig;
use anyhow::Result;

use super::open_store;

pub fn run(config: &WalletConfig, all: bool) -> Result<()> {
    let store = open_store(config)?;

    let records: Vec<_> = store
        .coins()
        .filter(|record| all || !record.spent)
        .collect();

    if records.is_empty() {
        println!("No coins in {}", store.path().display());
        return Ok(());
    }

    println!();
    println!(
        "{:<70} {:>8} {:>16}  {}",
        "Coin", "Height", "Value", "Status"
    );
    let mut total = 0u64;
    for record in &records {
        let coin = &record.coin;
        if !record.spent {
            total = total.saturating_add(coin.value);
        }
        println!(
            "{:<70} {:>8} {:>16}  {}",
            coin.id,
            coin.block_height,
            coin.value,
            if record.spent { "spent" } else { "unspent" }
        );
    }
    println!();
    println!("Unspent total: {}", total);

    Ok(())
}
