//! Show the ring a height falls into and whether each member is safe.

use abel_wallet::{ring, WalletConfig};
use anyhow::Result;

use super::{chain_viewer, print_error, print_success, print_warning};

pub fn run(config: &WalletConfig, height: u64) -> Result<()> {
    let Some(members) = ring::ring_heights(height) else {
        print_error(&format!("Height {} has no complete ring", height));
        return Ok(());
    };

    let mut viewer = chain_viewer(config)?;
    let safe_height = viewer.get_latest_safe_height()?;
    let is_safe = |member: u64| safe_height.is_some_and(|safe| member <= safe);

    println!();
    println!("Ring for height {}:", height);
    for member in members {
        println!(
            "  {:>20}  {}",
            member,
            if is_safe(member) { "safe" } else { "not yet safe" }
        );
    }
    println!();

    if members.iter().all(|member| is_safe(*member)) {
        print_success("Ring is complete and safe");
    } else {
        print_warning("Ring is not safe to use yet");
    }

    Ok(())
}
