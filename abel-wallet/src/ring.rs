//! Ring Geometry
//!
//! Blocks are grouped into fixed rings of [`RING_SIZE`] consecutive heights.
//! Ring `k` covers `[k*RING_SIZE, k*RING_SIZE + RING_SIZE - 1]`. A coin is
//! only spendable once its whole ring is buried under the required number of
//! confirmations, which is what [`align_safe_height`] computes.

/// Number of consecutive blocks in one ring.
pub const RING_SIZE: u64 = 3;

/// First height of the ring containing `height`.
pub fn ring_start(height: u64) -> u64 {
    height - height % RING_SIZE
}

/// The full ring of heights containing `height`, ascending.
///
/// `None` for the heights at the very top of the `u64` range, whose ring
/// would run past `u64::MAX`.
pub fn ring_heights(height: u64) -> Option<[u64; RING_SIZE as usize]> {
    let start = ring_start(height);
    start.checked_add(RING_SIZE - 1)?;
    Some(std::array::from_fn(|offset| start + offset as u64))
}

/// Highest height `s <= latest - confirmations` that closes a ring, i.e.
/// `(s + 1) % RING_SIZE == 0`.
///
/// Returns `None` when the chain is too short for any ring to be safe.
pub fn align_safe_height(latest: u64, confirmations: u64) -> Option<u64> {
    let confirmed = latest.checked_sub(confirmations)?;
    let excess = (confirmed % RING_SIZE + 1) % RING_SIZE;
    confirmed.checked_sub(excess)
}
