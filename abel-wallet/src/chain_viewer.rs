//! Chain Viewer
//!
//! Watches the chain on behalf of a set of accounts:
//!
//! - keeps a short-lived cache of the chain tip and derives the *safe* height,
//!   the highest ring boundary buried under the required confirmations;
//! - hands out block info only for safe heights;
//! - rebuilds the coins a transaction pays to registered accounts, including
//!   their value and serial number.
//!
//! Not-found and not-ours are ordinary outcomes (`None` or an empty list).
//! Transport failures of the RPC client propagate as errors.

use chrono::Duration;
use tracing::{debug, error, warn};

use crate::{
    account::Account,
    clock::{Clock, HeightCache, SystemClock},
    coin::{BlockHash, Coin, CoinId, TxId},
    crypto::{CryptoEngine, RingBlock},
    error::{Result, RpcError, WalletError},
    ring::{align_safe_height, ring_heights},
    rpc::{BlockInfo, BlockRef, ChainRpc},
    wallet::{AccountRegistry, Accounts, RejectReason},
};

/// Confirmations a block needs before it may join a ring.
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 1;

/// How long a fetched chain height is trusted, in seconds.
pub const DEFAULT_HEIGHT_TTL_SECS: i64 = 10;

pub struct ChainViewer<R, E, C = SystemClock> {
    rpc: R,
    engine: E,
    clock: C,
    accounts: Accounts,
    latest_height: HeightCache,
    required_confirmations: u64,
    height_ttl: Duration,
}

impl<R, E> ChainViewer<R, E> {
    pub fn new(rpc: R, engine: E) -> Self {
        Self::with_clock(rpc, engine, SystemClock)
    }
}

impl<R, E, C> ChainViewer<R, E, C> {
    pub fn with_clock(rpc: R, engine: E, clock: C) -> Self {
        Self {
            rpc,
            engine,
            clock,
            accounts: Accounts::default(),
            latest_height: HeightCache::default(),
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            height_ttl: Duration::seconds(DEFAULT_HEIGHT_TTL_SECS),
        }
    }

    pub fn with_height_ttl(mut self, ttl: Duration) -> Self {
        self.height_ttl = ttl;
        self
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn required_confirmations(&self) -> u64 {
        self.required_confirmations
    }

    pub fn set_required_confirmations(&mut self, confirmations: u64) {
        self.required_confirmations = confirmations;
    }

    /// The last fetched tip, fresh or not.
    pub fn cached_latest_height(&self) -> Option<u64> {
        self.latest_height.height()
    }
}

// Height tracking needs only the RPC client and a clock.
impl<R: ChainRpc, E, C: Clock> ChainViewer<R, E, C> {
    /// Fetch the chain tip. On failure the cache is left untouched.
    ///
    /// A tip lower than the cached one is accepted and logged.
    pub fn update_latest_height(&mut self) -> Result<u64> {
        debug!("Updating latest height");
        let info = match self.rpc.get_chain_info() {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!("Chain info unavailable");
                return Err(WalletError::HeightUnavailable);
            }
            Err(e) => {
                debug!("Failed to update chain height: {}", e);
                return Err(e.into());
            }
        };

        if let Some(cached) = self.latest_height.height() {
            if info.height < cached {
                warn!(
                    "Chain height decreased from {} to {}",
                    cached, info.height
                );
            }
        }
        self.latest_height.set(info.height, self.clock.now());
        Ok(info.height)
    }

    /// The chain tip, refreshed when never fetched or older than the TTL.
    ///
    /// If the refresh fails but an older value is cached, the older value is
    /// returned.
    pub fn get_latest_height(&mut self) -> Result<u64> {
        if let Some(height) = self.latest_height.fresh(self.clock.now(), self.height_ttl) {
            debug!("Using cached latest height: {}", height);
            return Ok(height);
        }

        match self.update_latest_height() {
            Ok(height) => Ok(height),
            Err(e) => match self.latest_height.height() {
                Some(stale) => {
                    warn!("Using stale latest height {}: {}", stale, e);
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// Highest height closing a ring and buried under the required
    /// confirmations. `None` while the chain is too short.
    pub fn get_latest_safe_height(&mut self) -> Result<Option<u64>> {
        let latest = self.get_latest_height()?;
        Ok(align_safe_height(latest, self.required_confirmations))
    }

    fn is_safe(&self, height: u64, latest: u64) -> bool {
        align_safe_height(latest, self.required_confirmations).is_some_and(|safe| height <= safe)
    }

    /// Block info at `height`, only if the block is at or below the safe
    /// height. A height past the safe boundary first triggers a refresh.
    pub fn get_safe_block_info(&mut self, height: u64) -> Result<Option<BlockInfo>> {
        let latest = self.get_latest_height()?;
        let latest = if self.is_safe(height, latest) {
            latest
        } else {
            match self.update_latest_height() {
                Ok(latest) => latest,
                Err(e) => {
                    debug!("Refresh before safe block lookup failed: {}", e);
                    latest
                }
            }
        };

        if height > latest {
            warn!(
                "Block height ({}) is beyond the latest height ({})",
                height, latest
            );
            return Ok(None);
        }
        if !self.is_safe(height, latest) {
            warn!("Block height ({}) is not safe yet", height);
            return Ok(None);
        }

        Ok(self.rpc.get_block_info(BlockRef::Height(height))?)
    }
}

impl<R: ChainRpc, E: CryptoEngine, C: Clock> ChainViewer<R, E, C> {
    /// The registered account an output script pays to, if any.
    pub fn owner_account(&self, script: &[u8]) -> Option<&Account> {
        match self.engine.fingerprint_from_output_script(script) {
            Ok(Some(fingerprint)) => self.get_account(&fingerprint),
            Ok(None) => None,
            Err(e) => {
                error!("Failed to decode fingerprint from output script: {}", e);
                None
            }
        }
    }

    /// Every output of `txid` owned by a registered account.
    ///
    /// Outputs whose ring blocks cannot be fetched, or whose value or serial
    /// number cannot be computed, are skipped.
    pub fn get_coins(&self, txid: &TxId) -> Result<Vec<Coin>> {
        self.create_coins(txid, None)
    }

    /// The single owned coin `coin_id`. More than one match is an integrity
    /// failure.
    pub fn get_coin(&self, coin_id: &CoinId) -> Result<Option<Coin>> {
        let mut coins = self.create_coins(&coin_id.txid, Some(coin_id.index))?;
        match coins.len() {
            0 => {
                debug!("No owned coin found for {}", coin_id);
                Ok(None)
            }
            1 => Ok(coins.pop()),
            n => {
                error!("Found {} coins for coin id {}", n, coin_id);
                Err(WalletError::DuplicateCoin(*coin_id))
            }
        }
    }

    /// Owned coins of every transaction in the safe block at `height`.
    ///
    /// Returns `None` when the block is not yet safe. A transaction that fails
    /// to scan is skipped.
    pub fn scan_block(&mut self, height: u64) -> Result<Option<Vec<Coin>>> {
        let Some(block) = self.get_safe_block_info(height)? else {
            return Ok(None);
        };

        let mut coins = Vec::new();
        for txid in &block.tx_hashes {
            match self.get_coins(txid) {
                Ok(found) => coins.extend(found),
                Err(e) => warn!("Skipping tx {} in block {}: {}", txid, height, e),
            }
        }
        debug!(
            "Scanned block {}: {} txs, {} owned coins",
            height,
            block.tx_hashes.len(),
            coins.len()
        );
        Ok(Some(coins))
    }

    /// Rebuild the owned outputs of `txid`, or only output `only_index`.
    ///
    /// The ring is fetched once per transaction, on the first owned output.
    /// When rebuilding the whole transaction, an output whose ring fetch
    /// fails is skipped and later outputs retry the fetch. For a single
    /// output the failure propagates.
    fn create_coins(&self, txid: &TxId, only_index: Option<u32>) -> Result<Vec<Coin>> {
        let Some(tx) = self.rpc.get_tx_info(txid)? else {
            debug!("Tx {} not found", txid);
            return Ok(Vec::new());
        };
        let Some(block_hash) = tx.block_hash else {
            debug!("Tx {} is not in a block yet", txid);
            return Ok(Vec::new());
        };
        let Some(block) = self.rpc.get_block_info(BlockRef::Hash(block_hash))? else {
            error!("Failed to get block info for block hash {}", block_hash);
            return Ok(Vec::new());
        };

        let mut ring: Option<Vec<RingBlock>> = None;
        let mut coins = Vec::new();
        for (position, vout) in tx.vouts.iter().enumerate() {
            let index = match vout.n {
                Some(n) => n,
                None => u32::try_from(position).map_err(|_| {
                    RpcError::Decode(format!("tx {} has too many outputs", txid))
                })?,
            };
            if only_index.is_some_and(|wanted| wanted != index) {
                continue;
            }
            let coin_id = CoinId::new(*txid, index);
            let Some(owner) = self.owner_account(&vout.script) else {
                continue;
            };

            if ring.is_none() {
                match self.ring_blocks(block.height) {
                    Ok(Some(blocks)) => ring = Some(blocks),
                    Ok(None) => continue,
                    Err(e) if only_index.is_none() => {
                        warn!("Skipping coin {}: {}", coin_id, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            let Some(ring_blocks) = ring.as_deref() else {
                continue;
            };

            if let Some(coin) =
                self.create_coin(coin_id, owner, &vout.script, block_hash, block.height, ring_blocks)
            {
                coins.push(coin);
            }
        }
        Ok(coins)
    }

    /// Decode the value and derive the serial number of an owned output.
    fn create_coin(
        &self,
        id: CoinId,
        owner: &Account,
        script: &[u8],
        block_hash: BlockHash,
        block_height: u64,
        ring_blocks: &[RingBlock],
    ) -> Option<Coin> {
        let value = match self.engine.decode_output_value(script, owner.view_key()) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to decode value of coin {}: {}", id, e);
                return None;
            }
        };

        let serial_number = match self.engine.derive_serial_number(
            &id.txid,
            id.index,
            owner.serial_no_key(),
            ring_blocks,
        ) {
            Ok(serial_number) => serial_number,
            Err(e) => {
                error!("Failed to derive serial number of coin {}: {}", id, e);
                return None;
            }
        };

        Some(Coin {
            id,
            owner_short_address: *owner.short_address(),
            owner_address: Some(owner.address().clone()),
            value,
            script: Some(script.to_vec()),
            serial_number: Some(serial_number),
            block_hash: Some(block_hash),
            block_height,
        })
    }

    /// Raw blocks of the ring containing `height`, or `None` if any is
    /// missing.
    fn ring_blocks(&self, height: u64) -> Result<Option<Vec<RingBlock>>> {
        let Some(ring_heights) = ring_heights(height) else {
            error!("Height {} has no complete ring", height);
            return Ok(None);
        };

        let mut blocks = Vec::with_capacity(ring_heights.len());
        for ring_height in ring_heights {
            match self.rpc.get_block_bytes(BlockRef::Height(ring_height))? {
                Some(data) => blocks.push(RingBlock {
                    height: ring_height,
                    data,
                }),
                None => {
                    error!("Failed to get ring block data at height {}", ring_height);
                    return Ok(None);
                }
            }
        }
        Ok(Some(blocks))
    }
}

impl<R, E, C> AccountRegistry for ChainViewer<R, E, C> {
    fn registry(&self) -> &Accounts {
        &self.accounts
    }

    fn registry_mut(&mut self) -> &mut Accounts {
        &mut self.accounts
    }

    /// Any account can scan; signers are held as viewers would be.
    fn accept_account(&self, _account: &Account) -> std::result::Result<(), RejectReason> {
        Ok(())
    }
}
