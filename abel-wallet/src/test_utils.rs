//! In-memory collaborators for tests.
//!
//! - [`MockCryptoEngine`]: deterministic, hash-based stand-in for the native
//!   crypto library. Output scripts are `fingerprint(32) | value_le(8)`.
//! - [`MockChainRpc`]: a chain held in memory, with knobs for failures.
//! - [`ManualClock`]: a clock that only moves when told to.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use crate::{
    address::{Address, ChainId, Fingerprint, ShortAddress},
    clock::Clock,
    coin::{BlockHash, SerialNumber, TxId},
    crypto::{
        CryptoEngine, RingBlock, SignedRawTx, SignerCredential, UnsignedRawTx,
        UnsignedTxRequest,
    },
    error::{CryptoError, RpcError},
    keys::{
        CryptoSeed, DerivedKeys, SerialNoKey, SpendKey, ViewKey, CRYPTO_SEED_LENGTH,
        SERIAL_NO_KEY_LENGTH, SPEND_KEY_LENGTH, VIEW_KEY_LENGTH,
    },
    rpc::{BlockInfo, BlockRef, ChainInfo, ChainRpc, TxInfo, TxVout},
};

const CRYPTO_ADDRESS_LENGTH: usize = 64;
const VALUE_OFFSET: usize = 32;
const SCRIPT_LENGTH: usize = VALUE_OFFSET + 8;

/// SHA-256 counter-mode expansion of `domain | input` to `len` bytes.
fn expand(domain: &[u8], input: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter = 0u32;
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        hasher.update(counter.to_le_bytes());
        hasher.update(input);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}

fn digest(domain: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Deterministic fake of the native crypto library.
///
/// Records the last transaction request and signer list so tests can assert
/// on what the wallet layer handed over.
#[derive(Default)]
pub struct MockCryptoEngine {
    seed_counter: AtomicU64,
    last_unsigned_request: Mutex<Option<UnsignedTxRequest>>,
    last_signers: Mutex<Vec<ShortAddress>>,
}

impl MockCryptoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint this engine assigns to `address`.
    pub fn fingerprint_of(address: &Address) -> Fingerprint {
        Fingerprint::new(digest(b"fingerprint", &[&address.as_bytes()[1..]]))
    }

    /// An output script paying `value` to `address`.
    pub fn output_script(address: &Address, value: u64) -> Vec<u8> {
        let mut script = Self::fingerprint_of(address).as_bytes().to_vec();
        script.extend_from_slice(&value.to_le_bytes());
        script
    }

    /// A script carrying `address`'s fingerprint but no decodable value.
    pub fn undecodable_script(address: &Address) -> Vec<u8> {
        Self::fingerprint_of(address).as_bytes().to_vec()
    }

    pub fn last_unsigned_request(&self) -> Option<UnsignedTxRequest> {
        self.last_unsigned_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    pub fn last_signers(&self) -> Vec<ShortAddress> {
        self.last_signers
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

fn key_error(operation: &'static str) -> impl Fn(crate::error::WalletError) -> CryptoError {
    move |e| CryptoError::engine(operation, e.to_string())
}

impl CryptoEngine for MockCryptoEngine {
    fn generate_seed(&self) -> Result<CryptoSeed, CryptoError> {
        let n = self.seed_counter.fetch_add(1, Ordering::SeqCst);
        CryptoSeed::new(expand(b"seed", &n.to_le_bytes(), CRYPTO_SEED_LENGTH))
            .map_err(key_error("generate_seed"))
    }

    fn derive_keys_and_address(&self, seed: &CryptoSeed) -> Result<DerivedKeys, CryptoError> {
        let seed = seed.as_bytes();
        let op = "derive_keys_and_address";
        Ok(DerivedKeys {
            spend_key: SpendKey::new(expand(b"spend", seed, SPEND_KEY_LENGTH))
                .map_err(key_error(op))?,
            serial_no_key: SerialNoKey::new(expand(b"serial", seed, SERIAL_NO_KEY_LENGTH))
                .map_err(key_error(op))?,
            view_key: ViewKey::new(expand(b"view", seed, VIEW_KEY_LENGTH))
                .map_err(key_error(op))?,
            crypto_address: expand(b"address", seed, CRYPTO_ADDRESS_LENGTH),
        })
    }

    fn address_from_crypto_address(
        &self,
        crypto_address: &[u8],
        chain_id: ChainId,
    ) -> Result<Address, CryptoError> {
        if crypto_address.len() != CRYPTO_ADDRESS_LENGTH {
            return Err(CryptoError::invalid_input(
                "address_from_crypto_address",
                format!("crypto address must be {} bytes", CRYPTO_ADDRESS_LENGTH),
            ));
        }
        let mut bytes = vec![chain_id];
        bytes.extend_from_slice(crypto_address);
        Address::new(bytes).map_err(key_error("address_from_crypto_address"))
    }

    fn short_address_from_address(&self, address: &Address) -> Result<ShortAddress, CryptoError> {
        let checksum = digest(b"checksum", &[address.as_bytes()]);
        Ok(ShortAddress::compose(
            address.chain_id(),
            &Self::fingerprint_of(address),
            &checksum,
        ))
    }

    fn fingerprint_from_output_script(
        &self,
        script: &[u8],
    ) -> Result<Option<Fingerprint>, CryptoError> {
        if script.len() < VALUE_OFFSET {
            return Ok(None);
        }
        Fingerprint::try_from(&script[..VALUE_OFFSET])
            .map(Some)
            .map_err(key_error("fingerprint_from_output_script"))
    }

    fn decode_output_value(&self, script: &[u8], _view_key: &ViewKey) -> Result<u64, CryptoError> {
        let bytes: [u8; 8] = script
            .get(VALUE_OFFSET..SCRIPT_LENGTH)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| CryptoError::engine("decode_output_value", "no value in script"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn derive_serial_number(
        &self,
        txid: &TxId,
        index: u32,
        serial_no_key: &SerialNoKey,
        ring_blocks: &[RingBlock],
    ) -> Result<SerialNumber, CryptoError> {
        if ring_blocks.is_empty() {
            return Err(CryptoError::invalid_input(
                "derive_serial_number",
                "empty ring",
            ));
        }
        let mut hasher = Sha256::new();
        hasher.update(serial_no_key.as_bytes());
        hasher.update(txid.0);
        hasher.update(index.to_le_bytes());
        for block in ring_blocks {
            hasher.update(block.height.to_le_bytes());
            hasher.update(&block.data);
        }
        Ok(SerialNumber(hasher.finalize().to_vec()))
    }

    fn build_unsigned_tx(&self, request: &UnsignedTxRequest) -> Result<UnsignedRawTx, CryptoError> {
        if request.inputs.is_empty() {
            return Err(CryptoError::invalid_input("build_unsigned_tx", "no inputs"));
        }

        let mut signers: Vec<ShortAddress> = Vec::new();
        let mut hasher = Sha256::new();
        for input in &request.inputs {
            hasher.update(input.txid.0);
            hasher.update(input.index.to_le_bytes());
            hasher.update(input.value.to_le_bytes());
            if !signers.contains(&input.owner_short_address) {
                signers.push(input.owner_short_address);
            }
        }
        for output in &request.outputs {
            hasher.update(output.address.as_bytes());
            hasher.update(output.value.to_le_bytes());
        }
        for block in &request.ring_blocks {
            hasher.update(block.height.to_le_bytes());
        }
        hasher.update(request.fee.to_le_bytes());

        if let Ok(mut guard) = self.last_unsigned_request.lock() {
            *guard = Some(request.clone());
        }

        let mut data = b"unsigned:".to_vec();
        data.extend_from_slice(&hasher.finalize());
        Ok(UnsignedRawTx { data, signers })
    }

    fn build_signed_tx(
        &self,
        unsigned_data: &[u8],
        signers: &[SignerCredential<'_>],
    ) -> Result<SignedRawTx, CryptoError> {
        if signers.is_empty() {
            return Err(CryptoError::invalid_input("build_signed_tx", "no signers"));
        }

        let mut data = unsigned_data.to_vec();
        for signer in signers {
            data.extend_from_slice(&digest(
                b"signature",
                &[
                    &signer.short_address.as_bytes()[..],
                    signer.seed.as_bytes(),
                    unsigned_data,
                ],
            ));
        }

        if let Ok(mut guard) = self.last_signers.lock() {
            *guard = signers.iter().map(|s| s.short_address).collect();
        }

        let txid = TxId(digest(b"txid", &[data.as_slice()]));
        Ok(SignedRawTx { data, txid })
    }
}

#[derive(Default)]
struct MockChain {
    blocks: Vec<MockBlock>,
    txs: HashMap<TxId, TxInfo>,
    reported_height: Option<u64>,
    chain_info_down: bool,
    chain_info_calls: u64,
    block_bytes_requests: Vec<u64>,
    block_bytes_failures: u64,
}

struct MockBlock {
    hash: BlockHash,
    tx_hashes: Vec<TxId>,
}

/// An in-memory chain.
///
/// The reported tip defaults to the last pushed block; [`set_height`]
/// overrides it so tests can control confirmation depth independently.
///
/// [`set_height`]: MockChainRpc::set_height
#[derive(Default)]
pub struct MockChainRpc {
    chain: Mutex<MockChain>,
}

impl MockChainRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain of `count` blocks with no transactions.
    pub fn with_empty_blocks(count: u64) -> Self {
        let rpc = Self::new();
        for _ in 0..count {
            rpc.push_block(vec![]);
        }
        rpc
    }

    fn with_chain<T>(&self, f: impl FnOnce(&mut MockChain) -> T) -> T {
        let mut guard = match self.chain.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Append a block. Each entry of `txs` is the list of output scripts of
    /// one transaction. Returns the new height and the txids.
    pub fn push_block(&self, txs: Vec<Vec<Vec<u8>>>) -> (u64, Vec<TxId>) {
        self.with_chain(|chain| {
            let height = chain.blocks.len() as u64;
            let hash = BlockHash(digest(b"block", &[&height.to_le_bytes()[..]]));
            let mut tx_hashes = Vec::new();
            for (i, scripts) in txs.into_iter().enumerate() {
                let txid = TxId(digest(
                    b"tx",
                    &[&height.to_le_bytes()[..], &(i as u64).to_le_bytes()[..]],
                ));
                let vouts = scripts
                    .into_iter()
                    .map(|script| TxVout { n: None, script })
                    .collect();
                chain.txs.insert(
                    txid,
                    TxInfo {
                        txid,
                        block_hash: Some(hash),
                        vins: vec![],
                        vouts,
                    },
                );
                tx_hashes.push(txid);
            }
            chain.blocks.push(MockBlock { hash, tx_hashes });
            (height, chain.txs_in_block(height))
        })
    }

    /// Replace a stored transaction as-is, e.g. with malformed outputs.
    pub fn replace_tx(&self, info: TxInfo) {
        self.with_chain(|chain| {
            chain.txs.insert(info.txid, info);
        })
    }

    /// Register a transaction that has not been mined.
    pub fn add_mempool_tx(&self, scripts: Vec<Vec<u8>>) -> TxId {
        self.with_chain(|chain| {
            let txid = TxId(digest(b"mempool", &[&(chain.txs.len() as u64).to_le_bytes()[..]]));
            let vouts = scripts
                .into_iter()
                .map(|script| TxVout { n: None, script })
                .collect();
            chain.txs.insert(
                txid,
                TxInfo {
                    txid,
                    block_hash: None,
                    vins: vec![],
                    vouts,
                },
            );
            txid
        })
    }

    pub fn set_height(&self, height: u64) {
        self.with_chain(|chain| chain.reported_height = Some(height))
    }

    pub fn set_chain_info_down(&self, down: bool) {
        self.with_chain(|chain| chain.chain_info_down = down)
    }

    pub fn chain_info_calls(&self) -> u64 {
        self.with_chain(|chain| chain.chain_info_calls)
    }

    /// Make the next `count` `get_block_bytes` calls fail with a transport
    /// error.
    pub fn fail_block_bytes(&self, count: u64) {
        self.with_chain(|chain| chain.block_bytes_failures = count)
    }

    pub fn block_bytes_requests(&self) -> Vec<u64> {
        self.with_chain(|chain| chain.block_bytes_requests.clone())
    }

    /// The bytes `get_block_bytes` returns for `height`.
    pub fn block_bytes_at(height: u64) -> Vec<u8> {
        expand(b"block-bytes", &height.to_le_bytes(), 64)
    }
}

impl MockChain {
    fn txs_in_block(&self, height: u64) -> Vec<TxId> {
        self.blocks
            .get(height as usize)
            .map(|b| b.tx_hashes.clone())
            .unwrap_or_default()
    }

    fn height_of(&self, block: BlockRef) -> Option<u64> {
        match block {
            BlockRef::Height(height) => {
                ((height as usize) < self.blocks.len()).then_some(height)
            }
            BlockRef::Hash(hash) => self
                .blocks
                .iter()
                .position(|b| b.hash == hash)
                .map(|i| i as u64),
        }
    }
}

impl ChainRpc for MockChainRpc {
    fn get_chain_info(&self) -> Result<Option<ChainInfo>, RpcError> {
        self.with_chain(|chain| {
            chain.chain_info_calls += 1;
            if chain.chain_info_down {
                return Err(RpcError::Http("connection refused".into()));
            }
            let tip = chain
                .reported_height
                .or_else(|| (chain.blocks.len() as u64).checked_sub(1));
            Ok(tip.map(|height| ChainInfo { height }))
        })
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<BlockHash>, RpcError> {
        self.with_chain(|chain| Ok(chain.blocks.get(height as usize).map(|b| b.hash)))
    }

    fn get_block_info(&self, block: BlockRef) -> Result<Option<BlockInfo>, RpcError> {
        self.with_chain(|chain| {
            Ok(chain.height_of(block).map(|height| {
                let b = &chain.blocks[height as usize];
                BlockInfo {
                    hash: b.hash,
                    height,
                    tx_hashes: b.tx_hashes.clone(),
                }
            }))
        })
    }

    fn get_tx_info(&self, txid: &TxId) -> Result<Option<TxInfo>, RpcError> {
        self.with_chain(|chain| Ok(chain.txs.get(txid).cloned()))
    }

    fn get_block_bytes(&self, block: BlockRef) -> Result<Option<Vec<u8>>, RpcError> {
        self.with_chain(|chain| {
            if chain.block_bytes_failures > 0 {
                chain.block_bytes_failures -= 1;
                return Err(RpcError::Http("transient".into()));
            }
            let height = chain.height_of(block);
            if let Some(height) = height {
                chain.block_bytes_requests.push(height);
            }
            Ok(height.map(Self::block_bytes_at))
        })
    }
}

/// A clock that starts at a fixed instant and moves only via [`advance`].
///
/// [`advance`]: ManualClock::advance
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Mutex::new(start),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}
