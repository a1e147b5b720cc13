//! Crypto Engine Interface
//!
//! Key derivation, address encoding, output decoding, serial numbers and
//! transaction assembly all live in an external engine. The wallet layer only
//! depends on the [`CryptoEngine`] trait; production builds bind it to the
//! native library, tests bind it to an in-memory fake.
//!
//! Every call must be deterministic for identical inputs. Serial-number
//! derivation in particular has to be bit-reproducible for a given ring, or
//! double-spend detection breaks.

use serde::{Deserialize, Serialize};

use crate::{
    address::{hex_bytes, Address, ChainId, Fingerprint, ShortAddress},
    coin::{Coin, SerialNumber, TxId},
    error::CryptoError,
    keys::{CryptoSeed, DerivedKeys, SerialNoKey, ViewKey},
};

/// Raw bytes of one ring block, tagged with its height.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingBlock {
    pub height: u64,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl std::fmt::Debug for RingBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RingBlock(height={}, {} bytes)", self.height, self.data.len())
    }
}

/// One transaction input as handed to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInDesc {
    pub txid: TxId,
    pub index: u32,
    pub script: Vec<u8>,
    pub value: u64,
    pub owner_short_address: ShortAddress,
    pub height: u64,
}

impl TxInDesc {
    /// Returns `None` unless `coin` carries its output script.
    pub fn from_coin(coin: &Coin) -> Option<Self> {
        Some(Self {
            txid: coin.id.txid,
            index: coin.id.index,
            script: coin.script.clone()?,
            value: coin.value,
            owner_short_address: coin.owner_short_address,
            height: coin.block_height,
        })
    }
}

/// One transaction output: pay `value` to `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutDesc {
    pub address: Address,
    pub value: u64,
}

/// Everything the engine needs to assemble an unsigned transaction.
#[derive(Clone, Debug)]
pub struct UnsignedTxRequest {
    pub inputs: Vec<TxInDesc>,
    pub outputs: Vec<TxOutDesc>,
    /// Sorted ascending by height, no duplicates.
    pub ring_blocks: Vec<RingBlock>,
    pub fee: u64,
}

/// An assembled but unsigned transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedRawTx {
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Distinct short addresses that must sign, in the order the signature
    /// scheme expects them.
    pub signers: Vec<ShortAddress>,
}

/// A fully signed transaction ready for broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRawTx {
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub txid: TxId,
}

/// The signing credential of one required signer.
#[derive(Clone, Debug)]
pub struct SignerCredential<'a> {
    pub short_address: ShortAddress,
    pub seed: &'a CryptoSeed,
}

/// Operations delegated to the external crypto library.
pub trait CryptoEngine {
    /// Produce a fresh, uniformly random seed.
    fn generate_seed(&self) -> Result<CryptoSeed, CryptoError>;

    fn derive_keys_and_address(&self, seed: &CryptoSeed) -> Result<DerivedKeys, CryptoError>;

    fn address_from_crypto_address(
        &self,
        crypto_address: &[u8],
        chain_id: ChainId,
    ) -> Result<Address, CryptoError>;

    fn short_address_from_address(&self, address: &Address) -> Result<ShortAddress, CryptoError>;

    /// `Ok(None)` when the script carries no recognisable fingerprint.
    fn fingerprint_from_output_script(
        &self,
        script: &[u8],
    ) -> Result<Option<Fingerprint>, CryptoError>;

    fn decode_output_value(&self, script: &[u8], view_key: &ViewKey) -> Result<u64, CryptoError>;

    fn derive_serial_number(
        &self,
        txid: &TxId,
        index: u32,
        serial_no_key: &SerialNoKey,
        ring_blocks: &[RingBlock],
    ) -> Result<SerialNumber, CryptoError>;

    fn build_unsigned_tx(&self, request: &UnsignedTxRequest) -> Result<UnsignedRawTx, CryptoError>;

    /// `signers` is ordered exactly as `UnsignedRawTx::signers`.
    fn build_signed_tx(
        &self,
        unsigned_data: &[u8],
        signers: &[SignerCredential<'_>],
    ) -> Result<SignedRawTx, CryptoError>;
}

impl<T: CryptoEngine + ?Sized> CryptoEngine for &T {
    fn generate_seed(&self) -> Result<CryptoSeed, CryptoError> {
        (**self).generate_seed()
    }

    fn derive_keys_and_address(&self, seed: &CryptoSeed) -> Result<DerivedKeys, CryptoError> {
        (**self).derive_keys_and_address(seed)
    }

    fn address_from_crypto_address(
        &self,
        crypto_address: &[u8],
        chain_id: ChainId,
    ) -> Result<Address, CryptoError> {
        (**self).address_from_crypto_address(crypto_address, chain_id)
    }

    fn short_address_from_address(&self, address: &Address) -> Result<ShortAddress, CryptoError> {
        (**self).short_address_from_address(address)
    }

    fn fingerprint_from_output_script(
        &self,
        script: &[u8],
    ) -> Result<Option<Fingerprint>, CryptoError> {
        (**self).fingerprint_from_output_script(script)
    }

    fn decode_output_value(&self, script: &[u8], view_key: &ViewKey) -> Result<u64, CryptoError> {
        (**self).decode_output_value(script, view_key)
    }

    fn derive_serial_number(
        &self,
        txid: &TxId,
        index: u32,
        serial_no_key: &SerialNoKey,
        ring_blocks: &[RingBlock],
    ) -> Result<SerialNumber, CryptoError> {
        (**self).derive_serial_number(txid, index, serial_no_key, ring_blocks)
    }

    fn build_unsigned_tx(&self, request: &UnsignedTxRequest) -> Result<UnsignedRawTx, CryptoError> {
        (**self).build_unsigned_tx(request)
    }

    fn build_signed_tx(
        &self,
        unsigned_data: &[u8],
        signers: &[SignerCredential<'_>],
    ) -> Result<SignedRawTx, CryptoError> {
        (**self).build_signed_tx(unsigned_data, signers)
    }
}
