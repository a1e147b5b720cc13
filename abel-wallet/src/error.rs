//! Error types for the wallet layer.

use displaydoc::Display;
use thiserror::Error;

use crate::{
    address::{ChainId, ShortAddress},
    coin::CoinId,
};

/// Failure reported by the crypto engine.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid input to {operation}: {reason}
    InvalidInput {
        operation: &'static str,
        reason: String,
    },

    /// {operation} failed: {reason}
    Engine {
        operation: &'static str,
        reason: String,
    },
}

impl CryptoError {
    pub fn engine(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            reason: reason.into(),
        }
    }

    pub fn invalid_input(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            operation,
            reason: reason.into(),
        }
    }
}

/// Transport or protocol failure talking to the chain node.
#[derive(Debug, Display, Error)]
pub enum RpcError {
    /// HTTP error: {0}
    Http(String),

    /// RPC error {code}: {message}
    Rpc { code: i64, message: String },

    /// Malformed RPC response: {0}
    Decode(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Decode(err.to_string())
    }
}

impl From<hex::FromHexError> for RpcError {
    fn from(err: hex::FromHexError) -> Self {
        RpcError::Decode(err.to_string())
    }
}

/// Failure reading or writing the persistent store.
#[derive(Debug, Display, Error)]
pub enum StoreError {
    /// Store I/O: {0}
    Io(#[from] std::io::Error),

    /// Store encoding: {0}
    Serde(#[from] serde_json::Error),

    /// Corrupt store record {key}: {reason}
    Corrupt { key: String, reason: String },
}

/// The domain error surfaced by every wallet operation.
#[derive(Debug, Display, Error)]
pub enum WalletError {
    /// Crypto engine: {0}
    Crypto(#[from] CryptoError),

    /// Chain RPC: {0}
    Rpc(#[from] RpcError),

    /// Store: {0}
    Store(#[from] StoreError),

    /// {kind} must be {expected} bytes, got {actual}
    InvalidKeyLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// {kind} is not valid hex: {source}
    InvalidKeyHex {
        kind: &'static str,
        source: hex::FromHexError,
    },

    /// Invalid address: {0}
    InvalidAddress(String),

    /// Address belongs to chain {actual}, expected chain {expected}
    AddressChainMismatch { expected: ChainId, actual: ChainId },

    /// Account is not a signer account
    NotSignerAccount,

    /// Latest chain height is unavailable
    HeightUnavailable,

    /// Coin {0} was not found on chain
    CoinNotFound(CoinId),

    /// More than one coin matches {0}
    DuplicateCoin(CoinId),

    /// Coin {coin_id} owner mismatch: given {given}, on chain {on_chain}
    CoinOwnerMismatch {
        coin_id: CoinId,
        given: ShortAddress,
        on_chain: ShortAddress,
    },

    /// Coin {coin_id} value mismatch: given {given}, on chain {on_chain}
    CoinValueMismatch {
        coin_id: CoinId,
        given: u64,
        on_chain: u64,
    },

    /// Coin {0} is missing chain data
    IncompleteCoin(CoinId),

    /// Ring block at height {0} is unavailable or not yet safe
    RingBlockUnavailable(u64),

    /// Signer account not found: {0}
    SignerNotFound(ShortAddress),

    /// Transaction has no inputs
    NoInputs,

    /// Config: {0}
    Config(String),
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;
