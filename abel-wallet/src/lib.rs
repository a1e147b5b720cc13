//! Abel Wallet
//!
//! Client-side wallet layer for an Abelian-style post-quantum ledger. The
//! wallet talks to an untrusted chain node over JSON-RPC and delegates all
//! lattice cryptography to a [`CryptoEngine`].
//!
//! ## Components
//!
//! - [`ChainViewer`] tracks the chain tip, aligns the safe height to ring
//!   boundaries and discovers coins owned by registered accounts
//! - [`TxBuilder`] re-verifies claimed inputs against the chain and assembles
//!   their rings before asking the engine for an unsigned transaction
//! - [`TxSigner`] signs an unsigned transaction with every listed signer
//! - [`WalletStore`] persists coins, accounts and pending transactions

pub mod account;
pub mod address;
pub mod chain_viewer;
pub mod clock;
pub mod coin;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod ring;
pub mod rpc;
pub mod store;
pub mod tx_builder;
pub mod tx_signer;
pub mod wallet;

#[cfg(any(test, feature = "test-only"))]
pub mod test_utils;

pub use account::Account;
pub use address::{Address, ChainId, Fingerprint, ShortAddress};
pub use chain_viewer::ChainViewer;
pub use coin::{Coin, CoinId};
pub use config::WalletConfig;
pub use crypto::CryptoEngine;
pub use error::{Result, WalletError};
pub use ring::RING_SIZE;
pub use rpc::{ChainRpc, JsonRpcClient};
pub use store::WalletStore;
pub use tx_builder::TxBuilder;
pub use tx_signer::TxSigner;
pub use wallet::{AccountRegistry, AddAccountOutcome};
