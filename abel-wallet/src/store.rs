//! Wallet Store
//!
//! A single JSON file holding:
//! - coins keyed by `"txid:index"`, with a spent flag;
//! - signer accounts (seed) and viewer accounts (scanning keys + address),
//!   keyed by short address hex;
//! - pending transactions keyed by the SHA-256 of their unsigned data, so an
//!   unsigned transaction can be carried to an offline signer and the signed
//!   result attached later.
//!
//! Every mutation rewrites the file atomically (temp file + rename).
//!
//! Security: seeds are stored as plain hex. Protect the file accordingly.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    account::Account,
    address::{Address, ChainId},
    coin::{Coin, CoinId, SerialNumber},
    crypto::{CryptoEngine, SignedRawTx, UnsignedRawTx},
    error::{Result, StoreError, WalletError},
    keys::{CryptoSeed, SerialNoKey, ViewKey},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRecord {
    pub coin: Coin,
    #[serde(default)]
    pub spent: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SignerRecord {
    chain_id: ChainId,
    seed: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ViewerRecord {
    chain_id: ChainId,
    serial_no_key: String,
    view_key: String,
    address: String,
}

/// An unsigned transaction awaiting (or carrying) its signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub unsigned: UnsignedRawTx,
    #[serde(default)]
    pub signed: Option<SignedRawTx>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    coins: BTreeMap<String, CoinRecord>,
    #[serde(default)]
    signer_accounts: BTreeMap<String, SignerRecord>,
    #[serde(default)]
    viewer_accounts: BTreeMap<String, ViewerRecord>,
    #[serde(default)]
    pending_txs: BTreeMap<String, PendingTx>,
}

pub struct WalletStore {
    path: PathBuf,
    data: StoreData,
}

impl WalletStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!("No wallet store at {}, starting empty", path.display());
            return Ok(Self {
                path,
                data: StoreData::default(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let data: StoreData = serde_json::from_str(&content)?;
        info!(
            "Loaded wallet store: {} coins, {} signers, {} viewers, {} pending txs",
            data.coins.len(),
            data.signer_accounts.len(),
            data.viewer_accounts.len(),
            data.pending_txs.len()
        );
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the data and write it out. The in-memory
    /// state only moves once the file has been replaced.
    fn update<T>(&mut self, change: impl FnOnce(&mut StoreData) -> T) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        let out = change(&mut data);
        self.save(&data)?;
        self.data = data;
        Ok(out)
    }

    fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(data)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &self.path)?;
        debug!("Saved wallet store to {}", self.path.display());
        Ok(())
    }

    // Coins

    pub fn exists(&self, coin_id: &CoinId) -> bool {
        self.data.coins.contains_key(&coin_id.to_string())
    }

    pub fn get(&self, coin_id: &CoinId) -> Option<&CoinRecord> {
        self.data.coins.get(&coin_id.to_string())
    }

    /// Store `coin` unless a coin with its id is already present. Returns
    /// whether it was inserted.
    pub fn put_if_absent(&mut self, coin: Coin) -> Result<bool, StoreError> {
        let key = coin.id.to_string();
        if self.data.coins.contains_key(&key) {
            return Ok(false);
        }
        self.update(|data| {
            data.coins.insert(key, CoinRecord { coin, spent: false });
        })?;
        Ok(true)
    }

    pub fn coins(&self) -> impl Iterator<Item = &CoinRecord> {
        self.data.coins.values()
    }

    pub fn unspent_coins(&self) -> impl Iterator<Item = &Coin> {
        self.data
            .coins
            .values()
            .filter(|record| !record.spent)
            .map(|record| &record.coin)
    }

    pub fn coin_by_serial_number(&self, serial_number: &SerialNumber) -> Option<&CoinRecord> {
        self.data
            .coins
            .values()
            .find(|record| record.coin.serial_number.as_ref() == Some(serial_number))
    }

    /// Returns false if the coin is unknown.
    pub fn mark_spent(&mut self, coin_id: &CoinId) -> Result<bool, StoreError> {
        let key = coin_id.to_string();
        if !self.data.coins.contains_key(&key) {
            return Ok(false);
        }
        self.update(|data| {
            if let Some(record) = data.coins.get_mut(&key) {
                record.spent = true;
            }
        })?;
        Ok(true)
    }

    // Accounts

    /// Persist `account` under its short address. Signers are stored by seed,
    /// viewers by scanning keys and address.
    pub fn put_account(&mut self, account: &Account) -> Result<(), StoreError> {
        let key = account.short_address().to_hex();
        match account.seed() {
            Some(seed) => {
                let record = SignerRecord {
                    chain_id: account.chain_id(),
                    seed: seed.to_hex().to_string(),
                };
                self.update(|data| {
                    data.viewer_accounts.remove(&key);
                    data.signer_accounts.insert(key, record);
                })
            }
            None => {
                let record = ViewerRecord {
                    chain_id: account.chain_id(),
                    serial_no_key: account.serial_no_key().to_hex(),
                    view_key: account.view_key().to_hex(),
                    address: account.address().to_hex(),
                };
                self.update(|data| {
                    data.signer_accounts.remove(&key);
                    data.viewer_accounts.insert(key, record);
                })
            }
        }
    }

    /// Re-create every stored account through `engine`.
    pub fn load_accounts(&self, engine: &impl CryptoEngine) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();

        for (key, record) in &self.data.signer_accounts {
            let seed = CryptoSeed::from_hex(&record.seed).map_err(|e| corrupt(key, e))?;
            accounts.push(Account::import_signer(engine, record.chain_id, seed)?);
        }

        for (key, record) in &self.data.viewer_accounts {
            let serial_no_key =
                SerialNoKey::from_hex(&record.serial_no_key).map_err(|e| corrupt(key, e))?;
            let view_key = ViewKey::from_hex(&record.view_key).map_err(|e| corrupt(key, e))?;
            let address = Address::from_hex(&record.address).map_err(|e| corrupt(key, e))?;
            accounts.push(Account::import_viewer(
                engine,
                record.chain_id,
                serial_no_key,
                view_key,
                address,
            )?);
        }

        Ok(accounts)
    }

    // Pending transactions

    /// Key under which `unsigned` is stored.
    pub fn pending_tx_key(unsigned: &UnsignedRawTx) -> String {
        hex::encode(Sha256::digest(&unsigned.data))
    }

    pub fn put_pending_tx(&mut self, unsigned: UnsignedRawTx) -> Result<String, StoreError> {
        let key = Self::pending_tx_key(&unsigned);
        self.update(|data| {
            data.pending_txs.insert(
                key.clone(),
                PendingTx {
                    unsigned,
                    signed: None,
                },
            );
        })?;
        Ok(key)
    }

    /// Attach the signed form of a pending transaction. Returns false if no
    /// transaction is pending under `key`.
    pub fn attach_signed_tx(&mut self, key: &str, signed: SignedRawTx) -> Result<bool, StoreError> {
        if !self.data.pending_txs.contains_key(key) {
            return Ok(false);
        }
        self.update(|data| {
            if let Some(pending) = data.pending_txs.get_mut(key) {
                pending.signed = Some(signed);
            }
        })?;
        Ok(true)
    }

    pub fn pending_tx(&self, key: &str) -> Option<&PendingTx> {
        self.data.pending_txs.get(key)
    }

    pub fn pending_txs(&self) -> impl Iterator<Item = (&str, &PendingTx)> {
        self.data
            .pending_txs
            .iter()
            .map(|(key, pending)| (key.as_str(), pending))
    }

    pub fn remove_pending_tx(&mut self, key: &str) -> Result<Option<PendingTx>, StoreError> {
        if !self.data.pending_txs.contains_key(key) {
            return Ok(None);
        }
        self.update(|data| data.pending_txs.remove(key))
    }
}

fn corrupt(key: &str, err: WalletError) -> WalletError {
    WalletError::Store(StoreError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::{Fingerprint, ShortAddress},
        coin::{BlockHash, TxId},
        test_utils::MockCryptoEngine,
    };
    use tempfile::tempdir;

    fn coin(index: u32, serial: u8) -> Coin {
        Coin {
            id: CoinId::new(TxId([7; 32]), index),
            owner_short_address: ShortAddress::compose(0, &Fingerprint::new([1; 32]), &[2; 32]),
            owner_address: Some(Address::new(vec![0, 9, 9]).unwrap()),
            value: 1_000 + index as u64,
            script: Some(vec![index as u8]),
            serial_number: Some(SerialNumber(vec![serial; 32])),
            block_hash: Some(BlockHash([3; 32])),
            block_height: 4,
        }
    }

    #[test]
    fn test_coin_lifecycle_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.json");

        let mut store = WalletStore::open(&path).unwrap();
        assert!(store.put_if_absent(coin(0, 0xa0)).unwrap());
        assert!(store.put_if_absent(coin(1, 0xa1)).unwrap());
        assert!(!store.put_if_absent(coin(0, 0xff)).unwrap());
        assert!(store.mark_spent(&coin(0, 0).id).unwrap());
        assert!(!store.mark_spent(&CoinId::new(TxId([9; 32]), 0)).unwrap());

        let store = WalletStore::open(&path).unwrap();
        assert!(store.exists(&coin(0, 0).id));
        assert!(store.get(&coin(0, 0).id).unwrap().spent);
        assert_eq!(
            store.get(&coin(0, 0).id).unwrap().coin.serial_number,
            Some(SerialNumber(vec![0xa0; 32]))
        );
        let unspent: Vec<_> = store.unspent_coins().map(|c| c.id.index).collect();
        assert_eq!(unspent, vec![1]);
        assert_eq!(
            store
                .coin_by_serial_number(&SerialNumber(vec![0xa1; 32]))
                .unwrap()
                .coin
                .id
                .index,
            1
        );
    }

    #[test]
    fn test_failed_save_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let store_dir = dir.path().join("store");
        std::fs::create_dir(&store_dir).unwrap();
        let mut store = WalletStore::open(store_dir.join("wallet.json")).unwrap();
        assert!(store.put_if_absent(coin(0, 0xa0)).unwrap());

        std::fs::remove_dir_all(&store_dir).unwrap();
        assert!(matches!(
            store.put_if_absent(coin(1, 0xa1)),
            Err(StoreError::Io(_))
        ));
        assert!(store.mark_spent(&coin(0, 0).id).is_err());
        assert!(!store.exists(&coin(1, 0).id));
        assert!(!store.get(&coin(0, 0).id).unwrap().spent);

        std::fs::create_dir(&store_dir).unwrap();
        assert!(store.put_if_absent(coin(1, 0xa1)).unwrap());
        let reopened = WalletStore::open(store_dir.join("wallet.json")).unwrap();
        assert_eq!(reopened.unspent_coins().count(), 2);
    }

    #[test]
    fn test_accounts_are_rederived_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let engine = MockCryptoEngine::new();
        let signer = Account::generate_signer(&engine, 1).unwrap();
        let viewer = Account::generate_signer(&engine, 1).unwrap().to_viewer();

        let mut store = WalletStore::open(&path).unwrap();
        store.put_account(&signer).unwrap();
        store.put_account(&viewer).unwrap();

        let store = WalletStore::open(&path).unwrap();
        let accounts = store.load_accounts(&engine).unwrap();
        assert_eq!(accounts.len(), 2);

        let loaded_signer = accounts.iter().find(|a| a.is_signer()).unwrap();
        assert_eq!(loaded_signer.short_address(), signer.short_address());
        let loaded_viewer = accounts.iter().find(|a| !a.is_signer()).unwrap();
        assert_eq!(loaded_viewer.short_address(), viewer.short_address());
        assert_eq!(loaded_viewer.chain_id(), 1);
    }

    #[test]
    fn test_corrupt_account_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(
            &path,
            r#"{"signer_accounts":{"abe1":{"chain_id":0,"seed":"00"}}}"#,
        )
        .unwrap();

        let store = WalletStore::open(&path).unwrap();
        let err = store.load_accounts(&MockCryptoEngine::new()).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Store(StoreError::Corrupt { ref key, .. }) if key == "abe1"
        ));
    }

    #[test]
    fn test_pending_tx_handoff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let unsigned = UnsignedRawTx {
            data: vec![1, 2, 3],
            signers: vec![],
        };

        let mut store = WalletStore::open(&path).unwrap();
        let key = store.put_pending_tx(unsigned.clone()).unwrap();
        assert_eq!(key, WalletStore::pending_tx_key(&unsigned));
        assert_eq!(key.len(), 64);

        let signed = SignedRawTx {
            data: vec![1, 2, 3, 4],
            txid: TxId([5; 32]),
        };
        assert!(store.attach_signed_tx(&key, signed.clone()).unwrap());
        assert!(!store.attach_signed_tx("missing", signed.clone()).unwrap());

        let mut store = WalletStore::open(&path).unwrap();
        assert_eq!(store.pending_tx(&key).unwrap().signed, Some(signed));
        assert_eq!(store.pending_txs().count(), 1);
        assert!(store.remove_pending_tx(&key).unwrap().is_some());
        assert_eq!(store.pending_txs().count(), 0);
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = WalletStore::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.unspent_coins().count(), 0);
    }
}
