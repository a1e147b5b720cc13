//! Integration tests for abel-wallet
//!
//! These tests drive the wallet end to end against the mock chain and crypto
//! engine:
//! - Account lifecycle (generate, export, import, persist)
//! - Coin discovery through the chain viewer
//! - Building and signing a multi-input transaction
//! - Handing a pending transaction to an offline signer via the store

use abel_wallet::{
    coin::Coin,
    test_utils::{ManualClock, MockChainRpc, MockCryptoEngine},
    tx_builder::BuildState,
    Account, AccountRegistry, AddAccountOutcome, ChainViewer, CoinId, TxBuilder, TxSigner,
    WalletError, WalletStore,
};
use assert_matches::assert_matches;
use tempfile::TempDir;

/// Two signers on chain 0. Alice is paid 500 at height 4, Bob 300 at height
/// 5, and the tip is 12.
struct Network {
    engine: MockCryptoEngine,
    rpc: MockChainRpc,
    clock: ManualClock,
    alice: Account,
    bob: Account,
}

fn network() -> Network {
    let engine = MockCryptoEngine::new();
    let alice = Account::generate_signer(&engine, 0).unwrap();
    let bob = Account::generate_signer(&engine, 0).unwrap();

    let rpc = MockChainRpc::with_empty_blocks(4);
    rpc.push_block(vec![vec![MockCryptoEngine::output_script(
        alice.address(),
        500,
    )]]);
    rpc.push_block(vec![vec![MockCryptoEngine::output_script(bob.address(), 300)]]);
    for _ in 6..=12 {
        rpc.push_block(vec![]);
    }

    Network {
        engine,
        rpc,
        clock: ManualClock::new(),
        alice,
        bob,
    }
}

fn watching_viewer(net: &Network) -> TestViewer<'_> {
    let mut viewer = ChainViewer::with_clock(&net.rpc, MockCryptoEngine::new(), &net.clock);
    viewer.add_account(net.alice.to_viewer());
    viewer.add_account(net.bob.to_viewer());
    viewer
}

type TestViewer<'a> = ChainViewer<&'a MockChainRpc, MockCryptoEngine, &'a ManualClock>;

fn scan_all(viewer: &mut TestViewer<'_>) -> Vec<Coin> {
    let safe = viewer.get_latest_safe_height().unwrap().unwrap();
    (0..=safe)
        .filter_map(|height| viewer.scan_block(height).unwrap())
        .flatten()
        .collect()
}

// ============================================================================
// Account Lifecycle Tests
// ============================================================================

mod account_lifecycle {
    use super::*;

    #[test]
    fn test_export_and_import_signer() {
        let engine = MockCryptoEngine::new();
        let account = Account::generate_signer(&engine, 3).unwrap();

        let seed_hex = account.export_seed().unwrap();
        let restored = Account::import_signer_hex(&engine, 3, &seed_hex).unwrap();

        assert_eq!(restored.address(), account.address());
        assert_eq!(restored.short_address(), account.short_address());
        assert_eq!(restored.fingerprint(), account.fingerprint());
        assert!(restored.is_signer());
    }

    #[test]
    fn test_viewer_cannot_export_seed() {
        let engine = MockCryptoEngine::new();
        let viewer = Account::generate_signer(&engine, 0).unwrap().to_viewer();

        assert!(!viewer.is_signer());
        assert_matches!(viewer.export_seed(), Err(WalletError::NotSignerAccount));
    }

    #[test]
    fn test_re_adding_account_overwrites() {
        let net = network();
        let mut signer = TxSigner::new(MockCryptoEngine::new());

        assert_eq!(
            signer.add_account(net.alice.clone()),
            AddAccountOutcome::Accepted { replaced: false }
        );
        assert_eq!(
            signer.add_account(net.alice.clone()),
            AddAccountOutcome::Accepted { replaced: true }
        );
        assert_eq!(signer.accounts().len(), 1);
        assert!(signer.has_account(net.alice.fingerprint()));
    }

    #[test]
    fn test_accounts_survive_store_reload() {
        let net = network();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wallet.json");

        {
            let mut store = WalletStore::open(&path).unwrap();
            store.put_account(&net.alice).unwrap();
            store.put_account(&net.bob.to_viewer()).unwrap();
        }

        let store = WalletStore::open(&path).unwrap();
        let mut loaded = store.load_accounts(&net.engine).unwrap();
        loaded.sort_by_key(|account| account.is_signer());

        assert_eq!(loaded.len(), 2);
        assert!(!loaded[0].is_signer());
        assert_eq!(loaded[0].short_address(), net.bob.short_address());
        assert!(loaded[1].is_signer());
        assert_eq!(loaded[1].short_address(), net.alice.short_address());
    }
}

// ============================================================================
// Chain Viewer Tests
// ============================================================================

mod chain_viewing {
    use super::*;

    #[test]
    fn test_safe_height_aligns_to_ring_end() {
        let rpc = MockChainRpc::with_empty_blocks(11);
        let clock = ManualClock::new();
        let mut viewer = ChainViewer::with_clock(&rpc, MockCryptoEngine::new(), &clock);

        assert_eq!(viewer.get_latest_height().unwrap(), 10);
        assert_eq!(viewer.get_latest_safe_height().unwrap(), Some(8));
        assert!(viewer.get_safe_block_info(8).unwrap().is_some());
        assert!(viewer.get_safe_block_info(9).unwrap().is_none());
    }

    #[test]
    fn test_scan_finds_coins_of_every_account() {
        let net = network();
        let mut viewer = watching_viewer(&net);

        let coins = scan_all(&mut viewer);

        assert_eq!(coins.len(), 2);
        let alice_coin = coins
            .iter()
            .find(|c| c.owner_short_address == *net.alice.short_address())
            .unwrap();
        assert_eq!(alice_coin.value, 500);
        assert_eq!(alice_coin.block_height, 4);
        assert!(alice_coin.is_complete());

        let bob_coin = coins
            .iter()
            .find(|c| c.owner_short_address == *net.bob.short_address())
            .unwrap();
        assert_eq!(bob_coin.value, 300);
        assert_eq!(bob_coin.block_height, 5);
    }

    #[test]
    fn test_scanned_coins_are_stored_once() {
        let net = network();
        let mut viewer = watching_viewer(&net);
        let temp_dir = TempDir::new().unwrap();
        let mut store = WalletStore::open(temp_dir.path().join("wallet.json")).unwrap();

        for coin in scan_all(&mut viewer) {
            assert!(store.put_if_absent(coin).unwrap());
        }
        for coin in scan_all(&mut viewer) {
            assert!(!store.put_if_absent(coin).unwrap());
        }
        assert_eq!(store.unspent_coins().count(), 2);
    }
}

// ============================================================================
// Transaction Flow Tests
// ============================================================================

mod transaction_flow {
    use super::*;

    /// Every scanned coin, reduced to what a user would claim for it.
    fn claimed_inputs(
        viewer: &mut TestViewer<'_>,
    ) -> Vec<Coin> {
        scan_all(viewer)
            .into_iter()
            .map(|coin| Coin::claimed(coin.id, coin.owner_short_address, coin.value))
            .collect()
    }

    #[test]
    fn test_build_and_sign_with_two_signers() {
        let net = network();
        let mut viewer = watching_viewer(&net);
        let inputs = claimed_inputs(&mut viewer);

        let mut builder = TxBuilder::new(&mut viewer);
        builder
            .add_inputs(inputs)
            .add_output(net.alice.address().clone(), 700)
            .set_fee(100);
        let unsigned = builder.build().unwrap();
        assert_eq!(builder.state(), &BuildState::Ready);

        let heights: Vec<u64> = builder.ring_blocks().iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![3, 4, 5]);
        assert_eq!(unsigned.signers.len(), 2);
        assert!(unsigned.signers.contains(net.alice.short_address()));
        assert!(unsigned.signers.contains(net.bob.short_address()));

        let mut signer = TxSigner::new(MockCryptoEngine::new());
        signer.add_account(net.alice.clone());
        signer.add_account(net.bob.clone());
        let signed = signer.sign(&unsigned).unwrap();

        assert!(signed.data.starts_with(&unsigned.data));
        assert_eq!(signer.engine().last_signers(), unsigned.signers);
    }

    #[test]
    fn test_value_mismatch_fails_build() {
        let net = network();
        let mut viewer = watching_viewer(&net);
        let mut inputs = claimed_inputs(&mut viewer);
        inputs[0].value += 1;

        let mut builder = TxBuilder::new(&mut viewer);
        builder
            .add_inputs(inputs)
            .add_output(net.bob.address().clone(), 10);

        assert_matches!(builder.build(), Err(WalletError::CoinValueMismatch { .. }));
        assert_matches!(builder.state(), BuildState::Failed { .. });
        assert!(viewer.engine().last_unsigned_request().is_none());
    }

    #[test]
    fn test_unknown_coin_fails_build() {
        let net = network();
        let mut viewer = watching_viewer(&net);
        let bogus = CoinId::new(abel_wallet::coin::TxId([7; 32]), 0);

        let mut builder = TxBuilder::new(&mut viewer);
        builder
            .add_input(Coin::claimed(bogus, *net.alice.short_address(), 500))
            .add_output(net.bob.address().clone(), 10);

        assert_matches!(builder.build(), Err(WalletError::CoinNotFound(id)) if id == bogus);
    }

    #[test]
    fn test_missing_signer_signs_nothing() {
        let net = network();
        let mut viewer = watching_viewer(&net);
        let inputs = claimed_inputs(&mut viewer);

        let mut builder = TxBuilder::new(&mut viewer);
        builder
            .add_inputs(inputs)
            .add_output(net.alice.address().clone(), 700);
        let unsigned = builder.build().unwrap();

        let mut signer = TxSigner::new(MockCryptoEngine::new());
        signer.add_account(net.alice.clone());

        assert_matches!(
            signer.sign(&unsigned),
            Err(WalletError::SignerNotFound(sa)) if sa == *net.bob.short_address()
        );
        assert!(signer.engine().last_signers().is_empty());
    }

    #[test]
    fn test_pending_tx_hand_off_through_store() {
        let net = network();
        let mut viewer = watching_viewer(&net);
        let inputs = claimed_inputs(&mut viewer);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wallet.json");

        let mut builder = TxBuilder::new(&mut viewer);
        builder
            .add_inputs(inputs)
            .add_output(net.alice.address().clone(), 700);
        let unsigned = builder.build().unwrap();

        // Online side records the unsigned transaction.
        let key = WalletStore::open(&path)
            .unwrap()
            .put_pending_tx(unsigned.clone())
            .unwrap();

        // Offline side signs it and attaches the result.
        let mut store = WalletStore::open(&path).unwrap();
        let pending = store.pending_tx(&key).unwrap().clone();
        assert!(pending.signed.is_none());

        let mut signer = TxSigner::new(MockCryptoEngine::new());
        signer.add_account(net.alice.clone());
        signer.add_account(net.bob.clone());
        let signed = signer.sign(&pending.unsigned).unwrap();
        assert!(store.attach_signed_tx(&key, signed.clone()).unwrap());

        let store = WalletStore::open(&path).unwrap();
        assert_eq!(store.pending_tx(&key).unwrap().signed, Some(signed));
    }
}
