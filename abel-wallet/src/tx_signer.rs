//! Transaction Signer
//!
//! Holds signer accounts of a single chain and turns an [`UnsignedRawTx`] into
//! a [`SignedRawTx`]. Every short address the transaction lists must resolve to
//! a held account; otherwise nothing is signed.

use tracing::{error, info};

use crate::{
    account::Account,
    address::ChainId,
    crypto::{CryptoEngine, SignedRawTx, SignerCredential, UnsignedRawTx},
    error::{Result, WalletError},
    wallet::{AccountRegistry, Accounts, RejectReason},
};

pub struct TxSigner<E> {
    engine: E,
    accounts: Accounts,
    accounts_chain_id: Option<ChainId>,
}

impl<E: CryptoEngine> TxSigner<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            accounts: Accounts::default(),
            accounts_chain_id: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Chain id fixed by the first accepted account.
    pub fn accounts_chain_id(&self) -> Option<ChainId> {
        self.accounts_chain_id
    }

    /// Sign `unsigned` with the seeds of its listed signers, in the listed
    /// order.
    pub fn sign(&self, unsigned: &UnsignedRawTx) -> Result<SignedRawTx> {
        let mut credentials = Vec::with_capacity(unsigned.signers.len());
        for short_address in &unsigned.signers {
            let account = self
                .get_account_by_short_address(short_address)
                .ok_or_else(|| {
                    error!("Signer account not found: {}", short_address);
                    WalletError::SignerNotFound(*short_address)
                })?;
            let seed = account.seed().ok_or(WalletError::NotSignerAccount)?;
            credentials.push(SignerCredential {
                short_address: *short_address,
                seed,
            });
        }

        let signed = self
            .engine
            .build_signed_tx(&unsigned.data, &credentials)?;
        info!(
            "Signed tx {} with {} signers",
            signed.txid,
            credentials.len()
        );
        Ok(signed)
    }
}

impl<E> AccountRegistry for TxSigner<E> {
    fn registry(&self) -> &Accounts {
        &self.accounts
    }

    fn registry_mut(&mut self) -> &mut Accounts {
        &mut self.accounts
    }

    fn accept_account(&self, account: &Account) -> std::result::Result<(), RejectReason> {
        if !account.is_signer() {
            return Err(RejectReason::NotSigner);
        }
        match self.accounts_chain_id {
            Some(expected) if expected != account.chain_id() => {
                Err(RejectReason::ChainIdMismatch {
                    expected,
                    actual: account.chain_id(),
                })
            }
            _ => Ok(()),
        }
    }

    fn account_added(&mut self, account: &Account) {
        self.accounts_chain_id.get_or_insert(account.chain_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{address::ShortAddress, test_utils::MockCryptoEngine, wallet::AddAccountOutcome};
    use assert_matches::assert_matches;

    fn unsigned(signers: Vec<ShortAddress>) -> UnsignedRawTx {
        UnsignedRawTx {
            data: b"unsigned-tx".to_vec(),
            signers,
        }
    }

    #[test]
    fn test_first_account_fixes_chain_id() {
        let engine = MockCryptoEngine::new();
        let mut signer = TxSigner::new(MockCryptoEngine::new());
        assert_eq!(signer.accounts_chain_id(), None);

        let a = Account::generate_signer(&engine, 2).unwrap();
        let b = Account::generate_signer(&engine, 3).unwrap();
        assert!(signer.add_account(a).is_accepted());
        assert_eq!(signer.accounts_chain_id(), Some(2));
        assert_eq!(
            signer.add_account(b),
            AddAccountOutcome::Rejected(RejectReason::ChainIdMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(signer.accounts().len(), 1);
    }

    #[test]
    fn test_viewer_is_rejected() {
        let engine = MockCryptoEngine::new();
        let mut signer = TxSigner::new(MockCryptoEngine::new());
        let viewer = Account::generate_signer(&engine, 0).unwrap().to_viewer();

        assert_eq!(
            signer.add_account(viewer),
            AddAccountOutcome::Rejected(RejectReason::NotSigner)
        );
        assert_eq!(signer.accounts_chain_id(), None);
        assert!(signer.accounts().is_empty());
    }

    #[test]
    fn test_sign_in_declared_order() {
        let engine = MockCryptoEngine::new();
        let a = Account::generate_signer(&engine, 0).unwrap();
        let b = Account::generate_signer(&engine, 0).unwrap();
        let mut signer = TxSigner::new(MockCryptoEngine::new());
        signer.add_account(a.clone());
        signer.add_account(b.clone());

        let order = vec![*b.short_address(), *a.short_address()];
        let signed = signer.sign(&unsigned(order.clone())).unwrap();

        assert!(signed.data.starts_with(b"unsigned-tx"));
        assert_eq!(signer.engine().last_signers(), order);
    }

    #[test]
    fn test_missing_signer_signs_nothing() {
        let engine = MockCryptoEngine::new();
        let a = Account::generate_signer(&engine, 0).unwrap();
        let absent = Account::generate_signer(&engine, 0).unwrap();
        let mut signer = TxSigner::new(MockCryptoEngine::new());
        signer.add_account(a.clone());

        let result = signer.sign(&unsigned(vec![*a.short_address(), *absent.short_address()]));
        assert_matches!(result, Err(WalletError::SignerNotFound(sa)) if sa == *absent.short_address());
        assert!(signer.engine().last_signers().is_empty());
    }
}
