//! Accounts
//!
//! An [`Account`] is either a *signer* (holds the seed and spend key) or a
//! *viewer* (holds only the serial-number and view keys). Both carry the
//! address, short address and fingerprint, computed once at construction.
//!
//! A viewer can always be projected out of a signer with
//! [`Account::to_viewer`]; the reverse is impossible by construction.

use std::fmt;

use crate::{
    address::{Address, ChainId, Fingerprint, ShortAddress},
    crypto::CryptoEngine,
    error::{Result, WalletError},
    keys::{CryptoSeed, SerialNoKey, SpendKey, ViewKey},
};

/// Secret material only a signer holds.
#[derive(Clone)]
pub struct SignerMaterial {
    seed: CryptoSeed,
    spend_key: SpendKey,
}

impl SignerMaterial {
    pub fn seed(&self) -> &CryptoSeed {
        &self.seed
    }

    pub fn spend_key(&self) -> &SpendKey {
        &self.spend_key
    }
}

/// Scanning material every account holds.
#[derive(Clone, Debug)]
pub struct ViewMaterial {
    pub serial_no_key: SerialNoKey,
    pub view_key: ViewKey,
}

/// An immutable wallet identity.
#[derive(Clone)]
pub struct Account {
    chain_id: ChainId,
    signer: Option<SignerMaterial>,
    view: ViewMaterial,
    address: Address,
    short_address: ShortAddress,
    fingerprint: Fingerprint,
}

impl Account {
    /// Generate a signer account from a fresh engine-provided seed.
    pub fn generate_signer(engine: &impl CryptoEngine, chain_id: ChainId) -> Result<Self> {
        let seed = engine.generate_seed()?;
        Self::import_signer(engine, chain_id, seed)
    }

    /// Re-create a signer account from its seed.
    pub fn import_signer(
        engine: &impl CryptoEngine,
        chain_id: ChainId,
        seed: CryptoSeed,
    ) -> Result<Self> {
        let keys = engine.derive_keys_and_address(&seed)?;
        let address = engine.address_from_crypto_address(&keys.crypto_address, chain_id)?;
        let signer = SignerMaterial {
            seed,
            spend_key: keys.spend_key,
        };
        let view = ViewMaterial {
            serial_no_key: keys.serial_no_key,
            view_key: keys.view_key,
        };
        Self::assemble(engine, chain_id, Some(signer), view, address)
    }

    /// Re-create a signer account from the hex form returned by
    /// [`Account::export_seed`].
    pub fn import_signer_hex(
        engine: &impl CryptoEngine,
        chain_id: ChainId,
        seed_hex: &str,
    ) -> Result<Self> {
        Self::import_signer(engine, chain_id, CryptoSeed::from_hex(seed_hex)?)
    }

    /// Create a view-only account from scanning material and its address.
    ///
    /// Fails if `chain_id` disagrees with the chain id encoded in `address`.
    pub fn import_viewer(
        engine: &impl CryptoEngine,
        chain_id: ChainId,
        serial_no_key: SerialNoKey,
        view_key: ViewKey,
        address: Address,
    ) -> Result<Self> {
        let view = ViewMaterial {
            serial_no_key,
            view_key,
        };
        Self::assemble(engine, chain_id, None, view, address)
    }

    fn assemble(
        engine: &impl CryptoEngine,
        chain_id: ChainId,
        signer: Option<SignerMaterial>,
        view: ViewMaterial,
        address: Address,
    ) -> Result<Self> {
        if address.chain_id() != chain_id {
            return Err(WalletError::AddressChainMismatch {
                expected: chain_id,
                actual: address.chain_id(),
            });
        }
        let short_address = engine.short_address_from_address(&address)?;
        let fingerprint = short_address.fingerprint();
        Ok(Self {
            chain_id,
            signer,
            view,
            address,
            short_address,
            fingerprint,
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn is_signer(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer_material(&self) -> Option<&SignerMaterial> {
        self.signer.as_ref()
    }

    pub fn seed(&self) -> Option<&CryptoSeed> {
        self.signer.as_ref().map(SignerMaterial::seed)
    }

    pub fn serial_no_key(&self) -> &SerialNoKey {
        &self.view.serial_no_key
    }

    pub fn view_key(&self) -> &ViewKey {
        &self.view.view_key
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn short_address(&self) -> &ShortAddress {
        &self.short_address
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Drop signer-only material.
    pub fn to_viewer(&self) -> Account {
        Account {
            signer: None,
            ..self.clone()
        }
    }

    /// Hex of the seed, the only thing needed to restore a signer.
    pub fn export_seed(&self) -> Result<zeroize::Zeroizing<String>> {
        self.seed()
            .map(CryptoSeed::to_hex)
            .ok_or(WalletError::NotSignerAccount)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("chain_id", &self.chain_id)
            .field("role", &if self.is_signer() { "signer" } else { "viewer" })
            .field("short_address", &self.short_address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockCryptoEngine;
    use assert_matches::assert_matches;

    #[test]
    fn test_generate_then_import_is_identical() {
        let engine = MockCryptoEngine::new();
        let generated = Account::generate_signer(&engine, 0).unwrap();

        let exported = generated.export_seed().unwrap();
        let imported = Account::import_signer_hex(&engine, 0, &exported).unwrap();

        assert_eq!(imported.address(), generated.address());
        assert_eq!(imported.short_address(), generated.short_address());
        assert_eq!(imported.fingerprint(), generated.fingerprint());
    }

    #[test]
    fn test_viewer_projection() {
        let engine = MockCryptoEngine::new();
        let signer = Account::generate_signer(&engine, 1).unwrap();
        let viewer = signer.to_viewer();

        assert!(signer.is_signer());
        assert!(!viewer.is_signer());
        assert_eq!(viewer.fingerprint(), signer.fingerprint());
        assert_eq!(viewer.view_key(), signer.view_key());
        assert_matches!(viewer.export_seed(), Err(WalletError::NotSignerAccount));
    }

    #[test]
    fn test_import_viewer_matches_signer() {
        let engine = MockCryptoEngine::new();
        let signer = Account::generate_signer(&engine, 2).unwrap();
        let viewer = Account::import_viewer(
            &engine,
            2,
            signer.serial_no_key().clone(),
            signer.view_key().clone(),
            signer.address().clone(),
        )
        .unwrap();

        assert_eq!(viewer.short_address(), signer.short_address());
        assert_eq!(viewer.chain_id(), 2);
        assert!(!viewer.is_signer());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let engine = MockCryptoEngine::new();
        let signer = Account::generate_signer(&engine, 0).unwrap();
        let rendered = format!("{:?}", signer);
        assert!(rendered.contains("signer"));
        assert!(!rendered.contains("seed"));
    }

    #[test]
    fn test_import_viewer_rejects_foreign_chain_id() {
        let engine = MockCryptoEngine::new();
        let signer = Account::generate_signer(&engine, 2).unwrap();
        let result = Account::import_viewer(
            &engine,
            3,
            signer.serial_no_key().clone(),
            signer.view_key().clone(),
            signer.address().clone(),
        );

        assert_matches!(
            result,
            Err(WalletError::AddressChainMismatch {
                expected: 3,
                actual: 2
            })
        );
    }
}
