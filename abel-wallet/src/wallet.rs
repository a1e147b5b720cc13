//! Account Registry
//!
//! Both the chain viewer and the transaction signer hold a set of accounts
//! keyed by fingerprint. They differ only in which accounts they are willing
//! to hold, so the shared behavior lives in the [`AccountRegistry`] trait and
//! each holder supplies its own [`AccountRegistry::accept_account`] policy.

use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::{
    account::Account,
    address::{ChainId, Fingerprint, ShortAddress},
};

/// Why an account was refused by a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The registry only holds signer accounts.
    NotSigner,
    /// All accounts in the registry must share one chain id.
    ChainIdMismatch { expected: ChainId, actual: ChainId },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotSigner => f.write_str("not a signer account"),
            RejectReason::ChainIdMismatch { expected, actual } => {
                write!(f, "chain id {} does not match {}", actual, expected)
            }
        }
    }
}

/// Result of [`AccountRegistry::add_account`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddAccountOutcome {
    /// Stored. `replaced` is true when an account with the same fingerprint
    /// was already present and has been overwritten.
    Accepted { replaced: bool },
    /// Refused; the registry is unchanged.
    Rejected(RejectReason),
}

impl AddAccountOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AddAccountOutcome::Accepted { .. })
    }
}

/// Fingerprint-keyed account storage with a short-address index.
#[derive(Clone, Debug, Default)]
pub struct Accounts {
    by_fingerprint: HashMap<Fingerprint, Account>,
    by_short_address: HashMap<ShortAddress, Fingerprint>,
}

impl Accounts {
    /// Insert `account`, overwriting any account with the same fingerprint.
    /// Returns true if an entry was replaced.
    pub fn insert(&mut self, account: Account) -> bool {
        let fingerprint = *account.fingerprint();
        let previous = self.by_fingerprint.remove(&fingerprint);
        if let Some(previous) = &previous {
            self.by_short_address.remove(previous.short_address());
        }
        self.by_short_address
            .insert(*account.short_address(), fingerprint);
        self.by_fingerprint.insert(fingerprint, account);
        previous.is_some()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Account> {
        self.by_fingerprint.get(fingerprint)
    }

    pub fn get_by_short_address(&self, short_address: &ShortAddress) -> Option<&Account> {
        self.by_short_address
            .get(short_address)
            .and_then(|fingerprint| self.by_fingerprint.get(fingerprint))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.by_fingerprint.values()
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

/// An acceptance-gated set of accounts.
pub trait AccountRegistry {
    fn registry(&self) -> &Accounts;

    fn registry_mut(&mut self) -> &mut Accounts;

    /// The holder's policy. `Err` leaves the registry untouched.
    fn accept_account(&self, account: &Account) -> Result<(), RejectReason>;

    /// Called after an account passed the policy and was stored.
    fn account_added(&mut self, _account: &Account) {}

    /// Store `account` if the policy accepts it. Re-adding a fingerprint
    /// overwrites the earlier account.
    fn add_account(&mut self, account: Account) -> AddAccountOutcome {
        if let Err(reason) = self.accept_account(&account) {
            warn!(
                "Account {} rejected: {}",
                account.short_address(),
                reason
            );
            return AddAccountOutcome::Rejected(reason);
        }

        self.account_added(&account);
        let short_address = *account.short_address();
        let replaced = self.registry_mut().insert(account);
        debug!("Account {} added (replaced: {})", short_address, replaced);
        AddAccountOutcome::Accepted { replaced }
    }

    fn get_account(&self, fingerprint: &Fingerprint) -> Option<&Account> {
        self.registry().get(fingerprint)
    }

    fn get_account_by_short_address(&self, short_address: &ShortAddress) -> Option<&Account> {
        self.registry().get_by_short_address(short_address)
    }

    fn has_account(&self, fingerprint: &Fingerprint) -> bool {
        self.registry().get(fingerprint).is_some()
    }

    fn accounts(&self) -> Vec<Account> {
        self.registry().iter().cloned().collect()
    }

    fn fingerprints(&self) -> Vec<Fingerprint> {
        self.registry().iter().map(|a| *a.fingerprint()).collect()
    }

    fn short_addresses(&self) -> Vec<ShortAddress> {
        self.registry().iter().map(|a| *a.short_address()).collect()
    }
}
