//! Key Material
//!
//! Fixed-length key blobs produced by the crypto engine. The wallet layer never
//! interprets them; it only checks their length, keeps secret ones out of logs,
//! and hands them back to the engine.
//!
//! Security: secret material ([`CryptoSeed`], [`SpendKey`]) is held in
//! `Zeroizing<Vec<u8>>` so the bytes are overwritten when dropped, and renders
//! as `[N bytes|********...********]` in `Debug` output.

use std::fmt;
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident, $len_const:ident = $len:expr, secret) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Zeroizing<Vec<u8>>);

        pub const $len_const: usize = $len;

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Result<Self> {
                let bytes = Zeroizing::new(bytes);
                check_length(stringify!($name), $len, bytes.len())?;
                Ok(Self(bytes))
            }

            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = Zeroizing::new(
                    hex::decode(s).map_err(|source| invalid_hex(stringify!($name), source))?,
                );
                Self::new(bytes.to_vec())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> Zeroizing<String> {
                Zeroizing::new(hex::encode(&*self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}([{} bytes|********...********])", stringify!($name), self.0.len())
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $len_const:ident = $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Vec<u8>);

        pub const $len_const: usize = $len;

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Result<Self> {
                check_length(stringify!($name), $len, bytes.len())?;
                Ok(Self(bytes))
            }

            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes =
                    hex::decode(s).map_err(|source| invalid_hex(stringify!($name), source))?;
                Self::new(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let head = &self.0[..self.0.len().min(8)];
                write!(f, "{}({}..[{} bytes])", stringify!($name), hex::encode(head), self.0.len())
            }
        }
    };
}

key_type!(
    /// The root secret of a signer account. Every other key and the address
    /// are derived from it, so exporting the seed exports the account.
    CryptoSeed,
    CRYPTO_SEED_LENGTH = 132,
    secret
);

key_type!(
    /// Secret key authorizing spends.
    SpendKey,
    SPEND_KEY_LENGTH = 1540,
    secret
);

key_type!(
    /// Key used to derive coin serial numbers.
    SerialNoKey,
    SERIAL_NO_KEY_LENGTH = 1060
);

key_type!(
    /// Key used to detect owned outputs and decode their values.
    ViewKey,
    VIEW_KEY_LENGTH = 2408
);

fn invalid_hex(kind: &'static str, source: hex::FromHexError) -> WalletError {
    WalletError::InvalidKeyHex { kind, source }
}

fn check_length(kind: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(WalletError::InvalidKeyLength {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Everything the crypto engine derives from one seed.
#[derive(Clone, Debug)]
pub struct DerivedKeys {
    pub spend_key: SpendKey,
    pub serial_no_key: SerialNoKey,
    pub view_key: ViewKey,
    /// Chain-independent address; combined with a chain id to form an
    /// [`Address`](crate::address::Address).
    pub crypto_address: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_key_lengths_enforced() {
        assert!(CryptoSeed::new(vec![0u8; CRYPTO_SEED_LENGTH]).is_ok());
        assert_matches!(
            CryptoSeed::new(vec![0u8; 10]),
            Err(WalletError::InvalidKeyLength {
                expected: CRYPTO_SEED_LENGTH,
                actual: 10,
                ..
            })
        );
        assert!(ViewKey::new(vec![1u8; VIEW_KEY_LENGTH - 1]).is_err());
        assert!(SerialNoKey::new(vec![1u8; SERIAL_NO_KEY_LENGTH]).is_ok());
        assert!(SpendKey::new(vec![1u8; SPEND_KEY_LENGTH]).is_ok());
    }

    #[test]
    fn test_secret_keys_are_redacted() {
        let seed = CryptoSeed::new(vec![0x42u8; CRYPTO_SEED_LENGTH]).unwrap();
        let rendered = format!("{:?}", seed);
        assert!(rendered.contains("132 bytes"));
        assert!(!rendered.contains("42"));
    }

    #[test]
    fn test_seed_hex_roundtrip() {
        let seed = CryptoSeed::new((0..CRYPTO_SEED_LENGTH as u32).map(|i| i as u8).collect())
            .unwrap();
        let restored = CryptoSeed::from_hex(&seed.to_hex()).unwrap();
        assert_eq!(restored, seed);
    }

    #[test]
    fn test_bad_hex_is_not_a_length_error() {
        assert_matches!(
            CryptoSeed::from_hex("zz"),
            Err(WalletError::InvalidKeyHex {
                kind: "CryptoSeed",
                source: hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 },
            })
        );
        assert_matches!(
            ViewKey::from_hex("abc"),
            Err(WalletError::InvalidKeyHex {
                kind: "ViewKey",
                source: hex::FromHexError::OddLength,
            })
        );
        // Well-formed hex of the wrong size is still a length error.
        assert_matches!(
            ViewKey::from_hex("abcd"),
            Err(WalletError::InvalidKeyLength { actual: 2, .. })
        );
    }
}
