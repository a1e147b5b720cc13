//! Coins
//!
//! A [`Coin`] is one ledger output owned by a wallet account. Coins built by
//! the chain viewer carry every field; coins loaded from the store or supplied
//! by a caller may be partial and are only trusted for their [`CoinId`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    address::{hex_bytes, Address, ShortAddress},
    error::{Result, WalletError},
};

/// A 32-byte transaction id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub [u8; 32]);

/// A 32-byte block hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash(pub [u8; 32]);

macro_rules! hash_hex {
    ($name:ident) => {
        impl $name {
            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| {
                    WalletError::InvalidAddress(format!("{}: {}", stringify!($name), e))
                })?;
                let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
                    WalletError::InvalidAddress(format!("{} must be 32 bytes", stringify!($name)))
                })?;
                Ok(Self(bytes))
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_hex!(TxId);
hash_hex!(BlockHash);

/// Identity of a ledger output: `(txid, output index)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoinId {
    pub txid: TxId,
    pub index: u32,
}

impl CoinId {
    pub fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Debug for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoinId({})", self)
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl FromStr for CoinId {
    type Err = WalletError;

    /// Parses the `"<txid hex>:<index>"` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let (txid, index) = s
            .split_once(':')
            .ok_or_else(|| WalletError::InvalidAddress(format!("malformed coin id: {}", s)))?;
        let index = index
            .parse()
            .map_err(|_| WalletError::InvalidAddress(format!("malformed coin index: {}", s)))?;
        Ok(Self::new(TxId::from_hex(txid)?, index))
    }
}

/// Serial number of a coin; revealed when the coin is spent.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialNumber(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl SerialNumber {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({})", self.to_hex())
    }
}

/// A ledger output owned by one of the wallet's accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub id: CoinId,
    pub owner_short_address: ShortAddress,
    pub owner_address: Option<Address>,
    pub value: u64,
    #[serde(default, with = "opt_hex_bytes")]
    pub script: Option<Vec<u8>>,
    pub serial_number: Option<SerialNumber>,
    pub block_hash: Option<BlockHash>,
    pub block_height: u64,
}

impl Coin {
    /// A coin with only the fields a caller can vouch for: identity, owner
    /// and value. Enough to request a spend; never enough to perform one.
    pub fn claimed(id: CoinId, owner_short_address: ShortAddress, value: u64) -> Self {
        Self {
            id,
            owner_short_address,
            owner_address: None,
            value,
            script: None,
            serial_number: None,
            block_hash: None,
            block_height: 0,
        }
    }

    /// True when every chain-derived field is populated. Incomplete coins
    /// must never be used as transaction inputs.
    pub fn is_complete(&self) -> bool {
        self.owner_address.is_some()
            && self.script.is_some()
            && self.serial_number.is_some()
            && self.block_hash.is_some()
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "COIN(id={}, height={}, owner={}, value={})",
            self.id, self.block_height, self.owner_short_address, self.value
        )
    }
}

mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Fingerprint;

    fn owner() -> ShortAddress {
        ShortAddress::compose(0, &Fingerprint::new([3u8; 32]), &[0u8; 32])
    }

    #[test]
    fn test_coin_id_display_parse() {
        let id = CoinId::new(TxId([0xaa; 32]), 7);
        let s = id.to_string();
        assert!(s.ends_with(":7"));
        assert_eq!(s.parse::<CoinId>().unwrap(), id);
        assert!("nonsense".parse::<CoinId>().is_err());
    }

    #[test]
    fn test_claimed_coin_is_incomplete() {
        let coin = Coin::claimed(CoinId::new(TxId([1; 32]), 0), owner(), 500);
        assert!(!coin.is_complete());
    }

    #[test]
    fn test_complete_coin() {
        let coin = Coin {
            id: CoinId::new(TxId([1; 32]), 0),
            owner_short_address: owner(),
            owner_address: Some(Address::new(vec![0, 1, 2]).unwrap()),
            value: 0,
            script: Some(vec![1, 2, 3]),
            serial_number: Some(SerialNumber(vec![9; 4])),
            block_hash: Some(BlockHash([2; 32])),
            block_height: 0,
        };
        assert!(coin.is_complete());

        let json = serde_json::to_string(&coin).unwrap();
        let back: Coin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coin);
    }
}
