//! Address Types
//!
//! - [`Address`]: the full address, variable length, chain id in byte 0
//! - [`ShortAddress`]: 66 bytes, `0xab | 0xe1+chain | fingerprint(32) | checksum(32)`
//! - [`Fingerprint`]: the 32 bytes used for ownership lookup

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, WalletError};

/// Identifies which chain (mainnet, testnet, ...) an account lives on.
pub type ChainId = u8;

/// Length of a short address in bytes.
pub const SHORT_ADDRESS_LENGTH: usize = 66;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LENGTH: usize = 32;

const SHORT_ADDRESS_MAGIC: u8 = 0xab;
const SHORT_ADDRESS_CHAIN_BASE: u8 = 0xe1;
const FINGERPRINT_OFFSET: usize = 2;
const CHECKSUM_OFFSET: usize = FINGERPRINT_OFFSET + FINGERPRINT_LENGTH;

/// Address-derived identifier for "does this output belong to me".
///
/// Holds no key material; many outputs may map to one fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; FINGERPRINT_LENGTH]);

impl Fingerprint {
    pub fn new(bytes: [u8; FINGERPRINT_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for Fingerprint {
    type Error = WalletError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; FINGERPRINT_LENGTH] = bytes.try_into().map_err(|_| {
            WalletError::InvalidAddress(format!(
                "fingerprint must be {} bytes, got {}",
                FINGERPRINT_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A full account address as produced by the crypto engine. Never empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Address(#[serde(with = "hex_bytes")] Vec<u8>);

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let bytes = hex_bytes::deserialize(deserializer)?;
        Address::new(bytes).map_err(serde::de::Error::custom)
    }
}

impl Address {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(WalletError::InvalidAddress("empty address".into()));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| WalletError::InvalidAddress(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn chain_id(&self) -> ChainId {
        self.0[0]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full addresses run to kilobytes; show the head only.
        let head = &self.0[..self.0.len().min(8)];
        write!(f, "Address({}..[{} bytes])", hex::encode(head), self.0.len())
    }
}

/// Compact form of an [`Address`] embedding its fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortAddress(#[serde(with = "hex_array")] [u8; SHORT_ADDRESS_LENGTH]);

impl ShortAddress {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SHORT_ADDRESS_LENGTH] = bytes.try_into().map_err(|_| {
            WalletError::InvalidAddress(format!(
                "short address must be {} bytes, got {}",
                SHORT_ADDRESS_LENGTH,
                bytes.len()
            ))
        })?;
        if bytes[0] != SHORT_ADDRESS_MAGIC || bytes[1] & 0xf0 != 0xe0 {
            return Err(WalletError::InvalidAddress(
                "short address must start with 0xabe".into(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| WalletError::InvalidAddress(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Assemble a short address from its parts.
    pub fn compose(chain_id: ChainId, fingerprint: &Fingerprint, checksum: &[u8; 32]) -> Self {
        let mut bytes = [0u8; SHORT_ADDRESS_LENGTH];
        bytes[0] = SHORT_ADDRESS_MAGIC;
        bytes[1] = SHORT_ADDRESS_CHAIN_BASE.wrapping_add(chain_id);
        bytes[FINGERPRINT_OFFSET..CHECKSUM_OFFSET].copy_from_slice(fingerprint.as_bytes());
        bytes[CHECKSUM_OFFSET..].copy_from_slice(checksum);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn chain_id(&self) -> ChainId {
        self.0[1].wrapping_sub(SHORT_ADDRESS_CHAIN_BASE)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut bytes = [0u8; FINGERPRINT_LENGTH];
        bytes.copy_from_slice(&self.0[FINGERPRINT_OFFSET..CHECKSUM_OFFSET]);
        Fingerprint(bytes)
    }

    pub fn checksum(&self) -> &[u8] {
        &self.0[CHECKSUM_OFFSET..]
    }
}

impl fmt::Debug for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortAddress(0x{})", self.to_hex())
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address_layout() {
        let fingerprint = Fingerprint::new([7u8; 32]);
        let short = ShortAddress::compose(3, &fingerprint, &[9u8; 32]);

        assert_eq!(short.as_bytes()[0], 0xab);
        assert_eq!(short.chain_id(), 3);
        assert_eq!(short.fingerprint(), fingerprint);
        assert_eq!(short.checksum(), &[9u8; 32]);
        assert!(short.to_hex().starts_with("abe"));
    }

    #[test]
    fn test_short_address_rejects_bad_input() {
        assert!(ShortAddress::from_bytes(&[0xab; 10]).is_err());

        let mut bytes = [0u8; SHORT_ADDRESS_LENGTH];
        bytes[0] = 0xcd;
        bytes[1] = 0xe1;
        assert!(ShortAddress::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_short_address_hex_roundtrip() {
        let short = ShortAddress::compose(0, &Fingerprint::new([1u8; 32]), &[2u8; 32]);
        let parsed = ShortAddress::from_hex(&short.to_hex()).unwrap();
        assert_eq!(parsed, short);
    }

    #[test]
    fn test_address_chain_id() {
        let address = Address::new(vec![5, 1, 2, 3]).unwrap();
        assert_eq!(address.chain_id(), 5);
        assert!(Address::new(vec![]).is_err());
    }

    #[test]
    fn test_short_address_serde_as_hex() {
        let short = ShortAddress::compose(1, &Fingerprint::new([4u8; 32]), &[5u8; 32]);
        let json = serde_json::to_string(&short).unwrap();
        assert_eq!(json, format!("\"{}\"", short.to_hex()));
        let back: ShortAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, short);
    }

    #[test]
    fn test_address_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<Address>("\"\"").is_err());

        let address: Address = serde_json::from_str("\"0501\"").unwrap();
        assert_eq!(address.chain_id(), 5);
    }
}
