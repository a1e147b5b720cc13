//! Chain RPC
//!
//! [`ChainRpc`] is the read-only view of the ledger the wallet needs. Every
//! query returns `Ok(None)` when the node has no such object; `Err` is kept
//! for transport and protocol failures.
//!
//! [`JsonRpcClient`] talks to a node over blocking JSON-RPC.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;

use crate::{
    address::hex_bytes,
    coin::{BlockHash, TxId},
    error::RpcError,
};

/// RPC error codes the node uses for "no such object".
const RPC_ERR_NOT_FOUND: i64 = -5;
const RPC_ERR_OUT_OF_RANGE: i64 = -8;

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A block addressed either by height or by hash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Height(u64),
    Hash(BlockHash),
}

impl fmt::Debug for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRef::Height(height) => write!(f, "height {}", height),
            BlockRef::Hash(hash) => write!(f, "hash {}", hash),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    #[serde(rename = "blocks")]
    pub height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: BlockHash,
    pub height: u64,
    #[serde(rename = "tx", default)]
    pub tx_hashes: Vec<TxId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxVout {
    /// Output index as reported by the node; falls back to the position in
    /// `vout` when absent.
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(with = "hex_bytes")]
    pub script: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxVin {
    #[serde(rename = "serialnumber", with = "hex_bytes")]
    pub serial_number: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInfo {
    pub txid: TxId,
    /// `None` while the transaction is still in the mempool.
    #[serde(rename = "blockhash", default)]
    pub block_hash: Option<BlockHash>,
    #[serde(rename = "vin", default)]
    pub vins: Vec<TxVin>,
    #[serde(rename = "vout", default)]
    pub vouts: Vec<TxVout>,
}

/// Read-only ledger queries.
pub trait ChainRpc {
    fn get_chain_info(&self) -> Result<Option<ChainInfo>, RpcError>;

    fn get_block_hash(&self, height: u64) -> Result<Option<BlockHash>, RpcError>;

    fn get_block_info(&self, block: BlockRef) -> Result<Option<BlockInfo>, RpcError>;

    fn get_tx_info(&self, txid: &TxId) -> Result<Option<TxInfo>, RpcError>;

    /// Raw serialized block, as fed to serial-number derivation and ring
    /// construction.
    fn get_block_bytes(&self, block: BlockRef) -> Result<Option<Vec<u8>>, RpcError>;
}

impl<T: ChainRpc + ?Sized> ChainRpc for &T {
    fn get_chain_info(&self) -> Result<Option<ChainInfo>, RpcError> {
        (**self).get_chain_info()
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<BlockHash>, RpcError> {
        (**self).get_block_hash(height)
    }

    fn get_block_info(&self, block: BlockRef) -> Result<Option<BlockInfo>, RpcError> {
        (**self).get_block_info(block)
    }

    fn get_tx_info(&self, txid: &TxId) -> Result<Option<TxInfo>, RpcError> {
        (**self).get_tx_info(txid)
    }

    fn get_block_bytes(&self, block: BlockRef) -> Result<Option<Vec<u8>>, RpcError> {
        (**self).get_block_bytes(block)
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Connection settings for [`JsonRpcClient`].
#[derive(Clone, Debug)]
pub struct RpcSettings {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// Blocking JSON-RPC client for an abec-style node.
pub struct JsonRpcClient {
    settings: RpcSettings,
    client: reqwest::blocking::Client,
}

impl JsonRpcClient {
    pub fn new(settings: RpcSettings) -> Result<Self, RpcError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    /// Issue one call. "Not found" style RPC errors come back as `Ok(None)`.
    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, RpcError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            method,
            params,
            id,
        };
        debug!("RPC {} (id {})", method, id);

        let mut builder = self.client.post(&self.settings.endpoint).json(&request);
        if let Some(username) = &self.settings.username {
            builder = builder.basic_auth(username, self.settings.password.as_ref());
        }
        let response = builder.send()?;

        // The node reports RPC errors with a non-2xx status and a JSON body,
        // so the body is inspected before the status.
        let status = response.status();
        let body = response.text()?;
        let parsed: JsonRpcResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Http(format!("HTTP error: {}", status)))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = parsed.error {
            return match error.code {
                RPC_ERR_NOT_FOUND | RPC_ERR_OUT_OF_RANGE => {
                    debug!("RPC {} not found: {}", method, error.message);
                    Ok(None)
                }
                code => Err(RpcError::Rpc {
                    code,
                    message: error.message,
                }),
            };
        }

        Ok(parsed.result)
    }

    fn resolve_hash(&self, block: BlockRef) -> Result<Option<BlockHash>, RpcError> {
        match block {
            BlockRef::Hash(hash) => Ok(Some(hash)),
            BlockRef::Height(height) => self.get_block_hash(height),
        }
    }
}

impl ChainRpc for JsonRpcClient {
    fn get_chain_info(&self) -> Result<Option<ChainInfo>, RpcError> {
        self.call("getinfo", json!([]))
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<BlockHash>, RpcError> {
        let hash: Option<String> = self.call("getblockhash", json!([height]))?;
        hash.map(|h| BlockHash::from_hex(&h).map_err(|e| RpcError::Decode(e.to_string())))
            .transpose()
    }

    fn get_block_info(&self, block: BlockRef) -> Result<Option<BlockInfo>, RpcError> {
        let Some(hash) = self.resolve_hash(block)? else {
            return Ok(None);
        };
        self.call("getblockabe", json!([hash.to_hex(), 1]))
    }

    fn get_tx_info(&self, txid: &TxId) -> Result<Option<TxInfo>, RpcError> {
        self.call("getrawtransaction", json!([txid.to_hex(), true]))
    }

    fn get_block_bytes(&self, block: BlockRef) -> Result<Option<Vec<u8>>, RpcError> {
        let Some(hash) = self.resolve_hash(block)? else {
            return Ok(None);
        };
        let raw: Option<String> = self.call("getblockabe", json!([hash.to_hex(), 0]))?;
        Ok(raw.map(hex::decode).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_block_info() {
        let json = format!(
            r#"{{"hash":"{}","height":12,"tx":["{}"],"confirmations":3}}"#,
            "11".repeat(32),
            "22".repeat(32)
        );
        let info: BlockInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info.height, 12);
        assert_eq!(info.hash, BlockHash([0x11; 32]));
        assert_eq!(info.tx_hashes, vec![TxId([0x22; 32])]);
    }

    #[test]
    fn test_decode_tx_info() {
        let json = format!(
            r#"{{"txid":"{}","blockhash":"{}","vin":[{{"serialnumber":"abcd"}}],"vout":[{{"script":"0102"}},{{"script":"03"}}]}}"#,
            "aa".repeat(32),
            "bb".repeat(32)
        );
        let info: TxInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info.block_hash, Some(BlockHash([0xbb; 32])));
        assert_eq!(info.vins[0].serial_number, vec![0xab, 0xcd]);
        assert_eq!(info.vouts.len(), 2);
        assert_eq!(info.vouts[0].script, vec![1, 2]);
    }

    #[test]
    fn test_mempool_tx_has_no_block() {
        let json = format!(r#"{{"txid":"{}","vout":[]}}"#, "aa".repeat(32));
        let info: TxInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info.block_hash, None);
    }

    #[test]
    fn test_decode_chain_info() {
        let info: ChainInfo = serde_json::from_str(r#"{"blocks":100,"version":1}"#).unwrap();
        assert_eq!(info.height, 100);
    }

    #[test]
    fn test_error_envelope() {
        let resp: JsonRpcResponse<u64> =
            serde_json::from_str(r#"{"result":null,"error":{"code":-5,"message":"nope"},"id":1}"#)
                .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, RPC_ERR_NOT_FOUND);
        assert!(resp.result.is_none());
    }
}
