//! Electrum (Fulcrum) chain provider.
//!
//! Line-delimited JSON-RPC over a plain TCP connection. One request is in
//! flight at a time; notifications interleaved with responses are skipped.

use super::ChainProvider;
use crate::config::network::{CLIENT_NAME, ELECTRUM_PROTOCOL_VERSION};
use crate::error::{VaultError, VaultResult};
use crate::utxo::{NftCapability, NftData, TokenData, Utxo};
use async_trait::async_trait;
use bitcoin::{consensus::encode::serialize_hex, Script, Transaction};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
    time::timeout,
};

/// Electrum script hash: reversed SHA-256 of the locking bytecode
pub fn script_hash(locking_bytecode: &Script) -> String {
    let mut digest = Sha256::digest(locking_bytecode.as_bytes()).to_vec();
    digest.reverse();
    hex::encode(digest)
}

#[derive(Debug)]
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[derive(Debug)]
pub struct ElectrumClient {
    server: String,
    request_timeout: Duration,
    connection: Mutex<Connection>,
    next_id: AtomicU64,
}

impl ElectrumClient {
    /// Connect to `server` (`host:port`) and negotiate the protocol version
    pub async fn connect(server: &str, request_timeout: Duration) -> VaultResult<Self> {
        let stream = timeout(request_timeout, TcpStream::connect(server))
            .await
            .map_err(|_| VaultError::network(format!("connecting to {} timed out", server)))?
            .map_err(|e| VaultError::network(format!("cannot connect to {}: {}", server, e)))?;
        let (read_half, write_half) = stream.into_split();

        let client = Self {
            server: server.to_string(),
            request_timeout,
            connection: Mutex::new(Connection {
                reader: BufReader::new(read_half),
                writer: write_half,
            }),
            next_id: AtomicU64::new(0),
        };

        let version = client
            .request(
                "server.version",
                json!([CLIENT_NAME, ELECTRUM_PROTOCOL_VERSION]),
            )
            .await?;
        log::debug!("connected to {} ({})", server, version);
        Ok(client)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn request(&self, method: &str, params: Value) -> VaultResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut line = serde_json::to_string(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))?;
        line.push('\n');
        log::trace!("-> {}", line.trim_end());

        let mut connection = self.connection.lock().await;
        timeout(
            self.request_timeout,
            exchange(&mut connection, &line, id, method, &self.server),
        )
        .await
        .map_err(|_| VaultError::network(format!("{} timed out after {:?}", method, self.request_timeout)))?
    }
}

/// Write one request and read lines until the response with `id` arrives
async fn exchange(
    connection: &mut Connection,
    line: &str,
    id: u64,
    method: &str,
    server: &str,
) -> VaultResult<Value> {
    connection.writer.write_all(line.as_bytes()).await?;
    connection.writer.flush().await?;

    loop {
        let mut response = String::new();
        if connection.reader.read_line(&mut response).await? == 0 {
            return Err(VaultError::network(format!("{} closed the connection", server)));
        }
        log::trace!("<- {}", response.trim_end());

        let response: RpcResponse = serde_json::from_str(&response)?;
        if response.id == Some(id) {
            return response.into_result(method);
        }
    }
}

#[async_trait]
impl ChainProvider for ElectrumClient {
    async fn get_block_height(&self) -> VaultResult<u64> {
        let header: HeaderNotification =
            serde_json::from_value(self.request("blockchain.headers.subscribe", json!([])).await?)?;
        Ok(header.height)
    }

    async fn get_utxos(&self, locking_bytecode: &Script) -> VaultResult<Vec<Utxo>> {
        let result = self
            .request(
                "blockchain.scripthash.listunspent",
                json!([script_hash(locking_bytecode)]),
            )
            .await?;
        parse_unspent(result)
    }

    async fn broadcast(&self, transaction: &Transaction) -> VaultResult<String> {
        let result = self
            .request(
                "blockchain.transaction.broadcast",
                json!([serialize_hex(transaction)]),
            )
            .await?;
        match result {
            Value::String(txid) => Ok(txid),
            other => Err(VaultError::network(format!(
                "unexpected broadcast response: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl RpcResponse {
    fn into_result(self, method: &str) -> VaultResult<Value> {
        if let Some(error) = self.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(VaultError::network(format!("{} failed: {}", method, message)));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Deserialize)]
struct HeaderNotification {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct WireUtxo {
    tx_hash: String,
    tx_pos: u32,
    value: u64,
    #[serde(default)]
    token_data: Option<WireTokenData>,
}

#[derive(Debug, Deserialize)]
struct WireTokenData {
    category: String,
    #[serde(default)]
    amount: Option<WireAmount>,
    #[serde(default)]
    nft: Option<WireNft>,
}

#[derive(Debug, Deserialize)]
struct WireNft {
    capability: NftCapability,
    #[serde(default)]
    commitment: String,
}

/// Fulcrum reports token amounts as decimal strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAmount {
    Number(u64),
    Text(String),
}

impl WireAmount {
    fn value(&self) -> VaultResult<u64> {
        match self {
            WireAmount::Number(amount) => Ok(*amount),
            WireAmount::Text(text) => text
                .parse()
                .map_err(|_| VaultError::network(format!("invalid token amount {:?}", text))),
        }
    }
}

/// Convert a `listunspent` result into UTXOs
fn parse_unspent(result: Value) -> VaultResult<Vec<Utxo>> {
    let wire: Vec<WireUtxo> = serde_json::from_value(result)?;
    wire.into_iter()
        .map(|utxo| {
            let token = match utxo.token_data {
                Some(data) => Some(TokenData {
                    amount: match &data.amount {
                        Some(amount) => amount.value()?,
                        None => 0,
                    },
                    category: data.category,
                    nft: data.nft.map(|nft| NftData {
                        capability: nft.capability,
                        commitment: nft.commitment,
                    }),
                }),
                None => None,
            };
            Ok(Utxo {
                txid: utxo.tx_hash,
                vout: utxo.tx_pos,
                satoshis: utxo.value,
                token,
            })
        })
        .collect()
}
