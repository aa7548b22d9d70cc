//! # Elements JSON-RPC Adapter
//!
//! [`ElementsRpc`] implements [`NodeCapability`] over the node's HTTP
//! JSON-RPC interface with a blocking `reqwest` client.
//!
//! The node speaks BTC decimals. Amounts sent to it are exact 8-decimal
//! strings (the node accepts strings anywhere it accepts amounts); amounts
//! read back are rounded to the nearest satoshi.
//!
//! ## Method Index
//!
//! | Trait method                       | RPC                              |
//! |------------------------------------|----------------------------------|
//! | `get_new_address`                  | `getnewaddress`                  |
//! | `get_address_info`                 | `getaddressinfo`                 |
//! | `validate_address`                 | `validateaddress`                |
//! | `decode_raw_transaction`           | `decoderawtransaction`           |
//! | `create_raw_transaction`           | `createrawtransaction`           |
//! | `fund_raw_transaction`             | `fundrawtransaction`             |
//! | `list_unspent`                     | `listunspent`                    |
//! | `blind_raw_transaction`            | `rawblindrawtransaction`         |
//! | `sign_raw_transaction_with_wallet` | `signrawtransactionwithwallet`   |
//! | `dump_blinding_key`                | `dumpblindingkey`                |
//! | `import_blinding_key`              | `importblindingkey`              |
//! | `unblind_raw_transaction`          | `unblindrawtransaction`          |
//! | `test_mempool_accept`              | `testmempoolaccept`              |
//! | `send_raw_transaction`             | `sendrawtransaction`             |
//! | `blockchain_info`                  | `getblockchaininfo`              |
//! | `network_info`                     | `getnetworkinfo`                 |
//! | `wallet_info`                      | `getwalletinfo`                  |
//! | `balances`                         | `getbalance`                     |
//! | `asset_labels`                     | `dumpassetlabels`                |

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::conf::RpcEndpoint;
use super::{
    AddressInfo, AddressValidation, ChainInfo, DecodedTransaction, FundedTransaction,
    MempoolAcceptance, NetworkInfo, NodeCapability, NodeError, OutPoint, OutputKind, OutputSpec,
    SignedTransaction, TxOutput, UnspentDetail, WalletInfo,
};
use crate::address::{ConfidentialAddress, UnconfidentialAddress};
use crate::amount::{btc_to_sat, format_btc, FeeRate};
use crate::asset::AssetId;
use crate::config::{NODE_OUTPUT_LIST_VERSION, RPC_TIMEOUT_SECS};

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 1.0 request as `elementsd` expects it.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    /// Always "1.0".
    pub jsonrpc: &'static str,
    /// Request identifier, echoed back in the response.
    pub id: u64,
    pub method: &'a str,
    /// Positional parameters.
    pub params: Vec<Value>,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "1.0",
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC response.
///
/// Exactly one of `result` or `error` is meaningful. `elementsd` sends
/// `"error": null` on success and `"result": null` on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: Value,
}

impl RpcResponse {
    /// Splits the response into its result, mapping error objects to [`NodeError::Rpc`].
    pub fn into_result(self) -> Result<Value, NodeError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        // A null result is a valid answer (e.g. importblindingkey).
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// JSON-RPC error object.
///
/// Codes the swap flow commonly meets:
/// - `-4`: wallet error (insufficient funds during funding)
/// - `-5`: invalid address or key
/// - `-8`: invalid parameter
/// - `-13`: wallet locked
/// - `-25`/`-26`: transaction verification failed / rejected
/// - `-28`: node still warming up
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl From<RpcError> for NodeError {
    fn from(err: RpcError) -> Self {
        NodeError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw Node Shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawAddressInfo {
    address: String,
    #[serde(default)]
    confidential: Option<String>,
    #[serde(default)]
    unconfidential: Option<String>,
    #[serde(default)]
    ismine: bool,
}

#[derive(Debug, Deserialize)]
struct RawValidation {
    isvalid: bool,
    #[serde(default)]
    unconfidential: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDecoded {
    txid: String,
    locktime: u32,
    vsize: u64,
    vin: Vec<RawInput>,
    vout: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    /// Absent on coinbase inputs.
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    vout: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    asset: Option<String>,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: RawScript,
}

#[derive(Debug, Deserialize)]
struct RawScript {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawFunded {
    hex: String,
    fee: f64,
}

#[derive(Debug, Deserialize)]
struct RawUnspent {
    txid: String,
    vout: u32,
    amount: f64,
    asset: String,
    #[serde(default)]
    amountblinder: Option<String>,
    #[serde(default)]
    assetblinder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSigned {
    hex: String,
    complete: bool,
}

#[derive(Debug, Deserialize)]
struct RawHex {
    hex: String,
}

#[derive(Debug, Deserialize)]
struct RawMempoolAccept {
    txid: String,
    allowed: bool,
    #[serde(rename = "reject-reason", default)]
    reject_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChainInfo {
    chain: String,
}

#[derive(Debug, Deserialize)]
struct RawNetworkInfo {
    version: u64,
    relayfee: f64,
}

#[derive(Debug, Deserialize)]
struct RawWalletInfo {
    #[serde(default)]
    walletversion: u64,
    #[serde(default)]
    unlocked_until: Option<u64>,
}

fn sats(btc: f64, what: &str) -> Result<u64, NodeError> {
    btc_to_sat(btc).ok_or_else(|| NodeError::Decode(format!("invalid {what} amount: {btc}")))
}

fn asset_id(text: &str) -> Result<AssetId, NodeError> {
    text.parse()
        .map_err(|e: crate::asset::InvalidAssetId| NodeError::Decode(e.to_string()))
}

impl TryFrom<RawOutput> for TxOutput {
    type Error = NodeError;

    fn try_from(raw: RawOutput) -> Result<Self, Self::Error> {
        let address = raw
            .script_pub_key
            .addresses
            .and_then(|addresses| addresses.into_iter().next())
            .or(raw.script_pub_key.address);
        let kind = match address {
            Some(address) => OutputKind::Address(UnconfidentialAddress::new(address)),
            None if raw.script_pub_key.kind == "fee" => OutputKind::Fee,
            None => OutputKind::Other(raw.script_pub_key.kind),
        };
        Ok(TxOutput {
            n: raw.n,
            value: raw.value.map(|v| sats(v, "output")).transpose()?,
            asset: raw.asset.as_deref().map(asset_id).transpose()?,
            kind,
        })
    }
}

impl TryFrom<RawDecoded> for DecodedTransaction {
    type Error = NodeError;

    fn try_from(raw: RawDecoded) -> Result<Self, Self::Error> {
        let inputs = raw
            .vin
            .into_iter()
            .map(|input| match (input.txid, input.vout) {
                (Some(txid), Some(vout)) => Ok(OutPoint { txid, vout }),
                _ => Err(NodeError::Decode("input without outpoint".into())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = raw
            .vout
            .into_iter()
            .map(TxOutput::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DecodedTransaction {
            txid: raw.txid,
            locktime: raw.locktime,
            vsize: raw.vsize,
            inputs,
            outputs,
        })
    }
}

// ---------------------------------------------------------------------------
// ElementsRpc
// ---------------------------------------------------------------------------

/// A wallet session on an `elementsd` node.
pub struct ElementsRpc {
    client: Client,
    endpoint: RpcEndpoint,
    next_id: AtomicU64,
    /// Node version, fetched once per session.
    version: OnceLock<u64>,
}

impl ElementsRpc {
    /// Creates a session. No request is made until the first call.
    pub fn new(endpoint: RpcEndpoint) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
            version: OnceLock::new(),
        })
    }

    /// Issues one call and decodes its result.
    pub fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, NodeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        trace!(method, id, "rpc call");

        let mut builder = self.client.post(&self.endpoint.url).json(&request);
        if let Some((user, password)) = &self.endpoint.auth {
            builder = builder.basic_auth(user, Some(password));
        }
        let response = builder
            .send()
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NodeError::Unauthorized);
        }
        // RPC errors arrive as HTTP 500/404 with a JSON body, so read it first.
        let body = response
            .text()
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        let parsed: RpcResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(NodeError::Transport(format!("HTTP {status}")))
            }
            Err(e) => return Err(NodeError::Decode(format!("{method}: {e}"))),
        };

        let result = parsed.into_result()?;
        serde_json::from_value(result).map_err(|e| NodeError::Decode(format!("{method}: {e}")))
    }

    fn node_version(&self) -> Result<u64, NodeError> {
        if let Some(version) = self.version.get() {
            return Ok(*version);
        }
        let version = self.network_info()?.version;
        debug!(version, "node version");
        Ok(*self.version.get_or_init(|| version))
    }
}

/// Positional arguments of `createrawtransaction` for a given node version.
///
/// Before 0.21 outputs are an `{address: amount}` object followed by an
/// `{address: asset}` object. From 0.21 on they are a list of single-output
/// objects, each carrying its own asset.
pub fn create_raw_transaction_params(
    version: u64,
    inputs: &[OutPoint],
    outputs: &[OutputSpec],
    locktime: u32,
    replaceable: bool,
) -> Vec<Value> {
    let inputs: Vec<Value> = inputs
        .iter()
        .map(|input| json!({ "txid": input.txid, "vout": input.vout }))
        .collect();

    if version < NODE_OUTPUT_LIST_VERSION {
        let mut amounts = serde_json::Map::new();
        let mut assets = serde_json::Map::new();
        for output in outputs {
            match output {
                OutputSpec::Address { address, amount, asset } => {
                    amounts.insert(address.to_string(), json!(format_btc(*amount)));
                    assets.insert(address.to_string(), json!(asset.to_hex()));
                }
                OutputSpec::Fee { amount } => {
                    amounts.insert("fee".into(), json!(format_btc(*amount)));
                }
            }
        }
        vec![
            Value::Array(inputs),
            Value::Object(amounts),
            json!(locktime),
            json!(replaceable),
            Value::Object(assets),
        ]
    } else {
        let outputs: Vec<Value> = outputs
            .iter()
            .map(|output| match output {
                OutputSpec::Address { address, amount, asset } => {
                    let mut entry = serde_json::Map::new();
                    entry.insert(address.to_string(), json!(format_btc(*amount)));
                    entry.insert("asset".into(), json!(asset.to_hex()));
                    Value::Object(entry)
                }
                OutputSpec::Fee { amount } => json!({ "fee": format_btc(*amount) }),
            })
            .collect();
        vec![
            Value::Array(inputs),
            Value::Array(outputs),
            json!(locktime),
            json!(replaceable),
        ]
    }
}

impl NodeCapability for ElementsRpc {
    fn get_new_address(&self) -> Result<ConfidentialAddress, NodeError> {
        self.call::<String>("getnewaddress", vec![])
            .map(ConfidentialAddress::new)
    }

    fn get_address_info(&self, address: &str) -> Result<AddressInfo, NodeError> {
        let raw: RawAddressInfo = self.call("getaddressinfo", vec![json!(address)])?;
        Ok(AddressInfo {
            address: raw.address,
            confidential: raw.confidential.map(ConfidentialAddress::new),
            unconfidential: raw.unconfidential.map(UnconfidentialAddress::new),
            is_mine: raw.ismine,
        })
    }

    fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError> {
        let raw: RawValidation = self.call("validateaddress", vec![json!(address)])?;
        Ok(AddressValidation {
            is_valid: raw.isvalid,
            unconfidential: raw.unconfidential.map(UnconfidentialAddress::new),
        })
    }

    fn decode_raw_transaction(&self, tx_hex: &str) -> Result<DecodedTransaction, NodeError> {
        let raw: RawDecoded = self.call("decoderawtransaction", vec![json!(tx_hex)])?;
        raw.try_into()
    }

    fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[OutputSpec],
        locktime: u32,
        replaceable: bool,
    ) -> Result<String, NodeError> {
        let version = self.node_version()?;
        let params = create_raw_transaction_params(version, inputs, outputs, locktime, replaceable);
        self.call("createrawtransaction", params)
    }

    fn fund_raw_transaction(
        &self,
        tx_hex: &str,
        fee_rate: Option<FeeRate>,
    ) -> Result<FundedTransaction, NodeError> {
        let mut options = serde_json::Map::new();
        if let Some(rate) = fee_rate {
            options.insert("feeRate".into(), json!(rate.to_btc_string()));
        }
        let raw: RawFunded =
            self.call("fundrawtransaction", vec![json!(tx_hex), Value::Object(options)])?;
        Ok(FundedTransaction {
            hex: raw.hex,
            fee: sats(raw.fee, "fee")?,
        })
    }

    fn list_unspent(&self) -> Result<Vec<UnspentDetail>, NodeError> {
        let raw: Vec<RawUnspent> = self.call("listunspent", vec![])?;
        raw.into_iter()
            .map(|u| {
                Ok(UnspentDetail {
                    amount: sats(u.amount, "unspent")?,
                    asset: asset_id(&u.asset)?,
                    txid: u.txid,
                    vout: u.vout,
                    amount_blinder: u.amountblinder.unwrap_or_default(),
                    asset_blinder: u.assetblinder.unwrap_or_default(),
                })
            })
            .collect()
    }

    fn blind_raw_transaction(
        &self,
        tx_hex: &str,
        inputs: &[UnspentDetail],
    ) -> Result<String, NodeError> {
        let amount_blinders: Vec<&str> = inputs.iter().map(|i| i.amount_blinder.as_str()).collect();
        let amounts: Vec<String> = inputs.iter().map(|i| format_btc(i.amount)).collect();
        let assets: Vec<String> = inputs.iter().map(|i| i.asset.to_hex()).collect();
        let asset_blinders: Vec<&str> = inputs.iter().map(|i| i.asset_blinder.as_str()).collect();
        self.call(
            "rawblindrawtransaction",
            vec![
                json!(tx_hex),
                json!(amount_blinders),
                json!(amounts),
                json!(assets),
                json!(asset_blinders),
            ],
        )
    }

    fn sign_raw_transaction_with_wallet(
        &self,
        tx_hex: &str,
    ) -> Result<SignedTransaction, NodeError> {
        let raw: RawSigned = self.call("signrawtransactionwithwallet", vec![json!(tx_hex)])?;
        Ok(SignedTransaction {
            hex: raw.hex,
            complete: raw.complete,
        })
    }

    fn dump_blinding_key(&self, address: &ConfidentialAddress) -> Result<String, NodeError> {
        self.call("dumpblindingkey", vec![json!(address.as_str())])
    }

    fn import_blinding_key(
        &self,
        address: &ConfidentialAddress,
        blinding_key: &str,
    ) -> Result<(), NodeError> {
        self.call::<Value>(
            "importblindingkey",
            vec![json!(address.as_str()), json!(blinding_key)],
        )
        .map(|_| ())
    }

    fn unblind_raw_transaction(&self, tx_hex: &str) -> Result<String, NodeError> {
        let raw: RawHex = self.call("unblindrawtransaction", vec![json!(tx_hex)])?;
        Ok(raw.hex)
    }

    fn test_mempool_accept(&self, tx_hex: &str) -> Result<MempoolAcceptance, NodeError> {
        let raw: Vec<RawMempoolAccept> = self.call("testmempoolaccept", vec![json!([tx_hex])])?;
        let first = raw
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::Decode("testmempoolaccept: empty result".into()))?;
        Ok(MempoolAcceptance {
            txid: first.txid,
            allowed: first.allowed,
            reject_reason: first.reject_reason,
        })
    }

    fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, NodeError> {
        self.call("sendrawtransaction", vec![json!(tx_hex)])
    }

    fn blockchain_info(&self) -> Result<ChainInfo, NodeError> {
        let raw: RawChainInfo = self.call("getblockchaininfo", vec![])?;
        Ok(ChainInfo { chain: raw.chain })
    }

    fn network_info(&self) -> Result<NetworkInfo, NodeError> {
        let raw: RawNetworkInfo = self.call("getnetworkinfo", vec![])?;
        let relay_fee = FeeRate::from_btc_per_kvb(raw.relayfee)
            .ok_or_else(|| NodeError::Decode(format!("invalid relayfee: {}", raw.relayfee)))?;
        Ok(NetworkInfo {
            version: raw.version,
            relay_fee,
        })
    }

    fn wallet_info(&self) -> Result<WalletInfo, NodeError> {
        let raw: RawWalletInfo = self.call("getwalletinfo", vec![])?;
        Ok(WalletInfo {
            wallet_version: raw.walletversion,
            unlocked_until: raw.unlocked_until,
        })
    }

    fn balances(&self) -> Result<BTreeMap<String, u64>, NodeError> {
        let raw: BTreeMap<String, f64> = self.call("getbalance", vec![])?;
        raw.into_iter()
            .map(|(key, btc)| Ok((key, sats(btc, "balance")?)))
            .collect()
    }

    fn asset_labels(&self) -> Result<BTreeMap<String, AssetId>, NodeError> {
        let raw: BTreeMap<String, String> = self.call("dumpassetlabels", vec![])?;
        raw.into_iter()
            .map(|(label, asset)| Ok((label, asset_id(&asset)?)))
            .collect()
    }
}
