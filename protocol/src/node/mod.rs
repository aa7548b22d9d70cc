//! # Node Capability
//!
//! The swap protocol has exactly one side-effecting dependency: a wallet
//! session on an Elements node. [`NodeCapability`] enumerates every call
//! the protocol makes, with typed arguments and results, so the core never
//! sees JSON and an unknown call is a compile error.
//!
//! All amounts crossing this boundary are satoshis. Converting to and from
//! the node's BTC decimals is the implementation's job (see [`rpc`]).
//!
//! ## Concurrency
//!
//! Implementations are blocking. Address derivation and coin selection are
//! stateful on the node, so one wallet session must serve one negotiation
//! at a time; callers serialize access per wallet.

pub mod conf;
mod error;
pub mod rpc;
#[cfg(test)]
pub(crate) mod stub;

pub use error::NodeError;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{ConfidentialAddress, UnconfidentialAddress};
use crate::amount::FeeRate;
use crate::asset::AssetId;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A reference to a previous transaction output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self { txid: txid.into(), vout }
    }
}

/// What an output pays to, as far as a decoded transaction reveals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    /// A standard script with an address (shown in unconfidential form).
    Address(UnconfidentialAddress),
    /// The explicit fee output every Elements transaction carries.
    Fee,
    /// Anything else, with the script type reported by the node.
    Other(String),
}

/// One decoded output.
///
/// `value` and `asset` are `None` while the output is still blinded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub n: u32,
    pub value: Option<u64>,
    pub asset: Option<AssetId>,
    pub kind: OutputKind,
}

impl TxOutput {
    /// The unconfidential address this output pays, if any.
    pub fn address(&self) -> Option<&UnconfidentialAddress> {
        match &self.kind {
            OutputKind::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn is_fee(&self) -> bool {
        self.kind == OutputKind::Fee
    }
}

/// The parts of `decoderawtransaction` the protocol reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub txid: String,
    pub locktime: u32,
    pub vsize: u64,
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOutput>,
}

impl DecodedTransaction {
    /// All fee outputs, in transaction order.
    pub fn fee_outputs(&self) -> impl Iterator<Item = &TxOutput> {
        self.outputs.iter().filter(|o| o.is_fee())
    }
}

/// One output of a transaction to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSpec {
    /// Pay `amount` of `asset` to a (confidential) address.
    Address {
        address: ConfidentialAddress,
        amount: u64,
        asset: AssetId,
    },
    /// The explicit fee, paid in the policy asset.
    Fee { amount: u64 },
}

/// Result of `fundrawtransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundedTransaction {
    pub hex: String,
    /// Fee added by coin selection, in satoshis.
    pub fee: u64,
}

/// Result of `signrawtransactionwithwallet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hex: String,
    /// `true` once every input carries a valid signature.
    pub complete: bool,
}

/// Result of a `testmempoolaccept` dry run for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolAcceptance {
    pub txid: String,
    pub allowed: bool,
    pub reject_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A wallet-owned unspent output together with its blinding factors.
///
/// Field names on the wire follow `listunspent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnspentDetail {
    pub txid: String,
    pub vout: u32,
    /// Amount in satoshis.
    pub amount: u64,
    pub asset: AssetId,
    #[serde(rename = "amountblinder")]
    pub amount_blinder: String,
    #[serde(rename = "assetblinder")]
    pub asset_blinder: String,
}

impl UnspentDetail {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }

    /// Returns `true` if this detail describes `outpoint`.
    pub fn spends(&self, outpoint: &OutPoint) -> bool {
        self.txid == outpoint.txid && self.vout == outpoint.vout
    }
}

/// Result of `getaddressinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub address: String,
    pub confidential: Option<ConfidentialAddress>,
    pub unconfidential: Option<UnconfidentialAddress>,
    pub is_mine: bool,
}

/// Result of `validateaddress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressValidation {
    pub is_valid: bool,
    pub unconfidential: Option<UnconfidentialAddress>,
}

/// Result of `getblockchaininfo`, reduced to what the protocol reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain: String,
}

/// Result of `getnetworkinfo`, reduced to what the protocol reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub version: u64,
    pub relay_fee: FeeRate,
}

/// Result of `getwalletinfo`, reduced to what the protocol reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub wallet_version: u64,
    /// `Some(0)` means encrypted and locked; `None` means not encrypted.
    pub unlocked_until: Option<u64>,
}

// ---------------------------------------------------------------------------
// NodeCapability
// ---------------------------------------------------------------------------

/// An authenticated wallet session on an Elements node.
///
/// Blinding, signing, address validation and coin selection are all done
/// by the node. The protocol only checks the results.
pub trait NodeCapability {
    /// Derives a fresh confidential receiving address.
    fn get_new_address(&self) -> Result<ConfidentialAddress, NodeError>;

    /// Looks up either form of an address.
    fn get_address_info(&self, address: &str) -> Result<AddressInfo, NodeError>;

    /// Checks an address for validity without touching the wallet.
    fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError>;

    fn decode_raw_transaction(&self, tx_hex: &str) -> Result<DecodedTransaction, NodeError>;

    /// Creates an unsigned, unblinded transaction.
    fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[OutputSpec],
        locktime: u32,
        replaceable: bool,
    ) -> Result<String, NodeError>;

    /// Adds wallet inputs, change and fee. `None` lets the wallet choose the rate.
    fn fund_raw_transaction(
        &self,
        tx_hex: &str,
        fee_rate: Option<FeeRate>,
    ) -> Result<FundedTransaction, NodeError>;

    /// Wallet-owned unspent outputs with blinders.
    fn list_unspent(&self) -> Result<Vec<UnspentDetail>, NodeError>;

    /// Blinds a transaction given the blinding data of every input, in input order.
    fn blind_raw_transaction(
        &self,
        tx_hex: &str,
        inputs: &[UnspentDetail],
    ) -> Result<String, NodeError>;

    /// Signs whatever inputs the wallet can sign.
    fn sign_raw_transaction_with_wallet(&self, tx_hex: &str)
        -> Result<SignedTransaction, NodeError>;

    /// Exports the private blinding key of an owned address (hex).
    fn dump_blinding_key(&self, address: &ConfidentialAddress) -> Result<String, NodeError>;

    fn import_blinding_key(
        &self,
        address: &ConfidentialAddress,
        blinding_key: &str,
    ) -> Result<(), NodeError>;

    /// Unblinds every output the wallet has a blinding key for.
    fn unblind_raw_transaction(&self, tx_hex: &str) -> Result<String, NodeError>;

    fn test_mempool_accept(&self, tx_hex: &str) -> Result<MempoolAcceptance, NodeError>;

    /// Broadcasts a transaction, returning its txid.
    fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, NodeError>;

    fn blockchain_info(&self) -> Result<ChainInfo, NodeError>;

    fn network_info(&self) -> Result<NetworkInfo, NodeError>;

    fn wallet_info(&self) -> Result<WalletInfo, NodeError>;

    /// Wallet balances in satoshis, keyed by asset label or asset id.
    fn balances(&self) -> Result<BTreeMap<String, u64>, NodeError>;

    /// Asset labels known to the node.
    fn asset_labels(&self) -> Result<BTreeMap<String, AssetId>, NodeError>;
}
