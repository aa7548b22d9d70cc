//! Shared chain state behind every simulated wallet.
//!
//! Transactions travel as hex-encoded JSON of [`SimTx`]. A txid is the
//! SHA-256 of the transaction with its signatures cleared, so signing never
//! changes the txid but any other edit does.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use liquidswap_protocol::amount::FeeRate;
use liquidswap_protocol::asset::AssetId;
use liquidswap_protocol::config::{
    PLACEHOLDER_ADDRESS_REGTEST, PLACEHOLDER_CONFIDENTIAL_ADDRESS_REGTEST,
};
use liquidswap_protocol::node::OutPoint;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInput {
    pub txid: String,
    pub vout: u32,
    pub signature: Option<String>,
}

impl SimInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimOutput {
    /// Unconfidential address; `None` for the fee output.
    pub address: Option<String>,
    pub asset: AssetId,
    pub amount: u64,
    pub blinded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTx {
    pub locktime: u32,
    pub inputs: Vec<SimInput>,
    pub outputs: Vec<SimOutput>,
}

impl SimTx {
    pub fn from_hex(tx_hex: &str) -> Option<Self> {
        let bytes = hex::decode(tx_hex).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(serde_json::to_vec(self).expect("sim tx serializes"))
    }

    pub fn txid(&self) -> String {
        let mut unsigned = self.clone();
        for input in &mut unsigned.inputs {
            input.signature = None;
        }
        let bytes = serde_json::to_vec(&unsigned).expect("sim tx serializes");
        hex::encode(Sha256::digest(bytes))
    }

    /// Virtual size: confidential outputs dominate, as on Liquid.
    pub fn vsize(&self) -> u64 {
        let outputs: u64 = self
            .outputs
            .iter()
            .map(|o| if o.address.is_some() { 1200 } else { 10 })
            .sum();
        11 + 60 * self.inputs.len() as u64 + outputs
    }

    pub fn fee(&self) -> Option<&SimOutput> {
        self.outputs.iter().find(|o| o.address.is_none())
    }
}

/// Decodes `tx_hex`, applies `edit` and re-encodes it.
pub fn tamper(tx_hex: &str, edit: impl FnOnce(&mut SimTx)) -> String {
    let mut tx = SimTx::from_hex(tx_hex).expect("tamper needs a sim tx");
    edit(&mut tx);
    tx.to_hex()
}

pub fn signature(txid: &str, wallet: usize) -> String {
    hex::encode(Sha256::digest(format!("sig:{txid}:{wallet}")))
}

pub fn blinder(kind: &str, outpoint: &OutPoint) -> String {
    hex::encode(Sha256::digest(format!("{kind}:{}:{}", outpoint.txid, outpoint.vout)))
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Coin {
    pub address: String,
    pub owner: Option<usize>,
    pub asset: AssetId,
    pub amount: u64,
    pub spent: bool,
}

#[derive(Debug, Clone)]
pub struct AddressEntry {
    pub confidential: String,
    pub owner: Option<usize>,
    pub blinding_key: String,
}

#[derive(Debug, Clone)]
pub struct WalletState {
    pub chain: String,
    pub version: u64,
    pub wallet_version: u64,
    pub relay_fee: FeeRate,
    pub locked: bool,
    pub next_address: u32,
    /// Imported blinding keys by confidential address.
    pub imported: BTreeMap<String, String>,
    pub calls: usize,
}

impl Default for WalletState {
    fn default() -> Self {
        Self {
            chain: "elementsregtest".into(),
            version: 210_000,
            wallet_version: 169_900,
            relay_fee: FeeRate::from_sat_per_kvb(1000),
            locked: false,
            next_address: 0,
            imported: BTreeMap::new(),
            calls: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct LedgerState {
    pub coins: BTreeMap<OutPoint, Coin>,
    /// Keyed by unconfidential address.
    pub addresses: BTreeMap<String, AddressEntry>,
    /// Confidential to unconfidential.
    pub confidential: BTreeMap<String, String>,
    pub wallets: Vec<WalletState>,
    pub mints: u64,
}

impl LedgerState {
    pub fn new() -> Self {
        let mut state = Self::default();
        state.register(
            PLACEHOLDER_ADDRESS_REGTEST,
            PLACEHOLDER_CONFIDENTIAL_ADDRESS_REGTEST,
            None,
        );
        state
    }

    pub fn register(&mut self, unconfidential: &str, confidential: &str, owner: Option<usize>) {
        let blinding_key = hex::encode(Sha256::digest(format!("bk:{confidential}")));
        self.addresses.insert(
            unconfidential.to_string(),
            AddressEntry {
                confidential: confidential.to_string(),
                owner,
                blinding_key,
            },
        );
        self.confidential
            .insert(confidential.to_string(), unconfidential.to_string());
    }

    /// Resolves either form of an address to its unconfidential form.
    pub fn resolve(&self, address: &str) -> Option<String> {
        if self.addresses.contains_key(address) {
            return Some(address.to_string());
        }
        self.confidential.get(address).cloned()
    }

    pub fn new_address(&mut self, wallet: usize) -> (String, String) {
        let index = self.wallets[wallet].next_address;
        self.wallets[wallet].next_address += 1;
        let unconfidential = format!("XW{wallet}U{index:04}");
        let confidential = format!("AzW{wallet}C{index:04}");
        self.register(&unconfidential, &confidential, Some(wallet));
        (unconfidential, confidential)
    }

    pub fn owner_of(&self, address: &str) -> Option<usize> {
        self.addresses.get(address).and_then(|e| e.owner)
    }

    /// Unspent coins of `wallet`, in outpoint order.
    pub fn unspent(&self, wallet: usize) -> Vec<(OutPoint, Coin)> {
        self.coins
            .iter()
            .filter(|(_, c)| !c.spent && c.owner == Some(wallet))
            .map(|(o, c)| (o.clone(), c.clone()))
            .collect()
    }

    /// Why `tx` would not enter the mempool, if anything.
    pub fn reject_reason(&self, tx: &SimTx) -> Option<String> {
        let txid = tx.txid();
        let mut balance: BTreeMap<AssetId, i128> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for input in &tx.inputs {
            let outpoint = input.outpoint();
            if !seen.insert(outpoint.clone()) {
                return Some("bad-txns-inputs-duplicate".into());
            }
            let coin = match self.coins.get(&outpoint) {
                Some(coin) if !coin.spent => coin,
                _ => return Some("missing-inputs".into()),
            };
            let valid = coin
                .owner
                .is_some_and(|owner| input.signature == Some(signature(&txid, owner)));
            if !valid {
                return Some("mandatory-script-verify-flag-failed".into());
            }
            *balance.entry(coin.asset).or_default() += i128::from(coin.amount);
        }
        for output in &tx.outputs {
            *balance.entry(output.asset).or_default() -= i128::from(output.amount);
        }
        if balance.values().any(|v| *v != 0) {
            return Some("bad-txns-in-ne-out".into());
        }
        None
    }

    /// Spends the inputs of `tx` and creates its outputs.
    pub fn apply(&mut self, tx: &SimTx) -> String {
        let txid = tx.txid();
        for input in &tx.inputs {
            if let Some(coin) = self.coins.get_mut(&input.outpoint()) {
                coin.spent = true;
            }
        }
        for (vout, output) in tx.outputs.iter().enumerate() {
            let Some(address) = &output.address else { continue };
            self.coins.insert(
                OutPoint::new(txid.clone(), vout as u32),
                Coin {
                    address: address.clone(),
                    owner: self.owner_of(address),
                    asset: output.asset,
                    amount: output.amount,
                    spent: false,
                },
            );
        }
        txid
    }

    /// Creates a coin out of thin air for `wallet`.
    pub fn mint(&mut self, wallet: usize, asset: AssetId, amount: u64) -> OutPoint {
        let (address, _) = self.new_address(wallet);
        self.mints += 1;
        let txid = hex::encode(Sha256::digest(format!("mint:{}", self.mints)));
        let outpoint = OutPoint::new(txid, 0);
        self.coins.insert(
            outpoint.clone(),
            Coin {
                address,
                owner: Some(wallet),
                asset,
                amount,
                spent: false,
            },
        );
        outpoint
    }

    pub fn balance(&self, wallet: usize, asset: AssetId) -> u64 {
        self.unspent(wallet)
            .iter()
            .filter(|(_, c)| c.asset == asset)
            .map(|(_, c)| c.amount)
            .sum()
    }
}
