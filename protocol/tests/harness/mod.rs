//! An in-memory Elements network for driving whole swaps in tests.
//!
//! Every [`SimWallet`] is one wallet session on a shared [`Ledger`]. The
//! simulation keeps the properties the protocol depends on: coin selection
//! with change and a fee, blinding that hides values from everyone without
//! the key, signatures bound to the txid, and a mempool that rejects
//! unsigned, unbalanced or double-spending transactions.

#![allow(dead_code)]

pub mod ledger;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use liquidswap_protocol::address::{ConfidentialAddress, UnconfidentialAddress};
use liquidswap_protocol::amount::FeeRate;
use liquidswap_protocol::asset::AssetId;
use liquidswap_protocol::node::{
    AddressInfo, AddressValidation, ChainInfo, DecodedTransaction, FundedTransaction,
    MempoolAcceptance, NetworkInfo, NodeCapability, NodeError, OutPoint, OutputKind, OutputSpec,
    SignedTransaction, TxOutput, UnspentDetail, WalletInfo,
};

#[allow(unused_imports)]
pub use ledger::{tamper, SimOutput, SimTx};
use ledger::{blinder, signature, LedgerState, WalletState};

pub const ASSET_A: AssetId = AssetId::from_bytes([0xaa; 32]);
pub const ASSET_B: AssetId = AssetId::from_bytes([0xbb; 32]);
pub const POLICY_ASSET_HEX: &str =
    "5ac9f65c0efcc4775e0baec4ec03abdde22473cd3cf33c0419ca290e0751b225";

pub fn policy_asset() -> AssetId {
    POLICY_ASSET_HEX.parse().expect("valid policy asset")
}

fn rpc(code: i64, message: impl Into<String>) -> NodeError {
    NodeError::Rpc {
        code,
        message: message.into(),
    }
}

fn decode_failed() -> NodeError {
    rpc(-22, "TX decode failed")
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Handle on the shared chain state.
#[derive(Clone)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::new())),
        }
    }

    /// Opens a new, empty wallet.
    pub fn wallet(&self) -> SimWallet {
        let mut state = self.state.lock();
        state.wallets.push(WalletState::default());
        SimWallet {
            id: state.wallets.len() - 1,
            state: Arc::clone(&self.state),
        }
    }

    /// Gives `wallet` a fresh coin.
    pub fn fund(&self, wallet: &SimWallet, asset: AssetId, amount: u64) -> OutPoint {
        self.state.lock().mint(wallet.id, asset, amount)
    }

    pub fn balance(&self, wallet: &SimWallet, asset: AssetId) -> u64 {
        self.state.lock().balance(wallet.id, asset)
    }

    /// Marks a coin spent, as if a conflicting transaction confirmed.
    pub fn spend(&self, outpoint: &OutPoint) {
        if let Some(coin) = self.state.lock().coins.get_mut(outpoint) {
            coin.spent = true;
        }
    }

    /// Owner of an address in either form.
    pub fn owner_of(&self, address: &str) -> Option<usize> {
        let state = self.state.lock();
        state.resolve(address).and_then(|u| state.owner_of(&u))
    }

    pub fn coin_owner(&self, outpoint: &OutPoint) -> Option<usize> {
        self.state.lock().coins.get(outpoint).and_then(|c| c.owner)
    }
}

// ---------------------------------------------------------------------------
// SimWallet
// ---------------------------------------------------------------------------

/// One wallet session; implements [`NodeCapability`].
pub struct SimWallet {
    pub id: usize,
    state: Arc<Mutex<LedgerState>>,
}

impl SimWallet {
    fn settings(&self, edit: impl FnOnce(&mut WalletState)) {
        edit(&mut self.state.lock().wallets[self.id]);
    }

    pub fn set_relay_fee(&self, rate: FeeRate) {
        self.settings(|w| w.relay_fee = rate);
    }

    pub fn set_locked(&self, locked: bool) {
        self.settings(|w| w.locked = locked);
    }

    pub fn set_versions(&self, node: u64, wallet: u64) {
        self.settings(|w| {
            w.version = node;
            w.wallet_version = wallet;
        });
    }

    pub fn set_chain(&self, chain: &str) {
        self.settings(|w| w.chain = chain.to_string());
    }

    /// Number of node calls made so far.
    pub fn calls(&self) -> usize {
        self.state.lock().wallets[self.id].calls
    }

    /// Locks the ledger for one node call.
    fn call(&self) -> MutexGuard<'_, LedgerState> {
        let mut state = self.state.lock();
        state.wallets[self.id].calls += 1;
        state
    }
}

impl NodeCapability for SimWallet {
    fn get_new_address(&self) -> Result<ConfidentialAddress, NodeError> {
        let (_, confidential) = self.call().new_address(self.id);
        Ok(ConfidentialAddress::new(confidential))
    }

    fn get_address_info(&self, address: &str) -> Result<AddressInfo, NodeError> {
        let state = self.call();
        let unconfidential = state
            .resolve(address)
            .ok_or_else(|| rpc(-5, format!("Invalid address: {address}")))?;
        let entry = &state.addresses[&unconfidential];
        Ok(AddressInfo {
            address: address.to_string(),
            confidential: Some(ConfidentialAddress::new(entry.confidential.clone())),
            is_mine: entry.owner == Some(self.id),
            unconfidential: Some(UnconfidentialAddress::new(unconfidential)),
        })
    }

    fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError> {
        let unconfidential = self.call().resolve(address);
        Ok(AddressValidation {
            is_valid: unconfidential.is_some(),
            unconfidential: unconfidential.map(UnconfidentialAddress::new),
        })
    }

    fn decode_raw_transaction(&self, tx_hex: &str) -> Result<DecodedTransaction, NodeError> {
        let _state = self.call();
        let tx = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        Ok(DecodedTransaction {
            txid: tx.txid(),
            locktime: tx.locktime,
            vsize: tx.vsize(),
            inputs: tx.inputs.iter().map(|i| i.outpoint()).collect(),
            outputs: tx
                .outputs
                .iter()
                .enumerate()
                .map(|(n, o)| TxOutput {
                    n: n as u32,
                    value: (!o.blinded).then_some(o.amount),
                    asset: (!o.blinded).then_some(o.asset),
                    kind: match &o.address {
                        Some(address) => OutputKind::Address(UnconfidentialAddress::new(address.clone())),
                        None => OutputKind::Fee,
                    },
                })
                .collect(),
        })
    }

    fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[OutputSpec],
        locktime: u32,
        _replaceable: bool,
    ) -> Result<String, NodeError> {
        let state = self.call();
        let outputs = outputs
            .iter()
            .map(|output| match output {
                OutputSpec::Address {
                    address,
                    amount,
                    asset,
                } => {
                    let unconfidential = state
                        .resolve(address.as_str())
                        .ok_or_else(|| rpc(-5, format!("Invalid address: {address}")))?;
                    Ok(SimOutput {
                        address: Some(unconfidential),
                        asset: *asset,
                        amount: *amount,
                        blinded: false,
                    })
                }
                OutputSpec::Fee { amount } => Ok(SimOutput {
                    address: None,
                    asset: policy_asset(),
                    amount: *amount,
                    blinded: false,
                }),
            })
            .collect::<Result<Vec<_>, NodeError>>()?;
        let tx = SimTx {
            locktime,
            inputs: inputs
                .iter()
                .map(|o| ledger::SimInput {
                    txid: o.txid.clone(),
                    vout: o.vout,
                    signature: None,
                })
                .collect(),
            outputs,
        };
        Ok(tx.to_hex())
    }

    fn fund_raw_transaction(
        &self,
        tx_hex: &str,
        fee_rate: Option<FeeRate>,
    ) -> Result<FundedTransaction, NodeError> {
        let mut state = self.call();
        let relay_fee = state.wallets[self.id].relay_fee;
        let rate = fee_rate.unwrap_or(relay_fee);
        if rate < relay_fee {
            return Err(rpc(-4, "Fee rate is below the minimum relay fee"));
        }
        let base = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        let policy = policy_asset();

        let mut need: BTreeMap<AssetId, u64> = BTreeMap::new();
        for output in &base.outputs {
            *need.entry(output.asset).or_default() += output.amount;
        }
        let available = state.unspent(self.id);

        // Grow the fee until the selection it implies pays for itself.
        let mut fee = 0u64;
        let (selected, change) = loop {
            let mut targets = need.clone();
            *targets.entry(policy).or_default() += fee;

            let mut selected: Vec<OutPoint> = Vec::new();
            let mut change: BTreeMap<AssetId, u64> = BTreeMap::new();
            for (asset, target) in &targets {
                let mut total = 0u64;
                for (outpoint, coin) in available.iter().filter(|(_, c)| c.asset == *asset) {
                    if total >= *target {
                        break;
                    }
                    total += coin.amount;
                    selected.push(outpoint.clone());
                }
                if total < *target {
                    return Err(rpc(-4, "Insufficient funds"));
                }
                if total > *target {
                    change.insert(*asset, total - target);
                }
            }

            let mut candidate = base.clone();
            candidate.inputs.extend(selected.iter().map(|o| ledger::SimInput {
                txid: o.txid.clone(),
                vout: o.vout,
                signature: None,
            }));
            for (asset, amount) in &change {
                candidate.outputs.push(SimOutput {
                    address: Some(String::new()),
                    asset: *asset,
                    amount: *amount,
                    blinded: false,
                });
            }
            candidate.outputs.push(SimOutput {
                address: None,
                asset: policy,
                amount: fee,
                blinded: false,
            });
            let required = rate.fee_for(candidate.vsize());
            if required <= fee {
                break (selected, change);
            }
            fee = required;
        };

        let mut tx = base;
        tx.inputs.extend(selected.iter().map(|o| ledger::SimInput {
            txid: o.txid.clone(),
            vout: o.vout,
            signature: None,
        }));
        for (asset, amount) in change {
            let (address, _) = state.new_address(self.id);
            tx.outputs.push(SimOutput {
                address: Some(address),
                asset,
                amount,
                blinded: false,
            });
        }
        tx.outputs.push(SimOutput {
            address: None,
            asset: policy,
            amount: fee,
            blinded: false,
        });
        Ok(FundedTransaction {
            hex: tx.to_hex(),
            fee,
        })
    }

    fn list_unspent(&self) -> Result<Vec<UnspentDetail>, NodeError> {
        let state = self.call();
        Ok(state
            .unspent(self.id)
            .into_iter()
            .map(|(outpoint, coin)| UnspentDetail {
                amount_blinder: blinder("amount", &outpoint),
                asset_blinder: blinder("asset", &outpoint),
                txid: outpoint.txid,
                vout: outpoint.vout,
                amount: coin.amount,
                asset: coin.asset,
            })
            .collect())
    }

    fn blind_raw_transaction(
        &self,
        tx_hex: &str,
        inputs: &[UnspentDetail],
    ) -> Result<String, NodeError> {
        let state = self.call();
        let mut tx = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        if inputs.len() != tx.inputs.len() {
            return Err(rpc(-8, "Wrong number of input blinding data"));
        }
        let mut balance: BTreeMap<AssetId, i128> = BTreeMap::new();
        for (input, detail) in tx.inputs.iter().zip(inputs) {
            let outpoint = input.outpoint();
            let coin = state
                .coins
                .get(&outpoint)
                .ok_or_else(|| rpc(-8, format!("Unknown input {}:{}", outpoint.txid, outpoint.vout)))?;
            let matches = detail.spends(&outpoint)
                && detail.amount == coin.amount
                && detail.asset == coin.asset
                && detail.amount_blinder == blinder("amount", &outpoint)
                && detail.asset_blinder == blinder("asset", &outpoint);
            if !matches {
                return Err(rpc(-8, "Input blinding data does not match input"));
            }
            *balance.entry(coin.asset).or_default() += i128::from(coin.amount);
        }
        for output in &tx.outputs {
            *balance.entry(output.asset).or_default() -= i128::from(output.amount);
        }
        if balance.values().any(|v| *v != 0) {
            return Err(rpc(-8, "Unable to blind transaction: values do not balance"));
        }
        for output in tx.outputs.iter_mut().filter(|o| o.address.is_some()) {
            output.blinded = true;
        }
        Ok(tx.to_hex())
    }

    fn sign_raw_transaction_with_wallet(
        &self,
        tx_hex: &str,
    ) -> Result<SignedTransaction, NodeError> {
        let state = self.call();
        if state.wallets[self.id].locked {
            return Err(rpc(
                -13,
                "Error: Please enter the wallet passphrase with walletpassphrase first.",
            ));
        }
        let mut tx = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        let txid = tx.txid();
        let mut complete = true;
        for input in &mut tx.inputs {
            let coin = state.coins.get(&input.outpoint());
            if let Some(coin) = coin {
                if !coin.spent && coin.owner == Some(self.id) {
                    input.signature = Some(signature(&txid, self.id));
                }
            }
            let valid = coin
                .and_then(|c| c.owner)
                .is_some_and(|owner| input.signature == Some(signature(&txid, owner)));
            complete &= valid;
        }
        Ok(SignedTransaction {
            hex: tx.to_hex(),
            complete,
        })
    }

    fn dump_blinding_key(&self, address: &ConfidentialAddress) -> Result<String, NodeError> {
        let state = self.call();
        state
            .resolve(address.as_str())
            .and_then(|u| state.addresses.get(&u))
            .filter(|e| e.owner == Some(self.id))
            .map(|e| e.blinding_key.clone())
            .ok_or_else(|| rpc(-5, format!("Invalid address: {address}")))
    }

    fn import_blinding_key(
        &self,
        address: &ConfidentialAddress,
        blinding_key: &str,
    ) -> Result<(), NodeError> {
        let mut state = self.call();
        if state.resolve(address.as_str()).is_none() {
            return Err(rpc(-5, format!("Invalid address: {address}")));
        }
        state.wallets[self.id]
            .imported
            .insert(address.to_string(), blinding_key.to_string());
        Ok(())
    }

    fn unblind_raw_transaction(&self, tx_hex: &str) -> Result<String, NodeError> {
        let state = self.call();
        let mut tx = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        let imported = &state.wallets[self.id].imported;
        for output in &mut tx.outputs {
            let Some(entry) = output.address.as_ref().and_then(|a| state.addresses.get(a)) else {
                continue;
            };
            let has_key = entry.owner == Some(self.id)
                || imported.get(&entry.confidential) == Some(&entry.blinding_key);
            if has_key {
                output.blinded = false;
            }
        }
        Ok(tx.to_hex())
    }

    fn test_mempool_accept(&self, tx_hex: &str) -> Result<MempoolAcceptance, NodeError> {
        let state = self.call();
        let tx = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        let reject_reason = state.reject_reason(&tx);
        Ok(MempoolAcceptance {
            txid: tx.txid(),
            allowed: reject_reason.is_none(),
            reject_reason,
        })
    }

    fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, NodeError> {
        let mut state = self.call();
        let tx = SimTx::from_hex(tx_hex).ok_or_else(decode_failed)?;
        if let Some(reason) = state.reject_reason(&tx) {
            return Err(rpc(-26, reason));
        }
        Ok(state.apply(&tx))
    }

    fn blockchain_info(&self) -> Result<ChainInfo, NodeError> {
        let state = self.call();
        Ok(ChainInfo {
            chain: state.wallets[self.id].chain.clone(),
        })
    }

    fn network_info(&self) -> Result<NetworkInfo, NodeError> {
        let state = self.call();
        let wallet = &state.wallets[self.id];
        Ok(NetworkInfo {
            version: wallet.version,
            relay_fee: wallet.relay_fee,
        })
    }

    fn wallet_info(&self) -> Result<WalletInfo, NodeError> {
        let state = self.call();
        let wallet = &state.wallets[self.id];
        Ok(WalletInfo {
            wallet_version: wallet.wallet_version,
            unlocked_until: wallet.locked.then_some(0),
        })
    }

    fn balances(&self) -> Result<BTreeMap<String, u64>, NodeError> {
        let state = self.call();
        let policy = policy_asset();
        let mut balances = BTreeMap::new();
        for (_, coin) in state.unspent(self.id) {
            let key = if coin.asset == policy {
                "bitcoin".to_string()
            } else {
                coin.asset.to_hex()
            };
            *balances.entry(key).or_default() += coin.amount;
        }
        Ok(balances)
    }

    fn asset_labels(&self) -> Result<BTreeMap<String, AssetId>, NodeError> {
        let _state = self.call();
        Ok(BTreeMap::from([("bitcoin".to_string(), policy_asset())]))
    }
}
