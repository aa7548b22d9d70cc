//! A configurable in-memory node for unit tests.
//!
//! Answers the metadata and address queries from its fields and counts
//! every call. Anything transactional fails with "method not found"
//! unless a canned decoded transaction is set.

use std::cell::Cell;
use std::collections::BTreeMap;

use super::*;

pub(crate) struct StubNode {
    pub chain: String,
    pub version: u64,
    pub wallet_version: u64,
    pub unlocked_until: Option<u64>,
    pub relay_fee: FeeRate,
    /// Valid addresses and whether the wallet owns them.
    pub addresses: BTreeMap<String, bool>,
    pub decoded: Option<DecodedTransaction>,
    pub balances: BTreeMap<String, u64>,
    pub labels: BTreeMap<String, AssetId>,
    pub calls: Cell<usize>,
}

impl Default for StubNode {
    fn default() -> Self {
        Self {
            chain: "elementsregtest".into(),
            version: 210_000,
            wallet_version: 169_900,
            unlocked_until: None,
            relay_fee: FeeRate::from_sat_per_kvb(1000),
            addresses: BTreeMap::new(),
            decoded: None,
            balances: BTreeMap::new(),
            labels: BTreeMap::new(),
            calls: Cell::new(0),
        }
    }
}

impl StubNode {
    fn tick(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    fn unsupported<T>(&self, method: &str) -> Result<T, NodeError> {
        self.tick();
        Err(NodeError::Rpc {
            code: -32601,
            message: format!("method not found: {method}"),
        })
    }
}

impl NodeCapability for StubNode {
    fn get_new_address(&self) -> Result<ConfidentialAddress, NodeError> {
        self.unsupported("getnewaddress")
    }

    fn get_address_info(&self, address: &str) -> Result<AddressInfo, NodeError> {
        self.tick();
        Ok(AddressInfo {
            address: address.to_string(),
            confidential: None,
            unconfidential: Some(UnconfidentialAddress::new(address)),
            is_mine: self.addresses.get(address).copied().unwrap_or(false),
        })
    }

    fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError> {
        self.tick();
        let is_valid = self.addresses.contains_key(address);
        Ok(AddressValidation {
            is_valid,
            unconfidential: is_valid.then(|| UnconfidentialAddress::new(address)),
        })
    }

    fn decode_raw_transaction(&self, _tx_hex: &str) -> Result<DecodedTransaction, NodeError> {
        match &self.decoded {
            Some(tx) => {
                self.tick();
                Ok(tx.clone())
            }
            None => self.unsupported("decoderawtransaction"),
        }
    }

    fn create_raw_transaction(
        &self,
        _inputs: &[OutPoint],
        _outputs: &[OutputSpec],
        _locktime: u32,
        _replaceable: bool,
    ) -> Result<String, NodeError> {
        self.unsupported("createrawtransaction")
    }

    fn fund_raw_transaction(
        &self,
        _tx_hex: &str,
        _fee_rate: Option<FeeRate>,
    ) -> Result<FundedTransaction, NodeError> {
        self.unsupported("fundrawtransaction")
    }

    fn list_unspent(&self) -> Result<Vec<UnspentDetail>, NodeError> {
        self.unsupported("listunspent")
    }

    fn blind_raw_transaction(
        &self,
        _tx_hex: &str,
        _inputs: &[UnspentDetail],
    ) -> Result<String, NodeError> {
        self.unsupported("rawblindrawtransaction")
    }

    fn sign_raw_transaction_with_wallet(
        &self,
        _tx_hex: &str,
    ) -> Result<SignedTransaction, NodeError> {
        self.unsupported("signrawtransactionwithwallet")
    }

    fn dump_blinding_key(&self, _address: &ConfidentialAddress) -> Result<String, NodeError> {
        self.unsupported("dumpblindingkey")
    }

    fn import_blinding_key(
        &self,
        _address: &ConfidentialAddress,
        _blinding_key: &str,
    ) -> Result<(), NodeError> {
        self.unsupported("importblindingkey")
    }

    fn unblind_raw_transaction(&self, _tx_hex: &str) -> Result<String, NodeError> {
        self.unsupported("unblindrawtransaction")
    }

    fn test_mempool_accept(&self, _tx_hex: &str) -> Result<MempoolAcceptance, NodeError> {
        self.unsupported("testmempoolaccept")
    }

    fn send_raw_transaction(&self, _tx_hex: &str) -> Result<String, NodeError> {
        self.unsupported("sendrawtransaction")
    }

    fn blockchain_info(&self) -> Result<ChainInfo, NodeError> {
        self.tick();
        Ok(ChainInfo { chain: self.chain.clone() })
    }

    fn network_info(&self) -> Result<NetworkInfo, NodeError> {
        self.tick();
        Ok(NetworkInfo {
            version: self.version,
            relay_fee: self.relay_fee,
        })
    }

    fn wallet_info(&self) -> Result<WalletInfo, NodeError> {
        self.tick();
        Ok(WalletInfo {
            wallet_version: self.wallet_version,
            unlocked_until: self.unlocked_until,
        })
    }

    fn balances(&self) -> Result<BTreeMap<String, u64>, NodeError> {
        self.tick();
        Ok(self.balances.clone())
    }

    fn asset_labels(&self) -> Result<BTreeMap<String, AssetId>, NodeError> {
        self.tick();
        Ok(self.labels.clone())
    }
}
