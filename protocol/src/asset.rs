//! # Assets
//!
//! [`AssetId`] is the 32-byte identifier of a Liquid asset, always written
//! as 64 lowercase hex characters. Two ids are the same asset iff their
//! bytes are equal; there is no normalisation beyond that.
//!
//! [`AssetBook`] is display bookkeeping for front ends: which labels the
//! wallet knows, what it holds, and temporary labels for assets the user
//! expects to receive but does not hold yet.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::node::{NodeCapability, NodeError};
use crate::swap::SwapError;

/// Label the node uses for the policy asset.
const NODE_POLICY_LABEL: &str = "bitcoin";

/// Label shown to users for the policy asset.
pub const POLICY_ASSET_LABEL: &str = "L-BTC";

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Rejected asset id text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid asset id: {0:?}")]
pub struct InvalidAssetId(pub String);

/// A Liquid asset identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId([u8; 32]);

impl AssetId {
    /// Wraps raw id bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw id bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical 64-character lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns `true` for exactly 64 lowercase hex characters.
    pub fn is_valid(text: &str) -> bool {
        text.len() == 64 && text.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl FromStr for AssetId {
    type Err = InvalidAssetId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_valid(s) {
            return Err(InvalidAssetId(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidAssetId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.to_hex())
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl From<InvalidAssetId> for SwapError {
    fn from(err: InvalidAssetId) -> Self {
        SwapError::InvalidAssetId(err.0)
    }
}

// ---------------------------------------------------------------------------
// AssetBook
// ---------------------------------------------------------------------------

/// Asset labels and balances of one wallet, for display.
///
/// Every asset with a balance has a label (its own id when the node has
/// none) and every labelled asset has a balance (zero when not held).
#[derive(Debug, Clone, Default)]
pub struct AssetBook {
    labels: BTreeMap<AssetId, String>,
    balances: BTreeMap<AssetId, u64>,
    temp_labels: BTreeMap<AssetId, String>,
}

impl AssetBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refreshes labels and balances from the node.
    pub fn update(&mut self, node: &dyn NodeCapability) -> Result<(), NodeError> {
        let balances = node.balances()?;
        let labels = node.asset_labels()?;
        self.apply(&labels, &balances);
        Ok(())
    }

    /// Merges a label listing and a balance listing as reported by the node.
    ///
    /// Balance keys may be labels or raw asset ids.
    pub fn apply(&mut self, labels: &BTreeMap<String, AssetId>, balances: &BTreeMap<String, u64>) {
        for (label, asset) in labels {
            let label = if label == NODE_POLICY_LABEL {
                POLICY_ASSET_LABEL.to_string()
            } else {
                label.clone()
            };
            self.labels.insert(*asset, label);
            self.balances.entry(*asset).or_insert(0);
        }

        for (key, amount) in balances {
            let asset = match labels.get(key) {
                Some(asset) => *asset,
                None => match key.parse::<AssetId>() {
                    Ok(asset) => asset,
                    Err(_) => {
                        debug!(key = %key, "skipping balance with unknown label");
                        continue;
                    }
                },
            };
            self.balances.insert(asset, *amount);
            self.labels.entry(asset).or_insert_with(|| asset.to_hex());
        }
    }

    /// Adds a receive-only label for an asset the wallet does not hold.
    ///
    /// An empty label falls back to the id. With `allow_update == false`
    /// an existing temporary label is not replaced.
    pub fn add_temp_label(
        &mut self,
        asset: &str,
        label: &str,
        allow_update: bool,
    ) -> Result<(), SwapError> {
        let asset: AssetId = asset.parse()?;
        if self.labels.contains_key(&asset) {
            return Err(SwapError::InvalidAssetId(format!(
                "asset {asset} is already in the wallet, edit its label in elements.conf"
            )));
        }
        if !allow_update {
            if let Some(existing) = self.temp_labels.get(&asset) {
                return Err(SwapError::InvalidAssetLabel(format!(
                    "asset label already set: {existing}"
                )));
            }
        }
        let label = if label.is_empty() { asset.to_hex() } else { label.to_string() };
        self.temp_labels.insert(asset, label);
        Ok(())
    }

    /// The display label of an asset, falling back to its id.
    pub fn label(&self, asset: &AssetId) -> String {
        self.temp_labels
            .get(asset)
            .or_else(|| self.labels.get(asset))
            .cloned()
            .unwrap_or_else(|| asset.to_hex())
    }

    /// The wallet balance of an asset in satoshis.
    pub fn balance(&self, asset: &AssetId) -> u64 {
        self.balances.get(asset).copied().unwrap_or(0)
    }

    /// All held or labelled assets with their label and balance.
    pub fn entries(&self) -> impl Iterator<Item = (AssetId, &str, u64)> + '_ {
        self.balances.iter().map(|(asset, amount)| {
            let label = self.labels.get(asset).map(String::as_str).unwrap_or("");
            (*asset, label, *amount)
        })
    }
}
