//! # Addresses
//!
//! Every swap output has two faces. The *unconfidential* address is what a
//! decoded transaction shows and what ownership checks run against; the
//! *confidential* address is the same destination plus a blinding pubkey,
//! and is what funds are actually sent to.
//!
//! The protocol never derives one form from the other itself. Both come
//! from the node, and the [`ConfidentialMap`] carries the pairing from the
//! proposer to the receiver.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an address string as reported by the node.
            pub fn new(address: impl Into<String>) -> Self {
                Self(address.into())
            }

            /// The address text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(address: &str) -> Self {
                Self(address.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

address_type! {
    /// An address whose outputs hide amount and asset.
    ConfidentialAddress
}

address_type! {
    /// The chain-visible form of an address.
    UnconfidentialAddress
}

/// Pairs each owned unconfidential output address with its confidential form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidentialMap(BTreeMap<UnconfidentialAddress, ConfidentialAddress>);

impl ConfidentialMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pairing, returning the previous confidential form if any.
    pub fn insert(
        &mut self,
        unconfidential: UnconfidentialAddress,
        confidential: ConfidentialAddress,
    ) -> Option<ConfidentialAddress> {
        self.0.insert(unconfidential, confidential)
    }

    /// The confidential form of `unconfidential`, if recorded.
    pub fn get(&self, unconfidential: &UnconfidentialAddress) -> Option<&ConfidentialAddress> {
        self.0.get(unconfidential)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, UnconfidentialAddress, ConfidentialAddress> {
        self.0.iter()
    }
}

impl FromIterator<(UnconfidentialAddress, ConfidentialAddress)> for ConfidentialMap {
    fn from_iter<I: IntoIterator<Item = (UnconfidentialAddress, ConfidentialAddress)>>(
        iter: I,
    ) -> Self {
        Self(iter.into_iter().collect())
    }
}
