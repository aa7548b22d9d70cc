//! Error types for the swap protocol.
//!
//! Every swap operation that can fail returns a [`SwapError`]. Every variant
//! is terminal for the current payload: nothing is retried, and the
//! negotiation restarts from a fresh proposal.

use thiserror::Error;

use crate::amount::FeeRate;
use crate::config::{Network, OWN_PROPOSAL_ERROR_MSG};
use crate::node::NodeError;

/// Errors that can occur while proposing, accepting or finalizing a swap.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Both legs of the swap use the same asset.
    #[error("swaps between the same asset are not supported")]
    SameAsset,

    /// A required field, amount or fee could not be found.
    #[error("missing value: {0}")]
    MissingValue(String),

    /// Chain data contradicts what the payload states.
    #[error("unexpected value: {0}")]
    UnexpectedValue(String),

    /// A confidential address does not round-trip to the unconfidential
    /// address it was paired with.
    #[error("address mismatch: {confidential} does not belong to {unconfidential}")]
    AddressMismatch {
        /// Confidential form taken from the payload.
        confidential: String,
        /// Unconfidential form seen in the transaction.
        unconfidential: String,
    },

    /// The node rejected an address as invalid.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The payload was produced by this very wallet.
    #[error("{0}")]
    OwnProposal(String),

    /// The joint transaction pays less than the node's relay fee.
    #[error("fee rate too low: {found}, minimum {minimum}; propose a higher fee rate or reject the proposal")]
    FeeRateTooLow {
        /// Rate implied by total fee and transaction size.
        found: FeeRate,
        /// The node's minimum relay fee.
        minimum: FeeRate,
    },

    /// Some output stayed blinded after importing the supplied keys.
    #[error("cannot unblind transaction: {0}")]
    Unblind(String),

    /// Signing left some inputs unsigned.
    #[error("transaction has some unsigned inputs")]
    UnsignedTransaction,

    /// The mempool dry run rejected the transaction.
    #[error("invalid transaction, will not be allowed by mempool: {0}")]
    InvalidTransaction(String),

    #[error("unsupported node version {found}, must be at least {minimum}")]
    UnsupportedNodeVersion {
        /// Version reported by `getnetworkinfo`.
        found: u64,
        /// Oldest supported version.
        minimum: u64,
    },

    #[error("unsupported wallet version {found}, must be at least {minimum}")]
    UnsupportedWalletVersion {
        /// Version reported by `getwalletinfo`.
        found: u64,
        /// Oldest supported version.
        minimum: u64,
    },

    #[error("wallet locked, unlock it to proceed")]
    LockedWallet,

    #[error("network mismatch: expecting {expected}, node is on {found}")]
    NetworkMismatch {
        /// Network the caller asked for.
        expected: Network,
        /// Network the node reports.
        found: Network,
    },

    #[error("invalid asset id: {0}")]
    InvalidAssetId(String),

    #[error("invalid asset label: {0}")]
    InvalidAssetLabel(String),

    /// The payload text is not a JSON object wrapped in base64.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The node could not be asked, or refused the request.
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl SwapError {
    /// Returns `true` when the failure lies with the node rather than
    /// with the counterparty's data.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SwapError::Node(_))
    }

    /// The standard error for a payload created by the local wallet.
    pub fn own_proposal() -> Self {
        SwapError::OwnProposal(OWN_PROPOSAL_ERROR_MSG.to_string())
    }
}
