//! # Swap Protocol
//!
//! Two parties swap confidential assets by cooperatively building one
//! transaction. Neither talks to the other's node; they exchange payloads
//! out of band and each re-derives trust from chain-observable facts.
//!
//! ## Protocol Flow
//!
//! ```text
//!  Proposer                                          Receiver
//!     |                                                  |
//!     |  1. propose()                                    |
//!     |     fund offer to placeholder, add ask output    |
//!     |                                                  |
//!     |  ----------------- Proposal ------------------>   |
//!     |                                                  |
//!     |                                parse_proposed()  |  2. verify offer/ask/fee
//!     |                                        accept()  |     fund ask, merge, shuffle,
//!     |                                                  |     blind, partially sign
//!     |  <--------------- AcceptedSwap ---------------   |
//!     |                                                  |
//!  3. parse_accepted()  unblind, reconcile balances      |
//!     finalize()        sign remaining inputs,           |
//!                       broadcast or dry-run             |
//! ```
//!
//! Every verification failure is terminal for the payload that caused it.
//! Nothing is committed on chain before [`finalize`] broadcasts, so a failed
//! negotiation simply restarts from a fresh proposal.
//!
//! ## Concurrency
//!
//! Each phase is a strict sequence of blocking node calls. Callers must not
//! run two phases against the same wallet at once: coin selection and
//! address derivation are stateful on the node.

mod accept;
mod acceptance;
mod error;
mod finalize;
mod funding;
mod propose;
mod proposal;

pub use accept::accept;
pub use acceptance::{parse_accepted, reconcile, verify_against_proposal, ParsedAcceptance};
pub use error::SwapError;
pub use finalize::{finalize, Finalized};
pub use propose::propose;
pub use proposal::{parse_proposed, ParsedProposal};

use std::fmt;

use serde::Serialize;

use crate::asset::AssetId;

/// One party's side of a swap: an amount of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Leg {
    /// Satoshis.
    pub amount: u64,
    pub asset: AssetId,
}

impl Leg {
    pub fn new(amount: u64, asset: AssetId) -> Self {
        Self { amount, asset }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat of {}", self.amount, self.asset)
    }
}
