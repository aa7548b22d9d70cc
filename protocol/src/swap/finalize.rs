//! Phase 3b: the proposer completes the signatures and releases the swap.

use serde::Serialize;
use tracing::{info, info_span, warn};

use super::{ParsedAcceptance, SwapError};
use crate::node::NodeCapability;

/// Outcome of [`finalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Finalized {
    /// The transaction was broadcast.
    Broadcast { txid: String },
    /// The transaction passed the mempool dry run and was not broadcast.
    Signed { tx: String },
}

/// Signs the proposer's inputs and either broadcasts the transaction or
/// dry-runs it against the mempool.
pub fn finalize(
    node: &dyn NodeCapability,
    acceptance: &ParsedAcceptance,
    broadcast: bool,
) -> Result<Finalized, SwapError> {
    let span = info_span!("swap", phase = "finalize");
    let _enter = span.enter();
    info!(broadcast, "finalizing swap");

    let signed = node.sign_raw_transaction_with_wallet(&acceptance.tx)?;
    if !signed.complete {
        warn!("signing left inputs unsigned");
        return Err(SwapError::UnsignedTransaction);
    }

    if broadcast {
        let txid = node.send_raw_transaction(&signed.hex)?;
        info!(%txid, "swap broadcast");
        return Ok(Finalized::Broadcast { txid });
    }

    let acceptance_check = node.test_mempool_accept(&signed.hex)?;
    if !acceptance_check.allowed {
        let reason = acceptance_check.reject_reason.unwrap_or_default();
        warn!(txid = %acceptance_check.txid, %reason, "mempool rejected swap");
        return Err(SwapError::InvalidTransaction(reason));
    }
    info!(txid = %acceptance_check.txid, "swap signed, not broadcast");
    Ok(Finalized::Signed { tx: signed.hex })
}
