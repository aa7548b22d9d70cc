//! # Initial Checks
//!
//! Preconditions a front end verifies before handing a node session to the
//! swap core: a recent enough node and wallet, the expected network, an
//! unlocked wallet, and a counterparty payload that is not our own.

use tracing::{debug, warn};

use crate::config::{Network, NODE_MIN_VERSION, WALLET_MIN_VERSION};
use crate::node::NodeCapability;
use crate::swap::SwapError;

/// Fails unless the node is at least [`NODE_MIN_VERSION`].
pub fn check_node_version(node: &dyn NodeCapability) -> Result<(), SwapError> {
    let found = node.network_info()?.version;
    if found < NODE_MIN_VERSION {
        warn!(found, minimum = NODE_MIN_VERSION, "node too old");
        return Err(SwapError::UnsupportedNodeVersion {
            found,
            minimum: NODE_MIN_VERSION,
        });
    }
    Ok(())
}

/// Fails unless the wallet format is at least [`WALLET_MIN_VERSION`].
pub fn check_wallet_version(node: &dyn NodeCapability) -> Result<(), SwapError> {
    let found = node.wallet_info()?.wallet_version;
    if found < WALLET_MIN_VERSION {
        warn!(found, minimum = WALLET_MIN_VERSION, "wallet too old");
        return Err(SwapError::UnsupportedWalletVersion {
            found,
            minimum: WALLET_MIN_VERSION,
        });
    }
    Ok(())
}

/// The network the node is running on.
pub fn node_network(node: &dyn NodeCapability) -> Result<Network, SwapError> {
    Ok(Network::from_chain(&node.blockchain_info()?.chain))
}

/// Fails if the node runs on a different network than `expected`.
pub fn check_network(node: &dyn NodeCapability, expected: Network) -> Result<(), SwapError> {
    let found = node_network(node)?;
    if found != expected {
        return Err(SwapError::NetworkMismatch { expected, found });
    }
    Ok(())
}

/// Node version, wallet version and network, in that order.
pub fn do_initial_checks(node: &dyn NodeCapability, expected: Network) -> Result<(), SwapError> {
    check_node_version(node)?;
    check_wallet_version(node)?;
    check_network(node, expected)?;
    debug!(network = %expected, "initial checks passed");
    Ok(())
}

/// Fails if the wallet is encrypted and currently locked.
pub fn check_wallet_unlocked(node: &dyn NodeCapability) -> Result<(), SwapError> {
    if node.wallet_info()?.unlocked_until == Some(0) {
        return Err(SwapError::LockedWallet);
    }
    Ok(())
}

/// Whether the wallet owns `address`. Invalid addresses are an error.
pub fn is_mine(node: &dyn NodeCapability, address: &str) -> Result<bool, SwapError> {
    if !node.validate_address(address)?.is_valid {
        return Err(SwapError::InvalidAddress(address.to_string()));
    }
    Ok(node.get_address_info(address)?.is_mine)
}

/// Fails with [`SwapError::OwnProposal`] if the wallet owns `address`.
pub fn check_not_mine(node: &dyn NodeCapability, address: &str) -> Result<(), SwapError> {
    if is_mine(node, address)? {
        return Err(SwapError::own_proposal());
    }
    Ok(())
}

/// The receiver's share of the fee of an accepted transaction.
///
/// The transaction must carry exactly one fee output, and it must exceed
/// the proposer's share.
pub fn receiver_fee(
    node: &dyn NodeCapability,
    tx_hex: &str,
    proposer_fee: u64,
) -> Result<u64, SwapError> {
    let tx = node.decode_raw_transaction(tx_hex)?;
    let fees: Vec<_> = tx.fee_outputs().collect();
    let [fee] = fees.as_slice() else {
        return Err(SwapError::UnexpectedValue(format!(
            "expected one fee output, found {}",
            fees.len()
        )));
    };
    let total = fee
        .value
        .ok_or_else(|| SwapError::MissingValue("fee output has no value".into()))?;
    match total.checked_sub(proposer_fee) {
        Some(receiver) if receiver > 0 => Ok(receiver),
        _ => Err(SwapError::UnexpectedValue(format!(
            "proposer fee {proposer_fee} not below transaction fee {total}"
        ))),
    }
}
