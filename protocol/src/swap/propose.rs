//! Phase 1: the proposer builds a part-funded transaction.
//!
//! The offer is funded as a payment to the network's placeholder address,
//! so coin selection sees a realistic blinded output without knowing who
//! will accept. The ask is appended afterwards as an unfunded output to a
//! fresh proposer address; the receiver will fund it.

use tracing::{debug, info, info_span};

use super::funding::{collect_unspent_details, confidential_of, fee_value, fund_output, output_leg};
use super::{Leg, SwapError};
use crate::address::{ConfidentialAddress, ConfidentialMap};
use crate::amount::FeeRate;
use crate::checks::node_network;
use crate::config::{IS_REPLACEABLE, NLOCKTIME};
use crate::node::{NodeCapability, OutputKind, OutputSpec};
use crate::payload::Proposal;

/// Proposes to send `send` in exchange for `receive`.
///
/// `fee_rate` overrides the wallet's fee estimation for the proposer's
/// share of the fee. Nothing is signed or broadcast.
pub fn propose(
    node: &dyn NodeCapability,
    send: Leg,
    receive: Leg,
    fee_rate: Option<FeeRate>,
) -> Result<Proposal, SwapError> {
    let span = info_span!("swap", phase = "propose");
    let _enter = span.enter();

    if send.amount == 0 || receive.amount == 0 {
        return Err(SwapError::MissingValue("missing or zero amount".into()));
    }
    if send.asset == receive.asset {
        return Err(SwapError::SameAsset);
    }
    info!(
        send_amount = send.amount,
        send_asset = %send.asset,
        receive_amount = receive.amount,
        receive_asset = %receive.asset,
        fee_rate = ?fee_rate,
        "proposing swap"
    );

    let network = node_network(node)?;
    let proposer_confidential = node.get_new_address()?;
    let proposer_address = node
        .get_address_info(proposer_confidential.as_str())?
        .unconfidential
        .ok_or_else(|| SwapError::MissingValue("new address has no unconfidential form".into()))?;

    let placeholder = ConfidentialAddress::new(network.placeholder_confidential_address());
    let funded = fund_output(node, placeholder.clone(), send, fee_rate)?;
    let unspent_details = collect_unspent_details(node, &funded.inputs)?;

    // Re-create the funded transaction output by output, recording the
    // confidential form of every wallet-owned address for the receiver.
    let mut outputs = Vec::with_capacity(funded.outputs.len() + 1);
    let mut confidential_map = ConfidentialMap::new();
    for output in &funded.outputs {
        match &output.kind {
            OutputKind::Address(address) => {
                let leg = output_leg(output)?;
                let destination = if *address == *network.placeholder_address() {
                    placeholder.clone()
                } else {
                    let confidential = confidential_of(node, address)?;
                    confidential_map.insert(address.clone(), confidential.clone());
                    confidential
                };
                outputs.push(OutputSpec::Address {
                    address: destination,
                    amount: leg.amount,
                    asset: leg.asset,
                });
            }
            OutputKind::Fee => {
                let amount = fee_value(output)?;
                debug!(fee = amount, "proposer fee");
                outputs.push(OutputSpec::Fee { amount });
            }
            OutputKind::Other(kind) => {
                return Err(SwapError::UnexpectedValue(format!(
                    "funded transaction has a {kind} output"
                )));
            }
        }
    }

    outputs.push(OutputSpec::Address {
        address: proposer_confidential.clone(),
        amount: receive.amount,
        asset: receive.asset,
    });
    confidential_map.insert(proposer_address.clone(), proposer_confidential);

    let tx = node.create_raw_transaction(&funded.inputs, &outputs, NLOCKTIME, IS_REPLACEABLE)?;

    debug!(
        address = %proposer_address,
        mapped = confidential_map.len(),
        inputs = unspent_details.len(),
        "proposal built"
    );
    Ok(Proposal {
        tx,
        proposer_address,
        confidential_map,
        unspent_details,
    })
}
