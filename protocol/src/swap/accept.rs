//! Phase 2: the receiver funds the ask and builds the joint transaction.

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, info_span, warn};

use super::funding::{
    collect_unspent_details, confidential_of, fee_value, fund_output, match_details, output_leg,
    unconfidential_of,
};
use super::{Leg, ParsedProposal, SwapError};
use crate::address::ConfidentialAddress;
use crate::amount::FeeRate;
use crate::config::{IS_REPLACEABLE, NLOCKTIME};
use crate::node::{NodeCapability, OutputKind, OutputSpec};
use crate::payload::AcceptedSwap;

/// Accepts a verified proposal.
///
/// Funds the ask from the local wallet, merges both input sets in random
/// order, blinds the joint transaction, signs the local inputs, and exports
/// the blinding keys the proposer needs to verify the result.
pub fn accept(
    node: &dyn NodeCapability,
    proposal: &ParsedProposal,
    fee_rate: Option<FeeRate>,
) -> Result<AcceptedSwap, SwapError> {
    let span = info_span!("swap", phase = "accept");
    let _enter = span.enter();
    info!(fee_rate = ?fee_rate, "accepting swap proposal");

    if proposal.is_own {
        return Err(SwapError::own_proposal());
    }

    let receiver_confidential = node.get_new_address()?;
    let receiver_address = unconfidential_of(node, &receiver_confidential)?;
    let proposer_confidential = &proposal.proposer_confidential_address;
    let proposer_address = unconfidential_of(node, proposer_confidential)?;
    debug!(receiver = %receiver_address, proposer = %proposer_address, "swap addresses");

    let funded = fund_output(node, proposer_confidential.clone(), proposal.ask, fee_rate)?;
    let receiver_details = collect_unspent_details(node, &funded.inputs)?;

    let mut receiver_outputs: BTreeMap<ConfidentialAddress, Leg> = BTreeMap::new();
    let mut receiver_fee: Option<u64> = None;
    for output in &funded.outputs {
        match &output.kind {
            OutputKind::Address(address) => {
                let leg = output_leg(output)?;
                let confidential = if *address == proposer_address {
                    proposer_confidential.clone()
                } else {
                    confidential_of(node, address)?
                };
                receiver_outputs.insert(confidential, leg);
            }
            OutputKind::Fee => receiver_fee = Some(fee_value(output)?),
            OutputKind::Other(kind) => {
                return Err(SwapError::UnexpectedValue(format!(
                    "funded transaction has a {kind} output"
                )));
            }
        }
    }
    let receiver_fee = receiver_fee
        .ok_or_else(|| SwapError::MissingValue("receiver funding has no fee".into()))?;

    // The placeholder is gone from the proposer's outputs; the offer now
    // goes to the receiver. The ask output appears on both sides with the
    // same leg and collapses into one.
    let mut outputs = proposal.outputs.clone();
    outputs.insert(receiver_confidential, proposal.offer);
    outputs.extend(receiver_outputs);
    let total_fee = proposal
        .proposer_fee
        .checked_add(receiver_fee)
        .ok_or_else(|| SwapError::UnexpectedValue("fee overflow".into()))?;

    let mut inputs = proposal.inputs.clone();
    inputs.extend(funded.inputs.iter().cloned());
    inputs.shuffle(&mut OsRng);

    let mut specs: Vec<OutputSpec> = outputs
        .iter()
        .map(|(address, leg)| OutputSpec::Address {
            address: address.clone(),
            amount: leg.amount,
            asset: leg.asset,
        })
        .collect();
    specs.push(OutputSpec::Fee { amount: total_fee });

    debug!(inputs = inputs.len(), outputs = specs.len(), "creating swap transaction");
    let tx = node.create_raw_transaction(&inputs, &specs, NLOCKTIME, IS_REPLACEABLE)?;

    // The node may reorder inputs, so blinding data follows the decoded order.
    let created = node.decode_raw_transaction(&tx)?;
    let all_details: Vec<_> = proposal
        .unspent_details
        .iter()
        .chain(&receiver_details)
        .cloned()
        .collect();
    let blinding = match_details(&created.inputs, &all_details)?;

    debug!("blinding swap transaction");
    let blinded = node.blind_raw_transaction(&tx, &blinding)?;

    debug!("signing receiver inputs");
    let signed = node.sign_raw_transaction_with_wallet(&blinded)?;

    let minimum = node.network_info()?.relay_fee;
    let vsize = node.decode_raw_transaction(&signed.hex)?.vsize;
    let found = FeeRate::implied(total_fee, vsize)
        .ok_or_else(|| SwapError::UnexpectedValue("swap transaction has zero size".into()))?;
    if found < minimum {
        warn!(%found, %minimum, "fee rate below relay fee");
        return Err(SwapError::FeeRateTooLow { found, minimum });
    }

    debug!("exporting blinding keys");
    let mut blinding_keys = BTreeMap::new();
    for address in outputs.keys() {
        if node.get_address_info(address.as_str())?.is_mine {
            let key = node.dump_blinding_key(address)?;
            blinding_keys.insert(address.clone(), key);
        }
    }

    info!(
        fee_proposer = proposal.proposer_fee,
        fee_receiver = receiver_fee,
        fee_rate = %found,
        keys = blinding_keys.len(),
        "swap accepted"
    );
    Ok(AcceptedSwap {
        tx: signed.hex,
        blinding_keys,
        proposer_address,
        receiver_address,
    })
}
