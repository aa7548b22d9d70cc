//! Phase 1b: the receiver reads a proposal back from the chain's point of view.
//!
//! Nothing in a proposal is trusted as stated. The offer, the ask and the
//! proposer's fee are read off the decoded transaction, and every address
//! pairing in the confidential map is checked against the node.

use std::collections::BTreeMap;

use tracing::{debug, info, info_span, warn};

use super::funding::{fee_value, match_details, output_leg};
use super::{Leg, SwapError};
use crate::address::ConfidentialAddress;
use crate::checks::{is_mine, node_network};
use crate::node::{NodeCapability, OutPoint, OutputKind, UnspentDetail};
use crate::payload::Proposal;

/// A proposal whose contents have been verified against the chain view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProposal {
    /// The proposal transaction, unchanged.
    pub tx: String,
    /// Where the receiver pays the ask.
    pub proposer_confidential_address: ConfidentialAddress,
    /// What the proposer sends (the placeholder output).
    pub offer: Leg,
    /// Fee the proposer's inputs already cover.
    pub proposer_fee: u64,
    /// What the proposer wants in return.
    pub ask: Leg,
    /// Every non-placeholder output, keyed by confidential address.
    pub outputs: BTreeMap<ConfidentialAddress, Leg>,
    /// Inputs of the proposal transaction.
    pub inputs: Vec<OutPoint>,
    pub unspent_details: Vec<UnspentDetail>,
    /// The local wallet created this proposal.
    pub is_own: bool,
}

/// Verifies a proposal and extracts what [`accept`](super::accept) needs.
pub fn parse_proposed(
    node: &dyn NodeCapability,
    proposal: &Proposal,
) -> Result<ParsedProposal, SwapError> {
    let span = info_span!("swap", phase = "parse_proposed");
    let _enter = span.enter();
    info!(address = %proposal.proposer_address, "parsing swap proposal");

    let network = node_network(node)?;
    let is_own = is_mine(node, proposal.proposer_address.as_str())?;
    if is_own {
        info!("parsing own proposal");
    }

    let tx = node.decode_raw_transaction(&proposal.tx)?;

    let mut offer: Option<Leg> = None;
    let mut ask: Option<Leg> = None;
    let mut proposer_fee: Option<u64> = None;
    let mut outputs = BTreeMap::new();

    for output in &tx.outputs {
        match &output.kind {
            OutputKind::Address(address) => {
                let leg = output_leg(output)?;

                if *address == *network.placeholder_address() {
                    if offer.is_some() {
                        return Err(SwapError::UnexpectedValue(
                            "more than one placeholder output".into(),
                        ));
                    }
                    debug!(amount = leg.amount, asset = %leg.asset, "offer");
                    offer = Some(leg);
                    // The placeholder is replaced on acceptance.
                    continue;
                }
                if *address == proposal.proposer_address {
                    if ask.is_some() {
                        return Err(SwapError::UnexpectedValue(
                            "more than one proposer output".into(),
                        ));
                    }
                    debug!(amount = leg.amount, asset = %leg.asset, "ask");
                    ask = Some(leg);
                }

                let confidential = proposal.confidential_map.get(address).ok_or_else(|| {
                    SwapError::MissingValue(format!("{address} missing from confidential map"))
                })?;
                if !node.validate_address(confidential.as_str())?.is_valid {
                    return Err(SwapError::InvalidAddress(confidential.to_string()));
                }
                let round_trip = node.get_address_info(confidential.as_str())?.unconfidential;
                if round_trip.as_ref() != Some(address) {
                    warn!(
                        confidential = %confidential,
                        unconfidential = %address,
                        "confidential map does not round-trip"
                    );
                    return Err(SwapError::AddressMismatch {
                        confidential: confidential.to_string(),
                        unconfidential: address.to_string(),
                    });
                }
                if outputs.insert(confidential.clone(), leg).is_some() {
                    return Err(SwapError::UnexpectedValue(format!(
                        "more than one output to {confidential}"
                    )));
                }
            }
            OutputKind::Fee => {
                if proposer_fee.is_some() {
                    return Err(SwapError::UnexpectedValue("more than one fee output".into()));
                }
                proposer_fee = Some(fee_value(output)?);
            }
            OutputKind::Other(kind) => {
                return Err(SwapError::UnexpectedValue(format!(
                    "proposal has a {kind} output"
                )));
            }
        }
    }

    let offer = offer.ok_or_else(|| SwapError::MissingValue("missing placeholder output".into()))?;
    let ask = ask.ok_or_else(|| {
        SwapError::MissingValue("missing proposer address in the transaction".into())
    })?;
    let proposer_fee = match proposer_fee {
        Some(fee) if fee > 0 => fee,
        _ => return Err(SwapError::MissingValue("missing fee".into())),
    };
    if offer.amount == 0 || ask.amount == 0 {
        return Err(SwapError::MissingValue("zero amount in proposal".into()));
    }
    if offer.asset == ask.asset {
        return Err(SwapError::SameAsset);
    }

    // Every proposer input must come with its blinding data, or the
    // receiver could not blind the joint transaction later.
    let unspent_details = match_details(&tx.inputs, &proposal.unspent_details)?;

    let proposer_confidential_address = proposal
        .confidential_map
        .get(&proposal.proposer_address)
        .cloned()
        .ok_or_else(|| SwapError::MissingValue("proposer address missing from map".into()))?;

    info!(
        offer_amount = offer.amount,
        offer_asset = %offer.asset,
        ask_amount = ask.amount,
        ask_asset = %ask.asset,
        fee = proposer_fee,
        "proposal verified"
    );
    Ok(ParsedProposal {
        tx: proposal.tx.clone(),
        proposer_confidential_address,
        offer,
        proposer_fee,
        ask,
        outputs,
        inputs: tx.inputs,
        unspent_details,
        is_own,
    })
}
