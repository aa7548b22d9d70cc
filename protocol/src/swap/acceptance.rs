//! Phase 3a: the proposer verifies an accepted swap.
//!
//! The proposer imports the receiver's blinding keys, unblinds the joint
//! transaction and reconciles what its own wallet puts in against what it
//! gets out, per asset. The receiver controls every byte of the payload,
//! so only this balance is trusted.
//!
//! ## Fee split
//!
//! With `bal[x]` the proposer's net balance of asset `x` (owned outputs
//! minus owned inputs), `sent`/`received` the two swap legs and `fee` the
//! single fee output:
//!
//! | Fee asset is…        | Proposer fee                      |
//! |----------------------|-----------------------------------|
//! | neither swap asset   | `-bal[fee]`                        |
//! | the sent asset       | `-bal[sent] - sent.amount`         |
//! | the received asset   | `received.amount - bal[received]`  |
//!
//! In the last two rows the fee share is derived from the amount stated in
//! the transaction rather than checked against it independently: if the
//! fee shares come out positive, that leg's amount is taken as agreed.
//! [`verify_against_proposal`] closes this gap when the proposer kept the
//! original proposal.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, info_span, warn};

use super::funding::{fee_value, output_leg};
use super::{Leg, ParsedProposal, SwapError};
use crate::asset::AssetId;
use crate::checks::is_mine;
use crate::config::NLOCKTIME;
use crate::node::{NodeCapability, OutputKind};
use crate::payload::AcceptedSwap;

/// An accepted swap whose balances have been reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAcceptance {
    /// The transaction as received, still missing the proposer's signatures.
    pub tx: String,
    /// What the proposer pays the receiver.
    pub sent: Leg,
    pub proposer_fee: u64,
    /// What the proposer gets from the receiver.
    pub received: Leg,
    pub receiver_fee: u64,
}

/// Verifies an accepted swap on the proposer's side.
pub fn parse_accepted(
    node: &dyn NodeCapability,
    accepted: &AcceptedSwap,
) -> Result<ParsedAcceptance, SwapError> {
    let span = info_span!("swap", phase = "parse_accepted");
    let _enter = span.enter();
    info!(
        proposer = %accepted.proposer_address,
        receiver = %accepted.receiver_address,
        keys = accepted.blinding_keys.len(),
        "parsing accepted swap"
    );

    let is_proposer = is_mine(node, accepted.proposer_address.as_str())?;
    let is_receiver = is_mine(node, accepted.receiver_address.as_str())?;
    if is_receiver {
        return Err(SwapError::OwnProposal(
            "parsing an own accepted proposal is not supported".into(),
        ));
    }
    if !is_proposer {
        return Err(SwapError::UnexpectedValue(format!(
            "neither {} nor {} is owned by this wallet",
            accepted.proposer_address, accepted.receiver_address
        )));
    }

    debug!("importing blinding keys");
    for (address, key) in &accepted.blinding_keys {
        node.import_blinding_key(address, key)?;
    }
    let unblinded = node.unblind_raw_transaction(&accepted.tx)?;
    let tx = node.decode_raw_transaction(&unblinded)?;

    if tx.locktime != NLOCKTIME {
        warn!(found = tx.locktime, expected = NLOCKTIME, "unexpected locktime");
        return Err(SwapError::UnexpectedValue(format!(
            "unexpected locktime: expected {NLOCKTIME}, found {}",
            tx.locktime
        )));
    }

    let unspents = node.list_unspent()?;
    let mut amounts_in: BTreeMap<AssetId, u64> = BTreeMap::new();
    for input in &tx.inputs {
        if let Some(unspent) = unspents.iter().find(|u| u.spends(input)) {
            add(&mut amounts_in, unspent.asset, unspent.amount)?;
        }
    }

    let mut amounts_out: BTreeMap<AssetId, u64> = BTreeMap::new();
    let mut sent: Option<Leg> = None;
    let mut received: Option<Leg> = None;
    let mut fee: Option<Leg> = None;
    for output in &tx.outputs {
        if output.value.is_none() || output.asset.is_none() {
            return Err(SwapError::Unblind(format!(
                "output {} is still blinded",
                output.n
            )));
        }
        match &output.kind {
            OutputKind::Address(address) => {
                let leg = output_leg(output)?;
                if *address == accepted.receiver_address {
                    if sent.is_some() {
                        return Err(SwapError::UnexpectedValue(
                            "more than one receiver output".into(),
                        ));
                    }
                    sent = Some(leg);
                } else if *address == accepted.proposer_address {
                    if received.is_some() {
                        return Err(SwapError::UnexpectedValue(
                            "more than one proposer output".into(),
                        ));
                    }
                    received = Some(leg);
                }
                if node.get_address_info(address.as_str())?.is_mine {
                    add(&mut amounts_out, leg.asset, leg.amount)?;
                }
            }
            OutputKind::Fee => {
                if fee.is_some() {
                    return Err(SwapError::UnexpectedValue("more than one fee output".into()));
                }
                let amount = fee_value(output)?;
                let asset = output_leg(output)?.asset;
                fee = Some(Leg { amount, asset });
            }
            OutputKind::Other(kind) => debug!(n = output.n, kind = %kind, "ignoring output"),
        }
    }

    let sent = sent.ok_or_else(|| SwapError::MissingValue("missing receiver output".into()))?;
    let received =
        received.ok_or_else(|| SwapError::MissingValue("missing proposer output".into()))?;
    let fee = fee.ok_or_else(|| SwapError::MissingValue("missing fee output".into()))?;
    if sent.amount == 0 || received.amount == 0 {
        return Err(SwapError::MissingValue("zero amount in accepted swap".into()));
    }

    let (proposer_fee, receiver_fee) = reconcile(sent, received, fee, &amounts_in, &amounts_out)?;

    info!(
        sent_amount = sent.amount,
        sent_asset = %sent.asset,
        received_amount = received.amount,
        received_asset = %received.asset,
        fee_proposer = proposer_fee,
        fee_receiver = receiver_fee,
        "accepted swap verified"
    );
    Ok(ParsedAcceptance {
        tx: accepted.tx.clone(),
        sent,
        proposer_fee,
        received,
        receiver_fee,
    })
}

/// Reconciles the proposer's wallet balance against the swap legs.
///
/// `amounts_in` and `amounts_out` are the proposer-owned input and output
/// totals per asset. Returns `(proposer_fee, receiver_fee)`.
pub fn reconcile(
    sent: Leg,
    received: Leg,
    fee: Leg,
    amounts_in: &BTreeMap<AssetId, u64>,
    amounts_out: &BTreeMap<AssetId, u64>,
) -> Result<(u64, u64), SwapError> {
    if sent.asset == received.asset {
        return Err(SwapError::SameAsset);
    }

    let signed = |amount: u64| {
        i64::try_from(amount)
            .map_err(|_| SwapError::UnexpectedValue(format!("amount {amount} out of range")))
    };
    let overflow = || SwapError::UnexpectedValue("balance out of range".into());

    let mut balance: BTreeMap<AssetId, i64> = BTreeMap::new();
    for asset in amounts_in.keys().chain(amounts_out.keys()) {
        let out = signed(amounts_out.get(asset).copied().unwrap_or(0))?;
        let inp = signed(amounts_in.get(asset).copied().unwrap_or(0))?;
        balance.insert(*asset, out.checked_sub(inp).ok_or_else(overflow)?);
    }

    let expected: BTreeSet<AssetId> = [sent.asset, received.asset, fee.asset].into();
    let found: BTreeSet<AssetId> = balance.keys().copied().collect();
    if found != expected {
        warn!(?found, ?expected, "unexpected assets in balance");
        return Err(SwapError::UnexpectedValue(format!(
            "unexpected assets in transaction balance: found {found:?}, expected {expected:?}"
        )));
    }
    let bal = |asset: &AssetId| balance.get(asset).copied().unwrap_or(0);

    let sent_amount = signed(sent.amount)?;
    let received_amount = signed(received.amount)?;
    let fee_total = signed(fee.amount)?;

    let fee_p = if fee.asset == sent.asset {
        bal(&sent.asset)
            .checked_neg()
            .and_then(|v| v.checked_sub(sent_amount))
    } else if fee.asset == received.asset {
        received_amount.checked_sub(bal(&received.asset))
    } else {
        bal(&fee.asset).checked_neg()
    }
    .ok_or_else(overflow)?;
    let fee_r = fee_total.checked_sub(fee_p).ok_or_else(overflow)?;

    if fee_total <= 0 || fee_p <= 0 || fee_r <= 0 {
        warn!(fee_total, fee_p, fee_r, "inconsistent fees");
        return Err(SwapError::UnexpectedValue(format!(
            "unexpected fees: total {fee_total}, proposer {fee_p}, receiver {fee_r}"
        )));
    }

    if fee.asset != sent.asset && bal(&sent.asset).checked_neg() != Some(sent_amount) {
        warn!(found = -bal(&sent.asset), expected = sent_amount, "proposer pays a different amount");
        return Err(SwapError::UnexpectedValue(format!(
            "unexpected amount sent by proposer: found {}, expected {sent_amount}",
            -bal(&sent.asset)
        )));
    }
    if fee.asset != received.asset && bal(&received.asset) != received_amount {
        warn!(found = bal(&received.asset), expected = received_amount, "receiver pays a different amount");
        return Err(SwapError::UnexpectedValue(format!(
            "unexpected amount sent by receiver: found {}, expected {received_amount}",
            bal(&received.asset)
        )));
    }

    // Both are positive i64 at this point.
    Ok((fee_p as u64, fee_r as u64))
}

/// Confirms an accepted swap pays exactly what the proposal offered and asked.
pub fn verify_against_proposal(
    acceptance: &ParsedAcceptance,
    proposal: &ParsedProposal,
) -> Result<(), SwapError> {
    if acceptance.sent != proposal.offer {
        return Err(SwapError::UnexpectedValue(format!(
            "accepted swap sends {}, proposal offered {}",
            acceptance.sent, proposal.offer
        )));
    }
    if acceptance.received != proposal.ask {
        return Err(SwapError::UnexpectedValue(format!(
            "accepted swap pays {}, proposal asked {}",
            acceptance.received, proposal.ask
        )));
    }
    if acceptance.proposer_fee != proposal.proposer_fee {
        return Err(SwapError::UnexpectedValue(format!(
            "proposer fee {} differs from proposed {}",
            acceptance.proposer_fee, proposal.proposer_fee
        )));
    }
    Ok(())
}

fn add(totals: &mut BTreeMap<AssetId, u64>, asset: AssetId, amount: u64) -> Result<(), SwapError> {
    let total = totals.entry(asset).or_insert(0);
    *total = total
        .checked_add(amount)
        .ok_or_else(|| SwapError::UnexpectedValue("amount overflow".into()))?;
    Ok(())
}
