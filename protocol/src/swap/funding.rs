//! Steps shared by the proposer's and the receiver's funding phases.

use tracing::{debug, warn};

use super::{Leg, SwapError};
use crate::address::{ConfidentialAddress, UnconfidentialAddress};
use crate::amount::FeeRate;
use crate::config::{IS_REPLACEABLE, NLOCKTIME};
use crate::node::{DecodedTransaction, NodeCapability, OutPoint, OutputSpec, TxOutput, UnspentDetail};

/// Builds a transaction paying `leg` to `address`, lets the wallet fund it
/// and decodes the result.
pub(crate) fn fund_output(
    node: &dyn NodeCapability,
    address: ConfidentialAddress,
    leg: Leg,
    fee_rate: Option<FeeRate>,
) -> Result<DecodedTransaction, SwapError> {
    let unfunded = node.create_raw_transaction(
        &[],
        &[OutputSpec::Address {
            address,
            amount: leg.amount,
            asset: leg.asset,
        }],
        NLOCKTIME,
        IS_REPLACEABLE,
    )?;
    let funded = node.fund_raw_transaction(&unfunded, fee_rate)?;
    let tx = node.decode_raw_transaction(&funded.hex)?;
    debug!(
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        fee = funded.fee,
        "funded transaction"
    );
    Ok(tx)
}

/// Blinding details of every input, in input order, from the wallet's unspents.
pub(crate) fn collect_unspent_details(
    node: &dyn NodeCapability,
    inputs: &[OutPoint],
) -> Result<Vec<UnspentDetail>, SwapError> {
    let unspents = node.list_unspent()?;
    let details = match_details(inputs, &unspents)?;
    debug!(count = details.len(), "collected unspent details");
    Ok(details)
}

/// Picks the detail of each input from `details`. Every input must be covered.
pub(crate) fn match_details(
    inputs: &[OutPoint],
    details: &[UnspentDetail],
) -> Result<Vec<UnspentDetail>, SwapError> {
    let matched: Vec<UnspentDetail> = inputs
        .iter()
        .filter_map(|input| details.iter().find(|d| d.spends(input)).cloned())
        .collect();
    if matched.len() != inputs.len() {
        warn!(
            inputs = inputs.len(),
            found = matched.len(),
            "unspent details do not cover every input"
        );
        return Err(SwapError::MissingValue(format!(
            "unspent details cover {} of {} inputs",
            matched.len(),
            inputs.len()
        )));
    }
    Ok(matched)
}

/// The explicit amount and asset of an output.
pub(crate) fn output_leg(output: &TxOutput) -> Result<Leg, SwapError> {
    match (output.value, output.asset) {
        (Some(amount), Some(asset)) => Ok(Leg { amount, asset }),
        _ => Err(SwapError::MissingValue(format!(
            "output {} has no explicit amount or asset",
            output.n
        ))),
    }
}

/// The explicit value of a fee output.
pub(crate) fn fee_value(output: &TxOutput) -> Result<u64, SwapError> {
    output
        .value
        .ok_or_else(|| SwapError::MissingValue(format!("fee output {} has no value", output.n)))
}

/// The confidential form of a wallet address.
pub(crate) fn confidential_of(
    node: &dyn NodeCapability,
    address: &UnconfidentialAddress,
) -> Result<ConfidentialAddress, SwapError> {
    node.get_address_info(address.as_str())?
        .confidential
        .ok_or_else(|| SwapError::MissingValue(format!("no confidential form for {address}")))
}

/// The unconfidential form of an address, as reported by `validateaddress`.
pub(crate) fn unconfidential_of(
    node: &dyn NodeCapability,
    address: &ConfidentialAddress,
) -> Result<UnconfidentialAddress, SwapError> {
    let validation = node.validate_address(address.as_str())?;
    if !validation.is_valid {
        return Err(SwapError::InvalidAddress(address.to_string()));
    }
    validation
        .unconfidential
        .ok_or_else(|| SwapError::MissingValue(format!("no unconfidential form for {address}")))
}
