//! # Swap Payloads
//!
//! Parties exchange swap state as opaque text pasted between them. The
//! text is JSON wrapped in base64, 76 characters per line.
//!
//! A payload carries no explicit phase tag. Its phase is inferred from its
//! exact field set:
//!
//! | Phase      | Fields                                                   |
//! |------------|----------------------------------------------------------|
//! | `proposed` | `tx`, `u_address_p`, `map_confidential`, `unspents_details` |
//! | `accepted` | `tx`, `blinding_keys`, `u_address_p`, `u_address_r`       |
//!
//! Any other field set is rejected. Field names are fixed for
//! compatibility with payloads produced by other Liquid swap tools.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::address::{ConfidentialAddress, ConfidentialMap, UnconfidentialAddress};
use crate::config::{ACCEPTED_KEYS, PROPOSED_KEYS};
use crate::swap::SwapError;

pub use crate::node::UnspentDetail;

/// Line width of the base64 text form.
const LINE_WIDTH: usize = 76;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Phase one: the proposer's part-funded transaction and what the receiver
/// needs to continue it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proposal {
    /// Unsigned, unblinded transaction (hex).
    pub tx: String,
    /// Proposer's receiving address, unconfidential form.
    #[serde(rename = "u_address_p")]
    pub proposer_address: UnconfidentialAddress,
    /// Confidential forms of every proposer-owned output address.
    #[serde(rename = "map_confidential")]
    pub confidential_map: ConfidentialMap,
    /// Blinding data for every input of `tx`.
    #[serde(rename = "unspents_details")]
    pub unspent_details: Vec<UnspentDetail>,
}

/// Phase two: the joint transaction, blinded and signed by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptedSwap {
    /// Blinded, partially signed transaction (hex).
    pub tx: String,
    /// Private blinding key of every receiver-owned output address.
    pub blinding_keys: BTreeMap<ConfidentialAddress, String>,
    #[serde(rename = "u_address_p")]
    pub proposer_address: UnconfidentialAddress,
    #[serde(rename = "u_address_r")]
    pub receiver_address: UnconfidentialAddress,
}

/// The phase a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Proposed,
    Accepted,
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapStatus::Proposed => write!(f, "proposed"),
            SwapStatus::Accepted => write!(f, "accepted"),
        }
    }
}

/// A decoded payload of either phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapMessage {
    Proposed(Proposal),
    Accepted(AcceptedSwap),
}

impl SwapMessage {
    pub fn status(&self) -> SwapStatus {
        match self {
            SwapMessage::Proposed(_) => SwapStatus::Proposed,
            SwapMessage::Accepted(_) => SwapStatus::Accepted,
        }
    }

    /// Encodes the message into its transport text form.
    pub fn encode(&self) -> Result<String, SwapError> {
        let json = match self {
            SwapMessage::Proposed(p) => serde_json::to_vec(p),
            SwapMessage::Accepted(a) => serde_json::to_vec(a),
        }
        .map_err(|e| SwapError::MalformedPayload(e.to_string()))?;
        Ok(wrap_lines(&STANDARD.encode(json)))
    }

    /// Decodes a transport text form.
    pub fn decode(text: &str) -> Result<Self, SwapError> {
        let object = decode_object(text)?;
        let value = Value::Object(object.clone());
        let malformed = |e: serde_json::Error| SwapError::MalformedPayload(e.to_string());
        match status(&object)? {
            SwapStatus::Proposed => serde_json::from_value(value)
                .map(SwapMessage::Proposed)
                .map_err(malformed),
            SwapStatus::Accepted => serde_json::from_value(value)
                .map(SwapMessage::Accepted)
                .map_err(malformed),
        }
    }
}

impl From<Proposal> for SwapMessage {
    fn from(proposal: Proposal) -> Self {
        SwapMessage::Proposed(proposal)
    }
}

impl From<AcceptedSwap> for SwapMessage {
    fn from(accepted: AcceptedSwap) -> Self {
        SwapMessage::Accepted(accepted)
    }
}

// ---------------------------------------------------------------------------
// Text Form
// ---------------------------------------------------------------------------

/// Infers the phase of a decoded JSON object from its exact field set.
pub fn status(object: &Map<String, Value>) -> Result<SwapStatus, SwapError> {
    let keys: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    let proposed: BTreeSet<&str> = PROPOSED_KEYS.into_iter().collect();
    let accepted: BTreeSet<&str> = ACCEPTED_KEYS.into_iter().collect();
    if keys == proposed {
        Ok(SwapStatus::Proposed)
    } else if keys == accepted {
        Ok(SwapStatus::Accepted)
    } else {
        Err(SwapError::UnexpectedValue(format!(
            "unrecognized payload fields: {keys:?}"
        )))
    }
}

/// Strips the transport encoding, returning the JSON object inside.
pub fn decode_object(text: &str) -> Result<Map<String, Value>, SwapError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(SwapError::MissingValue("empty payload".into()));
    }
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SwapError::MalformedPayload(format!("not base64: {e}")))?;
    let json = String::from_utf8(bytes)
        .map_err(|_| SwapError::MalformedPayload("not UTF-8 text".into()))?;
    match serde_json::from_str::<Value>(&json) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(SwapError::MalformedPayload("not a JSON object".into())),
        Err(e) => Err(SwapError::MalformedPayload(format!("not JSON: {e}"))),
    }
}

fn wrap_lines(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 1);
    // base64 output is ASCII, so byte chunks are char boundaries.
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.extend(chunk.iter().map(|&b| b as char));
        out.push('\n');
    }
    out
}
