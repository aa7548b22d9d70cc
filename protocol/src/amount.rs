//! # Amounts & Fee Rates
//!
//! All protocol arithmetic is done in satoshis (`u64`). The node speaks
//! BTC-denominated decimals, so conversion happens here and only here:
//!
//! - values going *to* the node are rendered as exact 8-decimal strings,
//!   never as binary floats;
//! - values coming *from* the node are JSON numbers and are rounded to the
//!   nearest satoshi;
//! - values typed by a user are parsed as decimal text, digit by digit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SATS_PER_COIN;

/// Decimal places of every Liquid amount on the RPC interface.
pub const DECIMALS: u32 = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing a user-supplied decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input was empty or only whitespace.
    #[error("empty amount")]
    Empty,

    /// The input is not a plain non-negative decimal number.
    #[error("invalid amount: {0:?}")]
    Invalid(String),

    /// More than eight digits after the decimal point.
    #[error("amount {0:?} has more than 8 decimal places")]
    TooPrecise(String),

    /// The value does not fit in 64 bits of satoshis.
    #[error("amount {0:?} is too large")]
    Overflow(String),
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Converts a BTC-denominated float reported by the node to satoshis.
///
/// Returns `None` for negative, non-finite, or out-of-range values.
pub fn btc_to_sat(btc: f64) -> Option<u64> {
    if !btc.is_finite() || btc < 0.0 {
        return None;
    }
    let sats = (btc * SATS_PER_COIN as f64).round();
    if sats > u64::MAX as f64 {
        return None;
    }
    Some(sats as u64)
}

/// Renders satoshis as an exact 8-decimal BTC string, e.g. `"0.00100000"`.
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_COIN, sats % SATS_PER_COIN)
}

/// Parses decimal BTC text (`"1"`, `"0.5"`, `".001"`) into satoshis.
pub fn parse_btc(text: &str) -> Result<u64, AmountError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(text.to_string()));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Invalid(text.to_string()));
    }
    if frac.len() > DECIMALS as usize {
        return Err(AmountError::TooPrecise(text.to_string()));
    }

    let overflow = || AmountError::Overflow(text.to_string());
    let whole_sats = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| overflow())?
            .checked_mul(SATS_PER_COIN)
            .ok_or_else(overflow)?
    };
    let frac_sats = if frac.is_empty() {
        0
    } else {
        let scale = 10u64.pow(DECIMALS - frac.len() as u32);
        frac.parse::<u64>().map_err(|_| overflow())? * scale
    };

    whole_sats.checked_add(frac_sats).ok_or_else(overflow)
}

// ---------------------------------------------------------------------------
// Fee Rate
// ---------------------------------------------------------------------------

/// A fee rate in satoshis per 1000 virtual bytes.
///
/// Elements reports and accepts fee rates in BTC/kvB; one satoshi per
/// kvB is the finest granularity the node itself works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeRate(u64);

impl FeeRate {
    /// Creates a fee rate from satoshis per 1000 vbytes.
    pub const fn from_sat_per_kvb(sat_per_kvb: u64) -> Self {
        Self(sat_per_kvb)
    }

    /// Creates a fee rate from a BTC/kvB float as reported by the node.
    pub fn from_btc_per_kvb(btc: f64) -> Option<Self> {
        btc_to_sat(btc).map(Self)
    }

    /// The implied rate of paying `fee` satoshis for `vsize` vbytes.
    ///
    /// Rounds down, so a transaction is never reported as paying more
    /// than it does. A zero size yields `None`.
    pub fn implied(fee: u64, vsize: u64) -> Option<Self> {
        if vsize == 0 {
            return None;
        }
        let rate = u128::from(fee) * 1000 / u128::from(vsize);
        u64::try_from(rate).ok().map(Self)
    }

    /// Satoshis per 1000 vbytes.
    pub const fn sat_per_kvb(self) -> u64 {
        self.0
    }

    /// The rate as the exact BTC/kvB decimal string the node expects.
    pub fn to_btc_string(self) -> String {
        format_btc(self.0)
    }

    /// Fee owed for a transaction of `vsize` vbytes at this rate, rounded up.
    pub fn fee_for(self, vsize: u64) -> u64 {
        let fee = (u128::from(self.0) * u128::from(vsize)).div_ceil(1000);
        u64::try_from(fee).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BTC/kvB", self.to_btc_string())
    }
}

impl FromStr for FeeRate {
    type Err = AmountError;

    /// Parses a BTC/kvB decimal, the unit users see from the node.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_btc(s).map(Self)
    }
}
