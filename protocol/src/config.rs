//! # Protocol Configuration & Constants
//!
//! Every magic number the swap protocol relies on lives here. Both parties
//! must agree on these values bit for bit: a proposal built with one
//! placeholder address and parsed against another is simply unreadable.
//!
//! Changing anything in this file changes the wire protocol. Old payloads
//! in flight will stop parsing, so bump with care.

use std::fmt;

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// The Liquid network a node is running on.
///
/// The protocol only needs to tell "the real network" from "anything
/// else": placeholder addresses and default ports differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Local test chains (`elementsregtest`, custom chains).
    Regtest,
    /// The Liquid mainnet (`liquidv1`).
    Mainnet,
}

impl Network {
    /// Map a node-reported chain name to a network.
    ///
    /// Only `liquidv1` is mainnet. Every other chain name is treated as a
    /// test network, matching the address prefixes regtest nodes use.
    pub fn from_chain(chain: &str) -> Self {
        if chain == MAINNET_CHAIN {
            Network::Mainnet
        } else {
            Network::Regtest
        }
    }

    /// The unspendable placeholder address in unconfidential form.
    pub fn placeholder_address(self) -> &'static str {
        match self {
            Network::Regtest => PLACEHOLDER_ADDRESS_REGTEST,
            Network::Mainnet => PLACEHOLDER_ADDRESS_MAINNET,
        }
    }

    /// The unspendable placeholder address in confidential form.
    pub fn placeholder_confidential_address(self) -> &'static str {
        match self {
            Network::Regtest => PLACEHOLDER_CONFIDENTIAL_ADDRESS_REGTEST,
            Network::Mainnet => PLACEHOLDER_CONFIDENTIAL_ADDRESS_MAINNET,
        }
    }

    /// Default JSON-RPC port of an Elements node on this network.
    pub fn default_rpc_port(self) -> u16 {
        match self {
            Network::Regtest => DEFAULT_REGTEST_RPC_PORT,
            Network::Mainnet => DEFAULT_MAINNET_RPC_PORT,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Regtest => write!(f, "regtest"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Chain name reported by `getblockchaininfo` on Liquid mainnet.
pub const MAINNET_CHAIN: &str = "liquidv1";

// ---------------------------------------------------------------------------
// Placeholder Addresses
// ---------------------------------------------------------------------------
//
// P2SH-wrapped segwit addresses over a zeroed 20-byte hash. Nobody holds a
// key for them, everybody can recognise them. The node funds a transaction
// paying the placeholder so that fee estimation sees a realistic output,
// and the receiver later swaps it for its own address.
//
// The confidential forms carry a dummy blinding pubkey (0x02 repeated 33
// times) so the funding step sizes the output as a blinded one.

/// Regtest placeholder, unconfidential: base58check(0x4b || 0x00 * 20).
pub const PLACEHOLDER_ADDRESS_REGTEST: &str = "XBMEr9McFXkiLWTVqTyuNQR1CqKkMPMn6L";

/// Mainnet placeholder, unconfidential: base58check(0x27 || 0x00 * 20).
pub const PLACEHOLDER_ADDRESS_MAINNET: &str = "GhBXQEdEh35AtuSNxMzRutcgYg3nkvq5Wb";

/// Regtest placeholder, confidential (blinding prefix 0x04).
pub const PLACEHOLDER_CONFIDENTIAL_ADDRESS_REGTEST: &str =
    "Azpj2QQw8ZGASK99L4BVKvH2xW9jerD9QrLenKUML7sQXMqJKJyYSwp99dASLbF5aRqXifmnTFhVzbZn";

/// Mainnet placeholder, confidential (blinding prefix 0x0c).
pub const PLACEHOLDER_CONFIDENTIAL_ADDRESS_MAINNET: &str =
    "VJL5bwudesLgrLxF4SPVyxvoWrDJhBpKf9YxQgVpMzfuLDSGndbWS832vZmKoV5KhrC2RC4SKzvn2ZbE";

// ---------------------------------------------------------------------------
// Transaction Parameters
// ---------------------------------------------------------------------------

/// Lock-time of every swap transaction. A different value in an accepted
/// swap means someone edited the transaction.
pub const NLOCKTIME: u32 = 0;

/// Inputs signal replaceability (BIP125).
pub const IS_REPLACEABLE: bool = true;

/// Satoshis per whole coin. Every Liquid asset uses 8 decimal places on
/// the RPC interface, issued assets included.
pub const SATS_PER_COIN: u64 = 100_000_000;

// ---------------------------------------------------------------------------
// Node Requirements
// ---------------------------------------------------------------------------

/// Oldest Elements release the protocol has been exercised against.
pub const NODE_MIN_VERSION: u64 = 170_000;

/// Oldest wallet format that exports blinders in `listunspent`.
pub const WALLET_MIN_VERSION: u64 = 169_900;

/// From this release on `createrawtransaction` takes a list of outputs,
/// each carrying its own asset, instead of two parallel maps.
pub const NODE_OUTPUT_LIST_VERSION: u64 = 210_000;

/// Default RPC port for Liquid mainnet nodes.
pub const DEFAULT_MAINNET_RPC_PORT: u16 = 7041;

/// Default RPC port for regtest nodes.
pub const DEFAULT_REGTEST_RPC_PORT: u16 = 7040;

/// HTTP timeout for a single node call.
pub const RPC_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Payload Field Sets
// ---------------------------------------------------------------------------

/// Exact field set of a proposed swap payload.
pub const PROPOSED_KEYS: [&str; 4] = ["tx", "u_address_p", "map_confidential", "unspents_details"];

/// Exact field set of an accepted swap payload.
pub const ACCEPTED_KEYS: [&str; 4] = ["tx", "blinding_keys", "u_address_p", "u_address_r"];

/// Shown when a wallet is asked to negotiate with itself.
pub const OWN_PROPOSAL_ERROR_MSG: &str = "Unable to continue swap. This proposal was created \
     by the same wallet. The Liquid Swap Tool requires swaps to be between different wallets.";
