// Copyright (c) 2026 Liquid Swap contributors. MIT License.
// See LICENSE for details.

//! # Liquid Swap Protocol: Core Library
//!
//! Atomic swaps of confidential assets on Liquid, negotiated between two
//! wallets that never talk to each other directly. Each party drives its
//! own Elements node; the only things exchanged are two opaque payloads.
//!
//! ## Architecture
//!
//! - **swap**: The three phases (propose, accept, finalize) and the checks
//!   each side runs on the other's payload.
//! - **payload**: The wire format: JSON, base64-wrapped.
//! - **node**: The wallet/node capability the protocol runs against, and
//!   its JSON-RPC implementation.
//! - **checks**: Node, wallet and network preconditions.
//! - **asset** / **address** / **amount**: Typed identifiers and the
//!   satoshi arithmetic everything else relies on.
//! - **config**: Protocol constants and network parameters.
//!
//! ## Ground Rules
//!
//! 1. Nothing a counterparty states is trusted; every amount is re-derived
//!    from the decoded transaction.
//! 2. Amounts are integer satoshis end to end. Decimal text exists only at
//!    the RPC and display boundaries.
//! 3. Nothing is broadcast before [`swap::finalize`] is asked to.

pub mod address;
pub mod amount;
pub mod asset;
pub mod checks;
pub mod config;
pub mod node;
pub mod payload;
pub mod swap;
