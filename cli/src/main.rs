// Copyright (c) 2026 Liquid Swap contributors. MIT License.
// See LICENSE for details.

//! # Liquid Swap CLI
//!
//! Entry point for the `liquidswap` binary. Parses CLI arguments,
//! initializes logging, connects to the local Elements node and runs one
//! swap step.
//!
//! - `propose`: build a proposal payload
//! - `accept`: verify a proposal and build the accepted payload
//! - `finalize`: verify an accepted payload, sign, dry-run or broadcast
//! - `info`: show what a payload moves, from this wallet's side
//! - `balance`: list wallet assets

mod cli;
mod logging;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;

use liquidswap_protocol::amount::format_btc;
use liquidswap_protocol::asset::{AssetBook, AssetId, POLICY_ASSET_LABEL};
use liquidswap_protocol::checks::{
    check_not_mine, check_wallet_unlocked, do_initial_checks, receiver_fee,
};
use liquidswap_protocol::node::conf::RpcConfig;
use liquidswap_protocol::node::rpc::ElementsRpc;
use liquidswap_protocol::payload::{AcceptedSwap, Proposal, SwapMessage};
use liquidswap_protocol::swap::{
    self, finalize, parse_accepted, parse_proposed, verify_against_proposal, Finalized, Leg,
    ParsedAcceptance, SwapError,
};

use cli::{Commands, ConnectionArgs, LabelArgs, LiquidSwapCli};
use report::Report;

fn main() -> ExitCode {
    let cli = LiquidSwapCli::parse();
    logging::init_logging(&logging::default_directive(cli.verbose), cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => Report::from_error(&err).emit(),
    }
}

fn run(cli: LiquidSwapCli) -> Result<()> {
    let node = connect(&cli.connection)?;
    do_initial_checks(&node, cli.connection.network())?;

    match cli.command {
        Commands::Info(args) => info(&node, &args.payload, &args.labels),
        Commands::Propose(args) => {
            let proposal = swap::propose(
                &node,
                Leg::new(args.amount_p, args.asset_p),
                Leg::new(args.amount_r, args.asset_r),
                args.fee_rate,
            )?;
            emit_payload(SwapMessage::from(proposal), args.output.as_deref())
        }
        Commands::Accept(args) => {
            check_wallet_unlocked(&node)?;
            let proposal = read_proposal(&args.payload)?;
            check_not_mine(&node, proposal.proposer_address.as_str())?;
            let parsed = parse_proposed(&node, &proposal)?;
            let accepted = swap::accept(&node, &parsed, args.fee_rate)?;
            let fee = receiver_fee(&node, &accepted.tx, parsed.proposer_fee)?;
            eprintln!("fee       {} {POLICY_ASSET_LABEL}", format_btc(fee));
            emit_payload(SwapMessage::from(accepted), args.output.as_deref())
        }
        Commands::Finalize(args) => {
            args.check_broadcast()?;
            check_wallet_unlocked(&node)?;
            let accepted = read_accepted(&args.payload)?;
            check_not_mine(&node, accepted.receiver_address.as_str())?;
            let acceptance = parse_accepted(&node, &accepted)?;
            show_acceptance(&asset_book(&node, &args.labels)?, &acceptance);
            if let Some(path) = &args.proposal {
                let own = parse_proposed(&node, &read_proposal(path)?)?;
                verify_against_proposal(&acceptance, &own)?;
            }
            let report = match finalize(&node, &acceptance, args.send)? {
                Finalized::Broadcast { txid } => json!({ "broadcast": true, "txid": txid }),
                Finalized::Signed { tx } => json!({ "broadcast": false, "transaction": tx }),
            };
            print_json(&report)
        }
        Commands::Balance => {
            let mut book = AssetBook::new();
            book.update(&node)?;
            let entries: Vec<_> = book
                .entries()
                .map(|(asset, label, amount)| {
                    json!({ "asset": asset, "label": label, "amount": format_btc(amount) })
                })
                .collect();
            print_json(&entries)
        }
    }
}

fn connect(args: &ConnectionArgs) -> Result<ElementsRpc> {
    let network = args.network();
    let config = RpcConfig {
        service_url: args.service_url.clone(),
        conf_file: args.conf_file.clone(),
        default_port: Some(network.default_rpc_port()),
    };
    let endpoint = config.resolve()?;
    tracing::info!(url = %endpoint.url, %network, "connecting to node");
    Ok(ElementsRpc::new(endpoint)?)
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

/// One leg as seen from the local wallet.
#[derive(Debug, Serialize)]
struct LegReport {
    incoming: bool,
    funded: bool,
    asset: AssetId,
    label: String,
    amount: String,
    fee: String,
}

impl LegReport {
    fn new(book: &AssetBook, leg: Leg, incoming: bool, funded: bool, fee: u64) -> Self {
        Self {
            incoming,
            funded,
            asset: leg.asset,
            label: book.label(&leg.asset),
            amount: format_btc(leg.amount),
            fee: format_btc(fee),
        }
    }
}

fn info(node: &ElementsRpc, path: &Path, labels: &LabelArgs) -> Result<()> {
    let book = asset_book(node, labels)?;

    let message = read_payload(path)?;
    let legs = match &message {
        SwapMessage::Proposed(proposal) => {
            let parsed = parse_proposed(node, proposal)?;
            // The proposer sends the offer; whoever else reads it receives it.
            let offer_incoming = !parsed.is_own;
            vec![
                LegReport::new(&book, parsed.offer, offer_incoming, true, parsed.proposer_fee),
                LegReport::new(&book, parsed.ask, !offer_incoming, false, 0),
            ]
        }
        SwapMessage::Accepted(accepted) => {
            let parsed = parse_accepted(node, accepted)?;
            vec![
                LegReport::new(&book, parsed.sent, false, true, parsed.proposer_fee),
                LegReport::new(&book, parsed.received, true, true, parsed.receiver_fee),
            ]
        }
    };
    print_json(&json!({ "status": message.status(), "legs": legs }))
}

fn asset_book(node: &ElementsRpc, labels: &LabelArgs) -> Result<AssetBook> {
    let mut book = AssetBook::new();
    book.update(node)?;
    for (asset, label) in &labels.labels {
        book.add_temp_label(asset, label, false)?;
    }
    Ok(book)
}

/// Prints what the proposer is about to sign, on stderr so stdout stays
/// machine-readable.
fn show_acceptance(book: &AssetBook, acceptance: &ParsedAcceptance) {
    let line = |what: &str, leg: &Leg| {
        eprintln!("{what:<9} {} {}", format_btc(leg.amount), book.label(&leg.asset));
    };
    line("sending", &acceptance.sent);
    line("receiving", &acceptance.received);
    eprintln!(
        "fee       {} {POLICY_ASSET_LABEL}",
        format_btc(acceptance.proposer_fee)
    );
}

// ---------------------------------------------------------------------------
// Payload I/O
// ---------------------------------------------------------------------------

fn read_payload(path: &Path) -> Result<SwapMessage> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read payload from {}", path.display()))?;
    Ok(SwapMessage::decode(&text)?)
}

fn read_proposal(path: &Path) -> Result<Proposal> {
    match read_payload(path)? {
        SwapMessage::Proposed(proposal) => Ok(proposal),
        other => Err(unexpected_status(path, &other).into()),
    }
}

fn read_accepted(path: &Path) -> Result<AcceptedSwap> {
    match read_payload(path)? {
        SwapMessage::Accepted(accepted) => Ok(accepted),
        other => Err(unexpected_status(path, &other).into()),
    }
}

fn unexpected_status(path: &Path, message: &SwapMessage) -> SwapError {
    SwapError::UnexpectedValue(format!(
        "{} holds a {} swap",
        path.display(),
        message.status()
    ))
}

/// Writes the payload to `output`, or prints it.
fn emit_payload(message: SwapMessage, output: Option<&Path>) -> Result<()> {
    let text = message.encode()?;
    match output {
        Some(path) => {
            fs::write(path, &text)
                .with_context(|| format!("failed to write payload to {}", path.display()))?;
            tracing::info!(path = %path.display(), status = %message.status(), "payload written");
            print_json(&json!({ "status": message.status(), "file": PathBuf::from(path) }))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
