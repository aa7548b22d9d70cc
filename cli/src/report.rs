//! Turns any failure into a title, a message and an exit code.
//!
//! Node problems (unreachable, unauthorized, RPC errors) exit with 2 so
//! scripts can retry them; everything else, including a counterparty
//! payload that fails verification, exits with 1.

use std::process::ExitCode;

use liquidswap_protocol::node::NodeError;
use liquidswap_protocol::swap::SwapError;

pub const NODE_ERROR_TITLE: &str = "Liquid Node Error";
pub const SWAP_ERROR_TITLE: &str = "Swap Error";
pub const GENERIC_ERROR_TITLE: &str = "Error";

const EXIT_FAILURE: u8 = 1;
const EXIT_CONNECTIVITY: u8 = 2;

/// A failure as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub title: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Report {
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(swap) = err.downcast_ref::<SwapError>() {
            return Self::from_swap(swap);
        }
        if let Some(node) = err.downcast_ref::<NodeError>() {
            return Self::from_node(node);
        }
        Self {
            title: GENERIC_ERROR_TITLE,
            message: format!("{err:#}"),
            exit_code: EXIT_FAILURE,
        }
    }

    fn from_swap(err: &SwapError) -> Self {
        match err {
            SwapError::Node(node) => Self::from_node(node),
            other => Self {
                title: SWAP_ERROR_TITLE,
                message: other.to_string(),
                exit_code: EXIT_FAILURE,
            },
        }
    }

    fn from_node(err: &NodeError) -> Self {
        Self {
            title: NODE_ERROR_TITLE,
            message: err.to_string(),
            exit_code: EXIT_CONNECTIVITY,
        }
    }

    /// Prints the report to stderr and returns the exit code.
    pub fn emit(&self) -> ExitCode {
        tracing::error!(title = self.title, message = %self.message, "command failed");
        eprintln!("{}: {}", self.title, self.message);
        ExitCode::from(self.exit_code)
    }
}
