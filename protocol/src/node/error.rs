//! Error types for talking to an Elements node.
//!
//! A [`NodeError`] means "the node could not be asked" or "the node said
//! no", never "the counterparty cheated". Protocol failures live in
//! [`crate::swap::SwapError`], which wraps this type unchanged.

use thiserror::Error;

/// Errors raised by a [`NodeCapability`](super::NodeCapability) implementation.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node could not be reached (connection refused, timeout, bad HTTP).
    #[error("cannot reach node: {0}")]
    Transport(String),

    /// The node rejected the credentials.
    #[error("node rejected the RPC credentials")]
    Unauthorized,

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code (e.g. `-5` invalid address or key).
        code: i64,
        /// Message as reported by the node.
        message: String,
    },

    /// The node answered with a shape we do not understand.
    #[error("unexpected node response: {0}")]
    Decode(String),

    /// Connection settings could not be resolved.
    #[error("node configuration error: {0}")]
    Config(String),
}
