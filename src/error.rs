//! Error types for zcash-monkey
//!
//! Every workflow in [`crate::actions`] is a failure boundary: errors are
//! flattened to a display string with [`ext_err`] and written into the
//! shared error field of the store instead of propagating further.

use thiserror::Error;

/// Errors raised while talking to the zcashd RPC service
#[derive(Error, Debug)]
pub enum NodeError {
    /// Request never produced an HTTP response (refused, timed out, DNS)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Node answered with a non-success status and a body we could not read as RPC
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response decoded but did not have the expected shape
    #[error("Malformed response from {method}: {detail}")]
    MalformedResponse { method: String, detail: String },

    #[error("Missing {0} setting.")]
    MissingSetting(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("Invalid extended public key: {0}")]
    InvalidXpub(String),

    #[error("Derivation index {0} out of range (must be < 2^31)")]
    IndexOutOfRange(u32),

    #[error("Cannot get network for empty chain name")]
    EmptyChain,

    #[error("Key derivation failed: {0}")]
    Derivation(String),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-level error aggregating every failure a workflow can hit
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Must have xpub set to add contributions.")]
    MissingXpub,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Flatten an error to the string shown to the user
///
/// Prefers the node's own RPC error message, then the raw HTTP response body,
/// and falls back to the error's display form.
pub fn ext_err(error: &ClientError) -> String {
    match error {
        ClientError::Node(NodeError::Rpc { message, .. }) => message.clone(),
        ClientError::Node(NodeError::Http { body, .. }) => body.clone(),
        other => other.to_string(),
    }
}
