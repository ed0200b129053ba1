//! Error types for the simwallet collaborator boundaries.
use thiserror::Error;

/// Failures decoding or encoding chain data at the transaction codec boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("decode {what}: {reason}")] Decode { what: &'static str, reason: String },
    #[error("encode {what}: {reason}")] Encode { what: &'static str, reason: String },
    #[error("trailing bytes after {what}: consumed {consumed} of {len}")] TrailingBytes { what: &'static str, consumed: usize, len: usize },
    #[error("empty {0} payload")] Empty(&'static str),
}

/// Failures deriving keys or handling addresses at the key provider boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key derivation failed at index {index}: {reason}")] Derivation { index: u32, reason: String },
    #[error("invalid address: {0}")] InvalidAddress(String),
    #[error("address is for network {found}, expected {expected}")] WrongNetwork { expected: String, found: String },
}

/// Failures registering addresses with the node's transaction filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter rejected: {0}")] Rejected(String),
    #[error("notifier disconnected")] Disconnected,
}
