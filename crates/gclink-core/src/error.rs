//! Shared error type across gclink crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, GcError>;

/// Unified error type used by the protocol core and the session engine.
#[derive(Debug, Error)]
pub enum GcError {
    /// Frame or body shorter than its declared layout.
    #[error("truncated payload: {0}")]
    Truncated(&'static str),
    /// Struct body bytes did not match the message layout.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Protobuf body failed to parse.
    #[error("protobuf decode failed: {0}")]
    Proto(#[from] prost::DecodeError),
    /// Message-type code outside the known enumeration.
    #[error("unknown message type {0}")]
    UnknownType(u32),
    /// The host transport refused or dropped an outbound send.
    #[error("transport send failed: {0}")]
    Transport(String),
    /// The host inventory endpoint failed.
    #[error("inventory fetch failed: {0}")]
    Rest(String),
    /// A bounded wait elapsed.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    /// Operation requires an established GC session.
    #[error("no gc session")]
    NotConnected,
    /// Config failed strict parsing or validation.
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}
