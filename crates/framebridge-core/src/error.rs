//! Shared error type across framebridge crates.

use thiserror::Error;

/// Stable error codes, used in logs and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Envelope or record could not be parsed.
    Malformed,
    /// Transport refused or lost a message.
    Transport,
    /// Function name not present in a registry or proxy.
    UnknownFunction,
    /// A local API function failed.
    Invocation,
    /// The remote reported that a call failed.
    Rejected,
    /// Invalid configuration.
    Config,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::UnknownFunction => "UNKNOWN_FUNCTION",
            ErrorCode::Invocation => "INVOCATION",
            ErrorCode::Rejected => "REJECTED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type used by core and engine.
///
/// None of these ever crosses the channel: a failed remote call is reported
/// to the caller only as a rejected result without payload.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("invocation failed: {0}")]
    Invocation(String),
    #[error("remote call rejected")]
    Rejected,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::Malformed(_) => ErrorCode::Malformed,
            BridgeError::Transport(_) => ErrorCode::Transport,
            BridgeError::UnknownFunction(_) => ErrorCode::UnknownFunction,
            BridgeError::Invocation(_) => ErrorCode::Invocation,
            BridgeError::Rejected => ErrorCode::Rejected,
            BridgeError::Config(_) => ErrorCode::Config,
            BridgeError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            BridgeError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Malformed(e.to_string())
    }
}
