//! Error types for modeswitch
//!
//! Provides a unified error type for all operations, plus the coarse
//! [`FailureKind`] classification used by session state and exit codes.

use serde::Serialize;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::diagnostics::hex_line;
use crate::protocol::Operation;
use crate::session::SessionState;

/// Result type alias using SwitchError
pub type Result<T> = std::result::Result<T, SwitchError>;

/// Unified error type for modeswitch operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    // -------------------------------------------------------------------------
    // Channel Errors
    // -------------------------------------------------------------------------
    /// The channel could not be opened or claimed, or the device went away.
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(ChannelError),

    /// Every attempt of a single exchange failed at the transport level.
    #[error("Channel exhausted after {attempts} attempt(s): {last}")]
    ChannelExhausted { attempts: u32, last: ChannelError },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The handshake acknowledgment did not match.
    #[error("Protocol mismatch: unexpected handshake response {}", hex(.received))]
    ProtocolMismatch { received: Vec<u8> },

    /// A well-formed exchange where the device refused the operation.
    #[error("Device rejected {operation}: {}", describe_status(.status))]
    DeviceRejected {
        operation: Operation,
        status: Option<u8>,
    },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: Operation,
        state: SessionState,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SwitchError {
    /// Classify this error into its failure category
    pub fn kind(&self) -> FailureKind {
        match self {
            SwitchError::ChannelUnavailable(_) => FailureKind::ChannelUnavailable,
            SwitchError::ChannelExhausted { .. } => FailureKind::ChannelExhausted,
            SwitchError::ProtocolMismatch { .. } => FailureKind::ProtocolMismatch,
            SwitchError::DeviceRejected { .. } => FailureKind::DeviceRejected,
            SwitchError::InvalidArgument(_) => FailureKind::InvalidArgument,
            SwitchError::InvalidState { .. } => FailureKind::InvalidState,
            SwitchError::Config(_) => FailureKind::Config,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

/// Coarse failure category
///
/// Lets callers tell "device unreachable" apart from "device refused"
/// without matching on error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ChannelUnavailable,
    ChannelExhausted,
    ProtocolMismatch,
    DeviceRejected,
    InvalidArgument,
    InvalidState,
    Config,
}

impl FailureKind {
    /// Distinct non-zero exit code per category.
    ///
    /// Starts at 10 so it never collides with clap's usage error (2).
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::Config => 1,
            FailureKind::ChannelUnavailable => 10,
            FailureKind::ChannelExhausted => 11,
            FailureKind::ProtocolMismatch => 12,
            FailureKind::DeviceRejected => 13,
            FailureKind::InvalidArgument => 14,
            FailureKind::InvalidState => 15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ChannelUnavailable => "channel_unavailable",
            FailureKind::ChannelExhausted => "channel_exhausted",
            FailureKind::ProtocolMismatch => "protocol_mismatch",
            FailureKind::DeviceRejected => "device_rejected",
            FailureKind::InvalidArgument => "invalid_argument",
            FailureKind::InvalidState => "invalid_state",
            FailureKind::Config => "config",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }
    hex_line(bytes)
}

fn describe_status(status: &Option<u8>) -> String {
    match status {
        Some(byte) => format!("status 0x{:02X}", byte),
        None => "short or malformed response".to_string(),
    }
}
