//! Channel Module
//!
//! The bidirectional bulk byte channel a session talks through.
//!
//! ## Implementations
//! - `UsbChannel`: nusb bulk OUT/IN endpoint pair (feature `usb`)
//! - `MockChannel`: scripted results, counts every call
//! - `LoopbackDevice`: in-process device that answers like a cooperative box
//!
//! A channel is owned by exactly one session. Dropping it releases the
//! underlying device.

mod mock;
mod loopback;
#[cfg(feature = "usb")]
mod usb;

pub use mock::MockChannel;
pub use loopback::{LoopbackDevice, REJECT_STATUS};
#[cfg(feature = "usb")]
pub use usb::UsbChannel;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("device not found: {0}")]
    NotFound(String),

    #[error("permission denied or interface claim failed: {0}")]
    PermissionOrClaimFailure(String),

    #[error("transfer error: {0}")]
    TransferError(String),

    #[error("transfer timed out")]
    Timeout,

    #[error("channel closed")]
    Closed,
}

/// Classification of a [`ChannelError`] without its detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorKind {
    NotFound,
    PermissionOrClaimFailure,
    TransferError,
    Timeout,
    Closed,
}

impl ChannelError {
    /// Transfer errors and timeouts may succeed on another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::TransferError(_) | ChannelError::Timeout)
    }

    pub fn kind(&self) -> ChannelErrorKind {
        match self {
            ChannelError::NotFound(_) => ChannelErrorKind::NotFound,
            ChannelError::PermissionOrClaimFailure(_) => ChannelErrorKind::PermissionOrClaimFailure,
            ChannelError::TransferError(_) => ChannelErrorKind::TransferError,
            ChannelError::Timeout => ChannelErrorKind::Timeout,
            ChannelError::Closed => ChannelErrorKind::Closed,
        }
    }
}

/// A blocking OUT/IN byte channel with a fixed per-call timeout
pub trait Channel {
    /// Write one frame; returns the number of bytes written
    fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError>;

    /// Read one response of at most `max_len` bytes
    fn receive(&mut self, max_len: usize) -> Result<Bytes, ChannelError>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, max_len: usize) -> Result<Bytes, ChannelError> {
        (**self).receive(max_len)
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, max_len: usize) -> Result<Bytes, ChannelError> {
        (**self).receive(max_len)
    }
}
