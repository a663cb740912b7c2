//! Frame definitions
//!
//! Command frames live in a fixed inline buffer so encoding never
//! touches the heap.

use std::fmt;

use super::Operation;

/// Largest command frame: command id + length byte + 255 argument bytes
pub const MAX_COMMAND_LEN: usize = 2 + 255;

/// Largest single bulk transfer in either direction
pub const MAX_TRANSFER_LEN: usize = 4096;

/// How the response to a frame is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRule {
    /// Exactly the 4-byte handshake acknowledgment
    HandshakeAck,

    /// At least one byte; byte 0 is the status
    StatusByte,

    /// At least two bytes; byte 0 echoes the command id, byte 1 is the status
    EchoedStatus { command_id: u8 },
}

/// An encoded request, ready to hand to a channel
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    operation: Operation,
    rule: ResponseRule,
    len: usize,
    buf: [u8; MAX_COMMAND_LEN],
}

impl CommandFrame {
    /// Empty frame for an operation
    pub(crate) fn new(operation: Operation, rule: ResponseRule) -> Self {
        Self {
            operation,
            rule,
            len: 0,
            buf: [0u8; MAX_COMMAND_LEN],
        }
    }

    /// Append bytes; callers size-check against MAX_COMMAND_LEN first
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        debug_assert!(end <= MAX_COMMAND_LEN);
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Append zero bytes up to `len` total
    pub(crate) fn pad_to(&mut self, len: usize) {
        debug_assert!(len <= MAX_COMMAND_LEN);
        if len > self.len {
            self.buf[self.len..len].fill(0);
            self.len = len;
        }
    }

    /// Overwrite a byte inside the already-written region
    pub(crate) fn set(&mut self, offset: usize, value: u8) {
        debug_assert!(offset < self.len);
        self.buf[offset] = value;
    }

    /// Operation this frame requests
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Validation rule for the device's answer
    pub fn response_rule(&self) -> ResponseRule {
        self.rule
    }

    /// Wire bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("operation", &self.operation)
            .field("rule", &self.rule)
            .field("bytes", &format_args!("{:02X?}", self.as_bytes()))
            .finish()
    }
}
