//! Protocol codec
//!
//! Encoding of command frames and validation of device responses.
//! Nothing here performs I/O.
//!
//! ## Wire Format
//!
//! ### Handshake
//! ```text
//! ┌─────────────────────┐        ┌─────────────────────┐
//! │ 55 AA 5A A5  (out)  │   ->   │ AA 55 A5 5A  (in)   │
//! └─────────────────────┘        └─────────────────────┘
//! ```
//!
//! ### Fixed Command Frame (31 bytes)
//! ```text
//! ┌──────────────┬──────────┬──────────┬──────────┬──────────┬──────────┐
//! │ "USBC" (4)   │ Tag (8)  │ Rsvd (3) │ 0x11 (1) │ 0x06 (1) │ Rsvd(14) │
//! └──────────────┴──────────┴──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! ### Targeted Modem Switch
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ 0x01 (1) │ Len (1)  │   Target device (Len bytes) │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Responses
//! - handshake: exactly `AA 55 A5 5A`
//! - fixed frames: byte 0 == 0x00
//! - targeted modem switch: byte 0 == 0x01, byte 1 == 0x00

use crate::error::{Result, SwitchError};
use super::{CommandFrame, Operation, ResponseRule, MAX_COMMAND_LEN};

/// Probe sent to open a session
pub const HANDSHAKE_PROBE: [u8; 4] = [0x55, 0xAA, 0x5A, 0xA5];

/// Acknowledgment expected back from the probe
pub const HANDSHAKE_ACK: [u8; 4] = [0xAA, 0x55, 0xA5, 0x5A];

/// Frame family signature ("USBC")
pub const FRAME_SIGNATURE: [u8; 4] = [0x55, 0x53, 0x42, 0x43];

/// Total length of a fixed command frame
pub const FIXED_FRAME_LEN: usize = 31;

/// Offset and value of the marker byte in a fixed frame
pub const MARKER_OFFSET: usize = 15;
pub const MARKER_VALUE: u8 = 0x11;

/// Offset and value of the length byte in a fixed frame
pub const LENGTH_OFFSET: usize = 16;
pub const LENGTH_VALUE: u8 = 0x06;

/// Command identifier of the targeted modem switch
pub const MODE_SWITCH_COMMAND_ID: u8 = 0x01;

/// Status byte meaning "accepted"
pub const STATUS_SUCCESS: u8 = 0x00;

/// Longest target-device argument (it is length-prefixed by one byte)
pub const MAX_ARGUMENT_LEN: usize = MAX_COMMAND_LEN - 2;

// =============================================================================
// Encoding
// =============================================================================

/// Encode an operation into a command frame
///
/// `argument` is only meaningful for [`Operation::SwitchToModemMode`]:
/// when present the targeted (string-argument) form is produced,
/// otherwise the fixed tagged frame.
pub fn encode(operation: Operation, argument: Option<&[u8]>) -> Result<CommandFrame> {
    match (operation, argument) {
        (Operation::Handshake, None) => {
            let mut frame = CommandFrame::new(operation, ResponseRule::HandshakeAck);
            frame.push(&HANDSHAKE_PROBE);
            Ok(frame)
        }
        (Operation::SwitchToModemMode, Some(target)) => encode_targeted_switch(target),
        (_, None) => encode_fixed(operation),
        (_, Some(_)) => Err(SwitchError::InvalidArgument(format!(
            "{} does not take an argument",
            operation
        ))),
    }
}

/// Fixed 31-byte tagged frame
fn encode_fixed(operation: Operation) -> Result<CommandFrame> {
    let tag = operation.tag().ok_or_else(|| {
        SwitchError::InvalidArgument(format!("{} has no tagged frame", operation))
    })?;

    let mut frame = CommandFrame::new(operation, ResponseRule::StatusByte);
    frame.push(&FRAME_SIGNATURE);
    frame.push(&tag);
    frame.pad_to(FIXED_FRAME_LEN);
    frame.set(MARKER_OFFSET, MARKER_VALUE);
    frame.set(LENGTH_OFFSET, LENGTH_VALUE);
    Ok(frame)
}

/// Command id + length byte + raw target bytes
fn encode_targeted_switch(target: &[u8]) -> Result<CommandFrame> {
    if target.len() > MAX_ARGUMENT_LEN {
        return Err(SwitchError::InvalidArgument(format!(
            "target device is {} bytes (max {})",
            target.len(),
            MAX_ARGUMENT_LEN
        )));
    }

    let mut frame = CommandFrame::new(
        Operation::SwitchToModemMode,
        ResponseRule::EchoedStatus {
            command_id: MODE_SWITCH_COMMAND_ID,
        },
    );
    frame.push(&[MODE_SWITCH_COMMAND_ID, target.len() as u8]);
    frame.push(target);
    Ok(frame)
}

// =============================================================================
// Validation
// =============================================================================

/// Validate a response to the fixed form of `operation`
pub fn decode_and_validate(operation: Operation, response: &[u8]) -> Result<()> {
    let rule = match operation {
        Operation::Handshake => ResponseRule::HandshakeAck,
        _ => ResponseRule::StatusByte,
    };
    validate_rule(operation, rule, response)
}

/// Validate a response against the rule of the frame that produced it
pub fn validate(frame: &CommandFrame, response: &[u8]) -> Result<()> {
    validate_rule(frame.operation(), frame.response_rule(), response)
}

fn validate_rule(operation: Operation, rule: ResponseRule, response: &[u8]) -> Result<()> {
    match rule {
        ResponseRule::HandshakeAck => {
            if response == &HANDSHAKE_ACK[..] {
                Ok(())
            } else {
                Err(SwitchError::ProtocolMismatch {
                    received: response.to_vec(),
                })
            }
        }
        ResponseRule::StatusByte => match response.first() {
            Some(&STATUS_SUCCESS) => Ok(()),
            status => Err(SwitchError::DeviceRejected {
                operation,
                status: status.copied(),
            }),
        },
        ResponseRule::EchoedStatus { command_id } => match response {
            [id, STATUS_SUCCESS, ..] if *id == command_id => Ok(()),
            [id, status, ..] if *id == command_id => Err(SwitchError::DeviceRejected {
                operation,
                status: Some(*status),
            }),
            _ => Err(SwitchError::DeviceRejected {
                operation,
                status: None,
            }),
        },
    }
}

/// The canonical success response for a rule
pub fn success_response(rule: ResponseRule) -> &'static [u8] {
    match rule {
        ResponseRule::HandshakeAck => &HANDSHAKE_ACK,
        ResponseRule::StatusByte => &[STATUS_SUCCESS],
        ResponseRule::EchoedStatus { .. } => &[MODE_SWITCH_COMMAND_ID, STATUS_SUCCESS],
    }
}
