//! Simulated device
//!
//! Answers each frame the way a cooperative switch box would, so a full
//! session can run without hardware.

use std::collections::HashSet;

use bytes::Bytes;

use super::{Channel, ChannelError};
use crate::protocol::{
    Operation, FIXED_FRAME_LEN, FRAME_SIGNATURE, HANDSHAKE_ACK, HANDSHAKE_PROBE,
    MODE_SWITCH_COMMAND_ID, STATUS_SUCCESS, TAG_LEN,
};

/// Status returned for refused or unrecognised frames
pub const REJECT_STATUS: u8 = 0xFF;

/// In-process stand-in for the switch box
#[derive(Debug, Default)]
pub struct LoopbackDevice {
    rejected_tags: HashSet<[u8; TAG_LEN]>,
    pending: Option<Bytes>,
    frames_seen: usize,
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the tagged frame of `operation` with [`REJECT_STATUS`].
    ///
    /// Operations sharing a tag are refused together.
    pub fn reject(mut self, operation: Operation) -> Self {
        if let Some(tag) = operation.tag() {
            self.rejected_tags.insert(tag);
        }
        self
    }

    /// Number of frames received so far
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    fn answer(&self, frame: &[u8]) -> Vec<u8> {
        if frame == &HANDSHAKE_PROBE[..] {
            return HANDSHAKE_ACK.to_vec();
        }

        if frame.len() == FIXED_FRAME_LEN && frame[..4] == FRAME_SIGNATURE {
            let tag = &frame[4..4 + TAG_LEN];
            let refused = self.rejected_tags.iter().any(|t| &t[..] == tag);
            return vec![if refused { REJECT_STATUS } else { STATUS_SUCCESS }];
        }

        match frame {
            [MODE_SWITCH_COMMAND_ID, len, target @ ..] if *len as usize == target.len() => {
                vec![MODE_SWITCH_COMMAND_ID, STATUS_SUCCESS]
            }
            _ => vec![REJECT_STATUS],
        }
    }
}

impl Channel for LoopbackDevice {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        self.frames_seen += 1;
        self.pending = Some(Bytes::from(self.answer(bytes)));
        Ok(bytes.len())
    }

    fn receive(&mut self, max_len: usize) -> Result<Bytes, ChannelError> {
        match self.pending.take() {
            Some(mut response) => {
                response.truncate(max_len);
                Ok(response)
            }
            None => Err(ChannelError::Timeout),
        }
    }
}
