//! Operation definitions
//!
//! The closed set of requests the switch box understands, and the tag
//! table that identifies each one on the wire.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SwitchError;

/// Length of the opcode/tag field inside a fixed command frame
pub const TAG_LEN: usize = 8;

/// Operations understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Handshake,
    SwitchToModemMode,
    SwitchToNormalMode,
    Cass,
    ChangeUdid,
    DisableSecureBoot,
    SecurityControlStatus,
    FlashFrp,
}

impl Operation {
    /// Every operation, in CLI mode-number order after the handshake
    pub const ALL: [Operation; 8] = [
        Operation::Handshake,
        Operation::SwitchToModemMode,
        Operation::SwitchToNormalMode,
        Operation::Cass,
        Operation::ChangeUdid,
        Operation::DisableSecureBoot,
        Operation::SecurityControlStatus,
        Operation::FlashFrp,
    ];

    /// The auxiliary operations, in the order a full batch issues them
    pub const AUXILIARY: [Operation; 5] = [
        Operation::Cass,
        Operation::ChangeUdid,
        Operation::DisableSecureBoot,
        Operation::SecurityControlStatus,
        Operation::FlashFrp,
    ];

    /// The 8-byte tag carried by this operation's fixed frame.
    ///
    /// `Cass` and `FlashFrp` share a tag. The handshake has no tag.
    pub fn tag(self) -> Option<[u8; TAG_LEN]> {
        let prefix: [u8; 4] = match self {
            Operation::Handshake => return None,
            Operation::SwitchToModemMode => [0x12, 0x34, 0x56, 0x78],
            Operation::SwitchToNormalMode => [0x87, 0x65, 0x43, 0x21],
            Operation::Cass | Operation::FlashFrp => [0xA1, 0xB2, 0xC3, 0xD4],
            Operation::ChangeUdid => [0xE5, 0xF6, 0x07, 0x18],
            Operation::DisableSecureBoot => [0x29, 0x3A, 0x4B, 0x5C],
            Operation::SecurityControlStatus => [0x6D, 0x7E, 0x8F, 0x90],
        };
        let mut tag = [0u8; TAG_LEN];
        tag[..4].copy_from_slice(&prefix);
        Some(tag)
    }

    /// Mode switches move the session from `HandshakeOk` to `ModeSwitched`
    pub fn is_mode_switch(self) -> bool {
        matches!(
            self,
            Operation::SwitchToModemMode | Operation::SwitchToNormalMode
        )
    }

    /// Auxiliary operations are only valid once the mode has been switched
    pub fn is_auxiliary(self) -> bool {
        !self.is_mode_switch() && self != Operation::Handshake
    }

    /// CLI mode number (0 modem ... 6 flash FRP); the handshake has none
    pub fn mode_number(self) -> Option<u8> {
        match self {
            Operation::Handshake => None,
            Operation::SwitchToModemMode => Some(0),
            Operation::SwitchToNormalMode => Some(1),
            Operation::Cass => Some(2),
            Operation::ChangeUdid => Some(3),
            Operation::DisableSecureBoot => Some(4),
            Operation::SecurityControlStatus => Some(5),
            Operation::FlashFrp => Some(6),
        }
    }

    /// Inverse of [`Operation::mode_number`]
    pub fn from_mode_number(number: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mode_number() == Some(number))
    }

    /// Short kebab-case name used on the command line
    pub fn cli_name(self) -> &'static str {
        match self {
            Operation::Handshake => "handshake",
            Operation::SwitchToModemMode => "modem",
            Operation::SwitchToNormalMode => "normal",
            Operation::Cass => "cass",
            Operation::ChangeUdid => "change-udid",
            Operation::DisableSecureBoot => "disable-secure-boot",
            Operation::SecurityControlStatus => "sec-ctrl-status",
            Operation::FlashFrp => "flash-frp",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Handshake => "Handshake",
            Operation::SwitchToModemMode => "Modem mode",
            Operation::SwitchToNormalMode => "Normal mode",
            Operation::Cass => "CASS",
            Operation::ChangeUdid => "Change UDID",
            Operation::DisableSecureBoot => "Disable secure boot",
            Operation::SecurityControlStatus => "Security control status",
            Operation::FlashFrp => "Flash FRP",
        };
        f.write_str(label)
    }
}

impl FromStr for Operation {
    type Err = SwitchError;

    /// Accepts a CLI name (`change-udid`) or a mode number (`3`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return Self::from_mode_number(number).ok_or_else(|| {
                SwitchError::Config(format!("Unknown mode number: {}", number))
            });
        }
        let lowered = trimmed.to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|op| op.cli_name() == lowered)
            .ok_or_else(|| SwitchError::Config(format!("Unknown operation: {}", trimmed)))
    }
}
