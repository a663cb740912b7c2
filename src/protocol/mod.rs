//! Protocol Module
//!
//! Defines the request/response protocol spoken to the switch box.
//!
//! ## Exchanges
//! Every exchange is one command frame out followed by one response in.
//!
//! ### Operations
//! | Operation               | Frame              | Tag           |
//! |-------------------------|--------------------|---------------|
//! | Handshake               | `55 AA 5A A5`      | -             |
//! | Modem mode (fixed)      | 31-byte "USBC"     | `12 34 56 78` |
//! | Modem mode (targeted)   | `01 len target..`  | -             |
//! | Normal mode             | 31-byte "USBC"     | `87 65 43 21` |
//! | CASS / Flash FRP        | 31-byte "USBC"     | `A1 B2 C3 D4` |
//! | Change UDID             | 31-byte "USBC"     | `E5 F6 07 18` |
//! | Disable secure boot     | 31-byte "USBC"     | `29 3A 4B 5C` |
//! | Security control status | 31-byte "USBC"     | `6D 7E 8F 90` |
//!
//! ### Status
//! - 0x00: accepted
//! - anything else: rejected

mod operation;
mod frame;
mod codec;

pub use operation::{Operation, TAG_LEN};
pub use frame::{CommandFrame, ResponseRule, MAX_COMMAND_LEN, MAX_TRANSFER_LEN};
pub use codec::{
    decode_and_validate, encode, success_response, validate, FIXED_FRAME_LEN, FRAME_SIGNATURE,
    HANDSHAKE_ACK, HANDSHAKE_PROBE, LENGTH_OFFSET, LENGTH_VALUE, MARKER_OFFSET, MARKER_VALUE,
    MAX_ARGUMENT_LEN, MODE_SWITCH_COMMAND_ID, STATUS_SUCCESS,
};
