//! Codec Tests
//!
//! Tests for command frame encoding and response validation.

use modeswitch::protocol::{
    decode_and_validate, encode, success_response, validate, Operation, ResponseRule,
    FIXED_FRAME_LEN, FRAME_SIGNATURE, HANDSHAKE_ACK, HANDSHAKE_PROBE, LENGTH_OFFSET,
    LENGTH_VALUE, MARKER_OFFSET, MARKER_VALUE, MAX_ARGUMENT_LEN, MAX_TRANSFER_LEN,
};
use modeswitch::{FailureKind, SwitchError};

// =============================================================================
// Handshake Encoding
// =============================================================================

#[test]
fn test_encode_handshake() {
    let frame = encode(Operation::Handshake, None).unwrap();

    assert_eq!(frame.as_bytes(), &[0x55, 0xAA, 0x5A, 0xA5]);
    assert_eq!(frame.as_bytes(), &HANDSHAKE_PROBE);
    assert_eq!(frame.operation(), Operation::Handshake);
    assert_eq!(frame.response_rule(), ResponseRule::HandshakeAck);
}

#[test]
fn test_encode_handshake_rejects_argument() {
    let result = encode(Operation::Handshake, Some(b"SM-G960F".as_slice()));

    assert!(matches!(result, Err(SwitchError::InvalidArgument(_))));
}

// =============================================================================
// Fixed Frame Encoding
// =============================================================================

#[test]
fn test_encode_modem_mode_fixed_frame() {
    let frame = encode(Operation::SwitchToModemMode, None).unwrap();

    let expected: [u8; 31] = [
        0x55, 0x53, 0x42, 0x43, 0x12, 0x34, 0x56, 0x78, //
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, //
        0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    assert_eq!(frame.as_bytes(), &expected);
    assert_eq!(frame.response_rule(), ResponseRule::StatusByte);
}

#[test]
fn test_encode_fixed_frame_layout_for_every_tagged_operation() {
    for op in Operation::ALL.into_iter().filter(|op| *op != Operation::Handshake) {
        let frame = encode(op, None).unwrap();
        let bytes = frame.as_bytes();
        let tag = op.tag().unwrap();

        assert_eq!(bytes.len(), FIXED_FRAME_LEN, "{op}");
        assert_eq!(&bytes[..4], &FRAME_SIGNATURE, "{op}");
        assert_eq!(&bytes[4..12], &tag, "{op}");
        assert_eq!(bytes[MARKER_OFFSET], MARKER_VALUE, "{op}");
        assert_eq!(bytes[LENGTH_OFFSET], LENGTH_VALUE, "{op}");

        for (offset, byte) in bytes.iter().enumerate().skip(12) {
            if offset != MARKER_OFFSET && offset != LENGTH_OFFSET {
                assert_eq!(*byte, 0, "{op} offset {offset}");
            }
        }
    }
}

#[test]
fn test_encode_operation_tags() {
    let cases: [(Operation, [u8; 4]); 6] = [
        (Operation::SwitchToNormalMode, [0x87, 0x65, 0x43, 0x21]),
        (Operation::Cass, [0xA1, 0xB2, 0xC3, 0xD4]),
        (Operation::ChangeUdid, [0xE5, 0xF6, 0x07, 0x18]),
        (Operation::DisableSecureBoot, [0x29, 0x3A, 0x4B, 0x5C]),
        (Operation::SecurityControlStatus, [0x6D, 0x7E, 0x8F, 0x90]),
        (Operation::FlashFrp, [0xA1, 0xB2, 0xC3, 0xD4]),
    ];

    for (op, prefix) in cases {
        let frame = encode(op, None).unwrap();
        assert_eq!(&frame.as_bytes()[4..8], &prefix, "{op}");
    }
}

#[test]
fn test_cass_and_flash_frp_share_wire_bytes() {
    let cass = encode(Operation::Cass, None).unwrap();
    let frp = encode(Operation::FlashFrp, None).unwrap();

    assert_eq!(cass.as_bytes(), frp.as_bytes());
    assert_ne!(cass.operation(), frp.operation());
}

#[test]
fn test_encode_auxiliary_rejects_argument() {
    let result = encode(Operation::ChangeUdid, Some(b"abc".as_slice()));

    assert!(matches!(result, Err(SwitchError::InvalidArgument(_))));
}

#[test]
fn test_encode_normal_mode_rejects_argument() {
    let result = encode(Operation::SwitchToNormalMode, Some(b"abc".as_slice()));

    assert!(matches!(result, Err(SwitchError::InvalidArgument(_))));
}

// =============================================================================
// Targeted Modem Switch Encoding
// =============================================================================

#[test]
fn test_encode_targeted_modem_switch() {
    let frame = encode(Operation::SwitchToModemMode, Some(b"SM-G960F".as_slice())).unwrap();

    let mut expected = vec![0x01, 8];
    expected.extend_from_slice(b"SM-G960F");
    assert_eq!(frame.as_bytes(), expected.as_slice());
    assert_eq!(
        frame.response_rule(),
        ResponseRule::EchoedStatus { command_id: 0x01 }
    );
}

#[test]
fn test_encode_targeted_accepts_255_bytes() {
    let target = vec![b'x'; MAX_ARGUMENT_LEN];
    let frame = encode(Operation::SwitchToModemMode, Some(target.as_slice())).unwrap();

    assert_eq!(MAX_ARGUMENT_LEN, 255);
    assert_eq!(frame.len(), 257);
    assert_eq!(frame.as_bytes()[1], 255);
    assert!(frame.len() <= MAX_TRANSFER_LEN);
}

#[test]
fn test_encode_targeted_rejects_256_bytes() {
    let target = vec![b'x'; 256];
    let err = encode(Operation::SwitchToModemMode, Some(target.as_slice())).unwrap_err();

    assert_eq!(err.kind(), FailureKind::InvalidArgument);
}

#[test]
fn test_encode_targeted_empty_target() {
    // A zero length byte still fits the layout
    let frame = encode(Operation::SwitchToModemMode, Some(b"".as_slice())).unwrap();

    assert_eq!(frame.as_bytes(), &[0x01, 0x00]);
    assert_eq!(
        frame.response_rule(),
        ResponseRule::EchoedStatus { command_id: 0x01 }
    );
}

// =============================================================================
// Round Trip Against Canonical Success
// =============================================================================

#[test]
fn test_every_operation_accepts_its_canonical_success() {
    for op in Operation::ALL {
        let frame = encode(op, None).unwrap();
        let response = success_response(frame.response_rule());

        assert!(validate(&frame, response).is_ok(), "{op}");
        assert!(decode_and_validate(op, response).is_ok(), "{op}");
    }

    let targeted = encode(Operation::SwitchToModemMode, Some(b"dev".as_slice())).unwrap();
    assert!(validate(&targeted, success_response(targeted.response_rule())).is_ok());
}

// =============================================================================
// Handshake Validation
// =============================================================================

#[test]
fn test_handshake_accepts_exact_ack() {
    assert!(decode_and_validate(Operation::Handshake, &HANDSHAKE_ACK).is_ok());
}

#[test]
fn test_handshake_rejects_every_other_length() {
    for len in (0..=16).filter(|len| *len != 4) {
        // Prefix-matching content must still be rejected
        let response: Vec<u8> = HANDSHAKE_ACK.iter().copied().cycle().take(len).collect();
        let err = decode_and_validate(Operation::Handshake, &response).unwrap_err();

        assert_eq!(err.kind(), FailureKind::ProtocolMismatch, "len {len}");
    }
}

#[test]
fn test_handshake_rejects_any_single_byte_change() {
    for position in 0..4 {
        for value in 0..=255u8 {
            let mut response = HANDSHAKE_ACK;
            if response[position] == value {
                continue;
            }
            response[position] = value;

            let err = decode_and_validate(Operation::Handshake, &response).unwrap_err();
            match err {
                SwitchError::ProtocolMismatch { received } => assert_eq!(received, response),
                other => panic!("Expected ProtocolMismatch, got {other:?}"),
            }
        }
    }
}

#[test]
fn test_handshake_rejects_probe_echo() {
    let err = decode_and_validate(Operation::Handshake, &HANDSHAKE_PROBE).unwrap_err();

    assert_eq!(err.kind(), FailureKind::ProtocolMismatch);
}

// =============================================================================
// Status Byte Validation
// =============================================================================

#[test]
fn test_status_accepts_zero_with_trailing_bytes() {
    assert!(decode_and_validate(Operation::Cass, &[0x00]).is_ok());
    assert!(decode_and_validate(Operation::Cass, &[0x00, 0xFF, 0x12]).is_ok());
}

#[test]
fn test_status_rejects_empty_response() {
    let err = decode_and_validate(Operation::ChangeUdid, &[]).unwrap_err();

    assert_eq!(
        err,
        SwitchError::DeviceRejected {
            operation: Operation::ChangeUdid,
            status: None,
        }
    );
}

#[test]
fn test_status_rejects_every_nonzero_status() {
    for op in Operation::ALL.into_iter().filter(|op| *op != Operation::Handshake) {
        for status in 1..=255u8 {
            let err = decode_and_validate(op, &[status, 0x00]).unwrap_err();
            assert_eq!(
                err,
                SwitchError::DeviceRejected {
                    operation: op,
                    status: Some(status),
                }
            );
        }
    }
}

// =============================================================================
// Echoed Status Validation
// =============================================================================

#[test]
fn test_targeted_switch_validation() {
    let frame = encode(Operation::SwitchToModemMode, Some(b"dev".as_slice())).unwrap();

    assert!(validate(&frame, &[0x01, 0x00]).is_ok());
    assert!(validate(&frame, &[0x01, 0x00, 0x7F]).is_ok());

    let rejected = validate(&frame, &[0x01, 0x05]).unwrap_err();
    assert!(matches!(
        rejected,
        SwitchError::DeviceRejected { status: Some(0x05), .. }
    ));

    for malformed in [&[][..], &[0x01][..], &[0x00][..], &[0x02, 0x00][..]] {
        let err = validate(&frame, malformed).unwrap_err();
        assert!(
            matches!(err, SwitchError::DeviceRejected { status: None, .. }),
            "{malformed:?}"
        );
    }
}

#[test]
fn test_fixed_modem_frame_uses_single_status_byte() {
    let frame = encode(Operation::SwitchToModemMode, None).unwrap();

    // A lone 0x00 is enough for the fixed form but not the targeted one
    assert!(validate(&frame, &[0x00]).is_ok());
}
