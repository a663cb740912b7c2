//! Diagnostics Module
//!
//! Structured trace of every attempted exchange.
//!
//! The session reports each send and receive attempt to a
//! [`DiagnosticsSink`]. Sinks only observe; nothing they do feeds back
//! into control flow.

use std::fmt;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::channel::ChannelErrorKind;
use crate::error::FailureKind;
use crate::protocol::Operation;

/// Bytes per hex dump line
const HEX_DUMP_WIDTH: usize = 16;

/// Direction of a transfer relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => f.write_str("out"),
            Direction::In => f.write_str("in"),
        }
    }
}

/// What became of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Transferred (and, for responses, validated)
    Ok,

    /// The channel call itself failed
    ChannelError(ChannelErrorKind),

    /// A response arrived but failed validation
    Invalid(FailureKind),
}

/// One send or receive attempt
#[derive(Debug, Clone)]
pub struct ExchangeEvent<'a> {
    pub timestamp: SystemTime,
    pub direction: Direction,
    pub operation: Operation,
    /// 1-based attempt number within the exchange
    pub attempt: u32,
    pub byte_length: usize,
    /// Wire bytes (empty when the transfer failed)
    pub bytes: &'a [u8],
    pub outcome: EventOutcome,
}

impl ExchangeEvent<'_> {
    /// Detach from the borrowed buffer
    pub fn to_owned_event(&self) -> RecordedEvent {
        RecordedEvent {
            timestamp: self.timestamp,
            direction: self.direction,
            operation: self.operation,
            attempt: self.attempt,
            byte_length: self.byte_length,
            bytes: self.bytes.to_vec(),
            outcome: self.outcome,
        }
    }
}

/// Owned copy of an [`ExchangeEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub timestamp: SystemTime,
    pub direction: Direction,
    pub operation: Operation,
    pub attempt: u32,
    pub byte_length: usize,
    pub bytes: Vec<u8>,
    pub outcome: EventOutcome,
}

/// Receiver of exchange events
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: &ExchangeEvent<'_>);
}

// =============================================================================
// Sinks
// =============================================================================

/// Forwards events to `tracing`; hex dumps go out at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: &ExchangeEvent<'_>) {
        let verb = match event.direction {
            Direction::Out => "Sent",
            Direction::In => "Received",
        };

        match event.outcome {
            EventOutcome::Ok => debug!(
                direction = %event.direction,
                operation = %event.operation,
                attempt = event.attempt,
                "{} {} bytes",
                verb,
                event.byte_length
            ),
            EventOutcome::ChannelError(kind) => warn!(
                direction = %event.direction,
                operation = %event.operation,
                attempt = event.attempt,
                "Transfer failed: {:?}",
                kind
            ),
            EventOutcome::Invalid(kind) => warn!(
                direction = %event.direction,
                operation = %event.operation,
                attempt = event.attempt,
                "{} {} bytes, response invalid: {}",
                verb,
                event.byte_length,
                kind
            ),
        }

        if !event.bytes.is_empty() {
            trace!("\n{}", hex_dump(event.bytes));
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record(&self, _event: &ExchangeEvent<'_>) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Events for one direction only
    pub fn by_direction(&self, direction: Direction) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.direction == direction)
            .cloned()
            .collect()
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, event: &ExchangeEvent<'_>) {
        self.events.lock().push(event.to_owned_event());
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Uppercase hex, 16 bytes per line, no trailing newline
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(HEX_DUMP_WIDTH)
        .map(hex_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Uppercase hex bytes separated by single spaces, on one line
pub fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
