//! Session Module
//!
//! The protocol state machine that drives one channel.
//!
//! ## Responsibilities
//! - Sequence handshake -> mode switch -> auxiliary operations
//! - One send followed by one receive per exchange, never pipelined
//! - Retry transport failures within one invocation, never across
//! - Map channel and codec errors onto a single failure taxonomy
//!
//! ## States
//! ```text
//!  Unopened ──handshake──► HandshakeOk ──switch_mode──► ModeSwitched ◄─┐
//!     │                        │                          │  run(op) ─┘
//!     └──────────┬─────────────┘                          │
//!                ▼                                        │
//!             Failed ◄──────── channel lost ──────────────┘
//! ```
//!
//! Once the mode switch has succeeded, auxiliary operations stay
//! available even after the channel was lost on an earlier one; the
//! `Failed` state is kept as the record of that loss.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelError};
use crate::config::{BatchPolicy, Config};
use crate::diagnostics::{DiagnosticsSink, Direction, EventOutcome, ExchangeEvent, TracingSink};
use crate::error::{FailureKind, Result, SwitchError};
use crate::protocol::{self, CommandFrame, Operation};

/// Where a session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unopened,
    HandshakeOk,
    ModeSwitched,
    /// Terminal; nothing more can be issued on this session
    Failed(FailureKind),
}

impl SessionState {
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unopened => f.write_str("Unopened"),
            SessionState::HandshakeOk => f.write_str("HandshakeOk"),
            SessionState::ModeSwitched => f.write_str("ModeSwitched"),
            SessionState::Failed(kind) => write!(f, "Failed({})", kind),
        }
    }
}

/// USB personality to switch the device into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Modem,
    Normal,
}

impl Mode {
    pub fn operation(self) -> Operation {
        match self {
            Mode::Modem => Operation::SwitchToModemMode,
            Mode::Normal => Operation::SwitchToNormalMode,
        }
    }

    /// The mode a mode-switch operation selects
    pub fn from_operation(operation: Operation) -> Option<Self> {
        match operation {
            Operation::SwitchToModemMode => Some(Mode::Modem),
            Operation::SwitchToNormalMode => Some(Mode::Normal),
            _ => None,
        }
    }
}

/// A completed, validated exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub operation: Operation,
    pub bytes_sent: usize,
    pub bytes_received: usize,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

impl Transfer {
    pub fn bytes_transferred(&self) -> usize {
        self.bytes_sent + self.bytes_received
    }
}

/// Outcome of one operation invocation, as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub operation: Operation,
    pub outcome: Result<Transfer>,
}

/// Result of [`Session::run_batch`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Operations that were issued, in order
    pub records: Vec<OperationRecord>,

    /// Operations never issued because the batch stopped early
    pub skipped: Vec<Operation>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.records.iter().all(|r| r.outcome.is_ok())
    }

    /// The first failure, if any
    pub fn first_error(&self) -> Option<&SwitchError> {
        self.records.iter().find_map(|r| r.outcome.as_ref().err())
    }
}

/// Protocol session bound to one exclusively owned channel
pub struct Session<C: Channel> {
    /// Transport; released when the session is dropped
    channel: C,

    config: Config,

    sink: Arc<dyn DiagnosticsSink>,

    state: SessionState,

    /// Set by a successful mode switch, never cleared
    mode_switched: bool,

    /// Every invocation, in order
    history: Vec<OperationRecord>,
}

impl<C: Channel> Session<C> {
    /// Create a session over an open channel
    pub fn new(channel: C, config: Config, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            channel,
            config,
            sink,
            state: SessionState::Unopened,
            mode_switched: false,
            history: Vec::new(),
        }
    }

    /// Create a session that logs exchanges through `tracing`
    pub fn with_tracing(channel: C, config: Config) -> Self {
        Self::new(channel, config, Arc::new(TracingSink))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &[OperationRecord] {
        &self.history
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// End the session and hand back the channel
    pub fn into_channel(self) -> C {
        self.channel
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Unopened -> HandshakeOk | Failed
    pub fn handshake(&mut self) -> Result<Transfer> {
        let operation = Operation::Handshake;
        info!("Performing handshake");

        let result = self.require(operation, SessionState::Unopened).and_then(|()| {
            let frame = protocol::encode(operation, None)?;
            let result = self.exchange(&frame);
            self.advance(&result, SessionState::HandshakeOk);
            result
        });

        if result.is_ok() {
            info!("Handshake successful");
        }
        self.finish(operation, result)
    }

    /// HandshakeOk -> ModeSwitched | Failed
    ///
    /// The modem switch uses the targeted frame when the config names a
    /// target device. An over-long target fails before any I/O and
    /// leaves the state untouched.
    pub fn switch_mode(&mut self, mode: Mode) -> Result<Transfer> {
        let operation = mode.operation();
        info!("Switching device to {}", operation);

        let result = self.require(operation, SessionState::HandshakeOk).and_then(|()| {
            let argument = match mode {
                Mode::Modem => self.config.target_device.as_deref().map(str::as_bytes),
                Mode::Normal => None,
            };
            let frame = protocol::encode(operation, argument)?;
            let result = self.exchange(&frame);
            self.advance(&result, SessionState::ModeSwitched);
            self.mode_switched = result.is_ok();
            result
        });

        if result.is_ok() {
            info!("Successfully switched to {}", operation);
        }
        self.finish(operation, result)
    }

    /// ModeSwitched -> ModeSwitched | Failed
    ///
    /// A device rejection is recorded and leaves the state alone. Losing
    /// the channel records `Failed`, but the caller may still issue the
    /// next auxiliary operation.
    pub fn run(&mut self, operation: Operation) -> Result<Transfer> {
        info!("Executing {}", operation);

        let result = if !operation.is_auxiliary() {
            Err(SwitchError::InvalidArgument(format!(
                "{} is not an auxiliary operation",
                operation
            )))
        } else {
            self.require_mode_switched(operation).and_then(|()| {
                let frame = protocol::encode(operation, None)?;
                let result = self.exchange(&frame);
                if let Err(e) = &result {
                    if matches!(
                        e.kind(),
                        FailureKind::ChannelUnavailable | FailureKind::ChannelExhausted
                    ) {
                        self.state = SessionState::Failed(e.kind());
                    }
                }
                result
            })
        };

        match &result {
            Ok(_) => info!("{} executed successfully", operation),
            Err(e) => warn!("{} failed: {}", operation, e),
        }
        self.finish(operation, result)
    }

    /// Run auxiliary operations in order under the configured batch policy
    ///
    /// `AbortOnError` stops at the first failure of any kind;
    /// `ContinueOnError` issues every operation.
    pub fn run_batch(&mut self, operations: &[Operation]) -> BatchOutcome {
        let policy = self.config.batch_policy;
        let mut outcome = BatchOutcome::default();

        for (index, &operation) in operations.iter().enumerate() {
            let result = self.run(operation);
            let failed = result.is_err();
            outcome.records.push(OperationRecord {
                operation,
                outcome: result,
            });

            if failed && policy == BatchPolicy::AbortOnError {
                outcome.skipped = operations[index + 1..].to_vec();
                if !outcome.skipped.is_empty() {
                    debug!("Batch stopped, skipping {} operation(s)", outcome.skipped.len());
                }
                break;
            }
        }

        outcome
    }

    // =========================================================================
    // Exchange + Retry
    // =========================================================================

    /// One request/response exchange with bounded retry
    ///
    /// Steps per attempt:
    /// 1. Send the frame
    /// 2. Receive up to `max_response_len` bytes
    /// 3. Validate against the frame's response rule
    ///
    /// Only transient channel errors are retried. Validation failures and
    /// non-transient channel errors end the exchange immediately.
    fn exchange(&mut self, frame: &CommandFrame) -> Result<Transfer> {
        let retry = self.config.retry;
        let max_attempts = retry.max_attempts();
        let mut last_error = ChannelError::Timeout;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                thread::sleep(retry.delay());
                info!(
                    "Retrying {} (attempt {}/{})",
                    frame.operation(),
                    attempt,
                    max_attempts
                );
            }

            match self.attempt(frame, attempt) {
                Ok(validated) => return validated,
                Err(e) if e.is_transient() => {
                    warn!(
                        "{} transfer failed (attempt {}/{}): {}",
                        frame.operation(),
                        attempt,
                        max_attempts,
                        e
                    );
                    last_error = e;
                }
                Err(e) => return Err(SwitchError::ChannelUnavailable(e)),
            }
        }

        Err(SwitchError::ChannelExhausted {
            attempts: max_attempts,
            last: last_error,
        })
    }

    /// A single attempt: outer error is the channel, inner is validation
    fn attempt(
        &mut self,
        frame: &CommandFrame,
        attempt: u32,
    ) -> std::result::Result<Result<Transfer>, ChannelError> {
        let operation = frame.operation();
        let bytes = frame.as_bytes();

        // Step 1: send
        let sent = match self.channel.send(bytes) {
            Ok(n) if n == bytes.len() => n,
            Ok(n) => {
                let error = ChannelError::TransferError(format!(
                    "short write: {} of {} bytes",
                    n,
                    bytes.len()
                ));
                self.emit(
                    Direction::Out,
                    operation,
                    attempt,
                    &bytes[..n.min(bytes.len())],
                    EventOutcome::ChannelError(error.kind()),
                );
                return Err(error);
            }
            Err(e) => {
                self.emit(
                    Direction::Out,
                    operation,
                    attempt,
                    &[],
                    EventOutcome::ChannelError(e.kind()),
                );
                return Err(e);
            }
        };
        self.emit(Direction::Out, operation, attempt, bytes, EventOutcome::Ok);

        // Step 2: receive
        let response = match self.channel.receive(self.config.max_response_len) {
            Ok(response) => response,
            Err(e) => {
                self.emit(
                    Direction::In,
                    operation,
                    attempt,
                    &[],
                    EventOutcome::ChannelError(e.kind()),
                );
                return Err(e);
            }
        };

        // Step 3: validate
        let verdict = protocol::validate(frame, &response);
        let outcome = match &verdict {
            Ok(()) => EventOutcome::Ok,
            Err(e) => EventOutcome::Invalid(e.kind()),
        };
        self.emit(Direction::In, operation, attempt, &response, outcome);

        Ok(verdict.map(|()| Transfer {
            operation,
            bytes_sent: sent,
            bytes_received: response.len(),
            attempts: attempt,
        }))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require(&self, operation: Operation, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SwitchError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Auxiliary operations need a completed mode switch
    fn require_mode_switched(&self, operation: Operation) -> Result<()> {
        if self.mode_switched {
            Ok(())
        } else {
            Err(SwitchError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Move to `next` on success, to `Failed` on any exchange error
    fn advance(&mut self, result: &Result<Transfer>, next: SessionState) {
        self.state = match result {
            Ok(_) => next,
            Err(e) => SessionState::Failed(e.kind()),
        };
    }

    fn finish(&mut self, operation: Operation, result: Result<Transfer>) -> Result<Transfer> {
        if let Err(e) = &result {
            debug!("{} -> {} (state {})", operation, e.kind(), self.state);
        }
        self.history.push(OperationRecord {
            operation,
            outcome: result.clone(),
        });
        result
    }

    fn emit(
        &self,
        direction: Direction,
        operation: Operation,
        attempt: u32,
        bytes: &[u8],
        outcome: EventOutcome,
    ) {
        self.sink.record(&ExchangeEvent {
            timestamp: SystemTime::now(),
            direction,
            operation,
            attempt,
            byte_length: bytes.len(),
            bytes,
            outcome,
        });
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Summary of everything issued on this session
    pub fn report(&self) -> SessionReport {
        let operations: Vec<OperationReport> =
            self.history.iter().map(OperationReport::from).collect();
        let success = !self.state.is_failed() && operations.iter().all(|op| op.success);

        SessionReport {
            state: self.state,
            success,
            operations,
        }
    }
}

/// Serializable session summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub state: SessionState,
    pub success: bool,
    pub operations: Vec<OperationReport>,
}

impl SessionReport {
    /// Exit code for the whole run: 0, or the code of the first failure
    pub fn exit_code(&self) -> i32 {
        self.operations
            .iter()
            .find_map(|op| op.failure)
            .map(FailureKind::exit_code)
            .unwrap_or(0)
    }
}

/// Serializable per-operation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReport {
    pub operation: Operation,
    pub success: bool,
    pub attempts: Option<u32>,
    pub bytes_transferred: usize,
    pub failure: Option<FailureKind>,
    pub message: Option<String>,
}

impl From<&OperationRecord> for OperationReport {
    fn from(record: &OperationRecord) -> Self {
        match &record.outcome {
            Ok(transfer) => Self {
                operation: record.operation,
                success: true,
                attempts: Some(transfer.attempts),
                bytes_transferred: transfer.bytes_transferred(),
                failure: None,
                message: None,
            },
            Err(e) => Self {
                operation: record.operation,
                success: false,
                attempts: match e {
                    SwitchError::ChannelExhausted { attempts, .. } => Some(*attempts),
                    _ => None,
                },
                bytes_transferred: 0,
                failure: Some(e.kind()),
                message: Some(e.to_string()),
            },
        }
    }
}
