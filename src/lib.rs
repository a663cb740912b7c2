//! # modeswitch
//!
//! Protocol engine for switching an attached device between USB
//! personalities through a vendor switch box:
//! - Fixed-layout command frames built from one tag table
//! - Handshake and mode-switch state machine
//! - Response validation with a distinct failure taxonomy
//! - Bounded retry for transport errors only
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          CLI                                 │
//! │             (mode selector, log file, report)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Session                                │
//! │        (state machine, retry, outcome history)               │
//! └──────┬──────────────────────┬─────────────────────┬─────────┘
//!        │                      │                     │
//!        ▼                      ▼                     ▼
//!  ┌───────────┐         ┌─────────────┐       ┌─────────────┐
//!  │   Codec   │         │   Channel   │       │ Diagnostics │
//!  │ (frames)  │         │ (bulk I/O)  │       │   (sink)    │
//!  └───────────┘         └─────────────┘       └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod channel;
pub mod diagnostics;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FailureKind, Result, SwitchError};
pub use config::{BatchPolicy, Config, RetryPolicy};
pub use protocol::Operation;
pub use session::{Mode, Session, SessionState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of modeswitch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
