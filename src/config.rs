//! Configuration for modeswitch
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, SwitchError};
use crate::protocol::MAX_TRANSFER_LEN;

/// Main configuration for a mode-switch run
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Device Selection
    // -------------------------------------------------------------------------
    /// USB vendor id of the switch box
    pub vendor_id: u16,

    /// USB product id of the switch box
    pub product_id: u16,

    /// Interface number claimed for the bulk endpoints
    pub interface: u8,

    /// Bulk OUT endpoint address
    pub endpoint_out: u8,

    /// Bulk IN endpoint address
    pub endpoint_in: u8,

    // -------------------------------------------------------------------------
    // Transfer Configuration
    // -------------------------------------------------------------------------
    /// Per-call send/receive timeout (milliseconds)
    pub timeout_ms: u64,

    /// Largest response accepted from a single receive
    pub max_response_len: usize,

    /// Retry policy for transport-level failures
    pub retry: RetryPolicy,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Device identifier for the string-argument modem switch.
    /// `None` selects the fixed-tag frame.
    pub target_device: Option<String>,

    /// What a batch of auxiliary operations does after a failure
    pub batch_policy: BatchPolicy,
}

/// Bounded retry for channel-level I/O errors
///
/// Validation failures are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Default attempt budget per exchange
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Default pause between attempts
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

    /// Create a policy; `max_attempts` is clamped to at least 1
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Exactly one attempt, no delay
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Behaviour of a batch of auxiliary operations after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Stop at the first failed operation
    #[default]
    AbortOnError,

    /// Record the failure and issue the next operation anyway
    ContinueOnError,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor_id: 0x0403,
            product_id: 0x0011,
            interface: 0,
            endpoint_out: 0x02,
            endpoint_in: 0x81,
            timeout_ms: 5000,
            max_response_len: MAX_TRANSFER_LEN,
            retry: RetryPolicy::default(),
            target_device: None,
            batch_policy: BatchPolicy::AbortOnError,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Per-call timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject settings the channel or codec cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(SwitchError::Config("timeout must be non-zero".to_string()));
        }
        if self.max_response_len == 0 || self.max_response_len > MAX_TRANSFER_LEN {
            return Err(SwitchError::Config(format!(
                "max response length must be in 1..={} (got {})",
                MAX_TRANSFER_LEN, self.max_response_len
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the vendor id
    pub fn vendor_id(mut self, id: u16) -> Self {
        self.config.vendor_id = id;
        self
    }

    /// Set the product id
    pub fn product_id(mut self, id: u16) -> Self {
        self.config.product_id = id;
        self
    }

    /// Set the interface number
    pub fn interface(mut self, interface: u8) -> Self {
        self.config.interface = interface;
        self
    }

    /// Set the bulk endpoint pair (OUT, IN)
    pub fn endpoints(mut self, out: u8, inbound: u8) -> Self {
        self.config.endpoint_out = out;
        self.config.endpoint_in = inbound;
        self
    }

    /// Set the per-call timeout (in milliseconds)
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Set the maximum response length (in bytes)
    pub fn max_response_len(mut self, len: usize) -> Self {
        self.config.max_response_len = len;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Use the string-argument modem switch with this device identifier
    pub fn target_device(mut self, target: impl Into<String>) -> Self {
        self.config.target_device = Some(target.into());
        self
    }

    /// Set the batch policy
    pub fn batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.config.batch_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
