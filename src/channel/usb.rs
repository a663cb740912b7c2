//! USB bulk channel
//!
//! Opens the box by vendor/product id, claims its interface and drives
//! the bulk endpoint pair. Each transfer is bounded by the configured
//! timeout; a transfer that overruns is cancelled when its future drops.
//! Dropping the channel releases the interface.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use nusb::transfer::{RequestBuffer, TransferError};
use nusb::Interface;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use super::{Channel, ChannelError};
use crate::config::Config;

/// Bulk OUT/IN endpoint pair on a claimed interface
pub struct UsbChannel {
    interface: Interface,
    endpoint_out: u8,
    endpoint_in: u8,
    timeout: Duration,
    runtime: Runtime,
}

impl UsbChannel {
    /// Find the device, detach any kernel driver and claim the interface
    pub fn open(config: &Config) -> Result<Self, ChannelError> {
        let wanted = format!("{:04x}:{:04x}", config.vendor_id, config.product_id);
        info!("Searching for device {}...", wanted);

        let device_info = nusb::list_devices()
            .map_err(open_error)?
            .find(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
            .ok_or_else(|| ChannelError::NotFound(wanted.clone()))?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );

        let device = device_info.open().map_err(open_error)?;
        let interface = device
            .detach_and_claim_interface(config.interface)
            .map_err(|e| ChannelError::PermissionOrClaimFailure(e.to_string()))?;
        debug!("Interface {} claimed", config.interface);

        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| ChannelError::TransferError(format!("timer runtime: {}", e)))?;

        Ok(Self {
            interface,
            endpoint_out: config.endpoint_out,
            endpoint_in: config.endpoint_in,
            timeout: config.timeout(),
            runtime,
        })
    }
}

impl Channel for UsbChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        let timeout = self.timeout;
        let transfer = self.interface.bulk_out(self.endpoint_out, bytes.to_vec());

        let completion = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, transfer).await })
            .map_err(|_| ChannelError::Timeout)?;
        let sent = completion.into_result().map_err(transfer_error)?;

        Ok(sent.actual_length())
    }

    fn receive(&mut self, max_len: usize) -> Result<Bytes, ChannelError> {
        let timeout = self.timeout;
        let transfer = self
            .interface
            .bulk_in(self.endpoint_in, RequestBuffer::new(max_len));

        let completion = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, transfer).await })
            .map_err(|_| ChannelError::Timeout)?;
        let data = completion.into_result().map_err(transfer_error)?;

        Ok(Bytes::from(data))
    }
}

fn open_error(error: io::Error) -> ChannelError {
    match error.kind() {
        io::ErrorKind::NotFound => ChannelError::NotFound(error.to_string()),
        _ => ChannelError::PermissionOrClaimFailure(error.to_string()),
    }
}

fn transfer_error(error: TransferError) -> ChannelError {
    match error {
        TransferError::Disconnected => ChannelError::Closed,
        other => ChannelError::TransferError(other.to_string()),
    }
}
