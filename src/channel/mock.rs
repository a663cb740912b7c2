//! Scripted channel
//!
//! Each send and receive pops the next scripted result. An empty send
//! script succeeds; an empty receive script times out. A persistent
//! failure, when set, overrides both scripts.

use std::collections::VecDeque;

use bytes::Bytes;

use super::{Channel, ChannelError};

/// In-memory channel with scripted results
#[derive(Debug, Default)]
pub struct MockChannel {
    send_script: VecDeque<Result<(), ChannelError>>,
    receive_script: VecDeque<Result<Bytes, ChannelError>>,
    persistent_failure: Option<ChannelError>,
    sent: Vec<Vec<u8>>,
    send_calls: usize,
    receive_calls: usize,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel where every send and receive fails with `error`
    pub fn failing(error: ChannelError) -> Self {
        Self {
            persistent_failure: Some(error),
            ..Self::default()
        }
    }

    /// Queue a successful response
    pub fn push_response(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.receive_script
            .push_back(Ok(Bytes::copy_from_slice(bytes.as_ref())));
        self
    }

    /// Queue a receive failure
    pub fn push_receive_error(&mut self, error: ChannelError) -> &mut Self {
        self.receive_script.push_back(Err(error));
        self
    }

    /// Queue a send failure
    pub fn push_send_error(&mut self, error: ChannelError) -> &mut Self {
        self.send_script.push_back(Err(error));
        self
    }

    /// Queue `count` consecutive send failures
    pub fn fail_sends(&mut self, count: usize, error: ChannelError) -> &mut Self {
        for _ in 0..count {
            self.send_script.push_back(Err(error.clone()));
        }
        self
    }

    /// Builder form of [`MockChannel::push_response`]
    pub fn with_response(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.push_response(bytes);
        self
    }

    /// Frames that were accepted by `send`, in order
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Every `send` call, successful or not
    pub fn send_calls(&self) -> usize {
        self.send_calls
    }

    /// Every `receive` call, successful or not
    pub fn receive_calls(&self) -> usize {
        self.receive_calls
    }

    pub fn total_calls(&self) -> usize {
        self.send_calls + self.receive_calls
    }

    /// Responses still queued
    pub fn pending_responses(&self) -> usize {
        self.receive_script.len()
    }
}

impl Channel for MockChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        self.send_calls += 1;
        if let Some(error) = &self.persistent_failure {
            return Err(error.clone());
        }
        match self.send_script.pop_front() {
            Some(Err(error)) => Err(error),
            Some(Ok(())) | None => {
                self.sent.push(bytes.to_vec());
                Ok(bytes.len())
            }
        }
    }

    fn receive(&mut self, max_len: usize) -> Result<Bytes, ChannelError> {
        self.receive_calls += 1;
        if let Some(error) = &self.persistent_failure {
            return Err(error.clone());
        }
        match self.receive_script.pop_front() {
            Some(Ok(mut bytes)) => {
                // bulk IN never hands back more than was asked for
                bytes.truncate(max_len);
                Ok(bytes)
            }
            Some(Err(error)) => Err(error),
            None => Err(ChannelError::Timeout),
        }
    }
}
