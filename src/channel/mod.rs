//! Push channel that delivers whole-graph snapshots, and the adapter feeding them into the
//! store.

pub(crate) mod adapter;
pub(crate) mod tcp;

use std::collections::VecDeque;

/// Name of the event carrying snapshots unless configured otherwise.
pub const DEFAULT_EVENT: &str = "graph";

/// One pushed message: an event name and its JSON payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Transport-level failures. None of these clear the store.
#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    /// The producer endpoint could not be reached.
    #[error("failed to connect to producer at {addr}: {err}")]
    Connect {
        /// Endpoint as configured.
        addr: String,
        /// Underlying error.
        err: std::io::Error,
    },

    /// Reading from an established connection failed.
    #[error("channel io error: {0}")]
    Io(#[from] std::io::Error),

    /// A message arrived that is not a valid envelope.
    #[error("malformed message: {0}")]
    Decode(String),
}

/// What a single receive produced.
#[derive(Debug)]
pub enum Received {
    /// A message arrived.
    Event(Envelope),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The channel is closed; nothing more will arrive.
    Closed,
}

/// Source of pushed envelopes.
///
/// Ordering contract: `recv` yields messages in the order the producer sent them.
pub trait SnapshotChannel {
    /// Wait up to the channel's poll interval for the next message.
    fn recv(&mut self) -> Result<Received, ChannelError>;
    /// Release the underlying connection. Later `recv` calls return [`Received::Closed`].
    fn close(&mut self);
}

/// In-memory channel for tests and replay.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    queue: VecDeque<Result<Envelope, String>>,
    closed: bool,
    stay_open: bool,
}

impl InMemoryChannel {
    /// Channel that closes once its queue is drained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that reports [`Received::Idle`] instead of closing when drained.
    pub fn open_ended() -> Self {
        Self {
            stay_open: true,
            ..Self::default()
        }
    }

    /// Queue one message.
    pub fn push(&mut self, envelope: Envelope) {
        self.queue.push_back(Ok(envelope));
    }

    /// Queue a snapshot payload under `event`.
    pub fn push_payload(&mut self, event: &str, data: serde_json::Value) {
        self.push(Envelope::new(event, data));
    }

    /// Queue an undecodable message.
    pub fn push_garbage(&mut self, raw: impl Into<String>) {
        self.queue.push_back(Err(raw.into()));
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Return `true` once [`SnapshotChannel::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SnapshotChannel for InMemoryChannel {
    fn recv(&mut self) -> Result<Received, ChannelError> {
        if self.closed {
            return Ok(Received::Closed);
        }
        match self.queue.pop_front() {
            Some(Ok(envelope)) => Ok(Received::Event(envelope)),
            Some(Err(raw)) => Err(ChannelError::Decode(raw)),
            None if self.stay_open => Ok(Received::Idle),
            None => Ok(Received::Closed),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.queue.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/channel/channel.rs"]
mod tests;
