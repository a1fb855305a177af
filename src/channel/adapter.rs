use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::channel::tcp::TcpChannel;
use crate::channel::{ChannelError, Received, SnapshotChannel};
use crate::config::ViewerConfig;
use crate::graph::validate::{SchemaErrors, validate};
use crate::store::WorldStore;

/// Cloneable flag that stops an [`UpdateAdapter`] from applying any further snapshot.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of handling one channel item.
#[derive(Debug)]
pub enum PumpOutcome {
    /// A valid snapshot replaced the store contents.
    Applied {
        /// Store generation after the replace.
        generation: u64,
    },
    /// The snapshot was malformed; the store is unchanged.
    Rejected(SchemaErrors),
    /// A message for another event name.
    Ignored {
        /// Event name received.
        event: String,
    },
    /// Transport failure; the store is unchanged.
    ChannelFault(ChannelError),
    /// Nothing arrived within the poll interval.
    Idle,
    /// Cancellation was requested; the channel has been released.
    Cancelled,
    /// The channel closed; the channel has been released.
    Closed,
}

impl PumpOutcome {
    /// Return `true` when no further items will be processed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }
}

/// Counters over an adapter's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct UpdateStats {
    /// Snapshots applied to the store.
    pub applied: u64,
    /// Snapshots rejected by validation.
    pub rejected: u64,
    /// Messages for other events.
    pub ignored: u64,
    /// Transport faults.
    pub channel_faults: u64,
}

/// Subscribes to one event on a [`SnapshotChannel`] and feeds valid snapshots into a
/// [`WorldStore`].
///
/// Items are handled one at a time in arrival order. Rejected snapshots are not retried.
/// The channel is released on [`UpdateAdapter::teardown`], on cancellation, or on drop.
pub struct UpdateAdapter<C: SnapshotChannel> {
    channel: Option<C>,
    event: String,
    store: Arc<WorldStore>,
    cancel: CancelHandle,
    stats: UpdateStats,
}

impl UpdateAdapter<TcpChannel> {
    /// Connect to the configured producer.
    ///
    /// An unreachable endpoint is returned as an error: without it nothing can be shown.
    pub fn connect(config: &ViewerConfig, store: Arc<WorldStore>) -> Result<Self, ChannelError> {
        let channel = TcpChannel::connect(
            &config.endpoint,
            config.connect_timeout(),
            config.poll_interval(),
        )?;
        Ok(Self::activate(channel, config.event.clone(), store))
    }
}

impl<C: SnapshotChannel> UpdateAdapter<C> {
    /// Take ownership of an already established channel.
    pub fn activate(channel: C, event: impl Into<String>, store: Arc<WorldStore>) -> Self {
        let event = event.into();
        tracing::debug!(%event, "update adapter activated");
        Self {
            channel: Some(channel),
            event,
            store,
            cancel: CancelHandle::default(),
            stats: UpdateStats::default(),
        }
    }

    /// Handle for cancelling from elsewhere (e.g. a UI thread).
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Store this adapter writes to.
    pub fn store(&self) -> &Arc<WorldStore> {
        &self.store
    }

    /// Subscribed event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Lifetime counters.
    pub fn stats(&self) -> UpdateStats {
        self.stats
    }

    /// Return `true` while the channel is held.
    pub fn is_active(&self) -> bool {
        self.channel.is_some()
    }

    /// Receive and handle at most one item.
    pub fn pump(&mut self) -> PumpOutcome {
        if self.cancel.is_cancelled() {
            self.release();
            return PumpOutcome::Cancelled;
        }
        let Some(channel) = self.channel.as_mut() else {
            return PumpOutcome::Closed;
        };

        let envelope = match channel.recv() {
            Ok(Received::Event(envelope)) => envelope,
            Ok(Received::Idle) => return PumpOutcome::Idle,
            Ok(Received::Closed) => {
                tracing::info!("update channel closed");
                self.release();
                return PumpOutcome::Closed;
            }
            Err(err) => {
                tracing::warn!("update channel fault, keeping last snapshot: {err}");
                self.stats.channel_faults += 1;
                return PumpOutcome::ChannelFault(err);
            }
        };

        if envelope.event != self.event {
            tracing::debug!(event = %envelope.event, "ignoring message for other event");
            self.stats.ignored += 1;
            return PumpOutcome::Ignored {
                event: envelope.event,
            };
        }

        match validate(&envelope.data) {
            Ok(state) => {
                // Teardown may have started while validating; discard the snapshot.
                if self.cancel.is_cancelled() {
                    self.release();
                    return PumpOutcome::Cancelled;
                }
                let (solved, total) = state.solved_counts();
                let generation = self.store.replace(state);
                self.stats.applied += 1;
                tracing::info!(generation, solved, total, "applied snapshot");
                PumpOutcome::Applied { generation }
            }
            Err(errors) => {
                self.stats.rejected += 1;
                tracing::warn!(
                    violations = errors.errors.len(),
                    "rejected snapshot, keeping last snapshot:\n{errors}"
                );
                PumpOutcome::Rejected(errors)
            }
        }
    }

    /// Pump until the channel closes or cancellation is requested.
    pub fn run(&mut self) -> UpdateStats {
        self.run_with(|_| {})
    }

    /// Like [`UpdateAdapter::run`], reporting every non-idle outcome to `on_outcome`.
    pub fn run_with(&mut self, mut on_outcome: impl FnMut(&PumpOutcome)) -> UpdateStats {
        loop {
            let outcome = self.pump();
            if !matches!(outcome, PumpOutcome::Idle) {
                on_outcome(&outcome);
            }
            if outcome.is_terminal() {
                return self.stats;
            }
        }
    }

    /// Release the channel. No snapshot is applied afterwards.
    pub fn teardown(mut self) -> UpdateStats {
        self.cancel.cancel();
        self.release();
        self.stats
    }

    fn release(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
            tracing::debug!(event = %self.event, "update adapter released channel");
        }
    }
}

impl<C: SnapshotChannel> Drop for UpdateAdapter<C> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/channel/adapter.rs"]
mod tests;
