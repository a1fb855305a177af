//! Newline-delimited JSON envelopes over TCP.
//!
//! Each message is one compact JSON object `{"event": ..., "data": ...}` followed by `\n`.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::channel::{ChannelError, Envelope, Received, SnapshotChannel};
use crate::graph::model::WorldState;

/// Viewer side: a connection to the producer.
pub struct TcpChannel {
    addr: String,
    reader: Option<BufReader<TcpStream>>,
    pending: Vec<u8>,
}

impl TcpChannel {
    /// Connect to `addr` (`host:port`), trying every resolved address in turn.
    ///
    /// `poll_interval` bounds how long one [`SnapshotChannel::recv`] waits before reporting
    /// [`Received::Idle`].
    pub fn connect(
        addr: &str,
        connect_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, ChannelError> {
        let connect_err = |err| ChannelError::Connect {
            addr: addr.to_string(),
            err,
        };
        let candidates: Vec<SocketAddr> = addr.to_socket_addrs().map_err(connect_err)?.collect();

        let mut last_err =
            std::io::Error::new(ErrorKind::AddrNotAvailable, "address resolved to nothing");
        for candidate in candidates {
            tracing::debug!(%candidate, "connecting to producer");
            match TcpStream::connect_timeout(&candidate, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(poll_interval))?;
                    tracing::info!(%candidate, "connected to producer");
                    return Ok(Self {
                        addr: addr.to_string(),
                        reader: Some(BufReader::new(stream)),
                        pending: Vec::new(),
                    });
                }
                Err(err) => last_err = err,
            }
        }
        Err(connect_err(last_err))
    }

    /// Endpoint this channel was opened against.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn take_line(&mut self) -> Result<Option<Envelope>, ChannelError> {
        let line = std::mem::take(&mut self.pending);
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        // Invalid UTF-8 is a decode error, not a lossy substitution.
        serde_json::from_slice(&line)
            .map(Some)
            .map_err(|e| ChannelError::Decode(format!("invalid envelope: {e}")))
    }
}

impl SnapshotChannel for TcpChannel {
    fn recv(&mut self) -> Result<Received, ChannelError> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(Received::Closed);
            };
            match reader.read_until(b'\n', &mut self.pending) {
                Ok(0) => {
                    // EOF; flush an unterminated trailing message first.
                    self.close();
                    return match self.take_line()? {
                        Some(envelope) => Ok(Received::Event(envelope)),
                        None => Ok(Received::Closed),
                    };
                }
                Ok(_) if self.pending.last() == Some(&b'\n') => {
                    if let Some(envelope) = self.take_line()? {
                        return Ok(Received::Event(envelope));
                    }
                }
                Ok(_) => {}
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(Received::Idle);
                }
                Err(err) => {
                    self.close();
                    return Err(ChannelError::Io(err));
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            tracing::debug!(addr = %self.addr, "closing producer connection");
            let _ = reader.get_ref().shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Producer side: accepts viewers and pushes snapshots to all of them.
///
/// A viewer that connects receives the latest published snapshot immediately.
pub struct TcpPublisher {
    local_addr: SocketAddr,
    event: String,
    shared: Arc<PublisherShared>,
    accept_thread: Option<std::thread::JoinHandle<()>>,
}

struct PublisherShared {
    clients: Mutex<Vec<TcpStream>>,
    latest: Mutex<Option<Vec<u8>>>,
    shutdown: AtomicBool,
}

impl TcpPublisher {
    /// Bind to `addr` and start accepting viewers on a background thread.
    pub fn bind(addr: impl ToSocketAddrs, event: impl Into<String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let shared = Arc::new(PublisherShared {
            clients: Mutex::new(Vec::new()),
            latest: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        });

        let thread_shared = Arc::clone(&shared);
        let accept_thread = std::thread::Builder::new()
            .name("posegraph-publisher".into())
            .spawn(move || accept_loop(listener, &thread_shared))?;

        tracing::info!(%local_addr, "publisher listening");
        Ok(Self {
            local_addr,
            event: event.into(),
            shared,
            accept_thread: Some(accept_thread),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected viewers.
    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().len()
    }

    /// Send `state` to every connected viewer and remember it for viewers joining later.
    ///
    /// Returns how many viewers received it. Viewers whose connection failed are dropped.
    pub fn publish(&self, state: &WorldState) -> anyhow::Result<usize> {
        let data = serde_json::to_value(state)?;
        self.publish_raw(&Envelope::new(self.event.clone(), data))
    }

    /// Send an arbitrary envelope, e.g. to exercise a viewer's rejection path.
    pub fn publish_raw(&self, envelope: &Envelope) -> anyhow::Result<usize> {
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');

        let mut clients = self.shared.clients.lock();
        clients.retain_mut(|stream| match stream.write_all(&line) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("dropping viewer {:?}: {err}", stream.peer_addr());
                false
            }
        });
        let delivered = clients.len();
        // Set while holding the clients lock: a joining viewer gets exactly one copy.
        *self.shared.latest.lock() = Some(line);
        drop(clients);

        tracing::debug!(delivered, "published snapshot");
        Ok(delivered)
    }
}

impl Drop for TcpPublisher {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        // Wake the blocking accept.
        let _ = TcpStream::connect(self.local_addr);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        for stream in self.shared.clients.lock().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn accept_loop(listener: TcpListener, shared: &PublisherShared) {
    for stream in listener.incoming() {
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(mut stream) => {
                tracing::info!("viewer connected: {:?}", stream.peer_addr());
                let mut clients = shared.clients.lock();
                let latest = shared.latest.lock().clone();
                if let Some(line) = latest
                    && let Err(err) = stream.write_all(&line)
                {
                    tracing::warn!("failed to send initial snapshot: {err}");
                    continue;
                }
                clients.push(stream);
            }
            Err(err) => {
                tracing::warn!("failed to accept incoming viewer: {err:?}");
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/channel/tcp.rs"]
mod tests;
