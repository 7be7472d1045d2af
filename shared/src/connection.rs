//! One peer stream plus its liveness bookkeeping.
//!
//! A connection is polled from the owner's tick loop. Each poll reads whatever
//! bytes are available, extracts complete frames and then applies the
//! liveness policy:
//! - a PING is sent whenever [`ConnectionConfig::ping_interval`] has passed
//!   since the previous one (the first poll pings immediately)
//! - if no PING arrived for [`ConnectionConfig::peer_timeout`] the peer is
//!   considered dead and the connection hangs up
//!
//! Application sends are fire-and-forget: an I/O failure marks the connection
//! as disconnected instead of surfacing to the caller.

use crate::clock::{Clock, SystemClock};
use crate::codec::{Frame, FrameDecoder, DEFAULT_MAX_FRAME_LEN};
use crate::error::NetError;
use crate::protocol::{ConnectionId, Message, PACKET_HANG, PACKET_PING};
use crate::transport::{connect_stream, Transport};
use log::{debug, info, warn};
use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const PING_INTERVAL: Duration = Duration::from_secs(5);
pub const PEER_TIMEOUT: Duration = Duration::from_secs(10);
pub const HANG_WRITE_TIMEOUT: Duration = Duration::from_secs(20);

const READ_CHUNK: usize = 4096;
/// Upper bound on bytes pulled from the stream in one poll; the rest waits
/// for the next tick.
const READ_BUDGET: usize = 256 * 1024;

/// Timing and size limits applied to every connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub ping_interval: Duration,
    pub peer_timeout: Duration,
    /// Write timeout used while flushing the final HANG frame.
    pub hang_write_timeout: Duration,
    /// Largest accepted `LEN` value; anything above it rejects the peer.
    pub max_frame_len: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            peer_timeout: PEER_TIMEOUT,
            hang_write_timeout: HANG_WRITE_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

pub struct Connection<S: Transport> {
    id: ConnectionId,
    stream: S,
    decoder: FrameDecoder,
    last_ping_sent: Option<Instant>,
    last_ping_received: Instant,
    connected: bool,
    config: ConnectionConfig,
    clock: Arc<dyn Clock>,
}

impl Connection<TcpStream> {
    /// Opens a client connection to `addr`.
    pub fn connect(addr: &str, config: ConnectionConfig) -> Result<Self, NetError> {
        Self::connect_with_clock(addr, config, Arc::new(SystemClock))
    }

    pub fn connect_with_clock(
        addr: &str,
        config: ConnectionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NetError> {
        let stream = connect_stream(addr)?;
        info!("Connected to {}", addr);
        Ok(Self::new(0, stream, config, clock))
    }
}

impl<S: Transport> Connection<S> {
    pub fn new(id: ConnectionId, stream: S, config: ConnectionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            stream,
            decoder: FrameDecoder::new(config.max_frame_len),
            last_ping_sent: None,
            last_ping_received: clock.now(),
            connected: true,
            config,
            clock,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn peer(&self) -> String {
        self.stream.peer()
    }

    pub fn last_ping_received(&self) -> Instant {
        self.last_ping_received
    }

    /// Queues `message` on the stream.
    ///
    /// Fails only when the connection is already closed; write errors close
    /// the connection silently.
    pub fn send(&mut self, message: &Message) -> Result<(), NetError> {
        if !self.connected {
            return Err(NetError::NotConnected);
        }
        self.write_bytes(&message.encode());
        Ok(())
    }

    /// Reads available input and returns the frames completed by it, in wire
    /// order. PING and HANG frames are included. Nothing after a HANG or a
    /// malformed length prefix is returned, and a closed connection yields
    /// nothing.
    pub fn poll(&mut self) -> Vec<Frame> {
        if !self.connected {
            return Vec::new();
        }

        let (bytes, peer_closed) = self.read_available();
        let (frames, violation) = match self.decoder.feed(&bytes) {
            Ok(frames) => {
                let violation = self.decoder.pending_error();
                (frames, violation)
            }
            Err(e) => (Vec::new(), Some(e)),
        };

        let now = self.clock.now();
        let mut delivered = Vec::with_capacity(frames.len());
        for frame in frames {
            match frame.id {
                PACKET_PING => self.last_ping_received = now,
                PACKET_HANG => {
                    info!("Connection {} ({}) hung up", self.id, self.stream.peer());
                    self.teardown();
                    delivered.push(frame);
                    return delivered;
                }
                _ => {}
            }
            delivered.push(frame);
        }

        if let Some(e) = violation {
            warn!(
                "Connection {} ({}): protocol violation, dropping peer: {}",
                self.id,
                self.stream.peer(),
                e
            );
            self.teardown();
            return delivered;
        }

        if peer_closed {
            info!("Connection {} ({}) closed by peer", self.id, self.stream.peer());
            self.teardown();
            return delivered;
        }

        if self.ping_due(now) {
            self.ping(now);
        }

        if self.connected && now.duration_since(self.last_ping_received) >= self.config.peer_timeout {
            warn!(
                "Connection {} ({}) not responding, disconnecting",
                self.id,
                self.stream.peer()
            );
            self.hang();
        }

        delivered
    }

    /// Sends HANG and closes the connection.
    pub fn disconnect(&mut self) -> Result<(), NetError> {
        if !self.connected {
            return Err(NetError::NotConnected);
        }
        self.hang();
        Ok(())
    }

    fn ping_due(&self, now: Instant) -> bool {
        match self.last_ping_sent {
            Some(sent) => now.duration_since(sent) >= self.config.ping_interval,
            None => true,
        }
    }

    fn ping(&mut self, now: Instant) {
        self.write_bytes(&Message::Ping.encode());
        self.last_ping_sent = Some(now);
    }

    fn hang(&mut self) {
        // Blocking write with a generous timeout so the HANG is likely flushed.
        if let Err(e) = self.stream.widen_write_timeout(self.config.hang_write_timeout) {
            debug!("Connection {}: could not widen write timeout: {}", self.id, e);
        }
        self.write_bytes(&Message::Hang.encode());
        self.teardown();
    }

    fn teardown(&mut self) {
        self.connected = false;
        if let Err(e) = self.stream.shutdown() {
            debug!("Connection {}: shutdown failed: {}", self.id, e);
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.connected {
            return;
        }
        let result = self
            .stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush());
        if let Err(e) = result {
            warn!(
                "Connection {} ({}): send failed, disconnecting: {}",
                self.id,
                self.stream.peer(),
                e
            );
            self.connected = false;
        }
    }

    /// Drains the stream until it would block. The flag reports EOF or a
    /// read error.
    fn read_available(&mut self) -> (Vec<u8>, bool) {
        let mut received = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        while received.len() < READ_BUDGET {
            match self.stream.read(&mut chunk) {
                Ok(0) => return (received, true),
                Ok(n) => received.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Connection {}: read failed: {}", self.id, e);
                    return (received, true);
                }
            }
        }
        (received, false)
    }
}

impl<S: Transport> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.stream.peer())
            .field("connected", &self.connected)
            .field("buffered", &self.decoder.buffered())
            .finish()
    }
}
