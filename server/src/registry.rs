//! Connection registry for the session server
//!
//! This module owns every accepted connection and drives it from the server
//! tick:
//! - accepting pending streams and assigning monotonically increasing ids
//! - pruning connections that went away (hang up, timeout, I/O error)
//! - polling the survivors for complete frames
//! - fan-out of messages to one, all, or all-but-one connection
//!
//! Ids are never reused, so the first two connections of a session are always
//! `0` and `1` and own the two sides.

use log::{info, warn};
use shared::clock::{Clock, SystemClock};
use shared::transport::{bind_listener, Acceptor};
use shared::{Connection, ConnectionConfig, ConnectionId, Frame, Message, NetError};
use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

/// Manages all connections of one server
///
/// Connections live in a `BTreeMap`, so iteration follows ascending id which
/// is also the order of acceptance. Newly accepted ids and pruned ids are
/// queued until the session drains them.
pub struct ConnectionRegistry<A: Acceptor> {
    /// Source of new streams, `None` once stopped
    acceptor: Option<A>,
    connections: BTreeMap<ConnectionId, Connection<A::Stream>>,
    /// Ids accepted since the last `drain_new`
    new_ids: Vec<ConnectionId>,
    /// Ids removed since the last `drain_pruned`
    pruned_ids: Vec<ConnectionId>,
    next_id: ConnectionId,
    /// Maximum number of live connections, unlimited when `None`
    max_connections: Option<usize>,
    config: ConnectionConfig,
    clock: Arc<dyn Clock>,
}

impl ConnectionRegistry<TcpListener> {
    /// Binds a non-blocking TCP listener on `addr`
    ///
    /// Fails with [`NetError::Connectivity`] when the address cannot be bound.
    pub fn bind(addr: &str, config: ConnectionConfig) -> Result<Self, NetError> {
        let listener = bind_listener(addr)?;
        info!("Listening on {}", addr);
        Ok(Self::new(listener, config, Arc::new(SystemClock)))
    }

    /// Address the listener is bound to, useful when binding port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.as_ref()?.local_addr().ok()
    }
}

impl<A: Acceptor> ConnectionRegistry<A> {
    pub fn new(acceptor: A, config: ConnectionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            acceptor: Some(acceptor),
            connections: BTreeMap::new(),
            new_ids: Vec::new(),
            pruned_ids: Vec::new(),
            next_id: 0,
            max_connections: None,
            config,
            clock,
        }
    }

    /// Limits the number of simultaneously live connections
    pub fn with_max_connections(mut self, max_connections: Option<usize>) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Advances every connection by one step
    ///
    /// Accepts pending streams, prunes dead connections and polls the rest.
    /// The result only has entries for connections that produced frames.
    /// Does nothing after [`ConnectionRegistry::stop`].
    pub fn tick(&mut self) -> BTreeMap<ConnectionId, Vec<Frame>> {
        let mut received = BTreeMap::new();
        if self.acceptor.is_none() {
            return received;
        }

        self.accept_pending();
        self.prune();

        for (id, connection) in self.connections.iter_mut() {
            let frames = connection.poll();
            if !frames.is_empty() {
                received.insert(*id, frames);
            }
        }
        received
    }

    /// Returns and forgets the ids accepted since the previous call
    pub fn drain_new(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.new_ids)
    }

    /// Returns and forgets the ids pruned since the previous call
    pub fn drain_pruned(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.pruned_ids)
    }

    /// Sends `message` to every live connection
    ///
    /// Failures are not reported here; the affected connections are removed
    /// on the next tick.
    pub fn broadcast(&mut self, message: &Message) {
        self.broadcast_except(message, None);
    }

    /// Sends `message` to every live connection except `exclude`
    pub fn broadcast_except(&mut self, message: &Message, exclude: Option<ConnectionId>) {
        for (id, connection) in self.connections.iter_mut() {
            if Some(*id) == exclude || !connection.is_connected() {
                continue;
            }
            // Write failures already mark the connection as disconnected.
            let _ = connection.send(message);
        }
    }

    /// Sends `message` to a single connection
    pub fn send_to(&mut self, id: ConnectionId, message: &Message) -> Result<(), NetError> {
        match self.connections.get_mut(&id) {
            Some(connection) => connection.send(message),
            None => Err(NetError::NotConnected),
        }
    }

    /// Ids of connections that are still connected, ascending
    pub fn live_ids(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, connection)| connection.is_connected())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection<A::Stream>> {
        self.connections.get(&id)
    }

    /// Number of registered connections, including ones awaiting pruning
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.acceptor.is_none()
    }

    /// Hangs up on every connection and closes the listener
    pub fn stop(&mut self) {
        for (id, mut connection) in std::mem::take(&mut self.connections) {
            if connection.disconnect().is_ok() {
                info!("Connection {} closed by server shutdown", id);
            }
        }
        self.new_ids.clear();
        self.acceptor = None;
        info!("Connection registry stopped");
    }

    fn accept_pending(&mut self) {
        loop {
            let accepted = match self.acceptor.as_mut() {
                Some(acceptor) => acceptor.try_accept(),
                None => return,
            };

            match accepted {
                Ok(Some(stream)) => self.register(stream),
                Ok(None) => return,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    return;
                }
            }
        }
    }

    fn register(&mut self, stream: A::Stream) {
        let mut connection = Connection::new(
            self.next_id,
            stream,
            self.config.clone(),
            Arc::clone(&self.clock),
        );

        if let Some(max) = self.max_connections {
            let live = self.connections.values().filter(|c| c.is_connected()).count();
            if live >= max {
                warn!(
                    "Rejecting {}: {} connections already live",
                    connection.peer(),
                    live
                );
                let _ = connection.disconnect();
                return;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        info!("Connection {} accepted from {}", id, connection.peer());
        self.connections.insert(id, connection);
        self.new_ids.push(id);
    }

    fn prune(&mut self) {
        let dead: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, connection)| !connection.is_connected())
            .map(|(id, _)| *id)
            .collect();

        for id in dead {
            self.connections.remove(&id);
            self.new_ids.retain(|new_id| *new_id != id);
            self.pruned_ids.push(id);
            info!("Connection {} removed", id);
        }
    }
}
