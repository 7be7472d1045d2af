//! Server driver tying the connection registry to the session state machine

use crate::record::FileRecordSink;
use crate::registry::ConnectionRegistry;
use crate::rules::RulesEngine;
use crate::session::{Outgoing, Session};
use log::{debug, info};
use shared::chess::Board;
use shared::clock::SystemClock;
use shared::transport::Acceptor;
use shared::{ConnectionConfig, NetError, DEFAULT_PORT};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Settings for a [`ChessServer`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub tick_duration: Duration,
    /// Directory that receives one JSON record per game
    pub matches_dir: PathBuf,
    pub max_connections: Option<usize>,
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_duration: Duration::from_millis(50),
            matches_dir: PathBuf::from("matches"),
            max_connections: None,
            connection: ConnectionConfig::default(),
        }
    }
}

/// Runs one chess session over a set of connections
///
/// Every tick polls the registry, feeds connection events and frames to the
/// session in ascending connection order, then delivers the session's
/// outgoing messages.
pub struct ChessServer<A: Acceptor, R: RulesEngine> {
    registry: ConnectionRegistry<A>,
    session: Session<R>,
    tick: u64,
}

impl ChessServer<TcpListener, Board> {
    /// Binds the listener and sets up a fresh game from the starting position
    pub fn bind(config: &ServerConfig) -> Result<Self, NetError> {
        let registry = ConnectionRegistry::bind(&config.address, config.connection.clone())?
            .with_max_connections(config.max_connections);
        let session = Session::new(
            Board::new(),
            Box::new(FileRecordSink::new(&config.matches_dir)),
            Arc::new(SystemClock),
        );
        Ok(Self::new(registry, session))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.registry.local_addr()
    }
}

impl<A: Acceptor, R: RulesEngine> ChessServer<A, R> {
    pub fn new(registry: ConnectionRegistry<A>, session: Session<R>) -> Self {
        Self {
            registry,
            session,
            tick: 0,
        }
    }

    pub fn session(&self) -> &Session<R> {
        &self.session
    }

    pub fn registry(&self) -> &ConnectionRegistry<A> {
        &self.registry
    }

    /// Performs one server step
    pub fn tick(&mut self) {
        if self.registry.is_stopped() {
            return;
        }
        self.tick += 1;

        let received = self.registry.tick();

        let pruned = self.registry.drain_pruned();
        self.session.on_connections_removed(&pruned);

        let new_ids = self.registry.drain_new();
        self.session.on_connections_added(&new_ids);

        for (id, frames) in &received {
            for frame in frames {
                self.session.handle_frame(*id, frame);
            }
        }

        let live = self.registry.live_ids();
        self.session.on_connectivity(&live);
        self.flush();

        if self.tick % 200 == 0 {
            debug!(
                "Tick {}: {} live connections, status {:?}",
                self.tick,
                live.len(),
                self.session.status()
            );
        }
    }

    /// Announces the shutdown and closes every connection
    pub fn stop(&mut self) {
        if self.registry.is_stopped() {
            return;
        }
        self.session.stop();
        self.flush();
        self.registry.stop();
    }

    /// Ticks at `tick_duration` until Ctrl+C, then stops
    pub async fn run(&mut self, tick_duration: Duration) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Server started successfully");

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.tick();
                }
                result = &mut shutdown => {
                    result?;
                    info!("Received Ctrl+C, shutting down gracefully...");
                    break;
                }
            }
        }

        self.stop();
        Ok(())
    }

    fn flush(&mut self) {
        for outgoing in self.session.take_outgoing() {
            match outgoing {
                Outgoing::Broadcast { message, exclude } => {
                    self.registry.broadcast_except(&message, exclude);
                }
                Outgoing::SendTo { id, message } => {
                    if let Err(e) = self.registry.send_to(id, &message) {
                        debug!("Could not send {:?} to connection {}: {}", message, id, e);
                    }
                }
            }
        }
    }
}
