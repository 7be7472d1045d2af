use crate::game::{ClientSessionView, Cue, DisplayStatus};
use crate::input::{parse_command, Command, HELP};
use crate::rendering::Renderer;
use log::{debug, info, warn};
use shared::transport::Transport;
use shared::{Connection, ConnectionConfig, Frame, Message, NetError, Status};
use std::net::TcpStream;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

/// Client end of a chess session
///
/// Wraps a [`Connection`] and speaks the client half of the protocol. All
/// calls are non-blocking; [`ChessClient::update`] must be called regularly to
/// keep the connection alive.
pub struct ChessClient<S: Transport = TcpStream> {
    connection: Connection<S>,
    nick: String,
}

impl ChessClient<TcpStream> {
    /// Connects to `addr` and announces `nick`
    pub fn connect(addr: &str, nick: &str, config: ConnectionConfig) -> Result<Self, NetError> {
        let connection = Connection::connect(addr, config)?;
        Self::from_connection(connection, nick)
    }
}

impl<S: Transport> ChessClient<S> {
    pub fn from_connection(mut connection: Connection<S>, nick: &str) -> Result<Self, NetError> {
        connection.send(&Message::SetNick(nick.to_string()))?;
        Ok(Self {
            connection,
            nick: nick.to_string(),
        })
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Polls the connection. Returns `None` once the connection is gone.
    pub fn update(&mut self) -> Option<Vec<Frame>> {
        if !self.connection.is_connected() {
            return None;
        }
        let frames = self.connection.poll();
        if frames.is_empty() && !self.connection.is_connected() {
            return None;
        }
        Some(frames)
    }

    pub fn send_move(&mut self, from: u8, to: u8) -> Result<(), NetError> {
        self.connection.send(&Message::Move { from, to })
    }

    pub fn give_up(&mut self) -> Result<(), NetError> {
        self.connection.send(&Message::GiveUp)
    }

    /// Sends HANG and closes the connection
    pub fn disconnect(&mut self) -> Result<(), NetError> {
        self.connection.disconnect()
    }
}

/// Interactive terminal client
pub struct Client<S: Transport = TcpStream> {
    chess: ChessClient<S>,
    view: ClientSessionView,
    renderer: Renderer,
    last_screen: String,
}

impl<S: Transport> Client<S> {
    pub fn new(chess: ChessClient<S>) -> Self {
        Self {
            chess,
            view: ClientSessionView::new(),
            renderer: Renderer::new(),
            last_screen: String::new(),
        }
    }

    pub fn view(&self) -> &ClientSessionView {
        &self.view
    }

    /// Polls the server once and applies what arrived
    pub fn update(&mut self) {
        let frames = self.chess.update();
        self.view.apply_frames(frames.as_deref());

        match self.view.take_cue() {
            Some(Cue::Capture) => debug!("Capture"),
            Some(Cue::Move) => debug!("Move"),
            None => {}
        }
    }

    /// Returns `false` when the client should exit
    pub fn handle_line(&mut self, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                return true;
            }
        };

        match command {
            Command::Move { from, to } => {
                if !self.view.can_move(from, to) {
                    println!("That move is not possible right now");
                    return true;
                }
                self.view.local_move_started();
                if let Err(e) = self.chess.send_move(from, to) {
                    warn!("Failed to send move: {}", e);
                }
            }
            Command::Resign => {
                if self.view.status() != DisplayStatus::Session(Status::Playing) {
                    println!("There is no game to resign");
                    return true;
                }
                if let Err(e) = self.chess.give_up() {
                    warn!("Failed to resign: {}", e);
                }
            }
            Command::Board => {
                self.last_screen.clear();
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {
                if let Err(e) = self.chess.disconnect() {
                    debug!("Disconnect: {}", e);
                }
                return false;
            }
        }
        true
    }

    fn draw_if_changed(&mut self) {
        let screen = self.renderer.render(&self.view);
        if screen != self.last_screen {
            println!("{}", screen);
            self.last_screen = screen;
        }
    }

    fn finished(&self) -> bool {
        matches!(
            self.view.status(),
            DisplayStatus::NotConnected | DisplayStatus::Session(Status::ServerStopped)
        )
    }

    /// Runs until the user quits, stdin closes or the server goes away
    pub async fn run(&mut self, tick: Duration) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(tick);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        info!("Playing as {}", self.chess.nick());
        println!("{}", HELP);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.update();
                    self.draw_if_changed();
                    if self.finished() {
                        info!("Session over, exiting");
                        break;
                    }
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line) {
                                break;
                            }
                            self.draw_if_changed();
                        }
                        None => {
                            let _ = self.chess.disconnect();
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::clock::ManualClock;
    use shared::transport::{memory_pair, MemoryStream};
    use shared::{FrameDecoder, Side};
    use std::io::Write;
    use std::sync::Arc;

    fn client() -> (ChessClient<MemoryStream>, MemoryStream) {
        let (local, remote) = memory_pair();
        let connection = Connection::new(
            0,
            local,
            ConnectionConfig::default(),
            Arc::new(ManualClock::new()),
        );
        (ChessClient::from_connection(connection, "tester").unwrap(), remote)
    }

    fn sent(remote: &MemoryStream) -> Vec<Message> {
        FrameDecoder::default()
            .feed(&remote.take_received())
            .unwrap()
            .iter()
            .map(|f| Message::decode(f).unwrap())
            .filter(|m| *m != Message::Ping)
            .collect()
    }

    #[test]
    fn test_connect_announces_nick() {
        let (_client, remote) = client();
        assert_eq!(sent(&remote), vec![Message::SetNick("tester".to_string())]);
    }

    #[test]
    fn test_move_and_give_up() {
        let (mut client, remote) = client();
        client.send_move(12, 28).unwrap();
        client.give_up().unwrap();
        assert_eq!(
            sent(&remote),
            vec![
                Message::SetNick("tester".to_string()),
                Message::Move { from: 12, to: 28 },
                Message::GiveUp,
            ]
        );
    }

    #[test]
    fn test_update_returns_none_after_hang() {
        let (mut client, mut remote) = client();
        remote.write_all(&Message::Side(Side::Black).encode()).unwrap();
        remote.write_all(&Message::Hang.encode()).unwrap();

        let frames = client.update().unwrap();
        assert_eq!(frames.last().map(|f| f.id), Some(Message::Hang.id()));
        assert!(!client.is_connected());
        assert!(client.update().is_none());
        assert!(matches!(client.send_move(0, 1), Err(NetError::NotConnected)));
    }

    #[test]
    fn test_interactive_move_is_validated_locally() {
        let (chess, mut remote) = client();
        let mut client = Client::new(chess);
        remote
            .write_all(&Message::Status(Status::Playing).encode())
            .unwrap();
        remote
            .write_all(
                &Message::Board {
                    is_capture: false,
                    state: shared::chess::Board::new().to_epd(),
                }
                .encode(),
            )
            .unwrap();
        remote.write_all(&Message::Side(Side::White).encode()).unwrap();
        client.update();

        assert!(client.handle_line("e2e5"));
        assert!(client.handle_line("e2e4"));
        assert!(!client.handle_line("quit"));

        assert_eq!(
            sent(&remote),
            vec![
                Message::SetNick("tester".to_string()),
                Message::Move { from: 12, to: 28 },
                Message::Hang,
            ]
        );
    }
}
