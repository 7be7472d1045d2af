//! Authoritative state of one chess session.
//!
//! The session never touches sockets. It reacts to connection events and
//! decoded messages and queues what has to be sent in an outbox, which the
//! server driver flushes to the registry after every tick.

use crate::record::{record_key, MoveRecord, RecordSink};
use crate::rules::RulesEngine;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use shared::chess::{last_rank, rank_of};
use shared::clock::Clock;
use shared::{
    ConnectionId, Frame, Message, Move, Outcome, PieceKind, Side, Status, MAX_NICK_CHARS,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A message queued by the session for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// To every live connection except `exclude`.
    Broadcast {
        message: Message,
        exclude: Option<ConnectionId>,
    },
    /// To a single connection.
    SendTo {
        id: ConnectionId,
        message: Message,
    },
}

pub struct Session<R: RulesEngine> {
    status: Status,
    rules: R,
    nicks: BTreeMap<ConnectionId, String>,
    outcome: Option<Outcome>,
    record: MoveRecord,
    record_key: Option<String>,
    started_at: Option<DateTime<Local>>,
    sink: Box<dyn RecordSink>,
    clock: Arc<dyn Clock>,
    outbox: Vec<Outgoing>,
}

impl<R: RulesEngine> Session<R> {
    pub fn new(rules: R, sink: Box<dyn RecordSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            status: Status::WaitingForPlayers,
            rules,
            nicks: BTreeMap::new(),
            outcome: None,
            record: MoveRecord::new(),
            record_key: None,
            started_at: None,
            sink,
            clock,
            outbox: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn record(&self) -> &MoveRecord {
        &self.record
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn nick(&self, id: ConnectionId) -> Option<&str> {
        self.nicks.get(&id).map(String::as_str)
    }

    /// Takes everything queued since the previous call, in order.
    pub fn take_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Greets connections accepted this tick.
    ///
    /// Everybody learns the current status. Once a game is under way the
    /// newcomers also get the position, the known player names and the
    /// result if there is one.
    pub fn on_connections_added(&mut self, new_ids: &[ConnectionId]) {
        if new_ids.is_empty() || self.status == Status::ServerStopped {
            return;
        }
        self.broadcast(Message::Status(self.status));

        if self.status == Status::WaitingForPlayers {
            return;
        }
        let board = Message::Board {
            is_capture: false,
            state: self.rules.snapshot(),
        };
        let player_infos = self.player_infos();
        let outcome = self.outcome;
        for &id in new_ids {
            debug!("Syncing late joiner {}", id);
            self.send_to(id, board.clone());
            for info in &player_infos {
                self.send_to(id, info.clone());
            }
            if let Some(outcome) = outcome {
                self.send_to(id, Message::GameOutcome(outcome));
            }
        }
    }

    /// Forgets state kept for connections that are gone.
    pub fn on_connections_removed(&mut self, ids: &[ConnectionId]) {
        for id in ids {
            if self.nicks.remove(id).is_some() {
                debug!("Forgot nick of connection {}", id);
            }
        }
    }

    /// Applies the transitions driven by the number of live connections.
    pub fn on_connectivity(&mut self, live_ids: &[ConnectionId]) {
        match self.status {
            Status::Playing if live_ids.len() <= 1 => {
                info!("A player left, ending the game");
                self.set_status(Status::GameEndedPlayerLeft);
            }
            Status::WaitingForPlayers if live_ids.len() >= 2 => self.start_game(live_ids),
            _ => {}
        }
    }

    /// Decodes and handles one frame from `sender`.
    pub fn handle_frame(&mut self, sender: ConnectionId, frame: &Frame) {
        match Message::decode(frame) {
            Ok(message) => self.handle_message(sender, message),
            Err(e) => debug!(
                "Ignoring undecodable frame {} from connection {}: {}",
                frame.id, sender, e
            ),
        }
    }

    pub fn handle_message(&mut self, sender: ConnectionId, message: Message) {
        match message {
            Message::Ping | Message::Hang => {}
            Message::SetNick(nick) => self.set_nick(sender, &nick),
            Message::Move { from, to } => self.handle_move(sender, from, to),
            Message::GiveUp => self.resign(sender),
            other => debug!(
                "Ignoring unexpected message {:?} from connection {}",
                other, sender
            ),
        }
    }

    /// Moves to `ServerStopped` and tells everybody.
    pub fn stop(&mut self) {
        self.set_status(Status::ServerStopped);
    }

    fn start_game(&mut self, live_ids: &[ConnectionId]) {
        if !live_ids.contains(&0) || !live_ids.contains(&1) {
            warn!(
                "Starting game with connections {:?}; a side may have no owner",
                live_ids
            );
        }
        if !self.set_status(Status::Playing) {
            return;
        }

        self.broadcast(Message::Board {
            is_capture: false,
            state: self.rules.snapshot(),
        });
        self.send_to(Side::White.connection_id(), Message::Side(Side::White));
        self.send_to(Side::Black.connection_id(), Message::Side(Side::Black));

        let started_at = self.clock.timestamp();
        self.record.start(&started_at);
        self.record_key = Some(record_key(
            &self.record.white,
            &self.record.black,
            &started_at,
        ));
        self.started_at = Some(started_at);
        info!("Game started: {} vs {}", self.record.white, self.record.black);
    }

    fn handle_move(&mut self, sender: ConnectionId, from: u8, to: u8) {
        if self.status != Status::Playing {
            debug!("Move from {} ignored, no game in progress", sender);
            return;
        }
        if Side::for_connection(sender) != Some(self.rules.turn()) {
            debug!("Move from {} ignored, not their turn", sender);
            return;
        }

        let mut mv = Move::new(from, to);
        if let Some(piece) = self.rules.piece_at(from) {
            if piece.kind == PieceKind::Pawn && rank_of(to) == last_rank(piece.side) {
                mv = mv.with_promotion(PieceKind::Queen);
            }
        }
        if !self.rules.is_legal(&mv) {
            debug!("Illegal move {} from {} ignored", mv, sender);
            return;
        }

        let taken = if self.rules.is_en_passant(&mv) {
            Some(PieceKind::Pawn)
        } else if self.rules.is_capture(&mv) {
            self.rules.piece_at(to).map(|piece| piece.kind)
        } else {
            None
        };

        if let Err(e) = self.rules.push(mv) {
            warn!("Rules engine rejected accepted move {}: {}", mv, e);
            return;
        }
        info!("Connection {} played {}", sender, mv);
        self.record.push_move(&mv);
        self.persist_record();

        if let Some(outcome) = self.rules.outcome() {
            self.finish(outcome);
        }

        self.broadcast(Message::Board {
            is_capture: taken.is_some(),
            state: self.rules.snapshot(),
        });
        self.broadcast_except(Message::ClientMoveInfo { from, to }, sender);
        if let Some(kind) = taken {
            self.broadcast_except(Message::ClientTakenInfo(kind), sender);
        }
    }

    fn resign(&mut self, sender: ConnectionId) {
        if self.status != Status::Playing {
            return;
        }
        let side = match Side::for_connection(sender) {
            Some(side) => side,
            None => {
                debug!("Spectator {} cannot resign", sender);
                return;
            }
        };
        info!("{:?} resigned", side);
        self.finish(Outcome::resignation(side));
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.outcome.is_some() || !self.set_status(Status::GameEnded) {
            return;
        }
        info!("Game over: {:?} ({})", outcome.kind, outcome.result_tag());
        self.outcome = Some(outcome);
        self.record.finish(&outcome);
        self.broadcast(Message::GameOutcome(outcome));
        self.persist_record();
    }

    fn set_nick(&mut self, sender: ConnectionId, raw: &str) {
        let nick: String = raw.trim().chars().take(MAX_NICK_CHARS).collect();
        if nick.is_empty() {
            debug!("Empty nick from {} ignored", sender);
            return;
        }
        info!("Connection {} is now known as {}", sender, nick);

        match Side::for_connection(sender) {
            Some(Side::White) => self.record.white = nick.clone(),
            Some(Side::Black) => self.record.black = nick.clone(),
            None => {}
        }
        self.nicks.insert(sender, nick);

        for info in self.player_infos() {
            self.broadcast(info);
        }
    }

    fn player_infos(&self) -> Vec<Message> {
        self.nicks
            .iter()
            .filter_map(|(&id, nick)| match u8::try_from(id) {
                Ok(connection_id) => Some(Message::PlayerInfo {
                    connection_id,
                    nick: nick.clone(),
                }),
                Err(_) => {
                    warn!("Connection id {} does not fit PLAYER_INFO", id);
                    None
                }
            })
            .collect()
    }

    fn persist_record(&mut self) {
        let key = match &self.record_key {
            Some(key) => key,
            None => return,
        };
        match self.record.to_json() {
            Ok(json) => {
                if let Err(e) = self.sink.persist(key, &json) {
                    warn!("Failed to persist game record {}: {}", key, e);
                }
            }
            Err(e) => warn!("Failed to serialize game record: {}", e),
        }
    }

    /// Returns whether the status changed.
    fn set_status(&mut self, next: Status) -> bool {
        if !self.status.can_transition_to(next) {
            debug!("Ignoring status change {:?} -> {:?}", self.status, next);
            return false;
        }
        info!("Status {:?} -> {:?}", self.status, next);
        self.status = next;
        self.broadcast(Message::Status(next));
        true
    }

    fn broadcast(&mut self, message: Message) {
        self.outbox.push(Outgoing::Broadcast {
            message,
            exclude: None,
        });
    }

    fn broadcast_except(&mut self, message: Message, exclude: ConnectionId) {
        self.outbox.push(Outgoing::Broadcast {
            message,
            exclude: Some(exclude),
        });
    }

    fn send_to(&mut self, id: ConnectionId, message: Message) {
        self.outbox.push(Outgoing::SendTo { id, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryRecordSink;
    use shared::chess::{Board, Piece};
    use shared::clock::ManualClock;
    use shared::{NetError, OutcomeKind};

    fn session() -> (Session<Board>, MemoryRecordSink) {
        let sink = MemoryRecordSink::new();
        let session = Session::new(
            Board::new(),
            Box::new(sink.clone()),
            Arc::new(ManualClock::new()),
        );
        (session, sink)
    }

    fn playing() -> (Session<Board>, MemoryRecordSink) {
        let (mut session, sink) = session();
        session.on_connections_added(&[0, 1]);
        session.on_connectivity(&[0, 1]);
        session.take_outgoing();
        (session, sink)
    }

    fn broadcast(message: Message) -> Outgoing {
        Outgoing::Broadcast {
            message,
            exclude: None,
        }
    }

    fn move_frame(from: u8, to: u8) -> Frame {
        Message::Move { from, to }.to_frame()
    }

    #[test]
    fn test_second_connection_starts_game_once() {
        let (mut session, _sink) = session();
        session.on_connections_added(&[0]);
        session.on_connectivity(&[0]);
        assert_eq!(session.status(), Status::WaitingForPlayers);
        assert_eq!(
            session.take_outgoing(),
            vec![broadcast(Message::Status(Status::WaitingForPlayers))]
        );

        session.on_connections_added(&[1]);
        session.on_connectivity(&[0, 1]);
        session.on_connectivity(&[0, 1]);

        let start = Board::new().to_epd();
        assert_eq!(
            session.take_outgoing(),
            vec![
                broadcast(Message::Status(Status::WaitingForPlayers)),
                broadcast(Message::Status(Status::Playing)),
                broadcast(Message::Board {
                    is_capture: false,
                    state: start,
                }),
                Outgoing::SendTo {
                    id: 0,
                    message: Message::Side(Side::White),
                },
                Outgoing::SendTo {
                    id: 1,
                    message: Message::Side(Side::Black),
                },
            ]
        );
        assert_eq!(session.status(), Status::Playing);
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_out_of_turn_move_is_dropped() {
        let (mut session, _sink) = playing();
        session.handle_frame(1, &move_frame(52, 36));

        assert!(session.take_outgoing().is_empty());
        assert_eq!(session.rules().to_epd(), Board::new().to_epd());
    }

    #[test]
    fn test_illegal_and_spectator_moves_are_dropped() {
        let (mut session, _sink) = playing();
        session.handle_frame(0, &move_frame(12, 36));
        session.handle_frame(2, &move_frame(12, 28));

        assert!(session.take_outgoing().is_empty());
        assert!(session.record().moves.is_empty());
    }

    #[test]
    fn test_legal_move_is_broadcast_and_recorded() {
        let (mut session, sink) = playing();
        session.handle_frame(0, &move_frame(12, 28));

        let mut expected_board = Board::new();
        expected_board.push(Move::new(12, 28)).unwrap();
        assert_eq!(
            session.take_outgoing(),
            vec![
                broadcast(Message::Board {
                    is_capture: false,
                    state: expected_board.to_epd(),
                }),
                Outgoing::Broadcast {
                    message: Message::ClientMoveInfo { from: 12, to: 28 },
                    exclude: Some(0),
                },
            ]
        );
        assert_eq!(session.record().moves, vec!["e2e4"]);

        let keys = sink.keys();
        assert_eq!(keys.len(), 1);
        let stored = MoveRecord::from_json(&sink.get(&keys[0]).unwrap()).unwrap();
        assert_eq!(stored.moves, vec!["e2e4"]);
    }

    #[test]
    fn test_capture_sends_taken_notice() {
        let (mut session, _sink) = playing();
        session.handle_frame(0, &move_frame(12, 28));
        session.handle_frame(1, &move_frame(51, 35));
        session.take_outgoing();

        session.handle_frame(0, &move_frame(28, 35));
        let outgoing = session.take_outgoing();
        assert!(matches!(
            &outgoing[0],
            Outgoing::Broadcast {
                message: Message::Board { is_capture: true, .. },
                exclude: None,
            }
        ));
        assert_eq!(
            outgoing[2],
            Outgoing::Broadcast {
                message: Message::ClientTakenInfo(PieceKind::Pawn),
                exclude: Some(0),
            }
        );
    }

    #[test]
    fn test_pawn_reaching_last_rank_becomes_queen() {
        let board = Board::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut session = Session::new(
            board,
            Box::new(MemoryRecordSink::new()),
            Arc::new(ManualClock::new()),
        );
        session.on_connectivity(&[0, 1]);
        session.handle_frame(0, &move_frame(48, 56));

        assert_eq!(
            session.rules().piece_at(56),
            Some(Piece::new(PieceKind::Queen, Side::White))
        );
        assert_eq!(session.record().moves, vec!["a7a8q"]);
    }

    #[test]
    fn test_resignation_ends_game() {
        let (mut session, sink) = playing();
        session.handle_frame(1, &Message::GiveUp.to_frame());

        let outcome = Outcome::decisive(OutcomeKind::Resignation, Side::White);
        assert_eq!(
            session.take_outgoing(),
            vec![
                broadcast(Message::Status(Status::GameEnded)),
                broadcast(Message::GameOutcome(outcome)),
            ]
        );
        assert_eq!(session.status(), Status::GameEnded);
        assert_eq!(session.outcome(), Some(outcome));

        let key = sink.keys().pop().unwrap();
        let stored = MoveRecord::from_json(&sink.get(&key).unwrap()).unwrap();
        assert_eq!(stored.result.as_deref(), Some("1-0"));

        session.handle_frame(0, &Message::GiveUp.to_frame());
        assert!(session.take_outgoing().is_empty());
    }

    #[test]
    fn test_spectator_cannot_resign() {
        let (mut session, _sink) = playing();
        session.handle_frame(2, &Message::GiveUp.to_frame());
        assert_eq!(session.status(), Status::Playing);
    }

    #[test]
    fn test_checkmate_finishes_before_board_broadcast() {
        let (mut session, _sink) = playing();
        for (id, from, to) in [(0, 13, 21), (1, 52, 36), (0, 14, 30)] {
            session.handle_frame(id, &move_frame(from, to));
        }
        session.take_outgoing();

        session.handle_frame(1, &move_frame(59, 31));
        let outgoing = session.take_outgoing();
        assert_eq!(outgoing[0], broadcast(Message::Status(Status::GameEnded)));
        assert_eq!(
            outgoing[1],
            broadcast(Message::GameOutcome(Outcome::decisive(
                OutcomeKind::Checkmate,
                Side::Black
            )))
        );
        assert!(matches!(
            outgoing[2],
            Outgoing::Broadcast {
                message: Message::Board { .. },
                ..
            }
        ));
        assert_eq!(session.record().result.as_deref(), Some("0-1"));

        session.handle_frame(0, &move_frame(12, 28));
        assert!(session.take_outgoing().is_empty());
    }

    #[test]
    fn test_player_leaving_ends_game_once() {
        let (mut session, _sink) = playing();
        session.on_connectivity(&[1]);
        session.on_connectivity(&[1]);
        session.on_connectivity(&[]);

        assert_eq!(
            session.take_outgoing(),
            vec![broadcast(Message::Status(Status::GameEndedPlayerLeft))]
        );
        assert_eq!(session.status(), Status::GameEndedPlayerLeft);
    }

    #[test]
    fn test_nicks_update_record_and_broadcast_all_pairs() {
        let (mut session, _sink) = session();
        session.handle_frame(0, &Message::SetNick("  alice ".into()).to_frame());
        session.take_outgoing();
        session.handle_frame(2, &Message::SetNick("watcher".into()).to_frame());

        assert_eq!(
            session.take_outgoing(),
            vec![
                broadcast(Message::PlayerInfo {
                    connection_id: 0,
                    nick: "alice".into(),
                }),
                broadcast(Message::PlayerInfo {
                    connection_id: 2,
                    nick: "watcher".into(),
                }),
            ]
        );
        assert_eq!(session.record().white, "alice");
        assert_eq!(session.record().black, "");

        session.on_connections_removed(&[2]);
        assert_eq!(session.nick(2), None);
    }

    #[test]
    fn test_long_nick_is_truncated() {
        let (mut session, _sink) = session();
        session.handle_message(1, Message::SetNick("x".repeat(100)));
        assert_eq!(session.nick(1).map(|n| n.chars().count()), Some(MAX_NICK_CHARS));
        assert_eq!(session.record().black.len(), MAX_NICK_CHARS);
    }

    #[test]
    fn test_record_key_uses_nicks_at_start() {
        let (mut session, sink) = session();
        session.handle_message(0, Message::SetNick("alice".into()));
        session.handle_message(1, Message::SetNick("bob".into()));
        session.on_connectivity(&[0, 1]);
        session.handle_frame(0, &move_frame(12, 28));

        let keys = sink.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("alice_bob_"));
    }

    #[test]
    fn test_late_joiner_gets_snapshot() {
        let (mut session, _sink) = playing();
        session.handle_message(0, Message::SetNick("alice".into()));
        session.take_outgoing();

        session.on_connections_added(&[2]);
        assert_eq!(
            session.take_outgoing(),
            vec![
                broadcast(Message::Status(Status::Playing)),
                Outgoing::SendTo {
                    id: 2,
                    message: Message::Board {
                        is_capture: false,
                        state: Board::new().to_epd(),
                    },
                },
                Outgoing::SendTo {
                    id: 2,
                    message: Message::PlayerInfo {
                        connection_id: 0,
                        nick: "alice".into(),
                    },
                },
            ]
        );
    }

    #[test]
    fn test_late_joiner_after_game_end_gets_outcome() {
        let (mut session, _sink) = playing();
        session.handle_message(1, Message::GiveUp);
        session.take_outgoing();

        session.on_connections_added(&[2]);
        let outgoing = session.take_outgoing();
        assert_eq!(outgoing[0], broadcast(Message::Status(Status::GameEnded)));
        assert_eq!(
            outgoing.last(),
            Some(&Outgoing::SendTo {
                id: 2,
                message: Message::GameOutcome(Outcome::resignation(Side::Black)),
            })
        );
    }

    #[test]
    fn test_game_starts_without_white_owner() {
        let (mut session, _sink) = session();
        session.on_connections_added(&[0]);
        session.on_connectivity(&[0]);
        session.on_connections_removed(&[0]);
        session.on_connectivity(&[]);
        session.on_connections_added(&[1, 2]);
        session.on_connectivity(&[1, 2]);
        assert_eq!(session.status(), Status::Playing);

        let outgoing = session.take_outgoing();
        assert!(outgoing.contains(&Outgoing::SendTo {
            id: 1,
            message: Message::Side(Side::Black),
        }));
        assert!(!outgoing.iter().any(|o| matches!(
            o,
            Outgoing::SendTo { id: 2, message: Message::Side(_) }
        )));

        // Nobody owns White, so the spectator cannot move for it
        session.handle_frame(2, &move_frame(12, 28));
        assert!(session.take_outgoing().is_empty());
        assert_eq!(session.rules().to_epd(), Board::new().to_epd());

        session.handle_message(1, Message::GiveUp);
        assert_eq!(session.status(), Status::GameEnded);
        assert_eq!(session.outcome(), Some(Outcome::resignation(Side::Black)));
    }

    #[test]
    fn test_stop_is_terminal() {
        let (mut session, _sink) = playing();
        session.stop();
        session.on_connectivity(&[0]);
        session.handle_frame(0, &move_frame(12, 28));

        assert_eq!(
            session.take_outgoing(),
            vec![broadcast(Message::Status(Status::ServerStopped))]
        );
        assert_eq!(session.status(), Status::ServerStopped);
    }

    #[test]
    fn test_garbage_frames_are_ignored() {
        let (mut session, _sink) = playing();
        session.handle_frame(0, &Frame::new(99, vec![1, 2, 3]));
        session.handle_frame(0, &Frame::new(shared::protocol::PACKET_MOVE, vec![12]));
        assert!(session.take_outgoing().is_empty());
        assert_eq!(session.status(), Status::Playing);
    }

    /// Accepts every move and declares a draw after the first one.
    struct DrawAfterOneMove {
        turn: Side,
        moves: usize,
    }

    impl RulesEngine for DrawAfterOneMove {
        fn turn(&self) -> Side {
            self.turn
        }

        fn piece_at(&self, _square: u8) -> Option<Piece> {
            None
        }

        fn is_legal(&self, _mv: &Move) -> bool {
            true
        }

        fn is_capture(&self, _mv: &Move) -> bool {
            false
        }

        fn is_en_passant(&self, _mv: &Move) -> bool {
            false
        }

        fn push(&mut self, _mv: Move) -> Result<(), NetError> {
            self.moves += 1;
            self.turn = self.turn.opponent();
            Ok(())
        }

        fn outcome(&self) -> Option<Outcome> {
            (self.moves > 0).then(|| Outcome::draw(OutcomeKind::Repetition))
        }

        fn snapshot(&self) -> String {
            format!("after {} moves", self.moves)
        }
    }

    #[test]
    fn test_session_works_with_any_rules_engine() {
        let rules = DrawAfterOneMove {
            turn: Side::White,
            moves: 0,
        };
        let mut session = Session::new(
            rules,
            Box::new(MemoryRecordSink::new()),
            Arc::new(ManualClock::new()),
        );
        session.on_connectivity(&[0, 1]);
        session.take_outgoing();

        session.handle_message(0, Message::Move { from: 1, to: 2 });
        let outgoing = session.take_outgoing();
        assert_eq!(
            outgoing[1],
            broadcast(Message::GameOutcome(Outcome::draw(OutcomeKind::Repetition)))
        );
        assert_eq!(
            outgoing[2],
            broadcast(Message::Board {
                is_capture: false,
                state: "after 1 moves".into(),
            })
        );
        assert_eq!(session.record().result.as_deref(), Some("1/2-1/2"));
    }
}
