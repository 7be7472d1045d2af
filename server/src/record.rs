//! Persisted record of a played game.
//!
//! After every accepted move the session serializes its [`MoveRecord`] to JSON
//! and hands it to a [`RecordSink`] under a key derived from the player names
//! and the start time, e.g. `alice_bob_2024-03-01_18-30-00`.

use chrono::{DateTime, Local};
use deunicode::deunicode;
use log::debug;
use serde::{Deserialize, Serialize};
use shared::chess::{Board, STARTING_FEN};
use shared::{Move, Outcome};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Timestamp layout used inside record keys.
pub const KEY_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub white: String,
    pub black: String,
    /// RFC 3339 start time, set when play begins.
    pub started_at: Option<String>,
    pub initial_position: String,
    /// Moves in UCI notation.
    pub moves: Vec<String>,
    /// `1-0`, `0-1` or `1/2-1/2` once the game has a result.
    pub result: Option<String>,
    pub termination: Option<String>,
}

impl Default for MoveRecord {
    fn default() -> Self {
        Self {
            white: String::new(),
            black: String::new(),
            started_at: None,
            initial_position: STARTING_FEN.to_string(),
            moves: Vec::new(),
            result: None,
            termination: None,
        }
    }
}

impl MoveRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, at: &DateTime<Local>) {
        self.started_at = Some(at.to_rfc3339());
    }

    pub fn push_move(&mut self, mv: &Move) {
        self.moves.push(mv.to_string());
    }

    pub fn finish(&mut self, outcome: &Outcome) {
        self.result = Some(outcome.result_tag().to_string());
        self.termination = Some(format!("{:?}", outcome.kind));
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Replays the recorded moves from the initial position.
    pub fn replay(&self) -> Option<Board> {
        let mut board = Board::from_fen(&self.initial_position).ok()?;
        for text in &self.moves {
            let mv = Move::from_uci(text)?;
            board.push(mv).ok()?;
        }
        Some(board)
    }
}

/// Storage key `{white}_{black}_{start}` restricted to filesystem-safe ASCII.
pub fn record_key(white: &str, black: &str, started: &DateTime<Local>) -> String {
    sanitize_key(&format!(
        "{}_{}_{}",
        white,
        black,
        started.format(KEY_TIME_FORMAT)
    ))
}

/// Transliterates `raw` to ASCII, then keeps letters, digits, `-` and `_`.
/// Whitespace and path characters become `_`; anything else is dropped.
pub fn sanitize_key(raw: &str) -> String {
    deunicode(raw)
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            '/' | '\\' | '.' | ':' => Some('_'),
            _ => None,
        })
        .collect()
}

/// Destination for serialized game records.
pub trait RecordSink {
    /// Stores `contents` under `key`, replacing any previous version.
    fn persist(&mut self, key: &str, contents: &str) -> io::Result<()>;
}

/// Writes each record to `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileRecordSink {
    dir: PathBuf,
}

impl FileRecordSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl RecordSink for FileRecordSink {
    fn persist(&mut self, key: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        fs::write(&path, contents)?;
        debug!("Saved game record to {}", path.display());
        Ok(())
    }
}

/// Keeps records in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSink {
    records: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordSink for MemoryRecordSink {
    fn persist(&mut self, key: &str, contents: &str) -> io::Result<()> {
        self.lock().insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::{OutcomeKind, Side};

    fn start_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 18, 30, 5).unwrap()
    }

    #[test]
    fn test_record_key_format() {
        assert_eq!(
            record_key("alice", "bob", &start_time()),
            "alice_bob_2024-03-01_18-30-05"
        );
    }

    #[test]
    fn test_key_is_filesystem_safe() {
        assert_eq!(sanitize_key("José Müller"), "Jose_Muller");
        assert_eq!(sanitize_key("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_key("Иван"), "Ivan");
        assert!(sanitize_key("王伟").starts_with("Wang"));
        assert!(!sanitize_key("王").is_empty());
        assert_eq!(
            record_key("Łukasz", "a b", &start_time()),
            "Lukasz_a_b_2024-03-01_18-30-05"
        );

        let key = record_key("Иван", "王伟", &start_time());
        assert!(key.starts_with("Ivan_Wang"), "{}", key);
        assert!(key.ends_with("_2024-03-01_18-30-05"));
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_record_tracks_moves_and_result() {
        let mut record = MoveRecord::new();
        record.white = "alice".into();
        record.start(&start_time());
        record.push_move(&Move::new(12, 28));
        record.push_move(&Move::new(52, 36));
        record.finish(&Outcome::resignation(Side::Black));

        assert_eq!(record.moves, vec!["e2e4", "e7e5"]);
        assert_eq!(record.result.as_deref(), Some("1-0"));
        assert_eq!(record.termination.as_deref(), Some("Resignation"));

        let parsed = MoveRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_replay_rebuilds_position() {
        let mut record = MoveRecord::new();
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            record.moves.push(uci.to_string());
        }
        let board = record.replay().unwrap();
        assert_eq!(
            board.outcome(),
            Some(Outcome::decisive(OutcomeKind::Checkmate, Side::Black))
        );
    }

    #[test]
    fn test_file_sink_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileRecordSink::new(dir.path().join("matches"));

        sink.persist("a_b_2024", "{}").unwrap();
        sink.persist("a_b_2024", "{\"moves\":[]}").unwrap();

        let written = fs::read_to_string(dir.path().join("matches/a_b_2024.json")).unwrap();
        assert_eq!(written, "{\"moves\":[]}");
    }

    #[test]
    fn test_memory_sink_shares_storage_between_clones() {
        let sink = MemoryRecordSink::new();
        let mut writer = sink.clone();
        writer.persist("k", "v").unwrap();

        assert_eq!(sink.get("k").as_deref(), Some("v"));
        assert_eq!(sink.keys(), vec!["k".to_string()]);
    }
}
