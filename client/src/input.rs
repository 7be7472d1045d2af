//! Parsing of typed player commands

use shared::chess::parse_square;
use shared::Move;
use thiserror::Error;

/// A command entered at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move { from: u8, to: u8 },
    Resign,
    Board,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("'{0}' is not a square")]
    InvalidSquare(String),
}

pub const HELP: &str = "\
Commands:
  e2e4 | e2 e4 | e2-e4   move a piece (pawns reaching the last rank become queens)
  resign                 give up the game
  board                  show the board again
  help                   show this text
  quit                   leave the session";

/// Parses one line of input
pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let line = line.trim().to_ascii_lowercase();
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        [] => Err(InputError::Empty),
        ["resign"] | ["give", "up"] | ["gg"] => Ok(Command::Resign),
        ["board"] | ["b"] => Ok(Command::Board),
        ["help"] | ["h"] | ["?"] => Ok(Command::Help),
        ["quit"] | ["exit"] | ["q"] => Ok(Command::Quit),
        ["move", rest @ ..] => parse_move(&rest.concat()),
        [from, to] => parse_move(&format!("{}{}", from, to)),
        [single] => parse_move(single),
        _ => Err(InputError::Unknown(line.clone())),
    }
}

fn parse_move(text: &str) -> Result<Command, InputError> {
    let compact: String = text.chars().filter(|c| *c != '-').collect();
    if let Some(mv) = Move::from_uci(&compact) {
        return Ok(Command::Move {
            from: mv.from,
            to: mv.to,
        });
    }
    if compact.len() == 4 && compact.is_ascii() {
        for name in [&compact[..2], &compact[2..]] {
            if parse_square(name).is_none() {
                return Err(InputError::InvalidSquare(name.to_string()));
            }
        }
    }
    Err(InputError::Unknown(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_notations() {
        let expected = Command::Move { from: 12, to: 28 };
        for line in ["e2e4", "e2 e4", "E2-E4", "move e2e4", "move e2 e4", "  e2e4  "] {
            assert_eq!(parse_command(line), Ok(expected), "{}", line);
        }
    }

    #[test]
    fn test_promotion_letter_is_accepted() {
        assert_eq!(
            parse_command("a7a8q"),
            Ok(Command::Move { from: 48, to: 56 })
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_command("resign"), Ok(Command::Resign));
        assert_eq!(parse_command("give up"), Ok(Command::Resign));
        assert_eq!(parse_command("Board"), Ok(Command::Board));
        assert_eq!(parse_command("?"), Ok(Command::Help));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_command("   "), Err(InputError::Empty));
        assert_eq!(
            parse_command("e9e4"),
            Err(InputError::InvalidSquare("e9".to_string()))
        );
        assert!(matches!(
            parse_command("dance"),
            Err(InputError::Unknown(_))
        ));
    }
}
