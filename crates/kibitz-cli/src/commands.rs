//! Console command parsing for `kibitz play`.

use std::path::PathBuf;
use std::time::Duration;

use kibitz_core::{Color, Perspective, Piece, Position, Square, UciMove};
use kibitz_session::Difficulty;

pub const HELP: &str = "\
Commands:
  white|black [difficulty]   start free play (difficulty: perfect, strong, good, hints, none)
  difficulty <level>         change the difficulty during free play
  move <uci> | <uci>         play a move, e.g. e2e4 or e7e8q
  auto                       play the suggested move
  undo                       take back one move
  puzzle                     set up a puzzle from the current board
  put <square> <piece>       place a piece, e.g. put e4 N (uppercase is white)
  remove <square>            remove a piece
  clear                      empty the board
  turn white|black           choose the side to move
  start                      start the puzzle
  solve                      show the solution
  exhibit [pace-ms]          watch the engine play itself (starts paused)
  pause | resume             control the exhibition
  pace <ms>                  delay between exhibition moves
  board                      print the board
  fen [FEN]                  print the FEN, or load a position
  save [file] | load <file>  write or read a PGN
  moves                      list the moves played
  new                        back to mode selection
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    FreePlay {
        color: Color,
        difficulty: Option<Difficulty>,
    },
    Difficulty(Difficulty),
    Move(UciMove),
    Auto,
    Undo,
    Puzzle,
    Put {
        square: Square,
        piece: Piece,
    },
    Remove(Square),
    Clear,
    Turn(Color),
    Start,
    Solve,
    Exhibit {
        pace: Option<Duration>,
    },
    Pause,
    Resume,
    Pace(Duration),
    Board,
    Fen(Option<String>),
    Save(Option<PathBuf>),
    Load(PathBuf),
    Moves,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    let cmd = match word.to_ascii_lowercase().as_str() {
        "new" => Command::New,
        "white" | "black" => Command::FreePlay {
            color: colour(word)?,
            difficulty: args.next().map(difficulty).transpose()?,
        },
        "difficulty" => Command::Difficulty(difficulty(required(args.next(), "a level")?)?),
        "move" | "m" => Command::Move(uci(required(args.next(), "a move")?)?),
        "auto" => Command::Auto,
        "undo" => Command::Undo,
        "puzzle" => Command::Puzzle,
        "put" => Command::Put {
            square: square(required(args.next(), "a square")?)?,
            piece: piece(required(args.next(), "a piece")?)?,
        },
        "remove" => Command::Remove(square(required(args.next(), "a square")?)?),
        "clear" => Command::Clear,
        "turn" => Command::Turn(colour(required(args.next(), "a colour")?)?),
        "start" => Command::Start,
        "solve" => Command::Solve,
        "exhibit" => Command::Exhibit {
            pace: args.next().map(millis).transpose()?,
        },
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "pace" => Command::Pace(millis(required(args.next(), "milliseconds")?)?),
        "board" => Command::Board,
        "fen" => Command::Fen((!rest.is_empty()).then(|| rest.to_string())),
        "save" => Command::Save(args.next().map(PathBuf::from)),
        "load" => Command::Load(PathBuf::from(required(args.next(), "a file")?)),
        "moves" => Command::Moves,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "" => return Err("type `help` for commands".to_string()),
        other => match Position::parse_uci(other) {
            Ok(mv) => Command::Move(mv),
            Err(_) => return Err(format!("unknown command `{other}`; type `help`")),
        },
    };
    Ok(cmd)
}

fn required<'a>(arg: Option<&'a str>, what: &str) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("expected {what}"))
}

fn colour(text: &str) -> Result<Color, String> {
    text.parse::<Perspective>().map(Perspective::color)
}

fn difficulty(text: &str) -> Result<Difficulty, String> {
    text.parse()
}

fn uci(text: &str) -> Result<UciMove, String> {
    Position::parse_uci(text).map_err(|e| e.to_string())
}

fn square(text: &str) -> Result<Square, String> {
    text.parse()
        .map_err(|_| format!("`{text}` is not a square"))
}

fn piece(text: &str) -> Result<Piece, String> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => {
            Piece::from_char(ch).ok_or_else(|| format!("`{text}` is not a piece letter"))
        }
        _ => Err(format!("`{text}` is not a piece letter")),
    }
}

fn millis(text: &str) -> Result<Duration, String> {
    text.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("`{text}` is not a number of milliseconds"))
}

#[cfg(test)]
mod tests {
    use kibitz_core::Role;

    use super::*;

    #[test]
    fn parses_mode_commands() {
        assert_eq!(
            parse("white").unwrap(),
            Command::FreePlay {
                color: Color::White,
                difficulty: None
            }
        );
        assert_eq!(
            parse("Black strong").unwrap(),
            Command::FreePlay {
                color: Color::Black,
                difficulty: Some(Difficulty::Strong)
            }
        );
        assert_eq!(
            parse("exhibit 250").unwrap(),
            Command::Exhibit {
                pace: Some(Duration::from_millis(250))
            }
        );
        assert_eq!(parse("exhibit").unwrap(), Command::Exhibit { pace: None });
        assert!(parse("white grandmaster").is_err());
    }

    #[test]
    fn bare_uci_is_a_move() {
        let e4 = Position::parse_uci("e2e4").unwrap();
        assert_eq!(parse("e2e4").unwrap(), Command::Move(e4.clone()));
        assert_eq!(parse("move e2e4").unwrap(), Command::Move(e4));
        assert!(parse("move").is_err());
        assert!(parse("castle").is_err());
    }

    #[test]
    fn parses_setup_commands() {
        assert_eq!(
            parse("put e4 n").unwrap(),
            Command::Put {
                square: Square::E4,
                piece: Piece {
                    color: Color::Black,
                    role: Role::Knight
                }
            }
        );
        assert!(parse("put e9 N").is_err());
        assert!(parse("put e4 X").is_err());
        assert_eq!(parse("remove a1").unwrap(), Command::Remove(Square::A1));
        assert_eq!(parse("turn b").unwrap(), Command::Turn(Color::Black));
    }

    #[test]
    fn fen_keeps_the_whole_argument() {
        assert_eq!(parse("fen").unwrap(), Command::Fen(None));
        assert_eq!(
            parse("fen 8/8/8/8/8/8/8/K6k w - - 0 1").unwrap(),
            Command::Fen(Some("8/8/8/8/8/8/8/K6k w - - 0 1".to_string()))
        );
    }

    #[test]
    fn empty_and_unknown_input() {
        assert!(parse("   ").is_err());
        assert_eq!(parse("quit").unwrap(), Command::Quit);
        assert_eq!(parse("?").unwrap(), Command::Help);
    }
}
