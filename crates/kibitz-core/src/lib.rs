//! Chess position handling for the kibitz assistant.
//!
//! - [`position`]: FEN parsing, legality and setup edits on top of `shakmaty`
//! - [`game`]: move history with undo
//! - [`resolver`]: board extraction from perception-service text
//! - [`describe`]: human-readable moves, lines and evaluations
//! - [`record`]: PGN read/write
//! - [`score`]: white-relative engine scores

pub mod describe;
pub mod game;
pub mod position;
pub mod record;
pub mod resolver;
pub mod score;

pub use describe::{annotate, describe, describe_line, describe_score, san};
pub use game::Game;
pub use position::{GameStatus, Position, PositionError, STARTPOS_FEN, ValidityWarning, side_name};
pub use record::{GameHeaders, LoadedGame, RecordError, read_pgn, write_pgn};
pub use resolver::{Perspective, Resolution, ResolutionError, ResolutionSource, resolve};
pub use score::Score;

pub use shakmaty;
pub use shakmaty::uci::UciMove;
pub use shakmaty::{Color, Piece, Role, Square};
