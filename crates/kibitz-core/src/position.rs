//! Position model backed by the `shakmaty` rules engine.
//!
//! A [`Position`] always keeps the raw [`Setup`] it was built from. When the rules
//! engine accepts that setup, possibly after repairing castling rights or the
//! en-passant square, a playable [`Chess`] is kept next to it. Otherwise the position
//! can still be handed to a search engine as FEN, but no move can be applied to it.

use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{
    Board, CastlingMode, Chess, Color, EnPassantMode, FromSetup, Move, Piece, Position as _,
    Setup, Square,
};

/// FEN of the standard initial position.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The description could not be parsed at all.
    #[error("malformed position description `{text}`: {reason}")]
    Malformed { text: String, reason: String },

    #[error("invalid move syntax: `{0}`")]
    InvalidMoveSyntax(String),

    /// The move is well formed but not in the legal set.
    #[error("illegal move {uci} in {fen}")]
    IllegalMove { uci: String, fen: String },

    #[error("position cannot be played: {0}")]
    Unplayable(ValidityWarning),
}

/// Rules-engine complaint about a position that was still accepted for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityWarning {
    message: String,
    playable: bool,
}

impl ValidityWarning {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `true` when the rules engine could repair the defect and moves can be applied.
    pub fn is_playable(&self) -> bool {
        self.playable
    }
}

impl fmt::Display for ValidityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.playable {
            write!(f, "{} (repaired)", self.message)
        } else {
            write!(f, "{} (analysis only)", self.message)
        }
    }
}

/// Terminal-state classification after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }

    /// PGN result token.
    pub fn result_token(self) -> &'static str {
        match self {
            GameStatus::Ongoing => "*",
            GameStatus::Checkmate {
                winner: Color::White,
            } => "1-0",
            GameStatus::Checkmate {
                winner: Color::Black,
            } => "0-1",
            GameStatus::Stalemate | GameStatus::InsufficientMaterial => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Ongoing => f.write_str("game in progress"),
            GameStatus::Checkmate { winner } => {
                write!(f, "checkmate, {} wins", side_name(*winner))
            }
            GameStatus::Stalemate => f.write_str("stalemate, draw"),
            GameStatus::InsufficientMaterial => f.write_str("insufficient material, draw"),
        }
    }
}

/// Capitalized side name used in status text.
pub fn side_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    setup: Setup,
    chess: Option<Chess>,
    warning: Option<ValidityWarning>,
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_chess(Chess::default(), None)
    }

    /// Parses a FEN string. Only a malformed description is an error; positions the
    /// rules engine rejects come back with a [`ValidityWarning`].
    pub fn from_fen(text: &str) -> Result<Self, PositionError> {
        let trimmed = text.trim();
        let fen = Fen::from_ascii(trimmed.as_bytes()).map_err(|e| PositionError::Malformed {
            text: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_setup(fen.into_setup()))
    }

    pub fn from_setup(setup: Setup) -> Self {
        match Chess::from_setup(setup.clone(), CastlingMode::Standard) {
            Ok(chess) => Self::from_chess(chess, None),
            Err(err) => {
                let message = err.to_string();
                let repaired = err
                    .ignore_invalid_castling_rights()
                    .or_else(|e| e.ignore_invalid_ep_square())
                    .or_else(|e| e.ignore_impossible_check())
                    .or_else(|e| e.ignore_too_much_material());
                match repaired {
                    Ok(chess) => Self::from_chess(
                        chess,
                        Some(ValidityWarning {
                            message,
                            playable: true,
                        }),
                    ),
                    Err(_) => Self {
                        setup,
                        chess: None,
                        warning: Some(ValidityWarning {
                            message,
                            playable: false,
                        }),
                    },
                }
            }
        }
    }

    fn from_chess(chess: Chess, warning: Option<ValidityWarning>) -> Self {
        let setup = Fen::from_position(chess.clone(), EnPassantMode::Legal).into_setup();
        Self {
            setup,
            chess: Some(chess),
            warning,
        }
    }

    pub fn fen(&self) -> String {
        Fen::from_setup(self.setup.clone()).to_string()
    }

    pub fn turn(&self) -> Color {
        self.setup.turn
    }

    pub fn board(&self) -> &Board {
        &self.setup.board
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.setup.board.piece_at(sq)
    }

    pub fn warning(&self) -> Option<&ValidityWarning> {
        self.warning.as_ref()
    }

    pub fn is_playable(&self) -> bool {
        self.chess.is_some()
    }

    /// Rules-engine view, present only for playable positions.
    pub fn chess(&self) -> Option<&Chess> {
        self.chess.as_ref()
    }

    pub fn is_check(&self) -> bool {
        self.chess.as_ref().is_some_and(|c| c.is_check())
    }

    pub fn status(&self) -> GameStatus {
        let Some(chess) = self.chess.as_ref() else {
            return GameStatus::Ongoing;
        };
        if chess.is_checkmate() {
            GameStatus::Checkmate {
                winner: !chess.turn(),
            }
        } else if chess.is_stalemate() {
            GameStatus::Stalemate
        } else if chess.is_insufficient_material() {
            GameStatus::InsufficientMaterial
        } else {
            GameStatus::Ongoing
        }
    }

    pub fn legal_moves(&self) -> Vec<UciMove> {
        match self.chess.as_ref() {
            Some(chess) => chess
                .legal_moves()
                .iter()
                .map(|m| m.to_uci(CastlingMode::Standard))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn parse_uci(text: &str) -> Result<UciMove, PositionError> {
        let trimmed = text.trim();
        UciMove::from_ascii(trimmed.as_bytes())
            .map_err(|_| PositionError::InvalidMoveSyntax(trimmed.to_string()))
    }

    /// Resolves a UCI move against the legal set.
    pub fn to_move(&self, uci: &UciMove) -> Result<Move, PositionError> {
        let chess = self.playable()?;
        uci.to_move(chess).map_err(|_| PositionError::IllegalMove {
            uci: uci.to_string(),
            fen: self.fen(),
        })
    }

    pub fn is_legal(&self, uci: &UciMove) -> bool {
        self.to_move(uci).is_ok()
    }

    /// Applies a legal move. On error the position is left untouched.
    pub fn play(&mut self, uci: &UciMove) -> Result<(), PositionError> {
        let m = self.to_move(uci)?;
        if let Some(chess) = self.chess.as_mut() {
            chess.play_unchecked(&m);
            self.setup = Fen::from_position(chess.clone(), EnPassantMode::Legal).into_setup();
            self.warning = None;
        }
        Ok(())
    }

    pub fn put_piece(&mut self, sq: Square, piece: Piece) {
        self.edit(|setup| setup.board.set_piece_at(sq, piece));
    }

    pub fn remove_piece(&mut self, sq: Square) -> Option<Piece> {
        let mut removed = None;
        self.edit(|setup| removed = setup.board.remove_piece_at(sq));
        removed
    }

    pub fn set_turn(&mut self, color: Color) {
        self.edit(|setup| {
            setup.turn = color;
            setup.ep_square = None;
        });
    }

    /// Empties the board. The result has no kings and is therefore unplayable until
    /// both kings are placed again.
    pub fn clear(&mut self) {
        let turn = self.setup.turn;
        self.edit(|setup| {
            *setup = Setup::empty();
            setup.turn = turn;
        });
    }

    fn edit(&mut self, f: impl FnOnce(&mut Setup)) {
        let mut setup = self.setup.clone();
        f(&mut setup);
        *self = Self::from_setup(setup);
    }

    /// Rules-engine view, or [`PositionError::Unplayable`] when there is none.
    pub fn playable(&self) -> Result<&Chess, PositionError> {
        self.chess.as_ref().ok_or_else(|| {
            PositionError::Unplayable(self.warning.clone().unwrap_or_else(|| ValidityWarning {
                message: "position rejected by rules engine".to_string(),
                playable: false,
            }))
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen())
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.setup == other.setup
    }
}
