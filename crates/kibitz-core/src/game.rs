//! Game history: the move sequence played from an initial position plus an undo stack.

use shakmaty::uci::UciMove;

use crate::position::{Position, PositionError};

#[derive(Debug, Clone, Default)]
pub struct Game {
    initial: Position,
    current: Position,
    moves: Vec<UciMove>,
    history: Vec<Position>,
}

impl Game {
    pub fn new(initial: Position) -> Self {
        Self {
            current: initial.clone(),
            initial,
            moves: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Replays `moves` from `initial`. Fails on the first illegal move.
    pub fn from_moves(initial: Position, moves: &[UciMove]) -> Result<Self, PositionError> {
        let mut game = Self::new(initial);
        for mv in moves {
            game.push(mv)?;
        }
        Ok(game)
    }

    pub fn initial(&self) -> &Position {
        &self.initial
    }

    pub fn current(&self) -> &Position {
        &self.current
    }

    pub fn moves(&self) -> &[UciMove] {
        &self.moves
    }

    pub fn last_move(&self) -> Option<&UciMove> {
        self.moves.last()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Applies a legal move. On error nothing changes.
    pub fn push(&mut self, mv: &UciMove) -> Result<(), PositionError> {
        let mut next = self.current.clone();
        next.play(mv)?;
        let prev = std::mem::replace(&mut self.current, next);
        self.history.push(prev);
        self.moves.push(mv.clone());
        Ok(())
    }

    /// Takes back the last move, returning it.
    pub fn undo(&mut self) -> Option<UciMove> {
        let prev = self.history.pop()?;
        self.current = prev;
        self.moves.pop()
    }

    /// Replaces the current position after a setup edit. The edited position becomes the
    /// new starting point and the move history is dropped.
    pub fn reset_to(&mut self, position: Position) {
        *self = Self::new(position);
    }
}
