//! Engine-agnostic evaluation scores.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Evaluation score, always white-relative.
///
/// `Mate(n)` is a signed move count: positive when White delivers mate, negative when
/// Black does. `Cp(n)` is in hundredths of a pawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

impl Score {
    /// Converts a score reported relative to the side to move (UCI convention) into a
    /// white-relative one.
    pub fn from_side_to_move(score: Score, turn: Color) -> Score {
        match turn {
            Color::White => score,
            Color::Black => score.negate(),
        }
    }

    /// Side-relative view of a white-relative score.
    pub fn for_side(self, side: Color) -> Score {
        match side {
            Color::White => self,
            Color::Black => self.negate(),
        }
    }

    pub fn negate(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Score::Mate(_))
    }

    /// Orders two white-relative scores best-first from `pov`'s point of view: winning
    /// mates (shorter first), then centipawns (higher first), then losing mates (longer
    /// first).
    pub fn cmp_best_first(self, other: Score, pov: Color) -> Ordering {
        rank_key(self.for_side(pov)).cmp(&rank_key(other.for_side(pov)))
    }
}

fn rank_key(score: Score) -> (u8, i64) {
    match score {
        Score::Mate(n) if n > 0 => (0, i64::from(n)),
        Score::Cp(cp) => (1, -i64::from(cp)),
        Score::Mate(n) => (2, i64::from(n)),
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::Mate(n) if *n >= 0 => write!(f, "#{n}"),
            Score::Mate(n) => write!(f, "#-{}", n.unsigned_abs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_to_move_scores_become_white_relative() {
        assert_eq!(Score::from_side_to_move(Score::Cp(35), Color::White), Score::Cp(35));
        assert_eq!(Score::from_side_to_move(Score::Cp(35), Color::Black), Score::Cp(-35));
        assert_eq!(Score::from_side_to_move(Score::Mate(2), Color::Black), Score::Mate(-2));
        assert_eq!(Score::Mate(-2).for_side(Color::Black), Score::Mate(2));
    }

    #[test]
    fn best_first_ordering_for_white() {
        let mut scores = vec![
            Score::Cp(-50),
            Score::Mate(-3),
            Score::Mate(5),
            Score::Cp(120),
            Score::Mate(2),
            Score::Mate(-8),
        ];
        scores.sort_by(|a, b| a.cmp_best_first(*b, Color::White));
        assert_eq!(
            scores,
            vec![
                Score::Mate(2),
                Score::Mate(5),
                Score::Cp(120),
                Score::Cp(-50),
                Score::Mate(-8),
                Score::Mate(-3),
            ]
        );
    }

    #[test]
    fn best_first_ordering_for_black_mirrors_white() {
        let mut scores = vec![Score::Cp(30), Score::Mate(-4), Score::Cp(-200)];
        scores.sort_by(|a, b| a.cmp_best_first(*b, Color::Black));
        assert_eq!(scores, vec![Score::Mate(-4), Score::Cp(-200), Score::Cp(30)]);
    }

    #[test]
    fn display() {
        assert_eq!(Score::Cp(34).to_string(), "+0.34");
        assert_eq!(Score::Cp(-150).to_string(), "-1.50");
        assert_eq!(Score::Mate(3).to_string(), "#3");
        assert_eq!(Score::Mate(-3).to_string(), "#-3");
    }
}
