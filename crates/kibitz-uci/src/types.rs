use std::time::Duration;

use kibitz_core::{Score, UciMove};
use serde::{Serialize, Serializer};
use shakmaty::Color;
use smallvec::SmallVec;

/// Principal variation. Most engines report far fewer than 32 plies.
pub type Pv = SmallVec<[UciMove; 32]>;

/// Search bounds. The engine stops at whichever is reached first; with neither set the
/// search runs until the client deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchLimit {
    pub depth: Option<u32>,
    pub movetime: Option<Duration>,
}

impl SearchLimit {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            movetime: None,
        }
    }

    pub fn movetime(movetime: Duration) -> Self {
        Self {
            depth: None,
            movetime: Some(movetime),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.depth.is_none() && self.movetime.is_none()
    }

    /// `go` command for this limit.
    pub fn go_command(&self) -> String {
        if self.is_unbounded() {
            return "go infinite".to_string();
        }
        let mut cmd = String::from("go");
        if let Some(depth) = self.depth {
            cmd.push_str(&format!(" depth {depth}"));
        }
        if let Some(movetime) = self.movetime {
            cmd.push_str(&format!(" movetime {}", movetime.as_millis()));
        }
        cmd
    }
}

/// Number of candidate lines requested (`MultiPV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineCount {
    #[default]
    One,
    Two,
    Four,
}

impl LineCount {
    pub fn get(self) -> u8 {
        match self {
            LineCount::One => 1,
            LineCount::Two => 2,
            LineCount::Four => 4,
        }
    }

    /// Rounds an arbitrary count to the nearest supported one at or below it (minimum 1).
    pub fn at_most(n: u32) -> Self {
        match n {
            0 | 1 => LineCount::One,
            2 | 3 => LineCount::Two,
            _ => LineCount::Four,
        }
    }
}

/// Snapshot of a position to analyse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub fen: String,
    pub turn: Color,
    pub limit: SearchLimit,
    pub lines: LineCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateLine {
    pub rank: u8,
    /// White-relative.
    pub score: Score,
    pub depth: u32,
    #[serde(serialize_with = "serialize_pv")]
    pub pv: Pv,
}

impl CandidateLine {
    pub fn first_move(&self) -> Option<&UciMove> {
        self.pv.first()
    }
}

fn serialize_pv<S: Serializer>(pv: &Pv, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(pv.iter().map(ToString::to_string))
}

/// Result of one advisory request. Lines are ordered best-first for the side to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub lines: Vec<CandidateLine>,
    pub bestmove: Option<UciMove>,
    pub depth: u32,
    pub nodes: u64,
    pub elapsed: Duration,
}

impl Analysis {
    pub fn best(&self) -> Option<&CandidateLine> {
        self.lines.first()
    }

    /// First move of the top line, falling back to the engine's `bestmove`.
    pub fn best_move(&self) -> Option<&UciMove> {
        self.best()
            .and_then(CandidateLine::first_move)
            .or(self.bestmove.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_command_includes_only_present_bounds() {
        assert_eq!(SearchLimit::depth(18).go_command(), "go depth 18");
        assert_eq!(
            SearchLimit::movetime(Duration::from_millis(500)).go_command(),
            "go movetime 500"
        );
        let both = SearchLimit {
            depth: Some(15),
            movetime: Some(Duration::from_millis(500)),
        };
        assert_eq!(both.go_command(), "go depth 15 movetime 500");
        assert_eq!(SearchLimit::default().go_command(), "go infinite");
    }

    #[test]
    fn line_count_rounds_down() {
        assert_eq!(LineCount::at_most(0), LineCount::One);
        assert_eq!(LineCount::at_most(3), LineCount::Two);
        assert_eq!(LineCount::at_most(4).get(), 4);
        assert_eq!(LineCount::at_most(9), LineCount::Four);
    }
}
