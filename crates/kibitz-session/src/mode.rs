use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use kibitz_core::{Color, GameStatus, side_name};
use kibitz_uci::LineCount;

/// How much help the player gets in free play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
    #[default]
    Perfect,
    Strong,
    Good,
    HintsOnly,
    NoHelp,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Perfect,
        Difficulty::Strong,
        Difficulty::Good,
        Difficulty::HintsOnly,
        Difficulty::NoHelp,
    ];

    /// Lines to request, or `None` when no request is made at all.
    pub fn line_count(self) -> Option<LineCount> {
        match self {
            Difficulty::Perfect | Difficulty::HintsOnly => Some(LineCount::One),
            Difficulty::Strong => Some(LineCount::Two),
            Difficulty::Good => Some(LineCount::Four),
            Difficulty::NoHelp => None,
        }
    }

    /// Candidate moves shown on the player's turn.
    pub fn surfaced_lines(self) -> usize {
        match self {
            Difficulty::Perfect => 1,
            Difficulty::Strong => 2,
            Difficulty::Good => 4,
            Difficulty::HintsOnly | Difficulty::NoHelp => 0,
        }
    }

    /// Whether `auto` may play the top line. Always the top line, never a weaker one.
    pub fn auto_applies(self) -> bool {
        matches!(
            self,
            Difficulty::Perfect | Difficulty::Strong | Difficulty::Good
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Perfect => "perfect",
            Difficulty::Strong => "strong",
            Difficulty::Good => "good",
            Difficulty::HintsOnly => "hints",
            Difficulty::NoHelp => "none",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "perfect" => Ok(Difficulty::Perfect),
            "strong" => Ok(Difficulty::Strong),
            "good" => Ok(Difficulty::Good),
            "hints" | "hints-only" | "hint" => Ok(Difficulty::HintsOnly),
            "none" | "no-help" | "off" => Ok(Difficulty::NoHelp),
            other => Err(format!(
                "unknown difficulty `{other}` (perfect, strong, good, hints, none)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FreePlay { player: Color, difficulty: Difficulty },
    PuzzleSetup,
    PuzzleActive,
    Exhibition { running: bool, pace: Duration },
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::FreePlay { player, difficulty } => {
                write!(f, "free play as {} ({difficulty})", side_name(*player))
            }
            Mode::PuzzleSetup => f.write_str("puzzle setup"),
            Mode::PuzzleActive => f.write_str("puzzle"),
            Mode::Exhibition { running, pace } => write!(
                f,
                "exhibition ({}, {} ms per move)",
                if *running { "running" } else { "paused" },
                pace.as_millis()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    ModeSelect,
    Active(Mode),
    GameOver { prior: Mode, status: GameStatus },
}

impl SessionState {
    pub fn mode(&self) -> Option<&Mode> {
        match self {
            SessionState::Active(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self, SessionState::GameOver { .. })
    }
}
