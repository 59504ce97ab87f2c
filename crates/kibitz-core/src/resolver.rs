//! Turns free-form board descriptions into positions.
//!
//! The perception service is asked to list the board one rank per line
//! (`8:rnbqkbnr` ... `1:RNBQKBNR`, `.` for empty squares). When all eight ranks are
//! present they are assembled directly. Otherwise the first slash-separated placement
//! field found anywhere in the text is taken as a low-confidence fallback.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use shakmaty::Color;

use crate::position::{Position, PositionError};

static RANK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([1-8]):([rnbqkpRNBQKP.]{8})$").expect("rank line pattern compiles")
});

static PLACEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([rnbqkpRNBQKP1-8]+/){7}[rnbqkpRNBQKP1-8]+").expect("placement pattern compiles")
});

/// The colour the player is playing, which is also the side to move in the resolved
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Perspective(pub Color);

impl Perspective {
    pub const WHITE: Perspective = Perspective(Color::White);
    pub const BLACK: Perspective = Perspective(Color::Black);

    pub fn color(self) -> Color {
        self.0
    }

    fn fen_char(self) -> char {
        match self.0 {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }
}

impl Default for Perspective {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Perspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Self::WHITE),
            "black" | "b" => Ok(Self::BLACK),
            other => Err(format!("unknown colour `{other}` (expected white or black)")),
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// How the placement field was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// All eight rank lines were present.
    Structured,
    /// Pattern match on a raw placement field.
    PatternFallback,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub fen: String,
    pub source: ResolutionSource,
    pub position: Position,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("could not find a board in the description")]
    NoBoardFound,

    #[error("resolved board is not a valid position")]
    Malformed(#[source] PositionError),
}

/// Resolves a textual board description for the given perspective.
pub fn resolve(text: &str, perspective: Perspective) -> Result<Resolution, ResolutionError> {
    let (placement, source) = match structured_placement(text) {
        Some(placement) => (placement, ResolutionSource::Structured),
        None => {
            let found = PLACEMENT
                .find(text)
                .ok_or(ResolutionError::NoBoardFound)?;
            debug!("falling back to raw placement field `{}`", found.as_str());
            (found.as_str().to_string(), ResolutionSource::PatternFallback)
        }
    };

    let fen = format!("{placement} {} KQkq - 0 1", perspective.fen_char());
    let position = Position::from_fen(&fen).map_err(ResolutionError::Malformed)?;
    if let Some(warning) = position.warning() {
        warn!("resolved position {fen}: {warning}");
    }
    Ok(Resolution {
        fen,
        source,
        position,
    })
}

fn structured_placement(text: &str) -> Option<String> {
    let mut ranks: BTreeMap<u8, &str> = BTreeMap::new();
    for line in text.lines() {
        if let Some(caps) = RANK_LINE.captures(line.trim()) {
            let rank = caps[1].as_bytes()[0] - b'0';
            let squares = caps.get(2).map_or("", |m| m.as_str());
            ranks.insert(rank, squares);
        }
    }
    if ranks.len() != 8 {
        if !ranks.is_empty() {
            debug!("only {} of 8 rank lines found", ranks.len());
        }
        return None;
    }
    let rows: Vec<String> = ranks.values().rev().map(|squares| encode_rank(squares)).collect();
    Some(rows.join("/"))
}

fn encode_rank(squares: &str) -> String {
    let mut out = String::with_capacity(8);
    let mut empty = 0u8;
    for ch in squares.chars() {
        if ch == '.' {
            empty += 1;
            continue;
        }
        if empty > 0 {
            out.push(char::from(b'0' + empty));
            empty = 0;
        }
        out.push(ch);
    }
    if empty > 0 {
        out.push(char::from(b'0' + empty));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::STARTPOS_FEN;

    const START_LINES: &str = "\
Here is the board:
8:rnbqkbnr
7:pppppppp
6:........
5:........
4:........
3:........
2:PPPPPPPP
1:RNBQKBNR
";

    #[test]
    fn start_grid_resolves_to_standard_fen() {
        let res = resolve(START_LINES, Perspective::WHITE).unwrap();
        assert_eq!(res.fen, STARTPOS_FEN);
        assert_eq!(res.source, ResolutionSource::Structured);
        assert!(res.position.warning().is_none());
    }

    #[test]
    fn black_perspective_sets_side_to_move() {
        let res = resolve(START_LINES, Perspective::BLACK).unwrap();
        assert!(res.fen.contains(" b KQkq - 0 1"));
        assert_eq!(res.position.turn(), Color::Black);
    }

    #[test]
    fn rank_lines_are_order_independent_and_later_duplicates_win() {
        let text = "\
  1:RNBQKBNR
2:PPPPPPPP
3:........
4:....P...
4:........
5:........
6:........
7:pppppppp
8:rnbqkbnr  ";
        let res = resolve(text, Perspective::WHITE).unwrap();
        assert_eq!(res.fen, STARTPOS_FEN);
    }

    #[test]
    fn resolved_placement_round_trips() {
        let text = "\
8:r...k..r
7:pp.n.ppp
6:..p.bn..
5:...p....
4:...P....
3:..N.BN..
2:PPP..PPP
1:R..QK..R";
        let res = resolve(text, Perspective::WHITE).unwrap();
        let placement = res.position.fen();
        assert_eq!(
            placement.split(' ').next(),
            Some("r3k2r/pp1n1ppp/2p1bn2/3p4/3P4/2N1BN2/PPP2PPP/R2QK2R")
        );
        assert!(res.position.is_playable());
    }

    #[test]
    fn falls_back_to_raw_placement() {
        let text = "I think the board is 4k3/8/8/8/8/8/4P3/4K3 with white to move.";
        let res = resolve(text, Perspective::WHITE).unwrap();
        assert_eq!(res.source, ResolutionSource::PatternFallback);
        assert!(res.fen.starts_with("4k3/8/8/8/8/8/4P3/4K3 w "));
    }

    #[test]
    fn seven_ranks_plus_pattern_uses_fallback() {
        let text = "8:....k...\n7:........\n6:........\n5:........\n4:........\n3:........\n2:....P...\n\
                    FEN: 4k3/8/8/8/8/8/4P3/4K3";
        let res = resolve(text, Perspective::WHITE).unwrap();
        assert_eq!(res.source, ResolutionSource::PatternFallback);
    }

    #[test]
    fn nothing_recognisable_is_an_error() {
        let err = resolve("a photo of a cat", Perspective::WHITE).unwrap_err();
        assert!(matches!(err, ResolutionError::NoBoardFound));
    }

    #[test]
    fn missing_king_resolves_with_warning() {
        let text = "8:........\n7:........\n6:........\n5:........\n4:........\n3:........\n2:........\n1:....K...";
        let res = resolve(text, Perspective::WHITE).unwrap();
        assert!(res.position.warning().is_some());
        assert!(!res.position.is_playable());
    }

    #[test]
    fn perspective_parses_loosely() {
        assert_eq!("White".parse::<Perspective>().unwrap(), Perspective::WHITE);
        assert_eq!("b".parse::<Perspective>().unwrap(), Perspective::BLACK);
        assert!("red".parse::<Perspective>().is_err());
    }
}
