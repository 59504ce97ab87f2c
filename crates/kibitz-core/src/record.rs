//! PGN game records.
//!
//! Writing emits the Seven Tag Roster (plus `SetUp`/`FEN` for non-standard starts) and
//! SAN movetext wrapped at 80 columns. Reading accepts a single game, keeps the header
//! tags and replays the mainline through the rules engine.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Color, Position as _};

use crate::game::Game;
use crate::position::{Position, PositionError, STARTPOS_FEN};

const LINE_WIDTH: usize = 80;

static TAG_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\[([A-Za-z0-9_]+)\s+"((?:[^"\\]|\\.)*)"\]$"#).expect("tag pair pattern compiles")
});

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed header line `{0}`")]
    Header(String),

    #[error("unbalanced `{0}` in movetext")]
    Unbalanced(char),

    #[error("unreadable move `{san}` at ply {ply}")]
    San { san: String, ply: usize },

    #[error("move `{san}` at ply {ply} is not legal")]
    IllegalSan { san: String, ply: usize },

    #[error("invalid starting position")]
    Position(#[from] PositionError),
}

/// Header values written with a game. `Result` is derived from the final position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameHeaders {
    pub event: String,
    pub site: String,
    pub date: NaiveDate,
    pub round: String,
    pub white: String,
    pub black: String,
}

impl GameHeaders {
    /// Headers for a game where the assisted player has `player`.
    pub fn for_player(player: Color) -> Self {
        let (white, black) = match player {
            Color::White => ("Player", "Opponent"),
            Color::Black => ("Opponent", "Player"),
        };
        Self {
            event: "Chess Assistant Game".to_string(),
            site: "?".to_string(),
            date: Local::now().date_naive(),
            round: "?".to_string(),
            white: white.to_string(),
            black: black.to_string(),
        }
    }
}

impl Default for GameHeaders {
    fn default() -> Self {
        Self::for_player(Color::White)
    }
}

/// A game read back from PGN.
#[derive(Debug, Clone)]
pub struct LoadedGame {
    pub tags: BTreeMap<String, String>,
    pub game: Game,
    /// Result token found in the movetext, if any.
    pub result: Option<String>,
}

/// Default save file name, `chess_game_YYYYMMDD_HHMMSS.pgn`.
pub fn default_file_name() -> String {
    format!("chess_game_{}.pgn", Local::now().format("%Y%m%d_%H%M%S"))
}

pub fn write_pgn(game: &Game, headers: &GameHeaders) -> String {
    let result = game.current().status().result_token();
    let mut out = String::new();
    let mut tag = |name: &str, value: &str| {
        out.push_str(&format!("[{name} \"{}\"]\n", escape(value)));
    };
    tag("Event", &headers.event);
    tag("Site", &headers.site);
    tag("Date", &headers.date.format("%Y.%m.%d").to_string());
    tag("Round", &headers.round);
    tag("White", &headers.white);
    tag("Black", &headers.black);
    tag("Result", result);
    let initial_fen = game.initial().fen();
    if initial_fen != STARTPOS_FEN {
        tag("SetUp", "1");
        tag("FEN", &initial_fen);
    }
    out.push('\n');

    let mut tokens = movetext_tokens(game);
    tokens.push(result.to_string());
    out.push_str(&wrap(&tokens));
    out.push('\n');
    out
}

fn movetext_tokens(game: &Game) -> Vec<String> {
    let initial = game.initial();
    let Some(start) = initial.chess() else {
        return Vec::new();
    };
    let mut chess = start.clone();
    let mut number = fullmove_number(&initial.fen());
    let mut tokens = Vec::new();
    for (ply, uci) in game.moves().iter().enumerate() {
        let turn = chess.turn();
        if turn == Color::White {
            tokens.push(format!("{number}."));
        } else if ply == 0 {
            tokens.push(format!("{number}..."));
        }
        let Ok(m) = uci.to_move(&chess) else {
            break;
        };
        tokens.push(SanPlus::from_move_and_play_unchecked(&mut chess, &m).to_string());
        if turn == Color::Black {
            number += 1;
        }
    }
    tokens
}

fn fullmove_number(fen: &str) -> u32 {
    fen.split_whitespace()
        .nth(5)
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

fn wrap(tokens: &[String]) -> String {
    let mut out = String::new();
    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + 1 + token.len() > LINE_WIDTH {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(token);
        line_len += token.len();
    }
    out
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Reads the first game in `text`.
pub fn read_pgn(text: &str) -> Result<LoadedGame, RecordError> {
    let mut tags = BTreeMap::new();
    let mut movetext = String::new();
    let mut in_headers = true;
    for line in text.lines() {
        let trimmed = line.trim();
        if in_headers {
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') {
                let caps = TAG_PAIR
                    .captures(trimmed)
                    .ok_or_else(|| RecordError::Header(trimmed.to_string()))?;
                tags.insert(caps[1].to_string(), unescape(&caps[2]));
                continue;
            }
            in_headers = false;
        } else if trimmed.starts_with('[') && !movetext.trim().is_empty() {
            // start of the next game
            break;
        }
        if trimmed.starts_with('%') {
            continue;
        }
        movetext.push_str(line);
        movetext.push('\n');
    }

    let initial = match tags.get("FEN") {
        Some(fen) => Position::from_fen(fen)?,
        None => Position::startpos(),
    };
    let (sans, result) = mainline_tokens(&movetext)?;
    debug!("read {} tags and {} plies", tags.len(), sans.len());

    let mut game = Game::new(initial);
    for (idx, token) in sans.iter().enumerate() {
        let ply = idx + 1;
        let san = SanPlus::from_ascii(token.as_bytes()).map_err(|_| RecordError::San {
            san: token.clone(),
            ply,
        })?;
        let chess = game.current().playable()?;
        let m = san.san.to_move(chess).map_err(|_| RecordError::IllegalSan {
            san: token.clone(),
            ply,
        })?;
        game.push(&m.to_uci(CastlingMode::Standard))?;
    }
    Ok(LoadedGame { tags, game, result })
}

/// Splits movetext into mainline SAN tokens, dropping comments, variations, NAGs and
/// move numbers.
fn mainline_tokens(movetext: &str) -> Result<(Vec<String>, Option<String>), RecordError> {
    let mut sans = Vec::new();
    let mut result = None;
    let mut depth = 0usize;
    let mut chars = movetext.chars();
    let mut word = String::new();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush(&mut word, &mut sans, &mut result);
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(RecordError::Unbalanced('{'));
                }
            }
            ';' => {
                flush(&mut word, &mut sans, &mut result);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush(&mut word, &mut sans, &mut result);
                depth += 1;
            }
            ')' => {
                flush(&mut word, &mut sans, &mut result);
                depth = depth.checked_sub(1).ok_or(RecordError::Unbalanced(')'))?;
            }
            c if c.is_whitespace() => flush(&mut word, &mut sans, &mut result),
            _ if depth > 0 => {}
            c => word.push(c),
        }
    }
    if depth > 0 {
        return Err(RecordError::Unbalanced('('));
    }
    flush(&mut word, &mut sans, &mut result);
    Ok((sans, result))
}

fn flush(word: &mut String, sans: &mut Vec<String>, result: &mut Option<String>) {
    if word.is_empty() {
        return;
    }
    let token = std::mem::take(word);
    if matches!(token.as_str(), "1-0" | "0-1" | "1/2-1/2" | "*") {
        *result = Some(token);
        return;
    }
    let token = token
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
        .trim_end_matches(['!', '?']);
    if !token.is_empty() && !token.starts_with('$') {
        sans.push(token.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uci(text: &str) -> shakmaty::uci::UciMove {
        Position::parse_uci(text).unwrap()
    }

    fn headers() -> GameHeaders {
        GameHeaders {
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            ..GameHeaders::for_player(Color::Black)
        }
    }

    #[test]
    fn writes_seven_tag_roster_and_san() {
        let moves = ["f2f3", "e7e5", "g2g4", "d8h4"].map(uci);
        let game = Game::from_moves(Position::startpos(), &moves).unwrap();
        let pgn = write_pgn(&game, &headers());
        assert!(pgn.starts_with("[Event \"Chess Assistant Game\"]\n[Site \"?\"]\n"));
        assert!(pgn.contains("[Date \"2024.03.09\"]"));
        assert!(pgn.contains("[White \"Opponent\"]"));
        assert!(pgn.contains("[Black \"Player\"]"));
        assert!(pgn.contains("[Result \"0-1\"]"));
        assert!(!pgn.contains("SetUp"));
        assert!(pgn.ends_with("\n1. f3 e5 2. g4 Qh4# 0-1\n"));
    }

    #[test]
    fn non_standard_start_writes_fen_and_black_move_number() {
        let initial = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 b - - 0 7").unwrap();
        let game = Game::from_moves(initial, &[uci("e8d8"), uci("e2e4")]).unwrap();
        let pgn = write_pgn(&game, &headers());
        assert!(pgn.contains("[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 7\"]"));
        assert!(pgn.contains("7... Kd8 8. e4 *"));
    }

    #[test]
    fn movetext_wraps_at_eighty_columns() {
        let moves = [
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6",
            "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ]
        .map(uci);
        let game = Game::from_moves(Position::startpos(), &moves).unwrap();
        let pgn = write_pgn(&game, &headers());
        let movetext = pgn.split("\n\n").nth(1).unwrap();
        assert!(movetext.lines().count() > 1);
        assert!(movetext.lines().all(|l| l.len() <= 80));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let moves = ["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "e1g1"].map(uci);
        let game = Game::from_moves(Position::startpos(), &moves).unwrap();
        let pgn = write_pgn(&game, &headers());
        let loaded = read_pgn(&pgn).unwrap();
        assert_eq!(loaded.game.moves(), game.moves());
        assert_eq!(loaded.tags.get("Event").map(String::as_str), Some("Chess Assistant Game"));
        assert_eq!(loaded.result.as_deref(), Some("*"));
    }

    #[test]
    fn skips_comments_variations_and_nags() {
        let text = r#"[Event "Casual"]
[Site "Here \"there\""]

1. e4 {best by test} e5 $1 2. Nf3 (2. f4 exf4 (2... d5)) Nc6?! ; a comment
3. Bb5 1-0
"#;
        let loaded = read_pgn(text).unwrap();
        let expected: Vec<_> = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"].map(uci).to_vec();
        assert_eq!(loaded.game.moves(), expected.as_slice());
        assert_eq!(loaded.tags.get("Site").map(String::as_str), Some("Here \"there\""));
        assert_eq!(loaded.result.as_deref(), Some("1-0"));
    }

    #[test]
    fn rejects_illegal_san() {
        let err = read_pgn("1. e4 e5 2. Ke3 *").unwrap_err();
        assert!(matches!(err, RecordError::IllegalSan { ply: 3, .. }));
    }

    #[test]
    fn rejects_unbalanced_comment() {
        let err = read_pgn("1. e4 { never closed").unwrap_err();
        assert!(matches!(err, RecordError::Unbalanced('{')));
    }

    #[test]
    fn default_file_name_shape() {
        let name = default_file_name();
        assert!(name.starts_with("chess_game_"));
        assert!(name.ends_with(".pgn"));
        assert_eq!(name.len(), "chess_game_20240309_120000.pgn".len());
    }
}
