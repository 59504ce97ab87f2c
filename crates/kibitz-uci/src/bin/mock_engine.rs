//! Deterministic UCI engine used by the integration tests.
//!
//! Candidate moves are the legal moves of the current position, mating moves first,
//! then captures, then everything else, each group in UCI-string order. No real search
//! is done.
//!
//! Usage:
//!   kibitz-mock-engine                  # answers every `go`
//!   kibitz-mock-engine --slow-ms 2000   # waits before `bestmove`, honouring `stop`
//!   kibitz-mock-engine --hang-on-go     # never answers `go`
//!   kibitz-mock-engine --exit-on-go     # exits when a search starts

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Move, Position};

#[derive(Parser)]
#[command(about = "Deterministic UCI engine for tests")]
struct Cli {
    /// Delay before answering `go`, cut short by `stop`
    #[arg(long, default_value_t = 0)]
    slow_ms: u64,

    /// Never answer `go`
    #[arg(long)]
    hang_on_go: bool,

    /// Exit as soon as `go` arrives
    #[arg(long)]
    exit_on_go: bool,
}

const DEFAULT_DEPTH: u32 = 10;

struct MockEngine {
    cli: Cli,
    position: Chess,
    multipv: usize,
    out: io::Stdout,
}

impl MockEngine {
    fn send(&mut self, line: &str) -> Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    fn handle_uci(&mut self) -> Result<()> {
        self.send("id name kibitz-mock-engine")?;
        self.send("id author kibitz")?;
        self.send("option name Threads type spin default 1 min 1 max 512")?;
        self.send("option name Hash type spin default 16 min 1 max 33554432")?;
        self.send("option name MultiPV type spin default 1 min 1 max 500")?;
        self.send("option name Skill Level type spin default 20 min 0 max 20")?;
        self.send("uciok")
    }

    fn handle_setoption(&mut self, rest: &str) {
        let Some((name, value)) = rest
            .strip_prefix("name ")
            .and_then(|r| r.split_once(" value "))
        else {
            return;
        };
        if name.trim() == "MultiPV" {
            self.multipv = value.trim().parse().unwrap_or(1).max(1);
        }
    }

    fn handle_position(&mut self, rest: &str) -> Result<()> {
        let (base, moves) = match rest.split_once(" moves ") {
            Some((base, moves)) => (base, Some(moves)),
            None => (rest, None),
        };
        let mut pos = if base.trim() == "startpos" {
            Chess::default()
        } else {
            let fen = base.trim().strip_prefix("fen ").context("expected fen")?;
            let fen = Fen::from_ascii(fen.trim().as_bytes())?;
            fen.into_position::<Chess>(CastlingMode::Standard)
                .or_else(|e| e.ignore_invalid_castling_rights())
                .or_else(|e| e.ignore_invalid_ep_square())
                .or_else(|e| e.ignore_impossible_check())
                .or_else(|e| e.ignore_too_much_material())
                .map_err(|e| anyhow::anyhow!("{e}"))?
        };
        for token in moves.unwrap_or_default().split_whitespace() {
            let uci = UciMove::from_ascii(token.as_bytes())?;
            let m = uci.to_move(&pos)?;
            pos.play_unchecked(&m);
        }
        self.position = pos;
        Ok(())
    }

    fn ranked_moves(pos: &Chess) -> Vec<(Move, bool)> {
        let mut moves: Vec<(Move, bool)> = pos
            .legal_moves()
            .into_iter()
            .map(|m| {
                let mut after = pos.clone();
                after.play_unchecked(&m);
                let mates = after.is_checkmate();
                (m, mates)
            })
            .collect();
        moves.sort_by_key(|(m, mates)| {
            (
                !*mates,
                !m.is_capture(),
                m.to_uci(CastlingMode::Standard).to_string(),
            )
        });
        moves
    }

    fn handle_go(&mut self, rest: &str, rx: &Receiver<String>) -> Result<()> {
        if self.cli.exit_on_go {
            std::process::exit(0);
        }
        if self.cli.hang_on_go {
            return Ok(());
        }
        let mut tokens = rest.split_whitespace();
        let mut depth = DEFAULT_DEPTH;
        let mut infinite = false;
        while let Some(tok) = tokens.next() {
            match tok {
                "depth" => {
                    depth = tokens
                        .next()
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(DEFAULT_DEPTH)
                }
                "infinite" => infinite = true,
                _ => {}
            }
        }

        let moves = Self::ranked_moves(&self.position);
        if moves.is_empty() {
            let score = if self.position.is_check() { "mate 0" } else { "cp 0" };
            self.send(&format!("info depth 0 score {score}"))?;
        }
        let shown = moves.len().min(self.multipv);
        for (idx, (m, mates)) in moves.iter().take(shown).enumerate() {
            let score = if *mates {
                "mate 1".to_string()
            } else {
                format!("cp {}", 40 - 7 * idx as i32)
            };
            let mut pv = m.to_uci(CastlingMode::Standard).to_string();
            let mut after = self.position.clone();
            after.play_unchecked(m);
            if let Some((reply, _)) = Self::ranked_moves(&after).first() {
                pv.push(' ');
                pv.push_str(&reply.to_uci(CastlingMode::Standard).to_string());
            }
            self.send(&format!(
                "info depth {depth} seldepth {depth} multipv {} score {score} nodes {} pv {pv}",
                idx + 1,
                1000 * (idx + 1)
            ))?;
        }

        if infinite {
            wait_for_stop(rx, None)?;
        } else if self.cli.slow_ms > 0 {
            wait_for_stop(rx, Some(Duration::from_millis(self.cli.slow_ms)))?;
        }
        match moves.first() {
            Some((m, _)) => {
                let best = m.to_uci(CastlingMode::Standard).to_string();
                self.send(&format!("bestmove {best}"))?;
            }
            None => self.send("bestmove (none)")?,
        }
        Ok(())
    }
}

/// Blocks until `stop` arrives or `limit` elapses. `quit` or a closed stdin ends the
/// process.
fn wait_for_stop(rx: &Receiver<String>, limit: Option<Duration>) -> Result<()> {
    loop {
        let line = match limit {
            Some(limit) => match rx.recv_timeout(limit) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => std::process::exit(0),
            },
            None => match rx.recv() {
                Ok(line) => line,
                Err(_) => std::process::exit(0),
            },
        };
        match line.trim() {
            "stop" => return Ok(()),
            "quit" => std::process::exit(0),
            "isready" => {
                let mut out = io::stdout().lock();
                writeln!(out, "readyok")?;
                out.flush()?;
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (tx, rx) = crossbeam_channel::unbounded::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut engine = MockEngine {
        cli,
        position: Chess::default(),
        multipv: 1,
        out: io::stdout(),
    };
    while let Ok(line) = rx.recv() {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        match cmd {
            "uci" => engine.handle_uci()?,
            "isready" => engine.send("readyok")?,
            "setoption" => engine.handle_setoption(rest),
            "ucinewgame" => engine.position = Chess::default(),
            "position" => {
                if let Err(e) = engine.handle_position(rest) {
                    engine.send(&format!("info string bad position: {e}"))?;
                }
            }
            "go" => engine.handle_go(rest, &rx)?,
            "quit" => break,
            _ => {}
        }
    }
    Ok(())
}
