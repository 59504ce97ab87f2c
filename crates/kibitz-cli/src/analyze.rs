//! One-shot analysis (`kibitz analyze`) and the interactive FEN loop (`kibitz repl`).

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::ArgGroup;
use kibitz_core::{
    Color, Perspective, Position, ResolutionSource, annotate, describe_line, describe_score,
    resolve, san,
};
use kibitz_uci::{Analysis, AnalysisRequest, EngineProcess, LineCount, SearchLimit};
use kibitz_vision::{AnthropicVision, BoardImage, PerceptionService, clipboard_image};
use log::{info, warn};
use serde_json::json;

use crate::config::KibitzConfig;

/// Plies of the best line shown with `--verbose`.
const VERBOSE_LINE_PLIES: usize = 5;

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["fen", "text", "image", "clipboard"])))]
pub struct AnalyzeArgs {
    /// Position as FEN; skips board resolution
    #[arg(long)]
    fen: Option<String>,

    /// Rank listing from a perception service (`-` reads stdin)
    #[arg(long)]
    text: Option<PathBuf>,

    /// Board screenshot to send to the perception service
    #[arg(long)]
    image: Option<PathBuf>,

    /// Send the screenshot currently on the clipboard to the perception service
    #[arg(long)]
    clipboard: bool,

    /// Side you are playing (white|black)
    #[arg(long, default_value = "white")]
    color: Perspective,

    #[command(flatten)]
    search: SearchArgs,

    /// Also print the evaluation, the expected line and alternatives
    #[arg(short, long)]
    verbose: bool,

    /// Ask the perception service why the best move is good
    #[arg(long)]
    explain: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReplArgs {
    /// Side you are playing (white|black)
    #[arg(long, default_value = "white")]
    color: Perspective,

    #[command(flatten)]
    search: SearchArgs,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Candidate lines (1, 2 or 4)
    #[arg(long)]
    lines: Option<u32>,

    /// Search depth
    #[arg(long)]
    depth: Option<u32>,

    /// Search time per position in milliseconds
    #[arg(long)]
    movetime_ms: Option<u64>,
}

impl SearchArgs {
    fn limit(&self, config: &KibitzConfig) -> SearchLimit {
        SearchLimit {
            depth: Some(self.depth.unwrap_or(config.analysis.depth)),
            movetime: Some(Duration::from_millis(
                self.movetime_ms.unwrap_or(config.analysis.movetime_ms),
            )),
        }
    }

    fn lines(&self, config: &KibitzConfig) -> LineCount {
        LineCount::at_most(self.lines.unwrap_or(config.analysis.lines))
    }
}

pub fn run(config: &KibitzConfig, args: &AnalyzeArgs) -> Result<()> {
    let position = load_position(config, args)?;
    let mut engine =
        kibitz_uci::connect(&config.engine_config()).context("engine connection failed")?;
    let analysis = analyse(&mut engine, &position, &args.search, config)?;
    let pov = args.color.color();

    let explanation = if args.explain {
        explain(config, &position, &analysis)
    } else {
        None
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json_report(&position, pov, &analysis))?
        );
    } else {
        let mut text = render(&position, pov, &analysis, args.verbose)?;
        if let Some(why) = explanation {
            text.push_str(&format!("\nWhy: {why}"));
        }
        println!("{text}");
    }
    Ok(())
}

pub fn repl(config: &KibitzConfig, args: &ReplArgs) -> Result<()> {
    let mut engine =
        kibitz_uci::connect(&config.engine_config()).context("engine connection failed")?;
    println!("Connected to {}. Enter a FEN, or `quit`.", engine.name());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        write!(stdout, "FEN>>> ")?;
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            _ => {}
        }
        let position = match Position::from_fen(input) {
            Ok(p) => p,
            Err(e) => {
                println!("Invalid FEN: {e}");
                continue;
            }
        };
        if let Some(warning) = position.warning() {
            println!("Warning: {warning}");
        }
        let report = analyse(&mut engine, &position, &args.search, config)
            .and_then(|analysis| render(&position, args.color.color(), &analysis, true));
        match report {
            Ok(text) => println!("{text}"),
            Err(e) => println!("Error: {e:#}"),
        }
    }
    Ok(())
}

fn load_position(config: &KibitzConfig, args: &AnalyzeArgs) -> Result<Position> {
    if let Some(fen) = &args.fen {
        let position = Position::from_fen(fen).context("invalid FEN")?;
        if let Some(warning) = position.warning() {
            warn!("position {fen}: {warning}");
        }
        return Ok(position);
    }

    let text = if let Some(path) = &args.text {
        read_text(path)?
    } else {
        let image = match &args.image {
            Some(path) => BoardImage::open(path)?,
            None if args.clipboard => clipboard_image().context("clipboard read failed")?,
            None => bail!("one of --fen, --text, --image or --clipboard is required"),
        };
        let vision = AnthropicVision::from_env(config.vision.clone())?;
        vision
            .describe_board(&image, args.color)
            .context("board perception failed")?
    };

    let resolution = resolve(&text, args.color).context("board resolution failed")?;
    if resolution.source == ResolutionSource::PatternFallback {
        warn!("no rank listing found; using placement field from {}", resolution.fen);
    }
    info!("resolved position: {}", resolution.fen);
    Ok(resolution.position)
}

fn read_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).context("read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn analyse(
    engine: &mut EngineProcess,
    position: &Position,
    search: &SearchArgs,
    config: &KibitzConfig,
) -> Result<Analysis> {
    let request = AnalysisRequest {
        fen: position.fen(),
        turn: position.turn(),
        limit: search.limit(config),
        lines: search.lines(config),
    };
    engine
        .analyse(&request, &|| false)
        .context("engine analysis failed")
}

fn explain(config: &KibitzConfig, position: &Position, analysis: &Analysis) -> Option<String> {
    let mv = analysis.best_move()?;
    let san = san(position, mv)?;
    let result = AnthropicVision::from_env(config.vision.clone())
        .and_then(|vision| vision.explain_move(&position.fen(), &san));
    match result {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("no explanation: {e}");
            None
        }
    }
}

/// Human-readable report. Fails when the engine had no move to suggest.
fn render(position: &Position, pov: Color, analysis: &Analysis, verbose: bool) -> Result<String> {
    let Some(best) = analysis.best_move() else {
        bail!("no move to suggest ({})", position.status());
    };
    let mut out = format!("Best move: {}", with_san(position, best));

    if verbose {
        if let Some(line) = analysis.best() {
            out.push_str(&format!(
                "\nEvaluation: {} ({}, depth {})",
                describe_score(line.score, pov),
                line.score,
                line.depth
            ));
            let plies = describe_line(position, &line.pv, VERBOSE_LINE_PLIES);
            if plies.len() > 1 {
                out.push_str(&format!("\nLine: {}", plies.join(", ")));
            }
        }
        for line in analysis.lines.iter().skip(1) {
            if let Some(mv) = line.first_move() {
                out.push_str(&format!(
                    "\n  {}. {} {}",
                    line.rank,
                    with_san(position, mv),
                    line.score
                ));
            }
        }
    }
    Ok(out)
}

fn with_san(position: &Position, mv: &kibitz_core::UciMove) -> String {
    let description = annotate(position, mv);
    match san(position, mv) {
        Some(san) => format!("{description} ({san})"),
        None => description,
    }
}

fn json_report(position: &Position, pov: Color, analysis: &Analysis) -> serde_json::Value {
    let best = analysis.best_move();
    json!({
        "fen": position.fen(),
        "best_move": best.map(ToString::to_string),
        "san": best.and_then(|mv| san(position, mv)),
        "description": best.map(|mv| annotate(position, mv)),
        "evaluation": analysis.best().map(|line| describe_score(line.score, pov)),
        "depth": analysis.depth,
        "nodes": analysis.nodes,
        "lines": analysis.lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kibitz_core::Score;
    use kibitz_uci::CandidateLine;

    fn uci(text: &str) -> kibitz_core::UciMove {
        Position::parse_uci(text).unwrap()
    }

    fn analysis(lines: Vec<CandidateLine>) -> Analysis {
        Analysis {
            bestmove: None,
            lines,
            depth: 15,
            nodes: 42_000,
            elapsed: Duration::from_millis(300),
        }
    }

    #[test]
    fn renders_best_move_with_san() {
        let pos = Position::startpos();
        let a = analysis(vec![CandidateLine {
            rank: 1,
            score: Score::Cp(25),
            depth: 15,
            pv: [uci("g1f3"), uci("d7d5")].into_iter().collect(),
        }]);
        assert_eq!(
            render(&pos, Color::White, &a, false).unwrap(),
            "Best move: Knight g1 -> f3 (Nf3)"
        );
        let verbose = render(&pos, Color::White, &a, true).unwrap();
        assert!(verbose.contains("Evaluation: Equal position (+0.25, depth 15)"));
        assert!(verbose.contains("Line: Knight g1 -> f3, Pawn d7 -> d5"));
    }

    #[test]
    fn verbose_lists_alternatives() {
        let pos = Position::startpos();
        let a = analysis(vec![
            CandidateLine {
                rank: 1,
                score: Score::Cp(80),
                depth: 15,
                pv: [uci("e2e4")].into_iter().collect(),
            },
            CandidateLine {
                rank: 2,
                score: Score::Cp(60),
                depth: 15,
                pv: [uci("d2d4")].into_iter().collect(),
            },
        ]);
        let text = render(&pos, Color::White, &a, true).unwrap();
        assert!(text.contains("You're ahead +0.8"));
        assert!(text.contains("  2. Pawn d2 -> d4 (d4) +0.60"));
    }

    #[test]
    fn no_move_is_an_error() {
        let mated =
            Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        let err = render(&mated, Color::White, &analysis(Vec::new()), false).unwrap_err();
        assert!(err.to_string().contains("checkmate, Black wins"));
    }

    #[test]
    fn json_report_carries_lines() {
        let pos = Position::startpos();
        let a = analysis(vec![CandidateLine {
            rank: 1,
            score: Score::Mate(3),
            depth: 15,
            pv: [uci("e2e4")].into_iter().collect(),
        }]);
        let value = json_report(&pos, Color::White, &a);
        assert_eq!(value["best_move"], "e2e4");
        assert_eq!(value["san"], "e4");
        assert_eq!(value["evaluation"], "Mate in 3!");
        assert_eq!(value["lines"][0]["pv"][0], "e2e4");
        assert_eq!(value["lines"][0]["score"]["mate"], 3);
    }
}
