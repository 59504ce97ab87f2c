/// Chess assistant console: analyses positions with a UCI engine and coaches games.
///
/// # Usage
///
/// One-shot analysis of a FEN or of a perception-service board listing:
/// ```shell
/// kibitz analyze --fen "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3" --verbose
/// kibitz analyze --image board.png --color black --explain
/// ```
///
/// Coached play (advice on every move, `help` lists the commands):
/// ```shell
/// kibitz --engine /usr/local/bin/stockfish play --color white --difficulty strong
/// ```
mod analyze;
mod commands;
mod config;
mod play;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::analyze::{AnalyzeArgs, ReplArgs};
use crate::config::KibitzConfig;
use crate::play::PlayArgs;

#[derive(Parser, Debug)]
#[command(name = "kibitz", version, about = "chess assistant backed by a UCI engine")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine executable; overrides the config file
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Suggest the best move for one position
    Analyze(AnalyzeArgs),
    /// Read FENs from stdin and analyse each
    Repl(ReplArgs),
    /// Play with advice, solve puzzles or watch the engine
    Play(PlayArgs),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => KibitzConfig::load(path)?,
        None => KibitzConfig::default(),
    };
    if let Some(engine) = cli.engine {
        config.engine.path = Some(engine);
    }

    match &cli.cmd {
        Cmd::Analyze(args) => analyze::run(&config, args),
        Cmd::Repl(args) => analyze::repl(&config, args),
        Cmd::Play(args) => play::run(&config, args),
    }
}
