//! `kibitz play`: console frontend for the session controller.
//!
//! The main loop multiplexes stdin lines and advisory results with `select!`, so
//! the controller is only ever touched from this thread.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, select, unbounded};
use kibitz_core::record::default_file_name;
use kibitz_core::shakmaty::{File, Position as _, Rank};
use kibitz_core::{
    Color, GameHeaders, Perspective, Position, Square, read_pgn, san, side_name, write_pgn,
};
use kibitz_session::{
    AdviceView, AdvisoryWorker, Controller, Difficulty, Dispatch, Event, Mode, Purpose,
    SessionState,
};
use log::debug;

use crate::commands::{self, Command, HELP};
use crate::config::KibitzConfig;

/// Wake-up interval when no exhibition move is scheduled.
const IDLE_TICK: Duration = Duration::from_millis(200);

#[derive(clap::Args, Debug)]
pub struct PlayArgs {
    /// Start free play immediately as this colour
    #[arg(long)]
    color: Option<Perspective>,

    /// Difficulty for --color (perfect, strong, good, hints, none)
    #[arg(long, requires = "color")]
    difficulty: Option<Difficulty>,
}

pub fn run(config: &KibitzConfig, args: &PlayArgs) -> Result<()> {
    let (events_tx, events_rx) = unbounded();
    let engine_config = config.engine_config();
    let worker = AdvisoryWorker::spawn(move || kibitz_uci::connect(&engine_config), events_tx)
        .context("start advisory worker")?;
    let mut controller = Controller::new(worker, config.session_config());
    let lines = spawn_stdin_reader();
    let mut out = io::stdout().lock();

    writeln!(out, "kibitz - type `help` for commands")?;
    match args.color {
        Some(color) => {
            controller
                .select_free_play(color.color(), args.difficulty.unwrap_or_default())?;
        }
        None => writeln!(out, "Choose a mode: white, black, puzzle or exhibit")?,
    }
    print_events(&mut controller, &mut out)?;

    loop {
        let wait = controller
            .next_deadline()
            .map_or(IDLE_TICK, |due| due.saturating_duration_since(Instant::now()));
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    debug!("stdin closed");
                    break;
                };
                match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => {
                        if let Err(e) = execute(&mut controller, cmd, &mut out) {
                            writeln!(out, "{e:#}")?;
                        }
                    }
                    Err(msg) => writeln!(out, "{msg}")?,
                }
            }
            recv(events_rx) -> msg => {
                if let Ok(msg) = msg {
                    controller.handle(msg);
                }
            }
            default(wait) => {}
        }
        controller.tick(Instant::now());
        print_events(&mut controller, &mut out)?;
    }
    writeln!(out, "Bye")?;
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn execute<D: Dispatch>(
    controller: &mut Controller<D>,
    cmd: Command,
    out: &mut impl Write,
) -> Result<()> {
    match cmd {
        Command::New => controller.new_game(),
        Command::FreePlay { color, difficulty } => {
            leave_mode(controller);
            controller.select_free_play(color, difficulty.unwrap_or_default())?;
        }
        Command::Difficulty(d) => controller.set_difficulty(d)?,
        Command::Move(mv) => controller.play_move(&mv)?,
        Command::Auto => controller.auto_play()?,
        Command::Undo => {
            controller.undo()?;
        }
        Command::Puzzle => {
            leave_mode(controller);
            controller.select_puzzle()?;
        }
        Command::Put { square, piece } => controller.place_piece(square, piece)?,
        Command::Remove(square) => {
            if controller.remove_piece(square)?.is_none() {
                writeln!(out, "{square} is already empty")?;
            }
        }
        Command::Clear => controller.clear_board()?,
        Command::Turn(color) => controller.set_side_to_move(color)?,
        Command::Start => controller.start_puzzle()?,
        Command::Solve => controller.solve()?,
        Command::Exhibit { pace } => {
            leave_mode(controller);
            controller.select_exhibition(pace)?;
            writeln!(out, "Exhibition ready; `resume` to start")?;
        }
        Command::Pause => controller.pause()?,
        Command::Resume => controller.resume()?,
        Command::Pace(pace) => controller.set_pace(pace)?,
        Command::Board => {
            let pov = player_colour(controller.state());
            write!(out, "{}", render_board(controller.position(), pov))?;
        }
        Command::Fen(None) => writeln!(out, "{}", controller.position().fen())?,
        Command::Fen(Some(fen)) => {
            let position = Position::from_fen(&fen).context("invalid FEN")?;
            controller.load_position(position);
            writeln!(out, "Position loaded")?;
        }
        Command::Save(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(default_file_name()));
            let headers = GameHeaders::for_player(player_colour(controller.state()));
            std::fs::write(&path, write_pgn(controller.game(), &headers))
                .with_context(|| format!("write {}", path.display()))?;
            writeln!(out, "Saved {}", path.display())?;
        }
        Command::Load(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let loaded = read_pgn(&text).with_context(|| format!("load {}", path.display()))?;
            let plies = loaded.game.moves().len();
            controller.load_game(loaded.game);
            writeln!(out, "Loaded {} ({plies} plies)", path.display())?;
        }
        Command::Moves => writeln!(out, "{}", move_list(controller))?,
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}

/// Returns to mode selection keeping the current board.
fn leave_mode<D: Dispatch>(controller: &mut Controller<D>) {
    if controller.state() == SessionState::ModeSelect {
        return;
    }
    let game = controller.game().clone();
    controller.new_game();
    controller.load_game(game);
}

fn player_colour(state: SessionState) -> Color {
    match state {
        SessionState::Active(Mode::FreePlay { player, .. })
        | SessionState::GameOver {
            prior: Mode::FreePlay { player, .. },
            ..
        } => player,
        _ => Color::White,
    }
}

fn move_list<D: Dispatch>(controller: &Controller<D>) -> String {
    let game = controller.game();
    if game.is_empty() {
        return "No moves yet".to_string();
    }
    let mut cursor = game.initial().clone();
    let mut out = String::new();
    for mv in game.moves() {
        let text = san(&cursor, mv).unwrap_or_else(|| mv.to_string());
        let number = cursor.chess().map_or(0, |c| c.fullmoves().get());
        match cursor.turn() {
            Color::White => out.push_str(&format!("{number}. {text} ")),
            Color::Black if out.is_empty() => out.push_str(&format!("{number}... {text} ")),
            Color::Black => out.push_str(&format!("{text} ")),
        }
        if cursor.play(mv).is_err() {
            break;
        }
    }
    out.trim_end().to_string()
}

fn render_board(position: &Position, pov: Color) -> String {
    let mut ranks: Vec<u32> = (0..8).collect();
    let mut files: Vec<u32> = (0..8).collect();
    match pov {
        Color::White => ranks.reverse(),
        Color::Black => files.reverse(),
    }
    let mut out = String::new();
    for &rank in &ranks {
        out.push_str(&format!("{} ", rank + 1));
        for &file in &files {
            let sq = Square::from_coords(File::new(file), Rank::new(rank));
            let ch = position.piece_at(sq).map_or('.', |p| p.char());
            out.push(' ');
            out.push(ch);
        }
        out.push('\n');
    }
    out.push_str("  ");
    for &file in &files {
        out.push(' ');
        out.push(char::from(b'a' + file as u8));
    }
    out.push('\n');
    out
}

fn print_events<D: Dispatch>(controller: &mut Controller<D>, out: &mut impl Write) -> Result<()> {
    for event in controller.take_events() {
        match event {
            Event::Advice(view) => print_advice(&view, out)?,
            Event::MoveApplied {
                mover, description, ..
            } => writeln!(out, "{}: {description}", side_name(mover))?,
            Event::Solution { evaluation, plies } => {
                writeln!(out, "Solution: {evaluation}")?;
                for (i, ply) in plies.iter().enumerate() {
                    writeln!(out, "  {}. {ply}", i + 1)?;
                }
            }
            Event::GameOver(status) => writeln!(out, "Game over: {status}")?,
            Event::AdvisoryReady { engine } => writeln!(out, "Engine ready: {engine}")?,
            Event::AdvisoryUnavailable { reason } => {
                writeln!(out, "Engine unavailable, playing without advice: {reason}")?
            }
            Event::Status(text) => writeln!(out, "{text}")?,
        }
    }
    out.flush()?;
    Ok(())
}

fn print_advice(view: &AdviceView, out: &mut impl Write) -> io::Result<()> {
    let evaluation = view.evaluation.as_deref().unwrap_or("no evaluation");
    if !view.players_turn {
        return writeln!(out, "Opponent to move. {evaluation} (depth {})", view.depth);
    }
    let label = match view.purpose {
        Purpose::Hint => "Hint",
        _ => "Advice",
    };
    writeln!(out, "{label}: {evaluation} (depth {})", view.depth)?;
    for mv in &view.moves {
        match &mv.san {
            Some(san) => writeln!(out, "  {}. {} ({san}) {}", mv.rank, mv.description, mv.score)?,
            None => writeln!(out, "  {}. {} {}", mv.rank, mv.description, mv.score)?,
        }
    }
    if !view.expected_line.is_empty() {
        writeln!(out, "  Expected: {}", view.expected_line.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use kibitz_session::{Job, SessionConfig};

    use super::*;

    struct Idle;

    impl Dispatch for Idle {
        fn submit(&mut self, _job: Job) {}
        fn invalidate(&mut self, _generation: u64) {}
    }

    fn uci(text: &str) -> kibitz_core::UciMove {
        Position::parse_uci(text).unwrap()
    }

    #[test]
    fn board_is_drawn_from_the_players_side() {
        let start = Position::startpos();
        let white = render_board(&start, Color::White);
        assert!(white.starts_with("8  r n b q k b n r\n"));
        assert!(white.ends_with("   a b c d e f g h\n"));
        let black = render_board(&start, Color::Black);
        assert!(black.starts_with("1  R N B K Q B N R\n"));
        assert!(black.ends_with("   h g f e d c b a\n"));
    }

    #[test]
    fn move_list_numbers_moves() {
        let mut c = Controller::new(Idle, SessionConfig::default());
        assert_eq!(move_list(&c), "No moves yet");
        c.select_free_play(Color::White, Difficulty::NoHelp).unwrap();
        for mv in ["e2e4", "e7e5", "g1f3"] {
            c.play_move(&uci(mv)).unwrap();
        }
        assert_eq!(move_list(&c), "1. e4 e5 2. Nf3");
    }

    #[test]
    fn switching_mode_keeps_the_board() {
        let mut c = Controller::new(Idle, SessionConfig::default());
        let mut out = Vec::new();
        execute(
            &mut c,
            Command::FreePlay {
                color: Color::White,
                difficulty: Some(Difficulty::NoHelp),
            },
            &mut out,
        )
        .unwrap();
        execute(&mut c, Command::Move(uci("e2e4")), &mut out).unwrap();
        execute(&mut c, Command::Puzzle, &mut out).unwrap();
        assert_eq!(c.state(), SessionState::Active(Mode::PuzzleSetup));
        assert_eq!(
            c.position().fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn advice_lists_moves_and_expected_line() {
        use kibitz_core::Score;
        use kibitz_session::SuggestedMove;

        let view = AdviceView {
            purpose: Purpose::Advice,
            evaluation: Some("Equal position".to_string()),
            score: Some(Score::Cp(20)),
            depth: 18,
            players_turn: true,
            moves: vec![SuggestedMove {
                rank: 1,
                uci: uci("e2e4"),
                san: Some("e4".to_string()),
                description: "Pawn e2 -> e4".to_string(),
                score: Score::Cp(20),
            }],
            expected_line: vec!["You: Pawn e2 -> e4".to_string(), "Opp: Pawn e7 -> e5".to_string()],
        };
        let mut out = Vec::new();
        print_advice(&view, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Advice: Equal position (depth 18)\n  1. Pawn e2 -> e4 (e4) +0.20\n  Expected: You: Pawn e2 -> e4, Opp: Pawn e7 -> e5\n"
        );
    }
}
