//! Session state machine.
//!
//! The [`Controller`] owns the session and is driven from one thread: user operations
//! are plain method calls, background results arrive through [`Controller::handle`].
//! Every change of position advances the session generation, so a result can only be
//! applied if nothing has happened since its request was issued.

use std::time::{Duration, Instant};

use kibitz_core::{
    Color, Game, GameStatus, Piece, Position, PositionError, Score, Square, UciMove, annotate,
    describe_line, describe_score, san, side_name,
};
use kibitz_uci::{Analysis, AnalysisRequest, EngineError, LineCount, SearchLimit};
use log::{debug, info, warn};

use crate::mode::{Difficulty, Mode, SessionState};
use crate::worker::{Dispatch, Job, Purpose, RequestTag, WorkerMessage};

/// Search bounds and disclosure settings per purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub advice_limit: SearchLimit,
    pub hint_limit: SearchLimit,
    pub solve_limit: SearchLimit,
    /// Plies of the solving line shown.
    pub solve_plies: usize,
    pub exhibition_limit: SearchLimit,
    pub exhibition_pace: Duration,
    /// Plies of the expected continuation shown with advice.
    pub expected_line_plies: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            advice_limit: SearchLimit::depth(18),
            hint_limit: SearchLimit::depth(15),
            solve_limit: SearchLimit::depth(30),
            solve_plies: 10,
            exhibition_limit: SearchLimit::depth(12),
            exhibition_pace: Duration::from_millis(1000),
            expected_line_plies: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Connecting,
    Ready(String),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedMove {
    pub rank: u8,
    pub uci: UciMove,
    pub san: Option<String>,
    pub description: String,
    pub score: Score,
}

/// What the frontend shows for one reconciled analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceView {
    pub purpose: Purpose,
    pub evaluation: Option<String>,
    pub score: Option<Score>,
    pub depth: u32,
    pub players_turn: bool,
    /// Candidate moves, empty on the opponent's turn and for evaluation-only help.
    pub moves: Vec<SuggestedMove>,
    /// Continuation of the best line, labelled `You:` / `Opp:`.
    pub expected_line: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Advice(AdviceView),
    MoveApplied {
        mover: Color,
        description: String,
        uci: UciMove,
    },
    Solution {
        evaluation: String,
        plies: Vec<String>,
    },
    GameOver(GameStatus),
    AdvisoryReady {
        engine: String,
    },
    AdvisoryUnavailable {
        reason: String,
    },
    Status(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no mode selected; choose free play, puzzle or exhibition first")]
    NoActiveMode,

    #[error("a mode is already active; start a new game first")]
    ModeAlreadySelected,

    #[error("not available during {0}")]
    WrongMode(&'static str),

    #[error("the game is over: {0}")]
    GameOver(GameStatus),

    #[error(transparent)]
    IllegalMove(#[from] PositionError),

    #[error("position cannot be played: {0}")]
    Unplayable(String),

    #[error("wait for your turn")]
    NotPlayersTurn,

    #[error("auto-play is off at {0} difficulty")]
    AutoPlayDisabled(Difficulty),

    #[error("no advice for this position yet")]
    NoAdvice,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("no engine available: {0}")]
    AdvisoryUnavailable(String),
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    game: Game,
    advice: Option<Analysis>,
    availability: Availability,
    generation: u64,
    in_flight: Option<RequestTag>,
    next_exhibition_at: Option<Instant>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::ModeSelect,
            game: Game::default(),
            advice: None,
            availability: Availability::Connecting,
            generation: 0,
            in_flight: None,
            next_exhibition_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Latest analysis reconciled for the current generation.
    pub fn advice(&self) -> Option<&Analysis> {
        self.advice.as_ref()
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> Option<RequestTag> {
        self.in_flight
    }
}

pub struct Controller<D: Dispatch> {
    session: Session,
    dispatch: D,
    config: SessionConfig,
    events: Vec<Event>,
}

impl<D: Dispatch> Controller<D> {
    pub fn new(dispatch: D, config: SessionConfig) -> Self {
        Self {
            session: Session::new(),
            dispatch,
            config,
            events: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn position(&self) -> &Position {
        self.session.game.current()
    }

    pub fn game(&self) -> &Game {
        &self.session.game
    }

    pub fn moves(&self) -> &[UciMove] {
        self.session.game.moves()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn dispatch(&self) -> &D {
        &self.dispatch
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// When the next exhibition request falls due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.next_exhibition_at
    }

    // ----------------------------------------------------------------------------
    // mode selection
    // ----------------------------------------------------------------------------

    pub fn new_game(&mut self) {
        self.advance_generation();
        self.session.game = Game::default();
        self.session.state = SessionState::ModeSelect;
        self.session.next_exhibition_at = None;
        info!("new game");
        self.status("New game - choose a mode");
    }

    pub fn select_free_play(
        &mut self,
        player: Color,
        difficulty: Difficulty,
    ) -> Result<(), SessionError> {
        self.require_mode_select()?;
        self.enter(Mode::FreePlay { player, difficulty });
        Ok(())
    }

    pub fn select_puzzle(&mut self) -> Result<(), SessionError> {
        self.require_mode_select()?;
        self.enter(Mode::PuzzleSetup);
        Ok(())
    }

    /// Exhibition starts paused; [`Controller::resume`] starts the move loop.
    pub fn select_exhibition(&mut self, pace: Option<Duration>) -> Result<(), SessionError> {
        self.require_mode_select()?;
        let pace = pace.unwrap_or(self.config.exhibition_pace);
        self.enter(Mode::Exhibition {
            running: false,
            pace,
        });
        Ok(())
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::FreePlay { player, .. } => {
                self.session.state = SessionState::Active(Mode::FreePlay { player, difficulty });
                self.status(format!("Difficulty: {difficulty}"));
                self.after_position_change();
                Ok(())
            }
            _ => Err(SessionError::WrongMode("puzzle or exhibition")),
        }
    }

    fn enter(&mut self, mode: Mode) {
        info!("mode: {mode}");
        self.session.state = SessionState::Active(mode);
        self.status(format!("Mode: {mode}"));
        self.after_position_change();
    }

    fn require_mode_select(&self) -> Result<(), SessionError> {
        match self.session.state {
            SessionState::ModeSelect => Ok(()),
            _ => Err(SessionError::ModeAlreadySelected),
        }
    }

    fn require_active(&self) -> Result<Mode, SessionError> {
        match self.session.state {
            SessionState::ModeSelect => Err(SessionError::NoActiveMode),
            SessionState::Active(mode) => Ok(mode),
            SessionState::GameOver { status, .. } => Err(SessionError::GameOver(status)),
        }
    }

    // ----------------------------------------------------------------------------
    // moves
    // ----------------------------------------------------------------------------

    /// Plays a move entered by the user, for either side.
    pub fn play_move(&mut self, uci: &UciMove) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::PuzzleSetup => Err(SessionError::WrongMode("puzzle setup")),
            Mode::Exhibition { running: true, .. } => {
                Err(SessionError::WrongMode("a running exhibition"))
            }
            _ => {
                let description = self.apply(uci)?;
                self.status(format!("Played: {description}"));
                Ok(())
            }
        }
    }

    /// Plays the first move of the top-ranked line of the current advice.
    pub fn auto_play(&mut self) -> Result<(), SessionError> {
        let (player, difficulty) = match self.require_active()? {
            Mode::FreePlay { player, difficulty } => (player, difficulty),
            _ => return Err(SessionError::WrongMode("puzzle or exhibition")),
        };
        if !difficulty.auto_applies() {
            return Err(SessionError::AutoPlayDisabled(difficulty));
        }
        if self.position().turn() != player {
            return Err(SessionError::NotPlayersTurn);
        }
        let mv = self
            .session
            .advice
            .as_ref()
            .and_then(Analysis::best_move)
            .cloned()
            .ok_or(SessionError::NoAdvice)?;
        let description = self.apply(&mv)?;
        self.status(format!("Auto-played: {description}"));
        Ok(())
    }

    /// Takes back one ply. From a finished game this returns to the mode it ended in.
    pub fn undo(&mut self) -> Result<UciMove, SessionError> {
        let mode = match self.session.state {
            SessionState::ModeSelect => return Err(SessionError::NoActiveMode),
            SessionState::Active(mode) => mode,
            SessionState::GameOver { prior, .. } => prior,
        };
        let mv = self.session.game.undo().ok_or(SessionError::NothingToUndo)?;
        self.session.state = SessionState::Active(mode);
        self.status("Move undone");
        self.after_position_change();
        Ok(mv)
    }

    fn apply(&mut self, uci: &UciMove) -> Result<String, SessionError> {
        let before = self.session.game.current();
        let mover = before.turn();
        let description = annotate(before, uci);
        self.session.game.push(uci)?;
        info!("{} played {uci}: {description}", side_name(mover));
        self.events.push(Event::MoveApplied {
            mover,
            description: description.clone(),
            uci: uci.clone(),
        });
        self.after_position_change();
        Ok(description)
    }

    // ----------------------------------------------------------------------------
    // puzzle
    // ----------------------------------------------------------------------------

    pub fn place_piece(&mut self, sq: Square, piece: Piece) -> Result<(), SessionError> {
        self.require_puzzle_setup()?;
        self.edit(|pos| pos.put_piece(sq, piece));
        Ok(())
    }

    pub fn remove_piece(&mut self, sq: Square) -> Result<Option<Piece>, SessionError> {
        self.require_puzzle_setup()?;
        let mut removed = None;
        self.edit(|pos| removed = pos.remove_piece(sq));
        Ok(removed)
    }

    pub fn clear_board(&mut self) -> Result<(), SessionError> {
        self.require_puzzle_setup()?;
        self.edit(Position::clear);
        Ok(())
    }

    pub fn set_side_to_move(&mut self, color: Color) -> Result<(), SessionError> {
        self.require_puzzle_setup()?;
        self.edit(|pos| pos.set_turn(color));
        Ok(())
    }

    pub fn start_puzzle(&mut self) -> Result<(), SessionError> {
        self.require_puzzle_setup()?;
        let pos = self.position();
        if !pos.is_playable() {
            let reason = pos
                .warning()
                .map_or_else(|| "rejected by rules engine".to_string(), |w| w.message().to_string());
            return Err(SessionError::Unplayable(reason));
        }
        self.enter(Mode::PuzzleActive);
        Ok(())
    }

    /// Requests a deep search of the puzzle position.
    pub fn solve(&mut self) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::PuzzleActive => {
                if let Availability::Unavailable(reason) = &self.session.availability {
                    return Err(SessionError::AdvisoryUnavailable(reason.clone()));
                }
                self.advance_generation();
                self.submit(Purpose::Solve, self.config.solve_limit, LineCount::One);
                self.status("Solving...");
                Ok(())
            }
            _ => Err(SessionError::WrongMode("anything but an active puzzle")),
        }
    }

    fn require_puzzle_setup(&self) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::PuzzleSetup => Ok(()),
            _ => Err(SessionError::WrongMode("anything but puzzle setup")),
        }
    }

    fn edit(&mut self, f: impl FnOnce(&mut Position)) {
        let mut pos = self.session.game.current().clone();
        f(&mut pos);
        if let Some(warning) = pos.warning() {
            debug!("setup edit: {warning}");
        }
        self.session.game.reset_to(pos);
        self.after_position_change();
    }

    // ----------------------------------------------------------------------------
    // exhibition
    // ----------------------------------------------------------------------------

    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::Exhibition { running: true, pace } => {
                self.session.state = SessionState::Active(Mode::Exhibition {
                    running: false,
                    pace,
                });
                // the in-flight move request must never be applied
                self.advance_generation();
                self.session.next_exhibition_at = None;
                self.status("Exhibition paused");
                Ok(())
            }
            _ => Err(SessionError::WrongMode("anything but a running exhibition")),
        }
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::Exhibition {
                running: false,
                pace,
            } => {
                self.session.state = SessionState::Active(Mode::Exhibition {
                    running: true,
                    pace,
                });
                self.session.next_exhibition_at = Some(Instant::now());
                self.status("Exhibition running");
                Ok(())
            }
            _ => Err(SessionError::WrongMode("anything but a paused exhibition")),
        }
    }

    pub fn set_pace(&mut self, pace: Duration) -> Result<(), SessionError> {
        match self.require_active()? {
            Mode::Exhibition { running, .. } => {
                self.session.state = SessionState::Active(Mode::Exhibition { running, pace });
                self.status(format!("Pace: {} ms", pace.as_millis()));
                Ok(())
            }
            _ => Err(SessionError::WrongMode("anything but an exhibition")),
        }
    }

    /// Issues the next exhibition request once it is due.
    pub fn tick(&mut self, now: Instant) {
        let SessionState::Active(Mode::Exhibition { running: true, pace }) = self.session.state
        else {
            return;
        };
        if self.session.in_flight.is_some() {
            return;
        }
        let Some(due) = self.session.next_exhibition_at else {
            return;
        };
        if due > now {
            return;
        }
        self.session.next_exhibition_at = None;
        if let Availability::Unavailable(reason) = &self.session.availability {
            let text = format!("Exhibition paused: {reason}");
            self.session.state = SessionState::Active(Mode::Exhibition {
                running: false,
                pace,
            });
            self.status(text);
            return;
        }
        self.submit(
            Purpose::ExhibitionMove,
            self.config.exhibition_limit,
            LineCount::One,
        );
    }

    // ----------------------------------------------------------------------------
    // persistence hooks
    // ----------------------------------------------------------------------------

    pub fn load_position(&mut self, position: Position) {
        self.load(Game::new(position));
    }

    pub fn load_game(&mut self, game: Game) {
        self.load(game);
    }

    fn load(&mut self, game: Game) {
        if let SessionState::GameOver { prior, .. } = self.session.state {
            self.session.state = SessionState::Active(prior);
        }
        if let Some(warning) = game.current().warning() {
            warn!("loaded position {}: {warning}", game.current().fen());
            self.status(format!("Warning: {warning}"));
        }
        self.session.game = game;
        self.after_position_change();
    }

    // ----------------------------------------------------------------------------
    // background results
    // ----------------------------------------------------------------------------

    /// Reconciles one worker message with the session.
    pub fn handle(&mut self, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Connected { engine } => {
                self.session.availability = Availability::Ready(engine.clone());
                self.events.push(Event::AdvisoryReady { engine });
            }
            WorkerMessage::ConnectFailed(reason) => self.disable_advisory(reason),
            WorkerMessage::Finished { tag, result } => self.reconcile(tag, result),
        }
    }

    fn reconcile(&mut self, tag: RequestTag, result: Result<Analysis, EngineError>) {
        if tag.generation != self.session.generation {
            debug!(
                "discarding stale {:?} result for generation {} (now {})",
                tag.purpose, tag.generation, self.session.generation
            );
            return;
        }
        if self.session.in_flight != Some(tag) {
            debug!("discarding superseded {:?} result", tag.purpose);
            return;
        }
        self.session.in_flight = None;

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(EngineError::Cancelled) => {
                debug!("{:?} request cancelled", tag.purpose);
                return;
            }
            Err(err) => {
                warn!("{:?} request failed: {err}", tag.purpose);
                if matches!(err, EngineError::Exited(_)) {
                    self.disable_advisory(err.to_string());
                }
                if let SessionState::Active(Mode::Exhibition { pace, .. }) = self.session.state {
                    self.session.state = SessionState::Active(Mode::Exhibition {
                        running: false,
                        pace,
                    });
                }
                self.status(format!("No advice available: {err}"));
                return;
            }
        };

        match (tag.purpose, self.session.state) {
            (Purpose::Advice, SessionState::Active(Mode::FreePlay { player, difficulty })) => {
                let view = self.advice_view(
                    &analysis,
                    Purpose::Advice,
                    Some(player),
                    difficulty.surfaced_lines(),
                );
                self.session.advice = Some(analysis);
                self.events.push(Event::Advice(view));
            }
            (Purpose::Hint, SessionState::Active(Mode::PuzzleActive)) => {
                let view = self.advice_view(&analysis, Purpose::Hint, None, 1);
                self.session.advice = Some(analysis);
                self.events.push(Event::Advice(view));
            }
            (Purpose::Solve, SessionState::Active(Mode::PuzzleActive)) => {
                let pos = self.session.game.current();
                let (evaluation, plies) = match analysis.best() {
                    Some(line) => (
                        describe_score(line.score, pos.turn()),
                        describe_line(pos, &line.pv, self.config.solve_plies),
                    ),
                    None => ("No solution found".to_string(), Vec::new()),
                };
                self.session.advice = Some(analysis);
                self.events.push(Event::Solution { evaluation, plies });
            }
            (
                Purpose::ExhibitionMove,
                SessionState::Active(Mode::Exhibition { running: true, .. }),
            ) => match analysis.best_move().cloned() {
                Some(mv) => {
                    if let Err(err) = self.apply(&mv) {
                        warn!("exhibition move {mv} rejected: {err}");
                        self.status(format!("Exhibition stopped: {err}"));
                    }
                }
                None => self.status("Exhibition: no move available"),
            },
            (purpose, state) => debug!("discarding {purpose:?} result in {state:?}"),
        }
    }

    fn advice_view(
        &self,
        analysis: &Analysis,
        purpose: Purpose,
        player: Option<Color>,
        surfaced: usize,
    ) -> AdviceView {
        let pos = self.session.game.current();
        let pov = player.unwrap_or(pos.turn());
        let players_turn = player.is_none_or(|p| p == pos.turn());
        let best = analysis.best();

        let moves = if players_turn {
            analysis
                .lines
                .iter()
                .take(surfaced)
                .filter_map(|line| {
                    let uci = line.first_move()?.clone();
                    Some(SuggestedMove {
                        rank: line.rank,
                        san: san(pos, &uci),
                        description: annotate(pos, &uci),
                        score: line.score,
                        uci,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let expected_line = match best {
            Some(line) if players_turn && surfaced > 0 && line.pv.len() > 1 => {
                describe_line(pos, &line.pv, self.config.expected_line_plies)
                    .into_iter()
                    .enumerate()
                    .map(|(i, d)| format!("{}: {d}", if i % 2 == 0 { "You" } else { "Opp" }))
                    .collect()
            }
            _ => Vec::new(),
        };

        AdviceView {
            purpose,
            evaluation: best.map(|l| describe_score(l.score, pov)),
            score: best.map(|l| l.score),
            depth: analysis.depth,
            players_turn,
            moves,
            expected_line,
        }
    }

    // ----------------------------------------------------------------------------
    // internals
    // ----------------------------------------------------------------------------

    fn after_position_change(&mut self) {
        self.advance_generation();
        let SessionState::Active(mode) = self.session.state else {
            return;
        };
        if mode != Mode::PuzzleSetup {
            let status = self.session.game.current().status();
            if status.is_over() {
                info!("game over: {status}");
                self.session.state = SessionState::GameOver {
                    prior: mode,
                    status,
                };
                self.session.next_exhibition_at = None;
                self.events.push(Event::GameOver(status));
                return;
            }
        }
        self.request_for_mode(mode);
    }

    fn request_for_mode(&mut self, mode: Mode) {
        match mode {
            Mode::FreePlay { difficulty, .. } => {
                if let Some(lines) = difficulty.line_count() {
                    self.submit(Purpose::Advice, self.config.advice_limit, lines);
                }
            }
            Mode::PuzzleSetup => {}
            Mode::PuzzleActive => {
                self.submit(Purpose::Hint, self.config.hint_limit, LineCount::One);
            }
            Mode::Exhibition {
                running: true,
                pace,
            } => {
                self.session.next_exhibition_at = Some(Instant::now() + pace);
            }
            Mode::Exhibition { running: false, .. } => {
                self.session.next_exhibition_at = None;
            }
        }
    }

    fn advance_generation(&mut self) {
        self.session.generation += 1;
        self.session.in_flight = None;
        self.session.advice = None;
        self.dispatch.invalidate(self.session.generation);
    }

    fn submit(&mut self, purpose: Purpose, limit: SearchLimit, lines: LineCount) {
        if let Availability::Unavailable(_) = self.session.availability {
            debug!("advisory unavailable; {purpose:?} request skipped");
            return;
        }
        let pos = self.session.game.current();
        let tag = RequestTag {
            generation: self.session.generation,
            purpose,
        };
        let request = AnalysisRequest {
            fen: pos.fen(),
            turn: pos.turn(),
            limit,
            lines,
        };
        debug!(
            "{purpose:?} request for generation {}: {}",
            tag.generation, request.fen
        );
        self.session.in_flight = Some(tag);
        self.dispatch.submit(Job { tag, request });
    }

    fn disable_advisory(&mut self, reason: String) {
        warn!("advisory disabled: {reason}");
        self.session.availability = Availability::Unavailable(reason.clone());
        self.events.push(Event::AdvisoryUnavailable { reason });
    }

    fn status(&mut self, text: impl Into<String>) {
        self.events.push(Event::Status(text.into()));
    }
}
