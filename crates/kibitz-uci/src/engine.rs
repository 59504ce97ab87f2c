//! UCI engine subprocess.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use kibitz_core::UciMove;
use log::{debug, info};

use crate::info::InfoAggregate;
use crate::types::{Analysis, AnalysisRequest};

pub const ENGINE_READY_TIMEOUT: Duration = Duration::from_secs(30);
pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How often the cancel predicate is polled while a search is running.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn engine at {}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{label}: no `{expected}` within {timeout:?}")]
    Timeout {
        label: String,
        expected: &'static str,
        timeout: Duration,
    },

    #[error("{0}: engine exited unexpectedly")]
    Exited(String),

    #[error("engine i/o failed")]
    Io(#[from] io::Error),

    #[error("{label}: unexpected engine output `{line}`")]
    Protocol { label: String, line: String },

    #[error("search cancelled")]
    Cancelled,

    #[error("no engine available")]
    Unavailable,
}

/// Engine launch and search settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit executable, tried before any discovered location.
    pub path: Option<PathBuf>,
    pub args: Vec<String>,
    pub threads: usize,
    pub hash_mb: u32,
    /// Extra options (`Name=Value`).
    pub options: Vec<String>,
    /// Grace period after the expected end of a search, and again after `stop`.
    pub timeout_margin: Duration,
    /// Client-side budget for searches without a `movetime`.
    pub search_budget: Duration,
    /// Also try `STOCKFISH_PATH`, `PATH` and well-known install locations.
    pub discover: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            threads: 1,
            hash_mb: 64,
            options: Vec::new(),
            timeout_margin: Duration::from_millis(2000),
            search_budget: Duration::from_secs(30),
            discover: true,
        }
    }
}

/// One running engine.
pub struct EngineProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    opt_names: HashSet<String>,
    multipv: u8,
    timeout_margin: Duration,
    search_budget: Duration,
    pub label: String,
}

impl EngineProcess {
    pub fn spawn(cfg: &EngineConfig, path: &Path) -> Result<Self, EngineError> {
        let mut cmd = Command::new(path);
        if !cfg.args.is_empty() {
            cmd.args(&cfg.args);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("engine stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("engine stdout not captured"))?;
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        std::thread::Builder::new()
            .name("uci-reader".to_string())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            if tx.send(l).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            })?;

        let mut proc = Self {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            opt_names: HashSet::new(),
            multipv: 1,
            timeout_margin: cfg.timeout_margin,
            search_budget: cfg.search_budget,
            label: path.display().to_string(),
        };
        proc.initialize(cfg)?;
        Ok(proc)
    }

    fn initialize(&mut self, cfg: &EngineConfig) -> Result<(), EngineError> {
        self.write_line("uci")?;
        loop {
            let line = self.recv_line(ENGINE_READY_TIMEOUT, "uciok")?;
            if let Some(rest) = line.strip_prefix("option ") {
                if let Some(name) = parse_option_name(rest) {
                    self.opt_names.insert(name);
                }
            } else if let Some(name) = line.strip_prefix("id name ") {
                self.label = name.trim().to_string();
            } else if line.trim() == "uciok" {
                break;
            }
        }
        self.set_option_if_available("Threads", &cfg.threads.to_string())?;
        self.set_option_if_available("Hash", &cfg.hash_mb.to_string())?;
        for opt in &cfg.options {
            if let Some((name, value)) = opt.split_once('=') {
                self.set_option_if_available(name.trim(), value.trim())?;
            } else {
                // button-type option
                self.write_line(&format!("setoption name {}", opt.trim()))?;
            }
        }
        self.sync_ready()?;
        self.write_line("ucinewgame")?;
        info!("connected to {}", self.label);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.label
    }

    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.write_line("ucinewgame")?;
        self.sync_ready()
    }

    /// Runs one search. `cancel` is polled while waiting; once it returns `true` the
    /// search is stopped and [`EngineError::Cancelled`] is returned.
    pub fn analyse(
        &mut self,
        req: &AnalysisRequest,
        cancel: &dyn Fn() -> bool,
    ) -> Result<Analysis, EngineError> {
        // drains any bestmove left over from an abandoned search
        self.sync_ready()?;
        let lines = req.lines.get();
        if lines != self.multipv {
            self.set_option_if_available("MultiPV", &lines.to_string())?;
            self.multipv = lines;
        }
        self.write_line(&format!("position fen {}", req.fen))?;
        self.write_line(&req.limit.go_command())?;

        let start = Instant::now();
        let budget = req.limit.movetime.unwrap_or(self.search_budget);
        let soft_limit = budget + self.timeout_margin;
        let mut hard_limit = soft_limit + self.timeout_margin;
        let mut stop_sent = false;
        let mut cancelled = false;
        let mut aggregate = InfoAggregate::default();

        loop {
            if !cancelled && cancel() {
                debug!("{}: search cancelled", self.label);
                cancelled = true;
                if !stop_sent {
                    self.write_line("stop")?;
                    stop_sent = true;
                }
                hard_limit = start.elapsed() + self.timeout_margin;
            }

            let elapsed = start.elapsed();
            if !stop_sent && elapsed >= soft_limit {
                debug!("{}: search budget exhausted, sending stop", self.label);
                self.write_line("stop")?;
                stop_sent = true;
            }
            if elapsed >= hard_limit {
                return Err(EngineError::Timeout {
                    label: self.label.clone(),
                    expected: "bestmove",
                    timeout: hard_limit,
                });
            }

            let deadline = if stop_sent { hard_limit } else { soft_limit };
            let wait = deadline.saturating_sub(elapsed).min(CANCEL_POLL_INTERVAL);
            match self.rx.recv_timeout(wait) {
                Ok(line) => {
                    if line.starts_with("info ") {
                        aggregate.update(&line, req.turn);
                        continue;
                    }
                    if let Some(rest) = line.strip_prefix("bestmove") {
                        if cancelled {
                            return Err(EngineError::Cancelled);
                        }
                        let bestmove = rest
                            .split_whitespace()
                            .next()
                            .and_then(|t| UciMove::from_ascii(t.as_bytes()).ok());
                        let depth = aggregate.max_depth;
                        let nodes = aggregate.max_nodes;
                        return Ok(Analysis {
                            lines: aggregate.into_lines(lines, req.turn),
                            bestmove,
                            depth,
                            nodes,
                            elapsed: start.elapsed(),
                        });
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::Exited(self.label.clone()));
                }
            }
        }
    }

    pub fn sync_ready(&mut self) -> Result<(), EngineError> {
        self.write_line("isready")?;
        loop {
            let line = self.recv_line(ENGINE_READY_TIMEOUT, "readyok")?;
            if line.trim() == "readyok" {
                break;
            }
        }
        Ok(())
    }

    fn recv_line(&self, timeout: Duration, expected: &'static str) -> Result<String, EngineError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => EngineError::Timeout {
                label: self.label.clone(),
                expected,
                timeout,
            },
            RecvTimeoutError::Disconnected => EngineError::Exited(self.label.clone()),
        })
    }

    pub fn set_option_if_available(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        if self.opt_names.is_empty() || self.opt_names.contains(name) {
            self.write_line(&format!("setoption name {name} value {value}"))?;
        }
        Ok(())
    }

    pub fn write_line(&mut self, msg: &str) -> Result<(), EngineError> {
        debug!("> {msg}");
        self.stdin.write_all(msg.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        let _ = self.write_line("quit");
        let deadline = Instant::now() + ENGINE_QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Extracts the option name from the body of an `option` line.
pub fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok == "name" {
            let parts: Vec<&str> = tokens.by_ref().take_while(|t| *t != "type").collect();
            if !parts.is_empty() {
                return Some(parts.join(" "));
            }
        }
    }
    None
}
