//! Locating and launching an engine.

use std::ffi::OsString;
use std::path::PathBuf;

use log::{debug, warn};

use crate::engine::{EngineConfig, EngineProcess};

/// Environment variable naming an engine executable.
pub const ENGINE_PATH_ENV: &str = "STOCKFISH_PATH";

const WELL_KNOWN_LOCATIONS: &[&str] = &[
    "stockfish",
    "stockfish.exe",
    r"C:\Program Files\Stockfish\stockfish.exe",
    r"C:\stockfish\stockfish.exe",
    "./stockfish/stockfish-windows-x86-64-avx2.exe",
    "/usr/local/bin/stockfish",
    "/usr/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
];

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("no UCI engine could be started (tried: {})", display_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Candidate executables in the order they are tried.
pub fn candidate_paths(cfg: &EngineConfig, env_override: Option<OsString>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    let mut push = |p: PathBuf| {
        if !out.contains(&p) {
            out.push(p);
        }
    };
    if let Some(path) = &cfg.path {
        push(path.clone());
    }
    if cfg.discover {
        if let Some(env) = env_override.filter(|v| !v.is_empty()) {
            push(PathBuf::from(env));
        }
        for loc in WELL_KNOWN_LOCATIONS {
            push(PathBuf::from(loc));
        }
    }
    out
}

/// Starts the first candidate that launches and completes the handshake.
pub fn connect(cfg: &EngineConfig) -> Result<EngineProcess, ConnectionError> {
    let tried = candidate_paths(cfg, std::env::var_os(ENGINE_PATH_ENV));
    for path in &tried {
        match EngineProcess::spawn(cfg, path) {
            Ok(engine) => return Ok(engine),
            Err(err) => debug!("engine candidate {} rejected: {err}", path.display()),
        }
    }
    warn!("no engine found among {} candidates", tried.len());
    Err(ConnectionError::NotFound { tried })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_comes_first_then_env_then_defaults() {
        let cfg = EngineConfig {
            path: Some(PathBuf::from("/opt/engines/sf")),
            ..EngineConfig::default()
        };
        let paths = candidate_paths(&cfg, Some(OsString::from("/env/sf")));
        assert_eq!(paths[0], PathBuf::from("/opt/engines/sf"));
        assert_eq!(paths[1], PathBuf::from("/env/sf"));
        assert_eq!(paths[2], PathBuf::from("stockfish"));
        assert_eq!(paths.len(), 2 + WELL_KNOWN_LOCATIONS.len());
    }

    #[test]
    fn duplicates_and_empty_env_are_skipped() {
        let cfg = EngineConfig {
            path: Some(PathBuf::from("stockfish")),
            ..EngineConfig::default()
        };
        let paths = candidate_paths(&cfg, Some(OsString::new()));
        assert_eq!(paths.len(), WELL_KNOWN_LOCATIONS.len());
    }

    #[test]
    fn discovery_can_be_disabled() {
        let cfg = EngineConfig {
            path: Some(PathBuf::from("/nowhere/engine")),
            discover: false,
            ..EngineConfig::default()
        };
        assert_eq!(candidate_paths(&cfg, Some(OsString::from("/env/sf"))).len(), 1);

        match connect(&cfg) {
            Err(ConnectionError::NotFound { tried }) => {
                assert_eq!(tried, vec![PathBuf::from("/nowhere/engine")]);
            }
            Ok(engine) => panic!("unexpected engine {}", engine.name()),
        }
    }
}
