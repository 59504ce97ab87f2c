//! `kibitz.toml` settings. Every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kibitz_session::SessionConfig;
use kibitz_uci::{EngineConfig, SearchLimit};
use kibitz_vision::VisionConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KibitzConfig {
    pub engine: EngineSection,
    pub analysis: AnalysisSection,
    pub exhibition: ExhibitionSection,
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub path: Option<PathBuf>,
    pub args: Vec<String>,
    pub threads: usize,
    pub hash_mb: u32,
    /// Extra UCI options, `Name=Value`.
    pub options: Vec<String>,
    pub timeout_margin_ms: u64,
    /// Search `STOCKFISH_PATH` and the usual install locations.
    pub discover: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            threads: 1,
            hash_mb: 64,
            options: Vec::new(),
            timeout_margin_ms: 2000,
            discover: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// One-shot `analyze` / `repl` bounds.
    pub depth: u32,
    pub movetime_ms: u64,
    pub lines: u32,
    pub advice_depth: u32,
    pub hint_depth: u32,
    pub solve_depth: u32,
    pub solve_plies: usize,
    pub expected_line_plies: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            depth: 15,
            movetime_ms: 500,
            lines: 1,
            advice_depth: 18,
            hint_depth: 15,
            solve_depth: 30,
            solve_plies: 10,
            expected_line_plies: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExhibitionSection {
    pub depth: u32,
    pub pace_ms: u64,
}

impl Default for ExhibitionSection {
    fn default() -> Self {
        Self {
            depth: 12,
            pace_ms: 1000,
        }
    }
}

impl KibitzConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        let e = &self.engine;
        EngineConfig {
            path: e.path.clone(),
            args: e.args.clone(),
            threads: e.threads,
            hash_mb: e.hash_mb,
            options: e.options.clone(),
            timeout_margin: Duration::from_millis(e.timeout_margin_ms),
            discover: e.discover,
            ..EngineConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let a = &self.analysis;
        SessionConfig {
            advice_limit: SearchLimit::depth(a.advice_depth),
            hint_limit: SearchLimit::depth(a.hint_depth),
            solve_limit: SearchLimit::depth(a.solve_depth),
            solve_plies: a.solve_plies,
            exhibition_limit: SearchLimit::depth(self.exhibition.depth),
            exhibition_pace: Duration::from_millis(self.exhibition.pace_ms),
            expected_line_plies: a.expected_line_plies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: KibitzConfig = toml::from_str("").unwrap();
        assert_eq!(config, KibitzConfig::default());
        assert_eq!(config.session_config(), SessionConfig::default());
        assert_eq!(config.vision.model, "claude-opus-4-20250514");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: KibitzConfig = toml::from_str(
            r#"
            [engine]
            path = "/opt/sf/stockfish"
            hash_mb = 256
            options = ["Skill Level=10"]

            [exhibition]
            pace_ms = 250

            [vision]
            api_key_env = "MY_KEY"
            "#,
        )
        .unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.path, Some(PathBuf::from("/opt/sf/stockfish")));
        assert_eq!(engine.hash_mb, 256);
        assert_eq!(engine.threads, 1);
        assert_eq!(engine.options, vec!["Skill Level=10".to_string()]);
        assert!(engine.discover);

        let session = config.session_config();
        assert_eq!(session.exhibition_pace, Duration::from_millis(250));
        assert_eq!(session.exhibition_limit, SearchLimit::depth(12));
        assert_eq!(config.vision.api_key_env, "MY_KEY");
        assert_eq!(config.vision.max_tokens, 2000);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(toml::from_str::<KibitzConfig>("[engine]\nthreads = \"many\"").is_err());
    }
}
