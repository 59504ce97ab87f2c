//! `info` line parsing and per-`multipv` aggregation.

use std::collections::HashMap;

use kibitz_core::{Score, UciMove};
use shakmaty::Color;

use crate::types::{CandidateLine, Pv};

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct InfoLine {
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub multipv: Option<u8>,
    /// Side-to-move relative, as reported.
    pub score: Option<Score>,
    pub pv: Pv,
}

pub(crate) fn parse_info_line(line: &str) -> Option<InfoLine> {
    let rest = line.strip_prefix("info ")?;
    let mut info = InfoLine::default();
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                info.depth = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "nodes" => {
                info.nodes = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "multipv" => {
                info.multipv = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            }
            "score" => {
                let value = tokens.get(i + 2).and_then(|t| t.parse::<i32>().ok());
                info.score = match (tokens.get(i + 1).copied(), value) {
                    (Some("cp"), Some(v)) => Some(Score::Cp(v)),
                    (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                    _ => None,
                };
                i += 3;
            }
            "pv" => {
                // an unparseable token ends the variation
                info.pv = tokens[i + 1..]
                    .iter()
                    .map_while(|t| UciMove::from_ascii(t.as_bytes()).ok())
                    .collect();
                break;
            }
            // free text runs to end of line
            "string" => break,
            _ => i += 1,
        }
    }
    Some(info)
}

/// Latest reported line per `multipv` index.
#[derive(Debug, Default)]
pub(crate) struct InfoAggregate {
    pub max_depth: u32,
    pub max_nodes: u64,
    lines: HashMap<u8, CandidateLine>,
}

impl InfoAggregate {
    /// Folds one engine line in. `turn` is the side to move of the searched position.
    pub fn update(&mut self, line: &str, turn: Color) {
        let Some(info) = parse_info_line(line) else {
            return;
        };
        if let Some(d) = info.depth {
            self.max_depth = self.max_depth.max(d);
        }
        if let Some(n) = info.nodes {
            self.max_nodes = self.max_nodes.max(n);
        }
        let (Some(score), false) = (info.score, info.pv.is_empty()) else {
            return;
        };
        let rank = info.multipv.unwrap_or(1);
        self.lines.insert(
            rank,
            CandidateLine {
                rank,
                score: Score::from_side_to_move(score, turn),
                depth: info.depth.unwrap_or(0),
                pv: info.pv,
            },
        );
    }

    /// At most `limit` lines, best-first for `turn`, re-ranked from 1.
    pub fn into_lines(self, limit: u8, turn: Color) -> Vec<CandidateLine> {
        let mut lines: Vec<CandidateLine> = self
            .lines
            .into_values()
            .filter(|l| l.rank <= limit)
            .collect();
        lines.sort_by(|a, b| {
            a.score
                .cmp_best_first(b.score, turn)
                .then(a.rank.cmp(&b.rank))
        });
        lines.truncate(usize::from(limit));
        for (idx, line) in lines.iter_mut().enumerate() {
            line.rank = idx as u8 + 1;
        }
        lines
    }
}
