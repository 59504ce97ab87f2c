//! UCI engine client.
//!
//! [`connect`] finds and launches an engine, [`EngineProcess::analyse`] runs one bounded
//! multi-line search and returns white-relative [`CandidateLine`]s ordered best-first for
//! the side to move.

pub mod discovery;
pub mod engine;
mod info;
pub mod types;

pub use discovery::{ConnectionError, ENGINE_PATH_ENV, candidate_paths, connect};
pub use engine::{EngineConfig, EngineError, EngineProcess};
pub use types::{Analysis, AnalysisRequest, CandidateLine, LineCount, Pv, SearchLimit};

/// Something that answers advisory requests.
pub trait Advisor: Send {
    fn name(&self) -> &str;

    fn analyse(
        &mut self,
        request: &AnalysisRequest,
        cancel: &dyn Fn() -> bool,
    ) -> Result<Analysis, EngineError>;
}

impl Advisor for EngineProcess {
    fn name(&self) -> &str {
        EngineProcess::name(self)
    }

    fn analyse(
        &mut self,
        request: &AnalysisRequest,
        cancel: &dyn Fn() -> bool,
    ) -> Result<Analysis, EngineError> {
        EngineProcess::analyse(self, request, cancel)
    }
}
