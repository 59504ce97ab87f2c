//! Interactive session control for the kibitz chess assistant.
//!
//! [`Controller`] holds the session state machine. [`AdvisoryWorker`] runs engine
//! requests on a background thread and reports back through a channel.

pub mod controller;
pub mod mode;
pub mod worker;

pub use controller::{
    AdviceView, Availability, Controller, Event, Session, SessionConfig, SessionError,
    SuggestedMove,
};
pub use mode::{Difficulty, Mode, SessionState};
pub use worker::{AdvisoryWorker, Dispatch, Job, Purpose, RequestTag, WorkerMessage};
