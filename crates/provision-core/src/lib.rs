//! Verify-cycle engine for Provision.
//!
//! `ComposeEngine` exposes the pre-orchestration phase (write the compose
//! document and `.env`) and the post-orchestration phase (bring services up)
//! of one server as `Phase` values: ordered, fail-fast sequences of `Step`s
//! that report to a caller-supplied `StepReporter`. Steps follow the
//! `StepState` machine validated in `lifecycle`. `ServerLock` serializes
//! verify cycles on one config directory and the interrupt flag stops a
//! pipeline between steps.

pub mod concurrency;
pub mod engine;
pub mod lifecycle;
pub mod step;

pub use concurrency::{install_signal_handler, request_shutdown, shutdown_requested, ServerLock};
pub use engine::{ComposeEngine, VerifyReport};
pub use lifecycle::{validate_transition, StepState};
pub use step::{
    FailedStep, LogReporter, Phase, PhaseKind, PhaseReport, Step, StepInfo, StepReporter,
    StepStatus,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Compose(#[from] provision_compose::ComposeError),
    #[error(transparent)]
    Write(#[from] provision_compose::WriteError),
    #[error(transparent)]
    Command(#[from] provision_compose::CommandError),
    #[error("interrupted before the step started")]
    Interrupted,
    #[error("invalid step transition: {from} -> {to}")]
    InvalidTransition { from: StepState, to: StepState },
    #[error("server config directory {0} is locked by another verify")]
    Locked(std::path::PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
