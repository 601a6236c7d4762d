use crate::concurrency::shutdown_requested;
use crate::lifecycle::{validate_transition, StepState};
use crate::CoreError;
use std::fmt;
use tracing::{debug, error, info, warn};

/// The reportable part of a step: its id and the messages shown when it
/// starts, succeeds, or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub id: String,
    pub start: String,
    pub success: String,
    pub failure: String,
}

type Action<'a> = Box<dyn FnOnce() -> Result<(), CoreError> + 'a>;

/// A named operation of a phase. Consumed when run, so it executes at most
/// once.
pub struct Step<'a> {
    info: StepInfo,
    action: Action<'a>,
}

impl<'a> Step<'a> {
    pub fn new(
        id: impl Into<String>,
        action: impl FnOnce() -> Result<(), CoreError> + 'a,
    ) -> Self {
        let id = id.into();
        Self {
            info: StepInfo {
                start: format!("{id}..."),
                success: format!("{id}: done"),
                failure: format!("{id}: failed"),
                id,
            },
            action: Box::new(action),
        }
    }

    #[must_use]
    pub fn start(mut self, message: impl Into<String>) -> Self {
        self.info.start = message.into();
        self
    }

    #[must_use]
    pub fn success(mut self, message: impl Into<String>) -> Self {
        self.info.success = message.into();
        self
    }

    #[must_use]
    pub fn failure(mut self, message: impl Into<String>) -> Self {
        self.info.failure = message.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &StepInfo {
        &self.info
    }
}

impl fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("info", &self.info).finish_non_exhaustive()
    }
}

/// What a reporter is told about a step.
#[derive(Debug, Clone, Copy)]
pub enum StepStatus<'e> {
    Started,
    Succeeded,
    Failed(&'e CoreError),
}

impl StepStatus<'_> {
    pub fn state(&self) -> StepState {
        match self {
            StepStatus::Started => StepState::Running,
            StepStatus::Succeeded => StepState::Succeeded,
            StepStatus::Failed(_) => StepState::Failed,
        }
    }
}

/// Receives step transitions as a phase runs.
pub trait StepReporter {
    fn report(&mut self, step: &StepInfo, status: &StepStatus<'_>);
}

impl<F> StepReporter for F
where
    F: FnMut(&StepInfo, &StepStatus<'_>),
{
    fn report(&mut self, step: &StepInfo, status: &StepStatus<'_>) {
        self(step, status);
    }
}

/// Reports steps through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl StepReporter for LogReporter {
    fn report(&mut self, step: &StepInfo, status: &StepStatus<'_>) {
        match status {
            StepStatus::Started => info!("{}", step.start),
            StepStatus::Succeeded => info!("{}", step.success),
            StepStatus::Failed(e) => error!("{}: {e}", step.failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    PreOrchestration,
    PostOrchestration,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseKind::PreOrchestration => "pre-orchestration",
            PhaseKind::PostOrchestration => "post-orchestration",
        })
    }
}

#[derive(Debug)]
pub struct FailedStep {
    pub id: String,
    pub error: CoreError,
}

/// Outcome of one phase run.
#[derive(Debug)]
pub struct PhaseReport {
    pub kind: PhaseKind,
    pub completed: Vec<String>,
    pub failed: Option<FailedStep>,
    /// Steps never started because an earlier one failed.
    pub skipped: Vec<String>,
}

impl PhaseReport {
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }

    pub fn error(&self) -> Option<&CoreError> {
        self.failed.as_ref().map(|f| &f.error)
    }

    pub fn into_result(self) -> Result<(), CoreError> {
        match self.failed {
            Some(failed) => Err(failed.error),
            None => Ok(()),
        }
    }
}

/// An ordered, fail-fast sequence of steps.
#[derive(Debug)]
pub struct Phase<'a> {
    kind: PhaseKind,
    steps: Vec<Step<'a>>,
}

impl<'a> Phase<'a> {
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            kind,
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: Step<'a>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: Step<'a>) {
        self.steps.push(step);
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(Step::id).collect()
    }

    /// Run the steps in order. The first failure stops the phase; the steps
    /// after it are listed as skipped and never executed.
    pub fn run(self, reporter: &mut dyn StepReporter) -> PhaseReport {
        debug!("{} phase: {} step(s)", self.kind, self.steps.len());
        let mut report = PhaseReport {
            kind: self.kind,
            completed: Vec::new(),
            failed: None,
            skipped: Vec::new(),
        };

        let mut steps = self.steps.into_iter();
        for step in steps.by_ref() {
            let Step { info, action } = step;
            match run_step(&info, action, reporter) {
                Ok(()) => report.completed.push(info.id),
                Err(error) => {
                    report.failed = Some(FailedStep { id: info.id, error });
                    break;
                }
            }
        }
        report.skipped = steps.map(|s| s.info.id).collect();
        if !report.skipped.is_empty() {
            warn!(
                "{} phase stopped, skipped: {}",
                report.kind,
                report.skipped.join(", ")
            );
        }
        report
    }
}

fn run_step(
    info: &StepInfo,
    action: Action<'_>,
    reporter: &mut dyn StepReporter,
) -> Result<(), CoreError> {
    let state = StepState::Pending;

    if shutdown_requested() {
        validate_transition(state, StepState::Failed)?;
        let err = CoreError::Interrupted;
        reporter.report(info, &StepStatus::Failed(&err));
        return Err(err);
    }

    validate_transition(state, StepState::Running)?;
    reporter.report(info, &StepStatus::Started);

    let state = StepState::Running;
    match action() {
        Ok(()) => {
            validate_transition(state, StepState::Succeeded)?;
            reporter.report(info, &StepStatus::Succeeded);
            Ok(())
        }
        Err(err) => {
            validate_transition(state, StepState::Failed)?;
            reporter.report(info, &StepStatus::Failed(&err));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_compose::CommandError;
    use std::cell::{Cell, RefCell};

    fn ok_step<'a>(id: &str, ran: &'a Cell<u32>) -> Step<'a> {
        Step::new(id, move || {
            ran.set(ran.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn runs_steps_in_order() {
        let order = RefCell::new(Vec::new());
        let phase = Phase::new(PhaseKind::PreOrchestration)
            .with_step(Step::new("a", || {
                order.borrow_mut().push("a");
                Ok(())
            }))
            .with_step(Step::new("b", || {
                order.borrow_mut().push("b");
                Ok(())
            }));
        assert_eq!(phase.step_ids(), ["a", "b"]);

        let report = phase.run(&mut LogReporter);
        assert!(report.succeeded());
        assert_eq!(report.completed, ["a", "b"]);
        assert!(report.skipped.is_empty());
        assert_eq!(*order.borrow(), ["a", "b"]);
    }

    #[test]
    fn first_failure_halts_phase() {
        let ran = Cell::new(0);
        let phase = Phase::new(PhaseKind::PostOrchestration)
            .with_step(ok_step("one", &ran))
            .with_step(Step::new("two", || Err(CommandError::Empty.into())))
            .with_step(ok_step("three", &ran))
            .with_step(ok_step("four", &ran));

        let report = phase.run(&mut LogReporter);
        assert!(!report.succeeded());
        assert_eq!(ran.get(), 1);
        assert_eq!(report.completed, ["one"]);
        let failed = report.failed.as_ref().unwrap();
        assert_eq!(failed.id, "two");
        assert!(matches!(failed.error, CoreError::Command(CommandError::Empty)));
        assert_eq!(report.skipped, ["three", "four"]);
        assert!(matches!(report.into_result(), Err(CoreError::Command(_))));
    }

    #[test]
    fn reporter_sees_start_and_outcome() {
        let mut events = Vec::new();
        let mut reporter = |info: &StepInfo, status: &StepStatus<'_>| {
            let message = match status {
                StepStatus::Started => info.start.clone(),
                StepStatus::Succeeded => info.success.clone(),
                StepStatus::Failed(e) => format!("{} ({e})", info.failure),
            };
            events.push((info.id.clone(), status.state(), message));
        };

        Phase::new(PhaseKind::PreOrchestration)
            .with_step(
                Step::new("write", || Ok(()))
                    .start("Writing...")
                    .success("Written"),
            )
            .with_step(
                Step::new("env", || Err(CommandError::Empty.into())).failure("No env"),
            )
            .run(&mut reporter);

        assert_eq!(
            events,
            [
                ("write".to_owned(), StepState::Running, "Writing...".to_owned()),
                ("write".to_owned(), StepState::Succeeded, "Written".to_owned()),
                ("env".to_owned(), StepState::Running, "env...".to_owned()),
                (
                    "env".to_owned(),
                    StepState::Failed,
                    "No env (command line is empty)".to_owned()
                ),
            ]
        );
    }

    #[test]
    fn empty_phase_succeeds() {
        let phase = Phase::new(PhaseKind::PostOrchestration);
        assert!(phase.is_empty());
        let report = phase.run(&mut LogReporter);
        assert!(report.succeeded());
        assert!(report.completed.is_empty());
        assert!(report.error().is_none());
    }

    #[test]
    fn default_messages_use_step_id() {
        let step = Step::new("docker.compose.up", || Ok(()));
        assert_eq!(step.info().start, "docker.compose.up...");
        assert_eq!(step.info().success, "docker.compose.up: done");
        assert_eq!(step.info().failure, "docker.compose.up: failed");
    }

    #[test]
    fn phase_kind_display() {
        assert_eq!(PhaseKind::PreOrchestration.to_string(), "pre-orchestration");
        assert_eq!(PhaseKind::PostOrchestration.to_string(), "post-orchestration");
    }
}
