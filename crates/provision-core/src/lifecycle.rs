use crate::CoreError;
use std::fmt;

/// Execution state of one step. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Succeeded | StepState::Failed)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
        })
    }
}

pub fn validate_transition(from: StepState, to: StepState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (StepState::Pending, StepState::Running | StepState::Failed)
            | (StepState::Running, StepState::Succeeded | StepState::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}
