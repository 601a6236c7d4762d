use crate::command::{CommandError, CommandExecutor, CommandOutput, OrchestratorCommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockBehavior {
    Exit(i32),
    SpawnFailure,
}

/// Executor that records invocations instead of starting processes.
pub struct MockExecutor {
    behavior: MockBehavior,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::exiting(0)
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run reports exit code `code`.
    pub fn exiting(code: i32) -> Self {
        Self {
            behavior: MockBehavior::Exit(code),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every run fails as if the binary could not be started.
    pub fn unstartable() -> Self {
        Self {
            behavior: MockBehavior::SpawnFailure,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Command lines and working directories seen so far, in order.
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl CommandExecutor for MockExecutor {
    fn run(
        &self,
        command: &OrchestratorCommand,
        working_dir: &Path,
    ) -> Result<CommandOutput, CommandError> {
        let line = command.to_command_line();
        self.calls
            .lock()
            .map_err(|e| CommandError::Spawn {
                command: line.clone(),
                source: std::io::Error::other(format!("mutex poisoned: {e}")),
            })?
            .push((line.clone(), working_dir.to_path_buf()));

        match self.behavior {
            MockBehavior::Exit(code) => Ok(CommandOutput {
                code: Some(code),
                stdout: format!("mock-exec: {line}\n"),
                stderr: String::new(),
            }),
            MockBehavior::SpawnFailure => Err(CommandError::Spawn {
                command: line,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}
