use crate::discovery::discover_fragments;
use crate::ComposeError;
use provision_schema::OrchestratorConfig;
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command line is empty")]
    Empty,
    #[error("cannot parse command line '{command}': {reason}")]
    Parse { command: String, reason: String },
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' {}", describe_exit(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}

/// An invocation of the external orchestrator:
/// `<binary> [-f <file>]... <subcommand> <options>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorCommand {
    pub binary: String,
    pub files: Vec<String>,
    pub subcommand: String,
    pub options: String,
}

impl OrchestratorCommand {
    pub fn new(
        binary: impl Into<String>,
        subcommand: impl Into<String>,
        options: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            files: Vec::new(),
            subcommand: subcommand.into(),
            options: options.into(),
        }
    }

    /// The configured command for `config_dir`, loading fragments explicitly
    /// when the configuration asks for it.
    pub fn from_config(config: &OrchestratorConfig, config_dir: &Path) -> Result<Self, ComposeError> {
        let command = Self::new(&config.binary, &config.subcommand, &config.options);
        if config.load_files {
            command.load_files(config_dir)
        } else {
            Ok(command)
        }
    }

    /// Pass every fragment of `config_dir` with `-f`.
    ///
    /// Not needed when running inside `config_dir`, where the generated
    /// `.env` already lists the fragments.
    pub fn load_files(mut self, config_dir: &Path) -> Result<Self, ComposeError> {
        self.files = discover_fragments(config_dir)?;
        Ok(self)
    }

    pub fn to_command_line(&self) -> String {
        let mut parts = vec![self.binary.clone()];
        for file in &self.files {
            parts.push("-f".to_owned());
            parts.push(shell_words::quote(file).into_owned());
        }
        parts.push(self.subcommand.clone());
        parts.push(self.options.clone());
        parts.retain(|p| !p.trim().is_empty());
        parts
            .iter()
            .map(|p| p.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Split the command line into program and arguments, shell-style.
    pub fn argv(&self) -> Result<Vec<String>, CommandError> {
        let line = self.to_command_line();
        let argv = shell_words::split(&line).map_err(|e| CommandError::Parse {
            command: line.clone(),
            reason: e.to_string(),
        })?;
        if argv.is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(argv)
    }
}

impl fmt::Display for OrchestratorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`CommandError::Failed`].
    pub fn check(self, command: &OrchestratorCommand) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                command: command.to_command_line(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Runs orchestrator commands. Blocks until the command exits.
pub trait CommandExecutor {
    fn run(&self, command: &OrchestratorCommand, working_dir: &Path)
        -> Result<CommandOutput, CommandError>;
}

/// Executes commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for ProcessExecutor {
    fn run(
        &self,
        command: &OrchestratorCommand,
        working_dir: &Path,
    ) -> Result<CommandOutput, CommandError> {
        let argv = command.argv()?;
        info!("running {command} in {}", working_dir.display());

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: command.to_command_line(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stdout.lines() {
            info!("[{}] {line}", argv[0]);
        }
        // docker-compose reports progress on stderr.
        for line in stderr.lines() {
            info!("[{}] {line}", argv[0]);
        }
        debug!("{command} exited with {:?}", output.status.code());

        Ok(CommandOutput {
            code: output.status.code(),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = OrchestratorCommand::from_config(&OrchestratorConfig::default(), dir.path()).unwrap();
        assert_eq!(
            cmd.to_command_line(),
            "docker-compose up -d --build --force-recreate"
        );
        assert_eq!(cmd.to_string(), cmd.to_command_line());
    }

    #[test]
    fn empty_options_are_dropped() {
        let cmd = OrchestratorCommand::new("docker-compose", "ps", "");
        assert_eq!(cmd.to_command_line(), "docker-compose ps");
    }

    #[test]
    fn load_files_adds_fragments_before_subcommand() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("docker-compose.yml"), "").unwrap();
        fs::write(dir.path().join("docker-compose-overrides.yml"), "").unwrap();
        let config = OrchestratorConfig {
            load_files: true,
            ..OrchestratorConfig::default()
        };
        let cmd = OrchestratorCommand::from_config(&config, dir.path()).unwrap();
        assert_eq!(
            cmd.to_command_line(),
            "docker-compose -f docker-compose.yml -f docker-compose-overrides.yml up -d --build --force-recreate"
        );
    }

    #[test]
    fn argv_splits_quoted_options() {
        let cmd = OrchestratorCommand::new("docker", "compose", "up -d --scale 'web=2'");
        assert_eq!(
            cmd.argv().unwrap(),
            ["docker", "compose", "up", "-d", "--scale", "web=2"]
        );
    }

    #[test]
    fn argv_rejects_unbalanced_quotes() {
        let cmd = OrchestratorCommand::new("docker-compose", "up", "-d 'oops");
        assert!(matches!(cmd.argv(), Err(CommandError::Parse { .. })));
    }

    #[test]
    fn argv_rejects_blank_command() {
        let cmd = OrchestratorCommand::new(" ", "", "");
        assert!(matches!(cmd.argv(), Err(CommandError::Empty)));
    }

    #[test]
    fn check_maps_non_zero_exit() {
        let cmd = OrchestratorCommand::new("docker-compose", "up", "");
        let out = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "boom".to_owned(),
        };
        let err = out.check(&cmd).unwrap_err();
        assert_eq!(err.to_string(), "'docker-compose up' exited with code 1");

        let killed = CommandOutput {
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(killed.check(&cmd).unwrap_err().to_string().contains("signal"));
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = OrchestratorCommand::new("pwd", "", "");
        let out = ProcessExecutor.run(&cmd, dir.path()).unwrap();
        assert!(out.success());
        let reported = fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(reported, fs::canonicalize(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = OrchestratorCommand::new("sh", "-c", "'exit 3'");
        let out = ProcessExecutor.run(&cmd, dir.path()).unwrap();
        assert_eq!(out.code, Some(3));
        assert!(matches!(
            out.check(&cmd),
            Err(CommandError::Failed { code: Some(3), .. })
        ));
    }

    #[test]
    fn process_executor_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = OrchestratorCommand::new("provision-no-such-binary-x9", "up", "");
        assert!(matches!(
            ProcessExecutor.run(&cmd, dir.path()),
            Err(CommandError::Spawn { .. })
        ));
    }
}
