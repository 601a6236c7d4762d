pub mod completions;
pub mod discover;
pub mod render;
pub mod verify;

use indicatif::{ProgressBar, ProgressStyle};
use provision_compose::Server;
use provision_core::{CoreError, StepInfo, StepReporter, StepState, StepStatus};
use provision_schema::{parse_manifest_file, ServerManifest};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_WRITE_ERROR: u8 = 3;
pub const EXIT_COMMAND_ERROR: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn exit_code_for(error: &CoreError) -> u8 {
    match error {
        CoreError::Write(_) => EXIT_WRITE_ERROR,
        CoreError::Command(_) => EXIT_COMMAND_ERROR,
        _ => EXIT_FAILURE,
    }
}

/// Parse the manifest and build the server it describes. `config_path` is
/// resolved against the manifest's directory.
pub fn load_server(manifest: &Path) -> Result<(ServerManifest, Server), String> {
    let parsed = parse_manifest_file(manifest)
        .map_err(|e| format!("manifest error: {}: {e}", manifest.display()))?;
    let manifest_dir = match manifest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let manifest_dir = std::path::absolute(manifest_dir)
        .map_err(|e| format!("cannot resolve {}: {e}", manifest_dir.display()))?;
    let server = Server::from_manifest(&parsed, &manifest_dir);
    debug!(
        "server {} from {}: {} service(s), config dir {}",
        server.name,
        manifest.display(),
        server.services.len(),
        server.config_dir.display()
    );
    Ok((parsed, server))
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: StepState) -> String {
    use console::Style;
    let text = state.to_string();
    match state {
        StepState::Succeeded => Style::new().green().apply_to(text).to_string(),
        StepState::Failed => Style::new().red().bold().apply_to(text).to_string(),
        StepState::Running => Style::new().cyan().apply_to(text).to_string(),
        StepState::Pending => Style::new().dim().apply_to(text).to_string(),
    }
}

/// Shows one spinner per step.
#[derive(Default)]
pub struct SpinnerReporter {
    current: Option<ProgressBar>,
}

impl StepReporter for SpinnerReporter {
    fn report(&mut self, step: &StepInfo, status: &StepStatus<'_>) {
        match status {
            StepStatus::Started => self.current = Some(spinner(&step.start)),
            StepStatus::Succeeded => {
                if let Some(pb) = self.current.take() {
                    spin_ok(&pb, &step.success);
                }
            }
            // Interrupted steps fail without starting.
            StepStatus::Failed(_) => match self.current.take() {
                Some(pb) => spin_fail(&pb, &step.failure),
                None => eprintln!("✗ {}", step.failure),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_compose::{CommandError, WriteError};
    use std::path::PathBuf;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_MANIFEST_ERROR,
            EXIT_WRITE_ERROR,
            EXIT_COMMAND_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn exit_code_follows_error_kind() {
        let write = CoreError::Write(WriteError {
            path: PathBuf::from(".env"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert_eq!(exit_code_for(&write), EXIT_WRITE_ERROR);
        assert_eq!(
            exit_code_for(&CoreError::Command(CommandError::Empty)),
            EXIT_COMMAND_ERROR
        );
        assert_eq!(exit_code_for(&CoreError::Interrupted), EXIT_FAILURE);
    }

    #[test]
    fn load_server_resolves_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("provision.toml");
        std::fs::write(
            &manifest,
            "manifest_version = 1\n[server]\nname = \"web1\"\nconfig_path = \"stack\"\n",
        )
        .unwrap();
        let (parsed, server) = load_server(&manifest).unwrap();
        assert_eq!(parsed.server.name, "web1");
        assert_eq!(server.config_dir, dir.path().join("stack"));
    }

    #[test]
    fn load_server_reports_manifest_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_server(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.starts_with("manifest error:"));
    }

    #[test]
    fn colorize_state_keeps_text() {
        for state in [
            StepState::Pending,
            StepState::Running,
            StepState::Succeeded,
            StepState::Failed,
        ] {
            assert!(colorize_state(state).contains(&state.to_string()));
        }
    }

    #[test]
    fn spinner_reporter_handles_unstarted_failure() {
        let mut reporter = SpinnerReporter::default();
        let info = StepInfo {
            id: "docker.compose.write".to_owned(),
            start: "start".to_owned(),
            success: "ok".to_owned(),
            failure: "failed".to_owned(),
        };
        reporter.report(&info, &StepStatus::Failed(&CoreError::Interrupted));
        reporter.report(&info, &StepStatus::Started);
        reporter.report(&info, &StepStatus::Succeeded);
        assert!(reporter.current.is_none());
    }
}
