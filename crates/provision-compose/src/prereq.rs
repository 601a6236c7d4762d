use crate::command::OrchestratorCommand;
use provision_schema::OrchestratorConfig;
use std::fmt;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check that the configured orchestrator binary can be found.
/// An empty list means the orchestrator can be started.
pub fn check_orchestrator_prereqs(config: &OrchestratorConfig) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    // The binary field may carry leading words such as `docker compose`.
    let program = OrchestratorCommand::new(&config.binary, "", "")
        .argv()
        .ok()
        .and_then(|argv| argv.into_iter().next());

    match program {
        Some(program) if command_exists(&program) => {}
        Some(program) => missing.push(MissingPrereq {
            name: program,
            purpose: "starting the composed services",
            install_hint: "install docker-compose, or set [orchestrator].binary in provision.toml",
        }),
        None => missing.push(MissingPrereq {
            name: config.binary.clone(),
            purpose: "starting the composed services",
            install_hint: "set [orchestrator].binary in provision.toml to an executable",
        }),
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nProvision needs an orchestrator to bring services up (or pass --no-up).");
    msg
}
