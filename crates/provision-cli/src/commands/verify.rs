use super::{colorize_state, exit_code_for, json_pretty, load_server, SpinnerReporter, EXIT_SUCCESS};
use provision_compose::{check_orchestrator_prereqs, format_missing, AtomicWriter, ProcessExecutor};
use provision_core::{
    ComposeEngine, CoreError, LogReporter, PhaseReport, ServerLock, StepReporter, StepState,
    VerifyReport,
};
use std::path::Path;

#[derive(Debug, Default)]
pub struct VerifyOptions {
    pub no_up: bool,
    pub load_files: bool,
    pub binary: Option<String>,
    pub options: Option<String>,
}

pub fn run(manifest: &Path, opts: &VerifyOptions, json: bool) -> Result<u8, String> {
    let (parsed, server) = load_server(manifest)?;

    let mut orchestrator = parsed.orchestrator.clone();
    if let Some(binary) = &opts.binary {
        orchestrator.binary.clone_from(binary);
    }
    if let Some(options) = &opts.options {
        orchestrator.options.clone_from(options);
    }
    orchestrator.load_files |= opts.load_files;

    if !opts.no_up && std::env::var("PROVISION_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = check_orchestrator_prereqs(&orchestrator);
        if !missing.is_empty() {
            return Err(format_missing(&missing));
        }
    }

    let _lock = match ServerLock::try_acquire(&server.layout().lock_file()) {
        Ok(lock) => lock,
        Err(e @ CoreError::Write(_)) => {
            eprintln!("error: {e}");
            return Ok(exit_code_for(&e));
        }
        Err(e) => return Err(format!("server lock: {e}")),
    };

    let executor = ProcessExecutor;
    let engine =
        ComposeEngine::new(&server, &AtomicWriter, &executor).with_orchestrator(orchestrator);

    let report = if json {
        run_phases(&engine, opts.no_up, &mut LogReporter)
    } else {
        run_phases(&engine, opts.no_up, &mut SpinnerReporter::default())
    };

    if json {
        let phases: Vec<_> = std::iter::once(&report.pre)
            .chain(report.post.as_ref())
            .map(phase_json)
            .collect();
        let payload = serde_json::json!({
            "server": server.name.as_str(),
            "config_dir": server.config_dir,
            "status": if report.succeeded() { "verified" } else { "failed" },
            "phases": phases,
            "error": report.error().map(ToString::to_string),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for id in skipped(&report) {
            println!("  {id}: {}", colorize_state(StepState::Pending));
        }
        if report.succeeded() {
            println!("server {} {}", server.name, colorize_state(StepState::Succeeded));
        }
    }

    match report.error() {
        None => Ok(EXIT_SUCCESS),
        Some(e) => {
            if !json {
                eprintln!("error: {e}");
            }
            Ok(exit_code_for(e))
        }
    }
}

fn run_phases(engine: &ComposeEngine<'_>, no_up: bool, reporter: &mut dyn StepReporter) -> VerifyReport {
    if no_up {
        VerifyReport {
            pre: engine.pre_verify().run(reporter),
            post: None,
        }
    } else {
        engine.verify(reporter)
    }
}

fn skipped(report: &VerifyReport) -> impl Iterator<Item = &String> {
    report
        .pre
        .skipped
        .iter()
        .chain(report.post.iter().flat_map(|p| p.skipped.iter()))
}

fn phase_json(report: &PhaseReport) -> serde_json::Value {
    serde_json::json!({
        "phase": report.kind.to_string(),
        "completed": report.completed,
        "failed": report.failed.as_ref().map(|f| serde_json::json!({
            "step": f.id,
            "error": f.error.to_string(),
        })),
        "skipped": report.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_core::{Phase, PhaseKind, Step};
    use provision_compose::CommandError;

    #[test]
    fn phase_json_lists_steps() {
        let report = Phase::new(PhaseKind::PreOrchestration)
            .with_step(Step::new("a", || Ok(())))
            .with_step(Step::new("b", || Err(CommandError::Empty.into())))
            .with_step(Step::new("c", || Ok(())))
            .run(&mut LogReporter);
        let value = phase_json(&report);
        assert_eq!(value["phase"], "pre-orchestration");
        assert_eq!(value["completed"], serde_json::json!(["a"]));
        assert_eq!(value["failed"]["step"], "b");
        assert_eq!(value["failed"]["error"], "command line is empty");
        assert_eq!(value["skipped"], serde_json::json!(["c"]));
    }
}
