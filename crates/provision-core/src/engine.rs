use crate::step::{Phase, PhaseKind, PhaseReport, Step, StepReporter};
use crate::CoreError;
use provision_compose::{
    build_compose_document, compose_env_file, ArtifactWriter, CommandExecutor,
    OrchestratorCommand, Server,
};
use provision_schema::OrchestratorConfig;
use tracing::info;

/// Verify-cycle engine for one server.
///
/// Borrows the server together with the writer and executor collaborators,
/// and hands out fresh phases on every call. Nothing happens until a phase
/// is run.
pub struct ComposeEngine<'a> {
    server: &'a Server,
    writer: &'a dyn ArtifactWriter,
    executor: &'a dyn CommandExecutor,
    orchestrator: OrchestratorConfig,
}

/// Outcome of a verify cycle. `post` is `None` when the post-orchestration
/// phase did not run.
#[derive(Debug)]
pub struct VerifyReport {
    pub pre: PhaseReport,
    pub post: Option<PhaseReport>,
}

impl VerifyReport {
    pub fn succeeded(&self) -> bool {
        self.pre.succeeded() && self.post.as_ref().map_or(true, PhaseReport::succeeded)
    }

    /// The error that stopped the cycle, if any.
    pub fn error(&self) -> Option<&CoreError> {
        self.pre
            .error()
            .or_else(|| self.post.as_ref().and_then(PhaseReport::error))
    }
}

impl<'a> ComposeEngine<'a> {
    pub fn new(
        server: &'a Server,
        writer: &'a dyn ArtifactWriter,
        executor: &'a dyn CommandExecutor,
    ) -> Self {
        Self {
            server,
            writer,
            executor,
            orchestrator: OrchestratorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn orchestrator(&self) -> &OrchestratorConfig {
        &self.orchestrator
    }

    /// Write `docker-compose.yml`, then `.env`.
    ///
    /// The `.env` step discovers fragments when it runs, so it sees the
    /// document written by the step before it.
    pub fn pre_verify(&self) -> Phase<'a> {
        let server = self.server;
        let writer = self.writer;
        let layout = server.layout();
        let compose_file = layout.compose_file();
        let env_file = layout.env_file();

        let write_document = Step::new("docker.compose.write", move || {
            let artifact = build_compose_document(server)?;
            writer.write_artifact(&artifact)?;
            Ok(())
        })
        .start("Generating docker-compose.yml file...")
        .success(format!(
            "Generating docker-compose.yml file... Saved to {}",
            compose_file.display()
        ))
        .failure(format!(
            "Generating docker-compose.yml file... Could not save {}",
            compose_file.display()
        ));

        let write_env = Step::new("docker.compose.env", move || {
            let artifact = compose_env_file(&server.config_dir)?;
            writer.write_artifact(&artifact)?;
            Ok(())
        })
        .start("Generating .env file...")
        .success(format!(
            "Generating .env file... Saved to {}",
            env_file.display()
        ))
        .failure(format!(
            "Generating .env file... Could not save {}",
            env_file.display()
        ));

        Phase::new(PhaseKind::PreOrchestration)
            .with_step(write_document)
            .with_step(write_env)
    }

    /// Run the orchestrator in the server config directory.
    pub fn post_verify(&self) -> Phase<'a> {
        let server = self.server;
        let executor = self.executor;
        let orchestrator = self.orchestrator.clone();
        let summary = OrchestratorCommand::new(
            &orchestrator.binary,
            &orchestrator.subcommand,
            &orchestrator.options,
        );

        let up = Step::new("docker.compose.up", move || {
            let command = OrchestratorCommand::from_config(&orchestrator, &server.config_dir)?;
            executor.run(&command, &server.config_dir)?.check(&command)?;
            Ok(())
        })
        .start(format!(
            "Running {summary} in {} ...",
            server.config_dir.display()
        ))
        .success(format!("Services of {} are up", server.name))
        .failure(format!("Running {summary} failed"));

        Phase::new(PhaseKind::PostOrchestration).with_step(up)
    }

    /// Run pre-orchestration and, only if it succeeded, post-orchestration.
    pub fn verify(&self, reporter: &mut dyn StepReporter) -> VerifyReport {
        info!(
            "verifying server {} in {}",
            self.server.name,
            self.server.config_dir.display()
        );
        let pre = self.pre_verify().run(reporter);
        if !pre.succeeded() {
            return VerifyReport { pre, post: None };
        }
        let post = self.post_verify().run(reporter);
        VerifyReport {
            pre,
            post: Some(post),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::LogReporter;
    use provision_compose::{AtomicWriter, MockExecutor};
    use provision_schema::{HttpService, ServerName, ServiceSpec, TypeKey};
    use std::fs;

    fn server(dir: &std::path::Path) -> Server {
        Server::new(ServerName::new("web1").unwrap(), dir).with_service(
            TypeKey::new("web").unwrap(),
            ServiceSpec::Http(HttpService {
                image: "app".to_owned(),
                ..HttpService::default()
            }),
        )
    }

    #[test]
    fn phases_have_expected_steps() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let executor = MockExecutor::new();
        let engine = ComposeEngine::new(&server, &AtomicWriter, &executor);

        assert_eq!(
            engine.pre_verify().step_ids(),
            ["docker.compose.write", "docker.compose.env"]
        );
        assert_eq!(engine.post_verify().step_ids(), ["docker.compose.up"]);
    }

    #[test]
    fn building_phases_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let executor = MockExecutor::new();
        let engine = ComposeEngine::new(&server, &AtomicWriter, &executor);

        drop(engine.pre_verify());
        drop(engine.post_verify());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn verify_writes_files_then_runs_orchestrator() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let executor = MockExecutor::new();
        let engine = ComposeEngine::new(&server, &AtomicWriter, &executor);

        let report = engine.verify(&mut LogReporter);
        assert!(report.succeeded(), "{:?}", report.error());
        assert!(dir.path().join("docker-compose.yml").is_file());

        let env = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(env.contains("COMPOSE_FILE=docker-compose.yml\n"));

        assert_eq!(
            executor.calls(),
            [(
                "docker-compose up -d --build --force-recreate".to_owned(),
                dir.path().to_path_buf()
            )]
        );
    }

    #[test]
    fn configured_orchestrator_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let executor = MockExecutor::new();
        let engine = ComposeEngine::new(&server, &AtomicWriter, &executor).with_orchestrator(
            OrchestratorConfig {
                binary: "docker compose".to_owned(),
                options: "-d".to_owned(),
                load_files: true,
                ..OrchestratorConfig::default()
            },
        );

        assert!(engine.verify(&mut LogReporter).succeeded());
        assert_eq!(
            executor.calls()[0].0,
            "docker compose -f docker-compose.yml up -d"
        );
    }

    #[test]
    fn step_messages_name_the_files() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let executor = MockExecutor::new();
        let engine = ComposeEngine::new(&server, &AtomicWriter, &executor);

        let pre = engine.pre_verify();
        let ids = pre.step_ids();
        assert_eq!(ids.len(), 2);
        let mut messages = Vec::new();
        let mut reporter = |info: &crate::StepInfo, status: &crate::StepStatus<'_>| {
            if matches!(status, crate::StepStatus::Succeeded) {
                messages.push(info.success.clone());
            }
        };
        pre.run(&mut reporter);
        assert!(messages[0].ends_with(&format!(
            "Saved to {}",
            dir.path().join("docker-compose.yml").display()
        )));
        assert!(messages[1].ends_with(".env"));
    }
}
