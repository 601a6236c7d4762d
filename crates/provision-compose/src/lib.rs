//! Compose artifact generation and orchestrator plumbing for Provision.
//!
//! This crate turns a [`Server`] into the files the external orchestrator
//! consumes and runs that orchestrator: `ConfigLayout` names the files of a
//! server config directory, `resolve_override` finds per-service Dockerfiles,
//! `discover_fragments` lists `docker-compose*.yml` fragments in a stable
//! order, `build_compose_document` and `compose_env_file` are pure builders
//! producing an [`Artifact`], `AtomicWriter` persists artifacts, and
//! `ProcessExecutor` runs an `OrchestratorCommand`.

pub mod command;
pub mod discovery;
pub mod document;
pub mod env;
pub mod layout;
pub mod mock;
pub mod overrides;
pub mod prereq;
pub mod writer;
pub mod yaml;

pub use command::{CommandError, CommandExecutor, CommandOutput, OrchestratorCommand, ProcessExecutor};
pub use discovery::{discover_fragments, is_fragment_name};
pub use document::{build_compose_document, compose_document_value, COMPOSE_FORMAT_VERSION};
pub use env::compose_env_file;
pub use layout::ConfigLayout;
pub use mock::MockExecutor;
pub use overrides::{resolve_override, DockerfileOverride};
pub use prereq::{check_orchestrator_prereqs, format_missing, MissingPrereq};
pub use writer::{ArtifactWriter, AtomicWriter, WriteError};

use provision_schema::{DescriptorError, ServerManifest, ServerName, ServiceMap, ServiceSpec, TypeKey};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("service '{service}' failed to produce a descriptor: {source}")]
    Descriptor {
        service: TypeKey,
        #[source]
        source: DescriptorError,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A generated file: where it goes and what it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
}

/// The provisioning target: a named host, its config directory, and the
/// services attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub name: ServerName,
    pub config_dir: PathBuf,
    pub services: ServiceMap,
}

impl Server {
    pub fn new(name: ServerName, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            name,
            config_dir: config_dir.into(),
            services: ServiceMap::new(),
        }
    }

    #[must_use]
    pub fn with_service(mut self, key: TypeKey, service: ServiceSpec) -> Self {
        self.services.insert(key, service);
        self
    }

    pub fn from_manifest(manifest: &ServerManifest, manifest_dir: &Path) -> Self {
        Self {
            name: manifest.server.name.clone(),
            config_dir: manifest.config_dir(manifest_dir),
            services: manifest.services.clone(),
        }
    }

    pub fn layout(&self) -> ConfigLayout {
        ConfigLayout::new(&self.config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_schema::parse_manifest_str;

    #[test]
    fn server_from_manifest_resolves_config_dir() {
        let manifest = parse_manifest_str(
            r#"
manifest_version = 1
[server]
name = "web1"
config_path = "config"
[services.web]
kind = "http"
"#,
        )
        .unwrap();
        let server = Server::from_manifest(&manifest, Path::new("/srv/provision"));
        assert_eq!(server.name, "web1");
        assert_eq!(server.config_dir, PathBuf::from("/srv/provision/config"));
        assert_eq!(server.services.len(), 1);
    }

    #[test]
    fn compose_error_display_names_service() {
        let e = ComposeError::Descriptor {
            service: TypeKey::new("db").unwrap(),
            source: DescriptorError::EmptyImage,
        };
        let msg = e.to_string();
        assert!(msg.contains("'db'"));
        assert!(msg.contains("image must not be empty"));
    }

    #[test]
    fn compose_error_display_read_path() {
        let e = ComposeError::Read {
            path: PathBuf::from("/tmp/x/.env-custom"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(e.to_string().contains("/tmp/x/.env-custom"));
    }
}
