use crate::service::ServiceSpec;
use crate::types::{InvalidIdentifier, ServerName, TypeKey};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("{0}")]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("orchestrator.{0} must not be empty")]
    EmptyOrchestratorField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerManifest {
    pub manifest_version: u32,
    pub server: ServerSection,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub services: ServiceMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub name: ServerName,
    /// Directory receiving the generated files. Relative paths are resolved
    /// against the manifest's directory.
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
}

/// How the external orchestrator is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_subcommand")]
    pub subcommand: String,
    #[serde(default = "default_options")]
    pub options: String,
    /// Pass every discovered fragment with `-f`. Unneeded when the command
    /// runs inside the config directory, where `.env` lists the fragments.
    #[serde(default)]
    pub load_files: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            subcommand: default_subcommand(),
            options: default_options(),
            load_files: false,
        }
    }
}

fn default_config_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_binary() -> String {
    "docker-compose".to_owned()
}

fn default_subcommand() -> String {
    "up".to_owned()
}

fn default_options() -> String {
    "-d --build --force-recreate".to_owned()
}

/// Services attached to a server, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMap(Vec<(TypeKey, ServiceSpec)>);

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a service. Replacing keeps the original position.
    pub fn insert(&mut self, key: TypeKey, service: ServiceSpec) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = service;
        } else {
            self.0.push((key, service));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ServiceSpec> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &ServiceSpec)> {
        self.0.iter().map(|(k, s)| (k, s))
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.0.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TypeKey, ServiceSpec)> for ServiceMap {
    fn from_iter<I: IntoIterator<Item = (TypeKey, ServiceSpec)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, s) in iter {
            map.insert(k, s);
        }
        map
    }
}

impl Serialize for ServiceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, s) in &self.0 {
            map.serialize_entry(k, s)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ServiceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ServiceMapVisitor;

        impl<'de> Visitor<'de> for ServiceMapVisitor {
            type Value = ServiceMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of services keyed by type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ServiceMap, A::Error> {
                let mut entries: Vec<(TypeKey, ServiceSpec)> = Vec::new();
                while let Some((key, service)) = access.next_entry::<TypeKey, ServiceSpec>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate service '{key}'"
                        )));
                    }
                    entries.push((key, service));
                }
                Ok(ServiceMap(entries))
            }
        }

        deserializer.deserialize_map(ServiceMapVisitor)
    }
}

impl ServerManifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.manifest_version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }
        if self.orchestrator.binary.trim().is_empty() {
            return Err(ManifestError::EmptyOrchestratorField("binary"));
        }
        if self.orchestrator.subcommand.trim().is_empty() {
            return Err(ManifestError::EmptyOrchestratorField("subcommand"));
        }
        Ok(())
    }

    /// Resolve the config directory relative to the directory holding the manifest.
    pub fn config_dir(&self, manifest_dir: &Path) -> PathBuf {
        if self.server.config_path.is_absolute() {
            self.server.config_path.clone()
        } else {
            manifest_dir.join(&self.server.config_path)
        }
    }
}

pub fn parse_manifest_str(input: &str) -> Result<ServerManifest, ManifestError> {
    let manifest: ServerManifest = toml::from_str(input)?;
    manifest.validate()?;
    Ok(manifest)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ServerManifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
