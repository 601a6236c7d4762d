//! Server manifest parsing, service variants, and compose descriptors for Provision.
//!
//! This crate defines the schema layer: the TOML server manifest
//! (`ServerManifest`), validated identifiers (`ServerName`, `TypeKey`), the
//! service variants attachable to a server (`ServiceSpec`), the
//! `ComposableService` capability, and the ordered `Descriptor` every
//! composable service produces.

pub mod descriptor;
pub mod manifest;
pub mod service;
pub mod types;

pub use descriptor::{validate_port, Descriptor, DescriptorError};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, ManifestError, OrchestratorConfig, ServerManifest,
    ServerSection, ServiceMap, MANIFEST_VERSION,
};
pub use service::{
    CacheService, ComposableService, DbService, ExternalService, HttpService, RawComposeService,
    ServiceSpec,
};
pub use types::{InvalidIdentifier, ServerName, TypeKey};
