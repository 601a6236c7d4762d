use crate::layout::{dockerfile_name, COMPOSE_OVERRIDES_FILE};
use crate::overrides::resolve_override;
use crate::{yaml, Artifact, ComposeError, Server};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// Compose file format version written at the top of every document.
pub const COMPOSE_FORMAT_VERSION: &str = "2";

/// Environment variable telling a container which Dockerfile built it.
pub const CUSTOM_DOCKERFILE_ENV: &str = "PROVISION_CUSTOM_DOCKERFILE";

const CUSTOM_IMAGE_SUFFIX: &str = "-custom";

/// Build the compose document of `server` as an ordered value.
///
/// Every composable service contributes exactly one entry, keyed by its type
/// key, in attachment order. The first service that cannot describe itself
/// aborts the whole build.
pub fn compose_document_value(server: &Server) -> Result<Value, ComposeError> {
    let mut services = Map::new();

    for (type_key, service) in server.services.iter() {
        let Some(composable) = service.as_composable() else {
            debug!("service {type_key} ({}) is not composable, skipping", service.kind());
            continue;
        };
        let descriptor_err = |source| ComposeError::Descriptor {
            service: type_key.clone(),
            source,
        };

        let mut descriptor = composable.describe().map_err(descriptor_err)?;
        descriptor.set_hostname(format!("{}.{}", server.name, type_key));

        let dockerfile = resolve_override(&server.config_dir, type_key);
        if dockerfile.present {
            info!(
                "found custom Dockerfile for service {type_key}: {}",
                dockerfile.path.display()
            );
            let image = match descriptor.image() {
                Some(image) => format!("{image}{CUSTOM_IMAGE_SUFFIX}"),
                None => format!("{type_key}{CUSTOM_IMAGE_SUFFIX}"),
            };
            descriptor.insert("image", image);
            descriptor.set_build(".", &dockerfile_name(type_key));
            descriptor
                .insert_environment(CUSTOM_DOCKERFILE_ENV, &dockerfile.path.to_string_lossy())
                .map_err(descriptor_err)?;
        }

        services.insert(type_key.to_string(), descriptor.into_value());
    }

    let mut document = Map::new();
    document.insert(
        "version".to_owned(),
        Value::String(COMPOSE_FORMAT_VERSION.to_owned()),
    );
    document.insert("services".to_owned(), Value::Object(services));
    Ok(Value::Object(document))
}

fn header(server_name: &str, path: &Path) -> String {
    format!(
        "\
# Provision Docker Compose File
# =============================
# Server: {server_name}
#
# {path}
#
# DO NOT EDIT THIS FILE.
# It is generated by Provision and rewritten on every verify.
#
# To regenerate it, run:
#
#    provision verify {server_name}
#
#
# Overrides
# =========
#
# To customize this cluster, create a {COMPOSE_OVERRIDES_FILE} file
# in the same folder as this file.
#
# When that file exists it is listed in COMPOSE_FILE in the generated .env,
# so `docker-compose` loads it on top of this one.
#

",
        path = path.display()
    )
}

/// Render `<config_dir>/docker-compose.yml` for `server`.
///
/// Pure: nothing is written. The caller persists the returned artifact.
pub fn build_compose_document(server: &Server) -> Result<Artifact, ComposeError> {
    let path = server.layout().compose_file();
    let document = compose_document_value(server)?;
    let content = header(&server.name, &path) + &yaml::to_yaml(&document);
    debug!("generated compose file:\n{content}");
    Ok(Artifact { path, content })
}
