use crate::discovery::discover_fragments;
use crate::layout::{ConfigLayout, ENV_CUSTOM_FILE};
use crate::{Artifact, ComposeError};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub const PATH_SEPARATOR: &str = ":";

const ENV_HEADER: &str = "\
# Provision-generated file. Do not edit.
# Add a file .env-custom and it will be included here on `provision verify`.
# For available docker-compose env vars, see https://docs.docker.com/compose/environment-variables/envvars/
";

/// Render `<config_dir>/.env`, pointing the orchestrator at every compose
/// fragment in the directory.
///
/// `.env-custom` is re-read on every call and appended verbatim, which is how
/// user additions survive regeneration.
pub fn compose_env_file(config_dir: &Path) -> Result<Artifact, ComposeError> {
    let layout = ConfigLayout::new(config_dir);
    let fragments = discover_fragments(config_dir)?;

    let custom_path = layout.env_custom_file();
    let custom = match fs::read_to_string(&custom_path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(source) => {
            return Err(ComposeError::Read {
                path: custom_path,
                source,
            })
        }
    };

    let mut content = String::from(ENV_HEADER);
    content.push_str(&format!("COMPOSE_PATH_SEPARATOR={PATH_SEPARATOR}\n"));
    content.push_str(&format!("COMPOSE_FILE={}\n", fragments.join(PATH_SEPARATOR)));
    if let Some(text) = custom {
        debug!("appending {} bytes from {ENV_CUSTOM_FILE}", text.len());
        content.push_str(&format!("# LOADED FROM {ENV_CUSTOM_FILE}:\n"));
        content.push_str(&text);
    }

    Ok(Artifact {
        path: layout.env_file(),
        content,
    })
}
