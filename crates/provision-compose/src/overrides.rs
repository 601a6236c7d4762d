use crate::layout::ConfigLayout;
use std::path::{Path, PathBuf};

/// A per-service Dockerfile found in the server config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileOverride {
    pub present: bool,
    /// Absolute location of `Dockerfile.<type key>`, whether or not it exists.
    pub path: PathBuf,
}

/// Look for `<config_dir>/Dockerfile.<type_key>`.
///
/// Only reads filesystem state. A missing file is the common case and yields
/// `present == false`.
pub fn resolve_override(config_dir: &Path, type_key: &str) -> DockerfileOverride {
    let candidate = ConfigLayout::new(config_dir).dockerfile_override(type_key);
    let path = std::path::absolute(&candidate).unwrap_or(candidate);
    DockerfileOverride {
        present: path.is_file(),
        path,
    }
}
