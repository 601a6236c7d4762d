use std::path::{Path, PathBuf};

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const COMPOSE_OVERRIDES_FILE: &str = "docker-compose-overrides.yml";
pub const ENV_FILE: &str = ".env";
pub const ENV_CUSTOM_FILE: &str = ".env-custom";
pub const DOCKERFILE_PREFIX: &str = "Dockerfile.";
const LOCK_FILE: &str = ".provision.lock";

/// File layout of a server config directory.
///
/// Generated files (`docker-compose.yml`, `.env`) sit next to the
/// user-maintained ones (`.env-custom`, `docker-compose-overrides.yml`,
/// `Dockerfile.<type key>`).
#[derive(Debug, Clone)]
pub struct ConfigLayout {
    root: PathBuf,
}

impl ConfigLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn compose_file(&self) -> PathBuf {
        self.root.join(COMPOSE_FILE)
    }

    #[inline]
    pub fn compose_overrides_file(&self) -> PathBuf {
        self.root.join(COMPOSE_OVERRIDES_FILE)
    }

    #[inline]
    pub fn env_file(&self) -> PathBuf {
        self.root.join(ENV_FILE)
    }

    #[inline]
    pub fn env_custom_file(&self) -> PathBuf {
        self.root.join(ENV_CUSTOM_FILE)
    }

    #[inline]
    pub fn dockerfile_override(&self, type_key: &str) -> PathBuf {
        self.root.join(dockerfile_name(type_key))
    }

    /// Advisory lock serializing verify cycles for this server.
    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

pub fn dockerfile_name(type_key: &str) -> String {
    format!("{DOCKERFILE_PREFIX}{type_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = ConfigLayout::new("/srv/config/web1");
        assert_eq!(
            layout.compose_file(),
            PathBuf::from("/srv/config/web1/docker-compose.yml")
        );
        assert_eq!(
            layout.compose_overrides_file(),
            PathBuf::from("/srv/config/web1/docker-compose-overrides.yml")
        );
        assert_eq!(layout.env_file(), PathBuf::from("/srv/config/web1/.env"));
        assert_eq!(
            layout.env_custom_file(),
            PathBuf::from("/srv/config/web1/.env-custom")
        );
        assert_eq!(
            layout.dockerfile_override("web"),
            PathBuf::from("/srv/config/web1/Dockerfile.web")
        );
        assert_eq!(
            layout.lock_file(),
            PathBuf::from("/srv/config/web1/.provision.lock")
        );
    }

    #[test]
    fn dockerfile_name_uses_type_key() {
        assert_eq!(dockerfile_name("db"), "Dockerfile.db");
    }
}
