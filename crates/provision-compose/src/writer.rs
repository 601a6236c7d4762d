use crate::Artifact;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Scoped, all-or-nothing file write.
///
/// Implementations either replace the destination completely or leave it
/// untouched.
pub trait ArtifactWriter {
    fn write(&self, path: &Path, content: &str) -> Result<(), WriteError>;

    fn write_artifact(&self, artifact: &Artifact) -> Result<(), WriteError> {
        self.write(&artifact.path, &artifact.content)
    }
}

/// Writes through a temporary file in the destination directory that is
/// fsynced and renamed over the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter;

impl AtomicWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactWriter for AtomicWriter {
    fn write(&self, path: &Path, content: &str) -> Result<(), WriteError> {
        let fail = |source| WriteError {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(fail)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(fail)?;
        tmp.write_all(content.as_bytes()).map_err(fail)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(fail)?;
        }
        tmp.as_file().sync_all().map_err(fail)?;
        tmp.persist(path).map_err(|e| fail(e.error))?;
        fsync_dir(dir).map_err(fail)?;

        debug!("wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

/// Fsync a directory so a preceding `rename()` is durable.
fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(unsafe_code)]
    fn running_as_root() -> bool {
        unsafe {
            libc::getuid() == 0
        }
    }

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        AtomicWriter.write(&path, "first\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");
        AtomicWriter.write(&path, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config/web1/.env");
        AtomicWriter.write(&path, "A=1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\n");
    }

    #[test]
    fn leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        AtomicWriter
            .write_artifact(&Artifact {
                path: dir.path().join(".env"),
                content: "X=1\n".to_owned(),
            })
            .unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, [".env"]);
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        AtomicWriter.write(&path, "x").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn failure_leaves_destination_untouched() {
        use std::os::unix::fs::PermissionsExt;
        if running_as_root() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        fs::write(&path, "previous\n").unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let err = AtomicWriter.write(&path, "next\n").unwrap_err();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(err.path, path);
        assert!(err.to_string().contains("docker-compose.yml"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous\n");
    }
}
