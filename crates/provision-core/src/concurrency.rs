use crate::CoreError;
use fs2::FileExt;
use provision_compose::WriteError;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Exclusive advisory lock on a server config directory, held for one
/// verify cycle. Released on drop.
pub struct ServerLock {
    lock_file: File,
}

impl ServerLock {
    /// Creating the config directory or the lock file is the first write of
    /// a verify cycle, so failures surface as [`CoreError::Write`].
    fn open(lock_path: &Path) -> Result<File, CoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|source| WriteError {
                path: lock_path.to_path_buf(),
                source,
            })?;
        Ok(file)
    }

    /// Block until the lock is free.
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = Self::open(lock_path)?;
        file.lock_exclusive()?;
        debug!("acquired {}", lock_path.display());
        Ok(Self { lock_file: file })
    }

    /// Take the lock or fail with [`CoreError::Locked`] if another verify
    /// cycle holds it.
    pub fn try_acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = Self::open(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("acquired {}", lock_path.display());
                Ok(Self { lock_file: file })
            }
            Err(_) => Err(CoreError::Locked(
                lock_path.parent().unwrap_or(lock_path).to_path_buf(),
            )),
        }
    }
}

impl Drop for ServerLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C lets the running step finish and stops the pipeline before
/// the next one. A second Ctrl-C exits immediately.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        request_shutdown();
        eprintln!("\ninterrupt received, stopping after the current step...");
    });
}

pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
