//! PID file guard.
//!
//! The file is created atomically (`create_new`), so a second daemon with the
//! same PID file refuses to start. It is removed when the guard is dropped.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Holds the PID file for the lifetime of the daemon.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create the PID file and write the current process id.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists, is not a regular file,
    /// or cannot be written.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read_to_string(&path).unwrap_or_default();
                bail!(
                    "PID file {} already exists (pid {}); is another instance running?",
                    path.display(),
                    existing.trim()
                );
            }
            Err(e) => return Err(e.into()),
        };

        if !file.metadata()?.is_file() {
            let _ = fs::remove_file(&path);
            bail!("PID file {} is not a regular file", path.display());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        let pid = std::process::id();
        writeln!(file, "{pid}")?;
        tracing::info!(pid, path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    /// Path of the PID file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove PID file"
            ),
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(0o700).recursive(true).create(dir)?;
    }
    #[cfg(not(unix))]
    fs::create_dir_all(dir)?;
    Ok(())
}
