//! Durable writes and the session lock for the context backing.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::errors::ContextError;

/// How a full context dump reaches the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Write a sibling temp file, fsync it, then rename it over the backing.
    #[default]
    Atomic,
    /// Truncate and rewrite the backing in place.
    Direct,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Atomic => write!(f, "atomic"),
            WriteMode::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for WriteMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "atomic" => Ok(WriteMode::Atomic),
            "direct" => Ok(WriteMode::Direct),
            _ => anyhow::bail!("Invalid write mode '{}'. Valid values: atomic, direct", s),
        }
    }
}

/// Write `bytes` to `path` using the given mode.
pub fn write_bytes(path: &Path, bytes: &[u8], mode: WriteMode) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    match mode {
        WriteMode::Direct => fs::write(path, bytes),
        WriteMode::Atomic => {
            let tmp = temp_path(path);
            let result = (|| {
                let mut file = File::create(&tmp)?;
                file.write_all(bytes)?;
                file.sync_all()?;
                fs::rename(&tmp, path)
            })();
            if result.is_err() {
                let _ = fs::remove_file(&tmp);
            }
            result
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Path of the sidecar lock file for a context backing.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive advisory lock on `<backing>.lock`, released on drop.
///
/// The lock lives on a sidecar file because atomic writes replace the
/// backing's inode on every persist.
#[derive(Debug)]
pub struct SessionLock {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    /// Take the lock without waiting. A lock held elsewhere is `ContextError::Locked`.
    pub fn acquire(backing: &Path) -> Result<Self, ContextError> {
        let path = lock_path(backing);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ContextError::Lock {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| ContextError::Lock {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(lock = %path.display(), "acquired context lock");
                Ok(Self { file, path })
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(ContextError::Locked {
                    path: backing.to_path_buf(),
                })
            }
            Err(source) => Err(ContextError::Lock { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(lock = %self.path.display(), "released context lock");
    }
}
