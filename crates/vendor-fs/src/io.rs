//! Guarded atomic I/O
//!
//! Every project file is replaced by writing a sibling temp file, flushing it
//! and renaming it over the target, so readers observe either the old or the
//! new content and never a partial write. Mutations are serialized through an
//! advisory `fs2` lock and guarded by the fingerprint captured at read time.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoff;
use fs2::FileExt;
use tracing::debug;

use crate::{Error, Fingerprint, NormalizedPath, Result};

/// Tunables for lock acquisition and durability.
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// How long to keep retrying a held lock before giving up
    pub lock_timeout: Duration,
    /// Flush file and directory contents to disk before returning
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
        }
    }
}

/// An exclusive advisory lock, released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock file at `path`, creating it if necessary.
    ///
    /// Retries with exponential backoff until `config.lock_timeout` elapses.
    pub fn acquire(path: &NormalizedPath, config: RobustnessConfig) -> Result<Self> {
        let native = path.to_native();
        ensure_parent(&native)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&native)
            .map_err(|e| Error::io(&native, e))?;

        let policy = ExponentialBackoff {
            current_interval: Duration::from_millis(10),
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(250),
            max_elapsed_time: Some(config.lock_timeout),
            ..ExponentialBackoff::default()
        };
        backoff::retry(policy, || {
            FileExt::try_lock_exclusive(&file).map_err(backoff::Error::transient)
        })
        .map_err(|_| Error::LockFailed {
            path: native.clone(),
        })?;

        debug!(lock = %native.display(), "acquired lock");
        Ok(Self { file, path: native })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lock = %self.path.display(), "released lock");
    }
}

/// Content of a file together with the fingerprint it had when read.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    /// Where the file lives
    pub path: NormalizedPath,
    /// File content, `None` when the file does not exist
    pub content: Option<String>,
    /// Fingerprint of exactly the bytes in `content`
    pub fingerprint: Fingerprint,
}

impl FileSnapshot {
    /// Whether the file existed at read time.
    pub fn exists(&self) -> bool {
        self.content.is_some()
    }
}

/// Read a file and capture its fingerprint in one pass.
///
/// A missing file is not an error; it yields an empty snapshot with an
/// [`Fingerprint::Absent`] fingerprint.
pub fn read_snapshot(path: &NormalizedPath) -> Result<FileSnapshot> {
    let native = path.to_native();
    match fs::read(&native) {
        Ok(bytes) => {
            let fingerprint = Fingerprint::of(&bytes);
            let content = String::from_utf8(bytes).map_err(|e| {
                Error::io(
                    &native,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                )
            })?;
            Ok(FileSnapshot {
                path: path.clone(),
                content: Some(content),
                fingerprint,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileSnapshot {
            path: path.clone(),
            content: None,
            fingerprint: Fingerprint::Absent,
        }),
        Err(e) => Err(Error::io(&native, e)),
    }
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// A fully written temp file waiting to be renamed over its target.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temp file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: PathBuf,
    enable_fsync: bool,
    committed: bool,
}

impl StagedWrite {
    /// Write `content` next to `path` and flush it.
    pub fn stage(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<Self> {
        let target = path.to_native();
        ensure_parent(&target)?;

        // Same directory keeps the rename on one filesystem
        let temp_name = format!(
            ".{}.{}.tmp",
            target
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default(),
            std::process::id()
        );
        let temp = target.with_file_name(&temp_name);

        let staged = Self {
            target,
            temp,
            enable_fsync: config.enable_fsync,
            committed: false,
        };

        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staged.temp)
            .map_err(|e| Error::io(&staged.temp, e))?;
        temp_file
            .write_all(content)
            .map_err(|e| Error::io(&staged.temp, e))?;
        if staged.enable_fsync {
            temp_file
                .sync_all()
                .map_err(|e| Error::io(&staged.temp, e))?;
        }

        Ok(staged)
    }

    /// The file this write will replace.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Location of the temp file holding the new content.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Atomically rename the temp file over the target.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target).map_err(|e| Error::io(&self.target, e))?;
        self.committed = true;

        if self.enable_fsync {
            sync_parent(&self.target);
        }
        debug!(file = %self.target.display(), "committed atomic write");
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// A set of file replacements performed under one lock.
///
/// Each staged file is checked against the fingerprint its caller read; a
/// mismatch aborts the whole transaction with [`Error::WriteConflict`] before
/// any target has been touched.
#[derive(Debug)]
pub struct Transaction {
    lock: FileLock,
    config: RobustnessConfig,
    staged: Vec<StagedWrite>,
}

impl Transaction {
    /// Acquire `lock_path` and start collecting writes.
    pub fn begin(lock_path: &NormalizedPath, config: RobustnessConfig) -> Result<Self> {
        let lock = FileLock::acquire(lock_path, config)?;
        Ok(Self {
            lock,
            config,
            staged: Vec::new(),
        })
    }

    /// Require `path` to still have `expected` without writing it.
    ///
    /// Used for files this transaction depends on but leaves untouched.
    pub fn verify(&self, path: &NormalizedPath, expected: &Fingerprint) -> Result<()> {
        let native = path.to_native();
        let found = Fingerprint::of_file(&native).map_err(|e| Error::io(&native, e))?;
        if &found != expected {
            return Err(Error::WriteConflict {
                path: native,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    /// Stage `content` for `path`, provided the file still has `expected`.
    pub fn stage(
        &mut self,
        path: &NormalizedPath,
        expected: &Fingerprint,
        content: &[u8],
    ) -> Result<()> {
        self.verify(path, expected)?;
        self.staged.push(StagedWrite::stage(path, content, self.config)?);
        Ok(())
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Rename every staged file into place, in staging order.
    pub fn commit(self) -> Result<()> {
        let Self { lock, staged, .. } = self;
        for write in staged {
            write.commit()?;
        }
        drop(lock);
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}
