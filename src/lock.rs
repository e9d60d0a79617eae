//! Advisory file locks and atomic writes for the index cache.
//!
//! Several `gi` processes may rebuild the index at once. The writer holds an
//! fs2 lock on a dedicated lock file and publishes through a temp file that
//! is renamed into place, so readers see the old cache or the new one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive lock held until the guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Lock `path` (created if missing), waiting at most `timeout_ms`.
    ///
    /// A holder that outlasts the timeout yields [`Error::LockFailed`].
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "lock acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if contended(&err) && Instant::now() < deadline => {
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(err) if contended(&err) => return Err(Error::LockFailed(path.to_path_buf())),
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

// Windows reports sharing violations (32, 33) instead of WouldBlock.
fn contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// Replace `path` with `data` through a hidden temp file in the same directory.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidArgument(format!("'{}' has no file name", path.display())))?;
    let temp_path = dir.join(format!(".{name}.tmp-{}", std::process::id()));

    let written = File::create(&temp_path).and_then(|mut temp| {
        temp.write_all(data)?;
        temp.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}
