//! Exclusive-access probe
//!
//! Answers one question: can this process take exclusive read/write access
//! to a file right now? A producer still writing the file holds an open
//! handle, so the probe reports `Locked` until the producer lets go.

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Result of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Exclusive access was obtained and released
    Unlocked,
    /// Another handle holds the file
    Locked,
    /// The file no longer exists
    Vanished,
}

/// File lock probe
///
/// Implementations must not hold any handle past the end of `probe`.
pub trait LockProbe: Send + Sync + 'static {
    fn probe(&self, path: &Path) -> Result<ProbeStatus, ProbeError>;

    /// Convenience predicate; `Vanished` counts as not locked
    fn is_locked(&self, path: &Path) -> Result<bool, ProbeError> {
        Ok(self.probe(path)? == ProbeStatus::Locked)
    }
}

impl<F> LockProbe for F
where
    F: Fn(&Path) -> Result<ProbeStatus, ProbeError> + Send + Sync + 'static,
{
    fn probe(&self, path: &Path) -> Result<ProbeStatus, ProbeError> {
        self(path)
    }
}

/// Probe that opens the file for exclusive read/write access
///
/// - Linux: open read/write, then try a write lease (`F_SETLEASE`), which
///   the kernel only grants when no other handle to the file is open. Where
///   leases are unavailable (foreign owner without `CAP_LEASE`, filesystems
///   without lease support) it falls back to `flock`.
/// - Other Unix: open read/write, then a non-blocking exclusive `flock`.
///   Only producers that lock the file themselves are seen.
/// - Windows: open read/write with a zero share mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExclusiveOpenProbe;

impl LockProbe for ExclusiveOpenProbe {
    fn probe(&self, path: &Path) -> Result<ProbeStatus, ProbeError> {
        let file = match open_exclusive(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ProbeStatus::Vanished),
            Err(e) if is_sharing_violation(&e) => return Ok(ProbeStatus::Locked),
            Err(source) => {
                return Err(ProbeError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        // Dropping `file` closes the handle, which also releases the flock
        let status = try_lock_exclusive(&file).map_err(|source| ProbeError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        drop(file);

        Ok(status)
    }
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

#[cfg(windows)]
fn open_exclusive(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .write(true)
        .share_mode(0)
        .open(path)
}

#[cfg(not(any(unix, windows)))]
fn open_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

#[cfg(windows)]
fn is_sharing_violation(err: &io::Error) -> bool {
    const ERROR_SHARING_VIOLATION: i32 = 32;
    const ERROR_LOCK_VIOLATION: i32 = 33;

    matches!(
        err.raw_os_error(),
        Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
    )
}

#[cfg(not(windows))]
fn is_sharing_violation(_err: &io::Error) -> bool {
    false
}

/// Try to take (and immediately give back) a write lease
///
/// Returns `None` when leases cannot be used on this file.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn try_write_lease(file: &File) -> io::Result<Option<ProbeStatus>> {
    use nix::errno::Errno;
    use nix::libc;
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` is a valid descriptor owned by `file` for this call
    let res = Errno::result(unsafe { libc::fcntl(fd, libc::F_SETLEASE, libc::F_WRLCK) });
    match res {
        Ok(_) => {
            // SAFETY: as above
            let _ = unsafe { libc::fcntl(fd, libc::F_SETLEASE, libc::F_UNLCK) };
            Ok(Some(ProbeStatus::Unlocked))
        }
        Err(Errno::EAGAIN) => Ok(Some(ProbeStatus::Locked)),
        Err(Errno::EACCES | Errno::EINVAL | Errno::ENOSYS | Errno::ENOTSUP) => Ok(None),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<ProbeStatus> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if let Some(status) = try_write_lease(file)? {
            return Ok(status);
        }
    }
    try_flock_exclusive(file)
}

/// Try to take (and immediately give back) an exclusive advisory lock
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> io::Result<ProbeStatus> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(ProbeStatus::Unlocked),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(ProbeStatus::Locked),
        Err(e) => Err(io::Error::from(e)),
    }
}

// The share-mode open already proved exclusivity
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<ProbeStatus> {
    Ok(ProbeStatus::Unlocked)
}
