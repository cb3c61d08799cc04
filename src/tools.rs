use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{bail, Error};
use nix::fcntl::{flock, FlockArg};

pub mod clock;
pub mod file_logger;
pub mod fsutil;
pub mod hex;
pub mod logsink;
pub mod net;

/// Write `data` to `tmp_path`, fsync, and rename over `path`.
///
/// Concurrent readers observe either the old or the new file, never a
/// partial one. On failure the temp file may remain; callers that own
/// the directory sweep stale temp files when they start up.
pub fn write_file_atomic<P: AsRef<Path>>(
    path: P,
    tmp_path: P,
    data: &[u8],
) -> Result<(), Error> {
    let path = path.as_ref();
    let tmp_path = tmp_path.as_ref();

    let mut file = match File::create(tmp_path) {
        Ok(file) => file,
        Err(err) => bail!("unable to create {:?} - {}", tmp_path, err),
    };

    if let Err(err) = file.write_all(data) {
        bail!("write to {:?} failed - {}", tmp_path, err);
    }
    if let Err(err) = file.sync_all() {
        bail!("fsync of {:?} failed - {}", tmp_path, err);
    }
    drop(file);

    if let Err(err) = std::fs::rename(tmp_path, path) {
        bail!("atomic rename to {:?} failed - {}", path, err);
    }

    // make the rename durable
    if let Some(dir) = path.parent() {
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Open `path` (creating it empty if needed) and take an exclusive
/// advisory lock on it.
///
/// The probe is nonblocking: when another process holds the lock the
/// call fails immediately with `ErrorKind::WouldBlock`, which callers
/// map to their own contention error. The lock is released when the
/// returned `File` is dropped, or by the OS on process exit.
pub fn lock_file<P: AsRef<Path>>(path: P) -> Result<File, std::io::Error> {
    let path = path.as_ref();
    let lockfile = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let fd = lockfile.as_raw_fd();
    match flock(fd, FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(lockfile),
        Err(nix::errno::Errno::EWOULDBLOCK) => Err(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            format!("lock {:?} is held by another process", path),
        )),
        Err(err) => Err(std::io::Error::from(err)),
    }
}

/// Byte-order helpers for code that deals in raw wire words.
pub const fn swap_bytes_u16(v: u16) -> u16 {
    v.swap_bytes()
}

pub const fn swap_bytes_u32(v: u32) -> u32 {
    v.swap_bytes()
}

pub const fn swap_bytes_u64(v: u64) -> u64 {
    v.swap_bytes()
}
