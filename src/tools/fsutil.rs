//! Filesystem probes used by the entry sequencer.

use std::path::Path;

use anyhow::{bail, format_err, Error};
use nix::NixPath;

/// Capacity of the filesystem holding a path.
pub struct FsUsage {
    pub total: u64,
    pub avail: u64,
}

/// `statfs64` the filesystem under `path`.
pub fn fs_usage(path: &Path) -> Result<FsUsage, Error> {
    let mut stat: libc::statfs64 = unsafe { std::mem::zeroed() };

    let res = path.with_nix_path(|cstr| unsafe { libc::statfs64(cstr.as_ptr(), &mut stat) })?;
    nix::errno::Errno::result(res)
        .map_err(|err| format_err!("statfs64 {:?} failed - {}", path, err))?;

    let bsize = stat.f_bsize as u64;
    Ok(FsUsage {
        total: stat.f_blocks.saturating_mul(bsize),
        avail: stat.f_bavail.saturating_mul(bsize),
    })
}

/// Make sure the data directory exists and its filesystem has at least
/// `min_free` bytes available.
pub fn ensure_data_dir(path: &Path, min_free: u64) -> Result<(), Error> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|err| format_err!("unable to create data directory {:?} - {}", path, err))?;
    } else if !path.is_dir() {
        bail!("data directory {:?} exists but is not a directory", path);
    }

    let usage = fs_usage(path)?;
    if usage.avail < min_free {
        bail!(
            "not enough free space on {:?} - {} bytes available, {} required",
            path,
            usage.avail,
            min_free
        );
    }

    Ok(())
}
