//! Mount-level block statistics via `statvfs(3)`.

use std::path::Path;

use crate::error::{Error, Result};

/// Capacity figures for the filesystem containing a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityStats {
    /// Total size in bytes (blocks × fragment size)
    pub total_bytes: u64,
    /// Bytes available to unprivileged users (available blocks × fragment size)
    pub available_bytes: u64,
}

/// Read block statistics for the filesystem that contains `path`.
#[cfg(unix)]
pub fn capacity_stats(path: &Path) -> Result<CapacityStats> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| Error::Internal(format!("Invalid path {}: {}", path.display(), e)))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    let stat = unsafe { stat.assume_init() };
    let block_size = stat.f_frsize as u64;

    Ok(CapacityStats {
        total_bytes: (stat.f_blocks as u64).saturating_mul(block_size),
        available_bytes: (stat.f_bavail as u64).saturating_mul(block_size),
    })
}

#[cfg(not(unix))]
pub fn capacity_stats(path: &Path) -> Result<CapacityStats> {
    Err(Error::Unsupported(format!(
        "statvfs is not available for {}",
        path.display()
    )))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_capacity_of_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stats = capacity_stats(dir.path()).unwrap();

        assert!(stats.total_bytes > 0);
        assert!(stats.available_bytes <= stats.total_bytes);
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = capacity_stats(&dir.path().join("gone"));
        assert_matches!(result, Err(Error::Io(_)));
    }
}
