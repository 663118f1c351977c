//! Free-space checks before large downloads

use crate::error::{ResourceError, ResourceResult};
use std::path::Path;

/// Query for free space on the filesystem holding a path
pub trait DiskUsage: Send + Sync {
    /// Bytes available to unprivileged users at `path`
    fn free_bytes(&self, path: &Path) -> ResourceResult<u64>;
}

/// Disk usage from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDisk;

impl DiskUsage for SystemDisk {
    fn free_bytes(&self, path: &Path) -> ResourceResult<u64> {
        fs4::available_space(path).map_err(|e| {
            ResourceError::io(format!("getting disk free space for {}", path.display()), e)
        })
    }
}

/// Fail with `InsufficientSpace` unless `dir` can hold `needed` bytes
pub fn ensure_capacity(disk: &dyn DiskUsage, dir: &Path, needed: u64) -> ResourceResult<()> {
    let available = disk.free_bytes(dir)?;
    if available < needed {
        return Err(ResourceError::InsufficientSpace { needed, available });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedDisk(u64);

    impl DiskUsage for FixedDisk {
        fn free_bytes(&self, _path: &Path) -> ResourceResult<u64> {
            Ok(self.0)
        }
    }

    #[test]
    fn system_disk_reports_space() {
        let dir = TempDir::new().unwrap();
        let free = SystemDisk.free_bytes(dir.path()).unwrap();
        assert!(free > 0);
    }

    #[test]
    fn system_disk_missing_path_errors() {
        let dir = TempDir::new().unwrap();
        let result = SystemDisk.free_bytes(&dir.path().join("missing/deeper"));
        assert!(result.is_err());
    }

    #[test]
    fn capacity_guard() {
        let dir = Path::new("/unused");
        assert!(ensure_capacity(&FixedDisk(100), dir, 100).is_ok());

        let err = ensure_capacity(&FixedDisk(99), dir, 100).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::InsufficientSpace {
                needed: 100,
                available: 99
            }
        ));
        assert!(err.to_string().starts_with("file is too big to fit on this drive"));
    }
}
