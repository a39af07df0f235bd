use serde::{Deserialize, Serialize};

use crate::config::SECTOR_SIZE;
use crate::driver::{Driver, FreeSpace};
use crate::error::FsResult;

/// Volume capacity, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SpaceInfo {
    pub capacity: u64,
    pub free: u64,
    /// Same as `free`; there are no quotas on a FAT volume
    pub available: u64,
}
impl From<FreeSpace> for SpaceInfo {
    fn from(space: FreeSpace) -> Self {
        let cluster_bytes = space.sectors_per_cluster.saturating_mul(SECTOR_SIZE as u64);
        // The first two FAT entries do not describe clusters
        let total_clusters = space.fat_entries.saturating_sub(2);
        let free = space.free_clusters.saturating_mul(cluster_bytes);
        Self {
            capacity: total_clusters.saturating_mul(cluster_bytes),
            free,
            available: free,
        }
    }
}

/// Capacity of the volume holding `path`, or all zeros if it cannot be read
pub fn space<D: Driver>(driver: &D, path: &str) -> SpaceInfo {
    match try_space(driver, path) {
        Ok(info) => info,
        Err(error) => {
            log::warn!("free space query for {:?} failed: {}", path, error);
            SpaceInfo::default()
        },
    }
}

pub fn try_space<D: Driver>(driver: &D, path: &str) -> FsResult<SpaceInfo> {
    driver.free_space(path).map(SpaceInfo::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ramfs::RamFs;

    #[test]
    fn test_cluster_arithmetic() {
        let info = SpaceInfo::from(FreeSpace {
            free_clusters: 10,
            sectors_per_cluster: 64,
            fat_entries: 1002,
        });
        assert_eq!(info.capacity, 1000 * 64 * 512);
        assert_eq!(info.free, 10 * 64 * 512);
        assert_eq!(info.available, info.free);
    }

    #[test]
    fn test_full_volume() {
        let fs = RamFs::new(4, 2);
        fs.insert("FULL.BIN", &[0u8; 4 * 1024]);
        let info = space(&fs, "");
        assert_eq!(info.free, 0);
        assert_eq!(info.available, 0);
        assert_eq!(info.capacity, 4 * 1024);
    }

    #[test]
    fn test_usage_is_counted_in_clusters() {
        let fs = RamFs::new(8, 1);
        fs.insert("A.BIN", &[1]);
        let info = space(&fs, "/");
        assert_eq!(info.capacity, 8 * 512);
        assert_eq!(info.free, 7 * 512);
    }

    #[test]
    fn test_failure() {
        let fs = RamFs::new(8, 1);
        fs.fail_next(Error::NotReady);
        assert_eq!(space(&fs, ""), SpaceInfo::default());
        fs.fail_next(Error::NotReady);
        assert_eq!(try_space(&fs, ""), Err(Error::NotReady));
        assert!(try_space(&fs, "").is_ok());
    }
}
