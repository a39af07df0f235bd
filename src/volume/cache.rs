use alloc::vec::Vec;
use lru::LruCache;

use super::disk::{BlockDevice, DeviceError};

/// Write-through sector cache
pub struct DiskAccess<D: BlockDevice> {
    cache: Option<LruCache<u64, Vec<u8>>>,
    disk: D,
}

impl<D: BlockDevice> DiskAccess<D> {
    pub fn new(disk: D, cache_size: usize) -> Self {
        Self {
            disk,
            cache: if cache_size != 0 {
                Some(LruCache::new(cache_size))
            } else {
                None
            },
        }
    }

    pub fn sector_size(&self) -> usize {
        self.disk.sector_size()
    }

    pub fn sector_count(&self) -> u64 {
        self.disk.sector_count()
    }

    pub fn read(&mut self, sector: u64) -> Result<Vec<u8>, DeviceError> {
        if let Some(cache) = &mut self.cache {
            if let Some(data) = cache.get(&sector) {
                log::trace!("Cache hit {}", sector);
                return Ok(data.clone());
            } else {
                log::trace!("Cache miss {}", sector);
            }
        }

        let data = self.disk.read(sector)?;
        assert_eq!(data.len(), self.sector_size());
        if let Some(cache) = &mut self.cache {
            cache.put(sector, data.clone());
        }
        Ok(data)
    }

    pub fn write(&mut self, sector: u64, data: Vec<u8>) -> Result<(), DeviceError> {
        assert_eq!(data.len(), self.sector_size());
        self.disk.write(sector, &data)?;
        if let Some(cache) = &mut self.cache {
            cache.put(sector, data);
        }
        Ok(())
    }

    pub fn into_inner(self) -> D {
        self.disk
    }
}
