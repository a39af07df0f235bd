use alloc::vec;
use alloc::vec::Vec;

/// Failure reported by a block device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Sector index past the end of the medium
    OutOfRange,
    /// The medium did not respond or reported an error
    Io,
}

/// Sector-addressed storage medium
pub trait BlockDevice {
    fn sector_size(&self) -> usize;

    fn sector_count(&self) -> u64;

    fn read(&mut self, sector: u64) -> Result<Vec<u8>, DeviceError>;

    /// `data` is exactly one sector long
    fn write(&mut self, sector: u64, data: &[u8]) -> Result<(), DeviceError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn sector_size(&self) -> usize {
        (**self).sector_size()
    }

    fn sector_count(&self) -> u64 {
        (**self).sector_count()
    }

    fn read(&mut self, sector: u64) -> Result<Vec<u8>, DeviceError> {
        (**self).read(sector)
    }

    fn write(&mut self, sector: u64, data: &[u8]) -> Result<(), DeviceError> {
        (**self).write(sector, data)
    }
}

/// Block device kept in memory
#[derive(Debug, Clone)]
pub struct RamDisk {
    sector_size: usize,
    data: Vec<u8>,
}
impl RamDisk {
    pub fn new(sector_size: usize, sector_count: u64) -> Self {
        Self {
            sector_size,
            data: vec![0; sector_size * sector_count as usize],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
impl BlockDevice for RamDisk {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn sector_count(&self) -> u64 {
        (self.data.len() / self.sector_size) as u64
    }

    fn read(&mut self, sector: u64) -> Result<Vec<u8>, DeviceError> {
        if sector >= self.sector_count() {
            return Err(DeviceError::OutOfRange);
        }
        let start = sector as usize * self.sector_size;
        Ok(self.data[start..start + self.sector_size].to_vec())
    }

    fn write(&mut self, sector: u64, data: &[u8]) -> Result<(), DeviceError> {
        if sector >= self.sector_count() {
            return Err(DeviceError::OutOfRange);
        }
        assert_eq!(data.len(), self.sector_size);
        let start = sector as usize * self.sector_size;
        self.data[start..start + self.sector_size].copy_from_slice(data);
        Ok(())
    }
}
