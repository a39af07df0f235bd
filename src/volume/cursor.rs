use alloc::vec;

use super::cache::DiskAccess;
use super::disk::{BlockDevice, DeviceError};

#[derive(Debug)]
pub enum DiskCursorIoError {
    UnexpectedEof,
    WriteZero,
    Device(DeviceError),
}
impl fatfs::IoError for DiskCursorIoError {
    fn is_interrupted(&self) -> bool {
        false
    }

    fn new_unexpected_eof_error() -> Self {
        Self::UnexpectedEof
    }

    fn new_write_zero_error() -> Self {
        Self::WriteZero
    }
}
impl From<DeviceError> for DiskCursorIoError {
    fn from(error: DeviceError) -> Self {
        Self::Device(error)
    }
}

/// Byte-addressed view of a block device
pub struct DiskCursor<D: BlockDevice> {
    disk: DiskAccess<D>,
    sector: u64,
    offset: usize,
}

impl<D: BlockDevice> DiskCursor<D> {
    pub fn new(disk: DiskAccess<D>) -> Self {
        Self {
            disk,
            sector: 0,
            offset: 0,
        }
    }

    fn get_position(&self) -> u64 {
        self.sector * self.disk.sector_size() as u64 + self.offset as u64
    }

    fn set_position(&mut self, position: u64) {
        let sector_size = self.disk.sector_size() as u64;
        self.sector = position / sector_size;
        self.offset = (position % sector_size) as usize;
    }

    fn len(&self) -> u64 {
        self.disk.sector_count() * self.disk.sector_size() as u64
    }

    pub fn into_inner(self) -> D {
        self.disk.into_inner()
    }
}

impl<D: BlockDevice> fatfs::IoBase for DiskCursor<D> {
    type Error = DiskCursorIoError;
}

impl<D: BlockDevice> fatfs::Read for DiskCursor<D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DiskCursorIoError> {
        let mut i = 0;
        while i < buf.len() && self.sector < self.disk.sector_count() {
            let data = self.disk.read(self.sector)?;
            let len = (data.len() - self.offset).min(buf.len() - i);
            buf[i..i + len].copy_from_slice(&data[self.offset..self.offset + len]);
            i += len;
            self.set_position(self.get_position() + len as u64);
        }
        Ok(i)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DiskCursorIoError> {
        let n = self.read(buf)?;
        if n != buf.len() {
            return Err(DiskCursorIoError::UnexpectedEof);
        }
        Ok(())
    }
}

impl<D: BlockDevice> fatfs::Write for DiskCursor<D> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, DiskCursorIoError> {
        let mut i = 0;
        while i < buf.len() && self.sector < self.disk.sector_count() {
            let sector_size = self.disk.sector_size();
            let len = (sector_size - self.offset).min(buf.len() - i);

            // Partial sectors are read back first
            let mut data = if len == sector_size {
                vec![0; sector_size]
            } else {
                self.disk.read(self.sector)?
            };
            data[self.offset..self.offset + len].copy_from_slice(&buf[i..i + len]);
            self.disk.write(self.sector, data)?;

            i += len;
            self.set_position(self.get_position() + len as u64);
        }
        Ok(i)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), DiskCursorIoError> {
        let n = self.write(buf)?;
        if n != buf.len() {
            return Err(DiskCursorIoError::WriteZero);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DiskCursorIoError> {
        Ok(())
    }
}

impl<D: BlockDevice> fatfs::Seek for DiskCursor<D> {
    fn seek(&mut self, pos: fatfs::SeekFrom) -> Result<u64, DiskCursorIoError> {
        let new_pos = match pos {
            fatfs::SeekFrom::Start(i) => Some(i),
            fatfs::SeekFrom::End(i) => offset_by(self.len(), i),
            fatfs::SeekFrom::Current(i) => offset_by(self.get_position(), i),
        };
        match new_pos {
            Some(new_pos) if new_pos <= self.len() => {
                self.set_position(new_pos);
                Ok(new_pos)
            },
            _ => Err(DiskCursorIoError::Device(DeviceError::OutOfRange)),
        }
    }
}

fn offset_by(base: u64, delta: i64) -> Option<u64> {
    if delta < 0 {
        base.checked_sub(delta.unsigned_abs())
    } else {
        base.checked_add(delta as u64)
    }
}

#[cfg(test)]
mod tests {
    use fatfs::{Read, Seek, SeekFrom, Write};

    use super::*;
    use crate::volume::disk::RamDisk;

    fn cursor() -> DiskCursor<RamDisk> {
        DiskCursor::new(DiskAccess::new(RamDisk::new(512, 4), 2))
    }

    #[test]
    fn test_unaligned_write_spans_sectors() {
        let mut c = cursor();
        c.seek(SeekFrom::Start(500)).unwrap();
        c.write_all(&[9u8; 30]).unwrap();
        assert_eq!(c.seek(SeekFrom::Current(0)).unwrap(), 530);

        c.seek(SeekFrom::Start(498)).unwrap();
        let mut buf = [0u8; 34];
        c.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0, 0]);
        assert_eq!(&buf[2..32], &[9u8; 30][..]);
        assert_eq!(&buf[32..], &[0, 0]);
    }

    #[test]
    fn test_end_of_device() {
        let mut c = cursor();
        assert_eq!(c.seek(SeekFrom::End(-10)).unwrap(), 2038);
        let mut buf = [0u8; 64];
        assert_eq!(c.read(&mut buf).unwrap(), 10);
        assert_eq!(c.read(&mut buf).unwrap(), 0);
        assert_eq!(c.write(&buf).unwrap(), 0);
        assert!(c.seek(SeekFrom::Current(1)).is_err());
    }
}
