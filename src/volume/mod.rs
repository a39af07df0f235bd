//! `Driver` implementation on top of the `fatfs` crate.
//!
//! The volume sits on a `BlockDevice` behind a write-through sector cache.
//! Open files are tracked by path and offset; every operation reopens the
//! file through `fatfs`, so no borrow of the filesystem outlives a call.

use alloc::borrow::ToOwned;
use alloc::collections::VecDeque;
use alloc::string::String;
use core::fmt;

use fatfs::{Read, Seek, SeekFrom, Write};
use spin::Mutex;

use crate::config::{SECTOR_CACHE_SIZE, SECTOR_SIZE};
use crate::driver::{Attributes, DirEntry, Driver, FreeSpace, OpenFlags};
use crate::error::{Error, FsResult};
use crate::wildcard;

mod cache;
mod cursor;
mod disk;

pub use self::disk::{BlockDevice, DeviceError, RamDisk};

use self::cache::DiskAccess;
use self::cursor::DiskCursor;

type FileSystem<D> = fatfs::FileSystem<DiskCursor<D>>;
type Dir<'a, D> = fatfs::Dir<'a, DiskCursor<D>>;

impl<T: fmt::Debug> From<fatfs::Error<T>> for Error {
    fn from(error: fatfs::Error<T>) -> Self {
        use fatfs::Error as E;
        match error {
            E::Io(io) => {
                log::debug!("fatfs io error: {:?}", io);
                Error::DiskErr
            },
            E::UnexpectedEof | E::WriteZero => Error::DiskErr,
            E::InvalidInput => Error::InvalidParameter,
            E::NotFound => Error::NoFile,
            E::AlreadyExists => Error::Exist,
            E::DirectoryIsNotEmpty => Error::Denied,
            E::CorruptedFileSystem => Error::IntErr,
            E::NotEnoughSpace => Error::Denied,
            E::InvalidFileNameLength | E::UnsupportedFileNameCharacter => Error::InvalidName,
            _ => Error::IntErr,
        }
    }
}

/// Open file state
#[derive(Debug)]
pub struct FatFile {
    path: String,
    position: u64,
    size: u64,
    flags: OpenFlags,
}

/// Directory search state; matches are collected when the search starts
#[derive(Debug)]
pub struct FatSearch {
    entries: VecDeque<DirEntry>,
}

/// A mounted FAT volume
pub struct FatVolume<D: BlockDevice> {
    fs: Mutex<FileSystem<D>>,
}
impl<D: BlockDevice> FatVolume<D> {
    pub fn mount(device: D) -> FsResult<Self> {
        if device.sector_size() != SECTOR_SIZE {
            log::warn!(
                "sector size {} not supported, expected {}",
                device.sector_size(),
                SECTOR_SIZE
            );
            return Err(Error::InvalidDrive);
        }
        let cursor = DiskCursor::new(DiskAccess::new(device, SECTOR_CACHE_SIZE));
        let fs = fatfs::FileSystem::new(cursor, fatfs::FsOptions::new()).map_err(|error| {
            log::warn!("mount failed: {:?}", error);
            match error {
                fatfs::Error::Io(_) => Error::DiskErr,
                _ => Error::NoFilesystem,
            }
        })?;
        log::info!("volume mounted");
        Ok(Self { fs: Mutex::new(fs) })
    }

    /// Write a fresh FAT volume onto `device` and mount it
    pub fn format(device: D) -> FsResult<Self> {
        let mut cursor = DiskCursor::new(DiskAccess::new(device, 0));
        fatfs::format_volume(&mut cursor, fatfs::FormatVolumeOptions::new()).map_err(|error| {
            log::warn!("format failed: {:?}", error);
            Error::MkfsAborted
        })?;
        Self::mount(cursor.into_inner())
    }

    /// Flush and release the volume
    pub fn unmount(self) -> FsResult<()> {
        self.fs.into_inner().unmount()?;
        log::info!("volume unmounted");
        Ok(())
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

fn open_dir<'a, D: BlockDevice>(fs: &'a FileSystem<D>, path: &str) -> FsResult<Dir<'a, D>> {
    let root = fs.root_dir();
    if path.is_empty() {
        return Ok(root);
    }
    root.open_dir(path).map_err(|error| match error {
        fatfs::Error::NotFound => Error::NoPath,
        other => other.into(),
    })
}

/// Reopen `file` through `fatfs` at its recorded offset
fn reopen<'a, D: BlockDevice>(
    fs: &'a FileSystem<D>,
    file: &FatFile,
) -> FsResult<fatfs::File<'a, DiskCursor<D>>> {
    let mut handle = fs.root_dir().open_file(&file.path)?;
    handle.seek(SeekFrom::Start(file.position))?;
    Ok(handle)
}

impl<D: BlockDevice> Driver for FatVolume<D> {
    type File = FatFile;
    type Search = FatSearch;

    fn open(&self, path: &str, flags: OpenFlags) -> FsResult<FatFile> {
        let path = normalize(path);
        log::trace!("open {:?} {:?}", path, flags);
        let (parent, name) = split_parent(path);
        if name.is_empty() {
            return Err(Error::InvalidName);
        }

        let fs = self.fs.lock();
        let dir = open_dir(&*fs, parent)?;
        let mut handle = if flags.intersects(OpenFlags::CREATE_ALWAYS | OpenFlags::OPEN_ALWAYS) {
            dir.create_file(name)?
        } else {
            dir.open_file(name)?
        };
        if flags.contains(OpenFlags::CREATE_ALWAYS) {
            handle.truncate()?;
        }
        let size = handle.seek(SeekFrom::End(0))?;

        Ok(FatFile {
            path: path.to_owned(),
            position: 0,
            size,
            flags,
        })
    }

    fn close(&self, file: FatFile) {
        log::trace!("close {:?}", file.path);
    }

    fn read(&self, file: &mut FatFile, buf: &mut [u8]) -> FsResult<usize> {
        if !file.flags.contains(OpenFlags::READ) {
            return Err(Error::Denied);
        }
        let fs = self.fs.lock();
        let mut handle = reopen(&*fs, file)?;
        let mut count = 0;
        while count < buf.len() {
            match handle.read(&mut buf[count..])? {
                0 => break,
                n => count += n,
            }
        }
        file.position += count as u64;
        log::trace!("read {:?} {} of {}", file.path, count, buf.len());
        Ok(count)
    }

    fn write(&self, file: &mut FatFile, buf: &[u8]) -> FsResult<usize> {
        if !file.flags.contains(OpenFlags::WRITE) {
            return Err(Error::Denied);
        }
        let fs = self.fs.lock();
        let mut handle = reopen(&*fs, file)?;
        let mut count = 0;
        while count < buf.len() {
            match handle.write(&buf[count..]) {
                Ok(0) | Err(fatfs::Error::NotEnoughSpace) => break,
                Ok(n) => count += n,
                Err(error) => return Err(error.into()),
            }
        }
        handle.flush()?;
        file.position += count as u64;
        file.size = file.size.max(file.position);
        log::trace!("write {:?} {} of {}", file.path, count, buf.len());
        Ok(count)
    }

    fn seek(&self, file: &mut FatFile, offset: u64) -> FsResult<()> {
        let fs = self.fs.lock();
        let mut handle = fs.root_dir().open_file(&file.path)?;
        // fatfs clamps offsets past the end of the file
        file.position = handle.seek(SeekFrom::Start(offset))?;
        log::trace!("seek {:?} {} -> {}", file.path, offset, file.position);
        Ok(())
    }

    fn tell(&self, file: &FatFile) -> u64 {
        file.position
    }

    fn size(&self, file: &FatFile) -> u64 {
        file.size
    }

    fn sync(&self, file: &mut FatFile) -> FsResult<()> {
        let fs = self.fs.lock();
        let mut handle = reopen(&*fs, file)?;
        handle.flush()?;
        Ok(())
    }

    fn find_first(&self, path: &str, pattern: &str) -> FsResult<(FatSearch, Option<DirEntry>)> {
        let fs = self.fs.lock();
        let dir = open_dir(&*fs, normalize(path))?;

        let mut entries = VecDeque::new();
        for entry in dir.iter() {
            let entry = entry?;
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let short_name = entry.short_file_name();
            if wildcard::matches(pattern, &name) || wildcard::matches(pattern, &short_name) {
                entries.push_back(DirEntry {
                    name,
                    size: entry.len(),
                    attributes: Attributes::from_bits_truncate(entry.attributes().bits()),
                });
            }
        }
        log::trace!("find {:?} in {:?}: {} matches", pattern, path, entries.len());

        let mut search = FatSearch { entries };
        let first = search.entries.pop_front();
        Ok((search, first))
    }

    fn find_next(&self, search: &mut FatSearch) -> FsResult<Option<DirEntry>> {
        Ok(search.entries.pop_front())
    }

    fn close_dir(&self, _search: FatSearch) {}

    fn free_space(&self, _path: &str) -> FsResult<FreeSpace> {
        let fs = self.fs.lock();
        let stats = fs.stats()?;
        Ok(FreeSpace {
            free_clusters: stats.free_clusters() as u64,
            sectors_per_cluster: stats.cluster_size() as u64 / SECTOR_SIZE as u64,
            fat_entries: stats.total_clusters() as u64 + 2,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::dir::read_dir;
    use crate::file::{File, OpenMode};
    use crate::filename::next_filename_stem_matching_pattern;
    use crate::space::space;

    const SECTORS: u64 = 8192;

    fn volume() -> FatVolume<RamDisk> {
        let _ = env_logger::builder().is_test(true).try_init();
        FatVolume::format(RamDisk::new(SECTOR_SIZE, SECTORS)).unwrap()
    }

    #[test]
    fn test_write_then_read_back() {
        let vol = volume();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let payload: Vec<u8> = (0..5000).map(|_| rng.gen()).collect();

        let mut file = File::open(&vol, "CAP000.BIN", OpenMode::OUT | OpenMode::TRUNC);
        file.write(&payload).unwrap();
        file.close().unwrap();

        let mut file = File::open(&vol, "CAP000.BIN", OpenMode::IN);
        assert_eq!(file.size(), Some(5000));
        let mut buf = vec![0u8; 5000];
        file.read(&mut buf).unwrap();
        assert_eq!(buf, payload);
        let mut extra = [0u8; 1];
        assert_eq!(file.read(&mut extra), Err(Error::Eof));
    }

    #[test]
    fn test_missing_file_and_dir() {
        let vol = volume();
        let file = File::open(&vol, "NONE.BIN", OpenMode::IN);
        assert_eq!(file.error(), Some(Error::NoFile));
        let file = File::open(&vol, "NODIR/A.BIN", OpenMode::OUT | OpenMode::TRUNC);
        assert_eq!(file.error(), Some(Error::NoPath));
    }

    #[test]
    fn test_append_and_clamped_seek() {
        let vol = volume();
        {
            let mut file = File::open(&vol, "LOG.TXT", OpenMode::OUT | OpenMode::ATE);
            file.puts("one\n").unwrap();
        }
        {
            let mut file = File::open(&vol, "LOG.TXT", OpenMode::OUT | OpenMode::ATE);
            assert_eq!(file.position(), Some(4));
            file.puts("two\n").unwrap();
        }
        let mut file = File::open(&vol, "LOG.TXT", OpenMode::IN);
        let mut buf = [0u8; 8];
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, b"one\ntwo\n");
        assert_eq!(file.seek(2), Ok(8));
        assert_eq!(file.seek(100), Err(Error::BadSeek));
    }

    #[test]
    fn test_sequential_names() {
        let vol = volume();
        for _ in 0..3 {
            let stem = next_filename_stem_matching_pattern(&vol, "CAP???").unwrap();
            let mut file = File::open(&vol, &format!("{}.BIN", stem), OpenMode::OUT | OpenMode::TRUNC);
            file.write(stem.as_bytes()).unwrap();
        }
        let names: Vec<String> = read_dir(&vol, "", "CAP*.BIN").map(|e| e.name).collect();
        assert_eq!(names, ["CAP000.BIN", "CAP001.BIN", "CAP002.BIN"]);
        assert_eq!(
            next_filename_stem_matching_pattern(&vol, "CAP???").as_deref(),
            Some("CAP003")
        );
    }

    #[test]
    fn test_space_shrinks() {
        let vol = volume();
        let before = space(&vol, "");
        assert!(before.capacity > 0);
        assert!(before.free <= before.capacity);
        {
            let mut file = File::open(&vol, "BIG.BIN", OpenMode::OUT | OpenMode::TRUNC);
            file.write(&[0xa5; 64 * 1024]).unwrap();
        }
        let after = space(&vol, "");
        assert_eq!(after.capacity, before.capacity);
        assert!(after.free < before.free);
        assert_eq!(after.available, after.free);
    }

    #[test]
    fn test_remount_keeps_data() {
        let mut disk = RamDisk::new(SECTOR_SIZE, SECTORS);
        {
            let vol = FatVolume::format(&mut disk).unwrap();
            {
                let mut file = File::open(&vol, "KEEP.TXT", OpenMode::OUT | OpenMode::TRUNC);
                file.puts("kept").unwrap();
            }
            vol.unmount().unwrap();
        }
        let vol = FatVolume::mount(&mut disk).unwrap();
        let mut file = File::open(&vol, "KEEP.TXT", OpenMode::IN);
        let mut buf = [0u8; 4];
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, b"kept");
    }

    #[test]
    fn test_blank_medium() {
        assert_eq!(
            FatVolume::mount(RamDisk::new(SECTOR_SIZE, 64)).err(),
            Some(Error::NoFilesystem)
        );
    }

    #[test]
    fn test_full_medium_is_disk_full() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut disk = RamDisk::new(SECTOR_SIZE, 2048);
        let payload: Vec<u8> = (0..2 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        {
            let vol = FatVolume::format(&mut disk).unwrap();
            let free = space(&vol, "").free;
            assert!(free > 0);
            assert!((payload.len() as u64) > free);

            let mut file = File::open(&vol, "FILL.BIN", OpenMode::OUT | OpenMode::TRUNC);
            assert_eq!(file.write(&payload), Err(Error::DiskFull));
            assert_eq!(file.write(b"more"), Err(Error::DiskFull));
            assert_eq!(file.error(), Some(Error::DiskFull));
            drop(file);
            assert_eq!(space(&vol, "").free, 0);
            vol.unmount().unwrap();
        }

        let vol = FatVolume::mount(&mut disk).unwrap();
        let mut file = File::open(&vol, "FILL.BIN", OpenMode::IN);
        let written = file.size().unwrap() as usize;
        assert!(written > 0);
        assert!(written < payload.len());
        let mut buf = vec![0u8; written];
        file.read(&mut buf).unwrap();
        assert_eq!(buf, &payload[..written]);
    }

    /// Reads back zeros, rejects every write
    struct ReadOnlyDisk(RamDisk);
    impl BlockDevice for ReadOnlyDisk {
        fn sector_size(&self) -> usize {
            self.0.sector_size()
        }

        fn sector_count(&self) -> u64 {
            self.0.sector_count()
        }

        fn read(&mut self, sector: u64) -> Result<Vec<u8>, DeviceError> {
            self.0.read(sector)
        }

        fn write(&mut self, _sector: u64, _data: &[u8]) -> Result<(), DeviceError> {
            Err(DeviceError::Io)
        }
    }

    #[test]
    fn test_format_failure() {
        let disk = ReadOnlyDisk(RamDisk::new(SECTOR_SIZE, 2048));
        assert_eq!(FatVolume::format(disk).err(), Some(Error::MkfsAborted));
    }

    #[test]
    fn test_wrong_sector_size() {
        assert_eq!(
            FatVolume::mount(RamDisk::new(4096, 16)).err(),
            Some(Error::InvalidDrive)
        );
    }
}
