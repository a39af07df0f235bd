//! The block filesystem driver, as consumed by the handle layer

use alloc::string::String;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::FsResult;

bitflags! {
    /// Access and creation flags passed to `Driver::open`.
    /// The empty set opens an existing file only.
    pub struct OpenFlags: u8 {
        const READ          = 0x01;
        const WRITE         = 0x02;
        const CREATE_ALWAYS = 0x08;
        const OPEN_ALWAYS   = 0x10;
    }
}

bitflags! {
    /// FAT directory entry attribute bits
    #[derive(Deserialize, Serialize)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
    }
}

/// Metadata of a single directory entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub attributes: Attributes,
}
impl DirEntry {
    /// Anything that is not a directory counts, volume labels included
    pub fn is_regular_file(&self) -> bool {
        !self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }
}

/// Cluster accounting of a mounted volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpace {
    pub free_clusters: u64,
    pub sectors_per_cluster: u64,
    /// Number of FAT entries, including the two reserved ones
    pub fat_entries: u64,
}

/// Operations the underlying filesystem driver provides.
///
/// Methods take `&self`; implementations serialize access to the medium
/// themselves. Handles own their `File` and `Search` values and hand them
/// back on every call.
pub trait Driver {
    /// State of one open file
    type File;
    /// State of one directory search
    type Search;

    fn open(&self, path: &str, flags: OpenFlags) -> FsResult<Self::File>;

    fn close(&self, file: Self::File);

    /// Returns the number of bytes actually read, which is less than
    /// `buf.len()` at end of file
    fn read(&self, file: &mut Self::File, buf: &mut [u8]) -> FsResult<usize>;

    /// Returns the number of bytes actually written, which is less than
    /// `buf.len()` when the medium is full
    fn write(&self, file: &mut Self::File, buf: &[u8]) -> FsResult<usize>;

    /// Move to an absolute offset. Drivers may clamp the offset;
    /// `tell` reports where the file actually ended up.
    fn seek(&self, file: &mut Self::File, offset: u64) -> FsResult<()>;

    fn tell(&self, file: &Self::File) -> u64;

    fn size(&self, file: &Self::File) -> u64;

    fn sync(&self, file: &mut Self::File) -> FsResult<()>;

    /// Start a search in `path` for names matching `pattern`.
    /// Returns the first match, or `None` when nothing matches.
    fn find_first(&self, path: &str, pattern: &str)
        -> FsResult<(Self::Search, Option<DirEntry>)>;

    /// `None` when no entries remain
    fn find_next(&self, search: &mut Self::Search) -> FsResult<Option<DirEntry>>;

    fn close_dir(&self, search: Self::Search);

    fn free_space(&self, path: &str) -> FsResult<FreeSpace>;
}
