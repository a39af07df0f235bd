//! Volatile in-memory driver.
//!
//! Behaves like a FAT driver where it matters to the handle layer: files live
//! in clusters of a fixed-size medium, writes stop short when the medium is
//! full, seeks past the end of a read-only file are clamped, and directory
//! entries are returned in creation order.
//!
//! This is a host driver for tests and simulation, not a device filesystem:
//! nothing is persisted, and it carries fault injection (`fail_next`,
//! `fail_after`) and bookkeeping counters (`open_files`, `open_searches`,
//! `last_open_flags`) for checking how the handle layer drives it.

use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec::Vec;

use spin::Mutex;

use crate::config::SECTOR_SIZE;
use crate::driver::{Attributes, DirEntry, Driver, FreeSpace, OpenFlags};
use crate::error::{Error, FsResult};
use crate::wildcard;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeType {
    File(Vec<u8>),
    Directory,
}

#[derive(Debug, Clone)]
struct Node {
    path: String,
    kind: NodeType,
}
impl Node {
    fn entry(&self) -> DirEntry {
        let (size, attributes) = match &self.kind {
            NodeType::File(data) => (data.len() as u64, Attributes::ARCHIVE),
            NodeType::Directory => (0, Attributes::DIRECTORY),
        };
        DirEntry {
            name: file_name(&self.path).to_owned(),
            size,
            attributes,
        }
    }
}

/// Open file state
#[derive(Debug)]
pub struct RamFile {
    path: String,
    position: u64,
    flags: OpenFlags,
}

/// Directory search state
#[derive(Debug)]
pub struct RamSearch {
    dir: String,
    pattern: String,
    next: usize,
}

#[derive(Debug)]
struct Inner {
    nodes: Vec<Node>,
    total_clusters: u64,
    sectors_per_cluster: u64,
    open_files: usize,
    open_searches: usize,
    /// Operations to let through, then the error to fail with
    fault: Option<(usize, Error)>,
    last_open_flags: Option<OpenFlags>,
}
impl Inner {
    fn cluster_bytes(&self) -> u64 {
        self.sectors_per_cluster * SECTOR_SIZE as u64
    }

    fn clusters_for(&self, len: u64) -> u64 {
        (len + self.cluster_bytes() - 1) / self.cluster_bytes()
    }

    fn used_clusters(&self) -> u64 {
        self.nodes
            .iter()
            .map(|node| match &node.kind {
                NodeType::File(data) => self.clusters_for(data.len() as u64),
                NodeType::Directory => 1,
            })
            .sum()
    }

    fn free_clusters(&self) -> u64 {
        self.total_clusters.saturating_sub(self.used_clusters())
    }

    /// Largest size a file currently `len` bytes long can grow to
    fn max_len(&self, len: u64) -> u64 {
        (self.clusters_for(len) + self.free_clusters()) * self.cluster_bytes()
    }

    fn find(&self, path: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.path == path)
    }

    fn dir_exists(&self, path: &str) -> bool {
        path.is_empty()
            || self
                .nodes
                .iter()
                .any(|n| n.path == path && n.kind == NodeType::Directory)
    }

    fn take_fault(&mut self) -> FsResult<()> {
        match self.fault.take() {
            Some((0, error)) => Err(error),
            Some((n, error)) => {
                self.fault = Some((n - 1, error));
                Ok(())
            },
            None => Ok(()),
        }
    }

    fn data(&self, path: &str) -> FsResult<&Vec<u8>> {
        let i = self.find(path).ok_or(Error::InvalidObject)?;
        match &self.nodes[i].kind {
            NodeType::File(data) => Ok(data),
            NodeType::Directory => Err(Error::InvalidObject),
        }
    }

    fn data_mut(&mut self, path: &str) -> FsResult<&mut Vec<u8>> {
        let i = self.find(path).ok_or(Error::InvalidObject)?;
        match &mut self.nodes[i].kind {
            NodeType::File(data) => Ok(data),
            NodeType::Directory => Err(Error::InvalidObject),
        }
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_owned()
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Host-side test driver; see the module documentation
pub struct RamFs {
    inner: Mutex<Inner>,
}
impl RamFs {
    /// A blank medium of `total_clusters` clusters
    pub fn new(total_clusters: u64, sectors_per_cluster: u64) -> Self {
        assert!(sectors_per_cluster != 0);
        Self {
            inner: Mutex::new(Inner {
                nodes: Vec::new(),
                total_clusters,
                sectors_per_cluster,
                open_files: 0,
                open_searches: 0,
                fault: None,
                last_open_flags: None,
            }),
        }
    }

    /// Create or replace a file with the given contents
    pub fn insert(&self, path: &str, data: &[u8]) {
        let path = normalize(path);
        let mut inner = self.inner.lock();
        match inner.find(&path) {
            Some(i) => inner.nodes[i].kind = NodeType::File(data.to_vec()),
            None => inner.nodes.push(Node {
                path,
                kind: NodeType::File(data.to_vec()),
            }),
        }
    }

    pub fn mkdir(&self, path: &str) {
        let path = normalize(path);
        let mut inner = self.inner.lock();
        if inner.find(&path).is_none() {
            inner.nodes.push(Node {
                path,
                kind: NodeType::Directory,
            });
        }
    }

    pub fn remove(&self, path: &str) {
        let path = normalize(path);
        self.inner.lock().nodes.retain(|n| n.path != path);
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize(path);
        let inner = self.inner.lock();
        inner.data(&path).ok().cloned()
    }

    /// Make the next fallible operation fail with `error`
    pub fn fail_next(&self, error: Error) {
        self.fail_after(0, error);
    }

    /// Let `count` fallible operations succeed, then fail one with `error`
    pub fn fail_after(&self, count: usize, error: Error) {
        self.inner.lock().fault = Some((count, error));
    }

    pub fn open_files(&self) -> usize {
        self.inner.lock().open_files
    }

    pub fn open_searches(&self) -> usize {
        self.inner.lock().open_searches
    }

    /// Flags of the most recent `open` call
    pub fn last_open_flags(&self) -> Option<OpenFlags> {
        self.inner.lock().last_open_flags
    }
}

impl Driver for RamFs {
    type File = RamFile;
    type Search = RamSearch;

    fn open(&self, path: &str, flags: OpenFlags) -> FsResult<RamFile> {
        let path = normalize(path);
        let mut inner = self.inner.lock();
        inner.last_open_flags = Some(flags);
        inner.take_fault()?;
        log::trace!("open {:?} {:?}", path, flags);

        if file_name(&path).is_empty() {
            return Err(Error::InvalidName);
        }
        if !inner.dir_exists(parent(&path)) {
            return Err(Error::NoPath);
        }

        match inner.find(&path) {
            Some(i) => match &mut inner.nodes[i].kind {
                NodeType::Directory => return Err(Error::NoFile),
                NodeType::File(data) => {
                    if flags.contains(OpenFlags::CREATE_ALWAYS) {
                        data.clear();
                    }
                }
            },
            None => {
                if !flags.intersects(OpenFlags::CREATE_ALWAYS | OpenFlags::OPEN_ALWAYS) {
                    return Err(Error::NoFile);
                }
                inner.nodes.push(Node {
                    path: path.clone(),
                    kind: NodeType::File(Vec::new()),
                });
            }
        }

        inner.open_files += 1;
        Ok(RamFile {
            path,
            position: 0,
            flags,
        })
    }

    fn close(&self, file: RamFile) {
        log::trace!("close {:?}", file.path);
        let mut inner = self.inner.lock();
        inner.open_files -= 1;
    }

    fn read(&self, file: &mut RamFile, buf: &mut [u8]) -> FsResult<usize> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        if !file.flags.contains(OpenFlags::READ) {
            return Err(Error::Denied);
        }
        let data = inner.data(&file.path)?;
        let start = (file.position as usize).min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        file.position += count as u64;
        log::trace!("read {:?} {} of {}", file.path, count, buf.len());
        Ok(count)
    }

    fn write(&self, file: &mut RamFile, buf: &[u8]) -> FsResult<usize> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        if !file.flags.contains(OpenFlags::WRITE) {
            return Err(Error::Denied);
        }
        let len = inner.data(&file.path)?.len() as u64;
        let limit = inner.max_len(len);
        let start = file.position;
        let end = (start + buf.len() as u64).min(limit.max(start));
        let count = (end - start) as usize;

        let data = inner.data_mut(&file.path)?;
        if (data.len() as u64) < end {
            data.resize(end as usize, 0);
        }
        data[start as usize..end as usize].copy_from_slice(&buf[..count]);
        file.position = end;
        log::trace!("write {:?} {} of {}", file.path, count, buf.len());
        Ok(count)
    }

    fn seek(&self, file: &mut RamFile, offset: u64) -> FsResult<()> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        let len = inner.data(&file.path)?.len() as u64;
        file.position = if offset <= len {
            offset
        } else if file.flags.contains(OpenFlags::WRITE) {
            // Extends the file, as far as the medium allows
            let end = offset.min(inner.max_len(len));
            inner.data_mut(&file.path)?.resize(end as usize, 0);
            end
        } else {
            len
        };
        log::trace!("seek {:?} {} -> {}", file.path, offset, file.position);
        Ok(())
    }

    fn tell(&self, file: &RamFile) -> u64 {
        file.position
    }

    fn size(&self, file: &RamFile) -> u64 {
        let inner = self.inner.lock();
        inner.data(&file.path).map_or(0, |data| data.len() as u64)
    }

    fn sync(&self, file: &mut RamFile) -> FsResult<()> {
        log::trace!("sync {:?}", file.path);
        self.inner.lock().take_fault()
    }

    fn find_first(&self, path: &str, pattern: &str) -> FsResult<(RamSearch, Option<DirEntry>)> {
        let dir = normalize(path);
        {
            let mut inner = self.inner.lock();
            inner.take_fault()?;
            if !inner.dir_exists(&dir) {
                return Err(Error::NoPath);
            }
            inner.open_searches += 1;
        }
        let mut search = RamSearch {
            dir,
            pattern: pattern.to_owned(),
            next: 0,
        };
        match self.find_next(&mut search) {
            Ok(first) => Ok((search, first)),
            Err(error) => {
                self.close_dir(search);
                Err(error)
            },
        }
    }

    fn find_next(&self, search: &mut RamSearch) -> FsResult<Option<DirEntry>> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        while search.next < inner.nodes.len() {
            let node = &inner.nodes[search.next];
            search.next += 1;
            if parent(&node.path) == search.dir
                && wildcard::matches(&search.pattern, file_name(&node.path))
            {
                return Ok(Some(node.entry()));
            }
        }
        Ok(None)
    }

    fn close_dir(&self, search: RamSearch) {
        log::trace!("close_dir {:?}", search.dir);
        self.inner.lock().open_searches -= 1;
    }

    fn free_space(&self, _path: &str) -> FsResult<FreeSpace> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        Ok(FreeSpace {
            free_clusters: inner.free_clusters(),
            sectors_per_cluster: inner.sectors_per_cluster,
            fat_entries: inner.total_clusters + 2,
        })
    }
}
