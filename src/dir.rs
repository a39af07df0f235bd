//! Directory enumeration
//!
//! A `DirIter` walks the entries of one directory that match a wildcard
//! pattern. Clones are cheap: they share the driver's search handle, and
//! each keeps its own copy of the current entry. The shared handle has a
//! single cursor, so advancing one clone moves the others' next entry too.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use crate::driver::Driver;
use crate::error::FsResult;

pub use crate::driver::DirEntry;

struct Search<'a, D: Driver> {
    driver: &'a D,
    handle: RefCell<Option<D::Search>>,
}
impl<'a, D: Driver> Search<'a, D> {
    fn next(&self) -> FsResult<Option<DirEntry>> {
        match self.handle.borrow_mut().as_mut() {
            Some(handle) => self.driver.find_next(handle),
            None => Ok(None),
        }
    }
}
impl<'a, D: Driver> Drop for Search<'a, D> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            self.driver.close_dir(handle);
        }
    }
}

pub struct DirIter<'a, D: Driver> {
    search: Option<Rc<Search<'a, D>>>,
    entry: Option<DirEntry>,
}
impl<'a, D: Driver> DirIter<'a, D> {
    /// Start enumerating `path` for names matching `pattern`.
    /// A search that cannot be started yields nothing.
    pub fn begin(driver: &'a D, path: &str, pattern: &str) -> Self {
        match Self::try_begin(driver, path, pattern) {
            Ok(iter) => iter,
            Err(error) => {
                log::warn!("search {:?} in {:?} failed: {}", pattern, path, error);
                Self::exhausted()
            },
        }
    }

    /// Like `begin`, but reports why the search could not be started
    pub fn try_begin(driver: &'a D, path: &str, pattern: &str) -> FsResult<Self> {
        let (handle, first) = driver.find_first(path, pattern)?;
        let mut iter = Self {
            search: Some(Rc::new(Search {
                driver,
                handle: RefCell::new(Some(handle)),
            })),
            entry: None,
        };
        iter.accept(Ok(first));
        Ok(iter)
    }

    /// An enumerator with no entries
    pub fn exhausted() -> Self {
        Self {
            search: None,
            entry: None,
        }
    }

    pub fn current(&self) -> Option<&DirEntry> {
        self.entry.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.entry.is_none()
    }

    /// Move to the next matching entry
    pub fn advance(&mut self) {
        let result = match &self.search {
            Some(search) => search.next(),
            None => return,
        };
        self.accept(result);
    }

    fn accept(&mut self, result: FsResult<Option<DirEntry>>) {
        match result {
            Ok(Some(entry)) if !entry.name.is_empty() => {
                log::trace!("entry {:?}", entry.name);
                self.entry = Some(entry);
            },
            other => {
                if let Err(error) = other {
                    log::debug!("search ended: {}", error);
                }
                self.search = None;
                self.entry = None;
            },
        }
    }
}
impl<'a, D: Driver> Clone for DirIter<'a, D> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
            entry: self.entry.clone(),
        }
    }
}
/// Only exhausted enumerators compare equal
impl<'a, D: Driver> PartialEq for DirIter<'a, D> {
    fn eq(&self, other: &Self) -> bool {
        self.is_exhausted() && other.is_exhausted()
    }
}
impl<'a, D: Driver> Iterator for DirIter<'a, D> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let entry = self.entry.take()?;
        self.advance();
        Some(entry)
    }
}
impl<'a, D: Driver> fmt::Debug for DirIter<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirIter")
            .field("entry", &self.entry)
            .finish()
    }
}

pub fn read_dir<'a, D: Driver>(driver: &'a D, path: &str, pattern: &str) -> DirIter<'a, D> {
    DirIter::begin(driver, path, pattern)
}
