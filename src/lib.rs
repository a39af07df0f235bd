//! File handles over a FAT driver for a device with one removable card.
//!
//! Errors are sticky: once an operation on a `File` fails, the handle keeps
//! failing with that error until it is dropped.

#![cfg_attr(not(test), no_std)]
#![deny(unused_must_use)]

extern crate alloc;

pub mod config;
pub mod dir;
pub mod driver;
pub mod error;
pub mod file;
pub mod filename;
pub mod ramfs;
pub mod space;
pub mod wildcard;

#[cfg(feature = "fatfs")]
pub mod volume;

pub use self::dir::{read_dir, DirEntry, DirIter};
pub use self::driver::{Attributes, Driver, FreeSpace, OpenFlags};
pub use self::error::{Error, FsResult};
pub use self::file::{File, OpenMode};
pub use self::filename::{next_filename_stem_in, next_filename_stem_matching_pattern};
pub use self::space::{space, try_space, SpaceInfo};
