use core::convert::TryFrom;
use core::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

pub type FsResult<T> = Result<T, Error>;

/// Largest result code the driver itself can produce.
/// Native codes are stored in a single byte.
pub const NATIVE_CODE_MAX: u16 = u8::MAX as u16;

/// Failure kinds of the storage layer.
///
/// Values up to `InvalidParameter` are the driver's own result codes and keep
/// its numbering. The remaining three are produced by this crate only, and
/// live above the range a driver result can hold so the two never collide.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Deserialize,
    Serialize,
)]
#[repr(u16)]
#[must_use]
pub enum Error {
    /// Hard error in the low level disk I/O layer
    DiskErr = 1,
    /// Assertion failure inside the driver
    IntErr = 2,
    /// The physical drive cannot work
    NotReady = 3,
    NoFile = 4,
    NoPath = 5,
    InvalidName = 6,
    /// Access denied, or the directory is full
    Denied = 7,
    Exist = 8,
    /// The file or directory object is invalid
    InvalidObject = 9,
    WriteProtected = 10,
    InvalidDrive = 11,
    /// The volume has no work area
    NotEnabled = 12,
    /// There is no valid FAT volume
    NoFilesystem = 13,
    MkfsAborted = 14,
    /// Could not get a grant to access the volume within the defined period
    Timeout = 15,
    /// Rejected by the file sharing policy
    Locked = 16,
    /// Working buffer could not be allocated
    NotEnoughCore = 17,
    TooManyOpenFiles = 18,
    InvalidParameter = 19,
    /// Write accepted fewer bytes than requested
    DiskFull = 0x100,
    /// Read returned fewer bytes than requested
    Eof = 0x101,
    /// Position after a seek differs from the requested one
    BadSeek = 0x102,
}

const_assert!((Error::InvalidParameter as u16) <= NATIVE_CODE_MAX);
const_assert!((Error::DiskFull as u16) > NATIVE_CODE_MAX);
const_assert!((Error::Eof as u16) > NATIVE_CODE_MAX);
const_assert!((Error::BadSeek as u16) > NATIVE_CODE_MAX);

impl Error {
    pub fn code(self) -> u16 {
        self.into()
    }

    /// True for the kinds this crate synthesizes itself
    pub fn is_synthesized(self) -> bool {
        self.code() > NATIVE_CODE_MAX
    }

    pub fn description(self) -> &'static str {
        use Error::*;
        match self {
            DiskErr => "disk error",
            IntErr => "insanity detected",
            NotReady => "not ready",
            NoFile => "no file",
            NoPath => "no path",
            InvalidName => "invalid name",
            Denied => "denied",
            Exist => "exists",
            InvalidObject => "invalid object",
            WriteProtected => "write protected",
            InvalidDrive => "invalid drive",
            NotEnabled => "not enabled",
            NoFilesystem => "no filesystem",
            MkfsAborted => "mkfs aborted",
            Timeout => "timeout",
            Locked => "locked",
            NotEnoughCore => "not enough core",
            TooManyOpenFiles => "too many open files",
            InvalidParameter => "invalid parameter",
            DiskFull => "disk full",
            Eof => "end of file",
            BadSeek => "bad seek",
        }
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Describe a raw result code. Zero is success and has an empty description.
pub fn describe(code: u16) -> &'static str {
    if code == 0 {
        return "";
    }
    match Error::try_from(code) {
        Ok(error) => error.description(),
        Err(_) => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_keep_driver_numbering() {
        assert_eq!(Error::DiskErr.code(), 1);
        assert_eq!(Error::NoFile.code(), 4);
        assert_eq!(Error::InvalidParameter.code(), 19);
        assert_eq!(u16::from(Error::Eof), 0x101);
        assert_eq!(Error::try_from(7).ok(), Some(Error::Denied));
        assert!(Error::try_from(20).is_err());
        assert!(Error::try_from(0).is_err());
    }

    #[test]
    fn test_synthesized_codes() {
        for e in [Error::DiskFull, Error::Eof, Error::BadSeek] {
            assert!(e.is_synthesized());
        }
        for code in 1..=19u16 {
            assert!(!Error::try_from(code).unwrap().is_synthesized());
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(describe(0), "");
        assert_eq!(describe(1), "disk error");
        assert_eq!(describe(0x100), "disk full");
        assert_eq!(describe(0x102), "bad seek");
        assert_eq!(describe(0x200), "unknown");
        assert_eq!(format!("{}", Error::Eof), "end of file");
        assert_eq!(format!("{}", Error::TooManyOpenFiles), "too many open files");
    }
}
