use core::fmt;

use bitflags::bitflags;

use crate::driver::{Driver, OpenFlags};
use crate::error::{Error, FsResult};

bitflags! {
    /// How a file is opened. Flags combine freely.
    pub struct OpenMode: u8 {
        /// Allow reading
        const IN    = 1 << 0;
        /// Allow writing
        const OUT   = 1 << 1;
        /// Create the file, discarding any existing contents
        const TRUNC = 1 << 2;
        /// Open or create the file, then move to its end
        const ATE   = 1 << 3;
    }
}

impl From<OpenMode> for OpenFlags {
    fn from(mode: OpenMode) -> Self {
        let mut flags = OpenFlags::empty();
        if mode.contains(OpenMode::IN) {
            flags |= OpenFlags::READ;
        }
        if mode.contains(OpenMode::OUT) {
            flags |= OpenFlags::WRITE;
        }
        if mode.contains(OpenMode::TRUNC) {
            flags |= OpenFlags::CREATE_ALWAYS;
        }
        if mode.contains(OpenMode::ATE) {
            flags |= OpenFlags::OPEN_ALWAYS;
        }
        flags
    }
}

/// An open file on a driver.
///
/// The first failing operation puts the handle into a permanent error state:
/// every later operation fails immediately with that same error. Reads and
/// writes are all-or-nothing; a short transfer is reported as `Error::Eof` or
/// `Error::DiskFull` even though part of the data was moved. The underlying
/// file is closed when the handle is dropped, or earlier if a seek fails.
pub struct File<'a, D: Driver> {
    driver: &'a D,
    file: Option<D::File>,
    error: Option<Error>,
}
impl<'a, D: Driver> File<'a, D> {
    pub fn open(driver: &'a D, path: &str, mode: OpenMode) -> Self {
        let mut this = Self {
            driver,
            file: None,
            error: None,
        };

        match driver.open(path, mode.into()) {
            Ok(file) => this.file = Some(file),
            Err(error) => {
                log::debug!("open {:?} ({:?}) failed: {}", path, mode, error);
                this.error = Some(error);
                return this;
            },
        }

        if mode.contains(OpenMode::ATE) {
            let result = this.run(|driver, file| {
                let end = driver.size(file);
                driver.seek(file, end)
            });
            if result.is_err() {
                this.release();
                return this;
            }
        }

        log::debug!("opened {:?} ({:?})", path, mode);
        this
    }

    /// The sticky error, if any operation has failed
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Current offset, while the underlying file is open
    pub fn position(&self) -> Option<u64> {
        self.file.as_ref().map(|file| self.driver.tell(file))
    }

    pub fn size(&self) -> Option<u64> {
        self.file.as_ref().map(|file| self.driver.size(file))
    }

    /// Fill `buf` completely
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<()> {
        let count = self.run(|driver, file| driver.read(file, buf))?;
        if count != buf.len() {
            return Err(self.fail(Error::Eof));
        }
        Ok(())
    }

    /// Write all of `buf`
    pub fn write(&mut self, buf: &[u8]) -> FsResult<()> {
        let count = self.run(|driver, file| driver.write(file, buf))?;
        if count != buf.len() {
            return Err(self.fail(Error::DiskFull));
        }
        Ok(())
    }

    /// Write the bytes of `text`, under the same rules as `write`
    pub fn puts(&mut self, text: &str) -> FsResult<()> {
        self.write(text.as_bytes())
    }

    /// Move to an absolute offset, returning the previous one.
    ///
    /// The resulting offset is read back; if the driver did not land exactly
    /// on `offset` the handle fails with `Error::BadSeek`. Any seek failure
    /// closes the underlying file.
    pub fn seek(&mut self, offset: u64) -> FsResult<u64> {
        self.check()?;

        let previous = match self.run(|driver, file| {
            let previous = driver.tell(file);
            driver.seek(file, offset)?;
            Ok(previous)
        }) {
            Ok(previous) => previous,
            Err(error) => {
                self.release();
                return Err(error);
            },
        };

        let position = self.position();
        if position != Some(offset) {
            log::warn!("seek to {} landed at {:?}", offset, position);
            self.release();
            return Err(self.fail(Error::BadSeek));
        }
        Ok(previous)
    }

    /// Flush buffered writes to the medium
    pub fn sync(&mut self) -> FsResult<()> {
        self.run(|driver, file| driver.sync(file))
    }

    /// Flush and close, reporting the final state of the handle
    pub fn close(mut self) -> FsResult<()> {
        let result = self.sync();
        self.release();
        result
    }

    fn check(&self) -> FsResult<()> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Run a driver operation, unless the handle has already failed
    fn run<T>(&mut self, op: impl FnOnce(&'a D, &mut D::File) -> FsResult<T>) -> FsResult<T> {
        self.check()?;
        let driver = self.driver;
        let result = match self.file.as_mut() {
            Some(file) => op(driver, file),
            None => Err(Error::InvalidObject),
        };
        result.map_err(|error| self.fail(error))
    }

    fn fail(&mut self, error: Error) -> Error {
        log::warn!("file error: {}", error);
        self.error = Some(error);
        error
    }

    fn release(&mut self) {
        if let Some(file) = self.file.take() {
            self.driver.close(file);
        }
    }
}
impl<'a, D: Driver> Drop for File<'a, D> {
    fn drop(&mut self) {
        self.release();
    }
}
impl<'a, D: Driver> fmt::Write for File<'a, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s).map_err(|_| fmt::Error)
    }
}
impl<'a, D: Driver> fmt::Debug for File<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("open", &self.file.is_some())
            .field("error", &self.error)
            .finish()
    }
}
