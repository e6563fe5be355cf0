use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Permission bits of a freshly created log file (`rw-r--r--`).
pub const DEFAULT_MODE: u32 = 0o644;

struct Inner {
    path: PathBuf,
    // None once closed.
    file: RwLock<Option<File>>,
}

/// A shared, append-only handle to an open log file.
///
/// Clones refer to the same open file. Once [`close`][LogFile::close]d, the descriptor is gone
/// for every clone and writes fail instead of going anywhere, so a superseded handle can never
/// be written to by accident.
#[derive(Clone)]
pub struct LogFile(Arc<Inner>);

impl LogFile {
    /// Opens (creating if necessary) the file for appending.
    ///
    /// The `mode` is used only when the file gets created and only on unix.
    pub fn open<P: AsRef<Path>>(path: P, mode: u32) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.create(true).write(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        let file = options.open(path)?;
        Ok(LogFile(Arc::new(Inner {
            path: path.to_owned(),
            file: RwLock::new(Some(file)),
        })))
    }

    /// The path this handle was opened from.
    ///
    /// The file may have been renamed or removed since.
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Closes the underlying descriptor.
    ///
    /// Waits for writes in progress on other threads. Closing an already closed handle does
    /// nothing.
    pub fn close(&self) {
        let file = self
            .0
            .file
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(file);
    }

    /// Has the handle been closed already?
    pub fn is_closed(&self) -> bool {
        self.0
            .file
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Is this the very same open file (not just the same path)?
    pub fn ptr_eq(&self, other: &LogFile) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Runs `f` with the open file, keeping it from being closed meanwhile.
    pub(crate) fn with_file<R, F>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&File) -> Result<R, Error>,
    {
        let guard = self.0.file.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(file) => f(file),
            None => Err(closed()),
        }
    }
}

fn closed() -> Error {
    Error::new(ErrorKind::Other, "log file already closed")
}

impl PartialEq for LogFile {
    fn eq(&self, other: &LogFile) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for LogFile {}

impl Debug for LogFile {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        fmt.debug_struct("LogFile")
            .field("path", &self.0.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Write for &LogFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.with_file(|mut file| file.write(buf))
    }
    fn flush(&mut self) -> Result<(), Error> {
        self.with_file(|mut file| file.flush())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        (&*self).write(buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        (&*self).flush()
    }
}
