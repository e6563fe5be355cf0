//! Writers that can be pointed at a different file at runtime.

use std::io::{stderr, Error, Write};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::file::LogFile;

/// Something whose output can be redirected into a log file.
///
/// This is all a [`Rotator`][crate::Rotator] needs from a logger. After each rotation, it calls
/// [`set_output`][SetOutput::set_output] with the new file, before the old one gets closed.
pub trait SetOutput: Send + Sync {
    /// Makes all further output go into the given file.
    fn set_output(&self, file: &LogFile);
}

impl<T: SetOutput + ?Sized> SetOutput for Arc<T> {
    fn set_output(&self, file: &LogFile) {
        (**self).set_output(file)
    }
}

/// A redirectable writer.
///
/// Hand a clone to whatever logging backend is in use (anything taking a [`Write`]) and attach
/// another clone to a [`Rotator`][crate::Rotator]; the backend keeps writing into whichever file
/// is current. Until redirected for the first time, everything goes to the standard error output.
///
/// Each `write` call goes into a single file as a whole. To keep several calls (eg. a partially
/// written record) together, use [`lock`][Output::lock].
#[derive(Clone, Debug, Default)]
pub struct Output(Arc<Mutex<Option<LogFile>>>);

impl Output {
    /// An output writing to the standard error until redirected.
    pub fn new() -> Self {
        Self::default()
    }

    /// The file currently written into, if redirected already.
    pub fn current(&self) -> Option<LogFile> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Pins the current file for as long as the lock is held.
    ///
    /// Rotations wait until it is released. Therefore, don't trigger a rotation from the same
    /// thread while holding it.
    pub fn lock(&self) -> OutputLock {
        OutputLock(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl SetOutput for Output {
    fn set_output(&self, file: &LogFile) {
        let mut current = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Some(file.clone());
    }
}

impl Write for &Output {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.lock().write(buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        self.lock().flush()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        (&*self).write(buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        (&*self).flush()
    }
}

/// Exclusive access to an [`Output`], see [`Output::lock`].
pub struct OutputLock<'a>(MutexGuard<'a, Option<LogFile>>);

impl Write for OutputLock<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        match self.0.as_ref() {
            Some(mut file) => file.write(buf),
            None => stderr().write(buf),
        }
    }
    fn flush(&mut self) -> Result<(), Error> {
        match self.0.as_ref() {
            Some(mut file) => file.flush(),
            None => stderr().flush(),
        }
    }
}

/// The process-wide default output.
///
/// Every [`Rotator`][crate::Rotator] redirects this one (unless told otherwise), so it is the
/// natural thing to give to the global logger.
pub fn default_output() -> Output {
    static DEFAULT: OnceLock<Output> = OnceLock::new();
    DEFAULT.get_or_init(Output::new).clone()
}
