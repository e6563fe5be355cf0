//! Capturing the process' standard output and error streams.
//!
//! These are file descriptors 1 and 2, shared by the whole process (including child processes
//! and C libraries), so the log file's descriptor is duplicated over them.
//!
//! Several rotators may capture the same stream. The most recent capture owns the descriptor
//! and the others wait in a stack behind it, each with its current file. Releasing the owner
//! hands the stream to the next one in the stack. The descriptor the process started with is
//! saved on the first capture and put back only when the last capture is released, so a stream
//! never gets pointed back at a file some rotation has already superseded.

use std::io::Error;

use crate::file::LogFile;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug)]
pub(crate) struct Captured {
    stream: Stream,
    #[cfg(unix)]
    id: u64,
}

#[cfg(unix)]
mod imp {
    use std::io::{stdout, Write};
    use std::os::unix::io::AsRawFd;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use log::warn;

    use super::*;

    /// Who captures a stream, process-wide.
    struct Owners {
        // The descriptor from before the first capture.
        saved: Option<libc::c_int>,
        // Current owner last.
        stack: Vec<(u64, LogFile)>,
    }

    fn owners(stream: Stream) -> MutexGuard<'static, Owners> {
        static STDOUT: Mutex<Owners> = Mutex::new(Owners {
            saved: None,
            stack: Vec::new(),
        });
        static STDERR: Mutex<Owners> = Mutex::new(Owners {
            saved: None,
            stack: Vec::new(),
        });
        let owners = match stream {
            Stream::Stdout => &STDOUT,
            Stream::Stderr => &STDERR,
        };
        owners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fd(stream: Stream) -> libc::c_int {
        match stream {
            Stream::Stdout => libc::STDOUT_FILENO,
            Stream::Stderr => libc::STDERR_FILENO,
        }
    }

    fn cvt(result: libc::c_int) -> Result<libc::c_int, Error> {
        if result == -1 {
            Err(Error::last_os_error())
        } else {
            Ok(result)
        }
    }

    fn flush(stream: Stream) {
        // Whatever sits in the buffer was written before the switch and belongs to the old
        // target.
        if stream == Stream::Stdout {
            let _ = stdout().flush();
        }
    }

    fn point_at(stream: Stream, file: &LogFile) -> Result<(), Error> {
        flush(stream);
        file.with_file(|f| cvt(unsafe { libc::dup2(f.as_raw_fd(), fd(stream)) }))?;
        Ok(())
    }

    fn restore(stream: Stream, saved: libc::c_int) {
        flush(stream);
        if let Err(e) = cvt(unsafe { libc::dup2(saved, fd(stream)) }) {
            warn!("Failed to restore original {:?}: {}", stream, e);
        }
        if let Err(e) = cvt(unsafe { libc::close(saved) }) {
            warn!("Failed to close saved {:?} descriptor: {}", stream, e);
        }
    }

    impl Captured {
        pub(crate) fn new(stream: Stream, file: &LogFile) -> Result<Self, Error> {
            static NEXT_ID: AtomicU64 = AtomicU64::new(0);

            let mut owners = owners(stream);
            if owners.saved.is_none() {
                flush(stream);
                owners.saved = Some(cvt(unsafe { libc::dup(fd(stream)) })?);
            }
            if let Err(e) = point_at(stream, file) {
                if owners.stack.is_empty() {
                    if let Some(saved) = owners.saved.take() {
                        restore(stream, saved);
                    }
                }
                return Err(e);
            }
            let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            owners.stack.push((id, file.clone()));
            Ok(Captured { stream, id })
        }

        /// Switches this capture to a new file.
        ///
        /// The stream itself follows only if this capture currently owns it.
        pub(crate) fn redirect(&self, file: &LogFile) -> Result<(), Error> {
            let mut owners = owners(self.stream);
            let owner = owners.stack.last().map(|(id, _)| *id);
            if let Some(entry) = owners.stack.iter_mut().find(|(id, _)| *id == self.id) {
                entry.1 = file.clone();
            }
            if owner == Some(self.id) {
                point_at(self.stream, file)?;
            }
            Ok(())
        }

        pub(crate) fn release(self) {
            let mut owners = owners(self.stream);
            let was_owner = owners.stack.last().map(|(id, _)| *id) == Some(self.id);
            owners.stack.retain(|(id, _)| *id != self.id);
            if owners.stack.is_empty() {
                if let Some(saved) = owners.saved.take() {
                    restore(self.stream, saved);
                }
            } else if was_owner {
                let (_, next) = &owners.stack[owners.stack.len() - 1];
                if let Err(e) = point_at(self.stream, next) {
                    warn!(
                        "Failed to hand {:?} over to {}: {}",
                        self.stream,
                        next.path().display(),
                        e
                    );
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io::ErrorKind;

    use super::*;

    fn unsupported() -> Error {
        Error::new(
            ErrorKind::Other,
            "capturing standard streams is supported on unix only",
        )
    }

    impl Captured {
        pub(crate) fn new(_stream: Stream, _file: &LogFile) -> Result<Self, Error> {
            Err(unsupported())
        }

        pub(crate) fn redirect(&self, _file: &LogFile) -> Result<(), Error> {
            Err(unsupported())
        }

        pub(crate) fn release(self) {}
    }
}
