use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::{stderr, Error, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::error;

use crate::file::{LogFile, DEFAULT_MODE};
use crate::output::SetOutput;
use crate::redirect::Targets;
use crate::registry;
use crate::stdio::{Captured, Stream};
#[cfg(all(feature = "signals", unix))]
use crate::signals::{self, Listener};

/// What to do when the log file can't be opened.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnFailure {
    /// Print the error and terminate the process.
    ///
    /// A program that can't log is in no shape to continue. This is the default.
    #[default]
    Exit,
    /// Return the error to the caller.
    ///
    /// If a rotation triggered by a signal fails, there's no caller. The error is logged and the
    /// previous file is kept in use.
    Return,
}

impl OnFailure {
    fn handle(self, path: &Path, e: Error) -> Error {
        error!("Failed to open log file {}: {}", path.display(), e);
        if self == OnFailure::Exit {
            let _ = writeln!(stderr(), "Failed to open log file {}: {}", path.display(), e);
            process::exit(1);
        }
        e
    }
}

#[derive(Debug)]
struct State {
    // None once closed.
    file: Option<LogFile>,
    targets: Targets,
    rotations: u64,
}

#[derive(Debug)]
pub(crate) struct Shared {
    path: PathBuf,
    mode: u32,
    on_failure: OnFailure,
    state: Mutex<State>,
}

fn closed() -> Error {
    Error::new(ErrorKind::Other, "log rotator already closed")
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the current file by a freshly opened one.
    ///
    /// Everything is switched over to the new file before the old one gets closed. The state
    /// lock serializes rotations with each other and with capture and close.
    pub(crate) fn rotate(&self) -> Result<(), Error> {
        let mut state = self.state();
        let old = match state.file.as_ref() {
            Some(file) => file.clone(),
            None => return Ok(()),
        };
        let new = registry::open_fresh(&self.path, self.mode)
            .map_err(|e| self.on_failure.handle(&self.path, e))?;
        state.targets.apply(&new);
        state.file = Some(new);
        state.rotations += 1;
        old.close();
        Ok(())
    }

    fn capture(&self, stream: Stream) -> Result<(), Error> {
        let mut state = self.state();
        let state = &mut *state;
        let file = state.file.as_ref().ok_or_else(closed)?;
        let slot = match stream {
            Stream::Stdout => &mut state.targets.stdout,
            Stream::Stderr => &mut state.targets.stderr,
        };
        match slot {
            Some(captured) => captured.redirect(file),
            None => {
                *slot = Some(Captured::new(stream, file)?);
                Ok(())
            }
        }
    }

    fn close(&self) {
        let mut state = self.state();
        state.targets.release();
        if let Some(file) = state.file.take() {
            file.close();
        }
    }
}

/// Configuration of a [`Rotator`].
///
/// ```rust
/// # fn main() -> Result<(), std::io::Error> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("app.log");
/// use std::io::Write;
///
/// use logrot::{Builder, OnFailure, Output};
///
/// let mut output = Output::new();
/// let rotator = Builder::new(&path)
///     .logger(output.clone())
///     .mode(0o640)
///     .on_open_failure(OnFailure::Return)
///     .start()?;
/// writeln!(output, "Hello")?;
/// rotator.rotate()?;
/// # Ok(())
/// # }
/// ```
pub struct Builder {
    path: PathBuf,
    mode: u32,
    on_failure: OnFailure,
    default_output: bool,
    loggers: Vec<Arc<dyn SetOutput>>,
    capture_stdout: bool,
    capture_stderr: bool,
    #[cfg(all(feature = "signals", unix))]
    signal: Option<libc::c_int>,
}

impl Debug for Builder {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        fmt.debug_struct("Builder")
            .field("path", &self.path)
            .field("mode", &format_args!("{:o}", self.mode))
            .field("on_failure", &self.on_failure)
            .field("default_output", &self.default_output)
            .field("loggers", &self.loggers.len())
            .field("capture_stdout", &self.capture_stdout)
            .field("capture_stderr", &self.capture_stderr)
            .finish()
    }
}

impl Builder {
    /// A rotator for the given path, with the defaults.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Builder {
            path: path.into(),
            mode: DEFAULT_MODE,
            on_failure: OnFailure::default(),
            default_output: true,
            loggers: Vec::new(),
            capture_stdout: false,
            capture_stderr: false,
            #[cfg(all(feature = "signals", unix))]
            signal: Some(signals::DEFAULT_SIGNAL),
        }
    }

    /// Rotate on this signal instead of `SIGHUP`.
    ///
    /// Other handlers of the same signal (including other rotators) keep working, the handlers
    /// are chained. Registering a forbidden signal (eg. `SIGKILL`) panics, as in `signal-hook`.
    #[cfg(all(feature = "signals", unix))]
    pub fn signal(mut self, signal: libc::c_int) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Don't listen to any signal, rotation happens only through [`Rotator::rotate`] or a
    /// [`Handle`].
    #[allow(unused_mut)]
    pub fn no_signal(mut self) -> Self {
        #[cfg(all(feature = "signals", unix))]
        {
            self.signal = None;
        }
        self
    }

    /// Also redirect this logger.
    pub fn logger<L: SetOutput + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Arc::new(logger));
        self
    }

    /// Also redirect all these loggers.
    pub fn loggers<L>(mut self, loggers: L) -> Self
    where
        L: IntoIterator<Item = Arc<dyn SetOutput>>,
    {
        self.loggers.extend(loggers);
        self
    }

    /// Whether to redirect the [`default_output`][crate::default_output] (on by default).
    pub fn default_output(mut self, redirect: bool) -> Self {
        self.default_output = redirect;
        self
    }

    /// Capture the process' standard output into the log file.
    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    /// Capture the process' standard error output into the log file.
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Permission bits of the file, if it needs to be created (`0o644` by default).
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// What to do if the file can't be opened, see [`OnFailure`].
    pub fn on_open_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Opens the file, redirects everything into it and starts listening for the signal.
    pub fn start(self) -> Result<Rotator, Error> {
        let file = registry::open_fresh(&self.path, self.mode)
            .map_err(|e| self.on_failure.handle(&self.path, e))?;
        let targets = Targets {
            default_output: self.default_output,
            loggers: self.loggers,
            stdout: None,
            stderr: None,
        };
        targets.apply(&file);
        let shared = Arc::new(Shared {
            path: self.path,
            mode: self.mode,
            on_failure: self.on_failure,
            state: Mutex::new(State {
                file: Some(file),
                targets,
                rotations: 0,
            }),
        });
        // From now on, dropping the rotator on error cleans up after us.
        #[allow(unused_mut)]
        let mut rotator = Rotator {
            shared,
            #[cfg(all(feature = "signals", unix))]
            listener: None,
        };
        if self.capture_stdout {
            rotator.capture_stdout()?;
        }
        if self.capture_stderr {
            rotator.capture_stderr()?;
        }
        #[cfg(all(feature = "signals", unix))]
        {
            if let Some(signal) = self.signal {
                rotator.listener = Some(Listener::spawn(signal, Arc::clone(&rotator.shared))?);
            }
        }
        Ok(rotator)
    }
}

/// Keeps a log file open and reopens it on a signal.
///
/// Each rotation opens the path anew (creating the file if it was moved away or deleted),
/// redirects all the attached outputs into the new file, registers it with the [`registry`] and
/// only then closes the old file. Rotations of one rotator never overlap.
///
/// Dropping the rotator [closes][Rotator::close] it.
#[derive(Debug)]
pub struct Rotator {
    shared: Arc<Shared>,
    #[cfg(all(feature = "signals", unix))]
    listener: Option<Listener>,
}

impl Rotator {
    /// The path of the rotated file.
    pub fn path(&self) -> &Path {
        self.shared.path()
    }

    /// A handle to trigger rotations from elsewhere.
    pub fn handle(&self) -> Handle {
        Handle(Arc::clone(&self.shared))
    }

    /// Rotates right now, as if the signal arrived.
    ///
    /// Does nothing once closed.
    pub fn rotate(&self) -> Result<(), Error> {
        self.shared.rotate()
    }

    /// How many rotations happened so far.
    pub fn rotations(&self) -> u64 {
        self.shared.state().rotations
    }

    /// Starts writing the process' standard output into the log file, now and after each
    /// rotation.
    ///
    /// This is a process-wide effect. The original output is restored on close.
    pub fn capture_stdout(&self) -> Result<(), Error> {
        self.shared.capture(Stream::Stdout)
    }

    /// Starts writing the process' standard error output into the log file, now and after each
    /// rotation.
    ///
    /// This is a process-wide effect. The original output is restored on close.
    pub fn capture_stderr(&self) -> Result<(), Error> {
        self.shared.capture(Stream::Stderr)
    }

    /// Has the rotator been closed already?
    pub fn is_closed(&self) -> bool {
        self.shared.state().file.is_none()
    }

    /// Stops listening for the signal and closes the file.
    ///
    /// A rotation in progress is finished first. Captured standard streams are given back.
    /// Closing again does nothing.
    pub fn close(&mut self) {
        #[cfg(all(feature = "signals", unix))]
        {
            if let Some(listener) = self.listener.take() {
                listener.stop();
            }
        }
        self.shared.close();
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Triggers rotations of a [`Rotator`] from other places.
///
/// This is the software counterpart of the signal, usable where signals aren't. Once the rotator
/// is closed, the handle does nothing.
#[derive(Clone, Debug)]
pub struct Handle(Arc<Shared>);

impl Handle {
    /// Rotates the file, waiting for any rotation in progress first.
    pub fn rotate(&self) -> Result<(), Error> {
        self.0.rotate()
    }
}

/// Writes the [`default_output`][crate::default_output] and the loggers into the file, reopening
/// it on `SIGHUP`.
///
/// ```rust
/// # fn main() -> Result<(), std::io::Error> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("app.log");
/// use std::sync::Arc;
///
/// use logrot::{Output, SetOutput};
///
/// let audit = Output::new();
/// let _rotator = logrot::write_to(&path, vec![Arc::new(audit.clone()) as Arc<dyn SetOutput>])?;
/// // Or with just the default output
/// # let path = dir.path().join("other.log");
/// let _other = logrot::write_to(&path, None)?;
/// # Ok(())
/// # }
/// ```
pub fn write_to<P, L>(path: P, loggers: L) -> Result<Rotator, Error>
where
    P: Into<PathBuf>,
    L: IntoIterator<Item = Arc<dyn SetOutput>>,
{
    Builder::new(path).loggers(loggers).start()
}

/// Like [`write_to`], but captures standard output and standard error too.
pub fn write_all_to<P, L>(path: P, loggers: L) -> Result<Rotator, Error>
where
    P: Into<PathBuf>,
    L: IntoIterator<Item = Arc<dyn SetOutput>>,
{
    Builder::new(path)
        .loggers(loggers)
        .capture_stdout(true)
        .capture_stderr(true)
        .start()
}
