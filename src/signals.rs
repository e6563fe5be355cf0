use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::Error;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use signal_hook::iterator::{Handle as SignalsHandle, Signals};
use signal_hook::low_level::signal_name;

use crate::rotator::Shared;

pub(crate) const DEFAULT_SIGNAL: libc::c_int = signal_hook::consts::SIGHUP;

/// A background thread rotating a file whenever the signal comes.
///
/// # Notes
///
/// * Under the hood, this uses the [`signal-hook`](https://crates.io/crates/signal-hook) crate,
///   so the same signal can be shared with other actions (to eg. also reload a configuration) and
///   with other rotators.
/// * Signals arriving while a rotation is in progress are coalesced by the OS and signal-hook into
///   at most one further rotation.
/// * Rotations run one after another on this thread, in the order the signals got noticed.
pub(crate) struct Listener {
    handle: SignalsHandle,
    thread: JoinHandle<()>,
}

impl Listener {
    pub(crate) fn spawn(signal: libc::c_int, shared: Arc<Shared>) -> Result<Self, Error> {
        let mut signals = Signals::new([signal])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name(format!("logrot-{}", signal))
            .spawn(move || {
                // Ends once the handle gets closed.
                for signal in signals.forever() {
                    info!(
                        "{} received - rotating log file handle on {}",
                        signal_name(signal).unwrap_or("signal"),
                        shared.path().display()
                    );
                    if let Err(e) = shared.rotate() {
                        warn!(
                            "Keeping the previous log file for {}: {}",
                            shared.path().display(),
                            e
                        );
                    }
                }
            })?;
        Ok(Listener { handle, thread })
    }

    /// Stops listening and waits for the thread to finish.
    ///
    /// A rotation already in progress completes first.
    pub(crate) fn stop(self) {
        self.handle.close();
        if self.thread.join().is_err() {
            warn!("Signal listener thread panicked");
        }
    }
}

impl Debug for Listener {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        fmt.debug_struct("Listener")
            .field("thread", &self.thread.thread().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use crate::{Builder, Output, Rotator};

    fn raise(signal: libc::c_int) {
        unsafe { libc::kill(libc::getpid(), signal) };
    }

    /// Waits (a bounded time) for the rotator to reach the number of rotations.
    ///
    /// Signals may arrive into another thread, so there's no telling exactly when.
    fn wait_for(rotator: &Rotator, rotations: u64) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while rotator.rotations() < rotations {
            assert!(Instant::now() < deadline, "Rotation didn't happen");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn start(path: &Path, signal: libc::c_int, output: &Output) -> Rotator {
        Builder::new(path)
            .signal(signal)
            .default_output(false)
            .logger(output.clone())
            .start()
            .unwrap()
    }

    // Each test uses its own signal, they run in parallel within the same process.

    #[test]
    fn signal_rotates_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut output = Output::new();
        let rotator = start(&path, libc::SIGUSR1, &output);
        for i in 1..=5 {
            write!(output, "{}", i).unwrap();
            fs::rename(&path, dir.path().join(format!("app.log.{}", i))).unwrap();
            raise(libc::SIGUSR1);
            wait_for(&rotator, i);
            // Exactly one rotation per signal
            assert_eq!(i, rotator.rotations());
        }
        for i in 1..=5 {
            let content = fs::read_to_string(dir.path().join(format!("app.log.{}", i))).unwrap();
            assert_eq!(i.to_string(), content);
        }
        assert_eq!("", fs::read_to_string(&path).unwrap());
    }

    #[test]
    fn shared_signal_rotates_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.log");
        let path_b = dir.path().join("b.log");
        let mut out_a = Output::new();
        let mut out_b = Output::new();
        let a = start(&path_a, libc::SIGUSR2, &out_a);
        let b = start(&path_b, libc::SIGUSR2, &out_b);
        // Only one of them can be rotated by hand, the signal goes to both
        b.rotate().unwrap();

        fs::rename(&path_a, dir.path().join("a.log.1")).unwrap();
        fs::rename(&path_b, dir.path().join("b.log.1")).unwrap();
        raise(libc::SIGUSR2);
        wait_for(&a, 1);
        wait_for(&b, 2);
        write!(out_a, "A").unwrap();
        write!(out_b, "B").unwrap();

        assert_eq!(1, a.rotations());
        assert_eq!(2, b.rotations());
        assert_eq!("A", fs::read_to_string(&path_a).unwrap());
        assert_eq!("B", fs::read_to_string(&path_b).unwrap());
        assert_eq!("", fs::read_to_string(dir.path().join("a.log.1")).unwrap());
    }

    #[test]
    fn close_stops_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let output = Output::new();
        let mut rotator = start(&path, libc::SIGWINCH, &output);
        raise(libc::SIGWINCH);
        wait_for(&rotator, 1);
        rotator.close();
        assert!(rotator.is_closed());
        assert!(output.current().unwrap().is_closed());
    }
}
