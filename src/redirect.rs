use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use log::warn;

use crate::file::LogFile;
use crate::output::{default_output, SetOutput};
use crate::stdio::Captured;

/// Everything a rotator points at its current file.
#[derive(Default)]
pub(crate) struct Targets {
    pub(crate) default_output: bool,
    pub(crate) loggers: Vec<Arc<dyn SetOutput>>,
    pub(crate) stdout: Option<Captured>,
    pub(crate) stderr: Option<Captured>,
}

impl Targets {
    /// Points all the targets at the file.
    ///
    /// The file must be open already and stay open until this returns. Applying the same file
    /// again changes nothing.
    pub(crate) fn apply(&self, file: &LogFile) {
        if self.default_output {
            default_output().set_output(file);
        }
        for logger in &self.loggers {
            logger.set_output(file);
        }
        for captured in self.stdout.iter().chain(&self.stderr) {
            // The descriptor is open (we hold it), so this fails only on a broken process state.
            // Nothing better to do than tell and keep the rest working.
            if let Err(e) = captured.redirect(file) {
                warn!(
                    "Failed to redirect {:?} into {}: {}",
                    captured,
                    file.path().display(),
                    e
                );
            }
        }
    }

    /// Gives the standard streams back to whatever they were before capturing.
    pub(crate) fn release(&mut self) {
        for captured in self.stdout.take().into_iter().chain(self.stderr.take()) {
            captured.release();
        }
    }
}

impl Debug for Targets {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        fmt.debug_struct("Targets")
            .field("default_output", &self.default_output)
            .field("loggers", &self.loggers.len())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::file::DEFAULT_MODE;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LogFile>>);

    impl SetOutput for Recorder {
        fn set_output(&self, file: &LogFile) {
            self.0.lock().unwrap().push(file.clone());
        }
    }

    #[test]
    fn applies_to_every_logger() {
        let dir = tempfile::tempdir().unwrap();
        let file = LogFile::open(dir.path().join("r.log"), DEFAULT_MODE).unwrap();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let targets = Targets {
            loggers: vec![a.clone() as Arc<dyn SetOutput>, b.clone()],
            ..Targets::default()
        };
        targets.apply(&file);
        targets.apply(&file);
        for recorder in &[a, b] {
            let seen = recorder.0.lock().unwrap();
            assert_eq!(2, seen.len());
            assert!(seen.iter().all(|f| f.ptr_eq(&file)));
        }
    }
}
