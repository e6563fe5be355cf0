//! Process-wide registry of the log files currently in use.
//!
//! Every rotation registers the freshly opened file under its path, so unrelated code can ask for
//! "whatever is being written to `path` right now" and share the descriptor instead of opening
//! its own.
//!
//! The lock protects the map only. Files are opened outside of it, so a slow open doesn't stall
//! lookups of other paths.

use std::collections::HashMap;
use std::io::Error;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::file::{LogFile, DEFAULT_MODE};

fn files() -> MutexGuard<'static, HashMap<PathBuf, LogFile>> {
    static FILES: OnceLock<Mutex<HashMap<PathBuf, LogFile>>> = OnceLock::new();
    FILES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Returns the live file registered for the path, without opening anything.
///
/// A registered file that has been closed since counts as not registered.
pub fn lookup<P: AsRef<Path>>(path: P) -> Option<LogFile> {
    files()
        .get(path.as_ref())
        .filter(|file| !file.is_closed())
        .cloned()
}

/// Returns the file registered for the path, opening and registering it if there's none.
///
/// The file returned is the one in use at the moment of the call. If a [`Rotator`] takes care of
/// the path, a later rotation replaces the registered file and closes this one, so hold onto the
/// result only as long as writing to an older file is acceptable (or look it up again).
///
/// If two threads race to open the same path, both get whichever file got registered first.
///
/// [`Rotator`]: crate::Rotator
pub fn open<P: AsRef<Path>>(path: P) -> Result<LogFile, Error> {
    let path = path.as_ref();
    if let Some(file) = lookup(path) {
        return Ok(file);
    }
    let opened = LogFile::open(path, DEFAULT_MODE)?;
    let mut files = files();
    let entry = files
        .entry(path.to_owned())
        .or_insert_with(|| opened.clone());
    if entry.is_closed() {
        *entry = opened;
    }
    Ok(entry.clone())
}

/// Makes the file the registered one for the path, replacing whatever was there.
pub fn register<P: Into<PathBuf>>(path: P, file: LogFile) {
    files().insert(path.into(), file);
}

/// Opens a new file for the path and registers it, regardless of what was registered.
pub(crate) fn open_fresh(path: &Path, mode: u32) -> Result<LogFile, Error> {
    let file = LogFile::open(path, mode)?;
    register(path, file.clone());
    Ok(file)
}
