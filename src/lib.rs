#![doc(html_root_url = "https://docs.rs/logrot/0.1.0/logrot/")]
#![warn(missing_docs)]

//! Log file rotation driven by a signal.
//!
//! The main motivation is integration of logging with logrotate. Usually, when logrotate wants to
//! rotate log files, it moves the current log file to a new place and signals the program (most
//! often with `SIGHUP`). For the new messages to appear in a new file at the original path, the
//! running program needs to open the file again and start writing there.
//!
//! A [`Rotator`] takes care of one such path. It opens the file, points all the attached outputs
//! (the [`default_output`], any other [`SetOutput`] implementors and optionally the process'
//! standard output and error) into it and whenever the signal comes, it opens the path anew,
//! switches everything over and closes the old file. No write gets lost or ends up in a closed
//! file in between.
//!
//! ```rust
//! # fn main() -> Result<(), std::io::Error> {
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("app.log");
//! use log::info;
//!
//! // Reopened on SIGHUP from now on
//! let _rotator = logrot::write_to(&path, None)?;
//! simple_logging::log_to(logrot::default_output(), log::LevelFilter::Debug);
//! info!("Hey, it's logging");
//! # Ok(())
//! # }
//! ```
//!
//! Other code in the program can get hold of the file currently in use for a path through the
//! [`registry`].
//!
//! # Features
//!
//! The `signals` feature (on by default) brings in the signal listening. Without it, rotations are
//! triggered only through [`Rotator::rotate`] or a [`Handle`], which is also the way to go in
//! environments without signals.
//!
//! # Failures
//!
//! By default, failing to open the log file (initially or on rotation) prints the error and
//! terminates the process. Use [`OnFailure::Return`] to get the error instead.

mod file;
mod output;
mod redirect;
pub mod registry;
mod rotator;
#[cfg(all(feature = "signals", unix))]
mod signals;
mod stdio;

pub use crate::file::{LogFile, DEFAULT_MODE};
pub use crate::output::{default_output, Output, OutputLock, SetOutput};
pub use crate::rotator::{write_all_to, write_to, Builder, Handle, OnFailure, Rotator};
