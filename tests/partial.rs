//! Test that writes split into many small pieces survive a rotation after each of the pieces.

use std::fs;
use std::io::{Error, Write};
use std::iter;
use std::path::{Path, PathBuf};

use logrot::{Builder, Handle, OnFailure, Output, Rotator};
use partial_io::{PartialOp, PartialWrite};
use tempfile::TempDir;

/// Moves the file away and rotates after each operation, the way logrotate would (only much more
/// often). Each piece of data then lands in a different file.
struct RotateAfterWrite<W> {
    handle: Handle,
    dir: PathBuf,
    rotations: usize,
    fd: W,
}

impl<W: Write> Write for RotateAfterWrite<W> {
    fn flush(&mut self) -> Result<(), Error> {
        self.fd.flush()
    }
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let result = self.fd.write(buf);
        self.rotations += 1;
        fs::rename(
            self.dir.join("app.log"),
            self.dir.join(format!("app.log.{}", self.rotations)),
        )?;
        self.handle.rotate()?;
        result
    }
}

type Writer = PartialWrite<RotateAfterWrite<Output>>;

// Get a writer that writes a single byte at a time and rotates after each.
fn provide_writer() -> (Writer, Rotator, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let output = Output::new();
    let rotator = Builder::new(dir.path().join("app.log"))
        .no_signal()
        .default_output(false)
        .on_open_failure(OnFailure::Return)
        .logger(output.clone())
        .start()
        .unwrap();
    let writer = RotateAfterWrite {
        handle: rotator.handle(),
        dir: dir.path().to_owned(),
        rotations: 0,
        fd: output,
    };
    let partial = PartialWrite::new(writer, iter::repeat(PartialOp::Limited(1)));
    (partial, rotator, dir)
}

/// Contents of all the rotated files, oldest first.
fn history(dir: &Path, rotations: u64) -> Vec<String> {
    (1..=rotations)
        .map(|i| fs::read_to_string(dir.join(format!("app.log.{}", i))).unwrap())
        .collect()
}

#[test]
fn write_sanity_check() {
    let (mut writer, rotator, dir) = provide_writer();
    assert_eq!(1, writer.write(b"hello").unwrap());
    assert_eq!(1, writer.write(b"hello").unwrap());
    assert_eq!(2, rotator.rotations());
    assert_eq!(vec!["h", "h"], history(dir.path(), 2));
    // The current file is fresh
    assert_eq!("", fs::read_to_string(dir.path().join("app.log")).unwrap());
}

#[test]
fn write_all() {
    let (mut writer, rotator, dir) = provide_writer();
    writer.write_all(b"hello").unwrap();
    assert_eq!(5, rotator.rotations());
    let history = history(dir.path(), 5);
    assert_eq!(vec!["h", "e", "l", "l", "o"], history);
    assert_eq!("hello", history.concat());
}

#[test]
#[allow(clippy::write_literal)] // The argument is useless, but we want to test it.
fn format() {
    let (mut writer, rotator, dir) = provide_writer();
    write!(&mut writer, "Hello {}", 42).unwrap();
    let rotations = rotator.rotations();
    assert_eq!(8, rotations);
    assert_eq!("Hello 42", history(dir.path(), rotations).concat());
}

#[test]
fn closed_rotator_stops_writes() {
    let (mut writer, mut rotator, dir) = provide_writer();
    writer.write_all(b"ab").unwrap();
    rotator.close();
    // The file is gone, but the rename and the (no-op) rotation still happen
    assert!(writer.write(b"c").is_err());
    assert_eq!("ab", history(dir.path(), 2).concat());
}
