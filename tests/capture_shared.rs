//! Two rotators capturing the same standard stream.
//!
//! This replaces the process-wide descriptors, so there's a single test in this binary.

#![cfg(unix)]

use std::fs;
use std::io::{stdout, Write};
use std::path::Path;

use logrot::{Builder, OnFailure, Rotator};

fn capturing(path: &Path) -> Rotator {
    Builder::new(path)
        .no_signal()
        .default_output(false)
        .on_open_failure(OnFailure::Return)
        .capture_stdout(true)
        .start()
        .unwrap()
}

fn print(data: &[u8]) {
    // Going through the std handle directly, the print macros are captured by the test harness.
    stdout().write_all(data).unwrap();
    stdout().flush().unwrap();
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn stream_never_goes_back_to_superseded_file() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.log");
    let b_path = dir.path().join("b.log");
    let a_rotated = dir.path().join("a.log.1");

    let mut a = capturing(&a_path);
    print(b"first\n");
    // The latest capture takes over
    let mut b = capturing(&b_path);
    print(b"second\n");

    // The one not owning the stream rotates, the stream stays where it is
    fs::rename(&a_path, &a_rotated).unwrap();
    a.rotate().unwrap();
    print(b"third\n");

    // Handed back to the other rotator, into its current file
    b.close();
    print(b"X\n");

    assert_eq!("first\n", read(&a_rotated));
    assert_eq!("second\nthird\n", read(&b_path));
    assert_eq!("X\n", read(&a_path));

    // The last one gives the process its original stream back
    a.close();
    print(b"restored\n");
    assert_eq!("X\n", read(&a_path));
    assert_eq!("first\n", read(&a_rotated));
    assert_eq!("second\nthird\n", read(&b_path));
}
