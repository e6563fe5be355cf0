//! Example of rotating a log file on SIGHUP
//!
//! This program keeps logging messages into a file `log.txt`, and its standard output too. If it
//! receives SIGHUP, it reopens the file.
//!
//! To demonstrate the effect:
//!
//! * Run the program.
//! * Observe `log.txt` appeared and it is growing.
//! * Move the `log.txt` to some other file (`mv log.txt log2.txt`).
//! * See that the file is still growing, even when under different name.
//! * Send `SIGHUP` to the program (`killall -SIGHUP rotate_log`).
//! * See `log2.txt` no longer grows, new `log.txt` appeared and grows.
//!
//! # Features
//!
//! This relies on the `signals` feature.

use std::io::Error;
use std::thread;
use std::time::Duration;

use log::{info, LevelFilter};

/// Keeps logging, one line per second.
fn log_forever() -> ! {
    let mut no = 1u128;
    loop {
        thread::sleep(Duration::from_secs(1));
        info!("Tick no {}", no);
        println!("Tock no {}", no);
        no += 1;
    }
}

fn main() -> Result<(), Error> {
    // Make sure it gets reopened on SIGHUP, together with stdout and stderr
    let _rotator = logrot::write_all_to("log.txt", None)?;
    // Pass it to the logging facility
    simple_logging::log_to(logrot::default_output(), LevelFilter::Debug);
    log_forever()
}
