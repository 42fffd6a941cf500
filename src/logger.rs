// Copyright 2024 Google LLC.
// This project is dual-licensed under Apache 2.0 and MIT terms.
// See LICENSE-APACHE and LICENSE-MIT for details.

use crate::console::SharedConsole;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

impl<T: Send + Write> Log for SharedConsole<T> {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let console = &mut *self.console.lock();
        writeln!(console, "[{}] {}", record.level(), record.args()).ok();
    }

    fn flush(&self) {
        self.console.lock().flush().ok();
    }
}

/// Initialises the logger with the given shared console.
pub fn init(console: &'static impl Log, max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(console)?;
    log::set_max_level(max_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn formats_level_and_message() {
        let console = SharedConsole::new(Vec::new());
        console.log(
            &Record::builder()
                .level(Level::Error)
                .args(format_args!("bad magic"))
                .build(),
        );
        assert_eq!(*console.console.lock(), b"[ERROR] bad magic\n");
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn write_errors_are_dropped() {
        let console = SharedConsole::new(Closed);
        console.log(
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("lost"))
                .build(),
        );
        Log::flush(&console);
    }
}
