// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io::{self, Write};

use spin::{Once, mutex::SpinMutex};

/// Where diagnostics go. Standard output is reserved for command results.
pub type ConsoleImpl = io::Stderr;

static CONSOLE: Once<SharedConsole<ConsoleImpl>> = Once::new();

/// A console guarded by a spin mutex so that it may be shared between threads.
pub struct SharedConsole<T: Send> {
    pub console: SpinMutex<T>,
}

impl<T: Send> SharedConsole<T> {
    pub fn new(console: T) -> Self {
        Self {
            console: SpinMutex::new(console),
        }
    }
}

impl<T: Send + Write> Write for &SharedConsole<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.console.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.console.lock().flush()
    }
}

/// Initialises the shared console.
///
/// Later calls return the console created by the first one.
pub fn init(console: ConsoleImpl) -> &'static SharedConsole<ConsoleImpl> {
    CONSOLE.call_once(|| SharedConsole::new(console))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_forwarded() {
        let console = SharedConsole::new(Vec::new());
        write!(&console, "abc").unwrap();
        (&console).flush().unwrap();
        assert_eq!(*console.console.lock(), b"abc");
    }

    #[test]
    fn init_is_idempotent() {
        let first = init(io::stderr());
        let second = init(io::stderr());
        assert!(core::ptr::eq(first, second));
    }
}
