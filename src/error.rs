// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::io;
use std::path::PathBuf;

use dtboverlay_device_tree::{FdtError, OverlayError};

/// An error which ends the program.
#[derive(Debug)]
pub enum Error {
    /// The command line couldn't be parsed.
    Usage(String),
    /// A file couldn't be read or written.
    Io { path: PathBuf, source: io::Error },
    /// The blob isn't a valid device tree.
    Fdt(FdtError),
    /// The overlay couldn't be applied or removed.
    Overlay(OverlayError<io::Error>),
}

impl Error {
    /// Returns the errno-style code libfdt would report for this error, if
    /// it came from the device tree engine.
    pub fn fdt_code(&self) -> Option<i32> {
        match self {
            Self::Fdt(e) | Self::Overlay(OverlayError::Fdt(e)) => Some(-e.kind.code()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Fdt(e) => write!(f, "invalid device tree: {e}"),
            Self::Overlay(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Usage(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Fdt(e) => Some(e),
            Self::Overlay(e) => Some(e),
        }
    }
}

impl From<FdtError> for Error {
    fn from(e: FdtError) -> Self {
        Self::Fdt(e)
    }
}

impl From<OverlayError<io::Error>> for Error {
    fn from(e: OverlayError<io::Error>) -> Self {
        Self::Overlay(e)
    }
}
