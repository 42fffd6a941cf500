// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Loading blobs from files into 8-byte aligned memory.

use std::fs;
use std::path::Path;

use log::debug;
use zerocopy::IntoBytes;

use crate::error::Error;

/// The contents of a device tree blob file.
///
/// The bytes are backed by `u64` words, which gives them the alignment the
/// header check requires.
pub struct DtbFile {
    words: Vec<u64>,
    len: usize,
}

impl DtbFile {
    /// Reads the whole file at `path`.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let bytes = fs::read(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        debug!("read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::from_bytes(&bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(size_of::<u64>())];
        words.as_mut_bytes()[..bytes.len()].copy_from_slice(bytes);
        Self {
            words,
            len: bytes.len(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.words.as_bytes()[..self.len]
    }
}
