// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bounds checks on blob offsets and blocks.

use super::Fdt;
use crate::Assumptions;

/// Returns whether `off` lies within `[hdrsize, totalsize]`.
#[must_use]
pub fn check_off(hdrsize: usize, totalsize: u32, off: u32) -> bool {
    off as usize >= hdrsize && off <= totalsize
}

/// Returns whether the block `[base, base + size)` lies within
/// `[hdrsize, totalsize]`. Overflow of `base + size` counts as out of
/// bounds.
#[must_use]
pub fn check_block(hdrsize: usize, totalsize: u32, base: u32, size: u32) -> bool {
    if !check_off(hdrsize, totalsize, base) {
        return false;
    }
    match base.checked_add(size) {
        Some(end) => check_off(hdrsize, totalsize, end),
        None => false,
    }
}

impl<'a> Fdt<'a> {
    /// Returns the `len` bytes at `offset` in the structure block.
    ///
    /// Returns `None` if the range falls outside the blob or, for version 17
    /// trees, outside the structure block. The range is always checked
    /// against the buffer itself, whatever the assumptions.
    #[must_use]
    pub fn struct_range(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        self.struct_tail(offset)?.get(..len)
    }

    /// Returns all bytes of the structure block from `offset` onwards.
    pub(crate) fn struct_tail(&self, offset: usize) -> Option<&'a [u8]> {
        let header = self.header();
        let struct_start = header.off_dt_struct() as usize;
        let start = struct_start.checked_add(offset)?;

        let mut end = self.data.len();
        if !self.can_assume(Assumptions::VALID_INPUT) {
            end = end.min(header.totalsize() as usize);
        }
        if self.can_assume(Assumptions::LATEST) || header.version() >= 0x11 {
            end = end.min(struct_start.saturating_add(header.size_dt_struct() as usize));
        }

        self.data.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert!(check_off(40, 64, 40));
        assert!(check_off(40, 64, 64));
        assert!(!check_off(40, 64, 39));
        assert!(!check_off(40, 64, 65));
    }

    #[test]
    fn blocks() {
        assert!(check_block(40, 64, 48, 16));
        assert!(check_block(40, 64, 64, 0));
        assert!(!check_block(40, 64, 48, 17));
        assert!(!check_block(40, 64, 32, 4));
        assert!(!check_block(40, u32::MAX, 48, u32::MAX));
    }
}
