// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Copying a tree to a new location.

use core::ops::Range;

use log::trace;

use super::Fdt;
use crate::error::{FdtError, FdtErrorKind};
use crate::{Assumptions, Result};

impl Fdt<'_> {
    /// Copies the tree, exactly `totalsize` bytes of it, to the start of
    /// `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::NoSpace`] if `dest` is shorter than
    /// `totalsize`, in which case `dest` is left untouched.
    pub fn move_to(&self, dest: &mut [u8]) -> Result<()> {
        let totalsize = self.totalsize() as usize;
        if dest.len() < totalsize {
            return Err(FdtError::new(FdtErrorKind::NoSpace, 0));
        }
        let src = self
            .data
            .get(..totalsize)
            .ok_or(FdtError::new(FdtErrorKind::Truncated, 4))?;

        trace!("moving {totalsize} byte FDT into a {} byte buffer", dest.len());
        dest[..totalsize].copy_from_slice(src);
        Ok(())
    }
}

/// Moves the tree starting at `buf[src..]` to `buf[dest]`, within the same
/// buffer.
///
/// The source and destination may overlap. The tree's header is checked
/// with `assume` before anything is copied.
///
/// # Errors
///
/// Returns [`FdtErrorKind::BadOffset`] if `src` or `dest` lie outside `buf`,
/// [`FdtErrorKind::NoSpace`] if `dest` is shorter than the tree, or any
/// error reported by [`check_header`](super::check_header). The buffer is
/// left untouched on error.
pub fn relocate(buf: &mut [u8], src: usize, dest: Range<usize>, assume: Assumptions) -> Result<()> {
    let tree = buf
        .get(src..)
        .ok_or(FdtError::new(FdtErrorKind::BadOffset, src))?;
    let fdt = Fdt::with_assumptions(tree, assume)?;
    let totalsize = fdt.totalsize() as usize;

    if dest.start > dest.end || dest.end > buf.len() {
        return Err(FdtError::new(FdtErrorKind::BadOffset, dest.start));
    }
    if dest.len() < totalsize {
        return Err(FdtError::new(FdtErrorKind::NoSpace, dest.start));
    }
    let src_end = src
        .checked_add(totalsize)
        .filter(|&end| end <= buf.len())
        .ok_or(FdtError::new(FdtErrorKind::Truncated, 4))?;

    trace!("relocating {totalsize} byte FDT from {src:#x} to {:#x}", dest.start);
    buf.copy_within(src..src_end, dest.start);
    Ok(())
}
