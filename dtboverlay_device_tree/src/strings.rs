// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lookup in an FDT strings block.

use crate::fdt::Fdt;

/// Returns the offset of the first occurrence of `needle`, including its NUL
/// terminator, in the string table `strtab`.
///
/// Matches may start anywhere, so a needle can be found as the tail of a
/// longer string.
///
/// # Examples
///
/// ```
/// use dtboverlay_device_tree::find_string;
///
/// let strtab = b"compatible\0reg\0status\0";
/// assert_eq!(find_string(strtab, "reg"), Some(11));
/// assert_eq!(find_string(strtab, "tus"), Some(18));
/// assert_eq!(find_string(strtab, "interrupts"), None);
/// ```
#[must_use]
pub fn find_string(strtab: &[u8], needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    let len = needle.len() + 1;
    strtab
        .windows(len)
        .position(|window| window[..needle.len()] == *needle && window[needle.len()] == 0)
}

impl Fdt<'_> {
    /// Returns the offset of `needle` in this tree's strings block.
    #[must_use]
    pub fn find_string(&self, needle: &str) -> Option<usize> {
        find_string(self.strings_block(), needle)
    }
}
