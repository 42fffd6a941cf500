// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A read-only API for validating and traversing a [Flattened Device Tree (FDT)].
//!
//! This module provides the [`Fdt`] struct, which is the entry point for
//! validating and walking an FDT blob. The API performs no memory allocation
//! and provides a zero-copy view of the FDT data.
//!
//! Two levels of API are offered. The low level one works on plain structure
//! block offsets, the way libfdt does: [`Fdt::next_tag`], [`Fdt::next_node`],
//! [`Fdt::first_subnode`], [`Fdt::next_subnode`] and friends. The high level
//! one wraps those offsets in [`FdtNode`] and [`FdtProperty`] values with
//! iterators over children and properties.
//!
//! [Flattened Device Tree (FDT)]: https://devicetree-specification.readthedocs.io/en/latest/chapter5-flattened-format.html

mod bounds;
mod header;
mod node;
mod property;
mod relocate;
mod tag;

use core::ffi::CStr;
use core::fmt;

use log::{debug, error};
use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian;

use crate::error::{FdtError, FdtErrorKind};
use crate::{Assumptions, Result};
pub use bounds::{check_block, check_off};
pub(crate) use header::FdtHeader;
pub use header::{
    FDT_FIRST_SUPPORTED_VERSION, FDT_LAST_COMPATIBLE_VERSION, FDT_LAST_SUPPORTED_VERSION,
    FDT_V1_SIZE, FDT_V2_SIZE, FDT_V3_SIZE, FDT_V16_SIZE, FDT_V17_SIZE, header_size_for_version,
};
pub use node::FdtNode;
pub use property::FdtProperty;
pub use relocate::relocate;
pub use tag::{
    FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_NOP, FDT_PROP, FDT_TAGSIZE, FdtToken,
};

/// The magic number every FDT blob starts with.
pub const FDT_MAGIC: u32 = 0xd00d_feed;

/// Required alignment of the blob's base address.
const FDT_ALIGNMENT: usize = 8;

/// Largest `totalsize` accepted by the header check.
const FDT_MAX_TOTALSIZE: u32 = i32::MAX.unsigned_abs();

/// A flattened device tree.
///
/// An `Fdt` can only be obtained through [`Fdt::new`] or
/// [`Fdt::with_assumptions`], both of which run [`check_header`] first.
#[derive(Clone, Copy)]
pub struct Fdt<'a> {
    pub(crate) data: &'a [u8],
    assume: Assumptions,
}

/// Checks that `data` starts with a well-formed FDT header.
///
/// The checks run in a fixed order and the first failure is returned:
///
/// 1. the buffer is 8-byte aligned ([`FdtErrorKind::Alignment`]),
/// 2. the magic number matches ([`FdtErrorKind::BadMagic`]),
/// 3. the version is supported, unless [`Assumptions::LATEST`]
///    ([`FdtErrorKind::BadVersion`]),
/// 4. the total size and the memory reservation map, structure block and
///    strings block all lie within the blob, unless
///    [`Assumptions::VALID_DTB`] ([`FdtErrorKind::Truncated`]).
///
/// A buffer too short to hold the header fields at all is always
/// [`FdtErrorKind::Truncated`].
///
/// # Errors
///
/// Returns the error of the first failed check.
pub fn check_header(data: &[u8], assume: Assumptions) -> Result<()> {
    if !data.as_ptr().addr().is_multiple_of(FDT_ALIGNMENT) {
        return Err(reject(FdtErrorKind::Alignment, 0, "base address is misaligned"));
    }

    let magic = big_endian::U32::ref_from_prefix(data)
        .map(|(val, _)| val.get())
        .map_err(|_e| reject(FdtErrorKind::Truncated, 0, "buffer too small for magic"))?;
    if magic != FDT_MAGIC {
        return Err(reject(FdtErrorKind::BadMagic, 0, "bad magic"));
    }

    let (header, _remaining_bytes) = FdtHeader::ref_from_prefix(data)
        .map_err(|_e| reject(FdtErrorKind::Truncated, 0, "buffer too small for header"))?;

    let version = header.version();
    if !assume.can_assume(Assumptions::LATEST) {
        if version < FDT_FIRST_SUPPORTED_VERSION
            || header.last_comp_version() > FDT_LAST_SUPPORTED_VERSION
        {
            return Err(reject(FdtErrorKind::BadVersion, 20, "unsupported version"));
        }
        if version < header.last_comp_version() {
            return Err(reject(
                FdtErrorKind::BadVersion,
                20,
                "version older than last compatible version",
            ));
        }
    }

    let hdrsize = if assume.can_assume(Assumptions::LATEST) {
        FDT_V17_SIZE
    } else {
        header_size_for_version(version)
    };

    if !assume.can_assume(Assumptions::VALID_DTB) {
        let totalsize = header.totalsize();
        if (totalsize as usize) < hdrsize || totalsize > FDT_MAX_TOTALSIZE {
            return Err(reject(FdtErrorKind::Truncated, 4, "bad totalsize"));
        }
        if totalsize as usize > data.len() {
            return Err(reject(FdtErrorKind::Truncated, 4, "buffer shorter than totalsize"));
        }

        if !check_off(hdrsize, totalsize, header.off_mem_rsvmap()) {
            return Err(reject(FdtErrorKind::Truncated, 16, "memory reservation map out of bounds"));
        }

        let struct_ok = if !assume.can_assume(Assumptions::LATEST) && version < 17 {
            check_off(hdrsize, totalsize, header.off_dt_struct())
        } else {
            check_block(
                hdrsize,
                totalsize,
                header.off_dt_struct(),
                header.size_dt_struct(),
            )
        };
        if !struct_ok {
            return Err(reject(FdtErrorKind::Truncated, 8, "structure block out of bounds"));
        }

        if !check_block(
            hdrsize,
            totalsize,
            header.off_dt_strings(),
            header.size_dt_strings(),
        ) {
            return Err(reject(FdtErrorKind::Truncated, 12, "strings block out of bounds"));
        }
    }

    Ok(())
}

fn reject(kind: FdtErrorKind, offset: usize, reason: &str) -> FdtError {
    debug!("rejecting FDT header: {reason} ({kind})");
    FdtError::new(kind, offset)
}

impl<'a> Fdt<'a> {
    /// Creates a new `Fdt` from the given byte slice, performing every check.
    ///
    /// The slice may be longer than the tree; anything past `totalsize` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns the error reported by [`check_header`].
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::with_assumptions(data, Assumptions::empty())
    }

    /// Creates a new `Fdt` from the given byte slice, skipping the checks
    /// covered by `assume`.
    ///
    /// # Errors
    ///
    /// Returns the error reported by [`check_header`].
    pub fn with_assumptions(data: &'a [u8], assume: Assumptions) -> Result<Self> {
        check_header(data, assume)?;

        let fdt = Fdt { data, assume };
        // The header itself stays readable even if VALID_DTB let a bogus
        // totalsize through.
        let end = (fdt.header().totalsize() as usize).max(size_of::<FdtHeader>());
        let data = data.get(..end).unwrap_or(data);
        Ok(Fdt { data, assume })
    }

    /// Returns the header of the device tree.
    pub(crate) fn header(&self) -> &'a FdtHeader {
        let (header, _remaining_bytes) = FdtHeader::ref_from_prefix(self.data)
            .expect("check_header() checks if the slice is at least as big as the header");
        header
    }

    /// Returns the bytes of the tree, `totalsize` long unless the header
    /// check was relaxed.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the assumptions this view was created with.
    #[must_use]
    pub fn assumptions(&self) -> Assumptions {
        self.assume
    }

    pub(crate) fn can_assume(&self, assumption: Assumptions) -> bool {
        self.assume.can_assume(assumption)
    }

    /// Returns the magic number, always [`FDT_MAGIC`].
    #[must_use]
    pub fn magic(&self) -> u32 {
        self.header().magic()
    }

    /// Returns the total size of the tree as declared in the header.
    #[must_use]
    pub fn totalsize(&self) -> u32 {
        self.header().totalsize()
    }

    /// Returns the format version of the tree.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.header().version()
    }

    /// Returns the oldest version the tree is backwards compatible with.
    #[must_use]
    pub fn last_comp_version(&self) -> u32 {
        self.header().last_comp_version()
    }

    /// Returns the physical ID of the boot CPU.
    #[must_use]
    pub fn boot_cpuid_phys(&self) -> u32 {
        self.header().boot_cpuid_phys()
    }

    /// Returns the offset of the structure block.
    #[must_use]
    pub fn off_dt_struct(&self) -> u32 {
        self.header().off_dt_struct()
    }

    /// Returns the size of the structure block.
    #[must_use]
    pub fn size_dt_struct(&self) -> u32 {
        self.header().size_dt_struct()
    }

    /// Returns the offset of the strings block.
    #[must_use]
    pub fn off_dt_strings(&self) -> u32 {
        self.header().off_dt_strings()
    }

    /// Returns the size of the strings block.
    #[must_use]
    pub fn size_dt_strings(&self) -> u32 {
        self.header().size_dt_strings()
    }

    /// Returns the offset of the memory reservation map.
    #[must_use]
    pub fn off_mem_rsvmap(&self) -> u32 {
        self.header().off_mem_rsvmap()
    }

    /// Returns the size of the header for this tree's version.
    #[must_use]
    pub fn header_size(&self) -> usize {
        if self.can_assume(Assumptions::LATEST) {
            FDT_V17_SIZE
        } else {
            header_size_for_version(self.version())
        }
    }

    /// Checks that the blocks are laid out in the order memory reservation
    /// map, structure block, strings block, without overlapping each other or
    /// the header.
    ///
    /// The header check doesn't require this order; it is only expected by
    /// code which rewrites trees in place. Always succeeds under
    /// [`Assumptions::LIBFDT_ORDER`].
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadLayout`] if the blocks are misordered, or
    /// any error hit while measuring the structure block of an old tree.
    pub fn check_layout(&self) -> Result<()> {
        if self.can_assume(Assumptions::LIBFDT_ORDER) {
            return Ok(());
        }

        let header = self.header();
        let mem_rsv_size = (self.num_mem_rsv() + 1) * size_of::<u64>() * 2;
        let struct_size = if self.can_assume(Assumptions::LATEST) || self.version() >= 17 {
            header.size_dt_struct() as usize
        } else {
            self.struct_size()?
        };

        let off_mem_rsvmap = header.off_mem_rsvmap() as usize;
        let off_dt_struct = header.off_dt_struct() as usize;
        let off_dt_strings = header.off_dt_strings() as usize;
        let misordered = off_mem_rsvmap < size_of::<FdtHeader>().next_multiple_of(FDT_ALIGNMENT)
            || off_dt_struct < off_mem_rsvmap + mem_rsv_size
            || off_dt_strings < off_dt_struct + struct_size
            || (header.totalsize() as usize)
                < off_dt_strings + header.size_dt_strings() as usize;

        if misordered {
            debug!("FDT blocks are misordered");
            return Err(FdtError::new(FdtErrorKind::BadLayout, 0));
        }
        Ok(())
    }

    /// Measures the structure block by walking it up to the `FDT_END` tag.
    fn struct_size(&self) -> Result<usize> {
        let mut offset = 0;
        loop {
            let (token, next) = self.next_tag(offset)?;
            if token == FdtToken::End {
                return Ok(next);
            }
            offset = next;
        }
    }

    /// Returns the NUL-terminated string at `stroffset` in the strings block.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if `stroffset` lies outside the
    /// strings block, [`FdtErrorKind::Truncated`] if the string isn't
    /// terminated inside it and [`FdtErrorKind::BadValue`] if it isn't valid
    /// UTF-8.
    pub fn string(&self, stroffset: usize) -> Result<&'a str> {
        let strings = self.strings_block();
        let tail = strings
            .get(stroffset..)
            .filter(|tail| !tail.is_empty())
            .ok_or(FdtError::new(FdtErrorKind::BadOffset, stroffset))?;

        CStr::from_bytes_until_nul(tail)
            .map_err(|_e| FdtError::new(FdtErrorKind::Truncated, stroffset))?
            .to_str()
            .map_err(|_e| FdtError::new(FdtErrorKind::BadValue, stroffset))
    }

    /// Returns the strings block, clamped to the buffer.
    pub(crate) fn strings_block(&self) -> &'a [u8] {
        let header = self.header();
        let start = header.off_dt_strings() as usize;
        let end = start.saturating_add(header.size_dt_strings() as usize);
        self.data
            .get(start..end.min(self.data.len()))
            .unwrap_or_default()
    }

    /// Reports an internal consistency failure unless
    /// [`Assumptions::LIBFDT_FLAWLESS`] is set.
    pub(crate) fn check_internal(&self, ok: bool, offset: usize) -> Result<()> {
        if ok || self.can_assume(Assumptions::LIBFDT_FLAWLESS) {
            return Ok(());
        }
        error!("internal consistency check failed at structure offset {offset}");
        Err(FdtError::new(FdtErrorKind::Internal, offset))
    }

    pub(crate) fn align_tag_offset(offset: usize) -> usize {
        offset.next_multiple_of(FDT_TAGSIZE)
    }
}

impl fmt::Debug for Fdt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fdt")
            .field("totalsize", &self.totalsize())
            .field("version", &self.version())
            .field("last_comp_version", &self.last_comp_version())
            .field("off_mem_rsvmap", &self.off_mem_rsvmap())
            .field("off_dt_struct", &self.off_dt_struct())
            .field("size_dt_struct", &self.size_dt_struct())
            .field("off_dt_strings", &self.off_dt_strings())
            .field("size_dt_strings", &self.size_dt_strings())
            .field("assumptions", &self.assume)
            .finish()
    }
}

impl fmt::Display for Fdt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/dts-v1/;")?;
        writeln!(f)?;

        let mut has_reservations = false;
        for reservation in self.memory_reservations() {
            writeln!(
                f,
                "/memreserve/ {:#x} {:#x};",
                reservation.address(),
                reservation.size()
            )?;
            has_reservations = true;
        }
        if has_reservations {
            writeln!(f)?;
        }

        let root = self.root().map_err(|_| fmt::Error)?;
        root.fmt_recursive(f, 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Forces the 8-byte alignment `check_header` insists on.
    #[repr(C, align(8))]
    pub(crate) struct Aligned<const N: usize>(pub(crate) [u8; N]);

    /// Header from the concrete scenario: every block in bounds, version 17.
    pub(crate) static FDT_HEADER_OK: Aligned<64> = Aligned([
        0xd0, 0x0d, 0xfe, 0xed, // magic
        0x00, 0x00, 0x00, 0x40, // totalsize = 64
        0x00, 0x00, 0x00, 0x30, // off_dt_struct = 48
        0x00, 0x00, 0x00, 0x38, // off_dt_strings = 56
        0x00, 0x00, 0x00, 0x28, // off_mem_rsvmap = 40
        0x00, 0x00, 0x00, 0x11, // version = 17
        0x00, 0x00, 0x00, 0x10, // last_comp_version = 16
        0x00, 0x00, 0x00, 0x00, // boot_cpuid_phys = 0
        0x00, 0x00, 0x00, 0x08, // size_dt_strings = 8
        0x00, 0x00, 0x00, 0x08, // size_dt_struct = 8
        0x00, 0x00, 0x00, 0x00, // memory reservation terminator
        0x00, 0x00, 0x00, 0x00, // ...
        0x00, 0x00, 0x00, 0x01, // dt struct: FDT_BEGIN_NODE
        0x00, 0x00, 0x00, 0x00, // root name, padded
        0x00, 0x00, 0x00, 0x00, // strings
        0x00, 0x00, 0x00, 0x00, // ...
    ]);

    fn with_field(field: usize, value: u32) -> Aligned<64> {
        let mut blob = Aligned(FDT_HEADER_OK.0);
        blob.0[field..field + 4].copy_from_slice(&value.to_be_bytes());
        blob
    }

    fn kind(result: Result<()>) -> Option<FdtErrorKind> {
        result.err().map(|e| e.kind)
    }

    #[test]
    fn header_is_parsed_correctly() {
        let fdt = Fdt::new(&FDT_HEADER_OK.0).unwrap();

        assert_eq!(fdt.totalsize(), 64);
        assert_eq!(fdt.off_dt_struct(), 48);
        assert_eq!(fdt.off_dt_strings(), 56);
        assert_eq!(fdt.off_mem_rsvmap(), 40);
        assert_eq!(fdt.version(), 17);
        assert_eq!(fdt.last_comp_version(), 16);
        assert_eq!(fdt.boot_cpuid_phys(), 0);
        assert_eq!(fdt.size_dt_strings(), 8);
        assert_eq!(fdt.size_dt_struct(), 8);
        assert_eq!(fdt.header_size(), FDT_V17_SIZE);
    }

    #[test]
    fn misaligned_buffer() {
        let mut buf = Aligned([0u8; 72]);
        buf.0[1..65].copy_from_slice(&FDT_HEADER_OK.0);
        let result = check_header(&buf.0[1..65], Assumptions::empty());
        assert_eq!(kind(result), Some(FdtErrorKind::Alignment));
        // Alignment is checked even when everything else is assumed.
        let result = check_header(&buf.0[1..65], Assumptions::PERFECT);
        assert_eq!(kind(result), Some(FdtErrorKind::Alignment));
    }

    #[test]
    fn invalid_magic() {
        let blob = with_field(0, 0xdead_beef);
        assert_eq!(
            kind(check_header(&blob.0, Assumptions::empty())),
            Some(FdtErrorKind::BadMagic)
        );
        assert_eq!(
            kind(check_header(&blob.0, Assumptions::VALID_DTB)),
            Some(FdtErrorKind::BadMagic)
        );
    }

    #[test]
    fn too_short_for_header() {
        let result = check_header(&FDT_HEADER_OK.0[..2], Assumptions::empty());
        assert_eq!(kind(result), Some(FdtErrorKind::Truncated));
        let result = check_header(&FDT_HEADER_OK.0[..10], Assumptions::empty());
        assert_eq!(kind(result), Some(FdtErrorKind::Truncated));
    }

    #[test]
    fn shorter_than_totalsize() {
        let result = check_header(&FDT_HEADER_OK.0[..63], Assumptions::empty());
        assert_eq!(kind(result), Some(FdtErrorKind::Truncated));
    }

    #[test]
    fn unsupported_version() {
        let blob = with_field(20, 1);
        assert_eq!(
            kind(check_header(&blob.0, Assumptions::empty())),
            Some(FdtErrorKind::BadVersion)
        );

        let blob = with_field(24, 0x12);
        assert_eq!(
            kind(check_header(&blob.0, Assumptions::empty())),
            Some(FdtErrorKind::BadVersion)
        );

        // version 16 with last_comp_version 17
        let mut blob = with_field(20, 0x10);
        blob.0[24..28].copy_from_slice(&0x11u32.to_be_bytes());
        assert_eq!(
            kind(check_header(&blob.0, Assumptions::empty())),
            Some(FdtErrorKind::BadVersion)
        );
        assert_eq!(kind(check_header(&blob.0, Assumptions::LATEST)), None);
    }

    #[test]
    fn blocks_out_of_bounds() {
        for (field, value) in [
            (4, 39),  // totalsize below header size
            (16, 65), // memory reservation map past the end
            (16, 8),  // memory reservation map inside the header
            (8, 72),  // structure block past the end
            (36, 17), // structure block too long
            (12, 60), // strings block too long
            (32, u32::MAX), // strings block size overflows
        ] {
            let blob = with_field(field, value);
            assert_eq!(
                kind(check_header(&blob.0, Assumptions::empty())),
                Some(FdtErrorKind::Truncated),
                "field {field} = {value}"
            );
            assert_eq!(kind(check_header(&blob.0, Assumptions::VALID_DTB)), None);
        }
    }

    #[test]
    fn old_versions_only_check_struct_start() {
        // version 16: size_dt_struct isn't part of the header
        let mut blob = with_field(20, 0x10);
        blob.0[36..40].copy_from_slice(&0x1000u32.to_be_bytes());
        assert_eq!(kind(check_header(&blob.0, Assumptions::empty())), None);
        // ...unless the latest version is assumed
        assert_eq!(
            kind(check_header(&blob.0, Assumptions::LATEST)),
            Some(FdtErrorKind::Truncated)
        );
    }

    #[test]
    fn view_is_limited_to_totalsize() {
        let mut buf = Aligned([0u8; 80]);
        buf.0[..64].copy_from_slice(&FDT_HEADER_OK.0);
        let fdt = Fdt::new(&buf.0).unwrap();
        assert_eq!(fdt.as_bytes().len(), 64);
    }

    #[test]
    fn layout() {
        // The 8 bytes between the reservation map and the structure block
        // can't hold the 16-byte terminator entry.
        let fdt = Fdt::new(&FDT_HEADER_OK.0).unwrap();
        assert_eq!(
            fdt.check_layout().unwrap_err().kind,
            FdtErrorKind::BadLayout
        );

        // strings block before the structure block
        let mut blob = with_field(12, 40);
        blob.0[16..20].copy_from_slice(&56u32.to_be_bytes());
        let fdt = Fdt::new(&blob.0).unwrap();
        assert_eq!(
            fdt.check_layout().unwrap_err().kind,
            FdtErrorKind::BadLayout
        );

        let fdt = Fdt::with_assumptions(&blob.0, Assumptions::LIBFDT_ORDER).unwrap();
        assert!(fdt.check_layout().is_ok());
    }

    #[test]
    fn internal_checks() {
        let fdt = Fdt::new(&FDT_HEADER_OK.0).unwrap();
        assert_eq!(
            fdt.check_internal(false, 4).unwrap_err().kind,
            FdtErrorKind::Internal
        );
        assert!(fdt.check_internal(true, 4).is_ok());

        let fdt = Fdt::with_assumptions(&FDT_HEADER_OK.0, Assumptions::LIBFDT_FLAWLESS).unwrap();
        assert!(fdt.check_internal(false, 4).is_ok());
    }

    #[test]
    fn strings() {
        let mut blob = Aligned(FDT_HEADER_OK.0);
        blob.0[56..64].copy_from_slice(b"abc\0de\0\0");
        let fdt = Fdt::new(&blob.0).unwrap();
        assert_eq!(fdt.string(0).unwrap(), "abc");
        assert_eq!(fdt.string(4).unwrap(), "de");
        assert_eq!(fdt.string(7).unwrap(), "");
        assert_eq!(fdt.string(8).unwrap_err().kind, FdtErrorKind::BadOffset);

        blob.0[56..64].copy_from_slice(b"abcdefgh");
        let fdt = Fdt::new(&blob.0).unwrap();
        assert_eq!(fdt.string(2).unwrap_err().kind, FdtErrorKind::Truncated);
    }
}
