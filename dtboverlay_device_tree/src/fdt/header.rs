// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The fixed-layout FDT header.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::byteorder::big_endian;

/// Oldest FDT version this crate can read.
pub const FDT_FIRST_SUPPORTED_VERSION: u32 = 0x02;
/// Last compatible version written by current tools.
pub const FDT_LAST_COMPATIBLE_VERSION: u32 = 0x10;
/// Newest FDT version this crate can read.
pub const FDT_LAST_SUPPORTED_VERSION: u32 = 0x11;

/// Size of a version 1 header: up to and including `last_comp_version`.
pub const FDT_V1_SIZE: usize = 7 * size_of::<u32>();
/// Size of a version 2 header, which adds `boot_cpuid_phys`.
pub const FDT_V2_SIZE: usize = FDT_V1_SIZE + size_of::<u32>();
/// Size of a version 3 header, which adds `size_dt_strings`.
pub const FDT_V3_SIZE: usize = FDT_V2_SIZE + size_of::<u32>();
/// Size of a version 16 header; unchanged from version 3.
pub const FDT_V16_SIZE: usize = FDT_V3_SIZE;
/// Size of a version 17 header, which adds `size_dt_struct`.
pub const FDT_V17_SIZE: usize = FDT_V16_SIZE + size_of::<u32>();

#[repr(C, packed)]
#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
pub(crate) struct FdtHeader {
    /// Magic number of the device tree.
    pub(crate) magic: big_endian::U32,
    /// Total size of the device tree.
    pub(crate) totalsize: big_endian::U32,
    /// Offset of the device tree structure.
    pub(crate) off_dt_struct: big_endian::U32,
    /// Offset of the device tree strings.
    pub(crate) off_dt_strings: big_endian::U32,
    /// Offset of the memory reservation map.
    pub(crate) off_mem_rsvmap: big_endian::U32,
    /// Version of the device tree.
    pub(crate) version: big_endian::U32,
    /// Last compatible version of the device tree.
    pub(crate) last_comp_version: big_endian::U32,
    /// Physical ID of the boot CPU.
    pub(crate) boot_cpuid_phys: big_endian::U32,
    /// Size of the device tree strings.
    pub(crate) size_dt_strings: big_endian::U32,
    /// Size of the device tree structure.
    pub(crate) size_dt_struct: big_endian::U32,
}

const _: () = assert!(size_of::<FdtHeader>() == FDT_V17_SIZE);

impl FdtHeader {
    pub(crate) fn magic(&self) -> u32 {
        self.magic.get()
    }

    pub(crate) fn totalsize(&self) -> u32 {
        self.totalsize.get()
    }

    pub(crate) fn off_dt_struct(&self) -> u32 {
        self.off_dt_struct.get()
    }

    pub(crate) fn off_dt_strings(&self) -> u32 {
        self.off_dt_strings.get()
    }

    pub(crate) fn off_mem_rsvmap(&self) -> u32 {
        self.off_mem_rsvmap.get()
    }

    pub(crate) fn version(&self) -> u32 {
        self.version.get()
    }

    pub(crate) fn last_comp_version(&self) -> u32 {
        self.last_comp_version.get()
    }

    pub(crate) fn boot_cpuid_phys(&self) -> u32 {
        self.boot_cpuid_phys.get()
    }

    pub(crate) fn size_dt_strings(&self) -> u32 {
        self.size_dt_strings.get()
    }

    pub(crate) fn size_dt_struct(&self) -> u32 {
        self.size_dt_struct.get()
    }
}

/// Returns the size of the header used by trees of the given version.
#[must_use]
pub fn header_size_for_version(version: u32) -> usize {
    match version {
        0..=1 => FDT_V1_SIZE,
        2 => FDT_V2_SIZE,
        3 => FDT_V3_SIZE,
        4..=16 => FDT_V16_SIZE,
        _ => FDT_V17_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes() {
        assert_eq!(FDT_V1_SIZE, 28);
        assert_eq!(FDT_V2_SIZE, 32);
        assert_eq!(FDT_V3_SIZE, 36);
        assert_eq!(FDT_V16_SIZE, 36);
        assert_eq!(FDT_V17_SIZE, 40);
    }

    #[test]
    fn header_size_by_version() {
        assert_eq!(header_size_for_version(0), FDT_V1_SIZE);
        assert_eq!(header_size_for_version(1), FDT_V1_SIZE);
        assert_eq!(header_size_for_version(2), FDT_V2_SIZE);
        assert_eq!(header_size_for_version(3), FDT_V3_SIZE);
        assert_eq!(header_size_for_version(16), FDT_V16_SIZE);
        assert_eq!(header_size_for_version(17), FDT_V17_SIZE);
        assert_eq!(header_size_for_version(0x20), FDT_V17_SIZE);
    }
}
