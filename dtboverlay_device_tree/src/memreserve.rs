// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Device tree memory reservations.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::byteorder::big_endian;

use crate::fdt::Fdt;

/// A 64-bit memory reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryReservation {
    address: u64,
    size: u64,
}

impl MemoryReservation {
    /// Creates a new [`MemoryReservation`].
    #[must_use]
    pub fn new(address: u64, size: u64) -> Self {
        Self { address, size }
    }

    /// Returns the physical address of the reserved memory region.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Returns the size of the reserved memory region.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// An entry of the memory reservation map as laid out in the blob.
#[repr(C, packed)]
#[derive(Debug, Copy, Clone, FromBytes, Unaligned, Immutable, KnownLayout)]
struct FdtReserveEntry {
    address: big_endian::U64,
    size: big_endian::U64,
}

impl<'a> Fdt<'a> {
    /// Returns an iterator over the memory reservation map.
    ///
    /// Iteration stops at the all-zero terminator entry, or at the end of the
    /// blob if the terminator is missing.
    pub fn memory_reservations(&self) -> impl Iterator<Item = MemoryReservation> + use<'a> {
        let start = self.off_mem_rsvmap() as usize;
        FdtReserveIter {
            data: self.data.get(start..).unwrap_or_default(),
        }
    }

    /// Returns the number of entries in the memory reservation map, not
    /// counting the terminator.
    #[must_use]
    pub fn num_mem_rsv(&self) -> usize {
        self.memory_reservations().count()
    }
}

struct FdtReserveIter<'a> {
    data: &'a [u8],
}

impl Iterator for FdtReserveIter<'_> {
    type Item = MemoryReservation;

    fn next(&mut self) -> Option<Self::Item> {
        let (entry, rest) = FdtReserveEntry::ref_from_prefix(self.data).ok()?;
        let reservation = MemoryReservation::new(entry.address.get(), entry.size.get());
        if reservation.address == 0 && reservation.size == 0 {
            self.data = &[];
            return None;
        }
        self.data = rest;
        Some(reservation)
    }
}
