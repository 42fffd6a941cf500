// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A minimal sequential FDT writer for building test blobs.

#![allow(dead_code)]

use dtboverlay_device_tree::fdt::{
    FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_MAGIC, FDT_NOP, FDT_PROP, FDT_V17_SIZE,
};
use dtboverlay_device_tree::find_string;
use zerocopy::IntoBytes;

/// A finished blob, stored in `u64` words so that it is 8-byte aligned.
pub struct Blob {
    words: Vec<u64>,
    len: usize,
}

impl Blob {
    pub fn bytes(&self) -> &[u8] {
        &self.words.as_bytes()[..self.len]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.words.as_mut_bytes()[..self.len]
    }

    /// Returns the blob followed by `extra` zero bytes.
    pub fn padded(&self, extra: usize) -> Blob {
        let len = self.len + extra;
        let mut words = vec![0u64; len.div_ceil(8)];
        words.as_mut_bytes()[..self.len].copy_from_slice(self.bytes());
        Blob { words, len }
    }
}

pub struct FdtBuilder {
    reservations: Vec<(u64, u64)>,
    strukt: Vec<u8>,
    strings: Vec<u8>,
    boot_cpuid_phys: u32,
}

impl FdtBuilder {
    pub fn new() -> Self {
        Self {
            reservations: Vec::new(),
            strukt: Vec::new(),
            strings: Vec::new(),
            boot_cpuid_phys: 0,
        }
    }

    pub fn reserve(mut self, address: u64, size: u64) -> Self {
        self.reservations.push((address, size));
        self
    }

    pub fn begin_node(mut self, name: &str) -> Self {
        self.tag(FDT_BEGIN_NODE);
        self.strukt.extend_from_slice(name.as_bytes());
        self.strukt.push(0);
        self.pad();
        self
    }

    pub fn end_node(mut self) -> Self {
        self.tag(FDT_END_NODE);
        self
    }

    pub fn nop(mut self) -> Self {
        self.tag(FDT_NOP);
        self
    }

    pub fn prop(mut self, name: &str, value: &[u8]) -> Self {
        let nameoff = self.string(name);
        self.tag(FDT_PROP);
        self.tag(value.len() as u32);
        self.tag(nameoff as u32);
        self.strukt.extend_from_slice(value);
        self.pad();
        self
    }

    pub fn prop_u32(self, name: &str, value: u32) -> Self {
        self.prop(name, &value.to_be_bytes())
    }

    pub fn prop_str(self, name: &str, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.prop(name, &bytes)
    }

    /// Appends `FDT_END` and lays the blob out as header, reservation map,
    /// structure block, strings block.
    pub fn finish(mut self) -> Blob {
        self.tag(FDT_END);

        let off_mem_rsvmap = FDT_V17_SIZE.next_multiple_of(8);
        let off_dt_struct = off_mem_rsvmap + (self.reservations.len() + 1) * 16;
        let off_dt_strings = off_dt_struct + self.strukt.len();
        let totalsize = off_dt_strings + self.strings.len();

        let mut bytes = Vec::with_capacity(totalsize);
        for field in [
            FDT_MAGIC,
            totalsize as u32,
            off_dt_struct as u32,
            off_dt_strings as u32,
            off_mem_rsvmap as u32,
            17,
            16,
            self.boot_cpuid_phys,
            self.strings.len() as u32,
            self.strukt.len() as u32,
        ] {
            bytes.extend_from_slice(&field.to_be_bytes());
        }
        bytes.resize(off_mem_rsvmap, 0);
        for (address, size) in self.reservations.iter().chain([&(0, 0)]) {
            bytes.extend_from_slice(&address.to_be_bytes());
            bytes.extend_from_slice(&size.to_be_bytes());
        }
        bytes.extend_from_slice(&self.strukt);
        bytes.extend_from_slice(&self.strings);

        let mut words = vec![0u64; totalsize.div_ceil(8)];
        words.as_mut_bytes()[..totalsize].copy_from_slice(&bytes);
        Blob {
            words,
            len: totalsize,
        }
    }

    fn tag(&mut self, value: u32) {
        self.strukt.extend_from_slice(&value.to_be_bytes());
    }

    fn pad(&mut self) {
        let len = self.strukt.len().next_multiple_of(4);
        self.strukt.resize(len, 0);
    }

    fn string(&mut self, name: &str) -> usize {
        find_string(&self.strings, name).unwrap_or_else(|| {
            let offset = self.strings.len();
            self.strings.extend_from_slice(name.as_bytes());
            self.strings.push(0);
            offset
        })
    }
}

/// A root with three children, the second of which has a child of its own.
///
/// ```text
/// / {
///     compatible = "test,board";
///     #address-cells = <0x01>;
///
///     cpus {
///         cpu-count = <0x02>;
///     };
///
///     memory@80000000 {
///         reg = <0x80000000 0x10000000>;
///
///         bank@0 {
///             status = "okay";
///         };
///     };
///
///     chosen {
///         bootargs = "console=ttyS0", "quiet";
///     };
/// };
/// ```
pub fn sample_tree() -> Blob {
    FdtBuilder::new()
        .begin_node("")
        .prop_str("compatible", "test,board")
        .prop_u32("#address-cells", 1)
        .begin_node("cpus")
        .prop_u32("cpu-count", 2)
        .end_node()
        .begin_node("memory@80000000")
        .prop("reg", &[0x80, 0, 0, 0, 0x10, 0, 0, 0])
        .nop()
        .begin_node("bank@0")
        .prop_str("status", "okay")
        .end_node()
        .end_node()
        .begin_node("chosen")
        .prop("bootargs", b"console=ttyS0\0quiet\0")
        .end_node()
        .end_node()
        .finish()
}
