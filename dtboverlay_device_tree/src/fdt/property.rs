// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Property lookup and a read-only API for inspecting a device tree property.

use core::ffi::CStr;
use core::fmt;

use zerocopy::{FromBytes, big_endian};

use super::tag::FdtPropHeader;
use super::{FDT_TAGSIZE, Fdt, FdtToken};
use crate::Result;
use crate::error::{FdtError, FdtErrorKind};

impl<'a> Fdt<'a> {
    /// Returns the offset of the first property of the node at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if `offset` isn't a node and
    /// [`FdtErrorKind::NotFound`] if the node has no properties.
    pub fn first_property_offset(&self, offset: usize) -> Result<usize> {
        let next = self.check_node_offset(offset)?;
        self.next_prop(next)
    }

    /// Returns the offset of the property following the one at `offset` in
    /// the same node.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if `offset` isn't a property and
    /// [`FdtErrorKind::NotFound`] if it was the node's last property.
    pub fn next_property_offset(&self, offset: usize) -> Result<usize> {
        let next = self.check_prop_offset(offset)?;
        self.next_prop(next)
    }

    fn next_prop(&self, mut next: usize) -> Result<usize> {
        loop {
            let offset = next;
            let (token, after) = self.next_tag(offset)?;
            next = after;
            match token {
                FdtToken::Prop => return Ok(offset),
                FdtToken::Nop => {}
                // Properties precede subnodes, and a node can't end the
                // structure block.
                FdtToken::End => return Err(FdtError::new(FdtErrorKind::BadStructure, offset)),
                FdtToken::BeginNode | FdtToken::EndNode => {
                    return Err(FdtError::new(FdtErrorKind::NotFound, offset));
                }
            }
        }
    }

    /// Returns the property at structure block offset `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if `offset` isn't a property, or
    /// the error reported by [`Fdt::string`] for its name.
    pub fn property_by_offset(&self, offset: usize) -> Result<FdtProperty<'a>> {
        self.check_prop_offset(offset)?;

        let header_offset = offset + FDT_TAGSIZE;
        let truncated = || FdtError::new(FdtErrorKind::Truncated, header_offset);
        let header = self
            .struct_range(header_offset, size_of::<FdtPropHeader>())
            .and_then(|bytes| FdtPropHeader::ref_from_bytes(bytes).ok())
            .ok_or_else(truncated)?;
        let len = header.len.get() as usize;

        let mut value_offset = header_offset + size_of::<FdtPropHeader>();
        value_offset += self.legacy_prop_padding(value_offset, len);
        let value = self
            .struct_range(value_offset, len)
            .ok_or_else(truncated)?;
        let name = self.string(header.nameoff.get() as usize)?;

        Ok(FdtProperty {
            name,
            value,
            value_offset,
        })
    }
}

/// A property of a device tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtProperty<'a> {
    name: &'a str,
    value: &'a [u8],
    value_offset: usize,
}

impl<'a> FdtProperty<'a> {
    /// Returns the name of this property.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Returns the value of this property.
    #[must_use]
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Returns the structure block offset of this property's value.
    #[must_use]
    pub fn value_offset(&self) -> usize {
        self.value_offset
    }

    /// Returns the value of this property as a `u32`.
    ///
    /// # Errors
    ///
    /// Returns an [`FdtErrorKind::BadValue`] if the property's value is not
    /// 4 bytes long.
    pub fn as_u32(&self) -> Result<u32> {
        big_endian::U32::ref_from_bytes(self.value)
            .map(|val| val.get())
            .map_err(|_e| FdtError::new(FdtErrorKind::BadValue, self.value_offset))
    }

    /// Returns the value of this property as a `u64`.
    ///
    /// # Errors
    ///
    /// Returns an [`FdtErrorKind::BadValue`] if the property's value is not
    /// 8 bytes long.
    pub fn as_u64(&self) -> Result<u64> {
        big_endian::U64::ref_from_bytes(self.value)
            .map(|val| val.get())
            .map_err(|_e| FdtError::new(FdtErrorKind::BadValue, self.value_offset))
    }

    /// Returns the value of this property as a string.
    ///
    /// # Errors
    ///
    /// Returns an [`FdtErrorKind::BadValue`] if the property's value is not
    /// a single NUL-terminated string or contains invalid UTF-8.
    pub fn as_str(&self) -> Result<&'a str> {
        let cstr = CStr::from_bytes_with_nul(self.value)
            .map_err(|_| FdtError::new(FdtErrorKind::BadValue, self.value_offset))?;
        cstr.to_str()
            .map_err(|_| FdtError::new(FdtErrorKind::BadValue, self.value_offset))
    }

    /// Returns an iterator over the strings in this property.
    ///
    /// Iteration stops at the first string that isn't NUL-terminated or
    /// isn't valid UTF-8.
    pub fn as_str_list(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        FdtStringListIterator { value: self.value }
    }

    pub(crate) fn fmt(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.name, indent = indent)?;

        if self.value.is_empty() {
            writeln!(f, ";")?;
            return Ok(());
        }

        let is_printable = self
            .value
            .iter()
            .all(|&ch| ch.is_ascii_graphic() || ch == b' ' || ch == 0);
        let has_empty = self.value.windows(2).any(|window| window == [0, 0]);
        if is_printable && self.value.ends_with(&[0]) && !has_empty {
            let mut strings = self.as_str_list();
            if let Some(first) = strings.next() {
                write!(f, " = \"{first}\"")?;
                for s in strings {
                    write!(f, ", \"{s}\"")?;
                }
                writeln!(f, ";")?;
                return Ok(());
            }
        }

        if self.value.len().is_multiple_of(4) {
            write!(f, " = <")?;
            for (i, chunk) in self.value.chunks_exact(4).enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                let val = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                write!(f, "0x{val:02x}")?;
            }
            writeln!(f, ">;")?;
        } else {
            write!(f, " = [")?;
            for (i, byte) in self.value.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{byte:02x}")?;
            }
            writeln!(f, "];")?;
        }

        Ok(())
    }
}

/// An iterator over the properties of a device tree node.
pub(crate) enum FdtPropIter<'a> {
    Start { fdt: Fdt<'a>, offset: usize },
    Running { fdt: Fdt<'a>, offset: usize },
    Done,
}

impl<'a> Iterator for FdtPropIter<'a> {
    type Item = Result<FdtProperty<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (fdt, next) = match *self {
            Self::Start { fdt, offset } => (fdt, fdt.first_property_offset(offset)),
            Self::Running { fdt, offset } => (fdt, fdt.next_property_offset(offset)),
            Self::Done => return None,
        };
        let offset = match next {
            Ok(offset) => offset,
            Err(e) if e.kind == FdtErrorKind::NotFound => {
                *self = Self::Done;
                return None;
            }
            Err(e) => {
                *self = Self::Done;
                return Some(Err(e));
            }
        };
        match fdt.property_by_offset(offset) {
            Ok(property) => {
                *self = Self::Running { fdt, offset };
                Some(Ok(property))
            }
            Err(e) => {
                *self = Self::Done;
                Some(Err(e))
            }
        }
    }
}

struct FdtStringListIterator<'a> {
    value: &'a [u8],
}

impl<'a> Iterator for FdtStringListIterator<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.value.is_empty() {
            return None;
        }
        let cstr = CStr::from_bytes_until_nul(self.value).ok()?;
        let s = cstr.to_str().ok()?;
        self.value = &self.value[s.len() + 1..];
        Some(s)
    }
}
