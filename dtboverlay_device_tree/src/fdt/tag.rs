// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decoding of the tags making up the structure block.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::byteorder::big_endian;

use super::Fdt;
use crate::error::{FdtError, FdtErrorKind};
use crate::{Assumptions, Result};

/// Size and alignment of a tag in the structure block.
pub const FDT_TAGSIZE: usize = size_of::<u32>();
/// Start of a node, followed by its NUL-terminated name.
pub const FDT_BEGIN_NODE: u32 = 0x1;
/// End of a node.
pub const FDT_END_NODE: u32 = 0x2;
/// A property, followed by its descriptor and value.
pub const FDT_PROP: u32 = 0x3;
/// Padding, to be ignored.
pub const FDT_NOP: u32 = 0x4;
/// End of the structure block.
pub const FDT_END: u32 = 0x9;

/// A token in the device tree structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtToken {
    /// `FDT_BEGIN_NODE`
    BeginNode,
    /// `FDT_END_NODE`
    EndNode,
    /// `FDT_PROP`
    Prop,
    /// `FDT_NOP`
    Nop,
    /// `FDT_END`
    End,
}

impl TryFrom<u32> for FdtToken {
    type Error = u32;

    fn try_from(value: u32) -> core::result::Result<Self, Self::Error> {
        match value {
            FDT_BEGIN_NODE => Ok(FdtToken::BeginNode),
            FDT_END_NODE => Ok(FdtToken::EndNode),
            FDT_PROP => Ok(FdtToken::Prop),
            FDT_NOP => Ok(FdtToken::Nop),
            FDT_END => Ok(FdtToken::End),
            _ => Err(value),
        }
    }
}

/// The fixed part of a property following its `FDT_PROP` tag.
#[repr(C, packed)]
#[derive(Debug, Copy, Clone, FromBytes, Unaligned, Immutable, KnownLayout)]
pub(crate) struct FdtPropHeader {
    /// Length of the property value in bytes.
    pub(crate) len: big_endian::U32,
    /// Offset of the property name in the strings block.
    pub(crate) nameoff: big_endian::U32,
}

impl<'a> Fdt<'a> {
    /// Decodes the tag at structure block offset `offset`.
    ///
    /// Returns the tag and the tag-aligned offset of the one following it.
    /// Reaching [`FdtToken::End`] is reported as a regular tag; errors mean
    /// the structure block is corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::Truncated`] if any byte needed to decode the
    /// tag lies outside the structure block, and
    /// [`FdtErrorKind::BadStructure`] if the tag value is unknown.
    pub fn next_tag(&self, offset: usize) -> Result<(FdtToken, usize)> {
        let truncated = || FdtError::new(FdtErrorKind::Truncated, offset);

        let tag = self
            .struct_range(offset, FDT_TAGSIZE)
            .and_then(|bytes| big_endian::U32::ref_from_bytes(bytes).ok())
            .map(|val| val.get())
            .ok_or_else(truncated)?;
        let token = FdtToken::try_from(tag)
            .map_err(|_tag| FdtError::new(FdtErrorKind::BadStructure, offset))?;
        let mut next = offset + FDT_TAGSIZE;

        match token {
            FdtToken::BeginNode => {
                let name = self.struct_tail(next).ok_or_else(truncated)?;
                let len = name.iter().position(|&b| b == 0).ok_or_else(truncated)?;
                next += len + 1;
            }
            FdtToken::Prop => {
                let prop = self
                    .struct_range(next, size_of::<FdtPropHeader>())
                    .and_then(|bytes| FdtPropHeader::ref_from_bytes(bytes).ok())
                    .ok_or_else(truncated)?;
                let len = prop.len.get() as usize;
                next = (next + size_of::<FdtPropHeader>())
                    .checked_add(len)
                    .ok_or_else(truncated)?;
                next += self.legacy_prop_padding(next - len, len);
            }
            FdtToken::EndNode | FdtToken::Nop | FdtToken::End => {}
        }

        if self.struct_range(offset, next - offset).is_none() {
            return Err(truncated());
        }

        let next = Self::align_tag_offset(next);
        self.check_internal(next > offset, offset)?;
        Ok((token, next))
    }

    /// Compatibility shim for trees older than version 0x10, which aligned
    /// property values of 8 bytes or more to an 8-byte boundary.
    ///
    /// Returns the number of padding bytes preceding the value starting at
    /// `value_offset`.
    pub(crate) fn legacy_prop_padding(&self, value_offset: usize, len: usize) -> usize {
        if self.can_assume(Assumptions::LATEST) || self.version() >= 0x10 {
            return 0;
        }
        if len >= 8 && !value_offset.is_multiple_of(8) {
            FDT_TAGSIZE
        } else {
            0
        }
    }

    /// Checks that `offset` is the offset of an `FDT_BEGIN_NODE` tag and
    /// returns the offset of the tag following it.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if it isn't.
    pub fn check_node_offset(&self, offset: usize) -> Result<usize> {
        self.check_tag_offset(offset, FdtToken::BeginNode)
    }

    /// Checks that `offset` is the offset of an `FDT_PROP` tag and returns the
    /// offset of the tag following it.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if it isn't.
    pub fn check_prop_offset(&self, offset: usize) -> Result<usize> {
        self.check_tag_offset(offset, FdtToken::Prop)
    }

    /// Walks the whole structure block and checks that nodes are balanced,
    /// that properties only appear inside nodes, and that it ends with
    /// `FDT_END`. Every node name and property is decoded on the way.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadStructure`] if an `FDT_END_NODE` has no
    /// matching `FDT_BEGIN_NODE`, a property lies outside any node or `FDT_END`
    /// is reached inside a node, and [`FdtErrorKind::Truncated`] if the
    /// structure block ends without `FDT_END`.
    pub fn check_structure(&self) -> Result<()> {
        let bad_structure = |offset| FdtError::new(FdtErrorKind::BadStructure, offset);
        let mut depth = 0usize;
        let mut offset = 0;
        loop {
            let (token, next) = self.next_tag(offset)?;
            match token {
                FdtToken::BeginNode => {
                    self.node_name(offset)?;
                    depth += 1;
                }
                FdtToken::EndNode => {
                    depth = depth.checked_sub(1).ok_or_else(|| bad_structure(offset))?;
                }
                FdtToken::Prop if depth == 0 => return Err(bad_structure(offset)),
                FdtToken::Prop => {
                    self.property_by_offset(offset)?;
                }
                FdtToken::Nop => {}
                FdtToken::End if depth == 0 => return Ok(()),
                FdtToken::End => return Err(bad_structure(offset)),
            }
            offset = next;
        }
    }

    fn check_tag_offset(&self, offset: usize, expected: FdtToken) -> Result<usize> {
        let bad_offset = FdtError::new(FdtErrorKind::BadOffset, offset);
        if !self.can_assume(Assumptions::VALID_INPUT) && !offset.is_multiple_of(FDT_TAGSIZE) {
            return Err(bad_offset);
        }
        match self.next_tag(offset) {
            Ok((token, next)) if token == expected => Ok(next),
            _ => Err(bad_offset),
        }
    }
}
