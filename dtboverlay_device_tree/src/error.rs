// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types for the `dtboverlay_device_tree` crate.

use core::fmt;

/// An error that can occur when validating or walking a device tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct FdtError {
    offset: usize,
    /// The type of the error that has occurred.
    pub kind: FdtErrorKind,
}

impl FdtError {
    pub(crate) fn new(kind: FdtErrorKind, offset: usize) -> Self {
        Self { offset, kind }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> FdtErrorKind {
        self.kind
    }

    /// Returns the offset at which the error was detected.
    ///
    /// Header errors carry an offset into the blob; errors raised while
    /// walking the structure block carry an offset relative to its start.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// The kind of an error that can occur when validating or walking a device
/// tree.
///
/// The variants mirror the libfdt error codes one to one; see
/// [`FdtErrorKind::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FdtErrorKind {
    /// The requested node or property does not exist.
    NotFound,
    /// A node or property which was to be created already exists.
    Exists,
    /// The destination buffer is too small to hold the tree.
    NoSpace,
    /// A structure block offset is out of bounds or points to the wrong kind
    /// of tag.
    BadOffset,
    /// A path is badly formatted.
    BadPath,
    /// A phandle is invalid.
    BadPhandle,
    /// The tree is incomplete for the requested operation.
    BadState,
    /// The blob or one of its blocks is truncated or goes out of bounds.
    Truncated,
    /// The blob does not start with the FDT magic number.
    BadMagic,
    /// The blob's version can't be handled.
    BadVersion,
    /// The structure block is corrupt.
    BadStructure,
    /// The blocks of the blob are not in the expected order.
    BadLayout,
    /// An internal consistency check of this crate has failed.
    Internal,
    /// A `#address-cells` or `#size-cells` property is malformed.
    BadNCells,
    /// A property has an unexpected value.
    BadValue,
    /// An overlay can't be applied.
    BadOverlay,
    /// No phandles are left.
    NoPhandles,
    /// An invalid combination of flags was passed.
    BadFlags,
    /// The blob's base address is not 8-byte aligned.
    Alignment,
}

impl FdtErrorKind {
    /// Returns the libfdt error number of this kind.
    ///
    /// C interfaces report failures as the negated value of this code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::NotFound => 1,
            Self::Exists => 2,
            Self::NoSpace => 3,
            Self::BadOffset => 4,
            Self::BadPath => 5,
            Self::BadPhandle => 6,
            Self::BadState => 7,
            Self::Truncated => 8,
            Self::BadMagic => 9,
            Self::BadVersion => 10,
            Self::BadStructure => 11,
            Self::BadLayout => 12,
            Self::Internal => 13,
            Self::BadNCells => 14,
            Self::BadValue => 15,
            Self::BadOverlay => 16,
            Self::NoPhandles => 17,
            Self::BadFlags => 18,
            Self::Alignment => 19,
        }
    }

    /// Returns whether this kind means that the input bytes are not a valid
    /// device tree.
    #[must_use]
    pub fn is_malformed_blob(self) -> bool {
        matches!(
            self,
            Self::Truncated
                | Self::BadMagic
                | Self::BadVersion
                | Self::BadStructure
                | Self::BadLayout
                | Self::Alignment
        )
    }

    /// Returns whether this kind means that the caller passed an invalid
    /// argument.
    #[must_use]
    pub fn is_bad_parameter(self) -> bool {
        matches!(
            self,
            Self::BadOffset | Self::BadPath | Self::BadPhandle | Self::BadState | Self::BadFlags
        )
    }
}

impl fmt::Display for FdtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl fmt::Display for FdtErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "node or property not found"),
            Self::Exists => write!(f, "node or property already exists"),
            Self::NoSpace => write!(f, "insufficient space in buffer"),
            Self::BadOffset => write!(f, "bad structure block offset"),
            Self::BadPath => write!(f, "badly formatted path"),
            Self::BadPhandle => write!(f, "bad phandle"),
            Self::BadState => write!(f, "incomplete device tree"),
            Self::Truncated => write!(f, "FDT or a sub-block is truncated"),
            Self::BadMagic => write!(f, "invalid FDT magic number"),
            Self::BadVersion => write!(f, "unsupported FDT version"),
            Self::BadStructure => write!(f, "corrupt structure block"),
            Self::BadLayout => write!(f, "FDT blocks are misordered"),
            Self::Internal => write!(f, "internal consistency check failed"),
            Self::BadNCells => write!(f, "bad #address-cells or #size-cells value"),
            Self::BadValue => write!(f, "unexpected property value"),
            Self::BadOverlay => write!(f, "overlay can't be applied"),
            Self::NoPhandles => write!(f, "no phandles available"),
            Self::BadFlags => write!(f, "invalid flags"),
            Self::Alignment => write!(f, "FDT base address is not 8-byte aligned"),
        }
    }
}

impl core::error::Error for FdtError {}
