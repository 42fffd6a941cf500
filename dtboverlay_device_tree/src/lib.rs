// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for validating and walking Flattened Device Tree (FDT) blobs,
//! and for handing device tree overlays to the system that applies them.
//!
//! The library is written purely in Rust, is `#![no_std]` and never
//! allocates. Every view it hands out borrows from the blob.
//!
//! ## Validation
//!
//! [`check_header`](fdt::check_header) checks that a buffer starts with a
//! well-formed header whose blocks all lie within the blob. Checks can be
//! relaxed with [`Assumptions`] when the blob is trusted, e.g. because it was
//! verified by a signature; slice accesses stay bounds-checked regardless.
//!
//! ## Traversal
//!
//! [`Fdt`](fdt::Fdt) offers a libfdt-style offset API
//! ([`next_tag`](fdt::Fdt::next_tag), [`next_node`](fdt::Fdt::next_node),
//! [`first_subnode`](fdt::Fdt::first_subnode), ...) together with the
//! [`FdtNode`](fdt::FdtNode) and [`FdtProperty`](fdt::FdtProperty) views
//! built on it.
//!
//! ## Overlays
//!
//! [`apply_overlay`] validates an overlay blob before passing it to an
//! [`OverlayHost`].
//!
//! # Examples
//!
//! ```
//! use dtboverlay_device_tree::fdt::Fdt;
//!
//! #[repr(C, align(8))]
//! struct Aligned([u8; 72]);
//!
//! let dtb = Aligned([
//!     0xd0, 0x0d, 0xfe, 0xed, 0x00, 0x00, 0x00, 0x48, // magic, totalsize
//!     0x00, 0x00, 0x00, 0x38, 0x00, 0x00, 0x00, 0x44, // off_dt_struct, off_dt_strings
//!     0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x11, // off_mem_rsvmap, version
//!     0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, // last_comp_version, boot_cpuid_phys
//!     0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x0c, // size_dt_strings, size_dt_struct
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // memory reservation terminator
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // ...
//!     0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, // FDT_BEGIN_NODE, root name
//!     0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, // FDT_END_NODE, strings
//! ]);
//!
//! let fdt = Fdt::new(&dtb.0).unwrap();
//! let root = fdt.root().unwrap();
//! assert_eq!(root.name().unwrap(), "");
//! assert_eq!(root.children().count(), 0);
//! ```

#![no_std]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod assume;
pub mod error;
pub mod fdt;
pub mod memreserve;
pub mod overlay;
mod strings;

pub use assume::Assumptions;
pub use error::{FdtError, FdtErrorKind};
pub use overlay::{ChangeSetId, OverlayError, OverlayHost, apply_overlay, remove_overlay};
pub use strings::find_string;

/// A specialized [`Result`](core::result::Result) type for device tree
/// operations.
pub type Result<T> = core::result::Result<T, FdtError>;
