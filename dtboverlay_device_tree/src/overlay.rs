// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Handing validated overlay blobs to the system that applies them.
//!
//! This crate doesn't merge overlays into a live tree. It checks that an
//! overlay blob is well formed and passes it, trimmed to its `totalsize`, to
//! an [`OverlayHost`], which is what the operating system provides.

use core::fmt;

use log::debug;

use crate::Assumptions;
use crate::error::FdtError;
use crate::fdt::Fdt;

/// Identifies an applied overlay, so that it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeSetId(pub u32);

impl fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A system which can apply device tree overlays to its live tree.
pub trait OverlayHost {
    /// The error returned when the host fails to apply or remove an overlay.
    type Error;

    /// Applies the overlay `blob`, which has already been validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the overlay.
    fn apply(&mut self, blob: &[u8]) -> Result<ChangeSetId, Self::Error>;

    /// Removes a previously applied overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or the overlay can't be removed.
    fn remove(&mut self, id: ChangeSetId) -> Result<(), Self::Error>;
}

/// An error returned by [`apply_overlay`] or [`remove_overlay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError<E> {
    /// The overlay blob is malformed.
    Fdt(FdtError),
    /// The host failed to apply or remove the overlay.
    Host(E),
}

impl<E> From<FdtError> for OverlayError<E> {
    fn from(e: FdtError) -> Self {
        Self::Fdt(e)
    }
}

impl<E: fmt::Display> fmt::Display for OverlayError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fdt(e) => write!(f, "invalid overlay: {e}"),
            Self::Host(e) => write!(f, "overlay host error: {e}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for OverlayError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Fdt(e) => Some(e),
            Self::Host(e) => Some(e),
        }
    }
}

/// Validates the overlay in `blob` and applies it through `host`.
///
/// Only the first `totalsize` bytes of `blob` are passed on. The host isn't
/// called at all if the header check fails.
///
/// # Errors
///
/// Returns [`OverlayError::Fdt`] if the header check fails and
/// [`OverlayError::Host`] if the host rejects the overlay.
pub fn apply_overlay<H: OverlayHost>(
    host: &mut H,
    blob: &[u8],
    assume: Assumptions,
) -> Result<ChangeSetId, OverlayError<H::Error>> {
    let fdt = Fdt::with_assumptions(blob, assume)?;
    let totalsize = fdt.totalsize() as usize;
    let blob = blob.get(..totalsize).unwrap_or(blob);
    debug!("applying {totalsize} byte overlay");

    let id = host.apply(blob).map_err(OverlayError::Host)?;
    debug!("overlay applied as change set {id}");
    Ok(id)
}

/// Removes the overlay applied as change set `id`.
///
/// # Errors
///
/// Returns [`OverlayError::Host`] if the host fails to remove it.
pub fn remove_overlay<H: OverlayHost>(
    host: &mut H,
    id: ChangeSetId,
) -> Result<(), OverlayError<H::Error>> {
    debug!("removing overlay change set {id}");
    host.remove(id).map_err(OverlayError::Host)
}
