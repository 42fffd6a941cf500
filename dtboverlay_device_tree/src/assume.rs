// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Assumptions which relax the checks performed on a device tree.
//!
//! For maximum safety, don't enable any assumptions. Each flag only ever
//! removes a check; none of them adds behaviour. Checks that keep slice
//! accesses in bounds are never removed, so even [`Assumptions::PERFECT`]
//! can't make this crate read outside the buffer it was given. What the
//! assumptions remove is the *diagnosis*: a corrupt blob may then produce
//! nonsensical results instead of a specific error.

use bitflags::bitflags;

bitflags! {
    /// A set of independently toggleable assumptions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Assumptions: u8 {
        /// The header metadata and basic hierarchy of the tree are correct.
        ///
        /// Only checks relating exclusively to the blob itself are disabled,
        /// not those on the parameters passed in.
        const VALID_DTB = 1 << 0;
        /// Offsets and lengths passed by the caller are valid.
        ///
        /// It doesn't make sense to enable this unless [`Self::VALID_DTB`]
        /// is also enabled.
        const VALID_INPUT = 1 << 1;
        /// The tree has the latest supported version; no version checks and no
        /// handling of older layouts.
        const LATEST = 1 << 2;
        /// A failed modification may skip rolling back partial writes.
        ///
        /// This crate never modifies a tree, so the flag has no effect.
        const NO_ROLLBACK = 1 << 3;
        /// The blocks appear in the order memory reservation map, structure
        /// block, strings block.
        const LIBFDT_ORDER = 1 << 4;
        /// This crate has no bugs: internal consistency checks are skipped.
        const LIBFDT_FLAWLESS = 1 << 5;
        /// Every assumption. Only use this with a tree validated by other
        /// means, such as a signature check.
        const PERFECT = 0xff;
    }
}

impl Assumptions {
    /// Returns whether the given assumption is enabled.
    #[must_use]
    pub fn can_assume(self, assumption: Assumptions) -> bool {
        self.intersects(assumption)
    }

    /// Parses a list of assumption names separated by `|` or `,`, such as
    /// `"VALID_DTB | LATEST"`.
    ///
    /// Returns the first unknown name on failure.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dtboverlay_device_tree::Assumptions;
    /// let assume = Assumptions::parse_list("VALID_DTB, LATEST").unwrap();
    /// assert_eq!(assume, Assumptions::VALID_DTB | Assumptions::LATEST);
    /// assert_eq!(Assumptions::parse_list("BOGUS"), Err("BOGUS"));
    /// ```
    pub fn parse_list(list: &str) -> Result<Self, &str> {
        list.split(['|', ','])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::empty(), |acc, name| {
                Self::from_name(name).map(|flag| acc | flag).ok_or(name)
            })
    }
}
