// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Node traversal and a read-only API for inspecting a device tree node.

use core::ffi::CStr;
use core::fmt;

use super::property::FdtPropIter;
use super::{FDT_TAGSIZE, Fdt, FdtProperty, FdtToken};
use crate::error::{FdtError, FdtErrorKind};
use crate::{Assumptions, Result};

impl<'a> Fdt<'a> {
    /// Returns the offset of the next node after the node at `offset`, in
    /// depth-first order.
    ///
    /// If `depth` is given, it is incremented for every node entered and
    /// decremented for every node left, so after the call it holds the depth
    /// of the returned node relative to the node at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if `offset` isn't a node, and
    /// [`FdtErrorKind::NotFound`] once the end of the tree is reached or, when
    /// tracking depth, once the walk leaves the node the depth is counted
    /// from. The depth is left negative in the latter case.
    pub fn next_node(&self, offset: usize, depth: Option<&mut i32>) -> Result<usize> {
        let next = self.check_node_offset(offset)?;
        self.walk_to_node(next, depth)
    }

    /// Walks from `next` to the next `FDT_BEGIN_NODE` tag.
    fn walk_to_node(&self, mut next: usize, mut depth: Option<&mut i32>) -> Result<usize> {
        loop {
            let offset = next;
            let token = match self.next_tag(offset) {
                Ok((token, after)) => {
                    next = after;
                    token
                }
                Err(e) if e.kind == FdtErrorKind::Truncated && depth.is_none() => {
                    return Err(FdtError::new(FdtErrorKind::NotFound, offset));
                }
                Err(e) => return Err(e),
            };

            match token {
                FdtToken::Prop | FdtToken::Nop => {}
                FdtToken::BeginNode => {
                    if let Some(depth) = depth.as_deref_mut() {
                        *depth += 1;
                    }
                    return Ok(offset);
                }
                FdtToken::EndNode => {
                    if let Some(depth) = depth.as_deref_mut() {
                        *depth -= 1;
                        if *depth < 0 {
                            return Err(FdtError::new(FdtErrorKind::NotFound, offset));
                        }
                    }
                }
                FdtToken::End => return Err(FdtError::new(FdtErrorKind::NotFound, offset)),
            }
        }
    }

    /// Returns the offset of the root node.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::NotFound`] if the structure block holds no
    /// node, or the error hit while walking it.
    pub fn root_offset(&self) -> Result<usize> {
        self.walk_to_node(0, None)
    }

    /// Returns the offset of the first direct child of the node at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::NotFound`] if the node has no children.
    pub fn first_subnode(&self, offset: usize) -> Result<usize> {
        let mut depth = 0;
        let child = self.next_node(offset, Some(&mut depth))?;
        if depth != 1 {
            return Err(FdtError::new(FdtErrorKind::NotFound, offset));
        }
        Ok(child)
    }

    /// Returns the offset of the next sibling of the node at `offset`,
    /// skipping over its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::NotFound`] if this was the last child of its
    /// parent.
    pub fn next_subnode(&self, offset: usize) -> Result<usize> {
        // Relative to the parent, the next sibling has the same depth as this
        // node.
        let mut depth = 1;
        let mut offset = offset;
        loop {
            offset = self.next_node(offset, Some(&mut depth))?;
            if depth < 1 {
                return Err(FdtError::new(FdtErrorKind::NotFound, offset));
            }
            if depth == 1 {
                return Ok(offset);
            }
        }
    }

    /// Returns the name of the node at `offset`.
    ///
    /// The root node's name is empty. For trees older than version 0x10,
    /// which store full paths, the last path component is returned.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadOffset`] if `offset` isn't a node and
    /// [`FdtErrorKind::BadValue`] if the name isn't valid UTF-8.
    pub fn node_name(&self, offset: usize) -> Result<&'a str> {
        let next = self.check_node_offset(offset)?;
        let name_offset = offset + FDT_TAGSIZE;
        let bytes = self
            .struct_range(name_offset, next - name_offset)
            .ok_or(FdtError::new(FdtErrorKind::Truncated, name_offset))?;
        let name = CStr::from_bytes_until_nul(bytes)
            .map_err(|_e| FdtError::new(FdtErrorKind::Truncated, name_offset))?
            .to_str()
            .map_err(|_e| FdtError::new(FdtErrorKind::BadValue, name_offset))?;

        if !self.can_assume(Assumptions::LATEST) && self.version() < 0x10 {
            return Ok(name.rsplit('/').next().unwrap_or(name));
        }
        Ok(name)
    }

    /// Returns the offset of the direct child of `parent` called `name`.
    ///
    /// A `name` without a unit address also matches a child with one, so
    /// `"memory"` finds `memory@80000000`.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::NotFound`] if there's no such child.
    pub fn subnode_offset(&self, parent: usize, name: &str) -> Result<usize> {
        let mut child = self.first_subnode(parent);
        while let Ok(offset) = child {
            if node_name_matches(self.node_name(offset)?, name) {
                return Ok(offset);
            }
            child = self.next_subnode(offset);
        }
        child
    }

    /// Returns the offset of the node at the given absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`FdtErrorKind::BadPath`] if `path` doesn't start with `/` and
    /// [`FdtErrorKind::NotFound`] if any component is missing.
    pub fn path_offset(&self, path: &str) -> Result<usize> {
        if !path.starts_with('/') {
            return Err(FdtError::new(FdtErrorKind::BadPath, 0));
        }
        let mut offset = self.root_offset()?;
        for component in path.split('/').filter(|s| !s.is_empty()) {
            offset = self.subnode_offset(offset, component)?;
        }
        Ok(offset)
    }

    /// Returns the root node of the device tree.
    ///
    /// # Errors
    ///
    /// Returns the error reported by [`Fdt::root_offset`].
    pub fn root(&self) -> Result<FdtNode<'a>> {
        let offset = self.root_offset()?;
        Ok(FdtNode { fdt: *self, offset })
    }

    /// Finds a node by its path.
    ///
    /// Returns `None` if the path is not absolute or no node exists at it.
    ///
    /// # Performance
    ///
    /// This method traverses the device tree and its performance is linear in
    /// the number of nodes preceding the target.
    pub fn find_node(&self, path: &str) -> Option<Result<FdtNode<'a>>> {
        match self.path_offset(path) {
            Ok(offset) => Some(Ok(FdtNode { fdt: *self, offset })),
            Err(e) if matches!(e.kind, FdtErrorKind::NotFound | FdtErrorKind::BadPath) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

fn node_name_matches(node_name: &str, name: &str) -> bool {
    match node_name.strip_prefix(name) {
        Some("") => true,
        Some(rest) => !name.contains('@') && rest.starts_with('@'),
        None => false,
    }
}

/// A node in a flattened device tree.
#[derive(Debug, Clone, Copy)]
pub struct FdtNode<'a> {
    pub(crate) fdt: Fdt<'a>,
    pub(crate) offset: usize,
}

impl<'a> FdtNode<'a> {
    /// Returns the structure block offset of this node.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the name of this node.
    ///
    /// # Errors
    ///
    /// Returns the error reported by [`Fdt::node_name`].
    pub fn name(&self) -> Result<&'a str> {
        self.fdt.node_name(self.offset)
    }

    /// Returns a property by its name.
    ///
    /// # Performance
    ///
    /// This method iterates through all properties of the node.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while reading the properties.
    pub fn property(&self, name: &str) -> Result<Option<FdtProperty<'a>>> {
        for property in self.properties() {
            let property = property?;
            if property.name() == name {
                return Ok(Some(property));
            }
        }
        Ok(None)
    }

    /// Returns an iterator over the properties of this node.
    pub fn properties(&self) -> impl Iterator<Item = Result<FdtProperty<'a>>> + use<'a> {
        FdtPropIter::Start {
            fdt: self.fdt,
            offset: self.offset,
        }
    }

    /// Returns a child node by its name, matched as in
    /// [`Fdt::subnode_offset`].
    ///
    /// # Performance
    ///
    /// This method's performance is linear in the number of children of this
    /// node because it iterates through the children.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while reading the children.
    pub fn child(&self, name: &str) -> Result<Option<FdtNode<'a>>> {
        match self.fdt.subnode_offset(self.offset, name) {
            Ok(offset) => Ok(Some(FdtNode {
                fdt: self.fdt,
                offset,
            })),
            Err(e) if e.kind == FdtErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns an iterator over the direct children of this node.
    pub fn children(&self) -> impl Iterator<Item = Result<FdtNode<'a>>> + use<'a> {
        FdtChildIter::Start {
            fdt: self.fdt,
            offset: self.offset,
        }
    }

    pub(crate) fn fmt_recursive(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let name = self.name().map_err(|_| fmt::Error)?;
        if name.is_empty() {
            writeln!(f, "{:indent$}/ {{", "", indent = indent)?;
        } else {
            writeln!(f, "{:indent$}{} {{", "", name, indent = indent)?;
        }

        for prop in self.properties() {
            match prop {
                Ok(prop) => prop.fmt(f, indent + 4)?,
                Err(_e) => {
                    writeln!(f, "<Error reading property>")?;
                }
            }
        }

        for child in self.children() {
            writeln!(f)?;
            match child {
                Ok(child) => child.fmt_recursive(f, indent + 4)?,
                Err(_e) => {
                    writeln!(f, "<Error reading child node>")?;
                }
            }
        }

        writeln!(f, "{:indent$}}};", "", indent = indent)
    }
}

/// An iterator over the children of a device tree node.
enum FdtChildIter<'a> {
    Start { fdt: Fdt<'a>, offset: usize },
    Running { fdt: Fdt<'a>, offset: usize },
    Done,
}

impl<'a> Iterator for FdtChildIter<'a> {
    type Item = Result<FdtNode<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (fdt, next) = match *self {
            Self::Start { fdt, offset } => (fdt, fdt.first_subnode(offset)),
            Self::Running { fdt, offset } => (fdt, fdt.next_subnode(offset)),
            Self::Done => return None,
        };
        match next {
            Ok(offset) => {
                *self = Self::Running { fdt, offset };
                Some(Ok(FdtNode { fdt, offset }))
            }
            Err(e) if e.kind == FdtErrorKind::NotFound => {
                *self = Self::Done;
                None
            }
            Err(e) => {
                *self = Self::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_address_matching() {
        assert!(node_name_matches("memory@80000000", "memory"));
        assert!(node_name_matches("memory@80000000", "memory@80000000"));
        assert!(node_name_matches("memory", "memory"));
        assert!(!node_name_matches("memory@80000000", "memory@0"));
        assert!(!node_name_matches("memory-controller", "memory"));
        assert!(!node_name_matches("mem", "memory"));
    }
}
