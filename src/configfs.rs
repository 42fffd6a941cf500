// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Applying overlays through the Linux device tree overlay configfs
//! interface.
//!
//! Each overlay lives in a directory under the configfs root. Writing the
//! blob to the directory's `dtbo` attribute applies it, its `status`
//! attribute then reads `applied`, and removing the directory reverts it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dtboverlay_device_tree::{ChangeSetId, OverlayHost};
use log::{debug, info, warn};

const ENTRY_PREFIX: &str = "dtboverlay-";

/// Overlays managed through a configfs `device-tree/overlays` directory.
#[derive(Debug)]
pub struct ConfigfsOverlays {
    root: PathBuf,
}

impl ConfigfsOverlays {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry(&self, id: ChangeSetId) -> PathBuf {
        self.root.join(format!("{ENTRY_PREFIX}{id}"))
    }

    /// Returns the ids of the overlays this tool has applied.
    pub fn applied(&self) -> io::Result<Vec<ChangeSetId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            if let Some(id) = name
                .to_str()
                .and_then(|name| name.strip_prefix(ENTRY_PREFIX))
                .and_then(|id| id.parse().ok())
            {
                ids.push(ChangeSetId(id));
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn next_id(&self) -> io::Result<ChangeSetId> {
        let last = self.applied()?.last().map_or(0, |id| id.0);
        let next = last
            .checked_add(1)
            .ok_or_else(|| io::Error::other("change set ids exhausted"))?;
        Ok(ChangeSetId(next))
    }

    fn check_status(dir: &Path) -> io::Result<()> {
        match fs::read_to_string(dir.join("status")) {
            Ok(status) if status.trim() == "applied" => Ok(()),
            Ok(status) => Err(io::Error::other(format!(
                "overlay status is {:?}",
                status.trim()
            ))),
            // Only present on a real configfs mount.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Removes an overlay directory. On configfs `rmdir` reverts the overlay
    /// even though `dtbo` is listed; a plain directory needs it unlinked
    /// first.
    fn remove_entry(dir: &Path) -> io::Result<()> {
        match fs::remove_dir(dir) {
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                fs::remove_file(dir.join("dtbo"))?;
                fs::remove_dir(dir)
            }
            result => result,
        }
    }
}

impl OverlayHost for ConfigfsOverlays {
    type Error = io::Error;

    fn apply(&mut self, blob: &[u8]) -> io::Result<ChangeSetId> {
        let id = self.next_id()?;
        let dir = self.entry(id);
        debug!("creating {}", dir.display());
        fs::create_dir(&dir)?;

        let applied = fs::write(dir.join("dtbo"), blob).and_then(|()| Self::check_status(&dir));
        if let Err(e) = applied {
            if let Err(cleanup) = Self::remove_entry(&dir) {
                warn!("failed to remove {}: {cleanup}", dir.display());
            }
            return Err(e);
        }

        info!("applied overlay as {}", dir.display());
        Ok(id)
    }

    fn remove(&mut self, id: ChangeSetId) -> io::Result<()> {
        let dir = self.entry(id);
        debug!("removing {}", dir.display());
        Self::remove_entry(&dir)?;
        info!("removed overlay {id}");
        Ok(())
    }
}
