//! Path resolver: walks a slash-separated absolute path down through
//! nested directories, starting at the root directory region.
//!
//! The original reference silently descends into a file's data blocks if
//! an interior path component happens to name a file rather than a
//! directory (reading garbage `DirEntry`-shaped bytes out of it). This
//! implementation checks the `SFS_DIRECTORY` bit on every interior
//! component and reports `NotFound` instead.

use crate::error::{Result, SfsError};
use crate::Sfs;
use sfs_api::fs::{DirLoc, DirectorySupport, PathSupport, Resolved};
use sfs_api::types::SFS_FILENAME_SIZE;

impl Sfs {
    /// Split a validated absolute path into its `/`-separated component
    /// names.
    fn components(path: &str) -> Vec<&str> {
        path.split('/').filter(|c| !c.is_empty()).collect()
    }
}

impl PathSupport for Sfs {
    fn valid_path(path: &str) -> bool {
        if !path.starts_with('/') {
            return false;
        }
        if path.len() > 1 && path.ends_with('/') {
            return false;
        }
        let components = Self::components(path);
        if path != "/" && components.is_empty() {
            return false;
        }
        components
            .iter()
            .all(|c| !c.is_empty() && c.len() < SFS_FILENAME_SIZE)
    }

    fn resolve(&self, path: &str) -> Result<Resolved> {
        if !Self::valid_path(path) {
            return Err(SfsError::InvalidInput("malformed path"));
        }
        if path == "/" {
            return Err(SfsError::InvalidInput(
                "the root directory has no directory entry of its own",
            ));
        }

        let components = Self::components(path);
        let mut entries = self.load_root()?;
        let mut loc = DirLoc::Root;

        for (depth, name) in components.iter().enumerate() {
            let last = depth == components.len() - 1;
            let slot = DirectorySupport::find_named(&entries[..], name)
                .ok_or_else(|| SfsError::NotFound(path.to_string()))?;
            let entry = entries[slot];

            if last {
                return Ok(Resolved {
                    entry,
                    parent: loc,
                    slot,
                });
            }

            if !entry.is_directory() {
                return Err(SfsError::NotFound(path.to_string()));
            }
            loc = DirLoc::Sub(entry.first_block);
            entries = self.load_dir(entry.first_block)?;
        }

        unreachable!("a valid non-root path has at least one component")
    }
}
