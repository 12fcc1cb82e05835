//! Concrete implementation of the SFS filesystem engine: one type, `Sfs`,
//! wrapping an `Image` and implementing every trait declared in
//! `sfs_api::fs`.
//!
//! Layout of this crate mirrors the layering of the traits themselves:
//! `block_table` implements `BlockTableSupport`, `directory` implements
//! `DirectorySupport`, `path` implements `PathSupport`, `vfs` implements
//! `VfsSupport`. `Sfs` itself, and the base `FileSystemSupport`
//! operations (`mkfs`/`mountfs`/`unmountfs`), live here in the crate
//! root.

#![deny(missing_docs)]

pub mod block_table;
pub mod directory;
pub mod error;
pub mod path;
pub mod vfs;

use error::Result;
use log::debug;
use sfs_api::controller::Image;
use sfs_api::fs::FileSystemSupport;
use sfs_api::types::{DirEntry, SFS_ROOTDIR_NENTRIES};
use std::path::Path;

/// The SFS filesystem engine: a mounted image, ready to serve block
/// table, directory, path and VFS operations against it.
#[derive(Debug)]
pub struct Sfs {
    image: Image,
}

impl FileSystemSupport for Sfs {
    type Error = error::SfsError;

    fn mkfs<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("mkfs {}", path.as_ref().display());
        let mut image = Image::create(path)?;

        let free_entry = DirEntry::free();
        for i in 0..SFS_ROOTDIR_NENTRIES {
            image.write(
                i * sfs_api::types::SFS_ENTRY_SIZE,
                &free_entry.to_bytes(),
            )?;
        }

        // The block table region is already all-zero from `Image::create`,
        // which does not coincide with `SFS_BLOCKIDX_EMPTY` (0xFFFE); make
        // every slot explicitly free so a freshly formatted image reads
        // the same way an existing one does after every block has been
        // freed.
        let mut sfs = Sfs { image };
        for i in 0..sfs_api::types::SFS_BLOCKTBL_NENTRIES {
            sfs.image.write(
                sfs_api::types::SFS_BLOCKTBL_OFF + i * 2,
                &sfs_api::types::SFS_BLOCKIDX_EMPTY.to_le_bytes(),
            )?;
        }

        Ok(sfs)
    }

    fn mountfs<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("mountfs {}", path.as_ref().display());
        let image = Image::open(path)?;
        Ok(Sfs { image })
    }

    fn unmountfs(self) -> Image {
        self.image
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::Sfs;
    use sfs_api::fs::FileSystemSupport;
    use std::fs::{create_dir_all, remove_dir, remove_file};
    use std::path::PathBuf;

    pub fn image_prep_path(name: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("fs-images-engine-".to_string() + name);
        path.push("img");

        if path.exists() {
            remove_file(&path).unwrap();
        }
        create_dir_all(path.parent().unwrap()).unwrap();
        path
    }

    pub fn fresh(name: &str) -> Sfs {
        let path = image_prep_path(name);
        Sfs::mkfs(path).unwrap()
    }

    pub fn destruct(sfs: Sfs) {
        let image = sfs.unmountfs();
        let path = image.path().to_owned();
        image.destruct();
        let _ = remove_dir(path.parent().unwrap());
    }
}
