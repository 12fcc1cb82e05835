//! Directory codec: reading and writing the fixed-width `DirEntry`
//! records that make up the root directory region, and the two-block
//! directories that live in the data-block region.

use crate::error::{Result, SfsError};
use crate::Sfs;
use sfs_api::fs::{BlockTableSupport, DirectorySupport};
use sfs_api::types::{
    BlockIdx, DirEntry, SFS_BLOCK_SIZE, SFS_DIR_NENTRIES, SFS_ENTRY_SIZE, SFS_ROOTDIR_NENTRIES,
    SFS_ROOTDIR_OFF,
};

impl DirectorySupport for Sfs {
    fn load_root(&self) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::with_capacity(SFS_ROOTDIR_NENTRIES as usize);
        for i in 0..SFS_ROOTDIR_NENTRIES {
            let raw = self
                .image
                .read(SFS_ROOTDIR_OFF + i * SFS_ENTRY_SIZE, SFS_ENTRY_SIZE)?;
            entries.push(DirEntry::from_bytes(&raw));
        }
        Ok(entries)
    }

    fn store_root(&mut self, entries: &[DirEntry]) -> Result<()> {
        if entries.len() as u64 != SFS_ROOTDIR_NENTRIES {
            return Err(SfsError::InvalidInput(
                "wrong number of entries for the root directory",
            ));
        }
        for (i, e) in entries.iter().enumerate() {
            self.image
                .write(SFS_ROOTDIR_OFF + i as u64 * SFS_ENTRY_SIZE, &e.to_bytes())?;
        }
        Ok(())
    }

    fn load_dir(&self, first: BlockIdx) -> Result<Vec<DirEntry>> {
        let second = self.bt_get(first as u64)?;
        let b1 = self.b_get(first as u64)?;
        let b2 = self.b_get(second as u64)?;

        let mut entries = Vec::with_capacity(SFS_DIR_NENTRIES as usize);
        let per_block = (SFS_BLOCK_SIZE / SFS_ENTRY_SIZE) as usize;
        for i in 0..per_block {
            let off = i as u64 * SFS_ENTRY_SIZE;
            let mut raw = [0u8; SFS_ENTRY_SIZE as usize];
            b1.read_data(&mut raw, off)?;
            entries.push(DirEntry::from_bytes(&raw));
        }
        for i in 0..per_block {
            let off = i as u64 * SFS_ENTRY_SIZE;
            let mut raw = [0u8; SFS_ENTRY_SIZE as usize];
            b2.read_data(&mut raw, off)?;
            entries.push(DirEntry::from_bytes(&raw));
        }
        Ok(entries)
    }

    fn store_dir(&mut self, first: BlockIdx, entries: &[DirEntry]) -> Result<()> {
        if entries.len() as u64 != SFS_DIR_NENTRIES {
            return Err(SfsError::InvalidInput(
                "wrong number of entries for a directory",
            ));
        }
        let second = self.bt_get(first as u64)?;
        let per_block = (SFS_BLOCK_SIZE / SFS_ENTRY_SIZE) as usize;

        let mut b1 = self.b_get(first as u64)?;
        for (i, e) in entries[..per_block].iter().enumerate() {
            b1.write_data(&e.to_bytes(), i as u64 * SFS_ENTRY_SIZE)?;
        }
        self.b_put(&b1)?;

        let mut b2 = self.b_get(second as u64)?;
        for (i, e) in entries[per_block..].iter().enumerate() {
            b2.write_data(&e.to_bytes(), i as u64 * SFS_ENTRY_SIZE)?;
        }
        self.b_put(&b2)?;
        Ok(())
    }

    fn find_named(entries: &[DirEntry], name: &str) -> Option<usize> {
        entries
            .iter()
            .position(|e| !e.is_free() && e.name() == name)
    }

    fn find_empty(entries: &[DirEntry]) -> Option<usize> {
        entries.iter().position(DirEntry::is_free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{destruct, fresh};
    use sfs_api::fs::BlockTableSupport;

    #[test]
    fn fresh_root_is_all_free() {
        let sfs = fresh("root-free");
        let entries = sfs.load_root().unwrap();
        assert_eq!(entries.len(), SFS_ROOTDIR_NENTRIES as usize);
        assert!(entries.iter().all(DirEntry::is_free));
        destruct(sfs);
    }

    #[test]
    fn root_roundtrip() {
        let mut sfs = fresh("root-roundtrip");
        let mut entries = sfs.load_root().unwrap();
        let mut e = DirEntry::free();
        e.set_name("a.txt").unwrap();
        entries[0] = e;
        sfs.store_root(&entries).unwrap();

        let reloaded = sfs.load_root().unwrap();
        assert_eq!(reloaded[0].name(), "a.txt");
        destruct(sfs);
    }

    #[test]
    fn subdir_roundtrip_across_both_blocks() {
        let mut sfs = fresh("subdir-roundtrip");
        let head = sfs.find_free_pair().unwrap() as BlockIdx;
        let mut entries = sfs.load_dir(head).unwrap();
        assert_eq!(entries.len(), SFS_DIR_NENTRIES as usize);
        assert!(entries.iter().all(DirEntry::is_free));

        let per_block = (SFS_BLOCK_SIZE / SFS_ENTRY_SIZE) as usize;
        let mut first = DirEntry::free();
        first.set_name("in-block-one").unwrap();
        entries[0] = first;
        let mut second = DirEntry::free();
        second.set_name("in-block-two").unwrap();
        entries[per_block] = second;

        sfs.store_dir(head, &entries).unwrap();
        let reloaded = sfs.load_dir(head).unwrap();
        assert_eq!(reloaded[0].name(), "in-block-one");
        assert_eq!(reloaded[per_block].name(), "in-block-two");
        destruct(sfs);
    }

    #[test]
    fn find_named_and_find_empty() {
        let mut entries = vec![DirEntry::free(); 4];
        let mut e = DirEntry::free();
        e.set_name("x").unwrap();
        entries[2] = e;
        assert_eq!(Sfs::find_named(&entries, "x"), Some(2));
        assert_eq!(Sfs::find_named(&entries, "y"), None);
        assert_eq!(Sfs::find_empty(&entries), Some(0));
    }
}
