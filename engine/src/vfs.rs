//! The mutating VFS operations: `getattr`, `readdir`, `read`, `write`,
//! `create`, `unlink`, `mkdir`, `rmdir`, `truncate`, `rename`.
//!
//! Every operation resolves its path (or its parent path) through
//! [`PathSupport::resolve`], then reads the entry list it lives in,
//! mutates the in-memory copy, and writes the whole list back (the same
//! load-modify-store shape the block-table and directory layers use
//! underneath).

use crate::error::{Result, SfsError};
use crate::Sfs;
use sfs_api::fs::{
    BlockTableSupport, DirLoc, DirectorySupport, PathSupport, Resolved, VfsSupport,
};
use sfs_api::types::{DirEntry, FileAttr, SFS_BLOCK_SIZE, SFS_DIRECTORY};

impl Sfs {
    fn load_loc(&self, loc: DirLoc) -> Result<Vec<DirEntry>> {
        match loc {
            DirLoc::Root => self.load_root(),
            DirLoc::Sub(first) => self.load_dir(first),
        }
    }

    fn store_loc(&mut self, loc: DirLoc, entries: &[DirEntry]) -> Result<()> {
        match loc {
            DirLoc::Root => self.store_root(entries),
            DirLoc::Sub(first) => self.store_dir(first, entries),
        }
    }

    /// Split `path` into its parent path and its final component name.
    ///
    /// Deliberately does not route the whole path through `valid_path`:
    /// that check also rejects an overlong final component, and callers
    /// need to tell that case apart (`NameTooLong`) from a structurally
    /// malformed path (`InvalidInput`). Only the parent portion is
    /// checked here; the final component's length is the caller's job.
    fn split_parent(path: &str) -> Result<(String, String)> {
        if !path.starts_with('/') || path == "/" || path.ends_with('/') {
            return Err(SfsError::InvalidInput("malformed path"));
        }
        let idx = path.rfind('/').unwrap();
        let name = path[idx + 1..].to_string();
        let parent = if idx == 0 {
            "/".to_string()
        } else {
            path[..idx].to_string()
        };
        if parent != "/" && !Self::valid_path(&parent) {
            return Err(SfsError::InvalidInput("malformed path"));
        }
        Ok((parent, name))
    }

    /// Resolve the directory a new entry named by `path`'s last component
    /// would be created in: its storage location and current entries.
    fn resolve_parent(&self, path: &str) -> Result<(DirLoc, Vec<DirEntry>, String)> {
        let (parent_path, name) = Self::split_parent(path)?;
        if name.len() >= sfs_api::types::SFS_FILENAME_SIZE {
            return Err(SfsError::NameTooLong(name));
        }

        let loc = if parent_path == "/" {
            DirLoc::Root
        } else {
            let parent = self.resolve(&parent_path)?;
            if !parent.entry.is_directory() {
                return Err(SfsError::NotSupported(parent_path));
            }
            DirLoc::Sub(parent.entry.first_block)
        };
        let entries = self.load_loc(loc)?;
        Ok((loc, entries, name))
    }

    fn write_resolved(&mut self, resolved: &Resolved, entry: DirEntry) -> Result<()> {
        let mut entries = self.load_loc(resolved.parent)?;
        entries[resolved.slot] = entry;
        self.store_loc(resolved.parent, &entries)
    }
}

impl VfsSupport for Sfs {
    fn getattr(&self, path: &str) -> Result<FileAttr> {
        if path == "/" {
            return Ok(FileAttr::directory(0));
        }
        let resolved = self.resolve(path)?;
        let size = resolved.entry.reported_size() as u64;
        Ok(if resolved.entry.is_directory() {
            FileAttr::directory(size)
        } else {
            FileAttr::file(size)
        })
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let entries = if path == "/" {
            self.load_root()?
        } else {
            let resolved = self.resolve(path)?;
            if !resolved.entry.is_directory() {
                return Err(SfsError::NotSupported(path.to_string()));
            }
            self.load_dir(resolved.entry.first_block)?
        };
        Ok(entries
            .iter()
            .filter(|e| !e.is_free())
            .map(DirEntry::name)
            .collect())
    }

    fn read(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<u64> {
        let resolved = self.resolve(path)?;
        if resolved.entry.is_directory() {
            return Err(SfsError::NotSupported(path.to_string()));
        }
        let size = resolved.entry.reported_size() as u64;
        if offset >= size {
            return Ok(0);
        }
        let to_read = std::cmp::min(buf.len() as u64, size - offset) as usize;

        let chain = self.chain_follow(resolved.entry.first_block)?;
        let mut written = 0usize;
        let mut pos = offset;
        while written < to_read {
            let block_idx = (pos / SFS_BLOCK_SIZE) as usize;
            let block_off = pos % SFS_BLOCK_SIZE;
            let block = self.b_get(chain[block_idx])?;
            let n = std::cmp::min(SFS_BLOCK_SIZE - block_off, (to_read - written) as u64) as usize;
            block.read_data(&mut buf[written..written + n], block_off)?;
            written += n;
            pos += n as u64;
        }
        Ok(written as u64)
    }

    fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<u64> {
        let resolved = self.resolve(path)?;
        if resolved.entry.is_directory() {
            return Err(SfsError::NotSupported(path.to_string()));
        }

        let old_size = resolved.entry.reported_size() as u64;
        let new_size = std::cmp::max(old_size, offset + data.len() as u64);

        let old_blocks = if resolved.entry.first_block == sfs_api::types::SFS_BLOCKIDX_END {
            0
        } else {
            self.chain_length(resolved.entry.first_block)?
        };
        let new_blocks = (new_size + SFS_BLOCK_SIZE - 1) / SFS_BLOCK_SIZE;
        let first_block = if new_blocks > old_blocks {
            self.chain_append(resolved.entry.first_block, new_blocks - old_blocks)?
        } else {
            resolved.entry.first_block
        };

        let chain = self.chain_follow(first_block)?;

        // Zero the gap exposed between the old end of file and the start
        // of this write, if the write starts past the current size.
        if offset > old_size {
            let mut pos = old_size;
            while pos < offset {
                let block_idx = (pos / SFS_BLOCK_SIZE) as usize;
                let block_off = pos % SFS_BLOCK_SIZE;
                let n = std::cmp::min(SFS_BLOCK_SIZE - block_off, offset - pos);
                let mut block = self.b_get(chain[block_idx])?;
                block.write_data(&vec![0u8; n as usize], block_off)?;
                self.b_put(&block)?;
                pos += n;
            }
        }

        let mut written = 0usize;
        let mut pos = offset;
        while written < data.len() {
            let block_idx = (pos / SFS_BLOCK_SIZE) as usize;
            let block_off = pos % SFS_BLOCK_SIZE;
            let n = std::cmp::min(SFS_BLOCK_SIZE - block_off, (data.len() - written) as u64) as usize;
            let mut block = self.b_get(chain[block_idx])?;
            block.write_data(&data[written..written + n], block_off)?;
            self.b_put(&block)?;
            written += n;
            pos += n as u64;
        }

        let mut entry = resolved.entry;
        entry.first_block = first_block;
        entry.size = new_size as u32;
        self.write_resolved(&resolved, entry)?;

        Ok(written as u64)
    }

    fn create(&mut self, path: &str) -> Result<()> {
        let (loc, mut entries, name) = self.resolve_parent(path)?;
        if DirectorySupport::find_named(&entries[..], &name).is_some() {
            return Err(SfsError::AlreadyExists(path.to_string()));
        }
        let slot = DirectorySupport::find_empty(&entries[..])
            .ok_or_else(|| SfsError::NoSpace)?;

        let mut entry = DirEntry::free();
        entry
            .set_name(&name)
            .map_err(|_| SfsError::NameTooLong(name.clone()))?;
        entry.size = 0;
        entry.first_block = sfs_api::types::SFS_BLOCKIDX_END;
        entries[slot] = entry;
        self.store_loc(loc, &entries)
    }

    fn unlink(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved.entry.is_directory() {
            return Err(SfsError::NotSupported(path.to_string()));
        }
        if resolved.entry.first_block != sfs_api::types::SFS_BLOCKIDX_END {
            self.chain_free(resolved.entry.first_block)?;
        }
        self.write_resolved(&resolved, DirEntry::free())
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        let (loc, mut entries, name) = self.resolve_parent(path)?;
        if DirectorySupport::find_named(&entries[..], &name).is_some() {
            return Err(SfsError::AlreadyExists(path.to_string()));
        }
        let slot = DirectorySupport::find_empty(&entries[..])
            .ok_or_else(|| SfsError::NoSpace)?;

        let first = self.find_free_pair()? as sfs_api::types::BlockIdx;
        let empty_entries = vec![DirEntry::free(); sfs_api::types::SFS_DIR_NENTRIES as usize];
        self.store_dir(first, &empty_entries)?;

        let mut entry = DirEntry::free();
        entry
            .set_name(&name)
            .map_err(|_| SfsError::NameTooLong(name.clone()))?;
        entry.size = SFS_DIRECTORY;
        entry.first_block = first;

        entries[slot] = entry;
        self.store_loc(loc, &entries)
    }

    fn rmdir(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        if !resolved.entry.is_directory() {
            return Err(SfsError::NotSupported(path.to_string()));
        }
        let contents = self.load_dir(resolved.entry.first_block)?;
        if contents.iter().any(|e| !e.is_free()) {
            return Err(SfsError::NotEmpty(path.to_string()));
        }

        let second = self.bt_get(resolved.entry.first_block as u64)?;
        self.bt_put(resolved.entry.first_block as u64, sfs_api::types::SFS_BLOCKIDX_EMPTY)?;
        self.bt_put(second as u64, sfs_api::types::SFS_BLOCKIDX_EMPTY)?;

        self.write_resolved(&resolved, DirEntry::free())
    }

    fn truncate(&mut self, path: &str, size: u64) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved.entry.is_directory() {
            return Err(SfsError::NotSupported(path.to_string()));
        }

        let old_size = resolved.entry.reported_size() as u64;
        let old_blocks = (old_size + SFS_BLOCK_SIZE - 1) / SFS_BLOCK_SIZE;
        let new_blocks = (size + SFS_BLOCK_SIZE - 1) / SFS_BLOCK_SIZE;

        let mut first_block = resolved.entry.first_block;

        if new_blocks < old_blocks {
            let chain = self.chain_follow(first_block)?;
            for &b in &chain[new_blocks as usize..] {
                self.bt_put(b, sfs_api::types::SFS_BLOCKIDX_EMPTY)?;
            }
            first_block = if new_blocks == 0 {
                sfs_api::types::SFS_BLOCKIDX_END
            } else {
                self.bt_put(chain[new_blocks as usize - 1], sfs_api::types::SFS_BLOCKIDX_END)?;
                first_block
            };
        } else if new_blocks > old_blocks {
            first_block = self.chain_append(first_block, new_blocks - old_blocks)?;
        }

        // Newly appended blocks already come back zeroed from `find_free`,
        // but a grow that stays within the same block count (or that
        // retains the old last block) exposes whatever bytes a previous
        // write left past `old_size`. Zero the whole `[old_size, size)`
        // gap through the chain so a read afterwards sees zeros there
        // either way.
        if size > old_size {
            let chain = self.chain_follow(first_block)?;
            let mut pos = old_size;
            while pos < size {
                let block_idx = (pos / SFS_BLOCK_SIZE) as usize;
                let block_off = pos % SFS_BLOCK_SIZE;
                let n = std::cmp::min(SFS_BLOCK_SIZE - block_off, size - pos);
                let mut block = self.b_get(chain[block_idx])?;
                block.write_data(&vec![0u8; n as usize], block_off)?;
                self.b_put(&block)?;
                pos += n;
            }
        }

        let mut entry = resolved.entry;
        entry.first_block = first_block;
        entry.size = size as u32;
        self.write_resolved(&resolved, entry)
    }

    fn rename(&mut self, path: &str, new_path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        let (dest_loc, mut dest_entries, dest_name) = self.resolve_parent(new_path)?;

        if DirectorySupport::find_named(&dest_entries[..], &dest_name).is_some() {
            return Err(SfsError::AlreadyExists(new_path.to_string()));
        }
        let dest_slot = DirectorySupport::find_empty(&dest_entries[..])
            .ok_or_else(|| SfsError::NoSpace)?;

        let mut moved = resolved.entry;
        moved
            .set_name(&dest_name)
            .map_err(|_| SfsError::NameTooLong(dest_name.clone()))?;

        if resolved.parent == dest_loc {
            dest_entries[resolved.slot] = DirEntry::free();
            dest_entries[dest_slot] = moved;
            self.store_loc(dest_loc, &dest_entries)
        } else {
            dest_entries[dest_slot] = moved;
            self.store_loc(dest_loc, &dest_entries)?;
            self.write_resolved(&resolved, DirEntry::free())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{destruct, fresh};

    #[test]
    fn create_read_write_roundtrip() {
        let mut sfs = fresh("rw-roundtrip");
        sfs.create("/f.txt").unwrap();
        let n = sfs.write("/f.txt", 0, b"hello world").unwrap();
        assert_eq!(n, 11);

        let mut buf = [0u8; 11];
        let r = sfs.read("/f.txt", 0, &mut buf).unwrap();
        assert_eq!(r, 11);
        assert_eq!(&buf, b"hello world");

        let attr = sfs.getattr("/f.txt").unwrap();
        assert_eq!(attr.size, 11);
        destruct(sfs);
    }

    #[test]
    fn write_past_eof_zero_fills_the_gap() {
        let mut sfs = fresh("write-gap");
        sfs.create("/f.txt").unwrap();
        sfs.write("/f.txt", 0, b"ab").unwrap();
        sfs.write("/f.txt", 10, b"cd").unwrap();

        let mut buf = [0xffu8; 12];
        sfs.read("/f.txt", 0, &mut buf).unwrap();
        assert_eq!(&buf[0..2], b"ab");
        assert_eq!(&buf[2..10], &[0u8; 8]);
        assert_eq!(&buf[10..12], b"cd");
        destruct(sfs);
    }

    #[test]
    fn write_spanning_multiple_blocks() {
        let mut sfs = fresh("write-multi-block");
        sfs.create("/big.bin").unwrap();
        let data = vec![0x42u8; (SFS_BLOCK_SIZE * 3) as usize + 17];
        sfs.write("/big.bin", 0, &data).unwrap();

        let mut buf = vec![0u8; data.len()];
        let n = sfs.read("/big.bin", 0, &mut buf).unwrap();
        assert_eq!(n as usize, data.len());
        assert_eq!(buf, data);
        destruct(sfs);
    }

    #[test]
    fn mkdir_readdir_rmdir() {
        let mut sfs = fresh("mkdir-rmdir");
        sfs.mkdir("/sub").unwrap();
        assert_eq!(sfs.readdir("/").unwrap(), vec!["sub".to_string()]);

        sfs.create("/sub/inner.txt").unwrap();
        assert_eq!(sfs.readdir("/sub").unwrap(), vec!["inner.txt".to_string()]);

        assert!(sfs.rmdir("/sub").is_err());
        sfs.unlink("/sub/inner.txt").unwrap();
        sfs.rmdir("/sub").unwrap();
        assert!(sfs.readdir("/").unwrap().is_empty());
        destruct(sfs);
    }

    #[test]
    fn truncate_shrinks_and_grows() {
        let mut sfs = fresh("truncate");
        sfs.create("/f.txt").unwrap();
        sfs.write("/f.txt", 0, &vec![1u8; (SFS_BLOCK_SIZE * 2) as usize]).unwrap();

        sfs.truncate("/f.txt", SFS_BLOCK_SIZE / 2).unwrap();
        assert_eq!(sfs.getattr("/f.txt").unwrap().size, SFS_BLOCK_SIZE / 2);

        sfs.truncate("/f.txt", SFS_BLOCK_SIZE * 3).unwrap();
        let attr = sfs.getattr("/f.txt").unwrap();
        assert_eq!(attr.size, SFS_BLOCK_SIZE * 3);

        let mut buf = vec![0u8; 16];
        sfs.read("/f.txt", SFS_BLOCK_SIZE * 2, &mut buf).unwrap();
        assert_eq!(buf, vec![0u8; 16]);
        destruct(sfs);
    }

    #[test]
    fn truncate_to_zero_frees_every_block() {
        let mut sfs = fresh("truncate-zero");
        sfs.create("/f.txt").unwrap();
        sfs.write("/f.txt", 0, &vec![9u8; SFS_BLOCK_SIZE as usize]).unwrap();
        sfs.truncate("/f.txt", 0).unwrap();
        let resolved = sfs.resolve("/f.txt").unwrap();
        assert_eq!(resolved.entry.first_block, sfs_api::types::SFS_BLOCKIDX_END);
        destruct(sfs);
    }

    #[test]
    fn rename_within_same_directory() {
        let mut sfs = fresh("rename-same-dir");
        sfs.create("/old.txt").unwrap();
        sfs.write("/old.txt", 0, b"data").unwrap();
        sfs.rename("/old.txt", "/new.txt").unwrap();

        assert!(sfs.resolve("/old.txt").is_err());
        let mut buf = [0u8; 4];
        sfs.read("/new.txt", 0, &mut buf).unwrap();
        assert_eq!(&buf, b"data");
        destruct(sfs);
    }

    #[test]
    fn rename_across_directories() {
        let mut sfs = fresh("rename-cross-dir");
        sfs.mkdir("/dst").unwrap();
        sfs.create("/f.txt").unwrap();
        sfs.rename("/f.txt", "/dst/f.txt").unwrap();

        assert!(sfs.resolve("/f.txt").is_err());
        assert!(sfs.resolve("/dst/f.txt").is_ok());
        destruct(sfs);
    }

    #[test]
    fn rename_refuses_to_clobber_existing_destination() {
        let mut sfs = fresh("rename-clobber");
        sfs.create("/a.txt").unwrap();
        sfs.create("/b.txt").unwrap();
        assert!(sfs.rename("/a.txt", "/b.txt").is_err());
        destruct(sfs);
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let mut sfs = fresh("create-dup");
        sfs.create("/a.txt").unwrap();
        assert!(sfs.create("/a.txt").is_err());
        destruct(sfs);
    }

    #[test]
    fn create_and_mkdir_reject_overlong_basename_with_name_too_long() {
        let mut sfs = fresh("name-too-long");
        let too_long = "x".repeat(sfs_api::types::SFS_FILENAME_SIZE);
        let path = format!("/{}", too_long);

        assert!(matches!(
            sfs.create(&path),
            Err(SfsError::NameTooLong(_))
        ));
        assert!(matches!(
            sfs.mkdir(&path),
            Err(SfsError::NameTooLong(_))
        ));

        let just_fits = "x".repeat(sfs_api::types::SFS_FILENAME_SIZE - 1);
        sfs.create(&format!("/{}", just_fits)).unwrap();
        destruct(sfs);
    }

    #[test]
    fn truncate_grow_zeroes_stale_bytes_left_by_a_prior_write() {
        let mut sfs = fresh("truncate-grow-stale");
        sfs.create("/f.txt").unwrap();
        sfs.write("/f.txt", 0, b"ABCDE").unwrap();
        sfs.truncate("/f.txt", 3).unwrap();
        sfs.truncate("/f.txt", 5).unwrap();

        let mut buf = [0u8; 5];
        sfs.read("/f.txt", 0, &mut buf).unwrap();
        assert_eq!(&buf, b"ABC\0\0");
        destruct(sfs);
    }

    #[test]
    fn truncate_grow_across_a_new_block_zeroes_old_tail_and_new_block() {
        let mut sfs = fresh("truncate-grow-new-block");
        sfs.create("/f.txt").unwrap();
        sfs.write("/f.txt", 0, &vec![0x42u8; SFS_BLOCK_SIZE as usize]).unwrap();
        sfs.truncate("/f.txt", SFS_BLOCK_SIZE - 5).unwrap();
        sfs.truncate("/f.txt", SFS_BLOCK_SIZE + 5).unwrap();

        let mut buf = vec![0u8; 10];
        sfs.read("/f.txt", SFS_BLOCK_SIZE - 5, &mut buf).unwrap();
        assert_eq!(buf, vec![0u8; 10]);
        destruct(sfs);
    }
}
