//! Core types used across the SFS engine: the `Buffer`/`Block` raw-memory
//! abstraction, the on-disk layout constants, the directory entry layout,
//! and the `FileAttr` record handed back to `getattr`.

use super::error::{ImageError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::prelude::*;
use std::io::{Cursor, SeekFrom};
use std::time::SystemTime;

/// Buffer abstraction representing some data held on the heap. Used both
/// for whole-block contents and as scratch space for reading/writing
/// sub-ranges of a block.
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer {
    contents: Box<[u8]>,
}

impl Buffer {
    /// Create a new buffer wrapping the given bytes.
    pub fn new(data: Box<[u8]>) -> Buffer {
        Buffer { contents: data }
    }

    /// Create an all-zero buffer of the given length.
    pub fn new_zero(len: u64) -> Buffer {
        Buffer {
            contents: vec![0; len as usize].into_boxed_slice(),
        }
    }

    /// Length of the underlying data, in bytes.
    pub fn len(&self) -> u64 {
        self.contents.len() as u64
    }

    /// Is this buffer empty?
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Borrow the buffer's contents.
    pub fn contents_as_ref(&self) -> &[u8] {
        &self.contents
    }

    /// Read `data.len()` bytes starting at `offset` into `data`.
    pub fn read_data(&self, data: &mut [u8], offset: u64) -> Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(ImageError::BlockInput(
                "trying to read beyond the bounds of the block",
            ));
        }
        let mut c = Cursor::new(&self.contents);
        c.seek(SeekFrom::Start(offset))?;
        c.read_exact(data).map_err(|e| e.into())
    }

    /// Write `data` starting at `offset`.
    pub fn write_data(&mut self, data: &[u8], offset: u64) -> Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(ImageError::BlockInput(
                "trying to write beyond the bounds of the block",
            ));
        }
        let mut c = Cursor::new(&mut self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        c.write_all(data).map_err(|e| e.into())
    }

    /// Deserialize a fixed-width scalar value starting at `offset`.
    pub fn deserialize_from<S>(&self, offset: u64) -> Result<S>
    where
        S: DeserializeOwned,
    {
        let mut c = Cursor::new(&self.contents);
        c.seek(SeekFrom::Start(offset))?;
        Ok(bincode::deserialize_from(c)?)
    }

    /// Serialize a fixed-width scalar value into the buffer at `offset`.
    /// Goes through `write_data` so out-of-bounds writes raise the same
    /// error as a raw write would.
    pub fn serialize_into<S>(&mut self, value: &S, offset: u64) -> Result<()>
    where
        S: Serialize,
    {
        let bytes = bincode::serialize(value)?;
        self.write_data(&bytes, offset)
    }
}

/// A block of data read from, or about to be written to, the image, tagged
/// with its own block index.
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    /// Index of this block within the data-block region.
    pub block_no: u64,
    buf: Buffer,
}

impl Block {
    /// Wrap `data` as the contents of block `block_no`.
    pub fn new(block_no: u64, data: Box<[u8]>) -> Block {
        Block {
            block_no,
            buf: Buffer::new(data),
        }
    }

    /// An all-zero block of the given length.
    pub fn new_zero(block_no: u64, len: u64) -> Block {
        Block {
            block_no,
            buf: Buffer::new_zero(len),
        }
    }

    /// Length of the block's contents.
    pub fn len(&self) -> u64 {
        self.buf.len()
    }

    /// Is this block empty (zero-length)?
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the block's contents.
    pub fn contents_as_ref(&self) -> &[u8] {
        self.buf.contents_as_ref()
    }

    /// Read bytes out of the block at `offset`.
    pub fn read_data(&self, data: &mut [u8], offset: u64) -> Result<()> {
        self.buf.read_data(data, offset)
    }

    /// Write bytes into the block at `offset`.
    pub fn write_data(&mut self, data: &[u8], offset: u64) -> Result<()> {
        self.buf.write_data(data, offset)
    }

    /// Deserialize a fixed-width scalar value out of the block at `offset`.
    pub fn deserialize_from<S>(&self, offset: u64) -> Result<S>
    where
        S: DeserializeOwned,
    {
        self.buf.deserialize_from(offset)
    }

    /// Serialize a fixed-width scalar value into the block at `offset`.
    pub fn serialize_into<S>(&mut self, value: &S, offset: u64) -> Result<()>
    where
        S: Serialize,
    {
        self.buf.serialize_into(value, offset)
    }
}

// ---------------------------------------------------------------------
// On-disk layout constants
// ---------------------------------------------------------------------

/// Width of a block-table entry / index on disk.
pub type BlockIdx = u16;

/// Sentinel marking a free block-table slot.
pub const SFS_BLOCKIDX_EMPTY: BlockIdx = 0xFFFE;
/// Sentinel marking the last block of a chain.
pub const SFS_BLOCKIDX_END: BlockIdx = 0xFFFF;

/// High bit of a directory entry's `size` field, marking it as a directory.
pub const SFS_DIRECTORY: u32 = 0x8000_0000;

/// Size, in bytes, of one data block.
pub const SFS_BLOCK_SIZE: u64 = 1024;

/// Maximum number of bytes a directory entry's `filename` field holds,
/// including the NUL terminator.
pub const SFS_FILENAME_SIZE: usize = 58;

/// On-disk size of one directory entry, in bytes (58-byte name + 4-byte
/// size + 2-byte `first_block`).
pub const SFS_ENTRY_SIZE: u64 = 64;

/// Number of entries in the root directory region.
pub const SFS_ROOTDIR_NENTRIES: u64 = 128;

/// Byte offset of the root directory region.
pub const SFS_ROOTDIR_OFF: u64 = 0;

/// Byte size of the root directory region.
pub const SFS_ROOTDIR_SIZE: u64 = SFS_ROOTDIR_NENTRIES * SFS_ENTRY_SIZE;

/// Number of data blocks tracked by the block table (and hence the number
/// of data blocks the image provides).
pub const SFS_BLOCKTBL_NENTRIES: u64 = 4096;

/// Byte offset of the block table region.
pub const SFS_BLOCKTBL_OFF: u64 = SFS_ROOTDIR_OFF + SFS_ROOTDIR_SIZE;

/// Byte size of the block table region.
pub const SFS_BLOCKTBL_SIZE: u64 = SFS_BLOCKTBL_NENTRIES * 2;

/// Byte offset of the data-block region.
pub const SFS_DATA_OFF: u64 = SFS_BLOCKTBL_OFF + SFS_BLOCKTBL_SIZE;

/// Number of directory entry slots a (non-root) two-block directory holds.
pub const SFS_DIR_NENTRIES: u64 = 2 * SFS_BLOCK_SIZE / SFS_ENTRY_SIZE;

/// Total size, in bytes, of a well-formed SFS image.
pub const SFS_IMAGE_SIZE: u64 = SFS_DATA_OFF + SFS_BLOCKTBL_NENTRIES * SFS_BLOCK_SIZE;

// ---------------------------------------------------------------------
// Directory entry
// ---------------------------------------------------------------------

/// A single 64-byte directory entry, exactly as it is laid out on disk.
///
/// Deliberately hand-packed rather than pushed through `serde`/`bincode`:
/// the 58-byte `filename` array is wider than what a generic (de)serializer
/// can express as a fixed-width field without extra machinery, and this
/// layout has to be bit-for-bit exact anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Zero-terminated file/directory name, empty (`filename[0] == 0`)
    /// iff this slot is free.
    pub filename: [u8; SFS_FILENAME_SIZE],
    /// File size in bytes, or `SFS_DIRECTORY | 0` for directories (the
    /// remaining bits of a directory entry's size are unused).
    pub size: u32,
    /// Index of the first block of this entry's chain, `SFS_BLOCKIDX_END`
    /// for an empty file, or `SFS_BLOCKIDX_EMPTY` if the slot is free.
    pub first_block: BlockIdx,
}

impl DirEntry {
    /// A free directory-entry slot.
    pub fn free() -> DirEntry {
        DirEntry {
            filename: [0; SFS_FILENAME_SIZE],
            size: 0,
            first_block: SFS_BLOCKIDX_EMPTY,
        }
    }

    /// Is this slot free (unoccupied)?
    pub fn is_free(&self) -> bool {
        self.filename[0] == 0
    }

    /// Does this entry describe a directory?
    pub fn is_directory(&self) -> bool {
        self.size & SFS_DIRECTORY != 0
    }

    /// The entry's name, decoded up to the first NUL (or the end of the
    /// array if there isn't one).
    pub fn name(&self) -> String {
        let end = self
            .filename
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SFS_FILENAME_SIZE);
        String::from_utf8_lossy(&self.filename[..end]).into_owned()
    }

    /// Set this entry's name. Fails if `name` (plus its NUL terminator)
    /// does not fit in `SFS_FILENAME_SIZE` bytes, or the name is empty.
    pub fn set_name(&mut self, name: &str) -> std::result::Result<(), &'static str> {
        let bytes = name.as_bytes();
        if bytes.is_empty() {
            return Err("name must not be empty");
        }
        if bytes.len() >= SFS_FILENAME_SIZE {
            return Err("name too long for a directory entry");
        }
        self.filename = [0; SFS_FILENAME_SIZE];
        self.filename[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// The entry's `size` with the `SFS_DIRECTORY` bit masked off (the
    /// value `getattr` should report, regardless of entry kind).
    pub fn reported_size(&self) -> u32 {
        self.size & !SFS_DIRECTORY
    }

    /// Decode a 64-byte on-disk record.
    pub fn from_bytes(bytes: &[u8]) -> DirEntry {
        debug_assert_eq!(bytes.len(), SFS_ENTRY_SIZE as usize);
        let mut filename = [0u8; SFS_FILENAME_SIZE];
        filename.copy_from_slice(&bytes[0..SFS_FILENAME_SIZE]);
        let size = u32::from_le_bytes([
            bytes[SFS_FILENAME_SIZE],
            bytes[SFS_FILENAME_SIZE + 1],
            bytes[SFS_FILENAME_SIZE + 2],
            bytes[SFS_FILENAME_SIZE + 3],
        ]);
        let fb_off = SFS_FILENAME_SIZE + 4;
        let first_block = u16::from_le_bytes([bytes[fb_off], bytes[fb_off + 1]]);
        DirEntry {
            filename,
            size,
            first_block,
        }
    }

    /// Encode this entry as a 64-byte on-disk record.
    pub fn to_bytes(&self) -> [u8; SFS_ENTRY_SIZE as usize] {
        let mut out = [0u8; SFS_ENTRY_SIZE as usize];
        out[0..SFS_FILENAME_SIZE].copy_from_slice(&self.filename);
        out[SFS_FILENAME_SIZE..SFS_FILENAME_SIZE + 4].copy_from_slice(&self.size.to_le_bytes());
        let fb_off = SFS_FILENAME_SIZE + 4;
        out[fb_off..fb_off + 2].copy_from_slice(&self.first_block.to_le_bytes());
        out
    }
}

impl Default for DirEntry {
    fn default() -> DirEntry {
        DirEntry::free()
    }
}

// ---------------------------------------------------------------------
// getattr result
// ---------------------------------------------------------------------

/// A `stat`-shaped record, the result of `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    /// Whether this entry is a directory (vs. a regular file).
    pub is_dir: bool,
    /// Size in bytes (directory-bit already masked off).
    pub size: u64,
    /// Hard link count: 2 for directories, 1 for files, by convention.
    pub nlink: u32,
}

impl FileAttr {
    /// Build the attributes of a regular file of the given size.
    pub fn file(size: u64) -> FileAttr {
        FileAttr {
            is_dir: false,
            size,
            nlink: 1,
        }
    }

    /// Build the attributes of a directory of the given reported size.
    pub fn directory(size: u64) -> FileAttr {
        FileAttr {
            is_dir: true,
            size,
            nlink: 2,
        }
    }
}

/// Owner/group/timestamp defaults the host layer stamps onto a `FileAttr`
/// at the VFS boundary; the engine itself tracks none of this on disk.
#[derive(Debug, Clone, Copy)]
pub struct HostStamp {
    /// UID of the user that mounted the image.
    pub uid: u32,
    /// GID of the user that mounted the image.
    pub gid: u32,
    /// Timestamp to report for both atime and mtime.
    pub now: SystemTime,
}
