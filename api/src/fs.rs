//! Collection of the trait contracts a concrete SFS implementation must
//! satisfy. Each trait is a supertrait of the next, so higher layers can
//! always fall back on the operations lower layers provide; a single
//! concrete type (`sfs_engine::Sfs`) implements all five.

use super::{
    controller::Image,
    types::{Block, BlockIdx, DirEntry, FileAttr},
};
use std::{error, path::Path};

/// The base trait every SFS implementation must provide: creating,
/// loading and tearing down an image.
pub trait FileSystemSupport: Sized {
    /// The error type returned by every operation of this implementation.
    type Error: error::Error;

    /// Format a brand-new image at `path`: zero it, lay out the root
    /// directory region as entirely free entries, mark every block-table
    /// slot as free, and mount it.
    ///
    /// Fails if `path` already exists.
    fn mkfs<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>;

    /// Mount an existing image at `path`. Fails if the path does not
    /// exist, or its size does not match the fixed image layout.
    fn mountfs<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>;

    /// Unmount the file system, consuming it and handing back the raw
    /// image handle.
    fn unmountfs(self) -> Image;
}

/// Block-table-level operations: the singly-linked-list-style allocator
/// chaining data blocks together.
pub trait BlockTableSupport: FileSystemSupport {
    /// Read data block `index` (an index into the data-block region, not
    /// a raw byte offset).
    fn b_get(&self, index: u64) -> Result<Block, Self::Error>;

    /// Write data block `b` back to its slot in the data-block region.
    fn b_put(&mut self, b: &Block) -> Result<(), Self::Error>;

    /// Read the block-table entry at index `index`.
    fn bt_get(&self, index: u64) -> Result<BlockIdx, Self::Error>;

    /// Write the block-table entry at index `index`.
    fn bt_put(&mut self, index: u64, value: BlockIdx) -> Result<(), Self::Error>;

    /// Find a single free block, allocate it (write `SFS_BLOCKIDX_END`
    /// into its table slot and zero its contents), and return its index.
    /// Errors if no free block exists.
    fn find_free(&mut self) -> Result<u64, Self::Error>;

    /// Find two *adjacent* free blocks (`i`, `i + 1`), as required by the
    /// two-block directory layout, allocate both and chain them together,
    /// and return `i`. Errors if no adjacent free pair exists.
    fn find_free_pair(&mut self) -> Result<u64, Self::Error>;

    /// Number of blocks in the chain starting at `first`, by walking
    /// `SFS_BLOCKIDX_END` sentinels. `first == SFS_BLOCKIDX_END` means an
    /// empty chain (0 blocks).
    fn chain_length(&self, first: BlockIdx) -> Result<u64, Self::Error>;

    /// Collect the indices of every block in the chain starting at
    /// `first`, in order.
    fn chain_follow(&self, first: BlockIdx) -> Result<Vec<u64>, Self::Error>;

    /// Extend the chain starting at `first` (or start a new one, if
    /// `first == SFS_BLOCKIDX_END`) with `n` freshly allocated blocks.
    /// Returns the (possibly unchanged) head of the chain.
    fn chain_append(&mut self, first: BlockIdx, n: u64) -> Result<BlockIdx, Self::Error>;

    /// Free every block in the chain starting at `first`, returning all
    /// of them to the free pool.
    fn chain_free(&mut self, first: BlockIdx) -> Result<(), Self::Error>;
}

/// Directory-level operations: reading and writing the fixed-width
/// `DirEntry` records that make up a directory's contents.
pub trait DirectorySupport: BlockTableSupport {
    /// Load every entry of the root directory.
    fn load_root(&self) -> Result<Vec<DirEntry>, Self::Error>;

    /// Persist every entry of the root directory.
    fn store_root(&mut self, entries: &[DirEntry]) -> Result<(), Self::Error>;

    /// Load every entry of the (non-root) directory whose contents start
    /// at chain head `first`.
    fn load_dir(&self, first: BlockIdx) -> Result<Vec<DirEntry>, Self::Error>;

    /// Persist every entry of the (non-root) directory whose contents
    /// start at chain head `first`.
    fn store_dir(&mut self, first: BlockIdx, entries: &[DirEntry]) -> Result<(), Self::Error>;

    /// Find the entry named `name` among `entries`, if any, returning its
    /// index.
    fn find_named(entries: &[DirEntry], name: &str) -> Option<usize>;

    /// Find the first free slot among `entries`, if any.
    fn find_empty(entries: &[DirEntry]) -> Option<usize>;
}

/// Location of a directory's backing storage: the root directory region,
/// or a (non-root) directory's chain, identified by the chain's head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLoc {
    /// The fixed root-directory region.
    Root,
    /// A two-block directory chain starting at the given block.
    Sub(BlockIdx),
}

/// An interior result of path resolution: the entry found, together with
/// the location of the directory it lives in and its slot index there,
/// enough for a caller to rewrite or remove it in place.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The resolved directory entry.
    pub entry: DirEntry,
    /// Where the parent directory holding `entry` is stored.
    pub parent: DirLoc,
    /// `entry`'s slot index within the parent's entry list.
    pub slot: usize,
}

/// Path-level operations: walking a slash-separated absolute path down
/// through nested directories.
pub trait PathSupport: DirectorySupport {
    /// Is `path` syntactically valid: non-empty, starting with `/`, made
    /// up of `/`-separated non-empty component names, none of which is
    /// longer than the directory-entry name field allows?
    fn valid_path(path: &str) -> bool;

    /// Resolve `path` to the entry it names, together with enough
    /// context (parent location and slot) to modify it in place.
    ///
    /// Errors if the path is invalid, any component along the way does
    /// not exist, or an interior component exists but is not itself a
    /// directory.
    fn resolve(&self, path: &str) -> Result<Resolved, Self::Error>;
}

/// The mutating filesystem operations exposed at the VFS boundary.
pub trait VfsSupport: PathSupport {
    /// Stat the entry at `path`.
    fn getattr(&self, path: &str) -> Result<FileAttr, Self::Error>;

    /// List the names of the entries held directly inside the directory
    /// at `path`.
    fn readdir(&self, path: &str) -> Result<Vec<String>, Self::Error>;

    /// Read up to `buf.len()` bytes from the file at `path`, starting at
    /// byte `offset`. Returns the number of bytes actually read.
    fn read(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<u64, Self::Error>;

    /// Write `data` into the file at `path` starting at byte `offset`,
    /// growing the file if the write extends past its current size.
    /// Returns the number of bytes written.
    fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<u64, Self::Error>;

    /// Create a new, empty regular file named by the last component of
    /// `path` inside its parent directory.
    fn create(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove the regular file at `path`, freeing its block chain.
    fn unlink(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Create a new, empty directory named by the last component of
    /// `path` inside its parent directory.
    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove the empty directory at `path`.
    fn rmdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Resize the file at `path` to exactly `size` bytes, freeing or
    /// allocating blocks as needed and zero-filling any newly exposed
    /// range.
    fn truncate(&mut self, path: &str, size: u64) -> Result<(), Self::Error>;

    /// Move the entry at `path` to `new_path`. Fails if an entry already
    /// exists at `new_path`.
    fn rename(&mut self, path: &str, new_path: &str) -> Result<(), Self::Error>;
}
