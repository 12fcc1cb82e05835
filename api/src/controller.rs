//! Image accessor: a fixed-size file, memory-mapped, that backs one SFS
//! image. Provides raw byte-range and whole-block read/write primitives;
//! everything above this module (block table, directory codec, path
//! resolver, VFS operations) is built in terms of these.
//!
//! No file locking is attempted here (as in the layered lineage this is
//! built on, concurrent processes touching the same image file is
//! explicitly out of scope, see the concurrency notes on the engine).

use super::error::{ImageError, Result};
use super::types::{Block, SFS_BLOCK_SIZE, SFS_IMAGE_SIZE};
use memmap::MmapMut;
use std::{
    fs::{remove_file, OpenOptions},
    path::{Path, PathBuf},
};

/// Whether an `Image` is being freshly created or loaded from an existing
/// file.
#[derive(PartialEq, Eq, Copy, Clone)]
pub enum ImageState {
    /// A brand new image, written as all-zero and then formatted.
    New,
    /// An existing image, loaded as-is.
    Load,
}

use self::ImageState::*;
impl ImageState {
    /// Convert "does the path exist" into an `ImageState`.
    pub fn from_exists(exists: bool) -> ImageState {
        if exists {
            Load
        } else {
            New
        }
    }
}

/// A memory-mapped, fixed-size SFS image file.
#[derive(Debug)]
pub struct Image {
    path: PathBuf,
    contents: MmapMut,
}

impl Drop for Image {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = self.contents.flush();
        }
    }
}

impl Image {
    fn open_or_create<P: AsRef<Path>>(path: P, state: ImageState) -> Result<Image> {
        let path_buf = path.as_ref().to_path_buf();
        let contents = mmap_path(path, SFS_IMAGE_SIZE, state)?;
        Ok(Image {
            path: path_buf,
            contents,
        })
    }

    /// Create a new, all-zero image at `path`. Fails if `path` already
    /// exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Image> {
        Image::open_or_create(path, New)
    }

    /// Open an existing image at `path`. Fails if `path` does not exist,
    /// or its length does not match `SFS_IMAGE_SIZE`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Image> {
        Image::open_or_create(path, Load)
    }

    /// Remove the file backing this image and consume it. Panics if the
    /// removal fails.
    pub fn destruct(self) {
        remove_file(&self.path).unwrap();
    }

    /// Total size in bytes of this image.
    pub fn len(&self) -> u64 {
        SFS_IMAGE_SIZE
    }

    /// Path of the file backing this image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read `nb` bytes starting at byte offset `addr`. Fails on a read
    /// past the end of the image.
    pub fn read(&self, addr: u64, nb: u64) -> Result<Box<[u8]>> {
        if addr + nb > self.len() {
            return Err(ImageError::ImageInput("read past the end of the image"));
        }
        let start = addr as usize;
        let end = (addr + nb) as usize;
        Ok(self.contents[start..end].into())
    }

    /// Write `data` starting at byte offset `addr`. Fails on a write past
    /// the end of the image.
    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        if addr + data.len() as u64 > self.len() {
            return Err(ImageError::ImageInput("write past the end of the image"));
        }
        let start = addr as usize;
        let end = start + data.len();
        self.contents[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Read data block `index` out of the data-block region (index 0 is
    /// the first data block, *not* byte offset 0 of the image).
    pub fn read_block(&self, data_off: u64, index: u64) -> Result<Block> {
        let addr = data_off + index * SFS_BLOCK_SIZE;
        let data = self.read(addr, SFS_BLOCK_SIZE)?;
        Ok(Block::new(index, data))
    }

    /// Write data block `b` back into the data-block region.
    pub fn write_block(&mut self, data_off: u64, b: &Block) -> Result<()> {
        if b.len() != SFS_BLOCK_SIZE {
            return Err(ImageError::ImageInput(
                "trying to write a non-block-sized block",
            ));
        }
        let addr = data_off + b.block_no * SFS_BLOCK_SIZE;
        self.write(addr, b.contents_as_ref())
    }

    /// Force the memory-mapped contents out to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.contents.flush().map_err(|e| e.into())
    }
}

fn mmap_path<P: AsRef<Path>>(path: P, size: u64, state: ImageState) -> Result<MmapMut> {
    let exists = ImageState::from_exists(path.as_ref().exists());
    if exists != state {
        return match state {
            Load => Err(ImageError::ImageInput(
                "tried to open a non-existing image path",
            )),
            New => Err(ImageError::ImageInput(
                "tried to create a pre-existing image path",
            )),
        };
    }

    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    if state == Load {
        if f.metadata()?.len() != size {
            return Err(ImageError::ImageInput(
                "image size does not match the expected layout size",
            ));
        }
    } else {
        f.set_len(size)?;
    }

    let data = unsafe { memmap::MmapOptions::new().map_mut(&f)? };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::Image;
    use crate::types::{Block, SFS_BLOCK_SIZE, SFS_DATA_OFF, SFS_IMAGE_SIZE};
    use std::fs::{create_dir_all, remove_dir, remove_file};
    use std::path::{Path, PathBuf};

    fn image_prep_path(name: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("fs-images-controller-".to_string() + name);
        path.push("img");

        if path.exists() {
            remove_file(&path).unwrap();
        }
        {
            let prefix = path.parent().unwrap();
            create_dir_all(prefix).unwrap();
        }
        path
    }

    fn image_destruct(img: Image) {
        let path = img.path().to_owned();
        img.destruct();
        remove_dir(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn create_image_test() {
        let path = image_prep_path("create");
        let mut img = Image::create(&path).unwrap();

        let zero_block = |i| Block::new_zero(i, SFS_BLOCK_SIZE);
        let br = img.read_block(SFS_DATA_OFF, 3).unwrap();
        assert_eq!(br, zero_block(3));

        // A read or write past the last data block fails.
        let nblocks = (SFS_IMAGE_SIZE - SFS_DATA_OFF) / SFS_BLOCK_SIZE;
        assert!(img.read_block(SFS_DATA_OFF, nblocks).is_err());
        assert!(img
            .write_block(SFS_DATA_OFF, &zero_block(nblocks))
            .is_err());

        // Wrongly-sized block writes are rejected.
        let sized_block = |s: u64| Block::new_zero(3, s);
        assert!(img
            .write_block(SFS_DATA_OFF, &sized_block(SFS_BLOCK_SIZE + 1))
            .is_err());

        let block_data: Vec<u8> = (0..SFS_BLOCK_SIZE as u16).map(|v| v as u8).collect();
        let bw = Block::new(3, block_data.into_boxed_slice());
        img.write_block(SFS_DATA_OFF, &bw).unwrap();
        let br = img.read_block(SFS_DATA_OFF, 3).unwrap();
        assert_eq!(br, bw);

        image_destruct(img);
        assert!(!path.exists());
    }

    #[test]
    fn reload_persists_writes() {
        let path = image_prep_path("reload");
        let mut img = Image::create(&path).unwrap();

        let bw = Block::new(0, vec![7u8; SFS_BLOCK_SIZE as usize].into_boxed_slice());
        img.write_block(SFS_DATA_OFF, &bw).unwrap();
        drop(img);

        let img = Image::open(&path).unwrap();
        let br = img.read_block(SFS_DATA_OFF, 0).unwrap();
        assert_eq!(br, bw);

        image_destruct(img);
        assert!(!path.exists());
    }

    #[test]
    fn open_missing_and_create_existing_both_fail() {
        let path = image_prep_path("errors");
        assert!(Image::open(&path).is_err());
        let img = Image::create(&path).unwrap();
        assert!(Image::create(&path).is_err());
        image_destruct(img);
        let _ = Path::new(&path);
    }
}
