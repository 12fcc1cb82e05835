//! Block-table allocator: data blocks are chained together through a
//! flat array of `blockidx_t` slots, one per data block, rather than a
//! bitmap. Each slot holds either `SFS_BLOCKIDX_EMPTY` (free),
//! `SFS_BLOCKIDX_END` (the last block of some chain) or the index of the
//! next block in its chain.

use crate::error::{Result, SfsError};
use crate::Sfs;
use sfs_api::fs::BlockTableSupport;
use sfs_api::types::{
    Block, BlockIdx, SFS_BLOCKTBL_NENTRIES, SFS_BLOCKTBL_OFF, SFS_BLOCKIDX_EMPTY,
    SFS_BLOCKIDX_END, SFS_BLOCK_SIZE, SFS_DATA_OFF,
};

impl Sfs {
    fn bt_entry_off(index: u64) -> u64 {
        SFS_BLOCKTBL_OFF + index * 2
    }
}

impl BlockTableSupport for Sfs {
    fn b_get(&self, index: u64) -> Result<Block> {
        if index >= SFS_BLOCKTBL_NENTRIES {
            return Err(SfsError::InvalidInput("block index out of range"));
        }
        let data = self.image.read(SFS_DATA_OFF + index * SFS_BLOCK_SIZE, SFS_BLOCK_SIZE)?;
        Ok(Block::new(index, data))
    }

    fn b_put(&mut self, b: &Block) -> Result<()> {
        if b.block_no >= SFS_BLOCKTBL_NENTRIES {
            return Err(SfsError::InvalidInput("block index out of range"));
        }
        self.image
            .write(SFS_DATA_OFF + b.block_no * SFS_BLOCK_SIZE, b.contents_as_ref())?;
        Ok(())
    }

    fn bt_get(&self, index: u64) -> Result<BlockIdx> {
        if index >= SFS_BLOCKTBL_NENTRIES {
            return Err(SfsError::InvalidInput("block table index out of range"));
        }
        let raw = self.image.read(Self::bt_entry_off(index), 2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn bt_put(&mut self, index: u64, value: BlockIdx) -> Result<()> {
        if index >= SFS_BLOCKTBL_NENTRIES {
            return Err(SfsError::InvalidInput("block table index out of range"));
        }
        self.image.write(Self::bt_entry_off(index), &value.to_le_bytes())?;
        Ok(())
    }

    fn find_free(&mut self) -> Result<u64> {
        for i in 0..SFS_BLOCKTBL_NENTRIES {
            if self.bt_get(i)? == SFS_BLOCKIDX_EMPTY {
                self.bt_put(i, SFS_BLOCKIDX_END)?;
                self.b_put(&Block::new_zero(i, SFS_BLOCK_SIZE))?;
                return Ok(i);
            }
        }
        Err(SfsError::NoSpace)
    }

    fn find_free_pair(&mut self) -> Result<u64> {
        for i in 0..SFS_BLOCKTBL_NENTRIES.saturating_sub(1) {
            if self.bt_get(i)? == SFS_BLOCKIDX_EMPTY && self.bt_get(i + 1)? == SFS_BLOCKIDX_EMPTY {
                self.bt_put(i, i as BlockIdx + 1)?;
                self.bt_put(i + 1, SFS_BLOCKIDX_END)?;
                self.b_put(&Block::new_zero(i, SFS_BLOCK_SIZE))?;
                self.b_put(&Block::new_zero(i + 1, SFS_BLOCK_SIZE))?;
                return Ok(i);
            }
        }
        Err(SfsError::NoSpace)
    }

    fn chain_length(&self, first: BlockIdx) -> Result<u64> {
        Ok(self.chain_follow(first)?.len() as u64)
    }

    fn chain_follow(&self, first: BlockIdx) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        let mut curr = first;
        while curr != SFS_BLOCKIDX_END {
            out.push(curr as u64);
            curr = self.bt_get(curr as u64)?;
        }
        Ok(out)
    }

    fn chain_append(&mut self, first: BlockIdx, n: u64) -> Result<BlockIdx> {
        if n == 0 {
            return Ok(first);
        }
        let mut new_blocks = Vec::with_capacity(n as usize);
        for _ in 0..n {
            new_blocks.push(self.find_free()?);
        }
        for pair in new_blocks.windows(2) {
            self.bt_put(pair[0], pair[1] as BlockIdx)?;
        }

        if first == SFS_BLOCKIDX_END {
            Ok(new_blocks[0] as BlockIdx)
        } else {
            let mut last = first;
            loop {
                let next = self.bt_get(last as u64)?;
                if next == SFS_BLOCKIDX_END {
                    break;
                }
                last = next;
            }
            self.bt_put(last as u64, new_blocks[0] as BlockIdx)?;
            Ok(first)
        }
    }

    fn chain_free(&mut self, first: BlockIdx) -> Result<()> {
        let blocks = self.chain_follow(first)?;
        for b in blocks {
            self.bt_put(b, SFS_BLOCKIDX_EMPTY)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{destruct, fresh};

    #[test]
    fn find_free_allocates_zeroed_block() {
        let mut sfs = fresh("find-free");
        let idx = sfs.find_free().unwrap();
        assert_eq!(sfs.bt_get(idx).unwrap(), SFS_BLOCKIDX_END);
        let block = sfs.b_get(idx).unwrap();
        assert!(block.contents_as_ref().iter().all(|&b| b == 0));
        destruct(sfs);
    }

    #[test]
    fn find_free_pair_is_adjacent_and_chained() {
        let mut sfs = fresh("find-free-pair");
        let first = sfs.find_free_pair().unwrap();
        assert_eq!(sfs.bt_get(first).unwrap(), first as BlockIdx + 1);
        assert_eq!(sfs.bt_get(first + 1).unwrap(), SFS_BLOCKIDX_END);
        destruct(sfs);
    }

    #[test]
    fn chain_append_extends_existing_chain() {
        let mut sfs = fresh("chain-append");
        let first = sfs.find_free().unwrap() as BlockIdx;
        let head = sfs.chain_append(first, 2).unwrap();
        assert_eq!(head, first);
        let chain = sfs.chain_follow(first).unwrap();
        assert_eq!(chain.len(), 3);
        destruct(sfs);
    }

    #[test]
    fn chain_append_from_empty_starts_new_chain() {
        let mut sfs = fresh("chain-append-empty");
        let head = sfs.chain_append(SFS_BLOCKIDX_END, 3).unwrap();
        assert_eq!(sfs.chain_length(head).unwrap(), 3);
        destruct(sfs);
    }

    #[test]
    fn chain_free_returns_blocks_to_the_pool() {
        let mut sfs = fresh("chain-free");
        let head = sfs.chain_append(SFS_BLOCKIDX_END, 3).unwrap();
        let blocks = sfs.chain_follow(head).unwrap();
        sfs.chain_free(head).unwrap();
        for b in blocks {
            assert_eq!(sfs.bt_get(b).unwrap(), SFS_BLOCKIDX_EMPTY);
        }
        destruct(sfs);
    }

    #[test]
    fn find_free_errors_when_exhausted() {
        let mut sfs = fresh("exhausted");
        for _ in 0..SFS_BLOCKTBL_NENTRIES {
            if sfs.find_free().is_err() {
                break;
            }
        }
        assert!(sfs.find_free().is_err());
        destruct(sfs);
    }
}
