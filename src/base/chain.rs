//! Chain
//!
//! A byte rope: an ordered sequence of reference-counted blocks. Appending
//! or prepending a `Bytes` block shares it without copying; tiny pieces are
//! merged into a neighbour to keep the block count down.

use std::collections::VecDeque;
use std::fmt;

use bytes::{Bytes, BytesMut};

/// Blocks shorter than this are merged with a neighbour when combined
/// they still fit.
const MIN_BLOCK_SIZE: usize = 256;

/// Byte sequence stored as a list of shared blocks
#[derive(Clone, Default)]
pub struct Chain {
    blocks: VecDeque<Bytes>,
    size: usize,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, index: usize) -> Option<&Bytes> {
        self.blocks.get(index)
    }

    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = &Bytes> + ExactSizeIterator {
        self.blocks.iter()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.size = 0;
    }

    // -------------------------------------------------------------------------
    // Appending
    // -------------------------------------------------------------------------

    /// Appends a block, sharing it unless it is small enough to merge.
    pub fn append(&mut self, block: Bytes) {
        if block.is_empty() {
            return;
        }
        if block.len() < MIN_BLOCK_SIZE && self.try_merge_back(&block) {
            return;
        }
        self.size += block.len();
        self.blocks.push_back(block);
    }

    /// Appends a copy of `src`.
    pub fn append_slice(&mut self, src: &[u8]) {
        if src.is_empty() || self.try_merge_back(src) {
            return;
        }
        self.size += src.len();
        self.blocks.push_back(Bytes::copy_from_slice(src));
    }

    pub fn append_chain(&mut self, src: &Chain) {
        for block in src.blocks() {
            self.append(block.clone());
        }
    }

    fn try_merge_back(&mut self, src: &[u8]) -> bool {
        let Some(last) = self.blocks.back_mut() else {
            return false;
        };
        if last.len() + src.len() > MIN_BLOCK_SIZE {
            return false;
        }
        let mut merged = BytesMut::with_capacity(last.len() + src.len());
        merged.extend_from_slice(last);
        merged.extend_from_slice(src);
        *last = merged.freeze();
        self.size += src.len();
        true
    }

    // -------------------------------------------------------------------------
    // Prepending
    // -------------------------------------------------------------------------

    pub fn prepend(&mut self, block: Bytes) {
        if block.is_empty() {
            return;
        }
        if block.len() < MIN_BLOCK_SIZE && self.try_merge_front(&block) {
            return;
        }
        self.size += block.len();
        self.blocks.push_front(block);
    }

    pub fn prepend_slice(&mut self, src: &[u8]) {
        if src.is_empty() || self.try_merge_front(src) {
            return;
        }
        self.size += src.len();
        self.blocks.push_front(Bytes::copy_from_slice(src));
    }

    pub fn prepend_chain(&mut self, src: &Chain) {
        for block in src.blocks().rev() {
            self.prepend(block.clone());
        }
    }

    fn try_merge_front(&mut self, src: &[u8]) -> bool {
        let Some(first) = self.blocks.front_mut() else {
            return false;
        };
        if first.len() + src.len() > MIN_BLOCK_SIZE {
            return false;
        }
        let mut merged = BytesMut::with_capacity(first.len() + src.len());
        merged.extend_from_slice(src);
        merged.extend_from_slice(first);
        *first = merged.freeze();
        self.size += src.len();
        true
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Drops the last `length` bytes.
    pub fn remove_suffix(&mut self, length: usize) {
        debug_assert!(length <= self.size, "removing more than chain size");
        let mut remaining = length.min(self.size);
        self.size -= remaining;
        while remaining > 0 {
            let Some(last) = self.blocks.back_mut() else {
                break;
            };
            if last.len() <= remaining {
                remaining -= last.len();
                self.blocks.pop_back();
            } else {
                last.truncate(last.len() - remaining);
                remaining = 0;
            }
        }
    }

    /// Drops the first `length` bytes.
    pub fn remove_prefix(&mut self, length: usize) {
        debug_assert!(length <= self.size, "removing more than chain size");
        let mut remaining = length.min(self.size);
        self.size -= remaining;
        while remaining > 0 {
            let Some(first) = self.blocks.front_mut() else {
                break;
            };
            if first.len() <= remaining {
                remaining -= first.len();
                self.blocks.pop_front();
            } else {
                let _ = first.split_to(remaining);
                remaining = 0;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------

    /// Block index and offset of the byte at `pos`, or `None` at or past the end.
    pub fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        if pos >= self.size {
            return None;
        }
        let mut block_begin = 0;
        for (index, block) in self.blocks.iter().enumerate() {
            if pos < block_begin + block.len() {
                return Some((index, pos - block_begin));
            }
            block_begin += block.len();
        }
        None
    }

    /// Position of the first byte of block `index`.
    pub fn block_begin(&self, index: usize) -> usize {
        self.blocks.iter().take(index).map(Bytes::len).sum()
    }

    /// Copies the chain into one contiguous block, sharing it when the chain
    /// already has a single block.
    pub fn to_bytes(&self) -> Bytes {
        match self.blocks.len() {
            0 => Bytes::new(),
            1 => self.blocks[0].clone(),
            _ => Bytes::from(self.to_vec()),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut dest = Vec::with_capacity(self.size);
        for block in &self.blocks {
            dest.extend_from_slice(block);
        }
        dest
    }

    /// Sub-chain of `length` bytes starting at `pos`, sharing blocks.
    pub fn slice(&self, pos: usize, length: usize) -> Chain {
        debug_assert!(pos + length <= self.size, "slice out of range");
        let mut result = Chain::new();
        let mut remaining = length;
        let mut skip = pos;
        for block in &self.blocks {
            if remaining == 0 {
                break;
            }
            if skip >= block.len() {
                skip -= block.len();
                continue;
            }
            let piece = (block.len() - skip).min(remaining);
            result.append(block.slice(skip..skip + piece));
            remaining -= piece;
            skip = 0;
        }
        result
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.bytes_iter().eq(other.bytes_iter())
    }
}

impl Eq for Chain {}

impl PartialEq<[u8]> for Chain {
    fn eq(&self, other: &[u8]) -> bool {
        self.size == other.len() && self.bytes_iter().eq(other.iter().copied())
    }
}

impl Chain {
    fn bytes_iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.blocks.iter().flat_map(|block| block.iter().copied())
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("size", &self.size)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl From<Bytes> for Chain {
    fn from(block: Bytes) -> Self {
        let mut chain = Chain::new();
        chain.append(block);
        chain
    }
}

impl From<Vec<u8>> for Chain {
    fn from(src: Vec<u8>) -> Self {
        Chain::from(Bytes::from(src))
    }
}

impl From<&[u8]> for Chain {
    fn from(src: &[u8]) -> Self {
        let mut chain = Chain::new();
        chain.append_slice(src);
        chain
    }
}

impl From<&str> for Chain {
    fn from(src: &str) -> Self {
        Chain::from(src.as_bytes())
    }
}
