//! ChainReader
//!
//! Reads a `Chain` block by block without copying. Each block becomes the
//! window in turn; pulls that straddle blocks go through the scratch
//! buffer. The current block is tracked by index, so the reader stays valid
//! when it or the chain it owns is moved.

use crate::base::{Chain, Dependency, Position};
use crate::error::Result;

use super::pullable_reader::{discard_scratch, pull_using_scratch, PullableReader, Scratch};
use super::reader::{Reader, ReaderBase};

/// `Reader` over a `Chain`
#[derive(Debug)]
pub struct ChainReader<'a> {
    base: ReaderBase,
    scratch: Scratch,
    src: Dependency<'a, Chain>,
    block_index: usize,
}

impl<'a> ChainReader<'a> {
    pub fn new(src: Dependency<'a, Chain>) -> Self {
        let mut reader = Self {
            base: ReaderBase::new(),
            scratch: Scratch::default(),
            src,
            block_index: 0,
        };
        if let Some(block) = reader.src.block(0) {
            let block = block.clone();
            reader.base.set_buffer(block, 0);
        }
        reader
    }

    pub fn owned(src: Chain) -> ChainReader<'static> {
        ChainReader::new(Dependency::owned(src))
    }

    pub fn borrowed(src: &'a mut Chain) -> Self {
        Self::new(Dependency::borrowed(src))
    }

    pub fn src(&self) -> &Chain {
        self.src.get()
    }
}

impl Reader for ChainReader<'_> {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        pull_using_scratch(self, min_length, recommended_length)
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        discard_scratch(self);
        let size = self.src.len() as Position;
        if new_pos >= size {
            // Park at the end of the last block.
            let last = self.src.num_blocks().saturating_sub(1);
            match self.src.block(last).cloned() {
                Some(block) => {
                    let begin = (size as usize - block.len()) as Position;
                    self.block_index = last;
                    self.base.set_buffer(block, begin);
                    self.base.seek_within(size);
                }
                None => self.base.clear_buffer_at(0),
            }
            return new_pos == size;
        }
        if let Some((index, offset)) = self.src.locate(new_pos as usize) {
            let begin = self.src.block_begin(index) as Position;
            if let Some(block) = self.src.block(index).cloned() {
                self.block_index = index;
                self.base.set_buffer(block, begin);
                self.base.move_cursor(offset);
            }
        }
        true
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        Ok(self.src.len() as Position)
    }

    fn done(&mut self) {
        discard_scratch(self);
    }
}

impl PullableReader for ChainReader<'_> {
    fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    fn scratch_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }

    fn pull_behind_scratch(&mut self) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        let next = if self.base.data().is_empty() {
            self.block_index
        } else {
            self.block_index + 1
        };
        let Some(block) = self.src.block(next).cloned() else {
            return false;
        };
        let pos = self.base.limit_pos();
        self.block_index = next;
        self.base.set_buffer(block, pos);
        true
    }
}
