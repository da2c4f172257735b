//! ChainBackwardWriter
//!
//! Prepends to a `Chain`. Used to build data whose header depends on what
//! follows it, writing the tail first.

use bytes::Bytes;

use crate::base::{to_position, BackwardCursor, Chain, Dependency, Position, MAX_BYTES_TO_COPY};
use crate::config::BufferOptions;
use crate::error::Result;

use super::backward_writer::{BackwardWriter, BackwardWriterBase};
use super::writer::FlushType;

/// `BackwardWriter` that prepends to a `Chain`
#[derive(Debug)]
pub struct ChainBackwardWriter<'a> {
    base: BackwardWriterBase,
    dest: Dependency<'a, Chain>,
    options: BufferOptions,
}

impl<'a> ChainBackwardWriter<'a> {
    /// Writes before the current contents of `dest`.
    pub fn new(dest: Dependency<'a, Chain>, options: BufferOptions) -> Self {
        let pos = dest.len() as Position;
        Self {
            base: BackwardWriterBase::at(pos),
            dest,
            options,
        }
    }

    pub fn owned() -> ChainBackwardWriter<'static> {
        ChainBackwardWriter::new(Dependency::owned(Chain::new()), BufferOptions::default())
    }

    pub fn borrowed(dest: &'a mut Chain) -> Self {
        Self::new(Dependency::borrowed(dest), BufferOptions::default())
    }

    pub fn dest(&self) -> &Chain {
        self.dest.get()
    }

    fn sync_buffer(&mut self) {
        let (buffer, window) = self.base.take_window();
        let written = window.start_to_cursor();
        if written <= MAX_BYTES_TO_COPY {
            self.dest
                .prepend_slice(&buffer[window.cursor()..window.start()]);
            self.base
                .set_window(buffer, BackwardCursor::empty_at(window.pos()));
            return;
        }
        let block = Bytes::from(buffer).slice(window.cursor()..window.start());
        self.dest.prepend(block);
    }
}

impl BackwardWriter for ChainBackwardWriter<'_> {
    fn base(&self) -> &BackwardWriterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BackwardWriterBase {
        &mut self.base
    }

    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let pos = self.base.pos();
        let length = self.options.next_buffer_length(pos, min_length, recommended_length);
        if pos.checked_add(to_position(length)).is_none() {
            return self.base.fail_overflow();
        }
        let (mut buffer, _) = self.base.take_window();
        buffer.resize(length.max(buffer.len()), 0);
        self.base.set_buffer(buffer, pos);
        true
    }

    fn flush(&mut self, _flush_type: FlushType) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        true
    }

    fn write_chain_slow(&mut self, src: &Chain) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let Some(new_pos) = self.base.pos().checked_add(to_position(src.len())) else {
            return self.base.fail_overflow();
        };
        self.dest.prepend_chain(src);
        self.base.clear_buffer_at(new_pos);
        true
    }

    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let Some(new_pos) = self.base.pos().checked_add(to_position(src.len())) else {
            return self.base.fail_overflow();
        };
        self.dest.prepend(src);
        self.base.clear_buffer_at(new_pos);
        true
    }

    fn supports_truncate(&self) -> bool {
        true
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let size = self.dest.len() as Position;
        if new_size > size {
            return false;
        }
        self.dest.remove_prefix((size - new_size) as usize);
        self.base.clear_buffer_at(new_size);
        true
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        Ok(self.base.pos())
    }

    fn done(&mut self) {
        self.sync_buffer();
    }
}

impl Drop for ChainBackwardWriter<'_> {
    fn drop(&mut self) {
        if self.base.state().is_open() {
            self.sync_buffer();
        }
    }
}
