//! VecWriter
//!
//! Writes into a `Vec<u8>`. While writing, the vector itself serves as the
//! buffer: it is taken out of the destination, grown, and given back with
//! the written length on `flush()`, `close()` or drop.

use crate::base::{BufferCursor, Dependency, Position};
use crate::error::Result;

use super::writer::{FlushType, Writer, WriterBase};

const MIN_GROWTH: usize = 256;

/// `Writer` into a growable vector, with random access and truncation
#[derive(Debug)]
pub struct VecWriter<'a> {
    base: WriterBase,
    dest: Dependency<'a, Vec<u8>>,
    /// Length of real data in the taken vector, excluding spare space.
    data_len: usize,
    active: bool,
}

impl<'a> VecWriter<'a> {
    /// Appends after the current contents of `dest`.
    pub fn new(dest: Dependency<'a, Vec<u8>>) -> Self {
        let pos = dest.len() as Position;
        Self {
            base: WriterBase::at(pos),
            dest,
            data_len: 0,
            active: false,
        }
    }

    pub fn owned() -> VecWriter<'static> {
        VecWriter::new(Dependency::owned(Vec::new()))
    }

    pub fn borrowed(dest: &'a mut Vec<u8>) -> Self {
        Self::new(Dependency::borrowed(dest))
    }

    /// The destination; complete after `flush()` or `close()`.
    pub fn dest(&self) -> &Vec<u8> {
        self.dest.get()
    }

    fn make_buffer(&mut self, min_length: usize) {
        let pos = self.base.pos() as usize;
        let mut buffer = std::mem::take(self.dest.get_mut());
        self.data_len = buffer.len();
        let needed = pos + min_length;
        let grown = needed.max(buffer.len() * 2).max(MIN_GROWTH);
        buffer.resize(grown, 0);
        let window = BufferCursor::new(0, pos, grown, 0);
        self.base.set_window(buffer, window);
        self.active = true;
    }

    fn sync_buffer(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let (mut buffer, window) = self.base.take_window();
        buffer.truncate(self.data_len.max(window.cursor()));
        *self.dest.get_mut() = buffer;
    }

    fn current_size(&self) -> Position {
        if self.active {
            self.data_len.max(self.base.window().cursor()) as Position
        } else {
            self.dest.len() as Position
        }
    }
}

impl Writer for VecWriter<'_> {
    fn base(&self) -> &WriterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriterBase {
        &mut self.base
    }

    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        if (self.base.pos() as usize).checked_add(min_length).is_none() {
            return self.base.fail_overflow();
        }
        self.sync_buffer();
        self.make_buffer(min_length.max(recommended_length));
        true
    }

    fn flush(&mut self, _flush_type: FlushType) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        true
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let size = self.dest.len() as Position;
        if new_pos > size {
            self.base.clear_buffer_at(size);
            return false;
        }
        self.base.clear_buffer_at(new_pos);
        true
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn supports_truncate(&self) -> bool {
        true
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        Ok(self.current_size())
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        if new_size > self.dest.len() as Position {
            return false;
        }
        self.dest.truncate(new_size as usize);
        self.base.clear_buffer_at(new_size);
        true
    }

    fn done(&mut self) {
        self.sync_buffer();
    }
}

impl Drop for VecWriter<'_> {
    fn drop(&mut self) {
        self.sync_buffer();
    }
}
