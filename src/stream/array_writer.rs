//! ArrayWriter
//!
//! Writes into a fixed-size slice. Writing past the end of the slice fails
//! with `Overflow`; what fit is kept.

use crate::base::{to_length, Position};
use crate::config::DEFAULT_BUFFER_SIZE;
use crate::error::{Result, RiffleError};

use super::writer::{FlushType, Writer, WriterBase};

/// `Writer` into a caller-provided slice
#[derive(Debug)]
pub struct ArrayWriter<'a> {
    base: WriterBase,
    dest: &'a mut [u8],
    /// High-water mark of bytes copied into `dest`.
    size: usize,
}

impl<'a> ArrayWriter<'a> {
    pub fn new(dest: &'a mut [u8]) -> Self {
        Self {
            base: WriterBase::new(),
            dest,
            size: 0,
        }
    }

    /// The filled prefix of the destination.
    pub fn written(&mut self) -> &[u8] {
        self.sync_buffer();
        &self.dest[..self.size]
    }

    fn sync_buffer(&mut self) {
        let start = self.base.start_pos() as usize;
        let written = self.base.written();
        let end = start + written.len();
        self.dest[start..end].copy_from_slice(written);
        self.size = self.size.max(end);
        let pos = self.base.pos();
        self.base.clear_buffer_at(pos);
    }
}

impl Writer for ArrayWriter<'_> {
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
        self.sync_buffer();
        let pos = self.base.pos();
        let remaining = self.dest.len() - pos as usize;
        if remaining < min_length {
            return self
                .base
                .fail(RiffleError::Overflow("ArrayWriter destination full".into()));
        }
        let length = remaining.min(DEFAULT_BUFFER_SIZE.max(min_length).max(recommended_length));
        let (mut buffer, _) = self.base.take_window();
        buffer.resize(length, 0);
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

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        if new_pos > self.size as Position {
            self.base.clear_buffer_at(self.size as Position);
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
        let buffered_end = self.base.pos();
        Ok(buffered_end.max(self.size as Position))
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        if new_size > self.size as Position {
            return false;
        }
        self.size = to_length(new_size);
        self.base.clear_buffer_at(new_size);
        true
    }

    fn done(&mut self) {
        self.sync_buffer();
    }
}
