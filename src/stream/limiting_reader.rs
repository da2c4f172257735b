//! LimitingReader
//!
//! Reads from another reader but stops at an absolute position. The limiting
//! reader shares the wrapped reader's buffer: its window is the wrapped
//! window with the limit clamped, and its cursor is written back to the
//! wrapped reader before every delegated call and on close.
//!
//! The wrapped reader must not be used directly while the limiting reader
//! is alive.

use crate::base::{BufferCursor, Chain, Dependency, Position};
use crate::error::{Result, RiffleError};

use super::backward_writer::BackwardWriter;
use super::reader::{Reader, ReaderBase};
use super::writer::Writer;

/// `Reader` that ends at `size_limit`
#[derive(Debug)]
pub struct LimitingReader<'a, R: Reader> {
    base: ReaderBase,
    src: Dependency<'a, R>,
    size_limit: Position,
}

impl<'a, R: Reader> LimitingReader<'a, R> {
    /// `None` means no limit. A limit before the current position fails.
    pub fn new(src: Dependency<'a, R>, size_limit: Option<Position>) -> Self {
        let mut reader = Self {
            base: ReaderBase::new(),
            src,
            size_limit: size_limit.unwrap_or(Position::MAX),
        };
        let pos = reader.src.pos();
        if reader.size_limit < pos {
            reader.size_limit = pos;
            reader.make_buffer();
            reader.base.fail(RiffleError::InvalidArgument(format!(
                "Size limit {} is before the current position {}",
                size_limit.unwrap_or(Position::MAX),
                pos
            )));
            return reader;
        }
        reader.make_buffer();
        reader
    }

    pub fn borrowed(src: &'a mut R, size_limit: Option<Position>) -> Self {
        Self::new(Dependency::borrowed(src), size_limit)
    }

    /// Limits reading to `length` bytes from the current position.
    pub fn with_length(src: Dependency<'a, R>, length: Position) -> Self {
        let limit = src.pos().saturating_add(length);
        Self::new(src, Some(limit))
    }

    pub fn size_limit(&self) -> Position {
        self.size_limit
    }

    pub fn src(&self) -> &R {
        self.src.get()
    }

    /// Mirrors the wrapped window, clamped to the limit.
    fn make_buffer(&mut self) {
        let window = *self.src.base().window();
        let limit = if window.limit_pos() > self.size_limit {
            window.limit() - (window.limit_pos() - self.size_limit) as usize
        } else {
            window.limit()
        };
        let data = self.src.base().data().clone();
        self.base.set_window(
            data,
            BufferCursor::new(window.start(), window.cursor(), limit, window.start_pos()),
        );
        if let Err(err) = self.src.status() {
            self.base.fail(err);
        }
    }

    /// Writes our position back to the wrapped reader.
    fn sync_buffer(&mut self) {
        let pos = self.base.pos();
        if self.src.base().window().contains_pos(pos) {
            self.src.base_mut().seek_within(pos);
        }
    }

    fn remaining(&self) -> Position {
        self.size_limit.saturating_sub(self.base.pos())
    }
}

impl<R: Reader> Reader for LimitingReader<'_, R> {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let remaining = self.remaining();
        let min_to_pull = (min_length as Position).min(remaining) as usize;
        let recommended = (recommended_length as Position).min(remaining) as usize;
        let ok = self.src.pull(min_to_pull, recommended);
        self.make_buffer();
        ok && min_to_pull == min_length
    }

    fn read_slow(&mut self, dest: &mut [u8]) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let length = (dest.len() as Position).min(self.remaining()) as usize;
        let ok = self.src.read(&mut dest[..length]);
        self.make_buffer();
        ok && length == dest.len()
    }

    fn read_to_chain_slow(&mut self, length: usize, dest: &mut Chain) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let length_to_read = (length as Position).min(self.remaining()) as usize;
        let ok = self.src.read_to_chain(length_to_read, dest);
        self.make_buffer();
        ok && length_to_read == length
    }

    fn copy_to_slow(&mut self, length: Position, dest: &mut dyn Writer) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let length_to_copy = length.min(self.remaining());
        let ok = self.src.copy_to(length_to_copy, dest);
        self.make_buffer();
        ok && length_to_copy == length
    }

    fn copy_to_backward_slow(&mut self, length: usize, dest: &mut dyn BackwardWriter) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        if length as Position > self.remaining() {
            // Backward copies are all or nothing.
            let remaining = self.remaining();
            self.src.skip(remaining);
            self.make_buffer();
            return false;
        }
        let ok = self.src.copy_to_backward(length, dest);
        self.make_buffer();
        ok
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let target = new_pos.min(self.size_limit);
        let ok = self.src.seek(target);
        self.make_buffer();
        ok && target == new_pos
    }

    fn supports_random_access(&self) -> bool {
        self.src.supports_random_access()
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        self.sync_buffer();
        let size = self.src.size();
        self.make_buffer();
        Ok(size?.min(self.size_limit))
    }

    fn done(&mut self) {
        self.sync_buffer();
        if self.src.is_owning() && !self.src.close() {
            if let Err(err) = self.src.status() {
                self.base.fail(err);
            }
        }
    }
}

impl<R: Reader> Drop for LimitingReader<'_, R> {
    fn drop(&mut self) {
        if self.base.state().is_open() {
            self.sync_buffer();
        }
    }
}
