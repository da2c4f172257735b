//! LimitingWriter
//!
//! Writes to another writer but refuses to go past an absolute position.
//! The wrapped writer's buffer is borrowed for the duration of each burst of
//! fast-path writes: it is taken out of the wrapped writer with the limit
//! clamped, and handed back (with the original limit) before every
//! delegated call, on close and on drop.
//!
//! Writing past the limit stores what fits and fails with `Overflow`.

use bytes::Bytes;

use crate::base::{to_length, to_position, BufferCursor, Chain, Dependency, Position};
use crate::error::{Result, RiffleError};

use super::writer::{FlushType, Writer, WriterBase};

/// `Writer` that ends at `size_limit`
#[derive(Debug)]
pub struct LimitingWriter<'a, W: Writer> {
    base: WriterBase,
    dest: Dependency<'a, W>,
    size_limit: Position,
    /// Limit of the wrapped window while its buffer is held here.
    dest_limit: usize,
    active: bool,
}

impl<'a, W: Writer> LimitingWriter<'a, W> {
    /// `None` means no limit. A limit before the current position fails.
    pub fn new(dest: Dependency<'a, W>, size_limit: Option<Position>) -> Self {
        let pos = dest.pos();
        let mut writer = Self {
            base: WriterBase::at(pos),
            dest,
            size_limit: size_limit.unwrap_or(Position::MAX),
            dest_limit: 0,
            active: false,
        };
        if writer.size_limit < pos {
            writer.size_limit = pos;
            writer.base.fail(RiffleError::InvalidArgument(format!(
                "Size limit {} is before the current position {}",
                size_limit.unwrap_or(Position::MAX),
                pos
            )));
            return writer;
        }
        writer.make_buffer();
        writer
    }

    pub fn borrowed(dest: &'a mut W, size_limit: Option<Position>) -> Self {
        Self::new(Dependency::borrowed(dest), size_limit)
    }

    pub fn size_limit(&self) -> Position {
        self.size_limit
    }

    /// The wrapped writer. Its buffered state is complete after `flush()`.
    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    fn make_buffer(&mut self) {
        let (buffer, window) = self.dest.base_mut().take_window();
        self.dest_limit = window.limit();
        let limit = if window.limit_pos() > self.size_limit {
            window.limit() - (window.limit_pos() - self.size_limit) as usize
        } else {
            window.limit()
        };
        self.base.set_window(
            buffer,
            BufferCursor::new(window.start(), window.cursor(), limit, window.start_pos()),
        );
        self.active = true;
        if let Err(err) = self.dest.status() {
            self.base.fail(err);
        }
    }

    fn sync_buffer(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let (buffer, window) = self.base.take_window();
        self.dest.base_mut().set_window(
            buffer,
            BufferCursor::new(
                window.start(),
                window.cursor(),
                self.dest_limit.max(window.cursor()),
                window.start_pos(),
            ),
        );
    }

    fn remaining(&self) -> Position {
        self.size_limit.saturating_sub(self.base.pos())
    }

    fn fail_limit_exceeded(&mut self) -> bool {
        self.base.fail(RiffleError::Overflow(format!(
            "Position limit {} exceeded",
            self.size_limit
        )))
    }
}

impl<W: Writer> Writer for LimitingWriter<'_, W> {
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
        if to_position(min_length) > self.remaining() {
            return self.fail_limit_exceeded();
        }
        self.sync_buffer();
        let ok = self.dest.push(min_length, recommended_length);
        self.make_buffer();
        ok
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let ok = self.dest.flush(flush_type);
        self.make_buffer();
        ok
    }

    fn write_slow(&mut self, src: &[u8]) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let remaining = self.remaining();
        if to_position(src.len()) > remaining {
            self.dest.write(&src[..to_length(remaining)]);
            self.make_buffer();
            return self.fail_limit_exceeded();
        }
        let ok = self.dest.write(src);
        self.make_buffer();
        ok
    }

    fn write_chain_slow(&mut self, src: &Chain) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let remaining = self.remaining();
        if to_position(src.len()) > remaining {
            self.dest.write_chain(&src.slice(0, to_length(remaining)));
            self.make_buffer();
            return self.fail_limit_exceeded();
        }
        let ok = self.dest.write_chain(src);
        self.make_buffer();
        ok
    }

    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let remaining = self.remaining();
        if to_position(src.len()) > remaining {
            self.dest.write_bytes(src.slice(..to_length(remaining)));
            self.make_buffer();
            return self.fail_limit_exceeded();
        }
        let ok = self.dest.write_bytes(src);
        self.make_buffer();
        ok
    }

    fn write_zeros_slow(&mut self, length: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let remaining = self.remaining();
        if length > remaining {
            self.dest.write_zeros(remaining);
            self.make_buffer();
            return self.fail_limit_exceeded();
        }
        let ok = self.dest.write_zeros(length);
        self.make_buffer();
        ok
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let target = new_pos.min(self.size_limit);
        let ok = self.dest.seek(target);
        self.make_buffer();
        ok && target == new_pos
    }

    fn supports_random_access(&self) -> bool {
        self.dest.supports_random_access()
    }

    fn supports_truncate(&self) -> bool {
        self.dest.supports_truncate()
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        self.sync_buffer();
        let size = self.dest.size();
        self.make_buffer();
        Ok(size?.min(self.size_limit))
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let ok = self.dest.truncate(new_size);
        self.make_buffer();
        ok
    }

    fn max_bytes_to_copy(&self) -> usize {
        self.dest.max_bytes_to_copy()
    }

    fn done(&mut self) {
        self.sync_buffer();
        if self.dest.is_owning() && !self.dest.close() {
            if let Err(err) = self.dest.status() {
                self.base.fail(err);
            }
        }
    }
}

impl<W: Writer> Drop for LimitingWriter<'_, W> {
    fn drop(&mut self) {
        self.sync_buffer();
    }
}
