//! LimitingBackwardWriter
//!
//! The prepending counterpart of `LimitingWriter`: borrows the wrapped
//! backward writer's buffer with its limit clamped so that the total written
//! size never exceeds `size_limit`.

use bytes::Bytes;

use crate::base::{to_length, to_position, BackwardCursor, Chain, Dependency, Position};
use crate::error::{Result, RiffleError};

use super::backward_writer::{BackwardWriter, BackwardWriterBase};
use super::writer::FlushType;

/// `BackwardWriter` that ends at `size_limit`
#[derive(Debug)]
pub struct LimitingBackwardWriter<'a, W: BackwardWriter> {
    base: BackwardWriterBase,
    dest: Dependency<'a, W>,
    size_limit: Position,
    dest_limit: usize,
    active: bool,
}

impl<'a, W: BackwardWriter> LimitingBackwardWriter<'a, W> {
    pub fn new(dest: Dependency<'a, W>, size_limit: Option<Position>) -> Self {
        let pos = dest.pos();
        let mut writer = Self {
            base: BackwardWriterBase::at(pos),
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

    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    fn make_buffer(&mut self) {
        let (buffer, window) = self.dest.base_mut().take_window();
        self.dest_limit = window.limit();
        let room = self.size_limit - window.start_pos();
        let limit = if ((window.start() - window.limit()) as Position) > room {
            window.start() - room as usize
        } else {
            window.limit()
        };
        self.base.set_window(
            buffer,
            BackwardCursor::new(window.start(), window.cursor(), limit, window.start_pos()),
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
            BackwardCursor::new(
                window.start(),
                window.cursor(),
                self.dest_limit.min(window.cursor()),
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

impl<W: BackwardWriter> BackwardWriter for LimitingBackwardWriter<'_, W> {
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
            // Prepending keeps the tail that fits.
            self.dest.write(&src[src.len() - to_length(remaining)..]);
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
        if to_position(src.len()) > self.remaining() {
            return self.write_slow(&src.to_vec());
        }
        self.sync_buffer();
        let ok = self.dest.write_chain(src);
        self.make_buffer();
        ok
    }

    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        if to_position(src.len()) > self.remaining() {
            return self.write_slow(&src);
        }
        self.sync_buffer();
        let ok = self.dest.write_bytes(src);
        self.make_buffer();
        ok
    }

    fn supports_truncate(&self) -> bool {
        self.dest.supports_truncate()
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

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        self.sync_buffer();
        let size = self.dest.size();
        self.make_buffer();
        Ok(size?.min(self.size_limit))
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

impl<W: BackwardWriter> Drop for LimitingBackwardWriter<'_, W> {
    fn drop(&mut self) {
        self.sync_buffer();
    }
}
