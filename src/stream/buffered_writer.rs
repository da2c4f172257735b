//! BufferedWriter
//!
//! Turns a plain "write all of these bytes" sink into a `Writer`. Writes
//! collect in one reusable buffer; writes of at least a buffer's worth go
//! straight to the sink.

use tracing::trace;

use crate::base::{to_position, Position};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};

use super::writer::{write_by_pushing, FlushType, Writer, WriterBase};

/// Unbuffered sink driven by `BufferedWriter`
pub trait WriteSink {
    /// Writes all of `src`.
    fn write_internal(&mut self, src: &[u8]) -> Result<()>;

    /// Propagates a flush after buffered data was written.
    fn flush_internal(&mut self, _flush_type: FlushType) -> Result<()> {
        Ok(())
    }

    fn supports_random_access(&self) -> bool {
        false
    }

    fn supports_truncate(&self) -> bool {
        false
    }

    /// Repositions the sink, clamping to its size. Returns the position
    /// actually reached.
    fn seek_internal(&mut self, _new_pos: Position) -> Result<Position> {
        Err(RiffleError::Unimplemented("Seek not supported".into()))
    }

    fn size_internal(&mut self) -> Result<Position> {
        Err(RiffleError::Unimplemented("Size not supported".into()))
    }

    fn truncate_internal(&mut self, _new_size: Position) -> Result<()> {
        Err(RiffleError::Unimplemented("Truncate not supported".into()))
    }

    /// Finishes the stream once all data was written.
    fn done(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `Writer` over a `WriteSink`
#[derive(Debug)]
pub struct BufferedWriter<S: WriteSink> {
    base: WriterBase,
    sink: S,
    options: BufferOptions,
}

impl<S: WriteSink> BufferedWriter<S> {
    pub fn from_sink(sink: S, options: BufferOptions) -> Self {
        Self::from_sink_at(sink, options, 0)
    }

    /// Starts position accounting at `start_pos`, e.g. when appending.
    pub fn from_sink_at(sink: S, options: BufferOptions, start_pos: Position) -> Self {
        Self {
            base: WriterBase::at(start_pos),
            sink,
            options,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Hands buffered bytes to the sink and empties the buffer.
    fn push_internal(&mut self) -> bool {
        let written = self.base.written().len();
        if written == 0 {
            return true;
        }
        let pos = self.base.pos();
        if let Err(err) = self.sink.write_internal(self.base.written()) {
            return self.base.fail(err);
        }
        trace!(pos, written, "Buffer pushed");
        self.base.clear_buffer_at(pos);
        true
    }

    fn fail_with(&mut self, err: RiffleError) -> bool {
        self.base.fail(err)
    }
}

impl<S: WriteSink> Writer for BufferedWriter<S> {
    fn base(&self) -> &WriterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriterBase {
        &mut self.base
    }

    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.base.state().healthy() || !self.push_internal() {
            return false;
        }
        let pos = self.base.pos();
        let length = self.options.next_buffer_length(pos, min_length, recommended_length);
        if pos.checked_add(to_position(length)).is_none() {
            return self.base.fail_overflow();
        }
        self.base.reserve_window(length, pos);
        true
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        if !self.base.state().healthy() || !self.push_internal() {
            return false;
        }
        match self.sink.flush_internal(flush_type) {
            Ok(()) => true,
            Err(err) => self.fail_with(err),
        }
    }

    fn write_slow(&mut self, src: &[u8]) -> bool {
        if src.len() < self.options.buffer_size {
            return write_by_pushing(self, src);
        }
        if !self.base.state().healthy() || !self.push_internal() {
            return false;
        }
        let pos = self.base.pos();
        let Some(new_pos) = pos.checked_add(to_position(src.len())) else {
            return self.base.fail_overflow();
        };
        if let Err(err) = self.sink.write_internal(src) {
            return self.fail_with(err);
        }
        self.base.clear_buffer_at(new_pos);
        true
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.sink.supports_random_access() || !self.base.state().healthy() {
            return false;
        }
        if !self.push_internal() {
            return false;
        }
        match self.sink.seek_internal(new_pos) {
            Ok(reached) => {
                self.base.clear_buffer_at(reached);
                reached == new_pos
            }
            Err(err) => self.fail_with(err),
        }
    }

    fn supports_random_access(&self) -> bool {
        self.sink.supports_random_access()
    }

    fn supports_truncate(&self) -> bool {
        self.sink.supports_truncate()
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        if !self.push_internal() {
            return Err(self.status().err().unwrap_or(RiffleError::Closed));
        }
        match self.sink.size_internal() {
            Ok(size) => Ok(size),
            Err(err) if err.is_unimplemented() => Err(err),
            Err(err) => {
                self.base.fail(err.clone());
                Err(err)
            }
        }
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.sink.supports_truncate() || !self.base.state().healthy() {
            return false;
        }
        if !self.push_internal() {
            return false;
        }
        match self.sink.size_internal() {
            Ok(size) if new_size > size => return false,
            Ok(_) => {}
            Err(err) => return self.fail_with(err),
        }
        if let Err(err) = self.sink.truncate_internal(new_size) {
            return self.fail_with(err);
        }
        self.base.clear_buffer_at(new_size);
        true
    }

    fn done(&mut self) {
        if self.base.state().healthy() {
            self.push_internal();
        }
        if let Err(err) = self.sink.done() {
            self.base.fail(err);
        }
    }
}
