//! BufferedReader
//!
//! Turns a plain "read up to N bytes" source into a `Reader`. Refills keep
//! the unread tail of the previous buffer in front of the new data, and
//! reads of at least a buffer's worth bypass the buffer entirely.

use bytes::BytesMut;
use tracing::trace;

use crate::base::{to_position, Position};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};

use super::reader::{seek_by_skipping, Reader, ReaderBase};

/// Unbuffered source driven by `BufferedReader`
pub trait ReadSource {
    /// Reads into `dest`, trying to return at least `min_length` bytes.
    /// Returning fewer than `min_length` means the source is exhausted.
    fn read_internal(&mut self, dest: &mut [u8], min_length: usize) -> Result<usize>;

    fn supports_random_access(&self) -> bool {
        false
    }

    /// Repositions the source, clamping to its size. Returns the position
    /// actually reached.
    fn seek_internal(&mut self, _new_pos: Position) -> Result<Position> {
        Err(RiffleError::Unimplemented("Seek not supported".into()))
    }

    fn size_internal(&mut self) -> Result<Position> {
        Err(RiffleError::Unimplemented("Size not supported".into()))
    }

    /// True once the source knows no more data will come.
    fn exhausted(&self) -> bool {
        false
    }

    /// Runs when the reader closes.
    fn done(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `Reader` over a `ReadSource`
#[derive(Debug)]
pub struct BufferedReader<S: ReadSource> {
    base: ReaderBase,
    source: S,
    options: BufferOptions,
    spare: BytesMut,
}

impl<S: ReadSource> BufferedReader<S> {
    pub fn from_source(source: S, options: BufferOptions) -> Self {
        Self::from_source_at(source, options, 0)
    }

    /// Starts position accounting at `start_pos`.
    pub fn from_source_at(source: S, options: BufferOptions, start_pos: Position) -> Self {
        let mut base = ReaderBase::new();
        base.clear_buffer_at(start_pos);
        Self {
            base,
            source,
            options,
            spare: BytesMut::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn options(&self) -> &BufferOptions {
        &self.options
    }

    fn fail_with(&mut self, err: RiffleError) -> bool {
        self.base.fail(err)
    }
}

impl<S: ReadSource> Reader for BufferedReader<S> {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        debug_assert!(self.base.available() < min_length, "pull_slow with enough data");
        if !self.base.state().healthy() || self.source.exhausted() {
            return false;
        }
        let available = self.base.available();
        let pos = self.base.pos();
        let length = self
            .options
            .next_buffer_length(pos, min_length, recommended_length)
            .max(available + 1);

        // Reclaims the allocation once previous windows are dropped.
        let mut buffer = std::mem::take(&mut self.spare);
        buffer.clear();
        buffer.reserve(length);
        buffer.extend_from_slice(self.base.chunk());
        buffer.resize(length, 0);

        let result = self
            .source
            .read_internal(&mut buffer[available..], min_length - available);
        let read = match result {
            Ok(read) => read,
            Err(err) => return self.fail_with(err),
        };
        if pos.checked_add(to_position(available + read)).is_none() {
            return self.base.fail_overflow();
        }
        trace!(pos, read, "Buffer refilled");
        buffer.truncate(available + read);
        let data = buffer.split().freeze();
        self.spare = buffer;
        self.base.set_buffer(data, pos);
        available + read >= min_length
    }

    fn read_slow(&mut self, dest: &mut [u8]) -> bool {
        if dest.len() < self.options.buffer_size {
            return super::reader::read_by_pulling(self, dest);
        }
        if !self.base.state().healthy() {
            return false;
        }
        // Large read: drain the window, then read straight into `dest`.
        let available = self.base.available();
        dest[..available].copy_from_slice(self.base.chunk());
        self.base.move_cursor(available);
        let pos = self.base.pos();
        if self.source.exhausted() {
            return false;
        }
        let remaining = dest.len() - available;
        let read = match self.source.read_internal(&mut dest[available..], remaining) {
            Ok(read) => read,
            Err(err) => return self.fail_with(err),
        };
        match pos.checked_add(to_position(read)) {
            Some(new_pos) => self.base.clear_buffer_at(new_pos),
            None => return self.base.fail_overflow(),
        }
        read >= remaining
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.source.supports_random_access() {
            return seek_by_skipping(self, new_pos);
        }
        if !self.base.state().healthy() {
            return false;
        }
        match self.source.seek_internal(new_pos) {
            Ok(reached) => {
                self.base.clear_buffer_at(reached);
                reached == new_pos
            }
            Err(err) => self.fail_with(err),
        }
    }

    fn supports_random_access(&self) -> bool {
        self.source.supports_random_access()
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        match self.source.size_internal() {
            Ok(size) => Ok(size),
            Err(err) if err.is_unimplemented() => Err(err),
            Err(err) => {
                self.base.fail(err.clone());
                Err(err)
            }
        }
    }

    fn done(&mut self) {
        self.spare = BytesMut::new();
        if let Err(err) = self.source.done() {
            self.base.fail(err);
        }
    }
}
