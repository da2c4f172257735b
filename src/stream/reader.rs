//! Reader
//!
//! The pull-side buffering protocol. A reader exposes a window of its
//! buffer; the inline fast paths serve requests from the window and only
//! call the `*_slow` methods when the window is too short.
//!
//! ## Contract
//! - `pull(min, _)` returns true iff at least `min` bytes are contiguous in
//!   `chunk()`. False means end of data (still healthy) or failure.
//! - `pos()` never decreases except through `seek`.
//! - A failed reader keeps its position and an empty window.
//! - Unsupported backward seeks return false and keep the reader healthy;
//!   an unsupported `size()` returns `Unimplemented` without failing.

use bytes::Bytes;

use crate::base::{
    to_length, to_position, BufferCursor, Chain, ObjectState, Position, MAX_BYTES_TO_COPY,
};
use crate::config::DEFAULT_BUFFER_SIZE;
use crate::error::{Result, RiffleError};

use super::backward_writer::BackwardWriter;
use super::writer::Writer;

// =============================================================================
// Reader Base
// =============================================================================

/// State shared by every reader: lifecycle plus the current buffer window
#[derive(Debug, Default)]
pub struct ReaderBase {
    state: ObjectState,
    data: Bytes,
    window: BufferCursor,
}

impl ReaderBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed() -> Self {
        Self {
            state: ObjectState::closed(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn state(&self) -> &ObjectState {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    #[inline]
    pub fn window(&self) -> &BufferCursor {
        &self.window
    }

    /// The whole buffer the window indexes into.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Bytes between the cursor and the limit.
    #[inline]
    pub fn chunk(&self) -> &[u8] {
        &self.data[self.window.cursor()..self.window.limit()]
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.window.available()
    }

    #[inline]
    pub fn pos(&self) -> Position {
        self.window.pos()
    }

    #[inline]
    pub fn limit_pos(&self) -> Position {
        self.window.limit_pos()
    }

    #[inline]
    pub fn start_pos(&self) -> Position {
        self.window.start_pos()
    }

    #[inline]
    pub fn move_cursor(&mut self, length: usize) {
        self.window.move_cursor(length);
    }

    #[inline]
    pub fn set_cursor(&mut self, cursor: usize) {
        self.window.set_cursor(cursor);
    }

    #[inline]
    pub fn seek_within(&mut self, pos: Position) {
        self.window.seek_within(pos);
    }

    /// Exposes all of `data` with the cursor at its start.
    pub fn set_buffer(&mut self, data: Bytes, start_pos: Position) {
        self.window = BufferCursor::new(0, 0, data.len(), start_pos);
        self.data = data;
    }

    pub fn set_window(&mut self, data: Bytes, window: BufferCursor) {
        debug_assert!(window.limit() <= data.len(), "window past end of data");
        self.data = data;
        self.window = window;
    }

    /// Returns the buffer and window, leaving an empty window at the same
    /// position.
    pub fn take_window(&mut self) -> (Bytes, BufferCursor) {
        let pos = self.pos();
        let window = std::mem::replace(&mut self.window, BufferCursor::empty_at(pos));
        (std::mem::take(&mut self.data), window)
    }

    /// Drops the buffer, keeping the position.
    pub fn clear_buffer(&mut self) {
        let pos = self.pos();
        self.clear_buffer_at(pos);
    }

    pub fn clear_buffer_at(&mut self, pos: Position) {
        self.data = Bytes::new();
        self.window = BufferCursor::empty_at(pos);
    }

    /// Shares the next `length` bytes and moves the cursor past them.
    pub fn take_chunk(&mut self, length: usize) -> Bytes {
        let cursor = self.window.cursor();
        self.window.move_cursor(length);
        self.data.slice(cursor..cursor + length)
    }

    pub fn fail(&mut self, err: RiffleError) -> bool {
        self.clear_buffer();
        self.state.fail(err)
    }

    pub fn fail_overflow(&mut self) -> bool {
        self.fail(RiffleError::Overflow("Reader position overflow".into()))
    }

    pub fn mark_closed(&mut self) -> bool {
        self.clear_buffer();
        self.state.mark_closed()
    }
}

// =============================================================================
// Reader Trait
// =============================================================================

/// Buffered byte source
pub trait Reader {
    fn base(&self) -> &ReaderBase;

    fn base_mut(&mut self) -> &mut ReaderBase;

    /// Makes at least `min_length` bytes available. Called only when
    /// `available() < min_length`. `recommended_length` is a hint for how
    /// much the caller will read next; `pull` raises it to `min_length`.
    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool;

    /// Called only when `dest` is longer than `available()`. On false the
    /// position still advances past the bytes that were read.
    fn read_slow(&mut self, dest: &mut [u8]) -> bool {
        read_by_pulling(self, dest)
    }

    fn read_to_chain_slow(&mut self, length: usize, dest: &mut Chain) -> bool {
        read_to_chain_by_pulling(self, length, dest)
    }

    fn copy_to_slow(&mut self, length: Position, dest: &mut dyn Writer) -> bool {
        copy_by_pulling(self, length, dest)
    }

    fn copy_to_backward_slow(&mut self, length: usize, dest: &mut dyn BackwardWriter) -> bool {
        let mut data = Chain::new();
        if !self.read_to_chain(length, &mut data) {
            return false;
        }
        dest.write_chain(&data)
    }

    /// Called only when `new_pos` is outside of the window.
    fn seek_slow(&mut self, new_pos: Position) -> bool {
        seek_by_skipping(self, new_pos)
    }

    fn supports_random_access(&self) -> bool {
        false
    }

    /// Total size of the source, if the source knows it.
    fn size(&mut self) -> Result<Position> {
        self.base().state().status()?;
        Err(RiffleError::Unimplemented("Reader::size() not supported".into()))
    }

    /// Hook run once by `close()` before the reader is marked closed.
    fn done(&mut self) {}

    // -------------------------------------------------------------------------
    // Provided operations
    // -------------------------------------------------------------------------

    #[inline]
    fn healthy(&self) -> bool {
        self.base().state().healthy()
    }

    #[inline]
    fn is_open(&self) -> bool {
        self.base().state().is_open()
    }

    fn status(&self) -> Result<()> {
        self.base().state().status()
    }

    #[inline]
    fn pos(&self) -> Position {
        self.base().pos()
    }

    #[inline]
    fn limit_pos(&self) -> Position {
        self.base().limit_pos()
    }

    #[inline]
    fn available(&self) -> usize {
        self.base().available()
    }

    #[inline]
    fn chunk(&self) -> &[u8] {
        self.base().chunk()
    }

    #[inline]
    fn move_cursor(&mut self, length: usize) {
        self.base_mut().move_cursor(length);
    }

    #[inline]
    fn pull(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if self.available() >= min_length {
            return true;
        }
        self.pull_slow(min_length, recommended_length.max(min_length))
    }

    /// Fills `dest` completely or returns false.
    #[inline]
    fn read(&mut self, dest: &mut [u8]) -> bool {
        if dest.len() <= self.available() {
            dest.copy_from_slice(&self.chunk()[..dest.len()]);
            self.move_cursor(dest.len());
            return true;
        }
        self.read_slow(dest)
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.pull(1, 0) {
            return None;
        }
        let byte = self.chunk()[0];
        self.move_cursor(1);
        Some(byte)
    }

    /// Appends `length` bytes to `dest`. On false `dest` holds what was read.
    fn read_to_vec(&mut self, length: usize, dest: &mut Vec<u8>) -> bool {
        if length <= self.available() {
            dest.extend_from_slice(&self.chunk()[..length]);
            self.move_cursor(length);
            return true;
        }
        let old_len = dest.len();
        dest.resize(old_len + length, 0);
        let pos_before = self.pos();
        let ok = self.read_slow(&mut dest[old_len..]);
        let read = to_length(self.pos() - pos_before).min(length);
        dest.truncate(old_len + read);
        ok
    }

    /// Appends `length` bytes to `dest`, sharing buffer blocks where possible.
    fn read_to_chain(&mut self, length: usize, dest: &mut Chain) -> bool {
        if length <= self.available() && length <= MAX_BYTES_TO_COPY {
            dest.append_slice(&self.chunk()[..length]);
            self.move_cursor(length);
            return true;
        }
        self.read_to_chain_slow(length, dest)
    }

    /// Reads everything up to the end of the source.
    fn read_all(&mut self, dest: &mut Vec<u8>) -> bool {
        loop {
            dest.extend_from_slice(self.chunk());
            let available = self.available();
            self.move_cursor(available);
            if !self.pull(1, 0) {
                return self.healthy();
            }
        }
    }

    fn copy_to(&mut self, length: Position, dest: &mut dyn Writer) -> bool {
        if length <= to_position(self.available()) && to_length(length) <= MAX_BYTES_TO_COPY {
            let length = to_length(length);
            let ok = dest.write(&self.chunk()[..length]);
            self.move_cursor(length);
            return ok;
        }
        self.copy_to_slow(length, dest)
    }

    fn copy_to_backward(&mut self, length: usize, dest: &mut dyn BackwardWriter) -> bool {
        if length <= self.available() && length <= MAX_BYTES_TO_COPY {
            let ok = dest.write(&self.chunk()[..length]);
            self.move_cursor(length);
            return ok;
        }
        self.copy_to_backward_slow(length, dest)
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        if self.base().window().contains_pos(new_pos) {
            self.base_mut().seek_within(new_pos);
            return true;
        }
        self.seek_slow(new_pos)
    }

    fn skip(&mut self, length: Position) -> bool {
        match self.pos().checked_add(length) {
            Some(new_pos) => self.seek(new_pos),
            None => self.base_mut().fail_overflow(),
        }
    }

    /// Fails with `DataLoss` unless the source is at its end.
    fn verify_end(&mut self) -> bool {
        if self.pull(1, 0) {
            return self
                .base_mut()
                .fail(RiffleError::DataLoss("End of data expected".into()));
        }
        self.healthy()
    }

    /// Closes the reader. Returns true if it never failed.
    fn close(&mut self) -> bool {
        if !self.is_open() {
            return !self.base().state().failed();
        }
        self.done();
        self.base_mut().mark_closed()
    }

    fn verify_end_and_close(&mut self) -> bool {
        self.verify_end();
        self.close()
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn base(&self) -> &ReaderBase {
        (**self).base()
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        (**self).base_mut()
    }

    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        (**self).pull_slow(min_length, recommended_length)
    }

    fn read_slow(&mut self, dest: &mut [u8]) -> bool {
        (**self).read_slow(dest)
    }

    fn read_to_chain_slow(&mut self, length: usize, dest: &mut Chain) -> bool {
        (**self).read_to_chain_slow(length, dest)
    }

    fn copy_to_slow(&mut self, length: Position, dest: &mut dyn Writer) -> bool {
        (**self).copy_to_slow(length, dest)
    }

    fn copy_to_backward_slow(&mut self, length: usize, dest: &mut dyn BackwardWriter) -> bool {
        (**self).copy_to_backward_slow(length, dest)
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        (**self).seek_slow(new_pos)
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    fn size(&mut self) -> Result<Position> {
        (**self).size()
    }

    fn done(&mut self) {
        (**self).done()
    }
}

// =============================================================================
// Default slow paths
// =============================================================================

/// Copies from successive pulls until `dest` is full.
pub fn read_by_pulling<R: Reader + ?Sized>(src: &mut R, dest: &mut [u8]) -> bool {
    let mut filled = 0;
    loop {
        let length = src.available().min(dest.len() - filled);
        dest[filled..filled + length].copy_from_slice(&src.chunk()[..length]);
        src.move_cursor(length);
        filled += length;
        if filled == dest.len() {
            return true;
        }
        if !src.pull(1, (dest.len() - filled).min(DEFAULT_BUFFER_SIZE)) {
            return false;
        }
    }
}

/// Appends shared slices of successive buffers to `dest`.
pub fn read_to_chain_by_pulling<R: Reader + ?Sized>(
    src: &mut R,
    length: usize,
    dest: &mut Chain,
) -> bool {
    let mut remaining = length;
    loop {
        let piece = src.available().min(remaining);
        if piece > 0 {
            dest.append(src.base_mut().take_chunk(piece));
            remaining -= piece;
        }
        if remaining == 0 {
            return true;
        }
        if !src.pull(1, remaining.min(DEFAULT_BUFFER_SIZE)) {
            return false;
        }
    }
}

/// Forwards successive buffers to `dest`, sharing large pieces.
pub fn copy_by_pulling<R: Reader + ?Sized>(
    src: &mut R,
    length: Position,
    dest: &mut dyn Writer,
) -> bool {
    let mut remaining = length;
    loop {
        let piece = to_length(remaining).min(src.available());
        if piece > 0 {
            let ok = if piece <= MAX_BYTES_TO_COPY {
                let ok = dest.write(&src.chunk()[..piece]);
                src.move_cursor(piece);
                ok
            } else {
                dest.write_bytes(src.base_mut().take_chunk(piece))
            };
            if !ok {
                return false;
            }
            remaining -= to_position(piece);
        }
        if remaining == 0 {
            return true;
        }
        if !src.pull(1, to_length(remaining).min(DEFAULT_BUFFER_SIZE)) {
            return false;
        }
    }
}

/// Seeks forward by reading and discarding. Backward seeks past the window
/// are unsupported and return false without failing.
pub fn seek_by_skipping<R: Reader + ?Sized>(src: &mut R, new_pos: Position) -> bool {
    if !src.healthy() {
        return false;
    }
    if new_pos < src.base().start_pos() {
        return false;
    }
    loop {
        let limit = src.base().window().limit();
        src.base_mut().set_cursor(limit);
        if !src.pull(1, 0) {
            return false;
        }
        if new_pos <= src.limit_pos() {
            src.base_mut().seek_within(new_pos);
            return true;
        }
    }
}
