//! Writer
//!
//! The push-side buffering protocol. A writer exposes spare buffer space;
//! small writes are copied into it inline and only `push_slow` / the
//! `*_slow` methods talk to the destination.
//!
//! Output is only guaranteed to reach the destination after `flush()` or
//! `close()`.

use bytes::Bytes;

use crate::base::{to_length, BufferCursor, Chain, ObjectState, Position, MAX_BYTES_TO_COPY};
use crate::error::{Result, RiffleError};

/// How far a flush must propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlushType {
    /// Push buffered data into the destination object only
    FromObject,

    /// Also make data visible to other processes
    FromProcess,

    /// Also make data durable across machine failure
    FromMachine,
}

// =============================================================================
// Writer Base
// =============================================================================

/// State shared by every writer: lifecycle plus the buffer window.
/// `[start, cursor)` holds written bytes, `[cursor, limit)` is spare space.
#[derive(Debug, Default)]
pub struct WriterBase {
    state: ObjectState,
    buffer: Vec<u8>,
    window: BufferCursor,
}

impl WriterBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed() -> Self {
        Self {
            state: ObjectState::closed(),
            ..Self::default()
        }
    }

    /// Starts writing at `pos` with no buffer yet.
    pub fn at(pos: Position) -> Self {
        Self {
            window: BufferCursor::empty_at(pos),
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

    #[inline]
    pub fn available(&self) -> usize {
        self.window.available()
    }

    #[inline]
    pub fn pos(&self) -> Position {
        self.window.pos()
    }

    #[inline]
    pub fn start_pos(&self) -> Position {
        self.window.start_pos()
    }

    #[inline]
    pub fn limit_pos(&self) -> Position {
        self.window.limit_pos()
    }

    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.window.cursor()..self.window.limit()]
    }

    /// Bytes written into the current buffer and not yet pushed.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.buffer[self.window.start()..self.window.cursor()]
    }

    #[inline]
    pub fn move_cursor(&mut self, length: usize) {
        self.window.move_cursor(length);
    }

    #[inline]
    pub fn set_cursor(&mut self, cursor: usize) {
        self.window.set_cursor(cursor);
    }

    /// Uses all of `buffer` as spare space starting at `start_pos`.
    pub fn set_buffer(&mut self, buffer: Vec<u8>, start_pos: Position) {
        self.window = BufferCursor::new(0, 0, buffer.len(), start_pos);
        self.buffer = buffer;
    }

    pub fn set_window(&mut self, buffer: Vec<u8>, window: BufferCursor) {
        debug_assert!(window.limit() <= buffer.len(), "window past end of buffer");
        self.buffer = buffer;
        self.window = window;
    }

    /// Returns the buffer and window, leaving no buffer at the same position.
    pub fn take_window(&mut self) -> (Vec<u8>, BufferCursor) {
        let pos = self.pos();
        let window = std::mem::replace(&mut self.window, BufferCursor::empty_at(pos));
        (std::mem::take(&mut self.buffer), window)
    }

    /// Reuses the current allocation as spare space starting at `start_pos`.
    pub fn reset_window(&mut self, start_pos: Position) {
        self.window = BufferCursor::new(0, 0, self.buffer.len(), start_pos);
    }

    /// Ensures the allocation holds at least `length` bytes, then resets the
    /// window to start at `start_pos`.
    pub fn reserve_window(&mut self, length: usize, start_pos: Position) {
        if self.buffer.len() < length {
            self.buffer.resize(length, 0);
        }
        self.reset_window(start_pos);
    }

    pub fn clear_buffer_at(&mut self, pos: Position) {
        self.window = BufferCursor::empty_at(pos);
    }

    pub fn fail(&mut self, err: RiffleError) -> bool {
        let pos = self.pos();
        self.clear_buffer_at(pos);
        self.state.fail(err)
    }

    pub fn fail_overflow(&mut self) -> bool {
        self.fail(RiffleError::Overflow("Writer position overflow".into()))
    }

    pub fn mark_closed(&mut self) -> bool {
        let pos = self.pos();
        self.clear_buffer_at(pos);
        self.buffer = Vec::new();
        self.state.mark_closed()
    }
}

// =============================================================================
// Writer Trait
// =============================================================================

/// Buffered byte sink
pub trait Writer {
    fn base(&self) -> &WriterBase;

    fn base_mut(&mut self) -> &mut WriterBase;

    /// Makes at least `min_length` bytes of spare space. Called only when
    /// `available() < min_length`.
    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool;

    /// Pushes buffered data as far as `flush_type` requires.
    fn flush(&mut self, flush_type: FlushType) -> bool;

    /// Called only when `src` is longer than `available()`.
    fn write_slow(&mut self, src: &[u8]) -> bool {
        write_by_pushing(self, src)
    }

    fn write_chain_slow(&mut self, src: &Chain) -> bool {
        src.blocks().all(|block| self.write(block))
    }

    /// Writes an owned block. Writers that can keep the block override this.
    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        self.write(&src)
    }

    fn write_zeros_slow(&mut self, length: Position) -> bool {
        let mut remaining = length;
        while remaining > 0 {
            if !self.push(1, to_length(remaining)) {
                return false;
            }
            let piece = to_length(remaining).min(self.available());
            self.base_mut().spare_mut()[..piece].fill(0);
            self.move_cursor(piece);
            remaining -= piece as Position;
        }
        true
    }

    /// Called only when `new_pos != pos()`. Without random access the
    /// writer stays where it is and returns false.
    fn seek_slow(&mut self, _new_pos: Position) -> bool {
        false
    }

    fn supports_random_access(&self) -> bool {
        false
    }

    fn supports_truncate(&self) -> bool {
        false
    }

    fn size(&mut self) -> Result<Position> {
        self.base().state().status()?;
        Err(RiffleError::Unimplemented("Writer::size() not supported".into()))
    }

    /// Discards everything after `new_size`. Returns false if `new_size` is
    /// past the end or truncation is not supported.
    fn truncate(&mut self, _new_size: Position) -> bool {
        false
    }

    /// Largest write copied into the buffer rather than shared.
    fn max_bytes_to_copy(&self) -> usize {
        MAX_BYTES_TO_COPY
    }

    /// Hook run once by `close()` before the writer is marked closed.
    fn done(&mut self) {
        self.flush(FlushType::FromObject);
    }

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
    fn available(&self) -> usize {
        self.base().available()
    }

    #[inline]
    fn spare_mut(&mut self) -> &mut [u8] {
        self.base_mut().spare_mut()
    }

    #[inline]
    fn move_cursor(&mut self, length: usize) {
        self.base_mut().move_cursor(length);
    }

    #[inline]
    fn push(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if self.available() >= min_length {
            return true;
        }
        self.push_slow(min_length, recommended_length)
    }

    #[inline]
    fn write(&mut self, src: &[u8]) -> bool {
        if src.len() <= self.available() {
            self.spare_mut()[..src.len()].copy_from_slice(src);
            self.move_cursor(src.len());
            return true;
        }
        self.write_slow(src)
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        self.write(&[byte])
    }

    fn write_chain(&mut self, src: &Chain) -> bool {
        if src.len() <= self.available().min(self.max_bytes_to_copy()) {
            for block in src.blocks() {
                self.spare_mut()[..block.len()].copy_from_slice(block);
                self.move_cursor(block.len());
            }
            return true;
        }
        self.write_chain_slow(src)
    }

    fn write_bytes(&mut self, src: Bytes) -> bool {
        if src.len() <= self.available().min(self.max_bytes_to_copy()) {
            return self.write(&src);
        }
        self.write_bytes_slow(src)
    }

    fn write_vec(&mut self, src: Vec<u8>) -> bool {
        self.write_bytes(Bytes::from(src))
    }

    fn write_zeros(&mut self, length: Position) -> bool {
        if length <= self.available() as Position {
            let length = length as usize;
            self.spare_mut()[..length].fill(0);
            self.move_cursor(length);
            return true;
        }
        self.write_zeros_slow(length)
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        if new_pos == self.pos() {
            return self.healthy();
        }
        self.seek_slow(new_pos)
    }

    /// Flushes and closes the writer. Returns true if it never failed.
    fn close(&mut self) -> bool {
        if !self.is_open() {
            return !self.base().state().failed();
        }
        self.done();
        self.base_mut().mark_closed()
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn base(&self) -> &WriterBase {
        (**self).base()
    }

    fn base_mut(&mut self) -> &mut WriterBase {
        (**self).base_mut()
    }

    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        (**self).push_slow(min_length, recommended_length)
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        (**self).flush(flush_type)
    }

    fn write_slow(&mut self, src: &[u8]) -> bool {
        (**self).write_slow(src)
    }

    fn write_chain_slow(&mut self, src: &Chain) -> bool {
        (**self).write_chain_slow(src)
    }

    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        (**self).write_bytes_slow(src)
    }

    fn write_zeros_slow(&mut self, length: Position) -> bool {
        (**self).write_zeros_slow(length)
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        (**self).seek_slow(new_pos)
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    fn supports_truncate(&self) -> bool {
        (**self).supports_truncate()
    }

    fn size(&mut self) -> Result<Position> {
        (**self).size()
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        (**self).truncate(new_size)
    }

    fn max_bytes_to_copy(&self) -> usize {
        (**self).max_bytes_to_copy()
    }

    fn done(&mut self) {
        (**self).done()
    }
}

/// Copies `src` through successive pushes.
pub fn write_by_pushing<W: Writer + ?Sized>(dest: &mut W, src: &[u8]) -> bool {
    let mut src = src;
    loop {
        let piece = dest.available().min(src.len());
        dest.spare_mut()[..piece].copy_from_slice(&src[..piece]);
        dest.move_cursor(piece);
        src = &src[piece..];
        if src.is_empty() {
            return true;
        }
        if !dest.push(1, src.len()) {
            return false;
        }
    }
}
