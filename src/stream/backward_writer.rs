//! BackwardWriter
//!
//! A writer that prepends: each write lands before everything written so
//! far, so the destination ends up holding writes in reverse order. The
//! buffer fills from its end towards its start.
//!
//! ```text
//!   limit            cursor                 start
//!     │                 │                     │
//!     ▼                 ▼                     ▼
//!     ┌─────────────────┬─────────────────────┐
//!     │   spare space   │ written (not pushed)│
//!     └─────────────────┴─────────────────────┘
//! ```

use bytes::Bytes;

use crate::base::{BackwardCursor, Chain, ObjectState, Position};
use crate::error::{Result, RiffleError};

use super::writer::FlushType;

// =============================================================================
// Backward Writer Base
// =============================================================================

#[derive(Debug, Default)]
pub struct BackwardWriterBase {
    state: ObjectState,
    buffer: Vec<u8>,
    window: BackwardCursor,
}

impl BackwardWriterBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(pos: Position) -> Self {
        Self {
            window: BackwardCursor::empty_at(pos),
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
    pub fn window(&self) -> &BackwardCursor {
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

    /// Spare space; new bytes go at its end.
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.window.limit()..self.window.cursor()]
    }

    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.buffer[self.window.cursor()..self.window.start()]
    }

    #[inline]
    pub fn move_cursor(&mut self, length: usize) {
        self.window.move_cursor(length);
    }

    /// Uses all of `buffer` as spare space; written data will end at its end.
    pub fn set_buffer(&mut self, buffer: Vec<u8>, start_pos: Position) {
        let len = buffer.len();
        self.window = BackwardCursor::new(len, len, 0, start_pos);
        self.buffer = buffer;
    }

    pub fn set_window(&mut self, buffer: Vec<u8>, window: BackwardCursor) {
        debug_assert!(window.start() <= buffer.len(), "window past end of buffer");
        self.buffer = buffer;
        self.window = window;
    }

    pub fn take_window(&mut self) -> (Vec<u8>, BackwardCursor) {
        let pos = self.pos();
        let window = std::mem::replace(&mut self.window, BackwardCursor::empty_at(pos));
        (std::mem::take(&mut self.buffer), window)
    }

    pub fn clear_buffer_at(&mut self, pos: Position) {
        self.window = BackwardCursor::empty_at(pos);
    }

    pub fn fail(&mut self, err: RiffleError) -> bool {
        let pos = self.pos();
        self.clear_buffer_at(pos);
        self.state.fail(err)
    }

    pub fn fail_overflow(&mut self) -> bool {
        self.fail(RiffleError::Overflow("BackwardWriter position overflow".into()))
    }

    pub fn mark_closed(&mut self) -> bool {
        let pos = self.pos();
        self.clear_buffer_at(pos);
        self.buffer = Vec::new();
        self.state.mark_closed()
    }
}

// =============================================================================
// Backward Writer Trait
// =============================================================================

/// Buffered byte sink that prepends
pub trait BackwardWriter {
    fn base(&self) -> &BackwardWriterBase;

    fn base_mut(&mut self) -> &mut BackwardWriterBase;

    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool;

    fn flush(&mut self, flush_type: FlushType) -> bool;

    fn write_slow(&mut self, src: &[u8]) -> bool {
        prepend_by_pushing(self, src)
    }

    /// Prepends the chain as a whole, last block first.
    fn write_chain_slow(&mut self, src: &Chain) -> bool {
        src.blocks().rev().all(|block| self.write(block))
    }

    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        self.write_slow(&src)
    }

    fn supports_truncate(&self) -> bool {
        false
    }

    /// Keeps only the first `new_size` bytes written, dropping later
    /// (leading) ones.
    fn truncate(&mut self, _new_size: Position) -> bool {
        false
    }

    fn size(&mut self) -> Result<Position> {
        self.base().state().status()?;
        Ok(self.pos())
    }

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
    fn push(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if self.available() >= min_length {
            return true;
        }
        self.push_slow(min_length, recommended_length)
    }

    #[inline]
    fn write(&mut self, src: &[u8]) -> bool {
        let available = self.available();
        if src.len() <= available {
            self.base_mut().spare_mut()[available - src.len()..].copy_from_slice(src);
            self.base_mut().move_cursor(src.len());
            return true;
        }
        self.write_slow(src)
    }

    fn write_chain(&mut self, src: &Chain) -> bool {
        if src.len() <= self.available() {
            return src.blocks().rev().all(|block| self.write(block));
        }
        self.write_chain_slow(src)
    }

    fn write_bytes(&mut self, src: Bytes) -> bool {
        if src.len() <= self.available() {
            return self.write(&src);
        }
        self.write_bytes_slow(src)
    }

    fn close(&mut self) -> bool {
        if !self.is_open() {
            return !self.base().state().failed();
        }
        self.done();
        self.base_mut().mark_closed()
    }
}

/// Prepends `src` through successive pushes, tail first.
pub fn prepend_by_pushing<W: BackwardWriter + ?Sized>(dest: &mut W, src: &[u8]) -> bool {
    let mut src = src;
    loop {
        let available = dest.available();
        let piece = available.min(src.len());
        let (head, tail) = src.split_at(src.len() - piece);
        dest.base_mut().spare_mut()[available - piece..].copy_from_slice(tail);
        dest.base_mut().move_cursor(piece);
        src = head;
        if src.is_empty() {
            return true;
        }
        if !dest.push(1, src.len()) {
            return false;
        }
    }
}
