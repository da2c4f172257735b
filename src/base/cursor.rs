//! Buffer cursors
//!
//! Index triples into a buffer plus the absolute position of one edge. The
//! buffer itself is owned elsewhere (a `Bytes` for readers, a `Vec<u8>` for
//! writers), so cursors stay valid when the owning object moves.

use super::Position;

/// Forward window: `start <= cursor <= limit`, `start_pos` is the stream
/// position of `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferCursor {
    start: usize,
    cursor: usize,
    limit: usize,
    start_pos: Position,
}

impl BufferCursor {
    pub fn new(start: usize, cursor: usize, limit: usize, start_pos: Position) -> Self {
        debug_assert!(start <= cursor && cursor <= limit, "cursor outside of buffer");
        debug_assert!(
            start_pos.checked_add((limit - start) as Position).is_some(),
            "buffer end position overflows"
        );
        Self {
            start,
            cursor,
            limit,
            start_pos,
        }
    }

    /// Empty window positioned at `pos`.
    pub fn empty_at(pos: Position) -> Self {
        Self::new(0, 0, 0, pos)
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn start_pos(&self) -> Position {
        self.start_pos
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.limit - self.cursor
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.limit - self.start
    }

    #[inline]
    pub fn start_to_cursor(&self) -> usize {
        self.cursor - self.start
    }

    #[inline]
    pub fn pos(&self) -> Position {
        self.start_pos + self.start_to_cursor() as Position
    }

    #[inline]
    pub fn limit_pos(&self) -> Position {
        self.start_pos + self.buffer_size() as Position
    }

    #[inline]
    pub fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(self.start <= cursor && cursor <= self.limit, "cursor outside of buffer");
        self.cursor = cursor;
    }

    #[inline]
    pub fn move_cursor(&mut self, length: usize) {
        debug_assert!(length <= self.available(), "moving cursor past limit");
        self.cursor += length;
    }

    #[inline]
    pub fn set_limit(&mut self, limit: usize) {
        debug_assert!(self.cursor <= limit, "limit before cursor");
        self.limit = limit;
    }

    /// True if `pos` lies inside the window, both edges included.
    #[inline]
    pub fn contains_pos(&self, pos: Position) -> bool {
        pos >= self.start_pos && pos <= self.limit_pos()
    }

    /// Moves the cursor to `pos`, which must lie inside the window.
    #[inline]
    pub fn seek_within(&mut self, pos: Position) {
        debug_assert!(self.contains_pos(pos), "seek outside of buffer");
        self.cursor = self.start + (pos - self.start_pos) as usize;
    }
}

/// Backward window for writers that prepend: `limit <= cursor <= start`.
/// Bytes in `[cursor, start)` are written; `start_pos` is the position at
/// `start`, and positions grow towards `limit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackwardCursor {
    start: usize,
    cursor: usize,
    limit: usize,
    start_pos: Position,
}

impl BackwardCursor {
    pub fn new(start: usize, cursor: usize, limit: usize, start_pos: Position) -> Self {
        debug_assert!(limit <= cursor && cursor <= start, "cursor outside of buffer");
        Self {
            start,
            cursor,
            limit,
            start_pos,
        }
    }

    pub fn empty_at(pos: Position) -> Self {
        Self::new(0, 0, 0, pos)
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn start_pos(&self) -> Position {
        self.start_pos
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.cursor - self.limit
    }

    #[inline]
    pub fn start_to_cursor(&self) -> usize {
        self.start - self.cursor
    }

    #[inline]
    pub fn pos(&self) -> Position {
        self.start_pos + self.start_to_cursor() as Position
    }

    #[inline]
    pub fn move_cursor(&mut self, length: usize) {
        debug_assert!(length <= self.available(), "moving cursor past limit");
        self.cursor -= length;
    }

    #[inline]
    pub fn set_limit(&mut self, limit: usize) {
        debug_assert!(limit <= self.cursor, "limit after cursor");
        self.limit = limit;
    }
}
