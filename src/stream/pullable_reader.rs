//! PullableReader
//!
//! Support for readers whose natural buffers are fixed pieces (chain blocks,
//! decoded frames). When a pull asks for more contiguous bytes than the
//! current piece has, the bytes are gathered into a scratch buffer, which
//! temporarily replaces the window.
//!
//! ## Scratch state
//! ```text
//!   scratch window   [ P ............................ P + n )
//!   original window               [ orig_pos ...... limit )
//! ```
//! The original window is saved with its cursor at `orig_pos`, the first
//! byte copied into the scratch from that window. Once reading reaches
//! `orig_pos` the original window is restored with the cursor advanced to
//! the current position, so bytes are never read twice.

use bytes::{Bytes, BytesMut};

use crate::base::{BufferCursor, Position};
use crate::config::DEFAULT_BUFFER_SIZE;

use super::reader::Reader;

/// Saved original window while a scratch buffer is active
#[derive(Debug, Default)]
pub struct Scratch {
    saved: Option<(Bytes, BufferCursor)>,
}

impl Scratch {
    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    pub fn clear(&mut self) {
        self.saved = None;
    }
}

/// Reader whose buffer comes in pieces that a pull may need to join
pub trait PullableReader: Reader {
    fn scratch(&self) -> &Scratch;

    fn scratch_mut(&mut self) -> &mut Scratch;

    /// Replaces an exhausted window with the next piece. Only called with
    /// no scratch active and `available() == 0`.
    fn pull_behind_scratch(&mut self) -> bool;
}

/// Ends the scratch if reading has reached the saved window. Returns false
/// while unread scratch bytes precede the saved window.
pub fn sync_scratch<R: PullableReader + ?Sized>(src: &mut R) -> bool {
    let Some((_, saved_window)) = src.scratch().saved.as_ref() else {
        return true;
    };
    let orig_pos = saved_window.pos();
    let pos = src.pos();
    if pos < orig_pos {
        return false;
    }
    restore_original(src, pos);
    true
}

/// Abandons the scratch, restoring the saved window at the position the
/// scratch was built from. Used before seeks that compute their own target.
pub fn discard_scratch<R: PullableReader + ?Sized>(src: &mut R) {
    let Some((_, saved_window)) = src.scratch().saved.as_ref() else {
        return;
    };
    let orig_pos = saved_window.pos();
    let pos = src.pos().max(orig_pos);
    restore_original(src, pos);
}

fn restore_original<R: PullableReader + ?Sized>(src: &mut R, pos: Position) {
    if let Some((data, mut window)) = src.scratch_mut().saved.take() {
        let pos = pos.min(window.limit_pos());
        window.seek_within(pos);
        src.base_mut().set_window(data, window);
    }
}

/// `pull_slow` for pullable readers: serves the request from the current
/// piece when possible, otherwise joins pieces into a scratch buffer.
pub fn pull_using_scratch<R: PullableReader + ?Sized>(
    src: &mut R,
    min_length: usize,
    recommended_length: usize,
) -> bool {
    if !src.healthy() {
        return false;
    }
    if src.scratch().is_active() && sync_scratch(src) && src.available() >= min_length {
        return true;
    }
    if min_length <= 1 && !src.scratch().is_active() {
        debug_assert_eq!(src.available(), 0);
        return src.pull_behind_scratch();
    }

    let start_pos = src.pos();
    let mut scratch =
        BytesMut::with_capacity(min_length.max(recommended_length.min(DEFAULT_BUFFER_SIZE)));

    // Unread scratch bytes come first; the saved window resumes after them.
    if let Some((data, window)) = src.scratch_mut().saved.take() {
        let unread = (window.pos() - start_pos) as usize;
        scratch.extend_from_slice(&src.chunk()[..unread]);
        src.base_mut().set_window(data, window);
    }

    loop {
        let needed = min_length - scratch.len();
        if src.available() >= needed {
            // Copy without consuming; the window stays saved at this point.
            scratch.extend_from_slice(&src.chunk()[..needed]);
            let (data, window) = src.base_mut().take_window();
            src.scratch_mut().saved = Some((data, window));
            let scratch = scratch.freeze();
            src.base_mut().set_buffer(scratch, start_pos);
            return true;
        }
        scratch.extend_from_slice(src.chunk());
        let available = src.available();
        src.move_cursor(available);
        if !src.pull_behind_scratch() {
            // Not enough data: expose what was gathered.
            if !scratch.is_empty() && src.healthy() {
                let (data, window) = src.base_mut().take_window();
                src.scratch_mut().saved = Some((data, window));
                src.base_mut().set_buffer(scratch.freeze(), start_pos);
            }
            return false;
        }
    }
}
