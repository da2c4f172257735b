//! ChunkReader
//!
//! Reads whole chunks from a byte `Reader` and resynchronizes after
//! corruption.
//!
//! ## Recovery
//! - Corrupted header: nothing it declares can be trusted, so the reader
//!   scans forward one byte at a time until a header checksum matches.
//! - Corrupted payload: the header is valid, so the reader jumps to the
//!   chunk end it declares.

use tracing::{trace, warn};

use crate::base::{Chain, Dependency, ObjectState, Position};
use crate::chunk::{Chunk, ChunkHeader, ChunkType, CHUNK_HEADER_SIZE};
use crate::error::{Result, RiffleError};
use crate::stream::Reader;

use super::position::SkippedRegion;

/// What `recover` must do to get past the current failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recoverable {
    No,
    /// Header at `pos` is invalid
    FindChunk,
    /// Header at `pos` is valid but its payload is not
    SkipChunk { chunk_end: Position },
}

/// Reader of chunks from a byte source
#[derive(Debug)]
pub struct ChunkReader<'a, R: Reader> {
    state: ObjectState,
    src: Dependency<'a, R>,
    /// Beginning of the next chunk to read
    pos: Position,
    /// Header of the chunk at `pos`, once pulled
    header: Option<ChunkHeader>,
    recoverable: Recoverable,
    /// The source ended inside a chunk
    truncated: bool,
}

impl<'a, R: Reader> ChunkReader<'a, R> {
    /// Reads chunks starting at the current position of `src`, which must
    /// be a chunk boundary.
    pub fn new(src: Dependency<'a, R>) -> Self {
        let mut state = ObjectState::new();
        if let Err(err) = src.status() {
            state.fail(err);
        }
        let pos = src.pos();
        Self {
            state,
            src,
            pos,
            header: None,
            recoverable: Recoverable::No,
            truncated: false,
        }
    }

    pub fn borrowed(src: &'a mut R) -> Self {
        Self::new(Dependency::borrowed(src))
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Result<()> {
        self.state.status()
    }

    /// Beginning of the next chunk.
    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn src(&self) -> &R {
        self.src.get()
    }

    pub fn src_mut(&mut self) -> &mut R {
        self.src.get_mut()
    }

    pub fn supports_random_access(&self) -> bool {
        self.src.supports_random_access()
    }

    /// Size of the source in bytes.
    pub fn size(&mut self) -> Result<Position> {
        self.state.status()?;
        self.src.size()
    }

    fn fail_src(&mut self) -> bool {
        let err = self
            .src
            .status()
            .err()
            .unwrap_or_else(|| RiffleError::Internal("Source failed without a status".into()));
        self.state.fail(err)
    }

    /// Closes the reader and an owned source. Fails if the source ended
    /// inside a chunk.
    pub fn close(&mut self) -> bool {
        if !self.state.is_open() {
            return !self.state.failed();
        }
        if self.truncated && self.state.healthy() {
            let length = self.src.pos().saturating_sub(self.pos);
            self.state.fail(RiffleError::DataLoss(format!(
                "Truncated records file, incomplete chunk at {} with length {length}",
                self.pos
            )));
        }
        if self.src.is_owning() && !self.src.close() {
            self.fail_src();
        }
        self.header = None;
        self.recoverable = Recoverable::No;
        self.state.mark_closed()
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Verifies that the source starts with a file signature chunk without
    /// consuming it.
    ///
    /// Returns false with a healthy reader if the source is empty.
    pub fn check_file_format(&mut self) -> bool {
        let Some(header) = self.pull_chunk_header() else {
            return false;
        };
        if self.pos != 0 || header.chunk_type() != ChunkType::FileSignature {
            self.recoverable = Recoverable::FindChunk;
            return self.state.fail(RiffleError::DataLoss(
                "Not a records file: missing file signature".into(),
            ));
        }
        true
    }

    /// Header of the next chunk, without consuming the chunk.
    ///
    /// Returns `None` at the end of the source or after a failure.
    pub fn pull_chunk_header(&mut self) -> Option<ChunkHeader> {
        if !self.state.healthy() || self.truncated {
            return None;
        }
        if let Some(header) = self.header {
            return Some(header);
        }
        if self.src.pos() != self.pos && !self.src.seek(self.pos) {
            if !self.src.healthy() {
                self.fail_src();
            }
            return None;
        }
        if !self.src.pull(CHUNK_HEADER_SIZE, 0) {
            if !self.src.healthy() {
                self.fail_src();
            } else if self.src.available() > 0 {
                self.truncated = true;
            }
            return None;
        }
        match ChunkHeader::decode(&self.src.chunk()[..CHUNK_HEADER_SIZE]) {
            Ok(header) => {
                self.header = Some(header);
                Some(header)
            }
            Err(err) => {
                self.recoverable = Recoverable::FindChunk;
                self.state.fail(err);
                None
            }
        }
    }

    /// Reads the next chunk.
    ///
    /// Returns `None` at the end of the source or after a failure. A chunk
    /// cut short by the end of the source is reported by `close()`.
    pub fn read_chunk(&mut self) -> Option<Chunk> {
        let header = self.pull_chunk_header()?;
        self.src.move_cursor(CHUNK_HEADER_SIZE);

        let Ok(data_size) = usize::try_from(header.data_size()) else {
            return self.fail_chunk(header, RiffleError::DataLoss("Chunk data too large".into()));
        };
        let mut data = Chain::new();
        if !self.src.read_to_chain(data_size, &mut data) {
            if !self.src.healthy() {
                self.fail_src();
            } else {
                self.truncated = true;
            }
            return None;
        }
        if let Err(err) = header.verify_data(&data) {
            return self.fail_chunk(header, err);
        }

        let chunk_end = header.chunk_end(self.pos);
        if self.src.pos() < chunk_end && !self.src.seek(chunk_end) {
            if !self.src.healthy() {
                self.fail_src();
            } else {
                self.truncated = true;
            }
            return None;
        }
        trace!(
            chunk_begin = self.pos,
            chunk_type = %header.chunk_type(),
            data_size = header.data_size(),
            num_records = header.num_records(),
            "Chunk read"
        );
        self.pos = chunk_end;
        self.header = None;
        Some(Chunk { header, data })
    }

    fn fail_chunk(&mut self, header: ChunkHeader, err: RiffleError) -> Option<Chunk> {
        self.recoverable = Recoverable::SkipChunk {
            chunk_end: header.chunk_end(self.pos),
        };
        self.state.fail(err);
        None
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Skips past the corrupted region after a failure and makes the reader
    /// healthy again.
    ///
    /// Returns `None` if the failure is not recoverable.
    pub fn recover(&mut self) -> Option<SkippedRegion> {
        let recoverable = std::mem::replace(&mut self.recoverable, Recoverable::No);
        if recoverable == Recoverable::No {
            return None;
        }
        let message = self
            .state
            .mark_not_failed()
            .map(|err| err.message())
            .unwrap_or_default();
        let begin = self.pos;
        self.header = None;
        match recoverable {
            Recoverable::No => return None,
            Recoverable::FindChunk => self.find_next_header(),
            Recoverable::SkipChunk { chunk_end } => {
                if !self.src.seek(chunk_end) {
                    if !self.src.healthy() {
                        self.fail_src();
                        return None;
                    }
                    self.pos = self.src.pos();
                } else {
                    self.pos = chunk_end;
                }
            }
        }
        if !self.state.healthy() {
            return None;
        }
        let region = SkippedRegion::new(begin, self.pos, message);
        warn!(
            begin = region.begin,
            end = region.end,
            reason = %region.message,
            "Skipping corrupted region"
        );
        Some(region)
    }

    /// Scans forward from the byte after `pos` for a valid header.
    fn find_next_header(&mut self) {
        if self.src.pos() != self.pos && !self.src.seek(self.pos) {
            if !self.src.healthy() {
                self.fail_src();
                return;
            }
        }
        if self.src.pull(1, 0) {
            self.src.move_cursor(1);
        }
        loop {
            if !self.src.pull(CHUNK_HEADER_SIZE, 0) {
                if !self.src.healthy() {
                    self.fail_src();
                    return;
                }
                // No room for another header: the rest of the source is skipped.
                let remaining = self.src.available();
                self.src.move_cursor(remaining);
                self.pos = self.src.pos();
                return;
            }
            if let Ok(header) = ChunkHeader::decode(&self.src.chunk()[..CHUNK_HEADER_SIZE]) {
                self.pos = self.src.pos();
                self.header = Some(header);
                return;
            }
            self.src.move_cursor(1);
        }
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Moves to `new_pos`, which must be a chunk boundary.
    ///
    /// Returns false with a healthy reader if `new_pos` is past the end of
    /// the source; the position is then the end.
    pub fn seek(&mut self, new_pos: Position) -> bool {
        if !self.state.healthy() {
            return false;
        }
        self.header = None;
        self.truncated = false;
        if !self.src.seek(new_pos) {
            if !self.src.healthy() {
                return self.fail_src();
            }
            self.pos = self.src.pos();
            return false;
        }
        self.pos = new_pos;
        true
    }

    /// Moves to the beginning of the chunk containing `new_pos`, or to the
    /// end of the source if `new_pos` is past it.
    ///
    /// Chunks are walked forward from the current chunk, or from the file
    /// start when `new_pos` lies behind it.
    pub fn seek_to_chunk_containing(&mut self, new_pos: Position) -> bool {
        if !self.state.healthy() {
            return false;
        }
        if new_pos < self.pos && !self.seek(0) {
            return false;
        }
        loop {
            let Some(header) = self.pull_chunk_header() else {
                return self.state.healthy();
            };
            let chunk_end = header.chunk_end(self.pos);
            if chunk_end > new_pos {
                return true;
            }
            if !self.src.seek(chunk_end) {
                if !self.src.healthy() {
                    return self.fail_src();
                }
                // The last chunk is cut short.
                self.truncated = true;
                self.header = None;
                return true;
            }
            self.pos = chunk_end;
            self.header = None;
        }
    }
}
