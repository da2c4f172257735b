//! ChunkWriter
//!
//! Writes chunks to a byte `Writer`: the encoded header, the payload, then
//! zeros up to the chunk end.

use tracing::trace;

use crate::base::{Dependency, ObjectState, Position};
use crate::chunk::{Chunk, CHUNK_HEADER_SIZE};
use crate::error::{Result, RiffleError};
use crate::stream::{FlushType, Writer};

/// Files are padded to multiples of this size by `pad_to_block_boundary`.
pub const BLOCK_SIZE: Position = 1 << 16;

/// Writer of chunks to a byte destination
#[derive(Debug)]
pub struct ChunkWriter<'a, W: Writer> {
    state: ObjectState,
    dest: Dependency<'a, W>,
    /// End of the last chunk written
    pos: Position,
}

impl<'a, W: Writer> ChunkWriter<'a, W> {
    /// Writes chunks starting at the current position of `dest`.
    pub fn new(dest: Dependency<'a, W>) -> Self {
        let mut state = ObjectState::new();
        if let Err(err) = dest.status() {
            state.fail(err);
        }
        let pos = dest.pos();
        Self { state, dest, pos }
    }

    pub fn borrowed(dest: &'a mut W) -> Self {
        Self::new(Dependency::borrowed(dest))
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Result<()> {
        self.state.status()
    }

    /// Position where the next chunk begins.
    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    fn fail_dest(&mut self) -> bool {
        let err = self.dest.status().err().unwrap_or(RiffleError::Closed);
        self.state.fail(err)
    }

    pub fn write_chunk(&mut self, chunk: &Chunk) -> bool {
        if !self.state.healthy() {
            return false;
        }
        let chunk_end = chunk.header.chunk_end(self.pos);
        let data_end = self.pos + CHUNK_HEADER_SIZE as Position + chunk.data.len() as Position;
        if !self.dest.write(&chunk.header.encode())
            || !self.dest.write_chain(&chunk.data)
            || !self.dest.write_zeros(chunk_end - data_end)
        {
            return self.fail_dest();
        }
        trace!(
            chunk_begin = self.pos,
            chunk_type = %chunk.header.chunk_type(),
            data_size = chunk.header.data_size(),
            num_records = chunk.header.num_records(),
            "Chunk written"
        );
        self.pos = chunk_end;
        true
    }

    /// Writes a padding chunk ending at the next block boundary. A boundary
    /// too close for a chunk header is skipped for the following one.
    pub fn pad_to_block_boundary(&mut self) -> bool {
        let remainder = self.pos % BLOCK_SIZE;
        if remainder == 0 {
            return self.state.healthy();
        }
        let mut length = BLOCK_SIZE - remainder;
        if length < CHUNK_HEADER_SIZE as Position {
            length += BLOCK_SIZE;
        }
        self.write_chunk(&Chunk::padding(length))
    }

    pub fn flush(&mut self, flush_type: FlushType) -> bool {
        if !self.state.healthy() {
            return false;
        }
        if !self.dest.flush(flush_type) {
            return self.fail_dest();
        }
        true
    }

    /// Closes the writer and an owned destination.
    pub fn close(&mut self) -> bool {
        if !self.state.is_open() {
            return !self.state.failed();
        }
        if self.dest.is_owning() && !self.dest.close() {
            self.fail_dest();
        }
        self.state.mark_closed()
    }
}
