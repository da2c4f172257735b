//! RecordWriter
//!
//! Groups records into compressed chunks.
//!
//! ## Write Flow
//! ```text
//!   write_record ──► SimpleEncoder ──(chunk_size reached)──► ChunkWriter ──► dest
//!                        │                                       ▲
//!                        └──────────── flush / close ────────────┘
//! ```
//!
//! A new file starts with the signature chunk and, if configured, a
//! metadata chunk. A writer opened on a non-empty destination appends
//! chunks without them.

use serde::Serialize;
use tracing::{debug, info};

use crate::base::{Chain, Dependency, ObjectState, Position};
use crate::chunk::{Chunk, ChunkType, SimpleEncoder};
use crate::config::RecordWriterOptions;
use crate::error::{Result, RiffleError};
use crate::stream::message::serialize_to_vec;
use crate::stream::{FlushType, Writer};

use super::chunk_writer::ChunkWriter;
use super::position::RecordPosition;

/// Writer of records to a byte destination
#[derive(Debug)]
pub struct RecordWriter<'a, W: Writer> {
    state: ObjectState,
    chunk_writer: ChunkWriter<'a, W>,
    encoder: SimpleEncoder,
    chunk_size: u64,
    pad_to_block_boundary: bool,
    /// Where the chunk being collected will begin
    chunk_begin: Position,
    last_record: Option<RecordPosition>,
}

impl<'a, W: Writer> RecordWriter<'a, W> {
    pub fn new(dest: Dependency<'a, W>, options: RecordWriterOptions) -> Self {
        let mut writer = Self {
            state: ObjectState::new(),
            chunk_writer: ChunkWriter::new(dest),
            encoder: SimpleEncoder::new(options.compressor),
            chunk_size: options.chunk_size,
            pad_to_block_boundary: options.pad_to_block_boundary,
            chunk_begin: 0,
            last_record: None,
        };
        if let Err(err) = writer.start(&options) {
            writer.state.fail(err);
        }
        writer.chunk_begin = writer.chunk_writer.pos();
        writer
    }

    pub fn borrowed(dest: &'a mut W, options: RecordWriterOptions) -> Self {
        Self::new(Dependency::borrowed(dest), options)
    }

    fn start(&mut self, options: &RecordWriterOptions) -> Result<()> {
        self.chunk_writer.status()?;
        if self.chunk_writer.pos() != 0 {
            debug!(pos = self.chunk_writer.pos(), "Appending to existing records");
            return Ok(());
        }
        if !self.chunk_writer.write_chunk(&Chunk::file_signature()) {
            return self.chunk_writer.status();
        }
        if let Some(metadata) = &options.metadata {
            self.encoder.add_record(&serialize_to_vec(metadata)?)?;
            let chunk = self.encoder.encode(ChunkType::FileMetadata)?;
            if !self.chunk_writer.write_chunk(&chunk) {
                return self.chunk_writer.status();
            }
        }
        info!(
            compression = %options.compressor.compression_type,
            chunk_size = options.chunk_size,
            metadata = options.metadata.is_some(),
            "Records file started"
        );
        Ok(())
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

    fn fail(&mut self, err: RiffleError) -> bool {
        self.state.fail(err)
    }

    fn fail_chunk_writer(&mut self) -> bool {
        let err = self.chunk_writer.status().err().unwrap_or(RiffleError::Closed);
        self.fail(err)
    }

    /// Position of the next record.
    pub fn pos(&self) -> RecordPosition {
        RecordPosition::new(self.chunk_begin, self.encoder.num_records())
    }

    /// Position of the last record written.
    pub fn last_pos(&self) -> Option<RecordPosition> {
        self.last_record
    }

    pub fn dest(&self) -> &W {
        self.chunk_writer.dest()
    }

    // =========================================================================
    // Writing
    // =========================================================================

    pub fn write_record(&mut self, record: &[u8]) -> bool {
        if !self.state.healthy() {
            return false;
        }
        if let Err(err) = self.encoder.add_record(record) {
            return self.fail(err);
        }
        self.record_added()
    }

    pub fn write_record_chain(&mut self, record: &Chain) -> bool {
        if !self.state.healthy() {
            return false;
        }
        if let Err(err) = self.encoder.add_record_chain(record) {
            return self.fail(err);
        }
        self.record_added()
    }

    /// Serializes `message` and writes it as one record.
    pub fn write_message<T: Serialize + ?Sized>(&mut self, message: &T) -> bool {
        if !self.state.healthy() {
            return false;
        }
        match serialize_to_vec(message) {
            Ok(record) => self.write_record(&record),
            Err(err) => self.fail(err),
        }
    }

    fn record_added(&mut self) -> bool {
        self.last_record = Some(RecordPosition::new(
            self.chunk_begin,
            self.encoder.num_records() - 1,
        ));
        if self.encoder.estimated_size() >= self.chunk_size {
            return self.close_chunk();
        }
        true
    }

    /// Encodes and writes the records collected so far.
    fn close_chunk(&mut self) -> bool {
        if self.encoder.is_empty() {
            return true;
        }
        let chunk = match self.encoder.encode(ChunkType::Simple) {
            Ok(chunk) => chunk,
            Err(err) => return self.fail(err),
        };
        if !self.chunk_writer.write_chunk(&chunk) {
            return self.fail_chunk_writer();
        }
        self.chunk_begin = self.chunk_writer.pos();
        true
    }

    /// Writes the collected records as a chunk, pads if configured, and
    /// flushes the destination.
    pub fn flush(&mut self, flush_type: FlushType) -> bool {
        if !self.state.healthy() {
            return false;
        }
        if !self.close_chunk() {
            return false;
        }
        if self.pad_to_block_boundary && !self.chunk_writer.pad_to_block_boundary() {
            return self.fail_chunk_writer();
        }
        self.chunk_begin = self.chunk_writer.pos();
        if !self.chunk_writer.flush(flush_type) {
            return self.fail_chunk_writer();
        }
        true
    }

    /// Writes the remaining records and closes an owned destination.
    pub fn close(&mut self) -> bool {
        if !self.state.is_open() {
            return !self.state.failed();
        }
        if self.state.healthy() && self.close_chunk() {
            if self.pad_to_block_boundary && !self.chunk_writer.pad_to_block_boundary() {
                self.fail_chunk_writer();
            }
            self.chunk_begin = self.chunk_writer.pos();
        }
        if !self.chunk_writer.close() {
            self.fail_chunk_writer();
        }
        self.encoder.clear();
        debug!(pos = self.chunk_begin, "Record writer closed");
        self.state.mark_closed()
    }
}

impl<W: Writer> Drop for RecordWriter<'_, W> {
    fn drop(&mut self) {
        self.close();
    }
}
