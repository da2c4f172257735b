//! ChunkDecoder
//!
//! Turns one chunk into an indexable sequence of records.
//!
//! ## Invariants while healthy
//! - `limits` is sorted and its last entry is the size of `values`
//! - the values reader sits at the start of record `index`
//! - `index <= num_records()`

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::base::{Chain, ObjectState, Position};
use crate::error::{Result, RiffleError};
use crate::stream::{parse_from_chain, ChainReader, Reader};

use super::header::{Chunk, ChunkType};
use super::simple::SimpleDecoder;
use super::transpose::{FieldProjection, TransposeDecoder, UnsupportedTransposeDecoder};

/// Decoder of the records held by one chunk
pub struct ChunkDecoder {
    state: ObjectState,
    field_projection: FieldProjection,
    transpose_decoder: Box<dyn TransposeDecoder>,
    /// End offset of each record in the values reader
    limits: Vec<usize>,
    values: ChainReader<'static>,
    index: u64,
    /// Set when the failure was an unparsable message, which `recover`
    /// can skip
    recoverable: bool,
}

impl std::fmt::Debug for ChunkDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDecoder")
            .field("state", &self.state)
            .field("field_projection", &self.field_projection)
            .field("num_records", &self.limits.len())
            .field("index", &self.index)
            .field("recoverable", &self.recoverable)
            .finish_non_exhaustive()
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new(FieldProjection::all())
    }
}

impl ChunkDecoder {
    pub fn new(field_projection: FieldProjection) -> Self {
        Self::with_transpose_decoder(field_projection, Box::new(UnsupportedTransposeDecoder))
    }

    pub fn with_transpose_decoder(
        field_projection: FieldProjection,
        transpose_decoder: Box<dyn TransposeDecoder>,
    ) -> Self {
        Self {
            state: ObjectState::new(),
            field_projection,
            transpose_decoder,
            limits: Vec::new(),
            values: ChainReader::owned(Chain::new()),
            index: 0,
            recoverable: false,
        }
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

    /// Resets to an empty chunk, keeping the field projection.
    pub fn clear(&mut self) {
        self.state = ObjectState::new();
        self.limits.clear();
        self.values = ChainReader::owned(Chain::new());
        self.index = 0;
        self.recoverable = false;
    }

    pub fn close(&mut self) -> bool {
        self.recoverable = false;
        self.limits.clear();
        self.values = ChainReader::owned(Chain::new());
        self.state.mark_closed()
    }

    /// Current record index. Unchanged by `close()`.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn num_records(&self) -> u64 {
        self.limits.len() as u64
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Replaces the current records with those of `chunk`.
    pub fn decode(&mut self, chunk: &Chunk) -> bool {
        self.clear();
        match self.parse(chunk) {
            Ok((values, limits)) => {
                trace!(
                    chunk_type = %chunk.header.chunk_type(),
                    num_records = limits.len(),
                    "Chunk decoded"
                );
                self.limits = limits;
                self.values = ChainReader::owned(values);
                true
            }
            Err(err) => self.fail(err),
        }
    }

    fn parse(&mut self, chunk: &Chunk) -> Result<(Chain, Vec<usize>)> {
        let header = &chunk.header;
        match header.chunk_type() {
            ChunkType::FileSignature => {
                if header.data_size() != 0 || header.num_records() != 0 || header.decoded_data_size() != 0 {
                    return Err(RiffleError::DataLoss(
                        "Invalid file signature chunk: sizes are not zero".into(),
                    ));
                }
                Ok((Chain::new(), Vec::new()))
            }
            ChunkType::FileMetadata | ChunkType::Padding => {
                if header.num_records() != 0 {
                    return Err(RiffleError::DataLoss(format!(
                        "Invalid {} chunk: number of records is not zero: {}",
                        header.chunk_type(),
                        header.num_records()
                    )));
                }
                Ok((Chain::new(), Vec::new()))
            }
            ChunkType::Simple => {
                let decoder = SimpleDecoder::decode(&chunk.data, header.num_records(), header.decoded_data_size())?;
                Ok(decoder.into_parts())
            }
            ChunkType::Transposed => {
                let mut src = ChainReader::owned(chunk.data.clone());
                let mut values = Chain::new();
                let limits = self.transpose_decoder.decode(
                    &mut src,
                    header.num_records(),
                    header.decoded_data_size(),
                    &self.field_projection,
                    &mut values,
                )?;
                if limits.len() as u64 != header.num_records() {
                    return Err(RiffleError::DataLoss(
                        "Transposed chunk decoded to a different number of records".into(),
                    ));
                }
                if limits.windows(2).any(|pair| pair[0] > pair[1]) || limits.last().copied().unwrap_or(0) != values.len() {
                    return Err(RiffleError::DataLoss("Transposed chunk has invalid record limits".into()));
                }
                Ok((values, limits))
            }
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Byte range of the record at `index` in the values reader.
    fn next_record_range(&self) -> Option<(usize, usize)> {
        if !self.state.healthy() || self.index >= self.num_records() {
            return None;
        }
        let start = self.values.pos() as usize;
        let limit = self.limits[self.index as usize];
        debug_assert!(start <= limit, "record limits not sorted");
        Some((start, limit))
    }

    /// Reads the next record into `record`, replacing its contents.
    ///
    /// Returns false at the end of the chunk or after a failure.
    pub fn read_record(&mut self, record: &mut Vec<u8>) -> bool {
        let Some((start, limit)) = self.next_record_range() else {
            return false;
        };
        record.clear();
        let read = self.values.read_to_vec(limit - start, record);
        debug_assert!(read, "values reader ended inside a record");
        self.index += 1;
        true
    }

    /// Reads the next record, sharing the decoded blocks.
    pub fn read_record_chain(&mut self, record: &mut Chain) -> bool {
        let Some((start, limit)) = self.next_record_range() else {
            return false;
        };
        record.clear();
        let read = self.values.read_to_chain(limit - start, record);
        debug_assert!(read, "values reader ended inside a record");
        self.index += 1;
        true
    }

    /// Reads the next record as a contiguous buffer.
    pub fn read_record_bytes(&mut self) -> Option<Bytes> {
        let mut record = Chain::new();
        if !self.read_record_chain(&mut record) {
            return None;
        }
        Some(record.to_bytes())
    }

    /// Reads and parses the next record. A record that fails to parse
    /// fails the decoder in a way `recover` can skip.
    pub fn read_message<T: DeserializeOwned>(&mut self) -> Option<T> {
        let mut record = Chain::new();
        if !self.read_record_chain(&mut record) {
            return None;
        }
        match parse_from_chain(&record) {
            Ok(message) => Some(message),
            Err(err) => {
                self.recoverable = true;
                let message = format!("Failed to parse record {}: {}", self.index - 1, err.message());
                self.fail(RiffleError::DataLoss(message));
                None
            }
        }
    }

    /// Skips past an unparsable message. Returns false if the failure was
    /// of another kind.
    pub fn recover(&mut self) -> bool {
        if !self.recoverable {
            return false;
        }
        self.recoverable = false;
        self.state.mark_not_failed();
        true
    }

    /// Moves to record `index`, clamped to `num_records()`.
    pub fn set_index(&mut self, index: u64) {
        debug_assert!(self.state.healthy(), "set_index() on a failed decoder");
        self.index = index.min(self.num_records());
        let start = match self.index {
            0 => 0,
            index => self.limits[index as usize - 1],
        };
        let moved = self.values.seek(start as Position);
        debug_assert!(moved, "values reader could not seek to a record start");
    }
}
