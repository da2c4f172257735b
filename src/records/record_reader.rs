//! RecordReader
//!
//! Iterates over the records of a records file, with seeking by record
//! position and recovery from corrupted chunks.
//!
//! ## States
//! ```text
//!                 read_chunk ok                 index == num_records
//!   ┌──────────┐ ─────────────► ┌─────────────┐ ─────────────────► ┌───────────┐
//!   │ no chunk │                │ has records │                    │ exhausted │
//!   └──────────┘ ◄───────────── └─────────────┘                    └───────────┘
//!        ▲          recover            │ decode / parse failure          │
//!        │                             ▼                                 │ read_chunk failure
//!        │                    ┌──────────────────┐                       ▼
//!        └─────── recover ─── │ failed (decoder) │        ┌───────────────────────┐
//!        └─────── recover ─── │                  │        │ failed (chunk reader) │
//!                             └──────────────────┘        └───────────────────────┘
//! ```
//! A failure stays until `recover()` skips the corrupted region or the
//! reader is closed. With a recovery callback installed, reads recover
//! on their own for as long as the callback agrees.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::base::{Chain, Dependency, ObjectState, Position};
use crate::chunk::{Chunk, ChunkDecoder, ChunkType, SimpleDecoder, TransposeDecoder};
use crate::config::{RecordReaderOptions, RecoveryFn};
use crate::error::{Result, RiffleError};
use crate::stream::{parse_from_chain, Reader};

use super::chunk_reader::ChunkReader;
use super::metadata::RecordsMetadata;
use super::position::{RecordPosition, SkippedRegion};

/// Which collaborator `recover` must resynchronize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recoverable {
    No,
    ChunkReader,
    ChunkDecoder,
}

/// Reader of records from a byte source
pub struct RecordReader<'a, R: Reader> {
    state: ObjectState,
    chunk_reader: ChunkReader<'a, R>,
    /// Beginning of the chunk loaded in `decoder`
    chunk_begin: Position,
    decoder: ChunkDecoder,
    recoverable: Recoverable,
    recovery: Option<RecoveryFn>,
    last_record: Option<RecordPosition>,
}

impl<R: Reader> std::fmt::Debug for RecordReader<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("state", &self.state)
            .field("chunk_begin", &self.chunk_begin)
            .field("decoder", &self.decoder)
            .field("recoverable", &self.recoverable)
            .field("recovery", &self.recovery.is_some())
            .field("last_record", &self.last_record)
            .finish_non_exhaustive()
    }
}

impl<'a, R: Reader> RecordReader<'a, R> {
    /// Reads records starting at the current position of `src`, which must
    /// be a chunk boundary.
    pub fn new(src: Dependency<'a, R>, options: RecordReaderOptions) -> Self {
        let decoder = ChunkDecoder::new(options.field_projection);
        Self::with_decoder(src, decoder, options.recovery)
    }

    pub fn borrowed(src: &'a mut R, options: RecordReaderOptions) -> Self {
        Self::new(Dependency::borrowed(src), options)
    }

    /// Like `new`, decoding transposed chunks with `transpose_decoder`.
    pub fn with_transpose_decoder(
        src: Dependency<'a, R>,
        options: RecordReaderOptions,
        transpose_decoder: Box<dyn TransposeDecoder>,
    ) -> Self {
        let decoder = ChunkDecoder::with_transpose_decoder(options.field_projection, transpose_decoder);
        Self::with_decoder(src, decoder, options.recovery)
    }

    fn with_decoder(src: Dependency<'a, R>, decoder: ChunkDecoder, recovery: Option<RecoveryFn>) -> Self {
        let chunk_reader = ChunkReader::new(src);
        let mut state = ObjectState::new();
        if let Err(err) = chunk_reader.status() {
            state.fail(err);
        }
        Self {
            state,
            chunk_begin: chunk_reader.pos(),
            chunk_reader,
            decoder,
            recoverable: Recoverable::No,
            recovery,
            last_record: None,
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

    pub fn src(&self) -> &R {
        self.chunk_reader.src()
    }

    fn fail(&mut self, err: RiffleError) -> bool {
        self.state.fail(err)
    }

    fn fail_chunk_reader(&mut self) -> bool {
        let err = self
            .chunk_reader
            .status()
            .err()
            .unwrap_or_else(|| RiffleError::Internal("Chunk reader failed without a status".into()));
        self.recoverable = Recoverable::ChunkReader;
        self.fail(err)
    }

    fn fail_decoder(&mut self) -> bool {
        let err = self
            .decoder
            .status()
            .err()
            .unwrap_or_else(|| RiffleError::Internal("Chunk decoder failed without a status".into()));
        self.recoverable = Recoverable::ChunkDecoder;
        self.fail(err)
    }

    pub fn supports_random_access(&self) -> bool {
        self.chunk_reader.supports_random_access()
    }

    /// Size of the file in bytes.
    pub fn size(&mut self) -> Result<Position> {
        self.state.status()?;
        self.chunk_reader.size()
    }

    /// Position of the next record, or of the next chunk when the current
    /// one is exhausted.
    pub fn pos(&self) -> RecordPosition {
        if self.decoder.index() < self.decoder.num_records() {
            return RecordPosition::new(self.chunk_begin, self.decoder.index());
        }
        RecordPosition::new(self.chunk_reader.pos(), 0)
    }

    /// Position of the last record read.
    pub fn last_pos(&self) -> Option<RecordPosition> {
        self.last_record
    }

    /// Closes the reader and an owned source. Fails if the file ends in
    /// the middle of a chunk.
    pub fn close(&mut self) -> bool {
        if !self.state.is_open() {
            return !self.state.failed();
        }
        self.decoder.close();
        if !self.chunk_reader.close() {
            let err = self
                .chunk_reader
                .status()
                .err()
                .unwrap_or(RiffleError::Closed);
            self.fail(err);
        }
        self.recoverable = Recoverable::No;
        debug!(pos = self.chunk_reader.pos(), "Record reader closed");
        self.state.mark_closed()
    }

    // =========================================================================
    // File Format
    // =========================================================================

    /// Verifies that the file starts with a file signature. Returns false
    /// with a healthy reader if the file is empty.
    pub fn check_file_format(&mut self) -> bool {
        if !self.state.healthy() {
            return false;
        }
        if self.decoder.index() < self.decoder.num_records() {
            return true;
        }
        if !self.chunk_reader.check_file_format() {
            self.decoder.clear();
            if !self.chunk_reader.healthy() {
                return self.fail_chunk_reader();
            }
            return false;
        }
        true
    }

    /// Reads the serialized metadata. Only valid at the beginning of the
    /// file; a file without a metadata chunk yields an empty chain.
    ///
    /// Returns `None` with a healthy reader if the file is empty.
    pub fn read_serialized_metadata(&mut self) -> Option<Chain> {
        if !self.state.healthy() {
            return None;
        }
        if self.chunk_reader.pos() != 0 {
            self.fail(RiffleError::FailedPrecondition(
                "Metadata can be read only at the beginning of the file".into(),
            ));
            return None;
        }
        self.chunk_begin = 0;
        self.decoder.clear();
        let Some(signature) = self.chunk_reader.read_chunk() else {
            if !self.chunk_reader.healthy() {
                self.fail_chunk_reader();
            }
            return None;
        };
        if signature.header.chunk_type() != ChunkType::FileSignature {
            self.fail(RiffleError::DataLoss(
                "Not a records file: missing file signature".into(),
            ));
            return None;
        }

        self.chunk_begin = self.chunk_reader.pos();
        let Some(header) = self.chunk_reader.pull_chunk_header() else {
            if !self.chunk_reader.healthy() {
                self.fail_chunk_reader();
                return None;
            }
            return Some(Chain::new());
        };
        if header.chunk_type() != ChunkType::FileMetadata {
            return Some(Chain::new());
        }
        let Some(chunk) = self.chunk_reader.read_chunk() else {
            if !self.chunk_reader.healthy() {
                self.fail_chunk_reader();
            }
            return None;
        };
        match decode_metadata_chunk(&chunk) {
            Ok(serialized) => Some(serialized),
            Err(err) => {
                self.recoverable = Recoverable::ChunkDecoder;
                self.fail(err);
                None
            }
        }
    }

    /// Reads and parses the metadata. See `read_serialized_metadata`.
    pub fn read_metadata(&mut self) -> Option<RecordsMetadata> {
        let serialized = self.read_serialized_metadata()?;
        if serialized.is_empty() {
            return Some(RecordsMetadata::default());
        }
        match parse_from_chain(&serialized) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                self.recoverable = Recoverable::ChunkDecoder;
                self.fail(RiffleError::DataLoss(format!(
                    "Failed to parse file metadata: {}",
                    err.message()
                )));
                None
            }
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Reads the next record into `record`, replacing its contents.
    ///
    /// Returns false at the end of the file (reader healthy) or after a
    /// failure that was not recovered.
    pub fn read_record(&mut self, record: &mut Vec<u8>) -> bool {
        self.read_next(|decoder| decoder.read_record(record).then_some(()))
            .is_some()
    }

    /// Reads the next record, sharing the decoded blocks.
    pub fn read_record_chain(&mut self, record: &mut Chain) -> bool {
        self.read_next(|decoder| decoder.read_record_chain(record).then_some(()))
            .is_some()
    }

    pub fn read_record_bytes(&mut self) -> Option<Bytes> {
        self.read_next(|decoder| decoder.read_record_bytes())
    }

    /// Reads and parses the next record. A record that fails to parse can
    /// be skipped by `recover`.
    pub fn read_message<T: DeserializeOwned>(&mut self) -> Option<T> {
        self.read_next(|decoder| decoder.read_message::<T>())
    }

    /// Tries the loaded chunk, loads chunks as they run out, and recovers
    /// through the callback. After a recovery the loop re-enters at the
    /// read from whatever chunk is now loaded.
    fn read_next<T>(&mut self, mut read: impl FnMut(&mut ChunkDecoder) -> Option<T>) -> Option<T> {
        loop {
            if self.state.healthy() {
                if let Some(value) = read(&mut self.decoder) {
                    self.last_record = Some(RecordPosition::new(self.chunk_begin, self.decoder.index() - 1));
                    return Some(value);
                }
                if !self.decoder.healthy() {
                    self.fail_decoder();
                } else if !self.read_chunk() && self.state.healthy() {
                    return None;
                }
                continue;
            }
            if !self.try_recovery() {
                return None;
            }
        }
    }

    /// Loads the next chunk into the decoder.
    fn read_chunk(&mut self) -> bool {
        self.chunk_begin = self.chunk_reader.pos();
        let Some(chunk) = self.chunk_reader.read_chunk() else {
            self.decoder.clear();
            if !self.chunk_reader.healthy() {
                return self.fail_chunk_reader();
            }
            return false;
        };
        if !self.decoder.decode(&chunk) {
            return self.fail_decoder();
        }
        true
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Skips the corrupted region behind the current failure and makes the
    /// reader healthy again.
    ///
    /// Returns `None` if the failure is not recoverable (or there is none).
    pub fn recover(&mut self) -> Option<SkippedRegion> {
        match std::mem::replace(&mut self.recoverable, Recoverable::No) {
            Recoverable::No => None,
            Recoverable::ChunkReader => {
                let failure = self.state.mark_not_failed();
                match self.chunk_reader.recover() {
                    Some(region) => {
                        self.chunk_begin = self.chunk_reader.pos();
                        self.decoder.clear();
                        Some(region)
                    }
                    None => {
                        let err = self
                            .chunk_reader
                            .status()
                            .err()
                            .or(failure)
                            .unwrap_or_else(|| RiffleError::Internal("Recovery failed".into()));
                        self.fail(err);
                        None
                    }
                }
            }
            Recoverable::ChunkDecoder => {
                let message = self
                    .state
                    .mark_not_failed()
                    .map(|err| err.message())
                    .unwrap_or_default();
                let index_before = self.decoder.index();
                let begin = if self.decoder.recover() {
                    // The unparsable record was already consumed.
                    self.chunk_begin + index_before.saturating_sub(1)
                } else {
                    self.decoder.clear();
                    self.chunk_begin + index_before
                };
                let region = SkippedRegion::new(begin, self.pos().numeric(), message);
                warn!(
                    begin = region.begin,
                    end = region.end,
                    reason = %region.message,
                    "Skipping corrupted records"
                );
                Some(region)
            }
        }
    }

    /// Recovers through the callback. A callback returning false keeps the
    /// failure.
    fn try_recovery(&mut self) -> bool {
        if self.recovery.is_none() || self.recoverable == Recoverable::No {
            return false;
        }
        let failure = self.state.failure().cloned();
        let Some(region) = self.recover() else {
            return false;
        };
        let proceed = match self.recovery.as_mut() {
            Some(recovery) => recovery(&region),
            None => false,
        };
        if !proceed {
            if let Some(err) = failure {
                self.fail(err);
            }
        }
        proceed
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Moves to the record at `new_pos`.
    ///
    /// Returns false with a healthy reader if `new_pos` is past the end of
    /// the file; the reader is then at the end.
    pub fn seek(&mut self, new_pos: RecordPosition) -> bool {
        if !self.state.healthy() {
            return false;
        }
        self.last_record = None;
        if new_pos.chunk_begin() == self.chunk_begin {
            if new_pos.record_index() == 0 || self.chunk_reader.pos() > self.chunk_begin {
                self.decoder.set_index(new_pos.record_index());
                return true;
            }
        } else {
            if !self.chunk_reader.seek(new_pos.chunk_begin()) {
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                if !self.chunk_reader.healthy() {
                    self.fail_chunk_reader();
                    return self.try_recovery();
                }
                return false;
            }
            if new_pos.record_index() == 0 {
                // The chunk is not decoded: it may be the end of the file.
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                return true;
            }
        }
        if !self.read_chunk() {
            return self.try_recovery();
        }
        self.decoder.set_index(new_pos.record_index());
        true
    }

    /// Moves to the record whose numeric position is `new_pos`, or to the
    /// first record after it.
    pub fn seek_numeric(&mut self, new_pos: Position) -> bool {
        if !self.state.healthy() {
            return false;
        }
        self.last_record = None;
        if new_pos < self.chunk_begin || new_pos > self.chunk_reader.pos() {
            if !self.chunk_reader.seek_to_chunk_containing(new_pos) {
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                if !self.chunk_reader.healthy() {
                    self.fail_chunk_reader();
                    return self.try_recovery();
                }
                return false;
            }
            if self.chunk_reader.pos() >= new_pos {
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                return true;
            }
            if !self.read_chunk() {
                return self.try_recovery();
            }
        }
        self.decoder.set_index(new_pos - self.chunk_begin);
        true
    }
}

fn decode_metadata_chunk(chunk: &Chunk) -> Result<Chain> {
    if chunk.header.num_records() != 0 {
        return Err(RiffleError::DataLoss(format!(
            "Invalid file metadata chunk: number of records is not zero: {}",
            chunk.header.num_records()
        )));
    }
    let decoder = SimpleDecoder::decode(&chunk.data, 1, chunk.header.decoded_data_size())?;
    let (serialized, _) = decoder.into_parts();
    Ok(serialized)
}
