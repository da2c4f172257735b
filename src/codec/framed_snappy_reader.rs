//! FramedSnappyReader
//!
//! Decodes the framed Snappy format frame by frame. Each decoded frame
//! becomes the reader's window; uncompressed frames are shared from the
//! source buffer without copying.
//!
//! ## Frame
//! ```text
//!   ┌──────────────┬──────────────────┬──────────────────────────┐
//!   │ type (1 B)   │ length (3 B, LE) │ payload (length bytes)   │
//!   └──────────────┴──────────────────┴──────────────────────────┘
//!   data frames:  payload = masked crc32c (4 B, LE) + data
//! ```

use bytes::Bytes;
use tracing::warn;

use crate::base::{Dependency, Position};
use crate::error::RiffleError;
use crate::stream::{discard_scratch, pull_using_scratch, PullableReader, Reader, ReaderBase, Scratch};

use super::{masked_crc32c, FRAMED_SNAPPY_BLOCK_SIZE, FRAMED_SNAPPY_STREAM_ID};

const FRAME_HEADER_SIZE: usize = 4;
const CHECKSUM_SIZE: usize = 4;

/// `Reader` that decodes framed Snappy data from another reader
pub struct FramedSnappyReader<'a, R: Reader> {
    base: ReaderBase,
    scratch: Scratch,
    src: Dependency<'a, R>,
    decoder: snap::raw::Decoder,
    seen_stream_id: bool,
    truncated: bool,
}

impl<R: Reader + std::fmt::Debug> std::fmt::Debug for FramedSnappyReader<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedSnappyReader")
            .field("base", &self.base)
            .field("src", &self.src)
            .field("seen_stream_id", &self.seen_stream_id)
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl<'a, R: Reader> FramedSnappyReader<'a, R> {
    pub fn new(src: Dependency<'a, R>) -> Self {
        let mut reader = Self {
            base: ReaderBase::new(),
            scratch: Scratch::default(),
            src,
            decoder: snap::raw::Decoder::new(),
            seen_stream_id: false,
            truncated: false,
        };
        if let Err(err) = reader.src.status() {
            reader.base.fail(err);
        }
        reader
    }

    pub fn borrowed(src: &'a mut R) -> Self {
        Self::new(Dependency::borrowed(src))
    }

    pub fn src(&self) -> &R {
        self.src.get()
    }

    fn fail_data_loss(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        warn!(pos = self.base.limit_pos(), "framed snappy stream is corrupt: {message}");
        self.base.fail(RiffleError::DataLoss(message))
    }

    /// Handles a source that ended before a whole frame was available.
    fn source_ended(&mut self) -> bool {
        if let Err(err) = self.src.status() {
            return self.base.fail(err);
        }
        if self.src.available() > 0 {
            self.truncated = true;
        }
        false
    }

    /// Exposes `data` as the next window, skipping empty frames.
    fn expose(&mut self, data: Bytes) -> Option<bool> {
        if data.is_empty() {
            return None;
        }
        let pos = self.base.limit_pos();
        if pos.checked_add(data.len() as Position).is_none() {
            return Some(self.base.fail_overflow());
        }
        self.base.set_buffer(data, pos);
        Some(true)
    }
}

impl<R: Reader> Reader for FramedSnappyReader<'_, R> {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        pull_using_scratch(self, min_length, recommended_length)
    }

    fn done(&mut self) {
        discard_scratch(self);
        if std::mem::take(&mut self.truncated) {
            self.base.fail(RiffleError::DataLoss(
                "Truncated FramedSnappy-compressed stream".into(),
            ));
        }
        if self.src.is_owning() && !self.src.close() {
            if let Err(err) = self.src.status() {
                self.base.fail(err);
            }
        }
    }
}

impl<R: Reader> PullableReader for FramedSnappyReader<'_, R> {
    fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    fn scratch_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }

    fn pull_behind_scratch(&mut self) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        loop {
            self.truncated = false;
            if !self.src.pull(FRAME_HEADER_SIZE, 0) {
                return self.source_ended();
            }
            let chunk = self.src.chunk();
            let header = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let frame_type = (header & 0xff) as u8;
            let payload_len = (header >> 8) as usize;
            if !self.src.pull(FRAME_HEADER_SIZE + payload_len, 0) {
                return self.source_ended();
            }
            let payload = &self.src.chunk()[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + payload_len];

            match frame_type {
                0xff => {
                    if payload != &FRAMED_SNAPPY_STREAM_ID[FRAME_HEADER_SIZE..] {
                        return self.fail_data_loss("Invalid stream identifier");
                    }
                    self.seen_stream_id = true;
                    self.src.move_cursor(FRAME_HEADER_SIZE + payload_len);
                }
                0x00 | 0x01 => {
                    if !self.seen_stream_id {
                        return self.fail_data_loss("Missing stream identifier");
                    }
                    if payload_len < CHECKSUM_SIZE {
                        return self.fail_data_loss("Frame too short for a checksum");
                    }
                    let expected = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    let data_len = payload_len - CHECKSUM_SIZE;
                    let data = if frame_type == 0x00 {
                        let compressed = &payload[CHECKSUM_SIZE..];
                        match snap::raw::decompress_len(compressed) {
                            Ok(len) if len <= FRAMED_SNAPPY_BLOCK_SIZE => {}
                            Ok(len) => {
                                return self.fail_data_loss(format!(
                                    "Uncompressed frame too large: {len} bytes"
                                ));
                            }
                            Err(err) => {
                                return self.fail_data_loss(format!("Invalid snappy frame: {err}"));
                            }
                        }
                        match self.decoder.decompress_vec(compressed) {
                            Ok(decoded) => Bytes::from(decoded),
                            Err(err) => {
                                return self.fail_data_loss(format!("Invalid snappy frame: {err}"));
                            }
                        }
                    } else {
                        if data_len > FRAMED_SNAPPY_BLOCK_SIZE {
                            return self.fail_data_loss(format!(
                                "Uncompressed frame too large: {data_len} bytes"
                            ));
                        }
                        self.src.move_cursor(FRAME_HEADER_SIZE + CHECKSUM_SIZE);
                        let data = self.src.base_mut().take_chunk(data_len);
                        if masked_crc32c(&data) != expected {
                            return self.fail_data_loss("Frame checksum mismatch");
                        }
                        match self.expose(data) {
                            Some(result) => return result,
                            None => continue,
                        }
                    };
                    if masked_crc32c(&data) != expected {
                        return self.fail_data_loss("Frame checksum mismatch");
                    }
                    self.src.move_cursor(FRAME_HEADER_SIZE + payload_len);
                    if let Some(result) = self.expose(data) {
                        return result;
                    }
                }
                0x02..=0x7f => {
                    return self.fail_data_loss(format!(
                        "Unskippable frame type 0x{frame_type:02x}"
                    ));
                }
                // Padding and reserved skippable frames.
                _ => self.src.move_cursor(FRAME_HEADER_SIZE + payload_len),
            }
        }
    }
}
