//! FramedSnappyWriter
//!
//! Compresses buffered data into the framed Snappy format. Data is cut into
//! blocks of at most 64 KiB; a block is stored raw when Snappy does not
//! shrink it. A stream identifier is written first when the wrapped writer
//! is at position 0.

use crate::base::Dependency;
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedWriter, FlushType, WriteSink, Writer};

use super::{close_dest, dest_failure, masked_crc32c, FRAMED_SNAPPY_BLOCK_SIZE, FRAMED_SNAPPY_STREAM_ID};

const FRAME_PREFIX_SIZE: usize = 8;

/// `Writer` that compresses into another writer with framed Snappy
pub type FramedSnappyWriter<'a, W> = BufferedWriter<FramedSnappySink<'a, W>>;

pub struct FramedSnappySink<'a, W: Writer> {
    dest: Dependency<'a, W>,
    encoder: snap::raw::Encoder,
}

impl<W: Writer + std::fmt::Debug> std::fmt::Debug for FramedSnappySink<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedSnappySink").field("dest", &self.dest).finish()
    }
}

impl<W: Writer> FramedSnappySink<'_, W> {
    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    fn write_frame(&mut self, block: &[u8]) -> Result<()> {
        let max_len = FRAME_PREFIX_SIZE + snap::raw::max_compress_len(block.len());
        if !self.dest.push(max_len, 0) {
            return Err(dest_failure(self.dest.status()));
        }
        let spare = &mut self.dest.spare_mut()[..max_len];
        let compressed_len = self
            .encoder
            .compress(block, &mut spare[FRAME_PREFIX_SIZE..])
            .map_err(|err| RiffleError::Internal(format!("snappy compression failed: {err}")))?;
        let (frame_type, payload_len) = if compressed_len < block.len() {
            (0x00u32, compressed_len)
        } else {
            spare[FRAME_PREFIX_SIZE..FRAME_PREFIX_SIZE + block.len()].copy_from_slice(block);
            (0x01u32, block.len())
        };
        let header = frame_type | (((4 + payload_len) as u32) << 8);
        spare[..4].copy_from_slice(&header.to_le_bytes());
        spare[4..8].copy_from_slice(&masked_crc32c(block).to_le_bytes());
        self.dest.move_cursor(FRAME_PREFIX_SIZE + payload_len);
        Ok(())
    }
}

impl<W: Writer> WriteSink for FramedSnappySink<'_, W> {
    fn write_internal(&mut self, src: &[u8]) -> Result<()> {
        for block in src.chunks(FRAMED_SNAPPY_BLOCK_SIZE) {
            self.write_frame(block)?;
        }
        Ok(())
    }

    fn flush_internal(&mut self, flush_type: FlushType) -> Result<()> {
        if !self.dest.flush(flush_type) {
            return Err(dest_failure(self.dest.status()));
        }
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        close_dest(&mut self.dest)
    }
}

impl<'a, W: Writer> BufferedWriter<FramedSnappySink<'a, W>> {
    pub fn new(dest: Dependency<'a, W>, options: BufferOptions) -> Self {
        let mut dest = dest;
        let failure = if dest.pos() == 0 && !dest.write(&FRAMED_SNAPPY_STREAM_ID) {
            Some(dest_failure(dest.status()))
        } else {
            dest.status().err()
        };
        let sink = FramedSnappySink {
            dest,
            encoder: snap::raw::Encoder::new(),
        };
        // Frames hold at most one block, so buffering more only delays output.
        let options = options.with_buffer_size(options.buffer_size.min(FRAMED_SNAPPY_BLOCK_SIZE));
        let mut writer = Self::from_sink(sink, options);
        if let Some(err) = failure {
            writer.base_mut().fail(err);
        }
        writer
    }

    pub fn borrowed(dest: &'a mut W, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(dest), options)
    }
}
