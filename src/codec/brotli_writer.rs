//! BrotliWriter
//!
//! Compresses buffered data with Brotli into another writer. The encoder
//! writes through a `WriterIo` bridge, so its output lands in the wrapped
//! writer's buffer.

use std::io::Write;

use brotli::CompressorWriter;

use crate::base::Dependency;
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedWriter, FlushType, WriteSink, Writer, WriterIo};

use super::{close_dest, dest_failure};

pub const DEFAULT_BROTLI_LEVEL: u32 = 6;
pub const DEFAULT_BROTLI_WINDOW_LOG: u32 = 22;

/// Internal staging buffer of the encoder.
const ENCODER_BUFFER_SIZE: usize = 64 * 1024;

/// `Writer` that compresses into another writer with Brotli
pub type BrotliWriter<'a, W> = BufferedWriter<BrotliSink<'a, W>>;

pub struct BrotliSink<'a, W: Writer> {
    encoder: Option<CompressorWriter<WriterIo<'a, W>>>,
}

impl<W: Writer> std::fmt::Debug for BrotliSink<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrotliSink")
            .field("finished", &self.encoder.is_none())
            .finish()
    }
}

impl<'a, W: Writer> BrotliSink<'a, W> {
    fn encoder(&mut self) -> Result<&mut CompressorWriter<WriterIo<'a, W>>> {
        self.encoder
            .as_mut()
            .ok_or_else(|| RiffleError::FailedPrecondition("BrotliWriter already finished".into()))
    }

    /// The wrapped writer, until the stream is finished.
    pub fn dest(&self) -> Option<&W> {
        self.encoder.as_ref().map(|encoder| encoder.get_ref().get())
    }
}

impl<W: Writer> WriteSink for BrotliSink<'_, W> {
    fn write_internal(&mut self, src: &[u8]) -> Result<()> {
        self.encoder()?.write_all(src)?;
        Ok(())
    }

    fn flush_internal(&mut self, flush_type: FlushType) -> Result<()> {
        let encoder = self.encoder()?;
        encoder.flush()?;
        if flush_type != FlushType::FromObject {
            let dest = encoder.get_mut().get_mut();
            if !dest.flush(flush_type) {
                return Err(dest_failure(dest.status()));
            }
        }
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let mut dest = encoder.into_inner().into_inner();
        dest.status()?;
        close_dest(&mut dest)
    }
}

impl<'a, W: Writer> BufferedWriter<BrotliSink<'a, W>> {
    /// `level` ranges from 0 to 11; `window_log` from 10 to 24.
    pub fn new(dest: Dependency<'a, W>, level: u32, window_log: u32, options: BufferOptions) -> Self {
        let failure = dest.status().err();
        let encoder = CompressorWriter::new(
            WriterIo::new(dest),
            ENCODER_BUFFER_SIZE,
            level.min(11),
            window_log.clamp(10, 24),
        );
        let mut writer = Self::from_sink(
            BrotliSink {
                encoder: Some(encoder),
            },
            options,
        );
        if let Some(err) = failure {
            writer.base_mut().fail(err);
        }
        writer
    }

    pub fn borrowed(dest: &'a mut W, level: u32, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(dest), level, DEFAULT_BROTLI_WINDOW_LOG, options)
    }
}
