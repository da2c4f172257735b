//! ZstdWriter
//!
//! Compresses buffered data into a single Zstandard frame written to
//! another writer. Flushing ends the current block so everything written
//! so far can be decompressed.

use zstd::stream::raw::{CParameter, Encoder, InBuffer, Operation, OutBuffer};

use crate::base::{Dependency, Recycled, RecyclingPool};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedWriter, FlushType, WriteSink, Writer};

use super::{close_dest, dest_failure};

/// Idle compressors, keyed by `(level, window_log)`.
static COMPRESSORS: RecyclingPool<Encoder<'static>, (i32, Option<u32>)> = RecyclingPool::new(16);

const OUTPUT_CHUNK: usize = 128 * 1024;

pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// `Writer` that compresses into another writer with Zstandard
pub type ZstdWriter<'a, W> = BufferedWriter<ZstdSink<'a, W>>;

pub struct ZstdSink<'a, W: Writer> {
    dest: Dependency<'a, W>,
    engine: Option<Recycled<Encoder<'static>, (i32, Option<u32>)>>,
}

impl<W: Writer + std::fmt::Debug> std::fmt::Debug for ZstdSink<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdSink")
            .field("dest", &self.dest)
            .field("engine", &self.engine)
            .finish()
    }
}

impl<W: Writer> ZstdSink<'_, W> {
    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    fn engine(&mut self) -> Result<&mut Encoder<'static>> {
        match self.engine.as_mut() {
            Some(engine) => Ok(engine),
            None => Err(RiffleError::FailedPrecondition("ZstdWriter already finished".into())),
        }
    }

    fn reserve_output(&mut self) -> Result<()> {
        if !self.dest.push(1, OUTPUT_CHUNK) {
            return Err(dest_failure(self.dest.status()));
        }
        Ok(())
    }
}

fn new_encoder(level: i32, window_log: Option<u32>) -> Result<Encoder<'static>> {
    let mut encoder = Encoder::new(level)?;
    if let Some(window_log) = window_log {
        encoder.set_parameter(CParameter::WindowLog(window_log))?;
    }
    Ok(encoder)
}

impl<W: Writer> WriteSink for ZstdSink<'_, W> {
    fn write_internal(&mut self, src: &[u8]) -> Result<()> {
        let mut input = InBuffer::around(src);
        while input.pos() < src.len() {
            self.reserve_output()?;
            let Some(engine) = self.engine.as_mut() else {
                return Err(RiffleError::FailedPrecondition("ZstdWriter already finished".into()));
            };
            let mut output = OutBuffer::around(self.dest.spare_mut());
            engine
                .run(&mut input, &mut output)
                .map_err(|err| RiffleError::Internal(format!("ZSTD_compressStream() failed: {err}")))?;
            let produced = output.pos();
            self.dest.move_cursor(produced);
        }
        Ok(())
    }

    fn flush_internal(&mut self, flush_type: FlushType) -> Result<()> {
        self.engine()?;
        loop {
            self.reserve_output()?;
            let Some(engine) = self.engine.as_mut() else {
                break;
            };
            let mut output = OutBuffer::around(self.dest.spare_mut());
            let remaining = engine
                .flush(&mut output)
                .map_err(|err| RiffleError::Internal(format!("ZSTD_flushStream() failed: {err}")))?;
            let produced = output.pos();
            self.dest.move_cursor(produced);
            if remaining == 0 {
                break;
            }
        }
        if !self.dest.flush(flush_type) {
            return Err(dest_failure(self.dest.status()));
        }
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        if self.engine.is_some() {
            loop {
                self.reserve_output()?;
                let Some(engine) = self.engine.as_mut() else {
                    break;
                };
                let mut output = OutBuffer::around(self.dest.spare_mut());
                let remaining = engine
                    .finish(&mut output, true)
                    .map_err(|err| RiffleError::Internal(format!("ZSTD_endStream() failed: {err}")))?;
                let produced = output.pos();
                self.dest.move_cursor(produced);
                if remaining == 0 {
                    break;
                }
            }
            self.engine = None;
        }
        close_dest(&mut self.dest)
    }
}

impl<'a, W: Writer> BufferedWriter<ZstdSink<'a, W>> {
    /// `level` follows zstd conventions (1..=22, negative for fast modes).
    pub fn new(dest: Dependency<'a, W>, level: i32, window_log: Option<u32>, options: BufferOptions) -> Self {
        let engine = COMPRESSORS.get(
            (level, window_log),
            || new_encoder(level, window_log),
            |engine| Ok(engine.reinit()?),
        );
        let (engine, failure) = match engine {
            Ok(engine) => (Some(engine), dest.status().err()),
            Err(err) => (None, Some(RiffleError::Internal(format!("ZSTD_createCCtx() failed: {err}")))),
        };
        let mut writer = Self::from_sink(ZstdSink { dest, engine }, options);
        if let Some(err) = failure {
            writer.base_mut().fail(err);
        }
        writer
    }

    pub fn borrowed(dest: &'a mut W, level: i32, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(dest), level, None, options)
    }
}
