//! ZlibWriter
//!
//! Deflates buffered data into another writer. Compressed output is written
//! directly into the wrapped writer's spare space.

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::base::{Dependency, Recycled, RecyclingPool};
use crate::config::{BufferOptions, ZlibHeader};
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedWriter, FlushType, WriteSink, Writer};

use super::{close_dest, dest_failure};

/// Idle deflaters, keyed by `(level, zlib_header)`.
static COMPRESSORS: RecyclingPool<Compress, (u32, bool)> = RecyclingPool::new(16);

/// Size requested from the wrapped writer for each burst of output.
const OUTPUT_CHUNK: usize = 32 * 1024;

pub const DEFAULT_ZLIB_LEVEL: u32 = 6;

/// `Writer` that compresses into another writer with zlib
pub type ZlibWriter<'a, W> = BufferedWriter<ZlibSink<'a, W>>;

#[derive(Debug)]
pub struct ZlibSink<'a, W: Writer> {
    dest: Dependency<'a, W>,
    engine: Option<Recycled<Compress, (u32, bool)>>,
}

impl<W: Writer> ZlibSink<'_, W> {
    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    /// Runs the deflater over `src` with `flush` until it is satisfied.
    fn deflate(&mut self, src: &[u8], flush: FlushCompress) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(RiffleError::FailedPrecondition("ZlibWriter already finished".into()));
        };
        let mut src = src;
        loop {
            if !self.dest.push(1, OUTPUT_CHUNK) {
                return Err(dest_failure(self.dest.status()));
            }
            let in_before = engine.total_in();
            let out_before = engine.total_out();
            let spare = self.dest.spare_mut();
            let spare_len = spare.len();
            let status = engine
                .compress(src, spare, flush)
                .map_err(|err| RiffleError::Internal(format!("deflate() failed: {err}")))?;
            let consumed = (engine.total_in() - in_before) as usize;
            let produced = (engine.total_out() - out_before) as usize;
            self.dest.move_cursor(produced);
            src = &src[consumed..];
            let done = match flush {
                FlushCompress::Finish => status == Status::StreamEnd,
                // Output space left over means the flush completed.
                _ => src.is_empty() && produced < spare_len,
            };
            if done {
                return Ok(());
            }
        }
    }
}

impl<W: Writer> WriteSink for ZlibSink<'_, W> {
    fn write_internal(&mut self, src: &[u8]) -> Result<()> {
        self.deflate(src, FlushCompress::None)
    }

    fn flush_internal(&mut self, flush_type: FlushType) -> Result<()> {
        self.deflate(&[], FlushCompress::Sync)?;
        if !self.dest.flush(flush_type) {
            return Err(dest_failure(self.dest.status()));
        }
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        if self.engine.is_some() {
            self.deflate(&[], FlushCompress::Finish)?;
            self.engine = None;
        }
        close_dest(&mut self.dest)
    }
}

impl<'a, W: Writer> BufferedWriter<ZlibSink<'a, W>> {
    /// `level` ranges from 0 (store) to 9 (best).
    pub fn new(dest: Dependency<'a, W>, level: u32, header: ZlibHeader, options: BufferOptions) -> Self {
        let level = level.min(9);
        let zlib_header = header.has_zlib_header();
        let engine = COMPRESSORS.get(
            (level, zlib_header),
            || Ok(Compress::new(Compression::new(level), zlib_header)),
            |engine| {
                engine.reset();
                Ok(())
            },
        );
        let (engine, failure) = match engine {
            Ok(engine) => (Some(engine), dest.status().err()),
            Err(err) => (None, Some(err)),
        };
        let mut writer = Self::from_sink(ZlibSink { dest, engine }, options);
        if let Some(err) = failure {
            writer.base_mut().fail(err);
        }
        writer
    }

    pub fn borrowed(dest: &'a mut W, level: u32, header: ZlibHeader, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(dest), level, header, options)
    }
}
