//! ZstdReader
//!
//! Decompresses a Zstandard frame read from another reader. Output already
//! produced by the engine is returned before more input is requested, so
//! data flushed by the writer becomes readable without waiting for the
//! rest of the stream.

use zstd::stream::raw::{DParameter, Decoder, InBuffer, Operation, OutBuffer};

use crate::base::{Dependency, Recycled, RecyclingPool};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedReader, ReadSource, Reader};

use super::close_src;

static DECOMPRESSORS: RecyclingPool<Decoder<'static>> = RecyclingPool::new(16);

/// Largest window accepted from the compressed stream.
const WINDOW_LOG_MAX: u32 = if cfg!(target_pointer_width = "32") { 30 } else { 31 };

/// `Reader` that decompresses Zstandard data from another reader
pub type ZstdReader<'a, R> = BufferedReader<ZstdSource<'a, R>>;

pub struct ZstdSource<'a, R: Reader> {
    src: Dependency<'a, R>,
    engine: Option<Recycled<Decoder<'static>>>,
    truncated: bool,
}

impl<R: Reader + std::fmt::Debug> std::fmt::Debug for ZstdSource<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdSource")
            .field("src", &self.src)
            .field("finished", &self.engine.is_none())
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl<R: Reader> ZstdSource<'_, R> {
    pub fn src(&self) -> &R {
        self.src.get()
    }
}

fn new_decoder() -> Result<Decoder<'static>> {
    let mut decoder = Decoder::new()?;
    decoder.set_parameter(DParameter::WindowLogMax(WINDOW_LOG_MAX))?;
    Ok(decoder)
}

impl<R: Reader> ReadSource for ZstdSource<'_, R> {
    fn read_internal(&mut self, dest: &mut [u8], min_length: usize) -> Result<usize> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(0);
        };
        self.truncated = false;
        let mut output = OutBuffer::around(dest);
        loop {
            let mut input = InBuffer::around(self.src.chunk());
            let result = engine.run(&mut input, &mut output);
            let consumed = input.pos();
            self.src.move_cursor(consumed);
            let hint = result.map_err(|err| {
                RiffleError::DataLoss(format!("ZSTD_decompressStream() failed: {err}"))
            })?;
            if hint == 0 {
                // Frame complete.
                self.engine = None;
                return Ok(output.pos());
            }
            if output.pos() >= min_length {
                return Ok(output.pos());
            }
            if self.src.available() == 0 && !self.src.pull(1, 0) {
                self.src.status()?;
                self.truncated = true;
                return Ok(output.pos());
            }
        }
    }

    fn exhausted(&self) -> bool {
        self.engine.is_none()
    }

    fn done(&mut self) -> Result<()> {
        self.engine = None;
        let truncated = std::mem::take(&mut self.truncated);
        close_src(&mut self.src)?;
        if truncated {
            return Err(RiffleError::DataLoss(
                "Truncated Zstd-compressed stream".into(),
            ));
        }
        Ok(())
    }
}

impl<'a, R: Reader> BufferedReader<ZstdSource<'a, R>> {
    pub fn new(src: Dependency<'a, R>, options: BufferOptions) -> Self {
        let engine = DECOMPRESSORS.get((), new_decoder, |engine| Ok(engine.reinit()?));
        let (engine, failure) = match engine {
            Ok(engine) => (Some(engine), src.status().err()),
            Err(err) => (None, Some(RiffleError::Internal(format!("ZSTD_createDCtx() failed: {err}")))),
        };
        let mut reader = Self::from_source(
            ZstdSource {
                src,
                engine,
                truncated: false,
            },
            options,
        );
        if let Some(err) = failure {
            reader.base_mut().fail(err);
        }
        reader
    }

    pub fn borrowed(src: &'a mut R, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(src), options)
    }
}
