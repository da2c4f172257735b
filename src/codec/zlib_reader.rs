//! ZlibReader
//!
//! Inflates a zlib or raw deflate stream read from another reader. Input is
//! consumed straight from the wrapped reader's window, so only the bytes
//! belonging to the compressed stream are taken from it.

use flate2::{Decompress, FlushDecompress, Status};
use tracing::debug;

use crate::base::{Dependency, Recycled, RecyclingPool};
use crate::config::{BufferOptions, ZlibHeader};
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedReader, ReadSource, Reader};

use super::close_src;

/// Idle inflaters, keyed by whether they expect a zlib header.
static DECOMPRESSORS: RecyclingPool<Decompress, bool> = RecyclingPool::new(16);

/// `Reader` that decompresses zlib data from another reader
pub type ZlibReader<'a, R> = BufferedReader<ZlibSource<'a, R>>;

/// `ReadSource` that inflates the wrapped reader's data
#[derive(Debug)]
pub struct ZlibSource<'a, R: Reader> {
    src: Dependency<'a, R>,
    engine: Option<Recycled<Decompress, bool>>,
    truncated: bool,
}

impl<R: Reader> ZlibSource<'_, R> {
    pub fn src(&self) -> &R {
        self.src.get()
    }
}

impl<R: Reader> ReadSource for ZlibSource<'_, R> {
    fn read_internal(&mut self, dest: &mut [u8], min_length: usize) -> Result<usize> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(0);
        };
        self.truncated = false;
        let mut produced = 0;
        loop {
            let in_before = engine.total_in();
            let out_before = engine.total_out();
            let status = engine
                .decompress(self.src.chunk(), &mut dest[produced..], FlushDecompress::None)
                .map_err(|err| RiffleError::DataLoss(format!("inflate() failed: {err}")))?;
            let consumed = (engine.total_in() - in_before) as usize;
            self.src.move_cursor(consumed);
            produced += (engine.total_out() - out_before) as usize;
            if status == Status::StreamEnd {
                // Return the engine to the pool; further reads report no data.
                self.engine = None;
                return Ok(produced);
            }
            if produced >= min_length {
                return Ok(produced);
            }
            if self.src.available() == 0 && !self.src.pull(1, 0) {
                self.src.status()?;
                self.truncated = true;
                return Ok(produced);
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
                "Truncated zlib-compressed stream".into(),
            ));
        }
        Ok(())
    }
}

impl<'a, R: Reader> BufferedReader<ZlibSource<'a, R>> {
    pub fn new(src: Dependency<'a, R>, header: ZlibHeader, options: BufferOptions) -> Self {
        let zlib_header = header.has_zlib_header();
        let engine = DECOMPRESSORS.get(
            zlib_header,
            || Ok(Decompress::new(zlib_header)),
            |engine| {
                engine.reset(zlib_header);
                Ok(())
            },
        );
        let (engine, failure) = match engine {
            Ok(engine) => (Some(engine), src.status().err()),
            Err(err) => (None, Some(err)),
        };
        let mut reader = Self::from_source(
            ZlibSource {
                src,
                engine,
                truncated: false,
            },
            options,
        );
        if let Some(err) = failure {
            debug!(error = %err, "ZlibReader created over a failed source");
            reader.base_mut().fail(err);
        }
        reader
    }

    pub fn borrowed(src: &'a mut R, header: ZlibHeader, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(src), header, options)
    }
}
