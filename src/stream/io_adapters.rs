//! Host stream adapters
//!
//! `IoReader` and `IoWriter` drive any `std::io::Read` / `std::io::Write`
//! through the buffered reader and writer. The host streams are treated as
//! sequential; use `FdReader`/`FdWriter` for random access to files.
//!
//! Errors the host reports without a usable cause (kind `Other` and no OS
//! error code) surface as `RiffleError::Unknown`.

use std::io::{ErrorKind, Read, Write};

use crate::config::BufferOptions;
use crate::error::Result;

use super::buffered_reader::{BufferedReader, ReadSource};
use super::buffered_writer::{BufferedWriter, WriteSink};
use super::writer::FlushType;

/// `Reader` over a `std::io::Read`
pub type IoReader<R> = BufferedReader<IoSource<R>>;

/// `Writer` over a `std::io::Write`
pub type IoWriter<W> = BufferedWriter<IoSink<W>>;

// =============================================================================
// Source
// =============================================================================

#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    exhausted: bool,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ReadSource for IoSource<R> {
    fn read_internal(&mut self, dest: &mut [u8], min_length: usize) -> Result<usize> {
        let mut total = 0;
        while total < min_length {
            match self.inner.read(&mut dest[total..]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(read) => total += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(total)
    }

    fn exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<R: Read> BufferedReader<IoSource<R>> {
    pub fn new(inner: R, options: BufferOptions) -> Self {
        Self::from_source(IoSource::new(inner), options)
    }
}

// =============================================================================
// Sink
// =============================================================================

#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> WriteSink for IoSink<W> {
    fn write_internal(&mut self, src: &[u8]) -> Result<()> {
        self.inner.write_all(src)?;
        Ok(())
    }

    fn flush_internal(&mut self, flush_type: FlushType) -> Result<()> {
        match flush_type {
            FlushType::FromObject => Ok(()),
            FlushType::FromProcess | FlushType::FromMachine => Ok(self.inner.flush()?),
        }
    }

    fn done(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }
}

impl<W: Write> BufferedWriter<IoSink<W>> {
    pub fn new(inner: W, options: BufferOptions) -> Self {
        Self::from_sink(IoSink::new(inner), options)
    }
}
