//! FdWriter
//!
//! Writes a `std::fs::File` through `BufferedWriter`. Flush levels map to
//! the file API: `FromProcess` flushes the handle, `FromMachine` also syncs
//! file data to the device.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::base::{Dependency, Position};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};

use super::buffered_writer::{BufferedWriter, WriteSink};
use super::writer::FlushType;

/// `Writer` into a file
pub type FdWriter<'a> = BufferedWriter<FileSink<'a>>;

/// `WriteSink` backed by a file handle
#[derive(Debug)]
pub struct FileSink<'a> {
    file: Dependency<'a, File>,
    random_access: bool,
}

impl<'a> FileSink<'a> {
    pub fn new(file: Dependency<'a, File>, random_access: bool) -> Self {
        let random_access = random_access
            && file
                .metadata()
                .map(|metadata| metadata.is_file())
                .unwrap_or(false);
        Self {
            file,
            random_access,
        }
    }

    pub fn file(&self) -> &File {
        self.file.get()
    }
}

impl WriteSink for FileSink<'_> {
    fn write_internal(&mut self, src: &[u8]) -> Result<()> {
        self.file.write_all(src)?;
        Ok(())
    }

    fn flush_internal(&mut self, flush_type: FlushType) -> Result<()> {
        match flush_type {
            FlushType::FromObject => Ok(()),
            FlushType::FromProcess => Ok(self.file.flush()?),
            FlushType::FromMachine => {
                self.file.flush()?;
                Ok(self.file.sync_data()?)
            }
        }
    }

    fn supports_random_access(&self) -> bool {
        self.random_access
    }

    fn supports_truncate(&self) -> bool {
        self.random_access
    }

    fn seek_internal(&mut self, new_pos: Position) -> Result<Position> {
        let size = self.file.metadata()?.len();
        let target = new_pos.min(size);
        self.file.seek(SeekFrom::Start(target))?;
        Ok(target)
    }

    fn size_internal(&mut self) -> Result<Position> {
        if !self.random_access {
            return Err(RiffleError::Unimplemented(
                "FdWriter::size() not supported for this file".into(),
            ));
        }
        Ok(self.file.metadata()?.len())
    }

    fn truncate_internal(&mut self, new_size: Position) -> Result<()> {
        self.file.set_len(new_size)?;
        self.file.seek(SeekFrom::Start(new_size))?;
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.file.is_owning() {
            debug!("Closing owned file");
        }
        Ok(())
    }
}

impl<'a> BufferedWriter<FileSink<'a>> {
    /// Writes to `file` at its current offset.
    pub fn new(file: Dependency<'a, File>, options: BufferOptions) -> Result<Self> {
        let mut sink = FileSink::new(file, true);
        let start_pos = if sink.random_access {
            sink.file.stream_position()?
        } else {
            0
        };
        Ok(Self::from_sink_at(sink, options, start_pos))
    }

    pub fn borrowed(file: &'a mut File, options: BufferOptions) -> Result<Self> {
        Self::new(Dependency::borrowed(file), options)
    }
}

impl BufferedWriter<FileSink<'static>> {
    /// Creates or truncates the file at `path`.
    pub fn create(path: impl AsRef<Path>, options: BufferOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        debug!(path = %path.display(), "Created file for writing");
        Self::new(Dependency::owned(file), options)
    }

    /// Opens the file at `path` for appending. Positions continue from the
    /// current file size; seeking is not supported.
    pub fn append(path: impl AsRef<Path>, options: BufferOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let start_pos = file.metadata()?.len();
        debug!(path = %path.display(), start_pos, "Opened file for appending");
        let sink = FileSink::new(Dependency::owned(file), false);
        Ok(Self::from_sink_at(sink, options, start_pos))
    }
}
