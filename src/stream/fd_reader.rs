//! FdReader
//!
//! Reads a `std::fs::File` through `BufferedReader`. Regular files support
//! random access and `size()`; pipes and other special files read
//! sequentially.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::base::{Dependency, Position};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};

use super::buffered_reader::{BufferedReader, ReadSource};

/// `Reader` over a file
pub type FdReader<'a> = BufferedReader<FileSource<'a>>;

/// `ReadSource` backed by a file handle
#[derive(Debug)]
pub struct FileSource<'a> {
    file: Dependency<'a, File>,
    random_access: bool,
}

impl<'a> FileSource<'a> {
    pub fn new(file: Dependency<'a, File>) -> Self {
        let random_access = file
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

impl ReadSource for FileSource<'_> {
    fn read_internal(&mut self, dest: &mut [u8], min_length: usize) -> Result<usize> {
        let mut total = 0;
        while total < min_length {
            match self.file.read(&mut dest[total..]) {
                Ok(0) => break,
                Ok(read) => total += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(total)
    }

    fn supports_random_access(&self) -> bool {
        self.random_access
    }

    fn seek_internal(&mut self, new_pos: Position) -> Result<Position> {
        if !self.random_access {
            return Err(RiffleError::Unimplemented(
                "FdReader::seek() not supported for this file".into(),
            ));
        }
        let size = self.file.metadata()?.len();
        let target = new_pos.min(size);
        self.file.seek(SeekFrom::Start(target))?;
        Ok(target)
    }

    fn size_internal(&mut self) -> Result<Position> {
        if !self.random_access {
            return Err(RiffleError::Unimplemented(
                "FdReader::size() not supported for this file".into(),
            ));
        }
        Ok(self.file.metadata()?.len())
    }

    fn done(&mut self) -> Result<()> {
        if self.file.is_owning() {
            debug!("Closing owned file");
        }
        Ok(())
    }
}

impl<'a> BufferedReader<FileSource<'a>> {
    /// Reads `file` from its current offset.
    pub fn new(file: Dependency<'a, File>, options: BufferOptions) -> Result<Self> {
        let mut source = FileSource::new(file);
        let start_pos = if source.random_access {
            source.file.stream_position()?
        } else {
            0
        };
        Ok(Self::from_source_at(source, options, start_pos))
    }

    pub fn borrowed(file: &'a mut File, options: BufferOptions) -> Result<Self> {
        Self::new(Dependency::borrowed(file), options)
    }
}

impl BufferedReader<FileSource<'static>> {
    /// Opens the file at `path` for reading.
    pub fn open(path: impl AsRef<Path>, options: BufferOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!(path = %path.display(), "Opened file for reading");
        Self::new(Dependency::owned(file), options)
    }
}
