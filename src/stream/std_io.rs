//! `std::io` bridges
//!
//! Exposes any `Reader` as `std::io::Read + BufRead + Seek` and any `Writer`
//! as `std::io::Write`, so serde codecs and third-party encoders can run on
//! top of riffle streams. Failures stored in the wrapped object cross the
//! bridge as `io::Error`s wrapping the original `RiffleError`.

use std::io;

use crate::base::Dependency;
use crate::error::{Result, RiffleError};

use super::reader::Reader;
use super::writer::{FlushType, Writer};

fn failure(status: Result<()>) -> io::Error {
    status.err().unwrap_or(RiffleError::Closed).into()
}

// =============================================================================
// Reader Bridge
// =============================================================================

/// `std::io` view of a `Reader`
#[derive(Debug)]
pub struct ReaderIo<'a, R: Reader>(Dependency<'a, R>);

impl<'a, R: Reader> ReaderIo<'a, R> {
    pub fn new(src: Dependency<'a, R>) -> Self {
        Self(src)
    }

    pub fn borrowed(src: &'a mut R) -> Self {
        Self(Dependency::borrowed(src))
    }

    pub fn get(&self) -> &R {
        self.0.get()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.0.get_mut()
    }

    pub fn into_inner(self) -> Dependency<'a, R> {
        self.0
    }
}

impl<R: Reader> io::Read for ReaderIo<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let src = self.0.get_mut();
        if src.available() == 0 && !src.pull(1, buf.len()) {
            if !src.healthy() {
                return Err(failure(src.status()));
            }
            return Ok(0);
        }
        let length = src.available().min(buf.len());
        buf[..length].copy_from_slice(&src.chunk()[..length]);
        src.move_cursor(length);
        Ok(length)
    }
}

impl<R: Reader> io::BufRead for ReaderIo<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let src = self.0.get_mut();
        if src.available() == 0 && !src.pull(1, 0) && !src.healthy() {
            return Err(failure(src.status()));
        }
        Ok(self.0.get().chunk())
    }

    fn consume(&mut self, amt: usize) {
        self.0.get_mut().move_cursor(amt);
    }
}

impl<R: Reader> io::Seek for ReaderIo<'_, R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let src = self.0.get_mut();
        let target = match pos {
            io::SeekFrom::Start(offset) => Some(offset),
            io::SeekFrom::Current(delta) => src.pos().checked_add_signed(delta),
            io::SeekFrom::End(delta) => {
                let size = src.size().map_err(io::Error::from)?;
                size.checked_add_signed(delta)
            }
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            ));
        };
        if !src.seek(target) && !src.healthy() {
            return Err(failure(src.status()));
        }
        Ok(src.pos())
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.0.pos())
    }
}

// =============================================================================
// Writer Bridge
// =============================================================================

/// `std::io` view of a `Writer`
#[derive(Debug)]
pub struct WriterIo<'a, W: Writer>(Dependency<'a, W>);

impl<'a, W: Writer> WriterIo<'a, W> {
    pub fn new(dest: Dependency<'a, W>) -> Self {
        Self(dest)
    }

    pub fn borrowed(dest: &'a mut W) -> Self {
        Self(Dependency::borrowed(dest))
    }

    pub fn get(&self) -> &W {
        self.0.get()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.0.get_mut()
    }

    pub fn into_inner(self) -> Dependency<'a, W> {
        self.0
    }
}

impl<W: Writer> io::Write for WriterIo<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let dest = self.0.get_mut();
        if !dest.write(buf) {
            return Err(failure(dest.status()));
        }
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write(buf).map(|_| ())
    }

    fn flush(&mut self) -> io::Result<()> {
        let dest = self.0.get_mut();
        if !dest.flush(FlushType::FromObject) {
            return Err(failure(dest.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, Read, Seek, SeekFrom, Write};

    use super::*;
    use crate::stream::{SliceReader, VecWriter};

    #[test]
    fn test_read_lines_through_bridge() {
        let mut src = SliceReader::from_static(b"first\nsecond\n");
        let mut io = ReaderIo::borrowed(&mut src);
        let mut line = String::new();
        io.read_line(&mut line).unwrap();
        assert_eq!(line, "first\n");
        let mut rest = String::new();
        io.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "second\n");
    }

    #[test]
    fn test_seek_from_end() {
        let mut src = SliceReader::from_static(b"0123456789");
        let mut io = ReaderIo::borrowed(&mut src);
        assert_eq!(io.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(io.seek(SeekFrom::Current(100)).unwrap(), 10);
        assert!(io.seek(SeekFrom::Current(-20)).is_err());
    }

    #[test]
    fn test_write_through_bridge() {
        let mut dest = VecWriter::owned();
        {
            let mut io = WriterIo::borrowed(&mut dest);
            write!(io, "{}-{}", 1, 2).unwrap();
            io.flush().unwrap();
        }
        assert_eq!(dest.dest().as_slice(), b"1-2");
    }
}
