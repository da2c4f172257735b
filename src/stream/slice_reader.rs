//! SliceReader
//!
//! Reads from a contiguous in-memory buffer. The whole buffer is the window,
//! so every pull beyond it is end of data.

use bytes::Bytes;

use crate::base::Position;
use crate::error::Result;

use super::reader::{Reader, ReaderBase};

/// `Reader` over one `Bytes` buffer
#[derive(Debug, Default)]
pub struct SliceReader {
    base: ReaderBase,
}

impl SliceReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let mut base = ReaderBase::new();
        base.set_buffer(data.into(), 0);
        Self { base }
    }

    pub fn from_static(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }

    /// The full underlying buffer.
    pub fn data(&self) -> &Bytes {
        self.base.data()
    }
}

impl Reader for SliceReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn pull_slow(&mut self, _min_length: usize, _recommended_length: usize) -> bool {
        false
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        // Only positions past the end are outside of the window.
        let end = self.base.limit_pos();
        self.base.seek_within(end);
        new_pos <= end
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        Ok(self.base.limit_pos())
    }
}
