//! Record positions and skipped regions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::base::Position;
use crate::error::{Result, RiffleError};

/// Location of a record: the chunk holding it and its index in that chunk
///
/// Ordered by file position. `numeric()` maps it to a single byte position
/// that is distinct for every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordPosition {
    chunk_begin: Position,
    record_index: u64,
}

impl RecordPosition {
    pub fn new(chunk_begin: Position, record_index: u64) -> Self {
        Self {
            chunk_begin,
            record_index,
        }
    }

    pub fn chunk_begin(&self) -> Position {
        self.chunk_begin
    }

    pub fn record_index(&self) -> u64 {
        self.record_index
    }

    /// Single position usable with `RecordReader::seek_numeric`.
    pub fn numeric(&self) -> Position {
        self.chunk_begin.saturating_add(self.record_index)
    }

    /// 16 byte big-endian form; byte order matches position order.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.chunk_begin.to_be_bytes());
        bytes[8..].copy_from_slice(&self.record_index.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; 16] = bytes
            .try_into()
            .map_err(|_| RiffleError::InvalidArgument(format!("RecordPosition needs 16 bytes, got {}", bytes.len())))?;
        let mut chunk_begin = [0u8; 8];
        let mut record_index = [0u8; 8];
        chunk_begin.copy_from_slice(&bytes[..8]);
        record_index.copy_from_slice(&bytes[8..]);
        let chunk_begin = u64::from_be_bytes(chunk_begin);
        let record_index = u64::from_be_bytes(record_index);
        if chunk_begin.checked_add(record_index).is_none() {
            return Err(RiffleError::InvalidArgument("RecordPosition overflow".into()));
        }
        Ok(Self::new(chunk_begin, record_index))
    }
}

impl fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chunk_begin, self.record_index)
    }
}

impl FromStr for RecordPosition {
    type Err = RiffleError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RiffleError::InvalidArgument(format!("Invalid RecordPosition: {s:?}"));
        let (chunk_begin, record_index) = s.split_once('/').ok_or_else(invalid)?;
        let chunk_begin: u64 = chunk_begin.parse().map_err(|_| invalid())?;
        let record_index: u64 = record_index.parse().map_err(|_| invalid())?;
        if chunk_begin.checked_add(record_index).is_none() {
            return Err(invalid());
        }
        Ok(Self::new(chunk_begin, record_index))
    }
}

/// Byte range skipped while recovering from corrupted data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkippedRegion {
    pub begin: Position,
    pub end: Position,
    /// Failure that caused the skip
    pub message: String,
}

impl SkippedRegion {
    pub fn new(begin: Position, end: Position, message: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            message: message.into(),
        }
    }

    pub fn length(&self) -> Position {
        self.end.saturating_sub(self.begin)
    }
}

impl fmt::Display for SkippedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}): {}", self.begin, self.end, self.message)
    }
}
