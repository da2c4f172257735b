//! Codec Module
//!
//! Compressing writers and decompressing readers layered over other
//! streams.
//!
//! ## Responsibilities
//! - Zlib/deflate, Zstandard and Brotli streaming readers and writers
//! - Framed Snappy reader and writer with per-frame CRC32C checks
//! - Recycling of expensive compression engines across short-lived objects
//! - Detecting streams that end before the compressed data does
//!
//! ## Layering
//! ```text
//!   ┌──────────────────────────┐      ┌──────────────────────────┐
//!   │ BufferedReader<XSource>  │      │ BufferedWriter<XSink>    │
//!   │  window of decoded bytes │      │  window of raw bytes     │
//!   └────────────┬─────────────┘      └────────────┬─────────────┘
//!                │ pull compressed                 │ push compressed
//!                ▼                                 ▼
//!   ┌──────────────────────────┐      ┌──────────────────────────┐
//!   │ src: Reader              │      │ dest: Writer             │
//!   └──────────────────────────┘      └──────────────────────────┘
//! ```

mod brotli_reader;
mod brotli_writer;
mod framed_snappy_reader;
mod framed_snappy_writer;
mod zlib_reader;
mod zlib_writer;
mod zstd_reader;
mod zstd_writer;

use tracing::debug;

use crate::base::Dependency;
use crate::error::{Result, RiffleError};
use crate::stream::{Reader, Writer};

pub use brotli_reader::{BrotliReader, BrotliSource};
pub use brotli_writer::{BrotliSink, BrotliWriter, DEFAULT_BROTLI_LEVEL, DEFAULT_BROTLI_WINDOW_LOG};
pub use framed_snappy_reader::FramedSnappyReader;
pub use framed_snappy_writer::{FramedSnappySink, FramedSnappyWriter};
pub use zlib_reader::{ZlibReader, ZlibSource};
pub use zlib_writer::{ZlibSink, ZlibWriter, DEFAULT_ZLIB_LEVEL};
pub use zstd_reader::{ZstdReader, ZstdSource};
pub use zstd_writer::{ZstdSink, ZstdWriter, DEFAULT_ZSTD_LEVEL};

/// Stream identifier frame that opens a framed Snappy stream.
pub const FRAMED_SNAPPY_STREAM_ID: [u8; 10] = *b"\xff\x06\x00\x00sNaPpY";

/// Largest uncompressed block held by one framed Snappy frame.
pub const FRAMED_SNAPPY_BLOCK_SIZE: usize = 64 * 1024;

/// CRC32C of `data`, masked as the framed Snappy format requires.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    crc.rotate_right(15).wrapping_add(0xa282_ead8)
}

/// Closes an owned source, surfacing its failure.
pub(crate) fn close_src<R: Reader>(src: &mut Dependency<'_, R>) -> Result<()> {
    if src.is_owning() {
        debug!(pos = src.pos(), "closing owned source");
        if !src.close() {
            src.status()?;
        }
    }
    Ok(())
}

/// Closes an owned destination, surfacing its failure.
pub(crate) fn close_dest<W: Writer>(dest: &mut Dependency<'_, W>) -> Result<()> {
    if dest.is_owning() {
        debug!(pos = dest.pos(), "closing owned destination");
        if !dest.close() {
            dest.status()?;
        }
    }
    Ok(())
}

/// Failure to report after a wrapped writer refused an operation.
pub(crate) fn dest_failure(status: Result<()>) -> RiffleError {
    status.err().unwrap_or(RiffleError::Closed)
}
