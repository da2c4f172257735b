//! # Riffle
//!
//! Composable byte streams and a chunked, compressed, recoverable record
//! format:
//! - Buffered `Reader`/`Writer` protocol with absolute positions
//! - Memory, file and host-stream sources and sinks
//! - Zlib, Zstandard, Brotli and framed Snappy codecs as stream filters
//! - Records files with random access by record position and recovery
//!   from corrupted chunks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              RecordWriter / RecordReader                     │
//! │        (records, positions, metadata, recovery)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              ChunkWriter / ChunkReader                       │
//! │      (headers, checksums, padding, resynchronization)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Chunk     │          │   Codecs    │
//!   │  encoding   │─────────►│ (filters)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Streams   │
//!                           │ (Reader /   │
//!                           │  Writer)    │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod base;
pub mod stream;
pub mod codec;
pub mod chunk;
pub mod records;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use base::{Chain, Dependency, Position};
pub use config::{
    BufferOptions, CompressionType, CompressorOptions, RecordReaderOptions, RecordWriterOptions,
};
pub use error::{Result, RiffleError};
pub use records::{RecordPosition, RecordReader, RecordWriter, RecordsMetadata, SkippedRegion};
pub use stream::{FlushType, Reader, Writer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Riffle
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
