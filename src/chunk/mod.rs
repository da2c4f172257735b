//! Chunk Module
//!
//! The unit of the records format: a checksummed header followed by a
//! payload that decodes to zero or more records.
//!
//! ## Responsibilities
//! - Encode and validate chunk headers
//! - Compress and decompress payload blocks
//! - Encode records into simple chunks and decode them back
//! - Hand transposed chunks to a pluggable decoder
//! - Expose a decoded chunk as an indexable record sequence
//!
//! ## Chunk
//! ```text
//!   chunk_begin                                          chunk_end
//!       │                                                    │
//!       ▼                                                    ▼
//!       ┌────────────────┬──────────────────────┬────────────┐
//!       │ header (32 B)  │ payload (data_size)  │ zero fill  │
//!       └────────────────┴──────────────────────┴────────────┘
//!   zero fill extends short chunks to one byte per record
//! ```

mod compression;
mod decoder;
mod header;
mod simple;
mod transpose;
mod varint;

pub use compression::{compress_block, decompress_block};
pub use decoder::ChunkDecoder;
pub use header::{Chunk, ChunkHeader, ChunkType, CHUNK_HEADER_SIZE, MAX_NUM_RECORDS};
pub use simple::{SimpleDecoder, SimpleEncoder};
pub use transpose::{FieldPath, FieldProjection, TransposeDecoder, UnsupportedTransposeDecoder};
pub use varint::{
    decode_varint64, encode_varint64, read_varint64, varint64_len, write_varint64, MAX_VARINT64_LEN,
};
