//! Records Module
//!
//! The records file format: a sequence of chunks holding records, readable
//! sequentially or by position, and recoverable after corruption.
//!
//! ## Responsibilities
//! - Write records into compressed chunks (`RecordWriter`, `ChunkWriter`)
//! - Read chunks and resynchronize past corrupted bytes (`ChunkReader`)
//! - Iterate, seek and recover at the record level (`RecordReader`)
//! - Store and read per-file metadata
//!
//! ## File Layout
//! ```text
//!   0                                                             EOF
//!   ┌───────────┬──────────┬─────────┬─────────┬─────────┬───────┐
//!   │ signature │ metadata │ records │ records │ padding │  ...  │
//!   │  chunk    │ (opt.)   │ chunk   │ chunk   │ (opt.)  │       │
//!   └───────────┴──────────┴─────────┴─────────┴─────────┴───────┘
//!                          ▲
//!                          └── RecordPosition { chunk_begin, record_index }
//! ```

mod chunk_reader;
mod chunk_writer;
mod metadata;
mod position;
mod record_reader;
mod record_writer;

pub use chunk_reader::ChunkReader;
pub use chunk_writer::{ChunkWriter, BLOCK_SIZE};
pub use metadata::RecordsMetadata;
pub use position::{RecordPosition, SkippedRegion};
pub use record_reader::RecordReader;
pub use record_writer::RecordWriter;
