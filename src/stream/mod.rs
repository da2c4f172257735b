//! Byte streams
//!
//! Buffered readers and writers over memory, files, host streams and other
//! streams.
//!
//! ## Responsibilities
//! - Define the `Reader`, `Writer` and `BackwardWriter` buffering protocol
//! - Provide concrete sources and sinks (slices, vectors, chains, files)
//! - Compose filters over other streams (limits, `std::io` bridges)
//! - Parse and serialize structured values from and to streams
//!
//! ## Buffer window
//!
//! Every stream exposes a window into its current buffer. Fast paths only
//! move the cursor; the `*_slow` methods refill or drain the buffer.
//!
//! ```text
//!   start            cursor                 limit
//!     │                 │                     │
//!     ▼                 ▼                     ▼
//!     ┌─────────────────┬─────────────────────┐
//!     │    consumed     │      available      │   Reader
//!     ├─────────────────┼─────────────────────┤
//!     │     written     │    spare space      │   Writer
//!     └─────────────────┴─────────────────────┘
//!     ▲
//!     └── start_pos: stream position of `start`
//! ```

mod array_writer;
mod backward_writer;
mod buffered_reader;
mod buffered_writer;
mod chain_backward_writer;
mod chain_reader;
mod chain_writer;
mod fd_reader;
mod fd_writer;
mod io_adapters;
mod limiting_backward_writer;
mod limiting_reader;
mod limiting_writer;
pub mod message;
mod pullable_reader;
mod reader;
mod slice_reader;
mod std_io;
mod vec_writer;
mod writer;

pub use array_writer::ArrayWriter;
pub use backward_writer::{prepend_by_pushing, BackwardWriter, BackwardWriterBase};
pub use buffered_reader::{BufferedReader, ReadSource};
pub use buffered_writer::{BufferedWriter, WriteSink};
pub use chain_backward_writer::ChainBackwardWriter;
pub use chain_reader::ChainReader;
pub use chain_writer::ChainWriter;
pub use fd_reader::{FdReader, FileSource};
pub use fd_writer::{FdWriter, FileSink};
pub use io_adapters::{IoReader, IoSink, IoSource, IoWriter};
pub use limiting_backward_writer::LimitingBackwardWriter;
pub use limiting_reader::LimitingReader;
pub use limiting_writer::LimitingWriter;
pub use message::{parse_from_chain, parse_from_reader, serialize_to_chain, serialize_to_writer};
pub use pullable_reader::{discard_scratch, pull_using_scratch, sync_scratch, PullableReader, Scratch};
pub use reader::{
    copy_by_pulling, read_by_pulling, read_to_chain_by_pulling, seek_by_skipping, Reader,
    ReaderBase,
};
pub use slice_reader::SliceReader;
pub use std_io::{ReaderIo, WriterIo};
pub use vec_writer::VecWriter;
pub use writer::{write_by_pushing, FlushType, Writer, WriterBase};
