//! Configuration for Riffle
//!
//! Option structs for buffered streams, codecs and the record layer, each
//! with sensible defaults and a builder.

use std::fmt;

use crate::base::Position;
use crate::chunk::FieldProjection;
use crate::records::{RecordsMetadata, SkippedRegion};

/// Default size of buffers allocated by buffered readers and writers.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default amount of decoded record data collected before a chunk is closed.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

// =============================================================================
// Buffer Options
// =============================================================================

/// Buffering parameters shared by buffered readers and writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Size of each buffer refill (readers) or flush unit (writers)
    pub buffer_size: usize,

    /// Expected total size of the stream, if known. Limits the first
    /// allocation so small streams do not allocate a full buffer.
    pub size_hint: Option<Position>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            size_hint: None,
        }
    }
}

impl BufferOptions {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_size_hint(mut self, size_hint: Option<Position>) -> Self {
        self.size_hint = size_hint;
        self
    }

    /// Length of the next buffer when `pos` bytes have been processed.
    ///
    /// `recommended_length` is a hint: it never grows the buffer past
    /// `buffer_size`. Only `min_length` may do that.
    pub(crate) fn next_buffer_length(
        &self,
        pos: Position,
        min_length: usize,
        recommended_length: usize,
    ) -> usize {
        let mut length = self.buffer_size;
        if let Some(hint) = self.size_hint {
            if let Some(remaining) = hint.checked_sub(pos) {
                if remaining > 0 {
                    length = length.min(usize::try_from(remaining).unwrap_or(usize::MAX));
                }
            }
        }
        length
            .max(recommended_length.min(self.buffer_size))
            .max(min_length)
    }
}

// =============================================================================
// Codec Options
// =============================================================================

/// Compression algorithm used for chunk payload blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionType {
    None,
    Brotli,
    Zstd,
    Snappy,
}

impl CompressionType {
    /// Tag byte stored in chunk payloads.
    pub fn tag(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::Brotli => b'b',
            CompressionType::Zstd => b'z',
            CompressionType::Snappy => b's',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionType::None),
            b'b' => Some(CompressionType::Brotli),
            b'z' => Some(CompressionType::Zstd),
            b's' => Some(CompressionType::Snappy),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionType::None => "uncompressed",
            CompressionType::Brotli => "brotli",
            CompressionType::Zstd => "zstd",
            CompressionType::Snappy => "snappy",
        };
        f.write_str(name)
    }
}

/// Compression settings for chunk payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressorOptions {
    pub compression_type: CompressionType,

    /// Codec specific level (brotli 0..=11, zstd 1..=22, ignored otherwise)
    pub level: i32,

    /// Brotli window log (10..=24); `None` lets the codec choose
    pub window_log: Option<u32>,
}

impl Default for CompressorOptions {
    fn default() -> Self {
        Self::zstd(3)
    }
}

impl CompressorOptions {
    pub fn uncompressed() -> Self {
        Self {
            compression_type: CompressionType::None,
            level: 0,
            window_log: None,
        }
    }

    pub fn brotli(level: i32) -> Self {
        Self {
            compression_type: CompressionType::Brotli,
            level: level.clamp(0, 11),
            window_log: None,
        }
    }

    pub fn zstd(level: i32) -> Self {
        Self {
            compression_type: CompressionType::Zstd,
            level: level.clamp(1, 22),
            window_log: None,
        }
    }

    pub fn snappy() -> Self {
        Self {
            compression_type: CompressionType::Snappy,
            level: 0,
            window_log: None,
        }
    }

    pub fn with_window_log(mut self, window_log: u32) -> Self {
        self.window_log = Some(window_log.clamp(10, 24));
        self
    }
}

/// Header framing of a deflate stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ZlibHeader {
    /// RFC 1950 zlib wrapper with Adler-32 trailer
    #[default]
    Zlib,

    /// Bare RFC 1951 deflate data
    Raw,
}

impl ZlibHeader {
    pub(crate) fn has_zlib_header(self) -> bool {
        self == ZlibHeader::Zlib
    }
}

// =============================================================================
// Record Writer Options
// =============================================================================

/// Options for `RecordWriter`
#[derive(Debug, Clone)]
pub struct RecordWriterOptions {
    pub compressor: CompressorOptions,

    /// Uncompressed bytes (records plus their sizes) collected before the
    /// current chunk is written
    pub chunk_size: u64,

    /// Metadata stored in a chunk right after the file signature
    pub metadata: Option<RecordsMetadata>,

    /// Pad with a padding chunk to a block boundary on every flush
    pub pad_to_block_boundary: bool,
}

impl Default for RecordWriterOptions {
    fn default() -> Self {
        Self {
            compressor: CompressorOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            metadata: None,
            pad_to_block_boundary: false,
        }
    }
}

impl RecordWriterOptions {
    /// Create a new options builder
    pub fn builder() -> RecordWriterOptionsBuilder {
        RecordWriterOptionsBuilder::default()
    }
}

/// Builder for RecordWriterOptions
#[derive(Default)]
pub struct RecordWriterOptionsBuilder {
    options: RecordWriterOptions,
}

impl RecordWriterOptionsBuilder {
    /// Set the compression used for chunk payloads
    pub fn compressor(mut self, compressor: CompressorOptions) -> Self {
        self.options.compressor = compressor;
        self
    }

    /// Set the decoded chunk size (in bytes, at least 1)
    pub fn chunk_size(mut self, size: u64) -> Self {
        self.options.chunk_size = size.max(1);
        self
    }

    /// Set the file metadata
    pub fn metadata(mut self, metadata: RecordsMetadata) -> Self {
        self.options.metadata = Some(metadata);
        self
    }

    /// Pad to block boundaries on flush
    pub fn pad_to_block_boundary(mut self, pad: bool) -> Self {
        self.options.pad_to_block_boundary = pad;
        self
    }

    pub fn build(self) -> RecordWriterOptions {
        self.options
    }
}

// =============================================================================
// Record Reader Options
// =============================================================================

/// Called with each skipped region; returning false stops reading.
pub type RecoveryFn = Box<dyn FnMut(&SkippedRegion) -> bool + Send>;

/// Options for `RecordReader`
#[derive(Default)]
pub struct RecordReaderOptions {
    pub field_projection: FieldProjection,

    /// Invoked on recoverable failures; without it failures stop reading
    pub recovery: Option<RecoveryFn>,
}

impl fmt::Debug for RecordReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordReaderOptions")
            .field("field_projection", &self.field_projection)
            .field("recovery", &self.recovery.is_some())
            .finish()
    }
}

impl RecordReaderOptions {
    /// Create a new options builder
    pub fn builder() -> RecordReaderOptionsBuilder {
        RecordReaderOptionsBuilder::default()
    }
}

/// Builder for RecordReaderOptions
#[derive(Default)]
pub struct RecordReaderOptionsBuilder {
    options: RecordReaderOptions,
}

impl RecordReaderOptionsBuilder {
    /// Set the field projection passed to transposed chunk decoding
    pub fn field_projection(mut self, projection: FieldProjection) -> Self {
        self.options.field_projection = projection;
        self
    }

    /// Set the recovery callback
    pub fn recovery(mut self, recovery: impl FnMut(&SkippedRegion) -> bool + Send + 'static) -> Self {
        self.options.recovery = Some(Box::new(recovery));
        self
    }

    /// Skip every recoverable region
    pub fn skip_errors(self) -> Self {
        self.recovery(|_| true)
    }

    pub fn build(self) -> RecordReaderOptions {
        self.options
    }
}
