//! Chunk header
//!
//! Every chunk starts with a fixed 32 byte header protected by its own
//! checksum, so a reader can validate the header before trusting any size
//! it declares.
//!
//! ## Layout (little-endian)
//! ```text
//!   0        4        8                16                24               32
//!   ┌────────┬────────┬────────────────┬────────────────┬────────────────┐
//!   │hdr crc │data crc│   data_size    │type│num_records│decoded_size    │
//!   └────────┴────────┴────────────────┴────────────────┴────────────────┘
//! ```

use std::fmt;

use crate::base::{Chain, Position};
use crate::error::{Result, RiffleError};

/// Size of an encoded chunk header.
pub const CHUNK_HEADER_SIZE: usize = 32;

/// Largest record count a chunk header can declare.
pub const MAX_NUM_RECORDS: u64 = (1 << 56) - 1;

/// Kind of a chunk, stored in the low byte of the type/records field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// First chunk of every file, with no payload
    FileSignature,

    /// Optional second chunk holding serialized `RecordsMetadata`
    FileMetadata,

    /// Filler used to reach block boundaries
    Padding,

    /// Records stored as compressed sizes plus compressed values
    Simple,

    /// Records stored field by field
    Transposed,
}

impl ChunkType {
    pub fn as_byte(self) -> u8 {
        match self {
            ChunkType::FileSignature => b's',
            ChunkType::FileMetadata => b'm',
            ChunkType::Padding => b'p',
            ChunkType::Simple => b'r',
            ChunkType::Transposed => b't',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b's' => Some(ChunkType::FileSignature),
            b'm' => Some(ChunkType::FileMetadata),
            b'p' => Some(ChunkType::Padding),
            b'r' => Some(ChunkType::Simple),
            b't' => Some(ChunkType::Transposed),
            _ => None,
        }
    }

    /// Whether chunks of this type carry user records.
    pub fn holds_records(self) -> bool {
        matches!(self, ChunkType::Simple | ChunkType::Transposed)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkType::FileSignature => "signature",
            ChunkType::FileMetadata => "metadata",
            ChunkType::Padding => "padding",
            ChunkType::Simple => "simple",
            ChunkType::Transposed => "transposed",
        };
        f.write_str(name)
    }
}

/// Decoded chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// CRC-32 of the payload
    data_crc: u32,
    /// Payload length in bytes
    data_size: u64,
    chunk_type: ChunkType,
    num_records: u64,
    /// Sum of the sizes of all records after decoding
    decoded_data_size: u64,
}

impl ChunkHeader {
    /// Describes `data` as the payload of a chunk.
    pub fn new(chunk_type: ChunkType, data: &Chain, num_records: u64, decoded_data_size: u64) -> Self {
        debug_assert!(num_records <= MAX_NUM_RECORDS, "too many records for one chunk");
        Self {
            data_crc: chain_crc(data),
            data_size: data.len() as u64,
            chunk_type,
            num_records,
            decoded_data_size,
        }
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn data_crc(&self) -> u32 {
        self.data_crc
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    pub fn decoded_data_size(&self) -> u64 {
        self.decoded_data_size
    }

    /// Position just past a chunk with this header starting at `chunk_begin`.
    ///
    /// A chunk covers at least one byte per record, so every record has a
    /// distinct numeric position.
    pub fn chunk_end(&self, chunk_begin: Position) -> Position {
        let data_end = chunk_begin
            .saturating_add(CHUNK_HEADER_SIZE as Position)
            .saturating_add(self.data_size);
        data_end.max(chunk_begin.saturating_add(self.num_records))
    }

    pub fn encode(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut bytes = [0u8; CHUNK_HEADER_SIZE];
        bytes[4..8].copy_from_slice(&self.data_crc.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data_size.to_le_bytes());
        let type_and_records = u64::from(self.chunk_type.as_byte()) | (self.num_records << 8);
        bytes[16..24].copy_from_slice(&type_and_records.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.decoded_data_size.to_le_bytes());
        let header_crc = crc32fast::hash(&bytes[4..]);
        bytes[..4].copy_from_slice(&header_crc.to_le_bytes());
        bytes
    }

    /// Parses and validates an encoded header.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CHUNK_HEADER_SIZE {
            return Err(RiffleError::DataLoss("Truncated chunk header".into()));
        }
        let header_crc = read_u32(bytes, 0);
        let actual = crc32fast::hash(&bytes[4..CHUNK_HEADER_SIZE]);
        if header_crc != actual {
            return Err(RiffleError::DataLoss(format!(
                "Corrupted chunk header: header checksum mismatch (expected {header_crc:08x}, computed {actual:08x})"
            )));
        }
        let type_and_records = read_u64(bytes, 16);
        let type_byte = (type_and_records & 0xff) as u8;
        let chunk_type = ChunkType::from_byte(type_byte).ok_or_else(|| {
            RiffleError::DataLoss(format!("Unknown chunk type: 0x{type_byte:02x}"))
        })?;
        Ok(Self {
            data_crc: read_u32(bytes, 4),
            data_size: read_u64(bytes, 8),
            chunk_type,
            num_records: type_and_records >> 8,
            decoded_data_size: read_u64(bytes, 24),
        })
    }

    /// Checks `data` against the payload checksum.
    pub fn verify_data(&self, data: &Chain) -> Result<()> {
        let actual = chain_crc(data);
        if actual != self.data_crc {
            return Err(RiffleError::DataLoss(format!(
                "Corrupted chunk data: data checksum mismatch (expected {:08x}, computed {actual:08x})",
                self.data_crc
            )));
        }
        Ok(())
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn chain_crc(data: &Chain) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for block in data.blocks() {
        hasher.update(block);
    }
    hasher.finalize()
}

/// A chunk: header plus payload
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub data: Chain,
}

impl Chunk {
    pub fn new(chunk_type: ChunkType, data: Chain, num_records: u64, decoded_data_size: u64) -> Self {
        let header = ChunkHeader::new(chunk_type, &data, num_records, decoded_data_size);
        Self { header, data }
    }

    /// The chunk that opens every records file.
    pub fn file_signature() -> Self {
        Self::new(ChunkType::FileSignature, Chain::new(), 0, 0)
    }

    /// A padding chunk whose total size (header included) is `length`.
    pub fn padding(length: u64) -> Self {
        let data_size = length.saturating_sub(CHUNK_HEADER_SIZE as u64);
        let data = Chain::from(vec![0u8; data_size as usize]);
        Self::new(ChunkType::Padding, data, 0, 0)
    }
}
