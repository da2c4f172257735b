//! Simple chunk encoding
//!
//! ## Payload
//! ```text
//!   ┌──────┬────────────────────┬──────────────────┬───────────────────┐
//!   │ tag  │ varint sizes_len   │ compressed sizes │ compressed values │
//!   └──────┴────────────────────┴──────────────────┴───────────────────┘
//! ```
//! `sizes` holds the varint length of each record; `values` holds the
//! records back to back. Both blocks use the compression named by `tag`.

use crate::base::{Chain, Position};
use crate::config::{CompressionType, CompressorOptions};
use crate::error::{Result, RiffleError};
use crate::stream::{ChainReader, Reader};

use super::compression::{compress_block, decompress_block};
use super::header::{Chunk, ChunkType, MAX_NUM_RECORDS};
use super::varint::{encode_varint64, read_varint64};

/// Collects records and encodes them as one simple chunk
#[derive(Debug)]
pub struct SimpleEncoder {
    compressor: CompressorOptions,
    /// Varint encoded record sizes
    sizes: Vec<u8>,
    /// Concatenated records
    values: Chain,
    num_records: u64,
}

impl SimpleEncoder {
    pub fn new(compressor: CompressorOptions) -> Self {
        Self {
            compressor,
            sizes: Vec::new(),
            values: Chain::new(),
            num_records: 0,
        }
    }

    pub fn add_record(&mut self, record: &[u8]) -> Result<()> {
        self.count_record(record.len())?;
        self.values.append_slice(record);
        Ok(())
    }

    pub fn add_record_chain(&mut self, record: &Chain) -> Result<()> {
        self.count_record(record.len())?;
        self.values.append_chain(record);
        Ok(())
    }

    fn count_record(&mut self, size: usize) -> Result<()> {
        if self.num_records >= MAX_NUM_RECORDS {
            return Err(RiffleError::Overflow("Too many records in one chunk".into()));
        }
        if (self.values.len() as u64).checked_add(size as u64).is_none() {
            return Err(RiffleError::Overflow("Decoded chunk data too large".into()));
        }
        encode_varint64(size as u64, &mut self.sizes);
        self.num_records += 1;
        Ok(())
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    /// Total size of the records added so far.
    pub fn decoded_data_size(&self) -> u64 {
        self.values.len() as u64
    }

    /// Uncompressed size of the chunk data so far, record sizes included.
    pub fn estimated_size(&self) -> u64 {
        (self.sizes.len() + self.values.len()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.num_records == 0
    }

    pub fn clear(&mut self) {
        self.sizes.clear();
        self.values.clear();
        self.num_records = 0;
    }

    /// Encodes the collected records into a chunk of `chunk_type` and
    /// resets the encoder. Metadata chunks declare zero records.
    pub fn encode(&mut self, chunk_type: ChunkType) -> Result<Chunk> {
        let sizes = Chain::from(std::mem::take(&mut self.sizes));
        let values = std::mem::take(&mut self.values);
        let num_records = std::mem::take(&mut self.num_records);
        let decoded_data_size = values.len() as u64;

        let mut compressed_sizes = Chain::new();
        compress_block(&self.compressor, &sizes, &mut compressed_sizes)?;

        let mut prefix = vec![self.compressor.compression_type.tag()];
        encode_varint64(compressed_sizes.len() as u64, &mut prefix);
        let mut data = Chain::from(prefix);
        data.append_chain(&compressed_sizes);
        compress_block(&self.compressor, &values, &mut data)?;

        let header_records = if chunk_type.holds_records() { num_records } else { 0 };
        Ok(Chunk::new(chunk_type, data, header_records, decoded_data_size))
    }
}

/// Records decoded from a simple chunk payload
#[derive(Debug)]
pub struct SimpleDecoder {
    values: Chain,
    /// End offset of each record in `values`
    limits: Vec<usize>,
}

impl SimpleDecoder {
    /// Decodes a payload that should hold `num_records` records totalling
    /// `decoded_data_size` bytes.
    pub fn decode(data: &Chain, num_records: u64, decoded_data_size: u64) -> Result<Self> {
        let mut src = ChainReader::owned(data.clone());
        let Some(tag) = src.read_byte() else {
            return Err(RiffleError::DataLoss("Reading compression type failed".into()));
        };
        let compression = CompressionType::from_tag(tag)
            .ok_or_else(|| RiffleError::DataLoss(format!("Unknown compression type: {tag}")))?;
        let Some(sizes_len) = read_varint64(&mut src) else {
            return Err(RiffleError::DataLoss("Reading size of sizes failed".into()));
        };
        let remaining = data.len() as Position - src.pos();
        if sizes_len > remaining {
            return Err(RiffleError::DataLoss("Size of sizes exceeds chunk data".into()));
        }
        let mut compressed_sizes = Chain::new();
        src.read_to_chain(sizes_len as usize, &mut compressed_sizes);
        let sizes = decompress_block(compression, compressed_sizes)?;

        let mut compressed_values = Chain::new();
        let remaining = (data.len() as Position - src.pos()) as usize;
        src.read_to_chain(remaining, &mut compressed_values);
        let values = decompress_block(compression, compressed_values)?;
        if values.len() as u64 != decoded_data_size {
            return Err(RiffleError::DataLoss(format!(
                "Decoded data size mismatch: header says {decoded_data_size}, values hold {}",
                values.len()
            )));
        }

        let mut sizes_reader = ChainReader::owned(sizes);
        let capacity = num_records.min(sizes_reader.src().len() as u64) as usize;
        let mut limits = Vec::with_capacity(capacity);
        let mut limit = 0usize;
        for _ in 0..num_records {
            let Some(size) = read_varint64(&mut sizes_reader) else {
                return Err(RiffleError::DataLoss("Reading record size failed".into()));
            };
            limit = usize::try_from(size)
                .ok()
                .and_then(|size| limit.checked_add(size))
                .filter(|&limit| limit <= values.len())
                .ok_or_else(|| {
                    RiffleError::DataLoss("Record sizes exceed decoded data size".into())
                })?;
            limits.push(limit);
        }
        if !sizes_reader.verify_end() {
            return Err(RiffleError::DataLoss("More record sizes than records".into()));
        }
        if limit != values.len() {
            return Err(RiffleError::DataLoss(
                "Decoded data size larger than the sum of record sizes".into(),
            ));
        }
        Ok(Self { values, limits })
    }

    pub fn num_records(&self) -> usize {
        self.limits.len()
    }

    pub fn into_parts(self) -> (Chain, Vec<usize>) {
        (self.values, self.limits)
    }
}
