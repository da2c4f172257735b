//! Tests for chunk encoding and decoding
//!
//! These tests verify:
//! - Simple chunks round trip under every compression type
//! - Encoded header bytes follow the on-disk layout
//! - Payload corruption is caught by the data checksum and the decoder
//! - Transposed chunks reach a pluggable decoder with the field projection

use std::sync::{Arc, Mutex};

use riffle::chunk::{
    Chunk, ChunkDecoder, ChunkHeader, ChunkType, FieldPath, FieldProjection, SimpleDecoder,
    SimpleEncoder, TransposeDecoder, CHUNK_HEADER_SIZE,
};
use riffle::stream::Reader;
use riffle::{Chain, CompressionType, CompressorOptions, Result, RiffleError};

// =============================================================================
// Helper Functions
// =============================================================================

fn all_compressors() -> Vec<CompressorOptions> {
    vec![
        CompressorOptions::uncompressed(),
        CompressorOptions::brotli(6),
        CompressorOptions::zstd(3),
        CompressorOptions::snappy(),
    ]
}

fn sample_records() -> Vec<Vec<u8>> {
    (0..500u32)
        .map(|i| {
            let len = (i % 37) as usize;
            format!("record-{i:04}-")
                .into_bytes()
                .into_iter()
                .chain(std::iter::repeat(b'x').take(len))
                .collect()
        })
        .chain(std::iter::once(Vec::new()))
        .collect()
}

fn encode(compressor: CompressorOptions, records: &[Vec<u8>]) -> Chunk {
    let mut encoder = SimpleEncoder::new(compressor);
    for record in records {
        encoder.add_record(record).unwrap();
    }
    encoder.encode(ChunkType::Simple).unwrap()
}

fn decode_all(decoder: &mut ChunkDecoder) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    while decoder.read_record(&mut record) {
        records.push(record.clone());
    }
    records
}

/// Decodes a transposed payload of newline-terminated records.
struct LineDecoder {
    seen_projection: Arc<Mutex<Option<FieldProjection>>>,
}

impl TransposeDecoder for LineDecoder {
    fn decode(
        &mut self,
        src: &mut dyn Reader,
        num_records: u64,
        _decoded_data_size: u64,
        projection: &FieldProjection,
        dest: &mut Chain,
    ) -> Result<Vec<usize>> {
        *self.seen_projection.lock().unwrap() = Some(projection.clone());
        let mut data = Vec::new();
        if !src.read_all(&mut data) {
            return Err(RiffleError::DataLoss("payload unreadable".into()));
        }
        let mut limits = Vec::new();
        let mut values = Vec::new();
        for line in data.split(|&b| b == b'\n').take(num_records as usize) {
            values.extend_from_slice(line);
            limits.push(values.len());
        }
        dest.append_slice(&values);
        Ok(limits)
    }
}

// =============================================================================
// Simple Chunk Tests
// =============================================================================

#[test]
fn test_simple_chunk_round_trip_every_compression() {
    let records = sample_records();
    for compressor in all_compressors() {
        let chunk = encode(compressor, &records);
        assert_eq!(chunk.header.chunk_type(), ChunkType::Simple);
        assert_eq!(chunk.header.num_records(), records.len() as u64);
        assert_eq!(
            chunk.header.decoded_data_size(),
            records.iter().map(Vec::len).sum::<usize>() as u64
        );
        chunk.header.verify_data(&chunk.data).unwrap();

        let mut decoder = ChunkDecoder::default();
        assert!(decoder.decode(&chunk), "{compressor:?}: {:?}", decoder.status());
        assert_eq!(decode_all(&mut decoder), records);
        assert!(decoder.healthy());
    }
}

#[test]
fn test_payload_starts_with_compression_tag() {
    for compressor in all_compressors() {
        let chunk = encode(compressor, &[b"abc".to_vec()]);
        let first = chunk.data.to_vec()[0];
        assert_eq!(CompressionType::from_tag(first), Some(compressor.compression_type));
    }
}

#[test]
fn test_simple_decoder_matches_chunk_decoder() {
    let records = sample_records();
    let chunk = encode(CompressorOptions::zstd(3), &records);
    let simple = SimpleDecoder::decode(
        &chunk.data,
        chunk.header.num_records(),
        chunk.header.decoded_data_size(),
    )
    .unwrap();
    let (values, limits) = simple.into_parts();
    assert_eq!(limits.len(), records.len());
    assert_eq!(*limits.last().unwrap(), values.len());
    assert_eq!(values.to_vec(), records.concat());
}

#[test]
fn test_empty_chunk() {
    let chunk = encode(CompressorOptions::snappy(), &[]);
    assert_eq!(chunk.header.num_records(), 0);
    let mut decoder = ChunkDecoder::default();
    assert!(decoder.decode(&chunk));
    assert_eq!(decoder.num_records(), 0);
    assert!(decode_all(&mut decoder).is_empty());
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_header_layout() {
    let chunk = Chunk::new(ChunkType::Simple, Chain::from("payload"), 3, 11);
    let bytes = chunk.header.encode();
    assert_eq!(bytes.len(), CHUNK_HEADER_SIZE);

    let header_crc = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    assert_eq!(header_crc, crc32fast::hash(&bytes[4..]));
    let data_crc = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(data_crc, crc32fast::hash(b"payload"));
    assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 7);
    assert_eq!(bytes[16], b'r');
    assert_eq!(u64::from_le_bytes(bytes[16..24].try_into().unwrap()) >> 8, 3);
    assert_eq!(u64::from_le_bytes(bytes[24..32].try_into().unwrap()), 11);

    assert_eq!(ChunkHeader::decode(&bytes).unwrap(), chunk.header);
}

#[test]
fn test_signature_and_padding_chunks() {
    let signature = Chunk::file_signature();
    assert_eq!(signature.header.data_size(), 0);
    assert_eq!(signature.header.chunk_end(0), CHUNK_HEADER_SIZE as u64);

    let padding = Chunk::padding(100);
    assert_eq!(padding.header.chunk_type(), ChunkType::Padding);
    assert_eq!(padding.header.chunk_end(1000), 1100);

    let mut decoder = ChunkDecoder::default();
    assert!(decoder.decode(&signature));
    assert!(decoder.decode(&padding));
    assert_eq!(decoder.num_records(), 0);
}

#[test]
fn test_unknown_chunk_type_is_rejected() {
    let mut bytes = Chunk::file_signature().header.encode();
    bytes[16] = b'?';
    let crc = crc32fast::hash(&bytes[4..]);
    bytes[0..4].copy_from_slice(&crc.to_le_bytes());
    assert!(ChunkHeader::decode(&bytes).unwrap_err().is_data_loss());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_corrupted_payload_fails_checksum() {
    let chunk = encode(CompressorOptions::snappy(), &sample_records());
    let mut data = chunk.data.to_vec();
    let middle = data.len() / 2;
    data[middle] ^= 0x40;
    let err = chunk.header.verify_data(&Chain::from(data)).unwrap_err();
    assert!(err.is_data_loss());
}

#[test]
fn test_inconsistent_record_count_fails_decoding() {
    let chunk = encode(CompressorOptions::uncompressed(), &[b"a".to_vec(), b"b".to_vec()]);
    let forged = Chunk::new(ChunkType::Simple, chunk.data.clone(), 3, chunk.header.decoded_data_size());
    let mut decoder = ChunkDecoder::default();
    assert!(!decoder.decode(&forged));
    assert!(decoder.status().unwrap_err().is_data_loss());
    assert!(!decoder.recover());

    // A failed decoder is reusable after a successful decode.
    assert!(decoder.decode(&chunk));
    assert_eq!(decode_all(&mut decoder), vec![b"a".to_vec(), b"b".to_vec()]);
}

// =============================================================================
// Transposed Chunk Tests
// =============================================================================

#[test]
fn test_transposed_chunk_uses_installed_decoder() {
    let seen = Arc::new(Mutex::new(None));
    let projection = FieldProjection::fields([FieldPath::from([1]), FieldPath::from([2, 3])]);
    let mut decoder = ChunkDecoder::with_transpose_decoder(
        projection.clone(),
        Box::new(LineDecoder {
            seen_projection: Arc::clone(&seen),
        }),
    );

    let chunk = Chunk::new(ChunkType::Transposed, Chain::from("one\ntwo\nthree"), 3, 11);
    assert!(decoder.decode(&chunk), "{:?}", decoder.status());
    assert_eq!(
        decode_all(&mut decoder),
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    );
    assert_eq!(seen.lock().unwrap().as_ref(), Some(&projection));
}

#[test]
fn test_transposed_record_count_mismatch_is_data_loss() {
    let mut decoder = ChunkDecoder::with_transpose_decoder(
        FieldProjection::all(),
        Box::new(LineDecoder {
            seen_projection: Arc::new(Mutex::new(None)),
        }),
    );
    let chunk = Chunk::new(ChunkType::Transposed, Chain::from("only one"), 2, 8);
    assert!(!decoder.decode(&chunk));
    assert!(decoder.status().unwrap_err().is_data_loss());
}
