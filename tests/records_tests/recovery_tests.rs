//! Tests for recovery from corrupted files

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use riffle::chunk::{Chunk, ChunkHeader, ChunkType};
use riffle::stream::{IoReader, VecWriter};
use riffle::{
    BufferOptions, Chain, CompressorOptions, Dependency, RecordReader, RecordReaderOptions,
    RecordWriter, RecordWriterOptions, RecordsMetadata, SkippedRegion,
};

use super::{chunk_begins, open, read_all, records, small_chunks, write_file};

// =============================================================================
// Helper Functions
// =============================================================================

/// Records split into chunks, with the chunk at `victim` (an index into the
/// record chunks) about to be damaged.
struct Damaged {
    bytes: Vec<u8>,
    expected: Vec<Vec<u8>>,
    begins: Vec<u64>,
    victim: usize,
}

impl Damaged {
    fn new(victim: usize) -> Self {
        let all = records(300);
        let (bytes, positions) = write_file(&all, small_chunks(CompressorOptions::snappy()));
        let begins = chunk_begins(&positions);
        assert!(begins.len() > victim + 1);
        let expected = all
            .into_iter()
            .zip(&positions)
            .filter(|(_, pos)| pos.chunk_begin() != begins[victim])
            .map(|(record, _)| record)
            .collect();
        Self {
            bytes,
            expected,
            begins,
            victim,
        }
    }

    /// Flips a byte of the victim chunk at `offset` from its beginning.
    fn flip(mut self, offset: u64) -> Self {
        let at = (self.begins[self.victim] + offset) as usize;
        self.bytes[at] ^= 0x55;
        self
    }

    fn region(&self) -> (u64, u64) {
        (self.begins[self.victim], self.begins[self.victim + 1])
    }
}

fn collecting_options() -> (RecordReaderOptions, Arc<Mutex<Vec<SkippedRegion>>>) {
    let regions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&regions);
    let options = RecordReaderOptions::builder()
        .recovery(move |region| {
            sink.lock().unwrap().push(region.clone());
            true
        })
        .build();
    (options, regions)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: u32,
    value: f64,
}

// =============================================================================
// Corrupted Chunk Tests
// =============================================================================

#[test]
fn test_corrupted_payload_is_skipped_by_callback() {
    let damaged = Damaged::new(3).flip(40);
    let (options, regions) = collecting_options();

    let mut reader = open(damaged.bytes.clone(), options);
    assert_eq!(read_all(&mut reader), damaged.expected);
    assert!(reader.healthy());
    assert!(reader.close());

    let regions = regions.lock().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!((regions[0].begin, regions[0].end), damaged.region());
    assert!(!regions[0].message.is_empty());
}

#[test]
fn test_corrupted_header_is_resynchronized() {
    let damaged = Damaged::new(2).flip(9);
    let (options, regions) = collecting_options();

    let mut reader = open(damaged.bytes.clone(), options);
    assert_eq!(read_all(&mut reader), damaged.expected);
    assert!(reader.close());

    let regions = regions.lock().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!((regions[0].begin, regions[0].end), damaged.region());
}

#[test]
fn test_manual_recover_without_callback() {
    let damaged = Damaged::new(1).flip(50);
    let mut reader = open(damaged.bytes.clone(), RecordReaderOptions::default());

    let before = read_all(&mut reader);
    assert!(!reader.healthy());
    assert!(reader.status().unwrap_err().is_data_loss());

    let region = reader.recover().unwrap();
    assert_eq!((region.begin, region.end), damaged.region());
    assert!(reader.healthy());
    assert!(reader.recover().is_none());

    let mut all = before;
    all.extend(read_all(&mut reader));
    assert_eq!(all, damaged.expected);
    assert!(reader.close());
}

#[test]
fn test_callback_can_refuse_recovery() {
    let damaged = Damaged::new(2).flip(40);
    let options = RecordReaderOptions::builder().recovery(|_| false).build();
    let mut reader = open(damaged.bytes, options);

    read_all(&mut reader);
    assert!(!reader.healthy());
    assert!(reader.status().unwrap_err().is_data_loss());
}

#[test]
fn test_seek_into_corrupted_chunk_recovers() {
    let damaged = Damaged::new(2).flip(40);
    let (victim_begin, next_begin) = damaged.region();
    let (options, regions) = collecting_options();
    let mut reader = open(damaged.bytes.clone(), options);

    assert!(reader.seek(riffle::RecordPosition::new(victim_begin, 3)));
    assert_eq!(reader.pos().chunk_begin(), next_begin);
    assert_eq!(regions.lock().unwrap().len(), 1);
    let mut record = Vec::new();
    assert!(reader.read_record(&mut record));
}

#[test]
fn test_corrupted_metadata_chunk() {
    let options = RecordWriterOptions::builder()
        .compressor(CompressorOptions::snappy())
        .metadata(RecordsMetadata::default().with_file_comment("damaged below"))
        .build();
    let (mut bytes, positions) = write_file(&records(20), options);
    let first_records_chunk = positions[0].chunk_begin();
    bytes[32 + 34] ^= 0x55;

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(reader.read_metadata(), None);
    assert!(reader.status().unwrap_err().is_data_loss());

    let region = reader.recover().unwrap();
    assert_eq!((region.begin, region.end), (32, first_records_chunk));
    assert_eq!(read_all(&mut reader), records(20));
}

#[test]
fn test_forged_data_size_on_sequential_source() {
    let signature = Chunk::file_signature();
    let mut bytes = signature.header.encode().to_vec();

    let mut header = ChunkHeader::new(ChunkType::Simple, &Chain::new(), 1, 1).encode();
    header[8..16].copy_from_slice(&(1u64 << 36).to_le_bytes());
    let header_crc = crc32fast::hash(&header[4..]);
    header[..4].copy_from_slice(&header_crc.to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&[0u8; 100]);

    let src = IoReader::new(Cursor::new(bytes), BufferOptions::default());
    let mut reader = RecordReader::new(Dependency::owned(src), RecordReaderOptions::default());
    let mut record = Vec::new();
    assert!(!reader.read_record(&mut record));
    assert!(reader.healthy());
    assert!(!reader.close());
    assert!(reader.status().unwrap_err().is_data_loss());
}

// =============================================================================
// Unparsable Message Tests
// =============================================================================

#[test]
fn test_unparsable_message_is_skipped() {
    let mut writer = RecordWriter::new(Dependency::owned(VecWriter::owned()), RecordWriterOptions::default());
    let mut positions = Vec::new();
    for sensor in 0..6 {
        if sensor == 2 {
            assert!(writer.write_record(b"?"));
        } else {
            assert!(writer.write_message(&Reading { sensor, value: f64::from(sensor) / 2.0 }));
        }
        positions.push(writer.last_pos().unwrap());
    }
    assert!(writer.close());
    let bytes = writer.dest().dest().clone();

    let (options, regions) = collecting_options();
    let mut reader = open(bytes, options);
    let mut sensors = Vec::new();
    while let Some(reading) = reader.read_message::<Reading>() {
        sensors.push(reading.sensor);
    }
    assert!(reader.healthy());
    assert_eq!(sensors, vec![0, 1, 3, 4, 5]);

    let regions = regions.lock().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].begin, positions[2].numeric());
    assert_eq!(regions[0].end, positions[3].numeric());
    assert_eq!(regions[0].end - regions[0].begin, 1);
}

#[test]
fn test_unparsable_last_message_region_reaches_chunk_end() {
    let mut writer = RecordWriter::new(Dependency::owned(VecWriter::owned()), RecordWriterOptions::default());
    let mut positions = Vec::new();
    for sensor in 0..3 {
        assert!(writer.write_message(&Reading { sensor, value: 1.0 }));
        positions.push(writer.last_pos().unwrap());
    }
    assert!(writer.write_record(b"?"));
    positions.push(writer.last_pos().unwrap());
    assert!(writer.close());
    let bytes = writer.dest().dest().clone();
    let file_end = bytes.len() as u64;

    let (options, regions) = collecting_options();
    let mut reader = open(bytes, options);
    let mut count = 0;
    while reader.read_message::<Reading>().is_some() {
        count += 1;
    }
    assert_eq!(count, 3);
    assert!(reader.healthy());
    assert_eq!(reader.pos().numeric(), file_end);

    let regions = regions.lock().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].begin, positions[3].numeric());
    assert_eq!(regions[0].end, file_end);
}
