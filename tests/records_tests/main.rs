//! Tests for records files
//!
//! These tests verify:
//! - Records written under every compression type read back in order
//! - File metadata, appending, block padding and file-backed storage
//! - Record positions: reporting, seeking and numeric seeking
//! - Recovery from corrupted chunks, headers and unparsable messages

mod position_tests;
mod recovery_tests;
mod round_trip_tests;

use std::collections::BTreeSet;

use riffle::stream::{SliceReader, VecWriter};
use riffle::{
    CompressorOptions, Dependency, RecordPosition, RecordReader, RecordReaderOptions, RecordWriter,
    RecordWriterOptions,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn record(i: usize) -> Vec<u8> {
    let mut record = format!("record {i:05} ").into_bytes();
    record.extend(std::iter::repeat(b'a' + (i % 26) as u8).take(i % 50));
    record
}

fn records(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(record).collect()
}

/// Options producing chunks of roughly 20 records.
fn small_chunks(compressor: CompressorOptions) -> RecordWriterOptions {
    RecordWriterOptions::builder()
        .compressor(compressor)
        .chunk_size(800)
        .build()
}

/// Writes `records` to memory, returning the file and each record's position.
fn write_file(records: &[Vec<u8>], options: RecordWriterOptions) -> (Vec<u8>, Vec<RecordPosition>) {
    let mut writer = RecordWriter::new(Dependency::owned(VecWriter::owned()), options);
    let mut positions = Vec::with_capacity(records.len());
    for record in records {
        assert!(writer.write_record(record), "{:?}", writer.status());
        positions.push(writer.last_pos().unwrap());
    }
    assert!(writer.close(), "{:?}", writer.status());
    (writer.dest().dest().clone(), positions)
}

fn open(bytes: Vec<u8>, options: RecordReaderOptions) -> RecordReader<'static, SliceReader> {
    RecordReader::new(Dependency::owned(SliceReader::new(bytes)), options)
}

fn read_all(reader: &mut RecordReader<'_, SliceReader>) -> Vec<Vec<u8>> {
    let mut all = Vec::new();
    let mut record = Vec::new();
    while reader.read_record(&mut record) {
        all.push(record.clone());
    }
    all
}

/// Distinct chunk beginnings, in file order.
fn chunk_begins(positions: &[RecordPosition]) -> Vec<u64> {
    positions
        .iter()
        .map(RecordPosition::chunk_begin)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
