//! Tests for writing and reading records

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use riffle::records::BLOCK_SIZE;
use riffle::stream::{FdReader, FdWriter, Reader, SliceReader, VecWriter};
use riffle::{
    BufferOptions, CompressorOptions, Dependency, FlushType, RecordReader, RecordReaderOptions,
    RecordWriter, RecordWriterOptions, RecordsMetadata, RiffleError,
};

use super::{chunk_begins, open, read_all, records, small_chunks, write_file};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: u32,
    name: String,
    tags: Vec<String>,
}

fn entry(id: u32) -> Entry {
    Entry {
        id,
        name: format!("entry-{id}"),
        tags: (0..id % 3).map(|t| format!("tag{t}")).collect(),
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_every_compression() {
    let expected = records(1000);
    for compressor in [
        CompressorOptions::uncompressed(),
        CompressorOptions::brotli(6),
        CompressorOptions::zstd(3),
        CompressorOptions::snappy(),
    ] {
        let (bytes, positions) = write_file(&expected, small_chunks(compressor));
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

        let mut reader = open(bytes, RecordReaderOptions::default());
        assert!(reader.check_file_format());
        assert_eq!(read_all(&mut reader), expected, "{compressor:?}");
        assert_eq!(reader.last_pos(), positions.last().copied());
        assert!(reader.healthy());
        assert!(reader.close());
    }
}

#[test]
fn test_default_options_round_trip() {
    let expected = records(100);
    let (bytes, positions) = write_file(&expected, RecordWriterOptions::default());
    // Everything fits in the default chunk size.
    assert!(positions.iter().all(|pos| pos.chunk_begin() == positions[0].chunk_begin()));

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(read_all(&mut reader), expected);
    assert!(reader.close());
}

#[test]
fn test_single_record() {
    let (bytes, positions) = write_file(&[b"only".to_vec()], RecordWriterOptions::default());
    assert_eq!(positions[0].chunk_begin(), 32);
    assert_eq!(positions[0].record_index(), 0);

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(reader.read_record_bytes().unwrap().as_ref(), b"only");
    assert!(reader.read_record_bytes().is_none());
    assert!(reader.healthy());
}

#[test]
fn test_empty_records_are_split_into_chunks() {
    let expected = vec![Vec::new(); 10_000];
    let (bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::uncompressed()));
    // Each empty record still costs one size byte toward the chunk size.
    let begins = chunk_begins(&positions);
    assert!(begins.len() >= 12, "{} chunks", begins.len());
    assert!(positions.iter().all(|pos| pos.record_index() < 800));

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(read_all(&mut reader).len(), 10_000);
    assert!(reader.close());
}

#[test]
fn test_file_without_records() {
    let (bytes, _) = write_file(&[], RecordWriterOptions::default());
    assert_eq!(bytes.len(), 32);

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert!(reader.check_file_format());
    let mut record = Vec::new();
    assert!(!reader.read_record(&mut record));
    assert!(reader.healthy());
    assert_eq!(reader.last_pos(), None);
    assert!(reader.close());
}

#[test]
fn test_empty_source() {
    let mut reader = open(Vec::new(), RecordReaderOptions::default());
    assert!(!reader.check_file_format());
    assert!(reader.healthy());
    let mut record = Vec::new();
    assert!(!reader.read_record(&mut record));
    assert!(reader.close());
}

#[test]
fn test_not_a_records_file() {
    let mut reader = open(b"this is plain text, not a records file at all".to_vec(), RecordReaderOptions::default());
    assert!(!reader.check_file_format());
    assert!(reader.status().unwrap_err().is_data_loss());
}

#[test]
fn test_chain_records() {
    let mut writer = RecordWriter::new(Dependency::owned(VecWriter::owned()), RecordWriterOptions::default());
    let mut chain = riffle::Chain::from("split ");
    chain.append_slice(b"record");
    assert!(writer.write_record_chain(&chain));
    assert!(writer.close());
    let bytes = writer.dest().dest().clone();

    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut read = riffle::Chain::new();
    assert!(reader.read_record_chain(&mut read));
    assert_eq!(read.to_vec(), b"split record");
}

#[test]
fn test_truncated_file_fails_on_close() {
    let expected = records(200);
    let (mut bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::snappy()));
    bytes.truncate(bytes.len() - 5);
    let last_chunk = positions.last().unwrap().chunk_begin();

    let mut reader = open(bytes, RecordReaderOptions::default());
    let read = read_all(&mut reader);
    let complete = positions.iter().filter(|pos| pos.chunk_begin() < last_chunk).count();
    assert_eq!(read, expected[..complete]);
    assert!(reader.healthy());
    assert!(!reader.close());
    assert!(reader.status().unwrap_err().is_data_loss());
}

// =============================================================================
// Metadata Tests
// =============================================================================

#[test]
fn test_metadata_round_trip() {
    let metadata = RecordsMetadata::default()
        .with_file_comment("written by the round trip test")
        .with_record_type_name("test.Entry")
        .with_attribute("owner", "storage");
    let options = RecordWriterOptions::builder()
        .compressor(CompressorOptions::brotli(5))
        .metadata(metadata.clone())
        .build();
    let expected = records(10);
    let (bytes, _) = write_file(&expected, options);

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(reader.read_metadata(), Some(metadata));
    assert_eq!(read_all(&mut reader), expected);
    assert!(reader.close());
}

#[test]
fn test_missing_metadata_is_default() {
    let (bytes, _) = write_file(&records(3), RecordWriterOptions::default());
    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(reader.read_serialized_metadata().map(|chain| chain.len()), Some(0));

    let (bytes, _) = write_file(&records(3), RecordWriterOptions::default());
    let mut reader = open(bytes, RecordReaderOptions::default());
    let metadata = reader.read_metadata().unwrap();
    assert!(metadata.is_empty());
    assert_eq!(read_all(&mut reader), records(3));
}

#[test]
fn test_metadata_only_at_file_start() {
    let (bytes, _) = write_file(&records(3), RecordWriterOptions::default());
    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut record = Vec::new();
    assert!(reader.read_record(&mut record));
    assert_eq!(reader.read_metadata(), None);
    assert!(matches!(reader.status(), Err(RiffleError::FailedPrecondition(_))));
}

// =============================================================================
// Message Tests
// =============================================================================

#[test]
fn test_messages_round_trip() {
    let mut writer = RecordWriter::new(Dependency::owned(VecWriter::owned()), small_chunks(CompressorOptions::zstd(3)));
    for id in 0..300 {
        assert!(writer.write_message(&entry(id)));
    }
    assert!(writer.close());
    let bytes = writer.dest().dest().clone();

    let mut reader = open(bytes, RecordReaderOptions::default());
    for id in 0..300 {
        assert_eq!(reader.read_message::<Entry>(), Some(entry(id)));
    }
    assert_eq!(reader.read_message::<Entry>(), None);
    assert!(reader.healthy());
}

// =============================================================================
// Writer Behavior Tests
// =============================================================================

#[test]
fn test_pad_to_block_boundary() {
    let options = RecordWriterOptions::builder()
        .compressor(CompressorOptions::snappy())
        .pad_to_block_boundary(true)
        .build();
    let mut writer = RecordWriter::new(Dependency::owned(VecWriter::owned()), options);
    for record in records(5) {
        assert!(writer.write_record(&record));
    }
    assert!(writer.flush(FlushType::FromObject));
    let flushed = writer.dest().dest().len() as u64;
    assert_eq!(flushed % BLOCK_SIZE, 0);
    assert_eq!(writer.pos().chunk_begin(), flushed);
    assert_eq!(writer.pos().record_index(), 0);

    for record in records(8).into_iter().skip(5) {
        assert!(writer.write_record(&record));
    }
    assert!(writer.close());
    let bytes = writer.dest().dest().clone();
    assert_eq!(bytes.len() as u64 % BLOCK_SIZE, 0);

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert_eq!(read_all(&mut reader), records(8));
    assert!(reader.close());
}

#[test]
fn test_append_to_existing_file() {
    let (bytes, _) = write_file(&records(3), RecordWriterOptions::default());
    let existing = bytes.len() as u64;

    let mut writer = RecordWriter::new(
        Dependency::owned(VecWriter::new(Dependency::owned(bytes))),
        RecordWriterOptions::default(),
    );
    assert_eq!(writer.pos().chunk_begin(), existing);
    let more: Vec<Vec<u8>> = (100..104).map(super::record).collect();
    for record in &more {
        assert!(writer.write_record(record));
    }
    assert!(writer.close());
    let bytes = writer.dest().dest().clone();

    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut expected = records(3);
    expected.extend(more);
    assert_eq!(read_all(&mut reader), expected);
    assert!(reader.close());
}

#[test]
fn test_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.riffle");
    let expected = records(2000);

    {
        let dest = FdWriter::create(&path, BufferOptions::default()).unwrap();
        let mut writer = RecordWriter::new(Dependency::owned(dest), small_chunks(CompressorOptions::zstd(3)));
        for record in &expected {
            assert!(writer.write_record(record));
        }
        assert!(writer.close(), "{:?}", writer.status());
    }

    let src = FdReader::open(&path, BufferOptions::default()).unwrap();
    let mut reader = RecordReader::new(Dependency::owned(src), RecordReaderOptions::default());
    assert!(reader.supports_random_access());
    assert_eq!(reader.size().unwrap(), std::fs::metadata(&path).unwrap().len());
    let mut record = Vec::new();
    for want in &expected {
        assert!(reader.read_record(&mut record));
        assert_eq!(&record, want);
    }
    assert!(!reader.read_record(&mut record));
    assert!(reader.close());
}

#[test]
fn test_borrowed_source_outlives_reader() {
    let (bytes, _) = write_file(&records(4), RecordWriterOptions::default());
    let mut src = SliceReader::new(bytes);
    {
        let mut reader = RecordReader::borrowed(&mut src, RecordReaderOptions::default());
        let mut record = Vec::new();
        assert!(reader.read_record(&mut record));
        assert!(reader.close());
    }
    assert!(src.healthy());
}
