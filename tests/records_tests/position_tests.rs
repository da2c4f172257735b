//! Tests for record positions and seeking

use riffle::{CompressorOptions, RecordPosition, RecordReaderOptions};

use super::{chunk_begins, open, records, small_chunks, write_file};

// =============================================================================
// Position Reporting Tests
// =============================================================================

#[test]
fn test_pos_follows_reading() {
    let expected = records(300);
    let (bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::snappy()));
    let file_len = bytes.len() as u64;

    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut record = Vec::new();
    for (i, want) in positions.iter().enumerate() {
        assert!(reader.read_record(&mut record));
        assert_eq!(reader.last_pos(), Some(*want));
        match positions.get(i + 1) {
            Some(next) => assert_eq!(reader.pos(), *next),
            None => assert_eq!(reader.pos(), RecordPosition::new(file_len, 0)),
        }
    }
}

#[test]
fn test_numeric_positions_are_distinct() {
    let (_, positions) = write_file(&records(500), small_chunks(CompressorOptions::zstd(3)));
    assert!(chunk_begins(&positions).len() > 5);
    let numeric: Vec<u64> = positions.iter().map(RecordPosition::numeric).collect();
    assert!(numeric.windows(2).all(|pair| pair[0] < pair[1]));
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_to_recorded_positions() {
    let expected = records(400);
    let (bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::brotli(4)));
    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut record = Vec::new();

    // Backwards, forwards, and within the same chunk.
    let order: Vec<usize> = (0..expected.len()).rev().step_by(7).chain((0..expected.len()).step_by(13)).chain([5, 6, 4]).collect();
    for i in order {
        assert!(reader.seek(positions[i]), "seek to {}", positions[i]);
        assert!(reader.read_record(&mut record));
        assert_eq!(record, expected[i], "record {i}");
        assert_eq!(reader.last_pos(), Some(positions[i]));
    }
    assert!(reader.close());
}

#[test]
fn test_seek_numeric_to_recorded_positions() {
    let expected = records(400);
    let (bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::snappy()));
    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut record = Vec::new();

    for i in (0..expected.len()).rev().step_by(11).chain([0, 1, 399]) {
        assert!(reader.seek_numeric(positions[i].numeric()));
        assert!(reader.read_record(&mut record));
        assert_eq!(record, expected[i], "record {i}");
    }
}

#[test]
fn test_seek_numeric_between_records() {
    let expected = records(100);
    let (bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::snappy()));
    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut record = Vec::new();

    // Inside the signature chunk: the first record follows.
    assert!(reader.seek_numeric(3));
    assert!(reader.read_record(&mut record));
    assert_eq!(record, expected[0]);

    // Past the last record of a chunk but inside its bytes: the first
    // record of the next chunk follows.
    let begins = chunk_begins(&positions);
    let in_chunk = positions.iter().filter(|pos| pos.chunk_begin() == begins[1]).count() as u64;
    let first_of_next = positions.iter().position(|pos| pos.chunk_begin() == begins[2]).unwrap();
    assert!(reader.seek_numeric(begins[1] + in_chunk + 1));
    assert!(reader.read_record(&mut record));
    assert_eq!(record, expected[first_of_next]);
}

#[test]
fn test_seek_index_past_chunk_end_moves_to_next_chunk() {
    let expected = records(100);
    let (bytes, positions) = write_file(&expected, small_chunks(CompressorOptions::snappy()));
    let begins = chunk_begins(&positions);
    let first_of_next = positions.iter().position(|pos| pos.chunk_begin() == begins[1]).unwrap();

    let mut reader = open(bytes, RecordReaderOptions::default());
    assert!(reader.seek(RecordPosition::new(begins[0], 10_000)));
    assert_eq!(reader.pos(), RecordPosition::new(begins[1], 0));
    let mut record = Vec::new();
    assert!(reader.read_record(&mut record));
    assert_eq!(record, expected[first_of_next]);
}

#[test]
fn test_seek_past_end() {
    let (bytes, _) = write_file(&records(50), small_chunks(CompressorOptions::snappy()));
    let file_len = bytes.len() as u64;
    let mut reader = open(bytes, RecordReaderOptions::default());
    let mut record = Vec::new();

    assert!(!reader.seek(RecordPosition::new(file_len + 1000, 0)));
    assert!(reader.healthy());
    assert_eq!(reader.pos(), RecordPosition::new(file_len, 0));
    assert!(!reader.read_record(&mut record));
    assert!(reader.healthy());

    assert!(reader.seek(RecordPosition::new(file_len, 0)));
    assert!(!reader.read_record(&mut record));

    assert!(!reader.seek_numeric(file_len + 1000));
    assert!(reader.healthy());

    // Seeking back after reaching the end works.
    assert!(reader.seek_numeric(0));
    assert!(reader.read_record(&mut record));
    assert_eq!(record, super::record(0));
}

#[test]
fn test_position_text_and_byte_forms() {
    let (_, positions) = write_file(&records(60), small_chunks(CompressorOptions::snappy()));
    for pos in positions {
        assert_eq!(pos.to_string().parse::<RecordPosition>().unwrap(), pos);
        assert_eq!(RecordPosition::from_bytes(&pos.to_bytes()).unwrap(), pos);
    }
}
