//! Tests for Writers

use bytes::Bytes;
use riffle::stream::{
    ArrayWriter, BackwardWriter, ChainBackwardWriter, ChainWriter, FdReader, FdWriter, IoWriter,
    LimitingWriter, Reader, VecWriter,
};
use riffle::{BufferOptions, Chain, FlushType, RiffleError, Writer};

// =============================================================================
// Helper Functions
// =============================================================================

/// Writes the same mix of pieces through every write entry point and
/// returns what the output must equal.
fn write_mixed<W: Writer>(writer: &mut W) -> Vec<u8> {
    let mut expected = Vec::new();

    assert!(writer.write(b"small"));
    expected.extend_from_slice(b"small");

    assert!(writer.write_byte(b'!'));
    expected.push(b'!');

    let large: Vec<u8> = (0..10_000u32).map(|i| (i % 97) as u8).collect();
    assert!(writer.write(&large));
    expected.extend_from_slice(&large);

    let owned = Bytes::from(vec![9u8; 3000]);
    assert!(writer.write_bytes(owned.clone()));
    expected.extend_from_slice(&owned);

    let mut chain = Chain::from("chain-");
    chain.append_slice(b"blocks");
    assert!(writer.write_chain(&chain));
    expected.extend_from_slice(b"chain-blocks");

    assert!(writer.write_zeros(70_000));
    expected.resize(expected.len() + 70_000, 0);

    assert!(writer.write_vec(b"tail".to_vec()));
    expected.extend_from_slice(b"tail");

    assert_eq!(writer.pos(), expected.len() as u64);
    expected
}

// =============================================================================
// Concatenation Tests
// =============================================================================

#[test]
fn test_chain_writer_output_is_concatenation() {
    let mut writer = ChainWriter::owned();
    let expected = write_mixed(&mut writer);
    assert!(writer.close());
    assert_eq!(writer.dest().to_vec(), expected);
}

#[test]
fn test_vec_writer_output_is_concatenation() {
    let mut writer = VecWriter::owned();
    let expected = write_mixed(&mut writer);
    assert!(writer.close());
    assert_eq!(writer.dest(), &expected);
}

#[test]
fn test_io_writer_output_is_concatenation() {
    let options = BufferOptions::default().with_buffer_size(1000);
    let mut writer = IoWriter::new(Vec::new(), options);
    let expected = write_mixed(&mut writer);
    assert!(writer.flush(FlushType::FromProcess));
    assert_eq!(writer.sink().get_ref(), &expected);
    assert!(writer.close());
}

#[test]
fn test_file_writer_then_reader() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("stream.bin");

    let mut writer = FdWriter::create(&path, BufferOptions::default()).unwrap();
    let expected = write_mixed(&mut writer);
    assert!(writer.flush(FlushType::FromMachine));
    assert!(writer.close());

    let mut reader = FdReader::open(&path, BufferOptions::default()).unwrap();
    let mut out = Vec::new();
    assert!(reader.read_all(&mut out));
    assert_eq!(out, expected);
    assert!(reader.close());
}

#[test]
fn test_file_append_continues_positions() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("append.bin");

    let mut writer = FdWriter::create(&path, BufferOptions::default()).unwrap();
    assert!(writer.write(b"head-"));
    assert!(writer.close());

    let mut writer = FdWriter::append(&path, BufferOptions::default()).unwrap();
    assert_eq!(writer.pos(), 5);
    assert!(writer.write(b"tail"));
    assert!(!writer.seek(0));
    assert!(writer.healthy());
    assert!(writer.close());

    assert_eq!(std::fs::read(&path).unwrap(), b"head-tail");
}

// =============================================================================
// Truncate and Seek Tests
// =============================================================================

#[test]
fn test_chain_writer_truncate_discards_suffix() {
    let mut writer = ChainWriter::owned();
    assert!(writer.supports_truncate());
    assert!(writer.write(b"hello world"));
    assert!(writer.truncate(5));
    assert_eq!(writer.pos(), 5);
    assert_eq!(writer.size().unwrap(), 5);
    assert!(writer.write(b"!"));
    assert!(writer.close());
    assert_eq!(writer.dest().to_vec(), b"hello!");
}

#[test]
fn test_vec_writer_truncate_past_end_fails_softly() {
    let mut writer = VecWriter::owned();
    assert!(writer.write(b"abc"));
    assert!(!writer.truncate(10));
    assert!(writer.healthy());
    assert!(writer.close());
    assert_eq!(writer.dest(), b"abc");
}

// =============================================================================
// Limit Tests
// =============================================================================

#[test]
fn test_limiting_writer_fails_past_limit() {
    let mut dest = ChainWriter::owned();
    {
        let mut limited = LimitingWriter::borrowed(&mut dest, Some(5));
        assert!(limited.write(b"abc"));
        assert!(!limited.write(b"def"));
        assert!(matches!(limited.status(), Err(RiffleError::Overflow(_))));
    }
    assert!(dest.healthy());
}

#[test]
fn test_limiting_writer_passes_through_below_limit() {
    let mut dest = ChainWriter::owned();
    {
        let mut limited = LimitingWriter::borrowed(&mut dest, Some(100));
        assert!(limited.write(b"abc"));
        assert!(limited.write(b"def"));
        assert_eq!(limited.pos(), 6);
        assert!(limited.close());
    }
    assert!(dest.close());
    assert_eq!(dest.dest().to_vec(), b"abcdef");
}

#[test]
fn test_array_writer_reports_destination_full() {
    let mut storage = [0u8; 6];
    let mut writer = ArrayWriter::new(&mut storage);
    assert!(writer.write(b"abc"));
    assert!(!writer.write(b"defg"));
    assert!(matches!(writer.status(), Err(RiffleError::Overflow(_))));
}

// =============================================================================
// Backward Writer Tests
// =============================================================================

#[test]
fn test_backward_writer_prepends_pieces() {
    let mut writer = ChainBackwardWriter::owned();
    assert!(writer.write(b"!"));
    assert!(writer.write_chain(&Chain::from("world")));
    assert!(writer.write(b"hello "));
    assert_eq!(writer.pos(), 12);
    assert!(writer.close());
    assert_eq!(writer.dest().to_vec(), b"hello world!");
}
