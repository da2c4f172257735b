//! Tests for Readers

use std::io::{self, Cursor, Read};

use bytes::Bytes;
use riffle::stream::{
    ChainReader, IoReader, LimitingReader, Reader, ReaderBase, SliceReader, VecWriter, Writer,
};
use riffle::{BufferOptions, Chain, Dependency, RiffleError};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A chain whose blocks are split at uneven boundaries
fn fragmented_chain(data: &[u8]) -> Chain {
    let mut chain = Chain::new();
    let mut rest = data;
    let mut piece = 1;
    while !rest.is_empty() {
        let take = piece.min(rest.len());
        chain.append_slice(&rest[..take]);
        rest = &rest[take..];
        piece = piece * 2 + 1;
    }
    chain
}

fn check_pull_guarantee<R: Reader>(reader: &mut R, total: usize) {
    for n in [1, 3, 17, 100, total] {
        assert!(reader.pull(n, 0), "pull({n}) failed");
        assert!(reader.available() >= n);
    }
    assert!(!reader.pull(total + 1, 0));
    assert!(reader.healthy());
}

// =============================================================================
// Pull Tests
// =============================================================================

#[test]
fn test_pull_guarantee_slice_reader() {
    let data = sample(500);
    let mut reader = SliceReader::new(data);
    check_pull_guarantee(&mut reader, 500);
}

#[test]
fn test_pull_guarantee_across_chain_blocks() {
    let data = sample(500);
    let mut reader = ChainReader::owned(fragmented_chain(&data));
    check_pull_guarantee(&mut reader, 500);
    let mut out = vec![0u8; 500];
    assert!(reader.read(&mut out));
    assert_eq!(out, data);
}

#[test]
fn test_pull_guarantee_with_small_buffers() {
    let data = sample(500);
    let options = BufferOptions::default().with_buffer_size(7);
    let mut reader = IoReader::new(Cursor::new(data.clone()), options);
    check_pull_guarantee(&mut reader, 500);
    let mut out = Vec::new();
    assert!(reader.read_all(&mut out));
    assert_eq!(out, data);
}

/// Serves `data` in one buffer and remembers the lengths `pull_slow` saw
struct RecordingReader {
    base: ReaderBase,
    data: Vec<u8>,
    requests: Vec<(usize, usize)>,
}

impl RecordingReader {
    fn new(data: Vec<u8>) -> Self {
        Self { base: ReaderBase::new(), data, requests: Vec::new() }
    }
}

impl Reader for RecordingReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn pull_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        self.requests.push((min_length, recommended_length));
        if self.base.start_pos() > 0 || self.base.available() > 0 {
            return false;
        }
        let data = Bytes::from(std::mem::take(&mut self.data));
        self.base.set_buffer(data, 0);
        self.base.available() >= min_length
    }
}

#[test]
fn test_pull_raises_recommended_length_to_min_length() {
    let mut reader = RecordingReader::new(sample(100));
    assert!(reader.pull(40, 0));
    assert_eq!(reader.requests, vec![(40, 40)]);
    assert!(reader.available() >= 40);

    let mut reader = RecordingReader::new(sample(100));
    assert!(reader.pull(40, 90));
    assert_eq!(reader.requests, vec![(40, 90)]);
}

#[test]
fn test_large_recommended_length_does_not_grow_buffer() {
    let data = sample(5000);
    let options = BufferOptions::default().with_buffer_size(64);
    let mut reader = IoReader::new(Cursor::new(data.clone()), options);
    assert!(reader.pull(1, usize::MAX / 2));
    assert!(reader.available() <= 64);

    let mut chain = Chain::new();
    assert!(reader.read_to_chain(5000, &mut chain));
    assert_eq!(chain.to_vec(), data);
    assert!(!reader.read_to_chain(1 << 40, &mut chain));
    assert!(reader.healthy());
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_past_end_clamps() {
    let mut reader = SliceReader::new(sample(10));
    assert!(!reader.seek(20));
    assert!(reader.healthy());
    assert_eq!(reader.pos(), 10);
    assert!(reader.seek(3));
    assert_eq!(reader.read_byte(), Some(3));
}

#[test]
fn test_seek_is_idempotent() {
    let data = sample(300);
    let mut reader = ChainReader::owned(fragmented_chain(&data));
    for _ in 0..2 {
        assert!(reader.seek(200));
        assert_eq!(reader.pos(), 200);
    }
    assert_eq!(reader.read_byte(), Some(data[200]));
}

#[test]
fn test_forward_seek_on_sequential_source() {
    let data = sample(1000);
    let options = BufferOptions::default().with_buffer_size(64);
    let mut reader = IoReader::new(Cursor::new(data.clone()), options);
    assert!(!reader.supports_random_access());
    assert!(reader.seek(700));
    assert_eq!(reader.read_byte(), Some(data[700]));
    assert!(!reader.seek(5000));
    assert!(reader.healthy());
    assert_eq!(reader.pos(), 1000);
}

#[test]
fn test_size_unsupported_is_not_fatal() {
    let mut reader = IoReader::new(Cursor::new(sample(10)), BufferOptions::default());
    assert!(reader.size().unwrap_err().is_unimplemented());
    assert!(reader.healthy());
    assert_eq!(reader.read_byte(), Some(0));
}

// =============================================================================
// Copy Tests
// =============================================================================

#[test]
fn test_copy_to_writer() {
    let data = sample(5000);
    let mut reader = ChainReader::owned(fragmented_chain(&data));
    let mut dest = VecWriter::owned();
    assert!(reader.copy_to(3000, &mut dest));
    assert!(!reader.copy_to(3000, &mut dest));
    assert!(reader.healthy());
    assert!(dest.close());
    assert_eq!(dest.dest().as_slice(), data.as_slice());
}

// =============================================================================
// LimitingReader Tests
// =============================================================================

#[test]
fn test_limiting_reader_stops_at_limit() {
    let data = sample(100);
    let mut src = SliceReader::new(data.clone());
    {
        let mut limited = LimitingReader::borrowed(&mut src, Some(40));
        let mut out = Vec::new();
        assert!(limited.read_all(&mut out));
        assert_eq!(out, &data[..40]);
        assert!(!limited.pull(1, 0));
        assert!(limited.healthy());
        assert!(!limited.seek(60));
        assert_eq!(limited.pos(), 40);
        assert!(limited.close());
    }
    assert_eq!(src.pos(), 40);
    assert_eq!(src.read_byte(), Some(data[40]));
}

#[test]
fn test_limiting_reader_with_length_from_current_position() {
    let data = sample(100);
    let mut src = SliceReader::new(data.clone());
    assert!(src.seek(10));
    let mut limited = LimitingReader::with_length(Dependency::owned(src), 5);
    let mut out = Vec::new();
    assert!(limited.read_all(&mut out));
    assert_eq!(out, &data[10..15]);
}

// =============================================================================
// Host Stream Tests
// =============================================================================

struct FailingRead;

impl Read for FailingRead {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "host stream broke"))
    }
}

#[test]
fn test_host_error_without_cause_is_unknown() {
    let mut reader = IoReader::new(FailingRead, BufferOptions::default());
    assert!(!reader.pull(1, 0));
    assert!(!reader.healthy());
    assert!(matches!(reader.status(), Err(RiffleError::Unknown(_))));
}

#[test]
fn test_file_reader_random_access() {
    use std::io::Write;

    let data = sample(200_000);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let mut reader = riffle::stream::FdReader::open(file.path(), BufferOptions::default()).unwrap();
    assert!(reader.supports_random_access());
    assert_eq!(reader.size().unwrap(), 200_000);
    assert!(reader.seek(150_000));
    assert_eq!(reader.read_byte(), Some(data[150_000]));
    assert!(reader.seek(5));
    assert_eq!(reader.read_byte(), Some(data[5]));
    assert!(!reader.seek(300_000));
    assert!(reader.healthy());
    assert!(reader.close());
}
