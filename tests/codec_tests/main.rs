//! Tests for compression codecs
//!
//! These tests verify:
//! - Every codec writer produces output its reader decodes unchanged
//! - Framed Snappy output matches the wire format byte for byte
//! - Truncated or corrupted compressed streams surface as data loss
//! - Codec filters leave the wrapped stream usable when borrowed

use riffle::codec::{
    masked_crc32c, BrotliReader, BrotliWriter, FramedSnappyReader, FramedSnappyWriter, ZlibReader,
    ZlibWriter, ZstdReader, ZstdWriter, DEFAULT_BROTLI_LEVEL, DEFAULT_ZLIB_LEVEL,
    DEFAULT_ZSTD_LEVEL, FRAMED_SNAPPY_STREAM_ID,
};
use riffle::config::ZlibHeader;
use riffle::stream::{ChainReader, ChainWriter, Reader, SliceReader, VecWriter};
use riffle::{BufferOptions, Chain, Dependency, FlushType, Writer};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample(len: usize) -> Vec<u8> {
    let text = b"the quick brown fox jumps over the lazy dog ";
    let mut data: Vec<u8> = text.iter().copied().cycle().take(len).collect();
    // Some incompressible noise so both frame kinds appear.
    let mut state = 0x2545_f491_u32;
    for byte in data.iter_mut().skip(len / 2).take(len / 4) {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        *byte = state as u8;
    }
    data
}

fn write_with<W: Writer>(writer: &mut W, data: &[u8]) {
    for piece in data.chunks(7919) {
        assert!(writer.write(piece));
    }
}

fn read_all<R: Reader>(reader: &mut R) -> Vec<u8> {
    let mut out = Vec::new();
    assert!(reader.read_all(&mut out));
    out
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_zlib_round_trip() {
    let data = sample(300_000);
    for header in [ZlibHeader::Zlib, ZlibHeader::Raw] {
        let mut compressed = Chain::new();
        {
            let mut writer = ZlibWriter::new(
                Dependency::owned(ChainWriter::borrowed(&mut compressed)),
                DEFAULT_ZLIB_LEVEL,
                header,
                BufferOptions::default(),
            );
            write_with(&mut writer, &data);
            assert!(writer.close());
        }
        assert!(compressed.len() < data.len());

        let mut reader = ZlibReader::new(
            Dependency::owned(ChainReader::owned(compressed)),
            header,
            BufferOptions::default(),
        );
        assert_eq!(read_all(&mut reader), data);
        assert!(reader.close());
    }
}

#[test]
fn test_zstd_round_trip() {
    let data = sample(300_000);
    let mut writer = ZstdWriter::new(
        Dependency::owned(VecWriter::owned()),
        DEFAULT_ZSTD_LEVEL,
        None,
        BufferOptions::default(),
    );
    write_with(&mut writer, &data);
    assert!(writer.close());
    let compressed = writer.sink().dest().dest().clone();

    let mut reader = ZstdReader::new(
        Dependency::owned(SliceReader::new(compressed)),
        BufferOptions::default(),
    );
    assert_eq!(read_all(&mut reader), data);
    assert!(reader.close());
}

#[test]
fn test_brotli_round_trip() {
    let data = sample(200_000);
    let mut compressed = Chain::new();
    {
        let mut dest = ChainWriter::borrowed(&mut compressed);
        {
            let mut writer = BrotliWriter::borrowed(&mut dest, DEFAULT_BROTLI_LEVEL, BufferOptions::default());
            write_with(&mut writer, &data);
            assert!(writer.close());
        }
        assert!(dest.close());
    }

    let mut reader = BrotliReader::new(
        Dependency::owned(ChainReader::owned(compressed)),
        BufferOptions::default(),
    );
    assert_eq!(read_all(&mut reader), data);
    assert!(reader.close());
}

#[test]
fn test_framed_snappy_round_trip() {
    let data = sample(300_000);
    let mut writer = FramedSnappyWriter::new(Dependency::owned(VecWriter::owned()), BufferOptions::default());
    write_with(&mut writer, &data);
    assert!(writer.close());
    let compressed = writer.sink().dest().dest().clone();
    assert!(compressed.starts_with(&FRAMED_SNAPPY_STREAM_ID));

    let mut reader = FramedSnappyReader::new(Dependency::owned(SliceReader::new(compressed)));
    assert_eq!(read_all(&mut reader), data);
    assert!(reader.close());
}

#[test]
fn test_flush_makes_prefix_decodable() {
    let mut writer = ZstdWriter::new(
        Dependency::owned(VecWriter::owned()),
        DEFAULT_ZSTD_LEVEL,
        None,
        BufferOptions::default(),
    );
    assert!(writer.write(b"first part, "));
    assert!(writer.flush(FlushType::FromObject));
    assert!(writer.write(b"second part"));
    assert!(writer.close());
    let compressed = writer.sink().dest().dest().clone();

    let mut reader = ZstdReader::new(Dependency::owned(SliceReader::new(compressed)), BufferOptions::default());
    assert_eq!(read_all(&mut reader), b"first part, second part");
}

// =============================================================================
// Framed Snappy Wire Format Tests
// =============================================================================

#[test]
fn test_framed_snappy_abc_bytes() {
    let mut writer = FramedSnappyWriter::new(Dependency::owned(VecWriter::owned()), BufferOptions::default());
    assert!(writer.write(b"abc"));
    assert!(writer.close());

    let mut expected = FRAMED_SNAPPY_STREAM_ID.to_vec();
    expected.extend_from_slice(&[0x01, 0x07, 0x00, 0x00]);
    expected.extend_from_slice(&masked_crc32c(b"abc").to_le_bytes());
    expected.extend_from_slice(b"abc");
    assert_eq!(writer.sink().dest().dest(), &expected);
}

#[test]
fn test_framed_snappy_rejects_bad_checksum() {
    let mut stream = FRAMED_SNAPPY_STREAM_ID.to_vec();
    stream.extend_from_slice(&[0x01, 0x07, 0x00, 0x00]);
    stream.extend_from_slice(&(masked_crc32c(b"abc") ^ 1).to_le_bytes());
    stream.extend_from_slice(b"abc");

    let mut reader = FramedSnappyReader::new(Dependency::owned(SliceReader::new(stream)));
    let mut out = Vec::new();
    assert!(!reader.read_all(&mut out));
    assert!(reader.status().unwrap_err().is_data_loss());
}

#[test]
fn test_framed_snappy_skips_padding_frames() {
    let mut stream = FRAMED_SNAPPY_STREAM_ID.to_vec();
    stream.extend_from_slice(&[0xfe, 0x03, 0x00, 0x00, 0, 0, 0]);
    stream.extend_from_slice(&[0x01, 0x06, 0x00, 0x00]);
    stream.extend_from_slice(&masked_crc32c(b"xy").to_le_bytes());
    stream.extend_from_slice(b"xy");

    let mut reader = FramedSnappyReader::new(Dependency::owned(SliceReader::new(stream)));
    assert_eq!(read_all(&mut reader), b"xy");
    assert!(reader.close());
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_truncated_streams_fail_on_close() {
    let data = sample(50_000);

    let compressed = zstd::encode_all(&data[..], 3).unwrap();
    let half = compressed[..compressed.len() / 2].to_vec();
    let mut reader = ZstdReader::new(Dependency::owned(SliceReader::new(half)), BufferOptions::default());
    let mut out = Vec::new();
    reader.read_all(&mut out);
    assert!(!reader.close());
    assert!(reader.status().unwrap_err().is_data_loss());

    let mut writer = FramedSnappyWriter::new(Dependency::owned(VecWriter::owned()), BufferOptions::default());
    write_with(&mut writer, &data);
    assert!(writer.close());
    let mut framed = writer.sink().dest().dest().clone();
    framed.truncate(framed.len() - 10);
    let mut reader = FramedSnappyReader::new(Dependency::owned(SliceReader::new(framed)));
    let mut out = Vec::new();
    reader.read_all(&mut out);
    assert!(!reader.close());
    assert!(reader.status().unwrap_err().is_data_loss());
}

#[test]
fn test_borrowed_source_stays_usable() {
    let mut writer = ZstdWriter::new(
        Dependency::owned(VecWriter::owned()),
        DEFAULT_ZSTD_LEVEL,
        None,
        BufferOptions::default(),
    );
    assert!(writer.write(b"payload"));
    assert!(writer.close());
    let mut bytes = writer.sink().dest().dest().clone();
    bytes.extend_from_slice(b"after");

    let mut src = SliceReader::new(bytes);
    {
        let mut reader = ZstdReader::borrowed(&mut src, BufferOptions::default());
        let mut out = Vec::new();
        assert!(reader.read_to_vec(7, &mut out));
        assert_eq!(out, b"payload");
        assert!(reader.verify_end_and_close());
    }
    assert!(src.healthy());
    assert_eq!(read_all(&mut src), b"after");
}
