//! Block compression for chunk payloads
//!
//! A compressed block is the varint length of the uncompressed data
//! followed by the codec's stream. Uncompressed blocks are stored as is.

use crate::base::{Chain, Dependency};
use crate::codec::{
    dest_failure, BrotliReader, BrotliWriter, ZstdReader, ZstdWriter, DEFAULT_BROTLI_WINDOW_LOG,
};
use crate::config::{BufferOptions, CompressionType, CompressorOptions};
use crate::error::{Result, RiffleError};
use crate::stream::{ChainReader, ChainWriter, Reader, Writer};

use super::varint::{encode_varint64, read_varint64, MAX_VARINT64_LEN};

/// Appends `src` to `dest` as one compressed block.
pub fn compress_block(options: &CompressorOptions, src: &Chain, dest: &mut Chain) -> Result<()> {
    if options.compression_type == CompressionType::None {
        dest.append_chain(src);
        return Ok(());
    }
    let mut size = Vec::with_capacity(MAX_VARINT64_LEN);
    encode_varint64(src.len() as u64, &mut size);
    dest.append_slice(&size);

    let buffer_options = BufferOptions::default().with_size_hint(Some(src.len() as u64));
    let mut writer = ChainWriter::borrowed(dest);
    match options.compression_type {
        CompressionType::Brotli => {
            let mut compressor = BrotliWriter::new(
                Dependency::borrowed(&mut writer),
                options.level.clamp(0, 11) as u32,
                options.window_log.unwrap_or(DEFAULT_BROTLI_WINDOW_LOG),
                buffer_options,
            );
            compressor.write_chain(src);
            close_writer(&mut compressor)?;
        }
        CompressionType::Zstd => {
            let mut compressor = ZstdWriter::new(
                Dependency::borrowed(&mut writer),
                options.level,
                options.window_log,
                buffer_options,
            );
            compressor.write_chain(src);
            close_writer(&mut compressor)?;
        }
        CompressionType::Snappy => {
            let compressed = snap::raw::Encoder::new()
                .compress_vec(&src.to_vec())
                .map_err(|err| RiffleError::Internal(format!("snappy compression failed: {err}")))?;
            writer.write_vec(compressed);
        }
        CompressionType::None => {}
    }
    close_writer(&mut writer)
}

/// Decodes one block produced by `compress_block`.
pub fn decompress_block(compression: CompressionType, src: Chain) -> Result<Chain> {
    if compression == CompressionType::None {
        return Ok(src);
    }
    let mut reader = ChainReader::owned(src);
    let Some(size) = read_varint64(&mut reader) else {
        return Err(RiffleError::DataLoss("Reading uncompressed size failed".into()));
    };
    let length = usize::try_from(size)
        .map_err(|_| RiffleError::Overflow(format!("Uncompressed size too large: {size}")))?;
    let buffer_options = BufferOptions::default().with_size_hint(Some(size));
    let mut dest = Chain::new();
    match compression {
        CompressionType::Brotli => {
            let mut decompressor = BrotliReader::new(Dependency::borrowed(&mut reader), buffer_options);
            read_whole(&mut decompressor, length, &mut dest)?;
        }
        CompressionType::Zstd => {
            let mut decompressor = ZstdReader::new(Dependency::borrowed(&mut reader), buffer_options);
            read_whole(&mut decompressor, length, &mut dest)?;
        }
        CompressionType::Snappy => {
            let mut compressed = Vec::new();
            reader.read_all(&mut compressed);
            let decoded = snap::raw::Decoder::new()
                .decompress_vec(&compressed)
                .map_err(|err| RiffleError::DataLoss(format!("Invalid snappy block: {err}")))?;
            if decoded.len() != length {
                return Err(RiffleError::DataLoss(format!(
                    "Uncompressed size mismatch: declared {length}, decoded {}",
                    decoded.len()
                )));
            }
            dest = Chain::from(decoded);
        }
        CompressionType::None => {}
    }
    if !reader.verify_end_and_close() {
        return Err(reader
            .status()
            .err()
            .unwrap_or_else(|| RiffleError::DataLoss("Trailing data after compressed block".into())));
    }
    Ok(dest)
}

/// Reads exactly `length` decoded bytes and requires the stream to end there.
fn read_whole<R: Reader>(src: &mut R, length: usize, dest: &mut Chain) -> Result<()> {
    if !src.read_to_chain(length, dest) {
        src.close();
        return Err(src.status().err().unwrap_or_else(|| {
            RiffleError::DataLoss("Decompressed data shorter than declared".into())
        }));
    }
    if !src.verify_end_and_close() {
        return Err(src
            .status()
            .err()
            .unwrap_or_else(|| RiffleError::DataLoss("Decompressed data longer than declared".into())));
    }
    Ok(())
}

fn close_writer<W: Writer>(writer: &mut W) -> Result<()> {
    if !writer.close() {
        return Err(dest_failure(writer.status()));
    }
    Ok(())
}
