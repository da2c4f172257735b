//! Riffle Describe Binary
//!
//! Prints the chunk structure of a records file, and optionally its
//! metadata and records.

use std::path::PathBuf;

use clap::Parser;
use riffle::chunk::{ChunkDecoder, ChunkType, SimpleDecoder};
use riffle::records::{ChunkReader, RecordsMetadata};
use riffle::stream::{parse_from_chain, FdReader};
use riffle::BufferOptions;
use tracing_subscriber::{fmt, EnvFilter};

/// Riffle Describe
#[derive(Parser, Debug)]
#[command(name = "riffle-describe")]
#[command(about = "Print the structure of a records file")]
#[command(version)]
struct Args {
    /// Records file to describe
    path: PathBuf,

    /// Print every record of every chunk
    #[arg(short, long)]
    records: bool,

    /// Longest record prefix printed, in bytes
    #[arg(long, default_value = "64")]
    max_record_bytes: usize,

    /// Skip corrupted regions instead of stopping at the first one
    #[arg(short, long)]
    skip_errors: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,riffle=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("riffle-describe v{}", riffle::VERSION);

    let src = match FdReader::open(&args.path, BufferOptions::default()) {
        Ok(src) => src,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = describe(src, &args) {
        tracing::error!("Failed to describe {}: {}", args.path.display(), e);
        std::process::exit(1);
    }
}

fn describe(src: FdReader<'static>, args: &Args) -> riffle::Result<()> {
    let mut chunk_reader = ChunkReader::new(riffle::Dependency::owned(src));
    let mut decoder = ChunkDecoder::default();
    let mut num_chunks = 0u64;
    let mut num_records = 0u64;
    let mut skipped_bytes = 0u64;

    loop {
        let chunk_begin = chunk_reader.pos();
        let Some(chunk) = chunk_reader.read_chunk() else {
            if chunk_reader.healthy() {
                break;
            }
            if !args.skip_errors {
                return chunk_reader.status();
            }
            match chunk_reader.recover() {
                Some(region) => {
                    println!("skipped {region}");
                    skipped_bytes += region.length();
                    continue;
                }
                None => return chunk_reader.status(),
            }
        };
        num_chunks += 1;
        let header = &chunk.header;
        println!(
            "chunk at {chunk_begin}: type={} data_size={} num_records={} decoded_data_size={}",
            header.chunk_type(),
            header.data_size(),
            header.num_records(),
            header.decoded_data_size()
        );

        match header.chunk_type() {
            ChunkType::FileMetadata => describe_metadata(&chunk),
            ChunkType::Simple | ChunkType::Transposed => {
                num_records += header.num_records();
                if args.records {
                    describe_records(&mut decoder, &chunk, chunk_begin, args);
                }
            }
            ChunkType::FileSignature | ChunkType::Padding => {}
        }
    }

    let closed = chunk_reader.close();
    println!("{num_chunks} chunks, {num_records} records, {skipped_bytes} bytes skipped");
    if !closed {
        return chunk_reader.status();
    }
    Ok(())
}

fn describe_metadata(chunk: &riffle::chunk::Chunk) {
    let parsed = SimpleDecoder::decode(&chunk.data, 1, chunk.header.decoded_data_size())
        .and_then(|decoder| parse_from_chain::<RecordsMetadata>(&decoder.into_parts().0));
    match parsed {
        Ok(metadata) => println!("  metadata: {metadata:?}"),
        Err(e) => println!("  metadata: unreadable ({e})"),
    }
}

fn describe_records(decoder: &mut ChunkDecoder, chunk: &riffle::chunk::Chunk, chunk_begin: u64, args: &Args) {
    if !decoder.decode(chunk) {
        if let Err(e) = decoder.status() {
            println!("  records: undecodable ({e})");
        }
        return;
    }
    while let Some(record) = decoder.read_record_bytes() {
        let index = decoder.index() - 1;
        let shown = &record[..record.len().min(args.max_record_bytes)];
        let ellipsis = if shown.len() < record.len() { "..." } else { "" };
        println!(
            "  {chunk_begin}/{index} ({} bytes): {}{ellipsis}",
            record.len(),
            shown.escape_ascii()
        );
    }
}
