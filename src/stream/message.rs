//! Message parse/serialize helpers
//!
//! Structured values are encoded with bincode, the same serializer the
//! record layer uses for metadata. Parsing reads through `ReaderIo` and
//! requires the value to span the whole source; any malformed input is
//! reported as `DataLoss`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::base::{Chain, Dependency};
use crate::error::{Result, RiffleError};

use super::chain_reader::ChainReader;
use super::chain_writer::ChainWriter;
use super::reader::Reader;
use super::std_io::{ReaderIo, WriterIo};
use super::writer::Writer;

/// Parses a value that occupies the rest of `src`.
pub fn parse_from_reader<T, R>(src: &mut R) -> Result<T>
where
    T: DeserializeOwned,
    R: Reader,
{
    let parsed: std::result::Result<T, bincode::Error> =
        bincode::deserialize_from(ReaderIo::borrowed(&mut *src));
    src.status()?;
    let value = parsed.map_err(|err| RiffleError::DataLoss(format!("Failed to parse message: {err}")))?;
    if !src.verify_end() {
        return Err(src
            .status()
            .err()
            .unwrap_or_else(|| RiffleError::DataLoss("End of data expected".into())));
    }
    Ok(value)
}

/// Serializes `value` at the current position of `dest`.
pub fn serialize_to_writer<T, W>(value: &T, dest: &mut W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Writer,
{
    let written = bincode::serialize_into(WriterIo::borrowed(&mut *dest), value);
    dest.status()?;
    written?;
    Ok(())
}

pub fn parse_from_chain<T: DeserializeOwned>(src: &Chain) -> Result<T> {
    let mut reader = ChainReader::new(Dependency::owned(src.clone()));
    let value = parse_from_reader(&mut reader)?;
    reader.close();
    Ok(value)
}

pub fn serialize_to_chain<T: Serialize + ?Sized>(value: &T) -> Result<Chain> {
    let mut writer = ChainWriter::owned();
    serialize_to_writer(value, &mut writer)?;
    if !writer.close() {
        writer.status()?;
    }
    Ok(writer.take_dest())
}

pub fn parse_from_bytes<T: DeserializeOwned>(src: &[u8]) -> Result<T> {
    bincode::deserialize(src)
        .map_err(|err| RiffleError::DataLoss(format!("Failed to parse message: {err}")))
}

pub fn serialize_to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}
