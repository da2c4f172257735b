//! Transposed chunk decoding
//!
//! Transposed chunks store records field by field. Decoding them is
//! delegated to a `TransposeDecoder`, which may skip fields outside the
//! requested `FieldProjection`.

use crate::base::Chain;
use crate::error::{Result, RiffleError};
use crate::stream::Reader;

/// Path of field numbers from the record root to a nested field
pub type FieldPath = Vec<u32>;

/// Set of fields a reader wants materialized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldProjection {
    /// `None` includes every field
    fields: Option<Vec<FieldPath>>,
}

impl FieldProjection {
    /// Includes every field.
    pub fn all() -> Self {
        Self { fields: None }
    }

    /// Includes only the given fields (and their subfields).
    pub fn fields(paths: impl IntoIterator<Item = FieldPath>) -> Self {
        Self {
            fields: Some(paths.into_iter().collect()),
        }
    }

    pub fn includes_all(&self) -> bool {
        self.fields.is_none()
    }

    /// Whether `path` or one of its ancestors was requested.
    pub fn includes(&self, path: &[u32]) -> bool {
        match &self.fields {
            None => true,
            Some(fields) => fields.iter().any(|field| path.starts_with(field)),
        }
    }
}

/// Decoder for transposed chunk payloads
pub trait TransposeDecoder: Send {
    /// Decodes `num_records` records from `src` into `dest`, returning the
    /// end offset of each record within `dest`.
    fn decode(
        &mut self,
        src: &mut dyn Reader,
        num_records: u64,
        decoded_data_size: u64,
        projection: &FieldProjection,
        dest: &mut Chain,
    ) -> Result<Vec<usize>>;
}

/// Decoder used when no transposed format support is installed
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTransposeDecoder;

impl TransposeDecoder for UnsupportedTransposeDecoder {
    fn decode(
        &mut self,
        _src: &mut dyn Reader,
        _num_records: u64,
        _decoded_data_size: u64,
        _projection: &FieldProjection,
        _dest: &mut Chain,
    ) -> Result<Vec<usize>> {
        Err(RiffleError::Unimplemented(
            "Transposed chunks are not supported by this reader".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_includes_subfields() {
        let projection = FieldProjection::fields([vec![1, 2]]);
        assert!(!projection.includes_all());
        assert!(projection.includes(&[1, 2]));
        assert!(projection.includes(&[1, 2, 7]));
        assert!(!projection.includes(&[1]));
        assert!(FieldProjection::all().includes(&[5]));
    }
}
