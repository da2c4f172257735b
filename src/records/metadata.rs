//! File metadata
//!
//! Stored once per file, in the chunk right after the file signature.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Description of a records file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsMetadata {
    /// Free-form human readable description
    pub file_comment: Option<String>,

    /// Name of the type of the records
    pub record_type_name: Option<String>,

    /// Text form of the options the file was written with
    pub record_writer_options: Option<String>,

    /// Application defined entries
    pub attributes: BTreeMap<String, String>,
}

impl RecordsMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_comment(mut self, comment: impl Into<String>) -> Self {
        self.file_comment = Some(comment.into());
        self
    }

    pub fn with_record_type_name(mut self, name: impl Into<String>) -> Self {
        self.record_type_name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
