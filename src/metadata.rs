//! Serializable description of a virtual array

use crate::error::Result;
use crate::layout::ChunkLayout;
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Everything a host needs to plan reads against a virtual array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    /// Root directory the files were discovered under
    pub root: PathBuf,

    /// Glob pattern, relative to `root`
    pub pattern: String,

    /// Logical shape
    pub shape: Vec<usize>,

    /// Number of directory-derived dimensions
    pub leading_ndim: usize,

    /// Shape of every chunk
    pub chunk_shape: Vec<usize>,

    /// Chunk extents per dimension
    pub chunks: Vec<Vec<usize>>,

    /// Element type
    pub data_type: DataType,

    /// Source file of each chunk, in row-major chunk order
    pub files: Vec<PathBuf>,

    /// Free-form annotations (license, rendering hints, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl ArrayMetadata {
    pub fn new(
        root: PathBuf,
        pattern: impl Into<String>,
        layout: &ChunkLayout,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            root,
            pattern: pattern.into(),
            shape: layout.shape(),
            leading_ndim: layout.leading_ndim(),
            chunk_shape: layout.chunk_shape(),
            chunks: layout.chunks(),
            data_type: layout.data_type,
            files,
            attributes: HashMap::new(),
        }
    }

    /// Add an annotation
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get an annotation
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
