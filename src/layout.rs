//! Chunk layout - how a slice volume is divided into per-file chunks

use crate::error::{Result, VolpkgError};
use crate::types::DataType;
use serde::{Deserialize, Serialize};

/// Layout of a virtual array: directory-derived leading dimensions followed
/// by the per-file lagging dimensions. Every leading index selects one file,
/// so chunks are one element thick along each leading axis and span the
/// whole lagging extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLayout {
    /// Directory-derived dimensions, outermost first
    pub leading_shape: Vec<usize>,

    /// Shape of one decoded file
    pub lagging_shape: Vec<usize>,

    /// Element type of the volume
    pub data_type: DataType,
}

impl ChunkLayout {
    /// Create a new chunk layout
    pub fn new(
        leading_shape: Vec<usize>,
        lagging_shape: Vec<usize>,
        data_type: DataType,
    ) -> Result<Self> {
        if leading_shape.is_empty() {
            return Err(VolpkgError::InvalidDimensions(
                "At least one leading dimension is required".to_string(),
            ));
        }

        if leading_shape.iter().any(|&n| n == 0) {
            return Err(VolpkgError::InvalidDimensions(format!(
                "Leading dimensions must be positive, got {:?}",
                leading_shape
            )));
        }

        Ok(Self {
            leading_shape,
            lagging_shape,
            data_type,
        })
    }

    /// Number of leading (directory) dimensions
    pub fn leading_ndim(&self) -> usize {
        self.leading_shape.len()
    }

    /// Total number of dimensions
    pub fn ndim(&self) -> usize {
        self.leading_shape.len() + self.lagging_shape.len()
    }

    /// Logical shape: leading shape followed by lagging shape
    pub fn shape(&self) -> Vec<usize> {
        self.leading_shape
            .iter()
            .chain(self.lagging_shape.iter())
            .copied()
            .collect()
    }

    /// Shape of every chunk
    pub fn chunk_shape(&self) -> Vec<usize> {
        std::iter::repeat(1)
            .take(self.leading_ndim())
            .chain(self.lagging_shape.iter().copied())
            .collect()
    }

    /// Number of chunks along each dimension
    pub fn chunk_count(&self) -> Vec<usize> {
        self.leading_shape
            .iter()
            .copied()
            .chain(std::iter::repeat(1).take(self.lagging_shape.len()))
            .collect()
    }

    /// Total number of chunks (one per file)
    pub fn total_chunks(&self) -> usize {
        self.leading_shape.iter().product()
    }

    /// Chunk extents per dimension, e.g. `[[1, 1, 1], [512], [512]]`
    pub fn chunks(&self) -> Vec<Vec<usize>> {
        self.leading_shape
            .iter()
            .map(|&n| vec![1; n])
            .chain(self.lagging_shape.iter().map(|&n| vec![n]))
            .collect()
    }

    /// Convert a chunk index to leading coordinates
    pub fn chunk_index_to_coords(&self, index: usize) -> Vec<usize> {
        let mut coords = vec![0; self.leading_ndim()];
        let mut remaining = index;

        for (i, coord) in coords.iter_mut().enumerate() {
            let stride: usize = self.leading_shape.iter().skip(i + 1).product();
            *coord = remaining / stride;
            remaining %= stride;
        }

        coords
    }

    /// Convert leading coordinates to a chunk index
    pub fn chunk_coords_to_index(&self, coords: &[usize]) -> usize {
        let mut index = 0;

        for (i, &coord) in coords.iter().enumerate().take(self.leading_ndim()) {
            let stride: usize = self.leading_shape.iter().skip(i + 1).product();
            index += coord * stride;
        }

        index
    }

    /// Element range covered by a chunk in every dimension
    pub fn chunk_data_range(&self, chunk_coords: &[usize]) -> Vec<(usize, usize)> {
        chunk_coords
            .iter()
            .take(self.leading_ndim())
            .map(|&coord| (coord, coord + 1))
            .chain(self.lagging_shape.iter().map(|&n| (0, n)))
            .collect()
    }

    /// Reduce a chunk coordinate to its leading part.
    ///
    /// Accepts either the leading coordinates alone or a full-rank chunk
    /// coordinate whose lagging entries are all zero.
    pub fn leading_coords<'a>(&self, coords: &'a [usize]) -> Result<&'a [usize]> {
        let n = self.leading_ndim();
        let valid_rank = coords.len() == n
            || (coords.len() == self.ndim() && coords[n..].iter().all(|&c| c == 0));
        if !valid_rank {
            return Err(VolpkgError::InvalidDimensions(format!(
                "Chunk coordinate {:?} does not address a chunk of a {}-leading-dimension array",
                coords, n
            )));
        }

        let leading = &coords[..n];
        if !self.is_chunk_in_bounds(leading) {
            return Err(VolpkgError::OutOfBounds(format!(
                "Chunk {:?} outside grid {:?}",
                leading, self.leading_shape
            )));
        }
        Ok(leading)
    }

    /// Check if leading coordinates address an existing chunk
    pub fn is_chunk_in_bounds(&self, coords: &[usize]) -> bool {
        coords.len() == self.leading_ndim()
            && coords
                .iter()
                .zip(self.leading_shape.iter())
                .all(|(&coord, &n)| coord < n)
    }

    /// Check if element coordinates are within bounds
    pub fn is_in_bounds(&self, coords: &[usize]) -> bool {
        if coords.len() != self.ndim() {
            return false;
        }

        coords
            .iter()
            .zip(self.shape())
            .all(|(&coord, n)| coord < n)
    }

    /// Size in bytes of a single decoded chunk
    pub fn chunk_size_bytes(&self) -> usize {
        self.lagging_shape.iter().product::<usize>() * self.data_type.size_in_bytes()
    }

    /// Size in bytes of the whole array if it were materialized
    pub fn total_size_bytes(&self) -> usize {
        self.total_chunks() * self.chunk_size_bytes()
    }

    /// Get a summary string of the layout
    pub fn summary(&self) -> String {
        let size_str = self
            .shape()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" x ");

        format!(
            "{}D array: {} ({}), {} chunks, {} if materialized",
            self.ndim(),
            size_str,
            self.data_type,
            self.total_chunks(),
            crate::utils::format_bytes(self.total_size_bytes())
        )
    }
}
