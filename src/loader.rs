//! Lazy block loading - one file decoded per chunk request

use crate::decode::Decoder;
use crate::error::{Result, VolpkgError};
use crate::hierarchy::FileGrid;
use crate::types::ChunkData;
use std::fmt;
use std::sync::Arc;

/// Maps a leading coordinate to the decoded contents of its file.
///
/// Holds only immutable shared state, so clones can run on any thread in
/// any order and always produce the same chunk for the same coordinate.
#[derive(Clone)]
pub struct BlockLoader {
    grid: Arc<FileGrid>,
    decoder: Arc<dyn Decoder>,
}

impl BlockLoader {
    pub fn new(grid: Arc<FileGrid>, decoder: Arc<dyn Decoder>) -> Self {
        Self { grid, decoder }
    }

    pub fn grid(&self) -> &FileGrid {
        &self.grid
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    /// Decode the file at `coords` and give it one singleton axis per
    /// leading dimension.
    ///
    /// The decoded shape and type are passed through as-is; a file that
    /// differs from the rest of the hierarchy produces a differently shaped
    /// chunk rather than an error.
    pub fn load(&self, coords: &[usize]) -> Result<ChunkData> {
        load_block(&self.grid, coords, self.decoder.as_ref())
    }
}

impl fmt::Debug for BlockLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockLoader")
            .field("grid_shape", &self.grid.shape())
            .field("decoder", &self.decoder.name())
            .finish()
    }
}

/// Decode the single file at a leading coordinate of `grid`
pub fn load_block(grid: &FileGrid, coords: &[usize], decoder: &dyn Decoder) -> Result<ChunkData> {
    let path = grid.get(coords).ok_or_else(|| {
        VolpkgError::OutOfBounds(format!(
            "Chunk {:?} outside file grid {:?}",
            coords,
            grid.shape()
        ))
    })?;

    tracing::debug!(
        path = %path.display(),
        coords = ?coords,
        decoder = decoder.name(),
        "loading chunk"
    );

    let image = decoder.decode(path)?;
    Ok(image.with_leading_axes(grid.ndim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FnDecoder;
    use crate::types::DataType;
    use ndarray::{ArrayD, IxDyn};
    use std::path::{Path, PathBuf};

    fn grid_2x3() -> Arc<FileGrid> {
        let files = (0..6)
            .map(|i| PathBuf::from(format!("/vol/{}/{}.raw", i / 3, i % 3)))
            .collect();
        Arc::new(FileGrid::from_sorted(files, &[2, 3]).unwrap())
    }

    /// Decodes `/vol/<a>/<b>.raw` into a 2x2 array filled with `a * 10 + b`
    fn index_decoder() -> Arc<dyn Decoder> {
        Arc::new(FnDecoder::new(|path: &Path| {
            let b: u16 = path.file_stem().unwrap().to_str().unwrap().parse().unwrap();
            let a: u16 = path
                .parent()
                .unwrap()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .parse()
                .unwrap();
            if a == 1 && b == 1 {
                return Err(VolpkgError::unreadable(path, "corrupt"));
            }
            Ok(ChunkData::U16(ArrayD::from_elem(IxDyn(&[2, 2]), a * 10 + b)))
        }))
    }

    #[test]
    fn test_load_adds_leading_axes() {
        let loader = BlockLoader::new(grid_2x3(), index_decoder());
        let chunk = loader.load(&[1, 2]).unwrap();
        assert_eq!(chunk.shape(), &[1, 1, 2, 2]);
        assert_eq!(chunk.data_type(), DataType::U16);
        assert_eq!(chunk.view::<u16>().unwrap()[[0, 0, 1, 1]], 12);
    }

    #[test]
    fn test_load_is_repeatable() {
        let loader = BlockLoader::new(grid_2x3(), index_decoder());
        assert_eq!(loader.load(&[0, 1]).unwrap(), loader.load(&[0, 1]).unwrap());
    }

    #[test]
    fn test_errors_are_chunk_local() {
        let loader = BlockLoader::new(grid_2x3(), index_decoder());
        assert!(matches!(
            loader.load(&[1, 1]),
            Err(VolpkgError::UnreadableFile { .. })
        ));
        assert!(loader.load(&[1, 0]).is_ok());
        assert!(loader.load(&[1, 2]).is_ok());
    }

    #[test]
    fn test_out_of_bounds() {
        let loader = BlockLoader::new(grid_2x3(), index_decoder());
        assert!(matches!(
            loader.load(&[2, 0]),
            Err(VolpkgError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_concurrent_loads() {
        let loader = BlockLoader::new(grid_2x3(), index_decoder());
        let handles: Vec<_> = [[0, 0], [0, 2], [1, 0], [1, 2]]
            .into_iter()
            .map(|coords| {
                let loader = loader.clone();
                std::thread::spawn(move || loader.load(&coords).unwrap())
            })
            .collect();
        let values: Vec<u16> = handles
            .into_iter()
            .map(|h| h.join().unwrap().view::<u16>().unwrap()[[0, 0, 0, 0]])
            .collect();
        assert_eq!(values, vec![0, 2, 10, 12]);
    }
}
