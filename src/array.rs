//! Virtual arrays - the main API for reading slice hierarchies
//!
//! A [`VirtualArray`] is built once from a root directory and a glob pattern.
//! Construction only lists files, infers the leading shape and probes the
//! first file; pixel data is decoded chunk by chunk when a region is read.

use crate::cache::{CacheStats, ChunkCache};
use crate::config::{ArrayOptions, DEFAULT_PATTERN};
use crate::decode::{Decoder, StandardImageDecoder};
use crate::error::{Result, VolpkgError};
use crate::hierarchy::{discover_files, resolve_shape, FileGrid};
use crate::layout::ChunkLayout;
use crate::loader::BlockLoader;
use crate::metadata::ArrayMetadata;
use crate::probe::{probe, Prober};
use crate::types::{ChunkData, DataType, Element};
use futures::{StreamExt, TryStreamExt};
use ndarray::{ArrayD, IxDyn, Slice};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lazily evaluated N-dimensional array over a hierarchy of slice files
#[derive(Debug, Clone)]
pub struct VirtualArray {
    inner: Arc<ArrayInner>,
}

#[derive(Debug)]
struct ArrayInner {
    root: PathBuf,
    pattern: String,
    layout: ChunkLayout,
    loader: BlockLoader,
    cache: ChunkCache,
    options: ArrayOptions,
}

/// Builder for [`VirtualArray`]
pub struct VirtualArrayBuilder {
    root: PathBuf,
    pattern: String,
    decoder: Arc<dyn Decoder>,
    prober: Option<Arc<dyn Prober>>,
    options: ArrayOptions,
}

impl VirtualArrayBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            decoder: Arc::new(StandardImageDecoder),
            prober: None,
            options: ArrayOptions::default(),
        }
    }

    /// Glob pattern relative to the root; each `/` adds a leading dimension
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Decoder used for every chunk (and for probing, unless a prober is set)
    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Prober used on the first file instead of the decoder's own probe
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn options(mut self, options: ArrayOptions) -> Self {
        self.options = options;
        self
    }

    /// Discover files, infer the shape and probe the first file.
    ///
    /// Only the first file (in sort order) is probed. Its shape and type are
    /// taken to hold for every file in the hierarchy.
    pub fn build(self) -> Result<VirtualArray> {
        self.options.validate()?;

        let files = discover_files(&self.root, &self.pattern)?;
        if files.is_empty() {
            return Err(VolpkgError::EmptyHierarchy(format!(
                "no files found at path {} with pattern {}",
                self.root.display(),
                self.pattern
            )));
        }

        let leading_shape = resolve_shape(&files)?;
        let props = probe(&files[0], self.decoder.as_ref(), self.prober.as_deref())?;
        let grid = FileGrid::from_sorted(files, &leading_shape)?;
        let layout = ChunkLayout::new(leading_shape, props.shape, props.data_type)?;

        tracing::info!(
            root = %self.root.display(),
            pattern = %self.pattern,
            shape = ?layout.shape(),
            dtype = %layout.data_type,
            chunks = layout.total_chunks(),
            "built virtual array"
        );

        Ok(VirtualArray {
            inner: Arc::new(ArrayInner {
                root: self.root,
                pattern: self.pattern,
                layout,
                loader: BlockLoader::new(Arc::new(grid), self.decoder),
                cache: ChunkCache::new(self.options.chunk_cache_capacity),
                options: self.options,
            }),
        })
    }
}

/// Build a virtual array from the files under `root` matching `pattern`
pub fn build_virtual_array(
    root: impl AsRef<Path>,
    pattern: &str,
    decoder: Arc<dyn Decoder>,
    prober: Option<Arc<dyn Prober>>,
) -> Result<VirtualArray> {
    let mut builder = VirtualArrayBuilder::new(root.as_ref())
        .pattern(pattern)
        .decoder(decoder);
    if let Some(prober) = prober {
        builder = builder.prober(prober);
    }
    builder.build()
}

/// Read a slice hierarchy with the standard image decoder
pub fn imreads(root: impl AsRef<Path>, pattern: &str) -> Result<VirtualArray> {
    VirtualArrayBuilder::new(root.as_ref()).pattern(pattern).build()
}

/// A deferred load of one chunk, runnable on any thread
#[derive(Debug, Clone)]
pub struct ChunkTask {
    array: VirtualArray,
    coords: Vec<usize>,
}

impl ChunkTask {
    /// Leading coordinate of the chunk
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    /// File the chunk is decoded from
    pub fn path(&self) -> Option<&Path> {
        self.array.chunk_path(&self.coords)
    }

    pub fn run(&self) -> Result<Arc<ChunkData>> {
        self.array.chunk(&self.coords)
    }
}

impl VirtualArray {
    pub fn builder(root: impl Into<PathBuf>) -> VirtualArrayBuilder {
        VirtualArrayBuilder::new(root)
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.inner.layout
    }

    /// Logical shape: leading shape followed by the per-file shape
    pub fn shape(&self) -> Vec<usize> {
        self.inner.layout.shape()
    }

    pub fn ndim(&self) -> usize {
        self.inner.layout.ndim()
    }

    pub fn data_type(&self) -> DataType {
        self.inner.layout.data_type
    }

    pub fn leading_shape(&self) -> &[usize] {
        &self.inner.layout.leading_shape
    }

    pub fn lagging_shape(&self) -> &[usize] {
        &self.inner.layout.lagging_shape
    }

    pub fn chunk_shape(&self) -> Vec<usize> {
        self.inner.layout.chunk_shape()
    }

    /// Chunk extents per dimension
    pub fn chunks(&self) -> Vec<Vec<usize>> {
        self.inner.layout.chunks()
    }

    pub fn num_chunks(&self) -> usize {
        self.inner.layout.total_chunks()
    }

    pub fn file_grid(&self) -> &FileGrid {
        self.inner.loader.grid()
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Serializable description of this array
    pub fn metadata(&self) -> ArrayMetadata {
        ArrayMetadata::new(
            self.inner.root.clone(),
            self.inner.pattern.clone(),
            &self.inner.layout,
            self.file_grid().iter().map(Path::to_path_buf).collect(),
        )
    }

    /// Source file of the chunk at `coords`
    pub fn chunk_path(&self, coords: &[usize]) -> Option<&Path> {
        let leading = self.inner.layout.leading_coords(coords).ok()?;
        self.file_grid().get(leading)
    }

    /// Decode (or fetch from cache) the chunk at `coords`.
    ///
    /// `coords` is either the leading coordinate or a full-rank chunk
    /// coordinate with zeros on the lagging axes. Exactly one file is read on
    /// a cache miss. The result is not checked against the array's declared
    /// chunk shape or type.
    pub fn chunk(&self, coords: &[usize]) -> Result<Arc<ChunkData>> {
        let leading = self.inner.layout.leading_coords(coords)?;

        if let Some(chunk) = self.inner.cache.get(leading) {
            return Ok(chunk);
        }

        let chunk = Arc::new(self.inner.loader.load(leading)?);
        self.inner.cache.insert(leading, Arc::clone(&chunk));
        Ok(chunk)
    }

    /// Deferred description of the chunk load at `coords`
    pub fn chunk_task(&self, coords: &[usize]) -> Result<ChunkTask> {
        let leading = self.inner.layout.leading_coords(coords)?;
        Ok(ChunkTask {
            array: self.clone(),
            coords: leading.to_vec(),
        })
    }

    /// One task per chunk, in row-major order
    pub fn chunk_tasks(&self) -> Vec<ChunkTask> {
        (0..self.num_chunks())
            .map(|index| ChunkTask {
                array: self.clone(),
                coords: self.inner.layout.chunk_index_to_coords(index),
            })
            .collect()
    }

    /// Leading coordinates of the chunks intersecting `[min, max)`
    pub fn overlapping_chunks(
        &self,
        min_coords: &[usize],
        max_coords: &[usize],
    ) -> Result<Vec<Vec<usize>>> {
        self.validate_region(min_coords, max_coords)?;

        let n = self.inner.layout.leading_ndim();
        let mut chunks = Vec::new();
        iterate_range(&min_coords[..n], &max_coords[..n], &mut |coords| {
            chunks.push(coords.to_vec());
        });
        Ok(chunks)
    }

    /// Read the region `[min_coords, max_coords)` into memory.
    ///
    /// Only the chunks intersecting the region are decoded.
    pub fn read_region<T: Element>(
        &self,
        min_coords: &[usize],
        max_coords: &[usize],
    ) -> Result<ArrayD<T>> {
        self.check_type::<T>()?;

        let chunks = self
            .overlapping_chunks(min_coords, max_coords)?
            .into_iter()
            .map(|coords| {
                let chunk = self.chunk(&coords)?;
                Ok((coords, chunk))
            })
            .collect::<Result<Vec<_>>>()?;

        self.assemble(min_coords, max_coords, &chunks)
    }

    /// Like [`read_region`](Self::read_region), loading chunks concurrently
    /// on the blocking thread pool
    pub async fn read_region_async<T: Element>(
        &self,
        min_coords: &[usize],
        max_coords: &[usize],
    ) -> Result<ArrayD<T>> {
        self.check_type::<T>()?;

        let loads = self
            .overlapping_chunks(min_coords, max_coords)?
            .into_iter()
            .map(|coords| {
                let task = ChunkTask {
                    array: self.clone(),
                    coords,
                };
                async move {
                    let coords = task.coords.clone();
                    let chunk = tokio::task::spawn_blocking(move || task.run()).await??;
                    Ok::<_, VolpkgError>((coords, chunk))
                }
            });

        let chunks: Vec<_> = futures::stream::iter(loads)
            .buffer_unordered(self.inner.options.max_concurrent_reads)
            .try_collect()
            .await?;

        self.assemble(min_coords, max_coords, &chunks)
    }

    /// Read a region without naming the element type
    pub fn read_region_dyn(&self, min_coords: &[usize], max_coords: &[usize]) -> Result<ChunkData> {
        match self.data_type() {
            DataType::U8 => self.read_region::<u8>(min_coords, max_coords).map(ChunkData::U8),
            DataType::U16 => self.read_region::<u16>(min_coords, max_coords).map(ChunkData::U16),
            DataType::U32 => self.read_region::<u32>(min_coords, max_coords).map(ChunkData::U32),
            DataType::U64 => self.read_region::<u64>(min_coords, max_coords).map(ChunkData::U64),
            DataType::I8 => self.read_region::<i8>(min_coords, max_coords).map(ChunkData::I8),
            DataType::I16 => self.read_region::<i16>(min_coords, max_coords).map(ChunkData::I16),
            DataType::I32 => self.read_region::<i32>(min_coords, max_coords).map(ChunkData::I32),
            DataType::I64 => self.read_region::<i64>(min_coords, max_coords).map(ChunkData::I64),
            DataType::F32 => self.read_region::<f32>(min_coords, max_coords).map(ChunkData::F32),
            DataType::F64 => self.read_region::<f64>(min_coords, max_coords).map(ChunkData::F64),
        }
    }

    /// Materialize the whole array. Decodes every file.
    pub fn to_array<T: Element>(&self) -> Result<ArrayD<T>> {
        let shape = self.shape();
        let min = vec![0; shape.len()];
        self.read_region(&min, &shape)
    }

    fn validate_region(&self, min_coords: &[usize], max_coords: &[usize]) -> Result<()> {
        let shape = self.shape();

        if min_coords.len() != shape.len() || max_coords.len() != shape.len() {
            return Err(VolpkgError::InvalidDimensions(
                "Coordinate dimensions don't match array dimensionality".to_string(),
            ));
        }

        for i in 0..shape.len() {
            if min_coords[i] >= max_coords[i] {
                return Err(VolpkgError::InvalidDimensions(
                    "Min coordinates must be less than max coordinates".to_string(),
                ));
            }
            if max_coords[i] > shape[i] {
                return Err(VolpkgError::OutOfBounds(format!(
                    "Region end {:?} exceeds array shape {:?}",
                    max_coords, shape
                )));
            }
        }

        Ok(())
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::DATA_TYPE != self.data_type() {
            return Err(VolpkgError::InvalidDataType {
                expected: self.data_type().to_string(),
                found: T::DATA_TYPE.to_string(),
            });
        }
        Ok(())
    }

    /// Copy the parts of `chunks` inside `[min, max)` into one array.
    ///
    /// This is where a file that disagrees with the probed shape or type is
    /// caught: it cannot be placed into the region.
    fn assemble<T: Element>(
        &self,
        min_coords: &[usize],
        max_coords: &[usize],
        chunks: &[(Vec<usize>, Arc<ChunkData>)],
    ) -> Result<ArrayD<T>> {
        let n = self.inner.layout.leading_ndim();
        let expected_shape = self.chunk_shape();
        let region_shape: Vec<usize> = min_coords
            .iter()
            .zip(max_coords.iter())
            .map(|(min, max)| max - min)
            .collect();
        let mut region = ArrayD::<T>::zeros(IxDyn(&region_shape));

        for (coords, chunk) in chunks {
            if chunk.shape() != expected_shape.as_slice() {
                return Err(VolpkgError::ChunkMismatch {
                    coords: coords.clone(),
                    detail: format!(
                        "shape {:?}, expected {:?}",
                        chunk.shape(),
                        expected_shape
                    ),
                });
            }
            let source = chunk.view::<T>().ok_or_else(|| VolpkgError::ChunkMismatch {
                coords: coords.clone(),
                detail: format!("type {}, expected {}", chunk.data_type(), T::DATA_TYPE),
            })?;

            let source = source.slice_each_axis(|ax| {
                let d = ax.axis.index();
                if d < n {
                    Slice::from(0..1)
                } else {
                    Slice::from(min_coords[d]..max_coords[d])
                }
            });
            let mut target = region.slice_each_axis_mut(|ax| {
                let d = ax.axis.index();
                if d < n {
                    let offset = coords[d] - min_coords[d];
                    Slice::from(offset..offset + 1)
                } else {
                    Slice::from(0..max_coords[d] - min_coords[d])
                }
            });
            target.assign(&source);
        }

        Ok(region)
    }
}

/// Visit every coordinate in `[min, max)` in row-major order
fn iterate_range<F>(min: &[usize], max: &[usize], callback: &mut F)
where
    F: FnMut(&[usize]),
{
    if min.is_empty() || min.iter().zip(max).any(|(lo, hi)| lo >= hi) {
        return;
    }
    let mut coords = min.to_vec();

    loop {
        callback(&coords);

        // Increment coordinates
        let mut dim = coords.len() - 1;
        loop {
            coords[dim] += 1;
            if coords[dim] < max[dim] {
                break;
            }
            coords[dim] = min[dim];
            if dim == 0 {
                return;
            }
            dim -= 1;
        }
    }
}
