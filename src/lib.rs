//! volpkg - lazy volumetric arrays over directories of image slices
//!
//! Scroll scans and similar volumes are stored as one image file per slice,
//! often nested in directories (`<volume>/<tile>/<slice>.tif`). This crate
//! presents such a hierarchy as a single chunked N-dimensional array: every
//! directory level becomes a leading dimension, every file one chunk, and
//! nothing is decoded until a region is read.
//!
//! # Features
//!
//! - Leading shape inference from a glob pattern, with irregular
//!   hierarchies rejected up front
//! - Pluggable decoders and probers (standard image formats by default)
//! - Optional per-array LRU chunk cache
//! - Sync and async (bounded concurrency) region reads
//! - `.vcps` point sets, OBJ surfaces and whole `.volpkg` packages
//!
//! # Example
//!
//! ```rust,ignore
//! use volpkg::imreads;
//!
//! # fn example() -> volpkg::Result<()> {
//! // 2 tiles of 500 slices, each slice 1024 x 1024
//! let volume = imreads("/data/scroll1/volumes/20230205", "*/*.tif")?;
//! assert_eq!(volume.shape(), vec![2, 500, 1024, 1024]);
//!
//! // Decodes only the 10 files the region touches
//! let block = volume.read_region::<u16>(&[0, 100, 0, 0], &[1, 110, 256, 256])?;
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod hierarchy;
pub mod layout;
pub mod loader;
pub mod mesh;
pub mod metadata;
pub mod pointcloud;
pub mod probe;
pub mod sample;
pub mod types;
pub mod utils;
pub mod volpkg;

// Re-exports
pub use array::{build_virtual_array, imreads, ChunkTask, VirtualArray, VirtualArrayBuilder};
pub use cache::CacheStats;
pub use config::{ArrayOptions, ReaderConfig, DEFAULT_PATTERN};
pub use decode::{Decoder, FnDecoder, StandardImageDecoder};
pub use error::{Result, VolpkgError};
pub use hierarchy::{discover_files, resolve_shape, FileGrid};
pub use layout::ChunkLayout;
pub use loader::{load_block, BlockLoader};
pub use mesh::{read_mesh, read_surface, Mesh, Surface};
pub use metadata::ArrayMetadata;
pub use pointcloud::{read_point_cloud, PointCloud, PointCloudHeader};
pub use probe::{image_properties, loaded_properties, Prober};
pub use sample::{open_sample, ArchiveFetcher, LocalArchiveFetcher, SampleCache};
pub use types::{ChunkData, DataType, Element, ImageProperties};
pub use volpkg::{read_volpkg, Layer, VolpkgContents};

/// Version of this crate
pub const VOLPKG_VERSION: &str = env!("CARGO_PKG_VERSION");
