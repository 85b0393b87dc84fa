//! Reading `.volpkg` directories
//!
//! A package holds scan volumes under `volumes/<name>/` (one slice hierarchy
//! each) and segmentations under `paths/<segment>/`, which may contain a
//! `pointset.vcps` point set and any number of `.obj` surfaces.

use crate::array::{VirtualArray, VirtualArrayBuilder};
use crate::config::ReaderConfig;
use crate::error::{Result, VolpkgError};
use crate::hierarchy::glob_under;
use crate::mesh::{read_surface, Surface};
use crate::pointcloud::{read_point_cloud, PointCloud};
use std::path::{Path, PathBuf};

/// Directory suffix identifying a volume package
pub const VOLPKG_EXTENSION: &str = ".volpkg";

const VOLUMES_PATTERN: &str = "volumes/*";
const POINTSETS_PATTERN: &str = "paths/*/pointset.vcps";
const SURFACES_PATTERN: &str = "paths/*/*.obj";

/// One displayable item of a package
#[derive(Debug, Clone)]
pub enum Layer {
    Image { name: String, data: VirtualArray },
    Points(PointCloud),
    Surface(Surface),
}

impl Layer {
    pub fn name(&self) -> &str {
        match self {
            Layer::Image { name, .. } => name,
            Layer::Points(cloud) => &cloud.name,
            Layer::Surface(surface) => &surface.name,
        }
    }

    /// `"image"`, `"points"` or `"surface"`
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Image { .. } => "image",
            Layer::Points(_) => "points",
            Layer::Surface(_) => "surface",
        }
    }
}

/// Everything read from a package
#[derive(Debug, Default)]
pub struct VolpkgContents {
    /// Volumes first, then point sets, then surfaces
    pub layers: Vec<Layer>,

    /// Entries that could not be read, with the reason
    pub failures: Vec<(PathBuf, VolpkgError)>,
}

impl VolpkgContents {
    pub fn images(&self) -> impl Iterator<Item = (&str, &VirtualArray)> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Image { name, data } => Some((name.as_str(), data)),
            _ => None,
        })
    }

    pub fn points(&self) -> impl Iterator<Item = &PointCloud> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Points(cloud) => Some(cloud),
            _ => None,
        })
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Surface(surface) => Some(surface),
            _ => None,
        })
    }

    fn collect<T>(&mut self, path: PathBuf, result: Result<T>, wrap: impl FnOnce(T) -> Layer) {
        match result {
            Ok(item) => self.layers.push(wrap(item)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping package entry");
                self.failures.push((path, err));
            }
        }
    }
}

/// Whether `path` names a volume package
pub fn accepts(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .to_str()
        .map(|s| s.trim_end_matches('/').ends_with(VOLPKG_EXTENSION))
        .unwrap_or(false)
}

/// Like [`accepts`], looking only at the first path of a list
pub fn accepts_any<P: AsRef<Path>>(paths: &[P]) -> bool {
    paths.first().map(accepts).unwrap_or(false)
}

/// Read every volume, point set and surface in a package.
///
/// A failing entry is logged and recorded in
/// [`failures`](VolpkgContents::failures); the remaining entries are still
/// read. Only an invalid configuration or an unlistable package fails the
/// whole call.
pub fn read_volpkg(path: impl AsRef<Path>, config: &ReaderConfig) -> Result<VolpkgContents> {
    let root = path.as_ref();
    config.validate()?;
    if !root.is_dir() {
        return Err(VolpkgError::NotFound(format!(
            "volume package {}",
            root.display()
        )));
    }

    let mut contents = VolpkgContents::default();

    for volume in glob_under(root, VOLUMES_PATTERN)? {
        if !volume.is_dir() {
            continue;
        }
        let name = volume
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = VirtualArrayBuilder::new(&volume)
            .pattern(config.volume_pattern.as_str())
            .options(config.array.clone())
            .build();
        contents.collect(volume, result, |data| Layer::Image { name, data });
    }

    for pointset in glob_under(root, POINTSETS_PATTERN)? {
        let result = read_point_cloud(&pointset);
        contents.collect(pointset, result, Layer::Points);
    }

    for mesh in glob_under(root, SURFACES_PATTERN)? {
        let result = read_surface(&mesh);
        contents.collect(mesh, result, Layer::Surface);
    }

    tracing::info!(
        path = %root.display(),
        layers = contents.layers.len(),
        failures = contents.failures.len(),
        "read volume package"
    );
    Ok(contents)
}
