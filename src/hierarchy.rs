//! File discovery and directory-derived array dimensions
//!
//! A glob pattern such as `*/*/*.tif` matched under a root directory yields a
//! flat list of files. Each `/`-separated directory level in the pattern is
//! one leading dimension of the resulting array; its length is the number of
//! entries per parent at that level.

use crate::error::{Result, VolpkgError};
use glob::{MatchOptions, Pattern};
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Find all regular files under `root` matching `pattern`, sorted by path
pub fn discover_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = glob_under(root, pattern)?;
    files.retain(|path| path.is_file());

    tracing::debug!(
        root = %root.display(),
        pattern,
        count = files.len(),
        "discovered slice files"
    );
    Ok(files)
}

/// Every path under `root` matching `pattern`, sorted. `*` never crosses a
/// directory separator.
pub(crate) fn glob_under(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let root_str = root.to_str().ok_or_else(|| {
        VolpkgError::InvalidPattern(format!("root is not valid UTF-8: {}", root.display()))
    })?;
    let full_pattern = format!(
        "{}/{}",
        Pattern::escape(root_str.trim_end_matches('/')),
        pattern.trim_start_matches('/')
    );

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let entries = glob::glob_with(&full_pattern, options)
        .map_err(|e| VolpkgError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut paths = entries
        .map(|entry| entry.map_err(|e| VolpkgError::Io(e.into_error())))
        .collect::<Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

/// Infer the leading shape of a file hierarchy, outermost dimension first.
///
/// Works one directory level at a time: group the current paths by parent,
/// require every parent to hold the same number of entries, record that
/// count, then continue with the distinct parents. Stops once all paths
/// share a single parent.
pub fn resolve_shape<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<usize>> {
    if paths.is_empty() {
        return Err(VolpkgError::EmptyHierarchy(
            "cannot infer a shape from an empty file list".to_string(),
        ));
    }

    let mut level: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let mut dims = Vec::new();
    let mut depth = 0;

    loop {
        let n_total = level.len();
        let groups = group_by_parent(&level);
        let n_parents = groups.len();

        if n_parents == 1 {
            dims.push(n_total);
            break;
        }

        check_uniform(&groups, depth)?;
        dims.push(n_total / n_parents);
        level = groups.into_keys().collect();
        depth += 1;
    }

    dims.reverse();
    Ok(dims)
}

fn group_by_parent(paths: &[PathBuf]) -> BTreeMap<PathBuf, usize> {
    let mut groups = BTreeMap::new();
    for path in paths {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        *groups.entry(parent).or_insert(0) += 1;
    }
    groups
}

fn check_uniform(groups: &BTreeMap<PathBuf, usize>, depth: usize) -> Result<()> {
    let mut counts = groups.iter();
    let Some((first_parent, &expected)) = counts.next() else {
        return Ok(());
    };

    for (parent, &count) in counts {
        if count != expected {
            return Err(VolpkgError::IrregularHierarchy {
                level: depth,
                detail: format!(
                    "{} has {} entries but {} has {}",
                    parent.display(),
                    count,
                    first_parent.display(),
                    expected
                ),
            });
        }
    }
    Ok(())
}

/// Sorted file paths arranged on the leading dimensions of an array
#[derive(Debug, Clone)]
pub struct FileGrid {
    files: ArrayD<PathBuf>,
}

impl FileGrid {
    /// Reshape a sorted file list to `leading_shape`
    pub fn from_sorted(files: Vec<PathBuf>, leading_shape: &[usize]) -> Result<Self> {
        let expected: usize = leading_shape.iter().product();
        if files.len() != expected {
            return Err(VolpkgError::InvalidDimensions(format!(
                "{} files cannot fill a grid of shape {:?}",
                files.len(),
                leading_shape
            )));
        }
        let files = ArrayD::from_shape_vec(IxDyn(leading_shape), files)?;
        Ok(Self { files })
    }

    /// Discover, resolve and arrange the files under `root` in one step
    pub fn discover(root: &Path, pattern: &str) -> Result<Self> {
        let files = discover_files(root, pattern)?;
        if files.is_empty() {
            return Err(VolpkgError::EmptyHierarchy(format!(
                "no files found at path {} with pattern {}",
                root.display(),
                pattern
            )));
        }
        let shape = resolve_shape(&files)?;
        Self::from_sorted(files, &shape)
    }

    /// Leading shape of the grid
    pub fn shape(&self) -> &[usize] {
        self.files.shape()
    }

    pub fn ndim(&self) -> usize {
        self.files.ndim()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The file at a leading coordinate
    pub fn get(&self, coords: &[usize]) -> Option<&Path> {
        if coords.len() != self.files.ndim() {
            return None;
        }
        self.files.get(coords).map(PathBuf::as_path)
    }

    /// First file in sort order
    pub fn first(&self) -> Option<&Path> {
        self.files.iter().next().map(PathBuf::as_path)
    }

    /// All files in row-major (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }
}
